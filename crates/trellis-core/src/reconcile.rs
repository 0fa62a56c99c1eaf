//! Positional child reconciliation.
//!
//! Old children (the alternate's chain) and new descriptors are walked in
//! lockstep by index. Position is the only identity: a node that moved is one
//! removal plus one placement, there is no move edit.

use smallvec::SmallVec;

use crate::descriptor::NodeDescriptor;
use crate::fiber::{EditTag, Effect, FiberId, FiberTree, WorkItem};

/// Rebuilds `parent`'s child chain in `wip` from `elements`.
///
/// Matching positions become `Updated` items reusing the old external
/// handle, unmatched descriptors become `Placed`, and unmatched old items
/// are queued as removals on `parent`'s effect list.
pub(crate) fn reconcile_children(
    wip: &mut FiberTree,
    committed: Option<&FiberTree>,
    parent: FiberId,
    elements: &[NodeDescriptor],
) {
    let mut old = first_alternate_child(wip, committed, parent);
    let mut prev: Option<FiberId> = None;
    let mut removals: SmallVec<[Effect; 4]> = SmallVec::new();
    let mut index = 0;

    wip[parent].child = None;

    while index < elements.len() || old.is_some() {
        let element = elements.get(index);
        let old_item = old.and_then(|id| Some((id, committed?.get(id)?)));

        let same_type = match (element, old_item) {
            (Some(element), Some((_, item))) => element.ty() == &item.ty,
            _ => false,
        };

        let new_item = match (element, old_item) {
            (Some(element), Some((old_id, item))) if same_type => Some(WorkItem::reuse(
                old_id,
                item,
                element.props().clone(),
                parent,
                Some(EditTag::Updated),
            )),
            (Some(element), _) => Some(WorkItem::placed(
                element.ty().clone(),
                element.props().clone(),
                parent,
            )),
            (None, _) => None,
        };

        if let Some((old_id, _)) = old_item
            && !same_type
        {
            removals.push(Effect::Removal(old_id));
        }

        old = old_item.and_then(|(_, item)| item.sibling);

        if let Some(item) = new_item {
            let id = wip.insert(item);
            match prev {
                None => wip[parent].child = Some(id),
                Some(p) => wip[p].sibling = Some(id),
            }
            prev = Some(id);
        }

        index += 1;
    }

    if !removals.is_empty() {
        log::trace!("reconcile: {} removal(s) under {:?}", removals.len(), parent);
    }
    wip[parent].effects.extend(removals);
}

/// Copies the alternate's child chain under `parent` untouched: same
/// handles, same props, no edit tags.
pub(crate) fn clone_child_fibers(
    wip: &mut FiberTree,
    committed: Option<&FiberTree>,
    parent: FiberId,
) {
    let mut old = first_alternate_child(wip, committed, parent);
    let mut prev: Option<FiberId> = None;

    wip[parent].child = None;

    while let Some((old_id, item)) = old.and_then(|id| Some((id, committed?.get(id)?))) {
        let id = wip.insert(WorkItem::reuse(
            old_id,
            item,
            item.props.clone(),
            parent,
            None,
        ));
        match prev {
            None => wip[parent].child = Some(id),
            Some(p) => wip[p].sibling = Some(id),
        }
        prev = Some(id);
        old = item.sibling;
    }
}

fn first_alternate_child(
    wip: &FiberTree,
    committed: Option<&FiberTree>,
    parent: FiberId,
) -> Option<FiberId> {
    let alternate = wip[parent].alternate?;
    committed?.get(alternate)?.child
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe;
    use crate::descriptor::{Config, Props, element, text};
    use crate::fiber::WorkKind;
    use crate::target::Handle;

    fn anchor(tree: &mut FiberTree, alternate: Option<FiberId>) -> FiberId {
        let root = tree.insert(WorkItem::anchor(Handle(1), Props::empty(), alternate));
        tree.set_root(root);
        root
    }

    fn committed_with(elements: &[NodeDescriptor]) -> FiberTree {
        let mut tree = FiberTree::new();
        let root = anchor(&mut tree, None);
        reconcile_children(&mut tree, None, root, elements);
        tree.settle();
        tree
    }

    fn tags(tree: &FiberTree, parent: FiberId) -> Vec<(String, Option<EditTag>)> {
        tree.children(parent)
            .map(|id| (tree[id].ty.label().to_string(), tree[id].tag))
            .collect()
    }

    fn div() -> NodeDescriptor {
        describe!("div", Config::new()).unwrap()
    }

    fn span() -> NodeDescriptor {
        describe!("span", Config::new()).unwrap()
    }

    #[test]
    fn first_render_places_everything() {
        let mut wip = FiberTree::new();
        let root = anchor(&mut wip, None);
        reconcile_children(&mut wip, None, root, &[div(), text("x")]);
        assert_eq!(
            tags(&wip, root),
            vec![
                ("div".to_string(), Some(EditTag::Placed)),
                ("#text".to_string(), Some(EditTag::Placed)),
            ]
        );
        assert!(wip[root].effects.is_empty());
    }

    #[test]
    fn same_type_at_position_is_updated_and_keeps_alternate() {
        let committed = committed_with(&[div(), span()]);
        let old_root = committed.root().unwrap();
        let old_children: Vec<_> = committed.children(old_root).collect();

        let mut wip = FiberTree::new();
        let root = anchor(&mut wip, Some(old_root));
        reconcile_children(&mut wip, Some(&committed), root, &[div(), span()]);

        let new_children: Vec<_> = wip.children(root).collect();
        assert_eq!(new_children.len(), 2);
        for (new, old) in new_children.iter().zip(&old_children) {
            assert_eq!(wip[*new].tag, Some(EditTag::Updated));
            assert_eq!(wip[*new].alternate, Some(*old));
            assert_eq!(wip[*new].parent, Some(root));
        }
    }

    #[test]
    fn swapped_positions_are_remove_plus_place() {
        let committed = committed_with(&[div(), span()]);
        let old_root = committed.root().unwrap();

        let mut wip = FiberTree::new();
        let root = anchor(&mut wip, Some(old_root));
        reconcile_children(&mut wip, Some(&committed), root, &[span(), div()]);

        assert_eq!(
            tags(&wip, root),
            vec![
                ("span".to_string(), Some(EditTag::Placed)),
                ("div".to_string(), Some(EditTag::Placed)),
            ]
        );
        let removals = wip[root]
            .effects
            .iter()
            .filter(|e| matches!(e, Effect::Removal(_)))
            .count();
        assert_eq!(removals, 2);
    }

    #[test]
    fn surplus_old_children_are_removed() {
        let committed = committed_with(&[div(), span(), text("tail")]);
        let old_root = committed.root().unwrap();
        let old_children: Vec<_> = committed.children(old_root).collect();

        let mut wip = FiberTree::new();
        let root = anchor(&mut wip, Some(old_root));
        reconcile_children(&mut wip, Some(&committed), root, &[div()]);

        assert_eq!(
            tags(&wip, root),
            vec![("div".to_string(), Some(EditTag::Updated))]
        );
        assert_eq!(
            wip[root].effects.as_slice(),
            &[
                Effect::Removal(old_children[1]),
                Effect::Removal(old_children[2])
            ]
        );
    }

    #[test]
    fn surplus_new_descriptors_are_placed() {
        let committed = committed_with(&[div()]);
        let old_root = committed.root().unwrap();

        let mut wip = FiberTree::new();
        let root = anchor(&mut wip, Some(old_root));
        reconcile_children(&mut wip, Some(&committed), root, &[div(), span(), span()]);

        let tags: Vec<_> = tags(&wip, root).into_iter().map(|(_, t)| t).collect();
        assert_eq!(
            tags,
            vec![
                Some(EditTag::Updated),
                Some(EditTag::Placed),
                Some(EditTag::Placed)
            ]
        );
        assert!(wip[root].effects.is_empty());
    }

    #[test]
    fn cloned_children_carry_no_tags() {
        let committed = committed_with(&[div(), text("a")]);
        let old_root = committed.root().unwrap();

        let mut wip = FiberTree::new();
        let root = anchor(&mut wip, Some(old_root));
        clone_child_fibers(&mut wip, Some(&committed), root);

        let kids: Vec<_> = wip.children(root).collect();
        assert_eq!(kids.len(), 2);
        assert!(kids.iter().all(|id| wip[*id].tag.is_none()));
        assert_eq!(wip[kids[1]].kind, WorkKind::Text);
        let first_old = committed.children(old_root).next().unwrap();
        assert!(wip[kids[0]].props.same(&committed[first_old].props));
    }

    #[test]
    fn element_helper_matches_describe_type() {
        assert_eq!(div().ty(), &element("div"));
    }
}
