//! Applying a finished effect list to the render target.
//!
//! Commit runs start to finish inside one scheduling step. The first target
//! failure aborts the rest of the list; nothing already applied is undone.

use crate::fiber::{EditTag, Effect, FiberId, FiberTree, WorkKind};
use crate::target::{Handle, RenderTarget};
use crate::{Error, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitEntry {
    pub tag: EditTag,
    pub kind: WorkKind,
    pub label: String,
}

/// What one commit did, in application order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub entries: Vec<CommitEntry>,
    /// Calls into the render target that changed something.
    pub mutations: usize,
    /// Scheduling opportunities the walk spanned.
    pub slices: u32,
    /// Work items visited by the walk.
    pub units: usize,
}

impl CommitReport {
    pub fn count(&self, tag: EditTag) -> usize {
        self.entries.iter().filter(|e| e.tag == tag).count()
    }

    pub fn tags(&self) -> Vec<EditTag> {
        self.entries.iter().map(|e| e.tag).collect()
    }

    /// `(tag, label)` pairs, handy for assertions.
    pub fn summary(&self) -> Vec<(EditTag, &str)> {
        self.entries
            .iter()
            .map(|e| (e.tag, e.label.as_str()))
            .collect()
    }
}

/// Applies the effect list of `root` in order. On failure `report` still
/// counts the mutations that landed before it.
pub(crate) fn commit_all_work<T: RenderTarget + ?Sized>(
    target: &mut T,
    wip: &FiberTree,
    committed: Option<&FiberTree>,
    root: FiberId,
    report: &mut CommitReport,
) -> Result<()> {
    for effect in wip[root].effects.iter() {
        commit_work(target, wip, committed, *effect, report)?;
    }
    Ok(())
}

fn commit_work<T: RenderTarget + ?Sized>(
    target: &mut T,
    wip: &FiberTree,
    committed: Option<&FiberTree>,
    effect: Effect,
    report: &mut CommitReport,
) -> Result<()> {
    match effect {
        Effect::Work(id) => {
            let item = &wip[id];
            let Some(tag) = item.tag else {
                return Ok(());
            };
            if item.kind == WorkKind::RootAnchor {
                return Ok(());
            }
            report.entries.push(CommitEntry {
                tag,
                kind: item.kind,
                label: label(wip, id),
            });

            match tag {
                EditTag::Placed if item.kind.is_structural() => {
                    let handle = item
                        .handle()
                        .ok_or(Error::Corrupt("placed item without handle"))?;
                    let parent = host_parent(wip, id)?;
                    let before = next_host_sibling(wip, id);
                    target.insert_handle(parent, handle, before)?;
                    report.mutations += 1;
                }
                EditTag::Updated if item.kind.is_structural() => {
                    let handle = item
                        .handle()
                        .ok_or(Error::Corrupt("updated item without handle"))?;
                    let old = item
                        .alternate
                        .and_then(|alt| committed?.get(alt))
                        .ok_or(Error::Corrupt("updated item without alternate"))?;
                    if !old.props.same(&item.props) {
                        target.apply_property_diff(handle, &old.props, &item.props)?;
                        report.mutations += 1;
                    }
                }
                _ => {}
            }
        }
        Effect::Removal(id) => {
            let tree = committed.ok_or(Error::Corrupt("removal without committed tree"))?;
            report.entries.push(CommitEntry {
                tag: EditTag::Removed,
                kind: tree[id].kind,
                label: label(tree, id),
            });
            let parent = host_parent(tree, id)?;
            commit_deletion(target, tree, id, parent, report)?;
        }
    }
    Ok(())
}

/// Removes the handles a retired subtree contributed to `parent`. Component
/// items own no handle, so their children are removed instead. Every
/// instance in the subtree is unmounted.
fn commit_deletion<T: RenderTarget + ?Sized>(
    target: &mut T,
    tree: &FiberTree,
    id: FiberId,
    parent: Handle,
    report: &mut CommitReport,
) -> Result<()> {
    let item = &tree[id];
    match item.kind {
        WorkKind::HostNode | WorkKind::Text => {
            let handle = item.handle().ok_or(Error::Corrupt("removed item without handle"))?;
            target.remove_handle(parent, handle)?;
            report.mutations += 1;
            unmount_instances(tree, id);
        }
        WorkKind::StatefulComponent => {
            if let Some(instance) = item.instance() {
                instance.unmount();
            }
            for child in tree.children(id) {
                commit_deletion(target, tree, child, parent, report)?;
            }
        }
        WorkKind::RootAnchor => return Err(Error::Corrupt("root anchor cannot be removed")),
    }
    Ok(())
}

fn unmount_instances(tree: &FiberTree, id: FiberId) {
    for child in tree.children(id) {
        if let Some(instance) = tree[child].instance() {
            instance.unmount();
        }
        unmount_instances(tree, child);
    }
}

/// Handle of the nearest ancestor that owns one; components are skipped.
fn host_parent(tree: &FiberTree, id: FiberId) -> Result<Handle> {
    let mut node = tree[id].parent;
    while let Some(parent) = node {
        let item = &tree[parent];
        if item.kind != WorkKind::StatefulComponent {
            return item
                .handle()
                .ok_or(Error::Corrupt("structural ancestor without handle"));
        }
        node = item.parent;
    }
    Err(Error::Corrupt("item has no structural ancestor"))
}

/// First handle after `id` under the same host parent that is already in the
/// target. Placed siblings are inserted later in the list, so they are
/// skipped.
fn next_host_sibling(tree: &FiberTree, id: FiberId) -> Option<Handle> {
    let mut node = id;
    loop {
        while tree[node].sibling.is_none() {
            let parent = tree[node].parent?;
            if tree[parent].kind != WorkKind::StatefulComponent {
                return None;
            }
            node = parent;
        }
        node = tree[node].sibling?;
        if let Some(handle) = first_mounted_handle(tree, node) {
            return Some(handle);
        }
    }
}

fn first_mounted_handle(tree: &FiberTree, id: FiberId) -> Option<Handle> {
    let item = &tree[id];
    if item.tag == Some(EditTag::Placed) {
        return None;
    }
    match item.kind {
        WorkKind::HostNode | WorkKind::Text => item.handle(),
        WorkKind::StatefulComponent => tree
            .children(id)
            .find_map(|child| first_mounted_handle(tree, child)),
        WorkKind::RootAnchor => None,
    }
}

fn label(tree: &FiberTree, id: FiberId) -> String {
    let item = &tree[id];
    match item.kind {
        WorkKind::Text => match item.props.get(crate::descriptor::TEXT_VALUE) {
            Some(value) => format!("#text({})", value.as_text().unwrap_or_default()),
            None => "#text".to_string(),
        },
        _ => item.ty.label().to_string(),
    }
}
