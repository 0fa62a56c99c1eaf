//! Work items and the arena that owns one walk's tree of them.
//!
//! `parent`, `alternate` and the child/sibling links are arena keys. The
//! `alternate` key of an item always addresses the previously committed
//! tree, never the arena the item itself lives in.

use std::ops::{Index, IndexMut};
use std::rc::Rc;

use slotmap::SlotMap;
use smallvec::SmallVec;

use crate::component::{Instance, State};
use crate::descriptor::{DescriptorType, Props};
use crate::target::Handle;

slotmap::new_key_type! {
    pub struct FiberId;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkKind {
    RootAnchor,
    HostNode,
    StatefulComponent,
    Text,
}

impl WorkKind {
    pub fn of(ty: &DescriptorType) -> Self {
        match ty {
            DescriptorType::Text => WorkKind::Text,
            DescriptorType::Host(_) => WorkKind::HostNode,
            DescriptorType::Component(_) => WorkKind::StatefulComponent,
        }
    }

    /// Kinds that own a render-target handle.
    pub fn is_structural(self) -> bool {
        matches!(self, WorkKind::HostNode | WorkKind::Text)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditTag {
    Placed,
    Updated,
    Removed,
}

/// What a work item holds on the outside: a target handle (anchor, host and
/// text items) or a component instance.
#[derive(Clone, Debug, Default)]
pub enum StateNode {
    #[default]
    None,
    Host(Handle),
    Instance(Rc<Instance>),
}

/// Entry of an effect list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Tagged item of the work-in-progress tree.
    Work(FiberId),
    /// Item of the committed tree that has no counterpart any more.
    Removal(FiberId),
}

#[derive(Debug)]
pub struct WorkItem {
    pub kind: WorkKind,
    pub ty: DescriptorType,
    pub props: Props,
    pub state_node: StateNode,
    pub parent: Option<FiberId>,
    pub child: Option<FiberId>,
    pub sibling: Option<FiberId>,
    pub alternate: Option<FiberId>,
    pub pending_state: Option<State>,
    pub tag: Option<EditTag>,
    pub effects: SmallVec<[Effect; 4]>,
}

impl WorkItem {
    pub(crate) fn anchor(container: Handle, props: Props, alternate: Option<FiberId>) -> Self {
        Self {
            kind: WorkKind::RootAnchor,
            ty: DescriptorType::from("#root"),
            props,
            state_node: StateNode::Host(container),
            parent: None,
            child: None,
            sibling: None,
            alternate,
            pending_state: None,
            tag: None,
            effects: SmallVec::new(),
        }
    }

    pub(crate) fn placed(ty: DescriptorType, props: Props, parent: FiberId) -> Self {
        Self {
            kind: WorkKind::of(&ty),
            ty,
            props,
            state_node: StateNode::None,
            parent: Some(parent),
            child: None,
            sibling: None,
            alternate: None,
            pending_state: None,
            tag: Some(EditTag::Placed),
            effects: SmallVec::new(),
        }
    }

    /// New item for the same position as `old`, keeping its external handle.
    pub(crate) fn reuse(
        old_id: FiberId,
        old: &WorkItem,
        props: Props,
        parent: FiberId,
        tag: Option<EditTag>,
    ) -> Self {
        Self {
            kind: old.kind,
            ty: old.ty.clone(),
            props,
            state_node: old.state_node.clone(),
            parent: Some(parent),
            child: None,
            sibling: None,
            alternate: Some(old_id),
            pending_state: None,
            tag,
            effects: SmallVec::new(),
        }
    }

    pub fn handle(&self) -> Option<Handle> {
        match self.state_node {
            StateNode::Host(h) => Some(h),
            _ => None,
        }
    }

    pub fn instance(&self) -> Option<&Rc<Instance>> {
        match &self.state_node {
            StateNode::Instance(i) => Some(i),
            _ => None,
        }
    }
}

/// Arena holding every work item of one tree.
#[derive(Debug, Default)]
pub struct FiberTree {
    items: SlotMap<FiberId, WorkItem>,
    root: Option<FiberId>,
}

impl FiberTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, item: WorkItem) -> FiberId {
        self.items.insert(item)
    }

    pub(crate) fn set_root(&mut self, root: FiberId) {
        self.root = Some(root);
    }

    pub fn root(&self) -> Option<FiberId> {
        self.root
    }

    pub fn get(&self, id: FiberId) -> Option<&WorkItem> {
        self.items.get(id)
    }

    pub fn contains(&self, id: FiberId) -> bool {
        self.items.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn children(&self, id: FiberId) -> Children<'_> {
        Children {
            tree: self,
            next: self.get(id).and_then(|item| item.child),
        }
    }

    /// Climbs `parent` links to the topmost item.
    pub fn root_of(&self, id: FiberId) -> Option<FiberId> {
        let mut node = id;
        loop {
            match self.get(node)?.parent {
                Some(parent) => node = parent,
                None => return Some(node),
            }
        }
    }

    /// Pre-order list of the items reachable from the root.
    pub fn preorder(&self) -> Vec<FiberId> {
        let mut out = Vec::with_capacity(self.len());
        let mut stack: Vec<FiberId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            let mut kids: SmallVec<[FiberId; 8]> = self.children(id).collect();
            kids.reverse();
            stack.extend(kids);
        }
        out
    }

    /// Drops edit tags, effect lists and leftover pending state so the tree
    /// can serve as a committed baseline.
    pub(crate) fn settle(&mut self) {
        for item in self.items.values_mut() {
            item.tag = None;
            item.effects.clear();
            item.pending_state = None;
        }
    }
}

impl Index<FiberId> for FiberTree {
    type Output = WorkItem;

    fn index(&self, id: FiberId) -> &WorkItem {
        &self.items[id]
    }
}

impl IndexMut<FiberId> for FiberTree {
    fn index_mut(&mut self, id: FiberId) -> &mut WorkItem {
        &mut self.items[id]
    }
}

pub struct Children<'a> {
    tree: &'a FiberTree,
    next: Option<FiberId>,
}

impl Iterator for Children<'_> {
    type Item = FiberId;

    fn next(&mut self) -> Option<FiberId> {
        let id = self.next?;
        self.next = self.tree.get(id).and_then(|item| item.sibling);
        Some(id)
    }
}
