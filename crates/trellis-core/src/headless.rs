//! In-memory render target and manual host, for tests, demos and tooling.
//!
//! [`MemoryTarget`] keeps a plain node tree, logs every mutation it receives
//! and can be told to reject operations. [`ManualHost`] only counts idle-time
//! requests; the caller decides when to hand out scheduling opportunities.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::fmt::Write as _;

use bitflags::bitflags;
use slotmap::{Key, KeyData, SlotMap};

use crate::descriptor::{Event, EventHandler, Props, TEXT_VALUE};
use crate::host::{Deadline, HostScheduler};
use crate::scheduler::{Scheduler, WorkStatus};
use crate::target::{Handle, HostKind, PropertyDiff, RenderTarget, TargetError, diff_properties};
use crate::{Error, Result};

slotmap::new_key_type! {
    struct NodeKey;
}

fn key(handle: Handle) -> NodeKey {
    NodeKey::from(KeyData::from_ffi(handle.0))
}

fn handle(key: NodeKey) -> Handle {
    Handle(key.data().as_ffi())
}

bitflags! {
    /// Target operations that should fail with `TargetError::Rejected`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FailOn: u8 {
        const CREATE = 1 << 0;
        const UPDATE = 1 << 1;
        const INSERT = 1 << 2;
        const REMOVE = 1 << 3;
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mutation {
    Create { handle: Handle, kind: String },
    SetAttribute { handle: Handle, name: String, value: String },
    RemoveAttribute { handle: Handle, name: String },
    AddListener { handle: Handle, event: String },
    RemoveListener { handle: Handle, event: String },
    Insert { parent: Handle, child: Handle, before: Option<Handle> },
    Remove { parent: Handle, child: Handle },
}

impl Mutation {
    /// Insertions and removals.
    pub fn is_structural(&self) -> bool {
        matches!(self, Mutation::Insert { .. } | Mutation::Remove { .. })
    }

    pub fn touches_attributes(&self) -> bool {
        matches!(
            self,
            Mutation::SetAttribute { .. } | Mutation::RemoveAttribute { .. }
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Element(String),
    Text,
}

#[derive(Debug)]
struct Node {
    kind: NodeKind,
    attributes: BTreeMap<String, String>,
    listeners: Vec<(String, EventHandler)>,
    children: Vec<Handle>,
    parent: Option<Handle>,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            attributes: BTreeMap::new(),
            listeners: Vec::new(),
            children: Vec::new(),
            parent: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryTarget {
    nodes: SlotMap<NodeKey, Node>,
    containers: Vec<Handle>,
    log: Vec<Mutation>,
    fail_on: FailOn,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a detached top-level element that trees can be rendered into.
    pub fn create_container(&mut self, tag: &str) -> Handle {
        let h = handle(self.nodes.insert(Node::new(NodeKind::Element(tag.to_string()))));
        self.containers.push(h);
        h
    }

    pub fn fail_on(&mut self, ops: FailOn) {
        self.fail_on = ops;
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.log
    }

    pub fn clear_mutations(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.log)
    }

    /// Every node the target holds, attached or not, containers included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, h: Handle) -> bool {
        self.nodes.contains_key(key(h))
    }

    pub fn kind(&self, h: Handle) -> Option<&NodeKind> {
        self.nodes.get(key(h)).map(|n| &n.kind)
    }

    pub fn parent_of(&self, h: Handle) -> Option<Handle> {
        self.nodes.get(key(h))?.parent
    }

    pub fn children_of(&self, h: Handle) -> Vec<Handle> {
        self.nodes
            .get(key(h))
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    pub fn attribute(&self, h: Handle, name: &str) -> Option<&str> {
        self.nodes.get(key(h))?.attributes.get(name).map(String::as_str)
    }

    pub fn listener_count(&self, h: Handle) -> usize {
        self.nodes.get(key(h)).map_or(0, |n| n.listeners.len())
    }

    /// Attached elements with tag `tag`, in document order.
    pub fn find_by_tag(&self, tag: &str) -> Vec<Handle> {
        let mut out = Vec::new();
        let mut stack: Vec<Handle> = self.containers.iter().rev().copied().collect();
        while let Some(h) = stack.pop() {
            let Some(node) = self.nodes.get(key(h)) else {
                continue;
            };
            if matches!(&node.kind, NodeKind::Element(t) if t == tag) {
                out.push(h);
            }
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// Calls every listener bound to `event` on `h`; returns how many ran.
    pub fn dispatch(&self, h: Handle, event: &str) -> Result<usize, TargetError> {
        let node = self.nodes.get(key(h)).ok_or(TargetError::UnknownHandle(h))?;
        let handlers: Vec<EventHandler> = node
            .listeners
            .iter()
            .filter(|(name, _)| name == event)
            .map(|(_, f)| f.clone())
            .collect();
        let payload = Event::new(event);
        for f in &handlers {
            f.call(&payload);
        }
        log::trace!("dispatched `{event}` on {h:?} to {} listener(s)", handlers.len());
        Ok(handlers.len())
    }

    /// Serializes `h` and its subtree. Attributes are sorted; listeners and
    /// the text key are left out.
    pub fn markup(&self, h: Handle) -> String {
        let mut out = String::new();
        self.write_markup(h, &mut out);
        out
    }

    /// Serialized children of `h`, without `h` itself.
    pub fn inner_markup(&self, h: Handle) -> String {
        let mut out = String::new();
        for child in self.children_of(h) {
            self.write_markup(child, &mut out);
        }
        out
    }

    fn write_markup(&self, h: Handle, out: &mut String) {
        let Some(node) = self.nodes.get(key(h)) else {
            return;
        };
        match &node.kind {
            NodeKind::Text => {
                out.push_str(node.attributes.get(TEXT_VALUE).map_or("", String::as_str));
            }
            NodeKind::Element(tag) => {
                let _ = write!(out, "<{tag}");
                for (name, value) in &node.attributes {
                    let _ = write!(out, " {name}=\"{value}\"");
                }
                out.push('>');
                for child in &node.children {
                    self.write_markup(*child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }

    fn check(&self, op: FailOn, name: &'static str, h: Handle) -> Result<(), TargetError> {
        if self.fail_on.contains(op) {
            return Err(TargetError::Rejected { op: name, handle: h });
        }
        Ok(())
    }

    fn node_mut(&mut self, h: Handle) -> Result<&mut Node, TargetError> {
        self.nodes.get_mut(key(h)).ok_or(TargetError::UnknownHandle(h))
    }

    fn drop_subtree(&mut self, h: Handle) {
        if let Some(node) = self.nodes.remove(key(h)) {
            for child in node.children {
                self.drop_subtree(child);
            }
        }
    }

    fn apply(&mut self, h: Handle, diff: PropertyDiff<'_>) -> Result<(), TargetError> {
        let node = self.nodes.get_mut(key(h)).ok_or(TargetError::UnknownHandle(h))?;
        for name in diff.removed_attributes {
            node.attributes.remove(name);
            self.log.push(Mutation::RemoveAttribute {
                handle: h,
                name: name.to_string(),
            });
        }
        for (name, value) in diff.set_attributes {
            let value = value.as_text().unwrap_or_default();
            node.attributes.insert(name.to_string(), value.clone());
            self.log.push(Mutation::SetAttribute {
                handle: h,
                name: name.to_string(),
                value,
            });
        }
        for (event, f) in diff.removed_listeners {
            node.listeners.retain(|(n, g)| !(n == &event && g.same(f)));
            self.log.push(Mutation::RemoveListener { handle: h, event });
        }
        for (event, f) in diff.added_listeners {
            node.listeners.push((event.clone(), f.clone()));
            self.log.push(Mutation::AddListener { handle: h, event });
        }
        Ok(())
    }
}

impl RenderTarget for MemoryTarget {
    fn create_handle(
        &mut self,
        kind: HostKind<'_>,
        props: &Props,
    ) -> Result<Handle, TargetError> {
        self.check(FailOn::CREATE, "create", Handle(0))?;
        let kind = match kind {
            HostKind::Element(tag) => NodeKind::Element(tag.to_string()),
            HostKind::Text => NodeKind::Text,
        };
        let mut node = Node::new(kind.clone());
        for (name, value) in props.attributes() {
            node.attributes
                .insert(name.to_string(), value.as_text().unwrap_or_default());
        }
        for (event, f) in props.events() {
            node.listeners.push((event, f.clone()));
        }
        let h = handle(self.nodes.insert(node));
        self.log.push(Mutation::Create {
            handle: h,
            kind: match kind {
                NodeKind::Element(tag) => tag,
                NodeKind::Text => "#text".to_string(),
            },
        });
        Ok(h)
    }

    fn apply_property_diff(
        &mut self,
        h: Handle,
        old: &Props,
        new: &Props,
    ) -> Result<(), TargetError> {
        self.check(FailOn::UPDATE, "update", h)?;
        let diff = diff_properties(old, new);
        if diff.is_empty() {
            return Ok(());
        }
        self.apply(h, diff)
    }

    fn insert_handle(
        &mut self,
        parent: Handle,
        child: Handle,
        before: Option<Handle>,
    ) -> Result<(), TargetError> {
        self.check(FailOn::INSERT, "insert", child)?;
        if !self.contains(child) {
            return Err(TargetError::UnknownHandle(child));
        }
        if let Some(previous) = self.node_mut(child)?.parent.take()
            && let Some(old_parent) = self.nodes.get_mut(key(previous))
        {
            old_parent.children.retain(|c| *c != child);
        }

        let siblings = &mut self.node_mut(parent)?.children;
        let index = match before {
            Some(anchor) => siblings
                .iter()
                .position(|c| *c == anchor)
                .ok_or(TargetError::NotAChild {
                    parent,
                    child: anchor,
                })?,
            None => siblings.len(),
        };
        siblings.insert(index, child);
        self.node_mut(child)?.parent = Some(parent);
        self.log.push(Mutation::Insert {
            parent,
            child,
            before,
        });
        Ok(())
    }

    fn remove_handle(&mut self, parent: Handle, child: Handle) -> Result<(), TargetError> {
        self.check(FailOn::REMOVE, "remove", child)?;
        let siblings = &mut self.node_mut(parent)?.children;
        let index = siblings
            .iter()
            .position(|c| *c == child)
            .ok_or(TargetError::NotAChild { parent, child })?;
        siblings.remove(index);
        self.drop_subtree(child);
        self.log.push(Mutation::Remove { parent, child });
        Ok(())
    }

    fn release_handle(&mut self, h: Handle) {
        let detached = self
            .nodes
            .get(key(h))
            .is_some_and(|node| node.parent.is_none());
        if detached && !self.containers.contains(&h) {
            log::trace!("releasing detached {h:?}");
            self.drop_subtree(h);
        }
    }
}

/// Host that records idle-time requests instead of acting on them.
#[derive(Debug, Default)]
pub struct ManualHost {
    requests: Cell<usize>,
}

impl ManualHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> usize {
        self.requests.get()
    }

    /// Returns the outstanding request count and resets it.
    pub fn take_requests(&self) -> usize {
        self.requests.replace(0)
    }
}

impl HostScheduler for ManualHost {
    fn request_idle_time(&self) {
        self.requests.set(self.requests.get() + 1);
    }
}

const MAX_STEPS: usize = 10_000;

/// Grants a scheduling opportunity, with a fresh deadline from `deadline`,
/// for as long as the scheduler keeps asking. Returns how many were granted.
pub fn run_until_idle<T, D>(
    scheduler: &mut Scheduler<T>,
    host: &ManualHost,
    mut deadline: impl FnMut() -> D,
) -> Result<usize>
where
    T: RenderTarget,
    D: Deadline,
{
    let mut steps = 0;
    while host.take_requests() > 0 {
        if steps == MAX_STEPS {
            return Err(Error::Corrupt("scheduler kept requesting idle time"));
        }
        steps += 1;
        if scheduler.perform_work(&deadline())? == WorkStatus::Idle {
            host.take_requests();
            break;
        }
    }
    Ok(steps)
}
