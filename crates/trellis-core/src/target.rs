use thiserror::Error;

use crate::descriptor::{EventHandler, PropValue, Props};

/// Opaque reference to a node owned by the render target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostKind<'a> {
    Element(&'a str),
    Text,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("unknown handle {0:?}")]
    UnknownHandle(Handle),
    #[error("{child:?} is not a child of {parent:?}")]
    NotAChild { parent: Handle, child: Handle },
    #[error("target rejected `{op}` on {handle:?}")]
    Rejected { op: &'static str, handle: Handle },
}

/// The mutable sink that commit writes into.
///
/// Handles created during a walk stay detached until `insert_handle`; the
/// engine only calls the mutating methods from inside a commit.
pub trait RenderTarget {
    fn create_handle(&mut self, kind: HostKind<'_>, props: &Props) -> Result<Handle, TargetError>;

    /// Drops attributes and bindings present only in `old`, applies `new`.
    fn apply_property_diff(
        &mut self,
        handle: Handle,
        old: &Props,
        new: &Props,
    ) -> Result<(), TargetError>;

    /// Inserts `child` under `parent`, before `before` when given, else last.
    fn insert_handle(
        &mut self,
        parent: Handle,
        child: Handle,
        before: Option<Handle>,
    ) -> Result<(), TargetError>;

    fn remove_handle(&mut self, parent: Handle, child: Handle) -> Result<(), TargetError>;

    /// Frees a handle that was created but never attached, after the walk
    /// that created it was abandoned. Attached handles are left alone.
    fn release_handle(&mut self, _handle: Handle) {}
}

/// Property changes between two configurations, split the way targets apply
/// them. Handler changes are identity-based.
#[derive(Debug, Default)]
pub struct PropertyDiff<'a> {
    pub removed_attributes: Vec<&'a str>,
    pub set_attributes: Vec<(&'a str, &'a PropValue)>,
    pub removed_listeners: Vec<(String, &'a EventHandler)>,
    pub added_listeners: Vec<(String, &'a EventHandler)>,
}

impl PropertyDiff<'_> {
    pub fn is_empty(&self) -> bool {
        self.removed_attributes.is_empty()
            && self.set_attributes.is_empty()
            && self.removed_listeners.is_empty()
            && self.added_listeners.is_empty()
    }
}

pub fn diff_properties<'a>(old: &'a Props, new: &'a Props) -> PropertyDiff<'a> {
    let mut diff = PropertyDiff::default();

    for (key, _) in old.attributes() {
        if new.get(key).is_none() {
            diff.removed_attributes.push(key);
        }
    }
    for (key, value) in new.attributes() {
        if old.get(key) != Some(value) {
            diff.set_attributes.push((key, value));
        }
    }

    for (name, h) in old.events() {
        if !new.events().any(|(n, other)| n == name && other.same(h)) {
            diff.removed_listeners.push((name, h));
        }
    }
    for (name, h) in new.events() {
        if !old.events().any(|(n, other)| n == name && other.same(h)) {
            diff.added_listeners.push((name, h));
        }
    }

    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe;
    use crate::descriptor::{Config, EventHandler};

    fn props(config: Config) -> Props {
        describe!("div", config).unwrap().props().clone()
    }

    #[test]
    fn diff_sets_changed_and_removes_stale_attributes() {
        let old = props(Config::new().set("id", "a").set("title", "t"));
        let new = props(Config::new().set("id", "b").set("lang", "en"));
        let diff = diff_properties(&old, &new);
        assert_eq!(diff.removed_attributes, ["title"]);
        let set: Vec<_> = diff.set_attributes.iter().map(|(k, _)| *k).collect();
        assert_eq!(set, ["id", "lang"]);
    }

    #[test]
    fn identical_configuration_yields_empty_diff() {
        let h = EventHandler::new(|_| {});
        let old = props(Config::new().set("id", "a").set("onClick", h.clone()));
        let new = props(Config::new().set("id", "a").set("onClick", h));
        assert!(diff_properties(&old, &new).is_empty());
    }

    #[test]
    fn replaced_handler_is_rebound() {
        let old = props(Config::new().on("click", |_| {}));
        let new = props(Config::new().on("click", |_| {}));
        let diff = diff_properties(&old, &new);
        assert_eq!(diff.removed_listeners.len(), 1);
        assert_eq!(diff.added_listeners.len(), 1);
        assert_eq!(diff.added_listeners[0].0, "click");
    }
}
