use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::component::{Component, ComponentType};
use crate::{Error, Result};

/// Configuration key holding the text of a `Text` descriptor.
pub const TEXT_VALUE: &str = "nodeValue";

/// Payload handed to event handlers by the render target.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    /// Lower-case event name, e.g. `click` for an `onClick` binding.
    pub name: String,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Event binding. Equality is identity: two handlers are the same only if
/// they share the closure allocation.
#[derive(Clone)]
pub struct EventHandler(Rc<dyn Fn(&Event)>);

impl EventHandler {
    pub fn new(f: impl Fn(&Event) + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, event: &Event) {
        (self.0)(event)
    }

    pub fn same(&self, other: &EventHandler) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<handler>")
    }
}

#[derive(Clone, Debug)]
pub enum PropValue {
    Str(Rc<str>),
    Int(i64),
    Float(f64),
    Bool(bool),
    Handler(EventHandler),
}

impl PropValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            PropValue::Str(_) => "string",
            PropValue::Int(_) => "integer",
            PropValue::Float(_) => "float",
            PropValue::Bool(_) => "bool",
            PropValue::Handler(_) => "event handler",
        }
    }

    /// Text form of a primitive value; handlers have none.
    pub fn as_text(&self) -> Option<String> {
        match self {
            PropValue::Str(s) => Some(s.to_string()),
            PropValue::Int(i) => Some(i.to_string()),
            PropValue::Float(v) => Some(v.to_string()),
            PropValue::Bool(b) => Some(b.to_string()),
            PropValue::Handler(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_handler(&self) -> Option<&EventHandler> {
        match self {
            PropValue::Handler(h) => Some(h),
            _ => None,
        }
    }
}

impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PropValue::Str(a), PropValue::Str(b)) => a == b,
            (PropValue::Int(a), PropValue::Int(b)) => a == b,
            (PropValue::Float(a), PropValue::Float(b)) => a == b,
            (PropValue::Bool(a), PropValue::Bool(b)) => a == b,
            (PropValue::Handler(a), PropValue::Handler(b)) => a.same(b),
            _ => false,
        }
    }
}

impl From<&str> for PropValue {
    fn from(v: &str) -> Self {
        PropValue::Str(Rc::from(v))
    }
}

impl From<String> for PropValue {
    fn from(v: String) -> Self {
        PropValue::Str(Rc::from(v))
    }
}

impl From<i64> for PropValue {
    fn from(v: i64) -> Self {
        PropValue::Int(v)
    }
}

impl From<i32> for PropValue {
    fn from(v: i32) -> Self {
        PropValue::Int(v as i64)
    }
}

impl From<f64> for PropValue {
    fn from(v: f64) -> Self {
        PropValue::Float(v)
    }
}

impl From<bool> for PropValue {
    fn from(v: bool) -> Self {
        PropValue::Bool(v)
    }
}

impl From<EventHandler> for PropValue {
    fn from(v: EventHandler) -> Self {
        PropValue::Handler(v)
    }
}

/// Shorthand for an event-binding value.
pub fn handler(f: impl Fn(&Event) + 'static) -> PropValue {
    PropValue::Handler(EventHandler::new(f))
}

/// Returns the event name for keys following the `on<Event>` convention.
pub fn event_name(key: &str) -> Option<String> {
    key.strip_prefix("on")
        .filter(|rest| !rest.is_empty())
        .map(|rest| rest.to_lowercase())
}

/// Type tag of a descriptor. Reconciliation treats two positions as the same
/// node only when their types compare equal.
#[derive(Clone, Debug, PartialEq)]
pub enum DescriptorType {
    Text,
    Host(Rc<str>),
    Component(ComponentType),
}

impl DescriptorType {
    pub fn label(&self) -> &str {
        match self {
            DescriptorType::Text => "#text",
            DescriptorType::Host(tag) => tag,
            DescriptorType::Component(ty) => ty.name(),
        }
    }
}

impl fmt::Display for DescriptorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<&str> for DescriptorType {
    fn from(tag: &str) -> Self {
        DescriptorType::Host(Rc::from(tag))
    }
}

impl From<ComponentType> for DescriptorType {
    fn from(ty: ComponentType) -> Self {
        DescriptorType::Component(ty)
    }
}

pub fn element(tag: &str) -> DescriptorType {
    DescriptorType::from(tag)
}

pub fn component<C: Component>() -> DescriptorType {
    DescriptorType::Component(ComponentType::of::<C>())
}

/// Builder for a descriptor's configuration mapping.
#[derive(Clone, Debug, Default)]
pub struct Config {
    values: BTreeMap<String, PropValue>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Binds `f` under `on<Event>`; `on("click", ..)` stores `onClick`.
    pub fn on(self, event: &str, f: impl Fn(&Event) + 'static) -> Self {
        let mut chars = event.chars();
        let key = match chars.next() {
            Some(first) => format!("on{}{}", first.to_uppercase(), chars.as_str()),
            None => "on".to_string(),
        };
        self.set(key, handler(f))
    }
}

/// Immutable, shared configuration of a descriptor: attributes, event
/// bindings and the normalized child descriptors.
///
/// Cloning is cheap and keeps identity; [`Props::same`] is the referential
/// check used to skip unchanged subtrees.
#[derive(Clone)]
pub struct Props(Rc<PropsInner>);

struct PropsInner {
    values: BTreeMap<String, PropValue>,
    children: Vec<NodeDescriptor>,
}

impl Props {
    pub fn new(values: BTreeMap<String, PropValue>, children: Vec<NodeDescriptor>) -> Self {
        Props(Rc::new(PropsInner { values, children }))
    }

    pub fn empty() -> Self {
        Self::new(BTreeMap::new(), Vec::new())
    }

    pub fn with_children(children: Vec<NodeDescriptor>) -> Self {
        Self::new(BTreeMap::new(), children)
    }

    pub fn same(&self, other: &Props) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.0.values.get(key)
    }

    pub fn children(&self) -> &[NodeDescriptor] {
        &self.0.children
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.0.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Entries applied as plain target properties.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.iter().filter(|(k, _)| event_name(k).is_none())
    }

    /// `(event name, handler)` pairs for every `on<Event>` key holding a handler.
    pub fn events(&self) -> impl Iterator<Item = (String, &EventHandler)> {
        self.iter().filter_map(|(k, v)| Some((event_name(k)?, v.as_handler()?)))
    }
}

impl Default for Props {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Props")
            .field("values", &self.0.values)
            .field("children", &self.0.children.len())
            .finish()
    }
}

/// Declarative description of one desired node and its children.
#[derive(Clone, Debug)]
pub struct NodeDescriptor {
    ty: DescriptorType,
    props: Props,
}

impl NodeDescriptor {
    pub fn ty(&self) -> &DescriptorType {
        &self.ty
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn children(&self) -> &[NodeDescriptor] {
        self.props.children()
    }

    pub fn text_value(&self) -> Option<&str> {
        match self.ty {
            DescriptorType::Text => self.props.get(TEXT_VALUE).and_then(PropValue::as_str),
            _ => None,
        }
    }
}

/// A value in child position before normalization.
#[derive(Clone, Debug)]
pub enum Child {
    Node(NodeDescriptor),
    Value(PropValue),
    /// Dropped during normalization (conditional rendering).
    Empty,
}

impl From<NodeDescriptor> for Child {
    fn from(v: NodeDescriptor) -> Self {
        Child::Node(v)
    }
}

impl From<PropValue> for Child {
    fn from(v: PropValue) -> Self {
        Child::Value(v)
    }
}

impl From<&str> for Child {
    fn from(v: &str) -> Self {
        Child::Value(v.into())
    }
}

impl From<String> for Child {
    fn from(v: String) -> Self {
        Child::Value(v.into())
    }
}

impl From<i64> for Child {
    fn from(v: i64) -> Self {
        Child::Value(v.into())
    }
}

impl From<i32> for Child {
    fn from(v: i32) -> Self {
        Child::Value(v.into())
    }
}

impl From<f64> for Child {
    fn from(v: f64) -> Self {
        Child::Value(v.into())
    }
}

impl From<bool> for Child {
    fn from(v: bool) -> Self {
        if v { Child::Value(v.into()) } else { Child::Empty }
    }
}

impl<T: Into<Child>> From<Option<T>> for Child {
    fn from(v: Option<T>) -> Self {
        v.map_or(Child::Empty, Into::into)
    }
}

/// Builds a `Text` descriptor holding `value`.
pub fn text(value: impl Into<String>) -> NodeDescriptor {
    let mut values = BTreeMap::new();
    values.insert(TEXT_VALUE.to_string(), PropValue::from(value.into()));
    NodeDescriptor {
        ty: DescriptorType::Text,
        props: Props::new(values, Vec::new()),
    }
}

/// Builds a descriptor from a type, a configuration and child values.
///
/// Primitive children are coerced to `Text` descriptors; `Child::Empty` and
/// `false` are dropped. Other falsy values such as `0`, `""` and `NaN` are
/// kept and become text. A handler in child position is a construction error.
pub fn describe(
    kind: impl Into<DescriptorType>,
    config: Config,
    children: impl IntoIterator<Item = Child>,
) -> Result<NodeDescriptor> {
    let mut values = config.values;
    if values.remove("children").is_some() {
        log::warn!("describe: `children` in configuration is ignored; pass children explicitly");
    }

    let mut normalized = Vec::new();
    for (index, child) in children.into_iter().enumerate() {
        match child {
            Child::Node(node) => normalized.push(node),
            Child::Empty | Child::Value(PropValue::Bool(false)) => {}
            Child::Value(value) => match value.as_text() {
                Some(s) => normalized.push(text(s)),
                None => {
                    return Err(Error::MalformedChild {
                        index,
                        found: value.type_name(),
                    });
                }
            },
        }
    }

    Ok(NodeDescriptor {
        ty: kind.into(),
        props: Props::new(values, normalized),
    })
}

/// `describe!(kind, config, child, ...)` converts each child with `Child::from`.
#[macro_export]
macro_rules! describe {
    ($kind:expr, $config:expr $(, $child:expr)* $(,)?) => {
        $crate::descriptor::describe(
            $kind,
            $config,
            ::std::vec::Vec::<$crate::descriptor::Child>::from([
                $($crate::descriptor::Child::from($child)),*
            ]),
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_children_become_text() {
        let node = describe!("p", Config::new(), "count: ", 3, 1.5, true).unwrap();
        let texts: Vec<_> = node.children().iter().filter_map(|c| c.text_value()).collect();
        assert_eq!(texts, ["count: ", "3", "1.5", "true"]);
        assert!(node.children().iter().all(|c| c.ty() == &DescriptorType::Text));
    }

    #[test]
    fn empty_and_false_children_are_dropped() {
        let shown: Option<&str> = None;
        let node = describe!("ul", Config::new(), false, shown, Child::Empty, "x").unwrap();
        assert_eq!(node.children().len(), 1);
    }

    #[test]
    fn handler_in_child_position_is_malformed() {
        let err = describe!("div", Config::new(), "ok", handler(|_| {})).unwrap_err();
        match err {
            Error::MalformedChild { index, found } => {
                assert_eq!(index, 1);
                assert_eq!(found, "event handler");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn config_splits_attributes_and_events() {
        let node = describe!(
            "button",
            Config::new().set("id", "like").on("click", |_| {}),
            "Like"
        )
        .unwrap();
        let attrs: Vec<_> = node.props().attributes().map(|(k, _)| k).collect();
        let events: Vec<_> = node.props().events().map(|(name, _)| name).collect();
        assert_eq!(attrs, ["id"]);
        assert_eq!(events, ["click"]);
        assert!(node.props().get("onClick").is_some());
    }

    #[test]
    fn children_key_in_config_is_ignored() {
        let node = describe!("div", Config::new().set("children", "nope")).unwrap();
        assert!(node.props().get("children").is_none());
        assert!(node.children().is_empty());
    }

    #[test]
    fn handler_equality_is_identity() {
        let a = EventHandler::new(|_| {});
        let b = EventHandler::new(|_| {});
        assert_eq!(PropValue::Handler(a.clone()), PropValue::Handler(a.clone()));
        assert_ne!(PropValue::Handler(a), PropValue::Handler(b));
    }

    #[test]
    fn event_name_convention() {
        assert_eq!(event_name("onClick").as_deref(), Some("click"));
        assert_eq!(event_name("onMouseMove").as_deref(), Some("mousemove"));
        assert_eq!(event_name("on"), None);
        assert_eq!(event_name("title"), None);
    }
}
