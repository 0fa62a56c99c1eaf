//! Stateful components.
//!
//! A component turns its props and state into child descriptors. Its
//! instance lives across walks, bound to the work item at its tree position;
//! state changes go through an [`Updater`] and are never applied
//! synchronously.

use std::any::TypeId;
use std::cell::{Cell, Ref, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::descriptor::{NodeDescriptor, PropValue, Props};
use crate::fiber::FiberId;
use crate::scheduler::{Update, UpdateQueue};
use crate::target::Handle;
use crate::{Error, Result};

pub trait Component: 'static {
    fn create(props: &Props) -> Self
    where
        Self: Sized;

    fn initial_state(&self, _props: &Props) -> State {
        State::new()
    }

    fn render(&self, cx: &RenderCx<'_>) -> Result<Vec<NodeDescriptor>>;
}

fn construct<C: Component>(props: &Props) -> Box<dyn Component> {
    Box::new(C::create(props))
}

/// Descriptor type of a component; two types are equal iff they name the
/// same Rust type.
#[derive(Clone, Copy)]
pub struct ComponentType {
    id: TypeId,
    name: &'static str,
    construct: fn(&Props) -> Box<dyn Component>,
}

impl ComponentType {
    pub fn of<C: Component>() -> Self {
        let full = std::any::type_name::<C>();
        Self {
            id: TypeId::of::<C>(),
            name: full.rsplit("::").next().unwrap_or(full),
            construct: construct::<C>,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ComponentType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentType({})", self.name)
    }
}

/// Component state; partial states merge shallowly, key by key.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct State(BTreeMap<String, PropValue>);

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<PropValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.0.get(key)
    }

    pub fn bool(&self, key: &str) -> bool {
        self.get(key).and_then(PropValue::as_bool).unwrap_or(false)
    }

    pub fn int(&self, key: &str) -> i64 {
        self.get(key).and_then(PropValue::as_int).unwrap_or(0)
    }

    pub fn merge(&mut self, partial: State) {
        self.0.extend(partial.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    /// Constructed during a walk that has not committed yet.
    Uninstantiated,
    Mounted,
    /// Re-rendered in a walk that has not committed yet.
    Updating,
    Unmounted,
}

pub struct Instance {
    ty: ComponentType,
    component: Box<dyn Component>,
    props: RefCell<Props>,
    state: RefCell<State>,
    fiber: Cell<Option<FiberId>>,
    /// Committed props and state, kept while a walk re-renders the instance.
    stash: RefCell<Option<(Props, State)>>,
    container: Handle,
    lifecycle: Cell<Lifecycle>,
    queue: UpdateQueue,
}

impl Instance {
    pub(crate) fn create(
        ty: ComponentType,
        props: &Props,
        container: Handle,
        queue: UpdateQueue,
    ) -> Rc<Self> {
        let component = (ty.construct)(props);
        let state = component.initial_state(props);
        log::debug!("instantiating component `{}`", ty.name());
        Rc::new(Self {
            ty,
            component,
            props: RefCell::new(props.clone()),
            state: RefCell::new(state),
            fiber: Cell::new(None),
            stash: RefCell::new(None),
            container,
            lifecycle: Cell::new(Lifecycle::Uninstantiated),
            queue,
        })
    }

    pub fn name(&self) -> &'static str {
        self.ty.name()
    }

    pub fn props(&self) -> Props {
        self.props.borrow().clone()
    }

    pub fn state(&self) -> Ref<'_, State> {
        self.state.borrow()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.get()
    }

    pub fn container(&self) -> Handle {
        self.container
    }

    pub(crate) fn fiber(&self) -> Option<FiberId> {
        self.fiber.get()
    }

    /// Points the instance at its work item in the freshly committed tree.
    pub(crate) fn bind(&self, fiber: FiberId) {
        self.stash.take();
        self.fiber.set(Some(fiber));
        self.lifecycle.set(Lifecycle::Mounted);
    }

    pub(crate) fn unmount(&self) {
        log::debug!("unmounting component `{}`", self.name());
        self.stash.take();
        self.fiber.set(None);
        self.lifecycle.set(Lifecycle::Unmounted);
    }

    /// Puts back the committed props and state after an abandoned walk.
    pub(crate) fn restore(&self) {
        if self.lifecycle.get() != Lifecycle::Updating {
            return;
        }
        if let Some((props, state)) = self.stash.take() {
            *self.props.borrow_mut() = props;
            *self.state.borrow_mut() = state;
        }
        self.lifecycle.set(Lifecycle::Mounted);
    }

    /// Installs new props and merges the pending partial state. A mounted
    /// instance keeps its committed values aside until the walk settles.
    pub(crate) fn apply(&self, props: Props, pending: Option<State>) {
        if self.lifecycle.get() == Lifecycle::Mounted {
            let committed = (self.props.borrow().clone(), self.state.borrow().clone());
            *self.stash.borrow_mut() = Some(committed);
            self.lifecycle.set(Lifecycle::Updating);
        }
        *self.props.borrow_mut() = props;
        if let Some(partial) = pending {
            self.state.borrow_mut().merge(partial);
        }
    }

    pub(crate) fn render(self: &Rc<Self>) -> Result<Vec<NodeDescriptor>> {
        let props = self.props.borrow();
        let state = self.state.borrow();
        let cx = RenderCx {
            props: &props,
            state: &state,
            updater: Updater {
                instance: Rc::downgrade(self),
            },
        };
        self.component.render(&cx)
    }

    pub fn updater(self: &Rc<Self>) -> Updater {
        Updater {
            instance: Rc::downgrade(self),
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("component", &self.ty.name())
            .field("state", &self.state.borrow())
            .field("lifecycle", &self.lifecycle.get())
            .finish()
    }
}

/// What a component sees while rendering.
pub struct RenderCx<'a> {
    props: &'a Props,
    state: &'a State,
    updater: Updater,
}

impl RenderCx<'_> {
    pub fn props(&self) -> &Props {
        self.props
    }

    pub fn state(&self) -> &State {
        self.state
    }

    pub fn updater(&self) -> Updater {
        self.updater.clone()
    }
}

/// Handle for requesting state changes on a component instance. Cheap to
/// clone into event handlers; does not keep the instance alive.
#[derive(Clone)]
pub struct Updater {
    instance: Weak<Instance>,
}

impl Updater {
    /// Enqueues `partial` to be merged into the instance state on the next
    /// walk and asks the host for idle time. Returns immediately.
    pub fn request_state_change(&self, partial: State) -> Result<()> {
        let Some(instance) = self.instance.upgrade() else {
            return Err(Error::DetachedInstance {
                component: "<dropped>",
            });
        };
        if instance.lifecycle() == Lifecycle::Unmounted {
            return Err(Error::DetachedInstance {
                component: instance.name(),
            });
        }
        let queue = instance.queue.clone();
        queue.push(Update::State { instance, partial });
        Ok(())
    }
}

impl fmt::Debug for Updater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.instance.upgrade() {
            Some(instance) => write!(f, "Updater({})", instance.name()),
            None => f.write_str("Updater(<dropped>)"),
        }
    }
}
