//! # Descriptors, Work Items, and Commits
//!
//! Trellis renders declarative node descriptors into any mutable tree that
//! implements [`RenderTarget`]. There are three main pieces:
//!
//! - `NodeDescriptor`: immutable description of one node and its children.
//! - `Scheduler`: walks descriptors into a work-in-progress tree, a few
//!   items per idle period.
//! - `commit`: applies the finished tree's effect list to the target in one
//!   go.
//!
//! ## Descriptors
//!
//! `describe!` normalizes children: strings and numbers become text nodes,
//! `false` and `None` disappear.
//!
//! ```rust
//! use trellis_core::*;
//!
//! let show_hint = false;
//! let node = describe!(
//!     "p",
//!     Config::new().set("class", "greeting"),
//!     "hello ",
//!     42,
//!     show_hint.then(|| text("hint")),
//! )
//! .unwrap();
//!
//! assert_eq!(node.children().len(), 2);
//! assert_eq!(node.children()[1].text_value(), Some("42"));
//! ```
//!
//! ## Components
//!
//! A component renders its props and state into descriptors. State changes
//! go through an [`Updater`] and only land on the next walk:
//!
//! ```rust
//! use trellis_core::*;
//!
//! struct LikeButton;
//!
//! impl Component for LikeButton {
//!     fn create(_props: &Props) -> Self {
//!         LikeButton
//!     }
//!
//!     fn initial_state(&self, _props: &Props) -> State {
//!         State::new().with("liked", false)
//!     }
//!
//!     fn render(&self, cx: &RenderCx<'_>) -> Result<Vec<NodeDescriptor>> {
//!         if cx.state().bool("liked") {
//!             return Ok(vec![text("You liked this.")]);
//!         }
//!         let updater = cx.updater();
//!         let on_click = move |_: &Event| {
//!             let _ = updater.request_state_change(State::new().with("liked", true));
//!         };
//!         Ok(vec![describe!("button", Config::new().on("click", on_click), "Like")?])
//!     }
//! }
//!
//! let host = std::rc::Rc::new(ManualHost::new());
//! let mut target = MemoryTarget::new();
//! let root = target.create_container("div");
//! let mut scheduler = Scheduler::new(target, host.clone(), SchedulerConfig::default());
//!
//! scheduler.render_root(describe!(component::<LikeButton>(), Config::new()).unwrap(), root);
//! run_until_idle(&mut scheduler, &host, || FixedDeadline(16.0)).unwrap();
//! assert_eq!(scheduler.target().inner_markup(root), "<button>Like</button>");
//!
//! let button = scheduler.target().find_by_tag("button")[0];
//! scheduler.target().dispatch(button, "click").unwrap();
//! run_until_idle(&mut scheduler, &host, || FixedDeadline(16.0)).unwrap();
//! assert_eq!(scheduler.target().inner_markup(root), "You liked this.");
//! ```
//!
//! ## Scheduling
//!
//! Nothing renders synchronously. `render_root` and `request_state_change`
//! enqueue an update and ask the [`HostScheduler`] for idle time; each call
//! to `perform_work` then does as much of the walk as its [`Deadline`]
//! allows. A finished walk is committed before `perform_work` returns, so
//! the target never shows half a tree.
//!
//! Reconciliation is positional: a child keeps its target handle only while
//! its position and type stay the same. Reordering siblings removes and
//! re-creates them.

pub mod commit;
pub mod component;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod fiber;
pub mod headless;
pub mod host;
mod reconcile;
pub mod scheduler;
pub mod target;

pub use commit::{CommitEntry, CommitReport};
pub use component::{Component, ComponentType, Instance, Lifecycle, RenderCx, State, Updater};
pub use config::SchedulerConfig;
pub use descriptor::{
    Child, Config, DescriptorType, Event, EventHandler, NodeDescriptor, PropValue, Props,
    TEXT_VALUE, component, describe, element, event_name, handler, text,
};
pub use error::{Error, Result};
pub use fiber::{EditTag, FiberId, FiberTree, WorkKind};
pub use headless::{FailOn, ManualHost, MemoryTarget, Mutation, run_until_idle};
pub use host::{CountdownDeadline, Deadline, FixedDeadline, FrameDeadline, HostScheduler};
pub use scheduler::{Phase, Scheduler, WorkStatus};
pub use target::{Handle, HostKind, RenderTarget, TargetError};
