use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use crate::commit::{CommitReport, commit_all_work};
use crate::component::{Instance, Lifecycle, State};
use crate::config::SchedulerConfig;
use crate::descriptor::{DescriptorType, NodeDescriptor, Props};
use crate::fiber::{Effect, FiberId, FiberTree, StateNode, WorkItem, WorkKind};
use crate::host::{Deadline, HostScheduler};
use crate::reconcile::{clone_child_fibers, reconcile_children};
use crate::target::{Handle, HostKind, RenderTarget};
use crate::{Error, Result};

/// A request waiting to seed a walk.
pub(crate) enum Update {
    Root { container: Handle, props: Props },
    State { instance: Rc<Instance>, partial: State },
}

/// FIFO of pending updates, shared with every `Updater`.
#[derive(Clone)]
pub(crate) struct UpdateQueue(Rc<RefCell<QueueInner>>);

struct QueueInner {
    pending: VecDeque<Update>,
    host: Rc<dyn HostScheduler>,
}

impl UpdateQueue {
    fn new(host: Rc<dyn HostScheduler>) -> Self {
        Self(Rc::new(RefCell::new(QueueInner {
            pending: VecDeque::new(),
            host,
        })))
    }

    /// Enqueues and asks the host for an idle period.
    pub(crate) fn push(&self, update: Update) {
        let host = {
            let mut inner = self.0.borrow_mut();
            inner.pending.push_back(update);
            inner.host.clone()
        };
        host.request_idle_time();
    }

    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        Self::new(Rc::new(crate::headless::ManualHost::new()))
    }

    fn pop(&self) -> Option<Update> {
        self.0.borrow_mut().pending.pop_front()
    }

    fn len(&self) -> usize {
        self.0.borrow().pending.len()
    }

    fn is_empty(&self) -> bool {
        self.0.borrow().pending.is_empty()
    }

    fn request_idle_time(&self) {
        let host = self.0.borrow().host.clone();
        host.request_idle_time();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Seeding,
    Walking,
    CommitPending,
    Committing,
}

/// Outcome of one scheduling opportunity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkStatus {
    /// Nothing left; no idle period was requested.
    Idle,
    /// Work remains and another idle period was requested.
    Pending,
}

/// One in-progress walk over a work-in-progress tree.
struct Walk {
    container: Handle,
    tree: FiberTree,
    next_unit: Option<FiberId>,
    pending_commit: Option<FiberId>,
    /// Partial state for the instance at a committed item, handed to its
    /// work-in-progress counterpart when the walk reaches it.
    pending_state: Option<(FiberId, State)>,
    bindings: Vec<(Rc<Instance>, FiberId)>,
    slices: u32,
    units: usize,
}

impl Walk {
    fn new(
        container: Handle,
        tree: FiberTree,
        anchor: FiberId,
        pending_state: Option<(FiberId, State)>,
    ) -> Self {
        Self {
            container,
            tree,
            next_unit: Some(anchor),
            pending_commit: None,
            pending_state,
            bindings: Vec::new(),
            slices: 0,
            units: 0,
        }
    }

    /// Begins `unit` and returns the next item to visit: its first child,
    /// else the first sibling found while completing back up the tree.
    fn perform_unit_of_work<T: RenderTarget>(
        &mut self,
        unit: FiberId,
        committed: Option<&FiberTree>,
        target: &mut T,
        queue: &UpdateQueue,
    ) -> Result<Option<FiberId>> {
        self.begin_work(unit, committed, target, queue)?;
        if let Some(child) = self.tree[unit].child {
            return Ok(Some(child));
        }

        let mut cursor = Some(unit);
        while let Some(id) = cursor {
            self.complete_work(id);
            if let Some(sibling) = self.tree[id].sibling {
                return Ok(Some(sibling));
            }
            cursor = self.tree[id].parent;
        }
        Ok(None)
    }

    fn begin_work<T: RenderTarget>(
        &mut self,
        unit: FiberId,
        committed: Option<&FiberTree>,
        target: &mut T,
        queue: &UpdateQueue,
    ) -> Result<()> {
        log::trace!("begin {} ({:?})", self.tree[unit].ty, unit);
        match self.tree[unit].kind {
            WorkKind::StatefulComponent => self.update_component(unit, committed, queue),
            _ => self.update_host(unit, committed, target),
        }
    }

    fn update_host<T: RenderTarget>(
        &mut self,
        unit: FiberId,
        committed: Option<&FiberTree>,
        target: &mut T,
    ) -> Result<()> {
        let item = &self.tree[unit];
        if matches!(item.state_node, StateNode::None) {
            let kind = match item.kind {
                WorkKind::Text => HostKind::Text,
                _ => HostKind::Element(item.ty.label()),
            };
            let handle = target.create_handle(kind, &item.props)?;
            self.tree[unit].state_node = StateNode::Host(handle);
        }

        let props = self.tree[unit].props.clone();
        reconcile_children(&mut self.tree, committed, unit, props.children());
        Ok(())
    }

    fn update_component(
        &mut self,
        unit: FiberId,
        committed: Option<&FiberTree>,
        queue: &UpdateQueue,
    ) -> Result<()> {
        if let Some(alternate) = self.tree[unit].alternate
            && self
                .pending_state
                .as_ref()
                .is_some_and(|(target, _)| *target == alternate)
        {
            self.tree[unit].pending_state = self.pending_state.take().map(|(_, state)| state);
        }

        let instance = match self.tree[unit].instance().cloned() {
            Some(instance) => {
                let item = &self.tree[unit];
                let unchanged = item.pending_state.is_none()
                    && item
                        .alternate
                        .and_then(|alt| committed?.get(alt))
                        .is_some_and(|old| old.props.same(&item.props));
                if unchanged {
                    log::trace!("`{}` unchanged, cloning children", instance.name());
                    clone_child_fibers(&mut self.tree, committed, unit);
                    return Ok(());
                }
                instance
            }
            None => {
                let DescriptorType::Component(ty) = self.tree[unit].ty else {
                    return Err(Error::Corrupt("component item without component type"));
                };
                let instance =
                    Instance::create(ty, &self.tree[unit].props, self.container, queue.clone());
                self.tree[unit].state_node = StateNode::Instance(instance.clone());
                instance
            }
        };

        let item = &mut self.tree[unit];
        instance.apply(item.props.clone(), item.pending_state.take());
        let children = instance.render()?;
        reconcile_children(&mut self.tree, committed, unit, &children);
        Ok(())
    }

    /// Folds the item's accumulated effects, then the item itself if tagged,
    /// into its parent's list. Completing the anchor marks the walk done.
    fn complete_work(&mut self, id: FiberId) {
        if let Some(instance) = self.tree[id].instance() {
            self.bindings.push((instance.clone(), id));
        }

        let Some(parent) = self.tree[id].parent else {
            self.pending_commit = Some(id);
            return;
        };

        let item = &mut self.tree[id];
        let effects = std::mem::take(&mut item.effects);
        let tagged = item.tag.is_some();

        let list = &mut self.tree[parent].effects;
        list.extend(effects);
        if tagged {
            list.push(Effect::Work(id));
        }
    }
}

/// Scheduler context: pending-update queue, the single in-progress walk, and
/// the committed tree of every container it has rendered into.
pub struct Scheduler<T: RenderTarget> {
    config: SchedulerConfig,
    target: T,
    queue: UpdateQueue,
    containers: HashMap<Handle, FiberTree>,
    walk: Option<Walk>,
    phase: Phase,
    last_commit: Option<CommitReport>,
    commits: u64,
    /// Containers whose last commit failed after changing the target.
    poisoned: HashSet<Handle>,
}

impl<T: RenderTarget> Scheduler<T> {
    pub fn new(target: T, host: Rc<dyn HostScheduler>, config: SchedulerConfig) -> Self {
        Self {
            config,
            target,
            queue: UpdateQueue::new(host),
            containers: HashMap::new(),
            walk: None,
            phase: Phase::Idle,
            last_commit: None,
            commits: 0,
            poisoned: HashSet::new(),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn last_commit(&self) -> Option<&CommitReport> {
        self.last_commit.as_ref()
    }

    pub fn commit_count(&self) -> u64 {
        self.commits
    }

    pub fn pending_updates(&self) -> usize {
        self.queue.len()
    }

    pub fn is_walking(&self) -> bool {
        self.walk.is_some()
    }

    pub fn is_poisoned(&self, container: Handle) -> bool {
        self.poisoned.contains(&container)
    }

    /// Forgets everything rendered into `container`: its committed tree, the
    /// poison mark of a failed commit, and its instances, which are
    /// unmounted. The caller empties the container on the target first; the
    /// next `render_root` then places every node anew.
    pub fn reset_container(&mut self, container: Handle) {
        self.poisoned.remove(&container);
        if let Some(tree) = self.containers.remove(&container) {
            for id in tree.preorder() {
                if let Some(instance) = tree[id].instance() {
                    instance.unmount();
                }
            }
        }
        log::info!("reset container {container:?}");
    }

    /// Committed tree rendered into `container`, if any.
    pub fn committed(&self, container: Handle) -> Option<&FiberTree> {
        self.containers.get(&container)
    }

    /// Live component instances under `container`, in tree order.
    pub fn instances(&self, container: Handle) -> Vec<Rc<Instance>> {
        let Some(tree) = self.containers.get(&container) else {
            return Vec::new();
        };
        tree.preorder()
            .into_iter()
            .filter_map(|id| tree[id].instance().cloned())
            .collect()
    }

    /// Queues `descriptor` as the sole child of `container`. Nothing happens
    /// until the host grants an idle period.
    pub fn render_root(&self, descriptor: NodeDescriptor, container: Handle) {
        log::debug!("render_root: `{}` into {:?}", descriptor.ty(), container);
        self.queue.push(Update::Root {
            container,
            props: Props::with_children(vec![descriptor]),
        });
    }

    /// One scheduling opportunity: seed a walk if none is in progress, work
    /// while `deadline` allows, commit if the walk finished, and request
    /// another opportunity when anything is left.
    pub fn perform_work(&mut self, deadline: &dyn Deadline) -> Result<WorkStatus> {
        if let Err(err) = self.run_slice(deadline) {
            self.abandon_walk(&err);
            self.request_if_pending();
            return Err(err);
        }
        Ok(self.request_if_pending())
    }

    fn run_slice(&mut self, deadline: &dyn Deadline) -> Result<()> {
        if self.walk.is_none() {
            self.seed()?;
        }
        let Some(walk) = self.walk.as_mut() else {
            return Ok(());
        };

        self.phase = Phase::Walking;
        walk.slices += 1;
        let committed = self.containers.get(&walk.container);
        let mut units = 0;
        while let Some(unit) = walk.next_unit {
            if deadline.time_remaining() <= self.config.min_time_remaining_ms {
                break;
            }
            if self.config.max_units_per_slice.is_some_and(|max| units >= max) {
                break;
            }
            walk.next_unit =
                walk.perform_unit_of_work(unit, committed, &mut self.target, &self.queue)?;
            units += 1;
        }
        walk.units += units;
        log::trace!(
            "slice {} for {:?}: {} unit(s), finished: {}",
            walk.slices,
            walk.container,
            units,
            walk.pending_commit.is_some()
        );

        if walk.pending_commit.is_some() {
            self.phase = Phase::CommitPending;
            self.commit()?;
        }
        Ok(())
    }

    /// Dequeues one update and builds the anchor of a new work-in-progress
    /// tree for it.
    fn seed(&mut self) -> Result<()> {
        let Some(update) = self.queue.pop() else {
            return Ok(());
        };
        self.phase = Phase::Seeding;

        let (container, props, alternate, pending_state) = match update {
            Update::Root { container, props } => {
                if self.poisoned.contains(&container) {
                    return Err(Error::Poisoned { container });
                }
                let alternate = self.containers.get(&container).and_then(FiberTree::root);
                (container, props, alternate, None)
            }
            Update::State { instance, partial } => {
                let detached = || Error::DetachedInstance {
                    component: instance.name(),
                };
                if instance.lifecycle() == Lifecycle::Unmounted {
                    return Err(detached());
                }
                let container = instance.container();
                if self.poisoned.contains(&container) {
                    return Err(Error::Poisoned { container });
                }
                let tree = self.containers.get(&container).ok_or_else(detached)?;
                let fiber = instance
                    .fiber()
                    .filter(|id| tree.contains(*id))
                    .ok_or_else(detached)?;
                let root = tree
                    .root_of(fiber)
                    .filter(|root| Some(*root) == tree.root())
                    .ok_or_else(detached)?;
                (
                    container,
                    tree[root].props.clone(),
                    Some(root),
                    Some((fiber, partial)),
                )
            }
        };

        let mut tree = FiberTree::new();
        let anchor = tree.insert(WorkItem::anchor(container, props, alternate));
        tree.set_root(anchor);
        log::debug!(
            "seeded walk for {:?} ({} update(s) still queued)",
            container,
            self.queue.len()
        );
        self.walk = Some(Walk::new(container, tree, anchor, pending_state));
        self.phase = Phase::Walking;
        Ok(())
    }

    /// Applies the finished walk to the target and promotes its tree to the
    /// committed baseline of its container.
    fn commit(&mut self) -> Result<()> {
        let Some(walk) = self.walk.as_ref() else {
            return Ok(());
        };
        let Some(root) = walk.pending_commit else {
            return Ok(());
        };

        self.phase = Phase::Committing;
        let committed = self.containers.get(&walk.container);
        let mut report = CommitReport::default();
        let applied = commit_all_work(&mut self.target, &walk.tree, committed, root, &mut report);
        if let Err(err) = applied {
            if report.mutations > 0 {
                log::error!(
                    "commit for {:?} failed after {} mutation(s); container is poisoned",
                    walk.container,
                    report.mutations
                );
                self.poisoned.insert(walk.container);
            }
            return Err(err);
        }

        let Some(mut walk) = self.walk.take() else {
            return Ok(());
        };
        report.slices = walk.slices;
        report.units = walk.units;
        for (instance, id) in walk.bindings.drain(..) {
            instance.bind(id);
        }
        walk.tree.settle();
        self.containers.insert(walk.container, walk.tree);
        self.commits += 1;

        log::debug!(
            "commit #{} for {:?}: {} effect(s), {} mutation(s), {} slice(s)",
            self.commits,
            walk.container,
            report.entries.len(),
            report.mutations,
            report.slices
        );
        if self.config.record_commits {
            self.last_commit = Some(report);
        }
        self.phase = Phase::Idle;
        Ok(())
    }

    /// Drops the in-progress tree after a failure. The committed baseline is
    /// kept; target mutations already applied stay applied. Instances get
    /// their committed props and state back and handles created for the walk
    /// that never got attached are released.
    fn abandon_walk(&mut self, err: &Error) {
        if let Some(walk) = self.walk.take() {
            log::error!("abandoning walk for {:?}: {err}", walk.container);
            for id in walk.tree.preorder() {
                let item = &walk.tree[id];
                if let Some(instance) = item.instance() {
                    instance.restore();
                }
                if item.alternate.is_none()
                    && item.kind.is_structural()
                    && let Some(handle) = item.handle()
                {
                    self.target.release_handle(handle);
                }
            }
        } else {
            log::error!("scheduling step failed: {err}");
        }
        self.phase = Phase::Idle;
    }

    fn request_if_pending(&mut self) -> WorkStatus {
        if self.walk.is_some() {
            self.queue.request_idle_time();
            return WorkStatus::Pending;
        }
        if !self.queue.is_empty() {
            self.phase = Phase::Seeding;
            self.queue.request_idle_time();
            return WorkStatus::Pending;
        }
        self.phase = Phase::Idle;
        WorkStatus::Idle
    }
}
