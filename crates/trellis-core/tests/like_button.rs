use std::rc::Rc;

use trellis_core::{
    Component, Config, EditTag, Error, Event, FixedDeadline, Lifecycle, ManualHost, MemoryTarget,
    NodeDescriptor, Props, RenderCx, Result, Scheduler, SchedulerConfig, State, component,
    describe, run_until_idle, text,
};

struct LikeButton;

impl Component for LikeButton {
    fn create(_props: &Props) -> Self {
        LikeButton
    }

    fn initial_state(&self, _props: &Props) -> State {
        State::new().with("liked", false)
    }

    fn render(&self, cx: &RenderCx<'_>) -> Result<Vec<NodeDescriptor>> {
        if cx.state().bool("liked") {
            return Ok(vec![text("You liked this.")]);
        }
        let updater = cx.updater();
        let on_click = move |_: &Event| {
            updater
                .request_state_change(State::new().with("liked", true))
                .unwrap();
        };
        Ok(vec![describe!(
            "button",
            Config::new().on("click", on_click),
            "Like"
        )?])
    }
}

fn setup() -> (Rc<ManualHost>, Scheduler<MemoryTarget>, trellis_core::Handle) {
    let _ = env_logger::builder().is_test(true).try_init();
    let host = Rc::new(ManualHost::new());
    let mut target = MemoryTarget::new();
    let root = target.create_container("div");
    (
        host.clone(),
        Scheduler::new(target, host, SchedulerConfig::default()),
        root,
    )
}

#[test]
fn button_commits_text_before_button() {
    let (host, mut scheduler, root) = setup();
    let button = describe!("button", Config::new().on("click", |_| {}), "Like").unwrap();
    scheduler.render_root(button, root);
    run_until_idle(&mut scheduler, &host, || FixedDeadline(16.0)).unwrap();

    let report = scheduler.last_commit().unwrap();
    assert_eq!(
        report.summary(),
        vec![(EditTag::Placed, "#text(Like)"), (EditTag::Placed, "button")]
    );
    assert_eq!(scheduler.target().markup(root), "<div><button>Like</button></div>");
    let handle = scheduler.target().find_by_tag("button")[0];
    assert_eq!(scheduler.target().listener_count(handle), 1);
}

#[test]
fn click_swaps_button_for_text() {
    let (host, mut scheduler, root) = setup();
    scheduler.render_root(describe!(component::<LikeButton>(), Config::new()).unwrap(), root);
    run_until_idle(&mut scheduler, &host, || FixedDeadline(16.0)).unwrap();
    assert_eq!(scheduler.target().inner_markup(root), "<button>Like</button>");

    let instance = scheduler.instances(root)[0].clone();
    assert_eq!(instance.lifecycle(), Lifecycle::Mounted);

    let button = scheduler.target().find_by_tag("button")[0];
    assert_eq!(scheduler.target().dispatch(button, "click"), Ok(1));

    // nothing changes until the host grants idle time
    assert!(!instance.state().bool("liked"));
    assert_eq!(scheduler.pending_updates(), 1);
    assert_eq!(scheduler.target().inner_markup(root), "<button>Like</button>");

    run_until_idle(&mut scheduler, &host, || FixedDeadline(16.0)).unwrap();
    assert!(instance.state().bool("liked"));
    assert_eq!(scheduler.target().inner_markup(root), "You liked this.");

    let report = scheduler.last_commit().unwrap();
    assert_eq!(report.count(EditTag::Removed), 1);
    assert_eq!(report.count(EditTag::Placed), 1);
    assert_eq!(
        report.summary(),
        vec![
            (EditTag::Removed, "button"),
            (EditTag::Placed, "#text(You liked this.)"),
            (EditTag::Updated, "LikeButton"),
        ]
    );
    assert!(!scheduler.target().contains(button));
}

#[test]
fn state_change_is_rejected_after_unmount() {
    let (host, mut scheduler, root) = setup();
    scheduler.render_root(describe!(component::<LikeButton>(), Config::new()).unwrap(), root);
    run_until_idle(&mut scheduler, &host, || FixedDeadline(16.0)).unwrap();
    let instance = scheduler.instances(root)[0].clone();

    scheduler.render_root(text("bye"), root);
    run_until_idle(&mut scheduler, &host, || FixedDeadline(16.0)).unwrap();

    assert_eq!(instance.lifecycle(), Lifecycle::Unmounted);
    let err = instance
        .updater()
        .request_state_change(State::new().with("liked", true))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::DetachedInstance {
            component: "LikeButton"
        }
    ));
    assert_eq!(scheduler.pending_updates(), 0);
}
