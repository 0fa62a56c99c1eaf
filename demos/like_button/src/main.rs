use std::rc::Rc;

use trellis_core::*;
use trellis_devtools::Inspector;

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
            if let Err(err) = updater.request_state_change(State::new().with("liked", true)) {
                log::warn!("like ignored: {err}");
            }
        };
        Ok(vec![describe!(
            "button",
            Config::new().set("class", "like").on("click", on_click),
            "Like"
        )?])
    }
}

fn settle(
    scheduler: &mut Scheduler<MemoryTarget>,
    host: &ManualHost,
    inspector: &mut Inspector,
) -> anyhow::Result<()> {
    let before = scheduler.commit_count();
    run_until_idle(scheduler, host, FrameDeadline::frame)?;
    if scheduler.commit_count() > before
        && let Some(report) = scheduler.last_commit()
    {
        inspector.commit(report);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let host = Rc::new(ManualHost::new());
    let mut target = MemoryTarget::new();
    let container = target.create_container("div");
    let mut scheduler = Scheduler::new(target, host.clone(), SchedulerConfig::default());
    let mut inspector = Inspector::new();
    inspector.hud.toggle_inspector();

    scheduler.render_root(describe!(component::<LikeButton>(), Config::new())?, container);
    settle(&mut scheduler, &host, &mut inspector)?;
    println!("{}", scheduler.target().markup(container));

    let button = scheduler
        .target()
        .find_by_tag("button")
        .first()
        .copied()
        .ok_or_else(|| anyhow::anyhow!("no button rendered"))?;
    inspector.hud.set_highlighted(Some(button));
    print!("{}", inspector.dump(scheduler.target(), container));

    scheduler.target().dispatch(button, "click")?;
    settle(&mut scheduler, &host, &mut inspector)?;
    println!("{}", scheduler.target().markup(container));
    print!("{}", inspector.dump(scheduler.target(), container));
    println!("{}", inspector.hud.summary());
    Ok(())
}
