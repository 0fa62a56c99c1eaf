use std::fmt::Write as _;

use web_time::Instant;

use trellis_core::headless::{MemoryTarget, NodeKind};
use trellis_core::{CommitReport, EditTag, Handle, TEXT_VALUE};

pub struct Hud {
    pub inspector_enabled: bool,
    pub highlighted: Option<Handle>,
    commit_count: u64,
    last_commit: Option<Instant>,
    cps_smooth: f32,
    pub metrics: Option<Metrics>,
}

impl Default for Hud {
    fn default() -> Self {
        Self::new()
    }
}

impl Hud {
    pub fn new() -> Self {
        Self {
            inspector_enabled: false,
            highlighted: None,
            commit_count: 0,
            last_commit: None,
            cps_smooth: 0.0,
            metrics: None,
        }
    }
    pub fn toggle_inspector(&mut self) {
        self.inspector_enabled = !self.inspector_enabled;
    }
    pub fn set_highlighted(&mut self, h: Option<Handle>) {
        self.highlighted = h;
    }

    pub fn commit_count(&self) -> u64 {
        self.commit_count
    }

    pub fn record(&mut self, report: &CommitReport) {
        self.commit_count += 1;
        // commits per second
        let now = Instant::now();
        if let Some(prev) = self.last_commit.replace(now) {
            let dt = (now - prev).as_secs_f32();
            if dt > 0.0 {
                let cps = 1.0 / dt;
                // simple EMA
                let a = 0.2;
                self.cps_smooth = if self.cps_smooth == 0.0 {
                    cps
                } else {
                    (1.0 - a) * self.cps_smooth + a * cps
                };
            }
        }
        self.metrics = Some(Metrics::from_report(report));
    }

    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!("commit: {}", self.commit_count),
            format!("commits/s: {:.1}", self.cps_smooth),
        ];
        if let Some(m) = &self.metrics {
            lines.push(format!(
                "placed/updated/removed: {}/{}/{}",
                m.placed, m.updated, m.removed
            ));
            lines.push(format!("mutations: {}", m.mutations));
            lines.push(format!("slices: {} ({} units)", m.slices, m.units));
        }
        lines.join("  |  ")
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Metrics {
    pub placed: usize,
    pub updated: usize,
    pub removed: usize,
    pub mutations: usize,
    pub slices: u32,
    pub units: usize,
}

impl Metrics {
    pub fn from_report(report: &CommitReport) -> Self {
        Self {
            placed: report.count(EditTag::Placed),
            updated: report.count(EditTag::Updated),
            removed: report.count(EditTag::Removed),
            mutations: report.mutations,
            slices: report.slices,
            units: report.units,
        }
    }
}

pub struct Inspector {
    pub hud: Hud,
}
impl Default for Inspector {
    fn default() -> Self {
        Self::new()
    }
}

impl Inspector {
    pub fn new() -> Self {
        Self { hud: Hud::new() }
    }

    /// Feeds the latest commit to the HUD and logs its summary when the
    /// inspector is on.
    pub fn commit(&mut self, report: &CommitReport) {
        self.hud.record(report);
        if self.hud.inspector_enabled {
            log::info!("{}", self.hud.summary());
        }
    }

    /// Indented dump of the target subtree under `root`, one node per line.
    /// The highlighted node is marked with `*`.
    pub fn dump(&self, target: &MemoryTarget, root: Handle) -> String {
        let mut out = String::new();
        self.dump_node(target, root, 0, &mut out);
        out
    }

    fn dump_node(&self, target: &MemoryTarget, h: Handle, depth: usize, out: &mut String) {
        let Some(kind) = target.kind(h) else {
            return;
        };
        let mark = if self.hud.highlighted == Some(h) { "*" } else { " " };
        let _ = write!(out, "{mark}{:indent$}", "", indent = depth * 2);
        match kind {
            NodeKind::Text => {
                let value = target.attribute(h, TEXT_VALUE).unwrap_or_default();
                let _ = writeln!(out, "{value:?}");
            }
            NodeKind::Element(tag) => {
                let _ = write!(out, "<{tag}> #{}", h.0);
                let listeners = target.listener_count(h);
                if listeners > 0 {
                    let _ = write!(out, " ({listeners} listener(s))");
                }
                out.push('\n');
            }
        }
        for child in target.children_of(h) {
            self.dump_node(target, child, depth + 1, out);
        }
    }
}
