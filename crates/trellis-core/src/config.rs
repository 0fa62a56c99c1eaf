/// Tuning for the cooperative work loop.
#[derive(Clone, Debug, PartialEq)]
pub struct SchedulerConfig {
    /// The loop stops taking work items once the host reports this many
    /// milliseconds or fewer remaining.
    pub min_time_remaining_ms: f64,
    /// Hard cap on work items per scheduling opportunity.
    pub max_units_per_slice: Option<usize>,
    /// Keep the report of the latest commit around for inspection.
    pub record_commits: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_time_remaining_ms: 1.0,
            max_units_per_slice: None,
            record_commits: true,
        }
    }
}

impl SchedulerConfig {
    pub fn min_time_remaining(mut self, ms: f64) -> Self {
        self.min_time_remaining_ms = ms;
        self
    }

    pub fn max_units_per_slice(mut self, units: usize) -> Self {
        self.max_units_per_slice = Some(units);
        self
    }

    pub fn record_commits(mut self, record: bool) -> Self {
        self.record_commits = record;
        self
    }
}
