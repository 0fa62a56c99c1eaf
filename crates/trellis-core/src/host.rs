//! Host scheduling contract.
//!
//! The engine never loops on its own: after every step that leaves work
//! behind it asks the host for another idle period, and the host answers by
//! calling [`Scheduler::perform_work`](crate::Scheduler::perform_work) with a
//! [`Deadline`] describing how much time that period has.

use std::cell::Cell;

use web_time::{Duration, Instant};

pub trait HostScheduler {
    /// Asks for a future call to `perform_work`. Must not call it re-entrantly.
    fn request_idle_time(&self);
}

impl<F: Fn()> HostScheduler for F {
    fn request_idle_time(&self) {
        self()
    }
}

pub trait Deadline {
    /// Remaining budget of the current idle period, in milliseconds.
    fn time_remaining(&self) -> f64;
}

/// Reports the same budget forever.
#[derive(Clone, Copy, Debug)]
pub struct FixedDeadline(pub f64);

impl Deadline for FixedDeadline {
    fn time_remaining(&self) -> f64 {
        self.0
    }
}

/// Grants `budget_ms` to the first `units` queries, then reports nothing.
/// The work loop queries once per item, so this admits exactly `units` items.
#[derive(Debug)]
pub struct CountdownDeadline {
    units: Cell<usize>,
    budget_ms: f64,
}

impl CountdownDeadline {
    pub fn new(units: usize) -> Self {
        Self {
            units: Cell::new(units),
            budget_ms: 50.0,
        }
    }
}

impl Deadline for CountdownDeadline {
    fn time_remaining(&self) -> f64 {
        match self.units.get() {
            0 => 0.0,
            n => {
                self.units.set(n - 1);
                self.budget_ms
            }
        }
    }
}

/// Wall-clock deadline: `budget` measured from construction.
#[derive(Clone, Copy, Debug)]
pub struct FrameDeadline {
    start: Instant,
    budget: Duration,
}

impl FrameDeadline {
    pub fn new(budget: Duration) -> Self {
        Self {
            start: Instant::now(),
            budget,
        }
    }

    /// One 60 Hz frame.
    pub fn frame() -> Self {
        Self::new(Duration::from_micros(16_667))
    }
}

impl Deadline for FrameDeadline {
    fn time_remaining(&self) -> f64 {
        let elapsed = self.start.elapsed();
        self.budget.saturating_sub(elapsed).as_secs_f64() * 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countdown_admits_exactly_n_queries() {
        let d = CountdownDeadline::new(2);
        assert!(d.time_remaining() > 1.0);
        assert!(d.time_remaining() > 1.0);
        assert_eq!(d.time_remaining(), 0.0);
        assert_eq!(d.time_remaining(), 0.0);
    }

    #[test]
    fn frame_deadline_starts_with_its_budget() {
        let d = FrameDeadline::new(Duration::from_secs(60));
        let left = d.time_remaining();
        assert!(left > 59_000.0 && left <= 60_000.0);
        assert_eq!(FrameDeadline::new(Duration::ZERO).time_remaining(), 0.0);
    }

    #[test]
    fn closures_are_hosts() {
        let asked = Cell::new(0);
        let host = || asked.set(asked.get() + 1);
        host.request_idle_time();
        host.request_idle_time();
        assert_eq!(asked.get(), 2);
    }
}
