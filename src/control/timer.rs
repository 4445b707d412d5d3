//! Dwell and countdown timers.

use std::time::{Duration, Instant};

/// A stopwatch that starts on first use and stays idle after reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntervalTimer {
    started_at: Option<Instant>,
}

impl IntervalTimer {
    /// An idle timer.
    pub const fn new() -> Self {
        Self { started_at: None }
    }

    /// Starts the timer unless it is already running. Returns true if it
    /// started on this call.
    pub fn start_if_absent(&mut self, now: Instant) -> bool {
        if self.started_at.is_some() {
            return false;
        }
        self.started_at = Some(now);
        true
    }

    /// Time since start, or zero when idle.
    pub fn elapsed(&self, now: Instant) -> Duration {
        self.started_at
            .map(|start| now.saturating_duration_since(start))
            .unwrap_or_default()
    }

    /// Back to idle.
    pub fn reset(&mut self) {
        self.started_at = None;
    }

    /// Whether the timer has started.
    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    /// Start instant, if running.
    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_timer_reads_zero() {
        let timer = IntervalTimer::new();
        assert_eq!(timer.elapsed(Instant::now()), Duration::ZERO);
        assert!(!timer.is_running());
    }

    #[test]
    fn test_start_is_idempotent() {
        let t0 = Instant::now();
        let mut timer = IntervalTimer::new();

        assert!(timer.start_if_absent(t0));
        assert!(!timer.start_if_absent(t0 + Duration::from_secs(5)));
        assert_eq!(timer.elapsed(t0 + Duration::from_secs(7)), Duration::from_secs(7));
    }

    #[test]
    fn test_reset_returns_to_idle() {
        let t0 = Instant::now();
        let mut timer = IntervalTimer::new();
        timer.start_if_absent(t0);
        timer.reset();

        assert_eq!(timer.elapsed(t0 + Duration::from_secs(3)), Duration::ZERO);
        assert!(timer.start_if_absent(t0 + Duration::from_secs(3)));
    }

    #[test]
    fn test_clock_before_start_saturates() {
        let t0 = Instant::now() + Duration::from_secs(10);
        let mut timer = IntervalTimer::new();
        timer.start_if_absent(t0);
        assert_eq!(timer.elapsed(t0 - Duration::from_secs(1)), Duration::ZERO);
    }
}
