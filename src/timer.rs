//! Elapsed-time stopwatch
//!
//! Independent of the capture session; the presentation layer shows it while
//! recording. Time accumulates across stop/start pairs until `reset`.

use crate::clock::Clock;

/// Start/stop/reset stopwatch reporting seconds
#[derive(Debug, Clone)]
pub struct ElapsedTimer<C: Clock> {
    clock: C,
    started_at_ms: Option<i64>,
    accumulated_sec: f64,
}

impl<C: Clock> ElapsedTimer<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            started_at_ms: None,
            accumulated_sec: 0.0,
        }
    }

    /// Start counting. Does nothing if already running.
    pub fn start(&mut self) {
        if self.started_at_ms.is_none() {
            self.started_at_ms = Some(self.clock.now_ms());
        }
    }

    /// Pause counting, keeping the elapsed time
    pub fn stop(&mut self) {
        if let Some(started) = self.started_at_ms.take() {
            self.accumulated_sec += Self::seconds_between(started, self.clock.now_ms());
        }
    }

    /// Stop and zero the timer
    pub fn reset(&mut self) {
        self.started_at_ms = None;
        self.accumulated_sec = 0.0;
    }

    pub fn is_running(&self) -> bool {
        self.started_at_ms.is_some()
    }

    /// Seconds counted so far, including the running stretch
    pub fn elapsed_sec(&self) -> f64 {
        let running = self
            .started_at_ms
            .map_or(0.0, |started| Self::seconds_between(started, self.clock.now_ms()));
        self.accumulated_sec + running
    }

    fn seconds_between(from_ms: i64, to_ms: i64) -> f64 {
        (to_ms - from_ms).max(0) as f64 / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn test_counts_while_running() {
        let clock = ManualClock::new(0);
        let mut timer = ElapsedTimer::new(clock.clone());
        assert_eq!(timer.elapsed_sec(), 0.0);

        timer.start();
        clock.advance(1_500);
        assert!(timer.is_running());
        assert_eq!(timer.elapsed_sec(), 1.5);
    }

    #[test]
    fn test_accumulates_across_pauses() {
        let clock = ManualClock::new(0);
        let mut timer = ElapsedTimer::new(clock.clone());

        timer.start();
        clock.advance(1_000);
        timer.stop();
        clock.advance(5_000);
        assert_eq!(timer.elapsed_sec(), 1.0);

        timer.start();
        clock.advance(250);
        assert_eq!(timer.elapsed_sec(), 1.25);
    }

    #[test]
    fn test_start_while_running_keeps_origin() {
        let clock = ManualClock::new(0);
        let mut timer = ElapsedTimer::new(clock.clone());
        timer.start();
        clock.advance(400);
        timer.start();
        clock.advance(600);
        assert_eq!(timer.elapsed_sec(), 1.0);
    }

    #[test]
    fn test_reset_zeroes_and_stops() {
        let clock = ManualClock::new(0);
        let mut timer = ElapsedTimer::new(clock.clone());
        timer.start();
        clock.advance(2_000);
        timer.reset();
        assert!(!timer.is_running());
        clock.advance(2_000);
        assert_eq!(timer.elapsed_sec(), 0.0);
    }
}
