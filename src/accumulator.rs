//! Session accumulation
//!
//! Converts irregular callback timestamps into elapsed seconds and attributes
//! focus time. Pose and face callbacks arrive on separate cadences, so each
//! stream owns its own [`StreamClock`]; nothing here assumes a fixed frame rate.

use serde::{Deserialize, Serialize};

/// Per-stream clock measuring time between consecutive callbacks
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamClock {
    /// Timestamp of the previous callback (monotonic milliseconds)
    last_ms: Option<f64>,
}

impl StreamClock {
    /// Record a callback at `at_ms` and return the seconds since the previous one.
    ///
    /// The first callback only starts the clock and yields `None`. A timestamp
    /// earlier than the previous one yields zero elapsed time.
    pub fn advance(&mut self, at_ms: f64) -> Option<f64> {
        let elapsed = self
            .last_ms
            .map(|last| ((at_ms - last) / 1000.0).max(0.0));
        self.last_ms = Some(match self.last_ms {
            Some(last) => last.max(at_ms),
            None => at_ms,
        });
        elapsed
    }

    pub fn is_started(&self) -> bool {
        self.last_ms.is_some()
    }
}

/// Focused/unfocused time accrual
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FocusAccumulator {
    clock: StreamClock,
    /// Smoothed state that was active since the previous callback
    state: Option<bool>,
    focused_secs: f64,
    unfocused_secs: f64,
}

impl FocusAccumulator {
    /// Record a face callback with its smoothed state.
    ///
    /// The interval since the previous callback is attributed to the state that
    /// was active during it (the previous smoothed state), not the new one.
    /// Returns the elapsed seconds, or `None` for the first callback.
    pub fn observe(&mut self, at_ms: f64, smoothed: bool) -> Option<f64> {
        let elapsed = self.clock.advance(at_ms);

        if let (Some(dt), Some(previous)) = (elapsed, self.state) {
            if previous {
                self.focused_secs += dt;
            } else {
                self.unfocused_secs += dt;
            }
        }

        self.state = Some(smoothed);
        elapsed
    }

    pub fn focused_secs(&self) -> f64 {
        self.focused_secs
    }

    pub fn unfocused_secs(&self) -> f64 {
        self.unfocused_secs
    }

    /// Total time the focus signal has been observed
    pub fn observed_secs(&self) -> f64 {
        self.focused_secs + self.unfocused_secs
    }

    /// Smoothed state as of the latest callback
    pub fn current_state(&self) -> Option<bool> {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_callback_starts_clock() {
        let mut clock = StreamClock::default();
        assert!(!clock.is_started());
        assert_eq!(clock.advance(1_000.0), None);
        assert!(clock.is_started());
        assert_eq!(clock.advance(1_250.0), Some(0.25));
        assert_eq!(clock.advance(3_250.0), Some(2.0));
    }

    #[test]
    fn test_clock_never_goes_backwards() {
        let mut clock = StreamClock::default();
        clock.advance(5_000.0);
        assert_eq!(clock.advance(4_000.0), Some(0.0));
        // The earlier timestamp did not rewind the clock
        assert_eq!(clock.advance(6_000.0), Some(1.0));
    }

    #[test]
    fn test_time_goes_to_previous_state() {
        let mut acc = FocusAccumulator::default();
        acc.observe(0.0, true);
        // Focused during [0, 1000), switches to unfocused at 1000
        acc.observe(1_000.0, false);
        assert_eq!(acc.focused_secs(), 1.0);
        assert_eq!(acc.unfocused_secs(), 0.0);

        // Unfocused during [1000, 3000)
        acc.observe(3_000.0, true);
        assert_eq!(acc.focused_secs(), 1.0);
        assert_eq!(acc.unfocused_secs(), 2.0);
    }

    #[test]
    fn test_stalled_detector_gap_is_attributed() {
        let mut acc = FocusAccumulator::default();
        acc.observe(0.0, false);
        acc.observe(100.0, false);
        // Detector stalls for 7.9 s
        acc.observe(8_000.0, true);

        assert!((acc.unfocused_secs() - 8.0).abs() < 1e-9);
        assert_eq!(acc.focused_secs(), 0.0);
    }

    #[test]
    fn test_totals_match_observed_time() {
        let mut acc = FocusAccumulator::default();
        let mut at_ms = 0.0;
        let mut state = true;

        for step in 0..500u32 {
            // Irregular intervals between 10 and 300 ms
            at_ms += 10.0 + f64::from((step * 37) % 291);
            if step % 13 == 0 {
                state = !state;
            }
            acc.observe(at_ms, state);
        }

        let first = 10.0;
        let expected = (at_ms - first) / 1000.0;
        assert!((acc.observed_secs() - expected).abs() < 1e-6);
    }
}
