//! Streak-based alert debouncing
//!
//! A [`StreakDebouncer`] tracks how long a smoothed signal has stayed in its
//! "bad" classification and decides when to speak up: exactly once per
//! continuous bad streak, and only after the streak reaches its threshold.
//! Delivery goes through an [`Announcer`], which is fire-and-forget.

use crate::error::TrackerError;
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// External capability that delivers an alert (typically text-to-speech)
pub trait Announcer: Send + Sync {
    /// Deliver `text`. Errors are logged by the caller and otherwise ignored.
    fn announce(&self, text: &str) -> Result<(), TrackerError>;
}

/// Announcer that writes alerts to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAnnouncer;

impl Announcer for LogAnnouncer {
    fn announce(&self, text: &str) -> Result<(), TrackerError> {
        info!("alert: {text}");
        Ok(())
    }
}

/// Announcer that drops every alert
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentAnnouncer;

impl Announcer for SilentAnnouncer {
    fn announce(&self, _text: &str) -> Result<(), TrackerError> {
        Ok(())
    }
}

/// Deliver an alert without letting a delivery failure escape
pub fn announce_quietly(announcer: &dyn Announcer, text: &str) {
    if let Err(e) = announcer.announce(text) {
        warn!("alert delivery failed ({text:?}): {e}");
    }
}

/// Debouncer state: quiet, or already alerted for the current streak
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakState {
    Quiet,
    Alerted,
}

/// Tracks one signal's continuous bad streak
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreakDebouncer {
    /// Continuous bad seconds before alerting
    threshold_secs: f64,
    /// Seconds accumulated in the current bad streak
    streak_secs: f64,
    state: StreakState,
}

impl StreakDebouncer {
    pub fn new(threshold_secs: f64) -> Self {
        Self {
            threshold_secs,
            streak_secs: 0.0,
            state: StreakState::Quiet,
        }
    }

    /// Feed one observation covering `elapsed_secs`.
    ///
    /// Returns `true` exactly when an alert should be delivered now. A good
    /// observation resets the streak and re-arms the debouncer.
    pub fn observe(&mut self, bad: bool, elapsed_secs: f64) -> bool {
        if !bad {
            self.streak_secs = 0.0;
            self.state = StreakState::Quiet;
            return false;
        }

        self.streak_secs += elapsed_secs.max(0.0);
        if self.state == StreakState::Quiet && self.streak_secs >= self.threshold_secs {
            self.state = StreakState::Alerted;
            return true;
        }
        false
    }

    pub fn streak_secs(&self) -> f64 {
        self.streak_secs
    }

    pub fn state(&self) -> StreakState {
        self.state
    }

    pub fn threshold_secs(&self) -> f64 {
        self.threshold_secs
    }
}
