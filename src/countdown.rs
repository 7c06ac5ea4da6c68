//! Session countdown
//!
//! A one-second ticker that counts a timed session down to zero. Expiry is
//! reported exactly once; untimed sessions never expire.

use crate::types::SessionLength;
use serde::{Deserialize, Serialize};

/// Result of one countdown tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Session has no planned length
    Untimed,
    /// Seconds left after this tick
    Running(u64),
    /// The countdown reached zero on this tick
    Expired,
    /// Already expired on an earlier tick
    Done,
}

/// Remaining planned time of a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Countdown {
    remaining_secs: Option<u64>,
    expired: bool,
}

impl Countdown {
    pub fn new(length: SessionLength) -> Self {
        Self::from_seconds(length.seconds())
    }

    pub fn from_seconds(seconds: Option<u64>) -> Self {
        Self {
            remaining_secs: seconds,
            expired: false,
        }
    }

    /// Advance by one second
    pub fn tick(&mut self) -> Tick {
        let Some(remaining) = self.remaining_secs else {
            return Tick::Untimed;
        };
        if self.expired {
            return Tick::Done;
        }
        if remaining <= 1 {
            self.remaining_secs = Some(0);
            self.expired = true;
            return Tick::Expired;
        }
        self.remaining_secs = Some(remaining - 1);
        Tick::Running(remaining - 1)
    }

    /// Seconds left, `None` for untimed sessions
    pub fn remaining_secs(&self) -> Option<u64> {
        self.remaining_secs
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untimed_never_expires() {
        let mut countdown = Countdown::new(SessionLength::Untimed);
        for _ in 0..10_000 {
            assert_eq!(countdown.tick(), Tick::Untimed);
        }
        assert_eq!(countdown.remaining_secs(), None);
        assert!(!countdown.is_expired());
    }

    #[test]
    fn test_expires_after_planned_seconds() {
        let mut countdown = Countdown::new(SessionLength::ThirtyMinutes);
        assert_eq!(countdown.remaining_secs(), Some(1800));

        for expected in (1..1800).rev() {
            assert_eq!(countdown.tick(), Tick::Running(expected));
        }
        assert_eq!(countdown.tick(), Tick::Expired);
        assert_eq!(countdown.remaining_secs(), Some(0));
    }

    #[test]
    fn test_expiry_reported_once() {
        let mut countdown = Countdown::from_seconds(Some(2));
        assert_eq!(countdown.tick(), Tick::Running(1));
        assert_eq!(countdown.tick(), Tick::Expired);
        assert_eq!(countdown.tick(), Tick::Done);
        assert_eq!(countdown.tick(), Tick::Done);
        assert!(countdown.is_expired());
    }
}
