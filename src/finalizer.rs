//! Session finalization
//!
//! Packages the accumulated state of a session into its immutable
//! [`SessionRecord`]. A session is finalized at most once: whichever of the
//! countdown expiry or the manual stop arrives first produces the record, and
//! any later attempt yields nothing.

use crate::smoothing::round_one_decimal;
use crate::types::{FocusStats, SessionLength, SessionRecord, TrackingMode, POSTURE_STORAGE_SCALE};
use chrono::{DateTime, Utc};
use log::debug;

/// Accumulated totals of a session at the moment it ends
#[derive(Debug, Clone, PartialEq)]
pub struct SessionTotals {
    pub selected_option: String,
    pub mode: TrackingMode,
    pub length: SessionLength,
    /// Lifetime posture average on the 0-10 scale, `None` without samples
    pub posture_average: Option<f64>,
    pub focused_secs: f64,
    pub unfocused_secs: f64,
}

/// Convert a 0-10 posture average to the 0-1 storage scale.
///
/// The average is rounded to one decimal first, as shown live.
pub fn posture_to_storage(average: f64) -> f64 {
    round_one_decimal(average) / POSTURE_STORAGE_SCALE
}

/// Build the record for `totals` ending at `now`.
///
/// Posture is recorded only for modes that track it and only when samples
/// exist; focus statistics only for modes that track focus.
pub fn encode_record(totals: &SessionTotals, now: DateTime<Utc>) -> SessionRecord {
    let posture_avg = if totals.mode.tracks_posture() {
        totals.posture_average.map(posture_to_storage)
    } else {
        None
    };
    let focus_stats = if totals.mode.tracks_focus() {
        Some(FocusStats::from_seconds(
            totals.focused_secs,
            totals.unfocused_secs,
        ))
    } else {
        None
    };

    SessionRecord {
        timestamp: now,
        selected_option: totals.selected_option.clone(),
        posture_avg,
        focus_stats,
        selected_time: totals.length.label().to_string(),
    }
}

/// One-shot guard around [`encode_record`]
#[derive(Debug, Clone, Default)]
pub struct SessionFinalizer {
    finalized_at: Option<DateTime<Utc>>,
}

impl SessionFinalizer {
    /// Produce the record on the first call; every later call returns `None`
    pub fn finalize(&mut self, totals: &SessionTotals, now: DateTime<Utc>) -> Option<SessionRecord> {
        if let Some(at) = self.finalized_at {
            debug!("session already finalized at {at}; ignoring");
            return None;
        }
        self.finalized_at = Some(now);
        Some(encode_record(totals, now))
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized_at.is_some()
    }

    pub fn finalized_at(&self) -> Option<DateTime<Utc>> {
        self.finalized_at
    }
}
