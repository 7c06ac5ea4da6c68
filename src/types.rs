//! Core types for the Postura tracking core
//!
//! This module defines the data structures that flow through each stage of a
//! session: landmarks from the external detectors, the session selection
//! (mode and planned length), and the persisted session record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pose landmark indices consumed by the posture scorer
pub mod pose_index {
    pub const NOSE: usize = 0;
    pub const LEFT_EAR: usize = 7;
    pub const RIGHT_EAR: usize = 8;
    pub const LEFT_SHOULDER: usize = 11;
    pub const RIGHT_SHOULDER: usize = 12;
    pub const LEFT_HIP: usize = 23;
    pub const RIGHT_HIP: usize = 24;
}

/// Face-mesh landmark indices consumed by the focus classifier
pub mod face_index {
    pub const NOSE_TIP: usize = 1;
    pub const FOREHEAD: usize = 10;
    pub const RIGHT_EYE_OUTER: usize = 33;
    pub const CHIN: usize = 152;
    pub const LEFT_EYE_OUTER: usize = 263;
}

/// A single normalized landmark (coordinates in [0,1] of the frame)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
    /// Detector confidence that the point is visible (pose only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f64>,
}

impl Landmark {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            z: None,
            visibility: None,
        }
    }

    /// Euclidean distance in the image plane
    pub fn distance_2d(&self, other: &Landmark) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Midpoint of two landmarks in the image plane
    pub fn midpoint(&self, other: &Landmark) -> Landmark {
        Landmark::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// Landmarks of one detector callback, indexed by the detector's scheme.
///
/// A slot is absent when the array is shorter than the index or holds `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkSet(Vec<Option<Landmark>>);

impl LandmarkSet {
    /// A set with `len` empty slots
    pub fn with_len(len: usize) -> Self {
        Self(vec![None; len])
    }

    /// A set where every slot is present
    pub fn from_points(points: Vec<Landmark>) -> Self {
        Self(points.into_iter().map(Some).collect())
    }

    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.0.get(index).and_then(|slot| slot.as_ref())
    }

    /// Fill a slot, growing the set if needed
    pub fn set(&mut self, index: usize, landmark: Landmark) {
        if index >= self.0.len() {
            self.0.resize(index + 1, None);
        }
        self.0[index] = Some(landmark);
    }

    /// Clear a slot
    pub fn remove(&mut self, index: usize) {
        if let Some(slot) = self.0.get_mut(index) {
            *slot = None;
        }
    }

    /// Number of slots (present or not)
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// What a session tracks, fixed at session start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingMode {
    Posture,
    Focus,
    Both,
}

impl TrackingMode {
    /// Interpret a selection label such as "Posture", "Focus" or "Focus & Posture".
    ///
    /// Matching is a case-insensitive substring test, so any label mentioning
    /// both keywords selects [`TrackingMode::Both`].
    pub fn from_selection(selection: &str) -> Option<Self> {
        let lower = selection.to_lowercase();
        match (lower.contains("posture"), lower.contains("focus")) {
            (true, true) => Some(TrackingMode::Both),
            (true, false) => Some(TrackingMode::Posture),
            (false, true) => Some(TrackingMode::Focus),
            (false, false) => None,
        }
    }

    pub fn tracks_posture(&self) -> bool {
        matches!(self, TrackingMode::Posture | TrackingMode::Both)
    }

    pub fn tracks_focus(&self) -> bool {
        matches!(self, TrackingMode::Focus | TrackingMode::Both)
    }

    /// Canonical selection label
    pub fn as_label(&self) -> &'static str {
        match self {
            TrackingMode::Posture => "Posture",
            TrackingMode::Focus => "Focus",
            TrackingMode::Both => "Focus & Posture",
        }
    }
}

/// Planned session length chosen at setup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionLength {
    ThirtyMinutes,
    OneHour,
    NinetyMinutes,
    TwoHours,
    Untimed,
}

impl SessionLength {
    pub const ALL: [SessionLength; 5] = [
        SessionLength::ThirtyMinutes,
        SessionLength::OneHour,
        SessionLength::NinetyMinutes,
        SessionLength::TwoHours,
        SessionLength::Untimed,
    ];

    /// Parse a duration label. Empty or unrecognized labels mean untimed.
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "30m" => SessionLength::ThirtyMinutes,
            "1h" => SessionLength::OneHour,
            "1h 30m" => SessionLength::NinetyMinutes,
            "2h" => SessionLength::TwoHours,
            _ => SessionLength::Untimed,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionLength::ThirtyMinutes => "30m",
            SessionLength::OneHour => "1h",
            SessionLength::NinetyMinutes => "1h 30m",
            SessionLength::TwoHours => "2h",
            SessionLength::Untimed => "None",
        }
    }

    /// Countdown target in seconds, `None` when untimed
    pub fn seconds(&self) -> Option<u64> {
        match self {
            SessionLength::ThirtyMinutes => Some(30 * 60),
            SessionLength::OneHour => Some(60 * 60),
            SessionLength::NinetyMinutes => Some(90 * 60),
            SessionLength::TwoHours => Some(120 * 60),
            SessionLength::Untimed => None,
        }
    }
}

/// Cumulative focus statistics of one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusStats {
    /// Seconds spent focused
    pub focused: f64,
    /// Seconds spent away
    pub unfocused: f64,
    /// Focused share of observed time (0-100)
    pub percent: u8,
}

impl FocusStats {
    /// Build stats from elapsed seconds. No observed time counts as fully focused.
    pub fn from_seconds(focused: f64, unfocused: f64) -> Self {
        Self {
            focused,
            unfocused,
            percent: focus_percent(focused, unfocused),
        }
    }
}

/// Focused share of `focused + unfocused`, rounded, 100 when nothing elapsed
pub fn focus_percent(focused: f64, unfocused: f64) -> u8 {
    let total = focused + unfocused;
    if total > 0.0 {
        ((focused / total) * 100.0).round().clamp(0.0, 100.0) as u8
    } else {
        100
    }
}

/// Persisted summary of one completed session (wire and storage format).
///
/// `posture_avg` is stored on the 0-1 scale; use [`SessionRecord::posture_score`]
/// for the 0-10 display scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Session end time, epoch milliseconds on the wire
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    /// Mode label as selected at setup; empty when none was stored
    #[serde(default)]
    pub selected_option: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posture_avg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_stats: Option<FocusStats>,
    /// Duration label as selected at setup
    #[serde(default = "untimed_label")]
    pub selected_time: String,
}

fn untimed_label() -> String {
    SessionLength::Untimed.label().to_string()
}

/// Factor between the 0-10 posture scale and the 0-1 storage scale
pub const POSTURE_STORAGE_SCALE: f64 = 10.0;

impl SessionRecord {
    /// Timestamp in epoch milliseconds
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }

    /// Mode interpreted from the stored selection label
    pub fn mode(&self) -> Option<TrackingMode> {
        TrackingMode::from_selection(&self.selected_option)
    }

    /// Planned length interpreted from the stored label
    pub fn length(&self) -> SessionLength {
        SessionLength::from_label(&self.selected_time)
    }

    /// Average posture on the 0-10 scale
    pub fn posture_score(&self) -> Option<f64> {
        self.posture_avg.map(|avg| avg * POSTURE_STORAGE_SCALE)
    }

    /// Load a record from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize a record to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_mode_from_selection() {
        assert_eq!(TrackingMode::from_selection("Posture"), Some(TrackingMode::Posture));
        assert_eq!(TrackingMode::from_selection("focus"), Some(TrackingMode::Focus));
        assert_eq!(
            TrackingMode::from_selection("Focus & Posture"),
            Some(TrackingMode::Both)
        );
        assert_eq!(TrackingMode::from_selection("POSTURE and FOCUS"), Some(TrackingMode::Both));
        assert_eq!(TrackingMode::from_selection(""), None);
        assert_eq!(TrackingMode::from_selection("Meditation"), None);
    }

    #[test]
    fn test_session_length_labels() {
        assert_eq!(SessionLength::from_label("30m").seconds(), Some(1800));
        assert_eq!(SessionLength::from_label("1h").seconds(), Some(3600));
        assert_eq!(SessionLength::from_label("1h 30m").seconds(), Some(5400));
        assert_eq!(SessionLength::from_label("2h").seconds(), Some(7200));
        assert_eq!(SessionLength::from_label("None").seconds(), None);
        assert_eq!(SessionLength::from_label("").label(), "None");
        assert_eq!(SessionLength::from_label("45m"), SessionLength::Untimed);

        for length in SessionLength::ALL {
            assert_eq!(SessionLength::from_label(length.label()), length);
        }
    }

    #[test]
    fn test_focus_percent() {
        assert_eq!(focus_percent(0.0, 0.0), 100);
        assert_eq!(focus_percent(30.0, 10.0), 75);
        assert_eq!(focus_percent(0.0, 12.0), 0);
        assert_eq!(focus_percent(2.0, 1.0), 67);
    }

    #[test]
    fn test_landmark_set_absent_slots() {
        let json = r#"[{"x":0.1,"y":0.2},null,{"x":0.3,"y":0.4,"z":-0.1}]"#;
        let set: LandmarkSet = serde_json::from_str(json).unwrap();

        assert_eq!(set.len(), 3);
        assert!(set.get(0).is_some());
        assert!(set.get(1).is_none());
        assert_eq!(set.get(2).unwrap().z, Some(-0.1));
        assert!(set.get(40).is_none());
    }

    #[test]
    fn test_record_wire_shape() {
        let record = SessionRecord {
            timestamp: Utc.timestamp_millis_opt(1_700_000_000_123).unwrap(),
            selected_option: "Focus & Posture".to_string(),
            posture_avg: Some(0.73),
            focus_stats: Some(FocusStats::from_seconds(90.5, 29.5)),
            selected_time: "30m".to_string(),
        };

        let value: serde_json::Value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["timestamp"], 1_700_000_000_123i64);
        assert_eq!(value["selectedOption"], "Focus & Posture");
        assert_eq!(value["postureAvg"], 0.73);
        assert_eq!(value["focusStats"]["focused"], 90.5);
        assert_eq!(value["focusStats"]["percent"], 75);
        assert_eq!(value["selectedTime"], "30m");
    }

    #[test]
    fn test_record_round_trip() {
        let record = SessionRecord {
            timestamp: Utc.timestamp_millis_opt(1_700_000_123_456).unwrap(),
            selected_option: "Posture".to_string(),
            posture_avg: Some(0.64),
            focus_stats: None,
            selected_time: "None".to_string(),
        };

        let json = record.to_json().unwrap();
        assert!(!json.contains("focusStats"));

        let loaded = SessionRecord::from_json(&json).unwrap();
        assert_eq!(loaded, record);
        assert_eq!(loaded.mode(), Some(TrackingMode::Posture));
        assert_eq!(loaded.length(), SessionLength::Untimed);
    }

    #[test]
    fn test_record_accepts_null_and_missing_fields() {
        let json = r#"{"timestamp":0,"selectedOption":"Focus","postureAvg":null}"#;
        let record = SessionRecord::from_json(json).unwrap();

        assert_eq!(record.posture_avg, None);
        assert_eq!(record.focus_stats, None);
        assert_eq!(record.selected_time, "None");
    }

    #[test]
    fn test_posture_score_scale() {
        let record = SessionRecord {
            timestamp: Utc.timestamp_millis_opt(0).unwrap(),
            selected_option: "Posture".to_string(),
            posture_avg: Some(0.5),
            focus_stats: None,
            selected_time: "1h".to_string(),
        };
        assert_eq!(record.posture_score(), Some(5.0));
    }
}
