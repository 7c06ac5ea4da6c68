//! Tracker configuration
//!
//! Every tunable threshold of the scorers, smoothers and alert debouncers lives
//! here so that tuning and testing never require source edits. Configuration is
//! plain JSON; missing fields fall back to the defaults below.

use crate::error::TrackerError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default posture rolling window (samples)
pub const DEFAULT_POSTURE_WINDOW: usize = 10;

/// Default focus smoothing window (samples)
pub const DEFAULT_FOCUS_WINDOW: usize = 8;

/// Posture geometry and alert thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostureConfig {
    /// Highest possible score
    pub max_score: f64,
    /// Pixels of shoulder height difference per penalty point
    pub shoulder_tilt_divisor: f64,
    pub shoulder_tilt_cap: f64,
    /// Pixels of shoulder/hip horizontal offset per penalty point
    pub lateral_lean_divisor: f64,
    pub lateral_lean_cap: f64,
    /// Pixels of nose/shoulder horizontal offset per penalty point
    pub forward_head_divisor: f64,
    pub forward_head_cap: f64,
    /// Pixels of ear height difference per penalty point
    pub ear_tilt_divisor: f64,
    pub ear_tilt_cap: f64,
    /// Torso spans shorter than this (pixels) count as slouching
    pub min_torso_span_px: f64,
    pub slouch_penalty: f64,
    /// Rolling window size (samples)
    pub window: usize,
    /// Rolling averages below this are "bad"
    pub bad_threshold: f64,
    /// Continuous bad seconds before an alert
    pub alert_after_secs: f64,
}

impl Default for PostureConfig {
    fn default() -> Self {
        Self {
            max_score: 10.0,
            shoulder_tilt_divisor: 8.0,
            shoulder_tilt_cap: 3.0,
            lateral_lean_divisor: 15.0,
            lateral_lean_cap: 4.0,
            forward_head_divisor: 12.0,
            forward_head_cap: 3.0,
            ear_tilt_divisor: 12.0,
            ear_tilt_cap: 2.0,
            min_torso_span_px: 140.0,
            slouch_penalty: 3.0,
            window: DEFAULT_POSTURE_WINDOW,
            bad_threshold: 4.0,
            alert_after_secs: 5.0,
        }
    }
}

/// Focus geometry and alert thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusConfig {
    /// Face meshes with fewer points are treated as not focused
    pub min_face_landmarks: usize,
    /// Yaw asymmetry must stay below this
    pub max_yaw_asymmetry: f64,
    /// Pitch offset must stay below this
    pub max_pitch_offset: f64,
    /// Majority-vote window size (samples)
    pub window: usize,
    /// Continuous unfocused seconds before an alert
    pub alert_after_secs: f64,
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            min_face_landmarks: 468,
            max_yaw_asymmetry: 0.12,
            max_pitch_offset: 0.18,
            window: DEFAULT_FOCUS_WINDOW,
            alert_after_secs: 10.0,
        }
    }
}

/// Spoken alert texts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub posture_message: String,
    pub focus_message: String,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            posture_message: "Please Adjust Your Posture".to_string(),
            focus_message: "Please Focus".to_string(),
        }
    }
}

/// Complete tracker configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub posture: PostureConfig,
    pub focus: FocusConfig,
    pub alerts: AlertConfig,
}

impl TrackerConfig {
    /// Load configuration from JSON and validate it
    pub fn from_json(json: &str) -> Result<Self, TrackerError> {
        let config: TrackerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to pretty JSON
    pub fn to_json_pretty(&self) -> Result<String, TrackerError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read and validate a configuration file
    pub fn load(path: &Path) -> Result<Self, TrackerError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Check that windows are non-empty and thresholds are usable
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.posture.window == 0 {
            return Err(TrackerError::InvalidConfig(
                "posture.window must be at least 1".to_string(),
            ));
        }
        if self.focus.window == 0 {
            return Err(TrackerError::InvalidConfig(
                "focus.window must be at least 1".to_string(),
            ));
        }

        let positive = [
            ("posture.max_score", self.posture.max_score),
            ("posture.shoulder_tilt_divisor", self.posture.shoulder_tilt_divisor),
            ("posture.lateral_lean_divisor", self.posture.lateral_lean_divisor),
            ("posture.forward_head_divisor", self.posture.forward_head_divisor),
            ("posture.ear_tilt_divisor", self.posture.ear_tilt_divisor),
            ("focus.max_yaw_asymmetry", self.focus.max_yaw_asymmetry),
            ("focus.max_pitch_offset", self.focus.max_pitch_offset),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(TrackerError::InvalidConfig(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }

        let non_negative = [
            ("posture.shoulder_tilt_cap", self.posture.shoulder_tilt_cap),
            ("posture.lateral_lean_cap", self.posture.lateral_lean_cap),
            ("posture.forward_head_cap", self.posture.forward_head_cap),
            ("posture.ear_tilt_cap", self.posture.ear_tilt_cap),
            ("posture.min_torso_span_px", self.posture.min_torso_span_px),
            ("posture.slouch_penalty", self.posture.slouch_penalty),
            ("posture.bad_threshold", self.posture.bad_threshold),
            ("posture.alert_after_secs", self.posture.alert_after_secs),
            ("focus.alert_after_secs", self.focus.alert_after_secs),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(TrackerError::InvalidConfig(format!(
                    "{name} must be zero or positive, got {value}"
                )));
            }
        }

        Ok(())
    }
}
