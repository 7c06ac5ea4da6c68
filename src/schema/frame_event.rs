//! Frame stream event definition
//!
//! One event per detector callback, plus a terminating stop marker:
//! - `pose` carries the pose landmarks and the canvas size they are scaled to
//! - `face` carries the face-mesh landmarks, or `null` when no face was found
//! - `stop` ends the session at the given time
//!
//! `at_ms` is a monotonic millisecond clock shared by every event of a recording.

use crate::types::LandmarkSet;
use serde::{Deserialize, Serialize};

/// Which detector stream an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stream {
    Pose,
    Face,
    Stop,
}

impl Stream {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stream::Pose => "pose",
            Stream::Face => "face",
            Stream::Stop => "stop",
        }
    }
}

/// One recorded callback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stream", rename_all = "snake_case")]
pub enum FrameEvent {
    Pose {
        at_ms: f64,
        /// Canvas width in pixels
        width: f64,
        /// Canvas height in pixels
        height: f64,
        #[serde(default)]
        landmarks: LandmarkSet,
    },
    Face {
        at_ms: f64,
        #[serde(default)]
        landmarks: Option<LandmarkSet>,
    },
    Stop {
        at_ms: f64,
    },
}

impl FrameEvent {
    /// Create a pose event
    pub fn pose(at_ms: f64, width: f64, height: f64, landmarks: LandmarkSet) -> Self {
        FrameEvent::Pose {
            at_ms,
            width,
            height,
            landmarks,
        }
    }

    /// Create a face event; `None` means no face was detected
    pub fn face(at_ms: f64, landmarks: Option<LandmarkSet>) -> Self {
        FrameEvent::Face { at_ms, landmarks }
    }

    pub fn stop(at_ms: f64) -> Self {
        FrameEvent::Stop { at_ms }
    }

    pub fn at_ms(&self) -> f64 {
        match self {
            FrameEvent::Pose { at_ms, .. }
            | FrameEvent::Face { at_ms, .. }
            | FrameEvent::Stop { at_ms } => *at_ms,
        }
    }

    pub fn stream(&self) -> Stream {
        match self {
            FrameEvent::Pose { .. } => Stream::Pose,
            FrameEvent::Face { .. } => Stream::Face,
            FrameEvent::Stop { .. } => Stream::Stop,
        }
    }

    /// Validate the event fields
    pub fn validate(&self) -> Result<(), ValidationError> {
        let at_ms = self.at_ms();
        if !at_ms.is_finite() || at_ms < 0.0 {
            return Err(ValidationError::InvalidTimestamp {
                stream: self.stream().as_str().to_string(),
                at_ms,
            });
        }

        if let FrameEvent::Pose { width, height, .. } = self {
            let valid = |v: &f64| v.is_finite() && *v > 0.0;
            if !valid(width) || !valid(height) {
                return Err(ValidationError::InvalidCanvas {
                    width: *width,
                    height: *height,
                });
            }
        }

        Ok(())
    }
}

/// Validation errors for frame events
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid {stream} timestamp: {at_ms}")]
    InvalidTimestamp { stream: String, at_ms: f64 },

    #[error("Invalid canvas size: {width}x{height}")]
    InvalidCanvas { width: f64, height: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Landmark;

    #[test]
    fn test_deserialize_pose_event() {
        let json = r#"{
            "stream": "pose",
            "at_ms": 1200.5,
            "width": 640,
            "height": 480,
            "landmarks": [{"x": 0.5, "y": 0.2, "visibility": 0.98}, null, {"x": 0.1, "y": 0.9}]
        }"#;

        let event: FrameEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.stream(), Stream::Pose);
        assert_eq!(event.at_ms(), 1200.5);

        let FrameEvent::Pose { landmarks, width, .. } = event else {
            panic!("expected a pose event");
        };
        assert_eq!(width, 640.0);
        assert_eq!(landmarks.len(), 3);
        assert_eq!(landmarks.get(0).unwrap().visibility, Some(0.98));
        assert!(landmarks.get(1).is_none());
    }

    #[test]
    fn test_deserialize_face_without_face() {
        let event: FrameEvent =
            serde_json::from_str(r#"{"stream": "face", "at_ms": 10, "landmarks": null}"#).unwrap();
        assert_eq!(event, FrameEvent::face(10.0, None));

        let event: FrameEvent = serde_json::from_str(r#"{"stream": "face", "at_ms": 10}"#).unwrap();
        assert_eq!(event, FrameEvent::face(10.0, None));
    }

    #[test]
    fn test_serialize_stream_tag() {
        let event = FrameEvent::face(
            5.0,
            Some(LandmarkSet::from_points(vec![Landmark::new(0.5, 0.5)])),
        );
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""stream":"face""#));

        let json = serde_json::to_string(&FrameEvent::stop(9.0)).unwrap();
        assert_eq!(json, r#"{"stream":"stop","at_ms":9.0}"#);
    }

    #[test]
    fn test_unknown_stream_rejected() {
        let result = serde_json::from_str::<FrameEvent>(r#"{"stream": "hands", "at_ms": 1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_validation() {
        assert!(FrameEvent::stop(0.0).validate().is_ok());
        assert!(matches!(
            FrameEvent::stop(-1.0).validate(),
            Err(ValidationError::InvalidTimestamp { .. })
        ));
        assert!(matches!(
            FrameEvent::pose(1.0, 0.0, 480.0, LandmarkSet::default()).validate(),
            Err(ValidationError::InvalidCanvas { .. })
        ));
        assert!(FrameEvent::pose(1.0, 640.0, 480.0, LandmarkSet::default())
            .validate()
            .is_ok());
    }
}
