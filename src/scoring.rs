//! Landmark geometry scoring
//!
//! Computes instantaneous per-frame measurements from a single detector
//! callback: a posture score on the 0-10 scale from pose landmarks, and a
//! focused/not-focused classification from face-mesh landmarks. Everything here
//! is stateless; identical inputs always produce identical outputs.
//!
//! Missing landmarks are never an error. A pose without all seven required
//! points scores 0 (tracking lost counts as worst posture), and a face without
//! the required points counts as not focused.

use crate::config::{FocusConfig, PostureConfig};
use crate::types::{face_index, pose_index, Landmark, LandmarkSet};
use serde::{Deserialize, Serialize};

/// Guards the yaw and pitch ratios against zero-sized faces
const GEOMETRY_EPSILON: f64 = 1e-6;

/// Per-term penalties behind one posture score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PostureBreakdown {
    pub shoulder_tilt_penalty: f64,
    pub lateral_lean_penalty: f64,
    pub forward_head_penalty: f64,
    pub ear_tilt_penalty: f64,
    pub slouch_penalty: f64,
    /// Final score, clamped to `[0, max_score]`
    pub score: f64,
}

/// Head orientation measurements used by the focus classifier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceGeometry {
    /// Normalized left/right difference of nose-to-eye distances (0 = frontal)
    pub yaw_asymmetry: f64,
    /// Vertical nose offset from the forehead-chin midline over face height
    pub pitch_offset: f64,
}

/// The seven pose landmarks the posture score needs
struct PosePoints<'a> {
    nose: &'a Landmark,
    left_ear: &'a Landmark,
    right_ear: &'a Landmark,
    left_shoulder: &'a Landmark,
    right_shoulder: &'a Landmark,
    left_hip: &'a Landmark,
    right_hip: &'a Landmark,
}

impl<'a> PosePoints<'a> {
    fn extract(landmarks: &'a LandmarkSet) -> Option<Self> {
        Some(Self {
            nose: landmarks.get(pose_index::NOSE)?,
            left_ear: landmarks.get(pose_index::LEFT_EAR)?,
            right_ear: landmarks.get(pose_index::RIGHT_EAR)?,
            left_shoulder: landmarks.get(pose_index::LEFT_SHOULDER)?,
            right_shoulder: landmarks.get(pose_index::RIGHT_SHOULDER)?,
            left_hip: landmarks.get(pose_index::LEFT_HIP)?,
            right_hip: landmarks.get(pose_index::RIGHT_HIP)?,
        })
    }
}

/// Posture score of one frame on the 0-10 scale.
///
/// `width` and `height` are the canvas dimensions used to scale normalized
/// coordinates to pixels. Returns 0 when any required landmark is missing.
pub fn posture_score(
    landmarks: &LandmarkSet,
    width: f64,
    height: f64,
    config: &PostureConfig,
) -> f64 {
    posture_breakdown(landmarks, width, height, config)
        .map(|b| b.score)
        .unwrap_or(0.0)
}

/// Posture score with its individual penalty terms.
///
/// Formula:
/// ```text
/// score = 10 - min(shoulder_tilt / 8, 3)
///            - min(lateral_lean / 15, 4)
///            - min(forward_head / 12, 3)
///            - min(ear_tilt / 12, 2)
///            - (3 if torso_span < 140 px)
/// ```
/// Returns `None` when any required landmark is missing.
pub fn posture_breakdown(
    landmarks: &LandmarkSet,
    width: f64,
    height: f64,
    config: &PostureConfig,
) -> Option<PostureBreakdown> {
    let p = PosePoints::extract(landmarks)?;

    let mid_shoulder = p.left_shoulder.midpoint(p.right_shoulder);
    let mid_hip = p.left_hip.midpoint(p.right_hip);

    let shoulder_tilt = (p.left_shoulder.y - p.right_shoulder.y).abs() * height;
    let lateral_lean = (mid_shoulder.x - mid_hip.x).abs() * width;
    let forward_head = (p.nose.x - mid_shoulder.x).abs() * width;
    let ear_tilt = (p.left_ear.y - p.right_ear.y).abs() * height;
    let torso_span = (mid_hip.y - mid_shoulder.y) * height;

    let shoulder_tilt_penalty = capped_penalty(
        shoulder_tilt,
        config.shoulder_tilt_divisor,
        config.shoulder_tilt_cap,
    );
    let lateral_lean_penalty = capped_penalty(
        lateral_lean,
        config.lateral_lean_divisor,
        config.lateral_lean_cap,
    );
    let forward_head_penalty = capped_penalty(
        forward_head,
        config.forward_head_divisor,
        config.forward_head_cap,
    );
    let ear_tilt_penalty =
        capped_penalty(ear_tilt, config.ear_tilt_divisor, config.ear_tilt_cap);
    let slouch_penalty = if torso_span < config.min_torso_span_px {
        config.slouch_penalty
    } else {
        0.0
    };

    let score = (config.max_score
        - shoulder_tilt_penalty
        - lateral_lean_penalty
        - forward_head_penalty
        - ear_tilt_penalty
        - slouch_penalty)
        .clamp(0.0, config.max_score);

    Some(PostureBreakdown {
        shoulder_tilt_penalty,
        lateral_lean_penalty,
        forward_head_penalty,
        ear_tilt_penalty,
        slouch_penalty,
        score,
    })
}

/// `min(measure / divisor, cap)`
fn capped_penalty(measure: f64, divisor: f64, cap: f64) -> f64 {
    (measure / divisor).min(cap)
}

/// Yaw and pitch of a face mesh.
///
/// Returns `None` for meshes with fewer than `min_face_landmarks` points or
/// without the nose, forehead, chin and outer eye corners.
pub fn face_geometry(landmarks: &LandmarkSet, config: &FocusConfig) -> Option<FaceGeometry> {
    if landmarks.len() < config.min_face_landmarks {
        return None;
    }

    let left_eye = landmarks.get(face_index::LEFT_EYE_OUTER)?;
    let right_eye = landmarks.get(face_index::RIGHT_EYE_OUTER)?;
    let nose = landmarks.get(face_index::NOSE_TIP)?;
    let forehead = landmarks.get(face_index::FOREHEAD)?;
    let chin = landmarks.get(face_index::CHIN)?;

    let d_left = nose.distance_2d(left_eye);
    let d_right = nose.distance_2d(right_eye);
    let yaw_asymmetry = ((d_left - d_right) / (d_left + d_right + GEOMETRY_EPSILON)).abs();

    let face_height = (chin.y - forehead.y).abs().max(GEOMETRY_EPSILON);
    let mid_y = (forehead.y + chin.y) / 2.0;
    let pitch_offset = ((nose.y - mid_y) / face_height).abs();

    Some(FaceGeometry {
        yaw_asymmetry,
        pitch_offset,
    })
}

/// Whether the face in this frame is attending to the screen.
///
/// `None` (no face detected) and incomplete meshes are not focused.
pub fn is_focused(landmarks: Option<&LandmarkSet>, config: &FocusConfig) -> bool {
    landmarks
        .and_then(|lm| face_geometry(lm, config))
        .map(|g| classify_focus(&g, config))
        .unwrap_or(false)
}

/// Focused iff both yaw and pitch stay under their thresholds
pub fn classify_focus(geometry: &FaceGeometry, config: &FocusConfig) -> bool {
    geometry.yaw_asymmetry < config.max_yaw_asymmetry
        && geometry.pitch_offset < config.max_pitch_offset
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// An upright seated pose on an 800x500 canvas (scores 10)
    pub fn upright_pose() -> LandmarkSet {
        let mut set = LandmarkSet::with_len(33);
        set.set(pose_index::NOSE, Landmark::new(0.5, 0.25));
        set.set(pose_index::LEFT_EAR, Landmark::new(0.46, 0.25));
        set.set(pose_index::RIGHT_EAR, Landmark::new(0.54, 0.25));
        set.set(pose_index::LEFT_SHOULDER, Landmark::new(0.4, 0.4));
        set.set(pose_index::RIGHT_SHOULDER, Landmark::new(0.6, 0.4));
        set.set(pose_index::LEFT_HIP, Landmark::new(0.42, 0.75));
        set.set(pose_index::RIGHT_HIP, Landmark::new(0.58, 0.75));
        set
    }

    /// A pose collapsed toward the camera that scores 0
    pub fn slumped_pose() -> LandmarkSet {
        let mut set = upright_pose();
        set.set(pose_index::NOSE, Landmark::new(0.65, 0.45));
        set.set(pose_index::LEFT_EAR, Landmark::new(0.6, 0.4));
        set.set(pose_index::RIGHT_EAR, Landmark::new(0.68, 0.5));
        set.set(pose_index::LEFT_SHOULDER, Landmark::new(0.45, 0.55));
        set.set(pose_index::RIGHT_SHOULDER, Landmark::new(0.7, 0.62));
        set
    }

    /// A frontal face mesh with 468 points
    pub fn frontal_face() -> LandmarkSet {
        let mut set = LandmarkSet::from_points(vec![Landmark::new(0.5, 0.5); 468]);
        set.set(face_index::NOSE_TIP, Landmark::new(0.5, 0.5));
        set.set(face_index::LEFT_EYE_OUTER, Landmark::new(0.6, 0.4));
        set.set(face_index::RIGHT_EYE_OUTER, Landmark::new(0.4, 0.4));
        set.set(face_index::FOREHEAD, Landmark::new(0.5, 0.3));
        set.set(face_index::CHIN, Landmark::new(0.5, 0.7));
        set
    }

    /// A face turned well to one side
    pub fn turned_face() -> LandmarkSet {
        let mut set = frontal_face();
        set.set(face_index::NOSE_TIP, Landmark::new(0.56, 0.5));
        set
    }
}
