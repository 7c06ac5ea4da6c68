//! Tracking session state
//!
//! [`TrackingSession`] owns every piece of mutable state of one active session:
//! rolling windows, lifetime sums, per-stream clocks, streak debouncers and the
//! countdown. Pose and face callbacks are independent input ports into the same
//! object; each only touches its own stream's state. Timestamps are injected by
//! the caller, so every handler can be driven deterministically in tests.

use crate::accumulator::{FocusAccumulator, StreamClock};
use crate::alert::{announce_quietly, Announcer, StreakDebouncer};
use crate::config::TrackerConfig;
use crate::countdown::{Countdown, Tick};
use crate::error::TrackerError;
use crate::finalizer::{SessionFinalizer, SessionTotals};
use crate::history::{persist_session, KeyValueStore};
use crate::scoring::{is_focused, posture_score};
use crate::smoothing::{round_one_decimal, FocusVote, LifetimeAverage, PostureWindow};
use crate::types::{focus_percent, LandmarkSet, SessionLength, SessionRecord, TrackingMode};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Result of one pose callback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostureUpdate {
    /// Score of this frame alone (0-10)
    pub raw_score: f64,
    /// Rolling average, rounded to one decimal
    pub rolling_average: f64,
    /// Whole-session average, rounded to one decimal
    pub session_average: f64,
    /// Seconds since the previous pose callback
    pub elapsed_secs: f64,
    /// An alert was delivered on this callback
    pub alerted: bool,
}

/// Result of one face callback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusUpdate {
    /// Classification of this frame alone
    pub raw_focused: bool,
    /// Majority-vote state after this frame
    pub smoothed_focused: bool,
    pub focused_secs: f64,
    pub unfocused_secs: f64,
    pub percent: u8,
    /// An alert was delivered on this callback
    pub alerted: bool,
}

/// Live values for an on-screen display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveSnapshot {
    pub session_id: Uuid,
    pub mode: TrackingMode,
    /// Rolling posture average, rounded to one decimal
    pub posture_current: Option<f64>,
    /// Session posture average, rounded to one decimal
    pub posture_average: Option<f64>,
    pub focused_secs: f64,
    pub unfocused_secs: f64,
    pub focus_percent: u8,
    /// Seconds left on the countdown, `None` when untimed
    pub remaining_secs: Option<u64>,
    pub finalized: bool,
}

/// Posture stream state
#[derive(Debug, Clone)]
struct PostureTrack {
    window: PostureWindow,
    lifetime: LifetimeAverage,
    clock: StreamClock,
    debouncer: StreakDebouncer,
}

/// Focus stream state
#[derive(Debug, Clone)]
struct FocusTrack {
    vote: FocusVote,
    accumulator: FocusAccumulator,
    debouncer: StreakDebouncer,
}

/// One active tracking session
pub struct TrackingSession {
    id: Uuid,
    selected_option: String,
    mode: TrackingMode,
    length: SessionLength,
    config: TrackerConfig,
    announcer: Arc<dyn Announcer>,
    posture: PostureTrack,
    focus: FocusTrack,
    countdown: Countdown,
    finalizer: SessionFinalizer,
}

impl TrackingSession {
    /// Start a session for a mode selection and a duration label.
    ///
    /// The mode must mention "posture" and/or "focus"; unknown duration labels
    /// start an untimed session.
    pub fn new(
        selected_option: &str,
        selected_time: &str,
        config: TrackerConfig,
        announcer: Arc<dyn Announcer>,
    ) -> Result<Self, TrackerError> {
        let mode = TrackingMode::from_selection(selected_option)
            .ok_or_else(|| TrackerError::UnknownMode(selected_option.to_string()))?;
        config.validate()?;

        let length = SessionLength::from_label(selected_time);
        let id = Uuid::new_v4();
        debug!(
            "session {id} started: mode={:?} length={}",
            mode,
            length.label()
        );

        Ok(Self {
            id,
            selected_option: selected_option.to_string(),
            mode,
            length,
            posture: PostureTrack {
                window: PostureWindow::new(config.posture.window),
                lifetime: LifetimeAverage::default(),
                clock: StreamClock::default(),
                debouncer: StreakDebouncer::new(config.posture.alert_after_secs),
            },
            focus: FocusTrack {
                vote: FocusVote::new(config.focus.window),
                accumulator: FocusAccumulator::default(),
                debouncer: StreakDebouncer::new(config.focus.alert_after_secs),
            },
            countdown: Countdown::new(length),
            finalizer: SessionFinalizer::default(),
            config,
            announcer,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn mode(&self) -> TrackingMode {
        self.mode
    }

    pub fn length(&self) -> SessionLength {
        self.length
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn is_finalized(&self) -> bool {
        self.finalizer.is_finalized()
    }

    /// Handle a pose callback at monotonic time `at_ms`.
    ///
    /// `width`/`height` are the canvas dimensions used for pixel scaling.
    /// Returns `None` when the session does not track posture or has ended.
    pub fn on_pose(
        &mut self,
        landmarks: &LandmarkSet,
        width: f64,
        height: f64,
        at_ms: f64,
    ) -> Option<PostureUpdate> {
        if !self.mode.tracks_posture() || self.is_finalized() {
            return None;
        }

        let raw_score = posture_score(landmarks, width, height, &self.config.posture);
        let rolling = self.posture.window.push(raw_score);
        self.posture.lifetime.push(raw_score);

        let elapsed_secs = self.posture.clock.advance(at_ms).unwrap_or(0.0);
        let bad = rolling < self.config.posture.bad_threshold;
        let alerted = self.posture.debouncer.observe(bad, elapsed_secs);
        if alerted {
            info!(
                "session {}: posture below {} for {:.1}s",
                self.id,
                self.config.posture.bad_threshold,
                self.posture.debouncer.streak_secs()
            );
            announce_quietly(self.announcer.as_ref(), &self.config.alerts.posture_message);
        }

        Some(PostureUpdate {
            raw_score,
            rolling_average: round_one_decimal(rolling),
            session_average: self
                .posture
                .lifetime
                .display_average()
                .unwrap_or(raw_score),
            elapsed_secs,
            alerted,
        })
    }

    /// Handle a face callback at monotonic time `at_ms`.
    ///
    /// `None` landmarks mean no face was detected in the frame, which counts
    /// as not focused. Returns `None` when the session does not track focus or
    /// has ended.
    pub fn on_face(&mut self, landmarks: Option<&LandmarkSet>, at_ms: f64) -> Option<FocusUpdate> {
        if !self.mode.tracks_focus() || self.is_finalized() {
            return None;
        }

        let raw_focused = is_focused(landmarks, &self.config.focus);
        let smoothed = self.focus.vote.push(raw_focused);

        let mut alerted = false;
        if let Some(elapsed) = self.focus.accumulator.observe(at_ms, smoothed) {
            alerted = self.focus.debouncer.observe(!smoothed, elapsed);
            if alerted {
                info!(
                    "session {}: unfocused for {:.1}s",
                    self.id,
                    self.focus.debouncer.streak_secs()
                );
                announce_quietly(self.announcer.as_ref(), &self.config.alerts.focus_message);
            }
        }

        let acc = &self.focus.accumulator;
        Some(FocusUpdate {
            raw_focused,
            smoothed_focused: smoothed,
            focused_secs: acc.focused_secs(),
            unfocused_secs: acc.unfocused_secs(),
            percent: focus_percent(acc.focused_secs(), acc.unfocused_secs()),
            alerted,
        })
    }

    /// Advance the countdown by one second. Ended sessions report `Done`.
    pub fn tick(&mut self) -> Tick {
        if self.is_finalized() {
            return Tick::Done;
        }
        let tick = self.countdown.tick();
        if tick == Tick::Expired {
            info!("session {}: planned time of {} elapsed", self.id, self.length.label());
        }
        tick
    }

    /// Live values for display
    pub fn snapshot(&self) -> LiveSnapshot {
        let acc = &self.focus.accumulator;
        LiveSnapshot {
            session_id: self.id,
            mode: self.mode,
            posture_current: self.posture.window.display_average(),
            posture_average: self.posture.lifetime.display_average(),
            focused_secs: acc.focused_secs(),
            unfocused_secs: acc.unfocused_secs(),
            focus_percent: focus_percent(acc.focused_secs(), acc.unfocused_secs()),
            remaining_secs: self.countdown.remaining_secs(),
            finalized: self.is_finalized(),
        }
    }

    /// Current accumulated totals
    pub fn totals(&self) -> SessionTotals {
        SessionTotals {
            selected_option: self.selected_option.clone(),
            mode: self.mode,
            length: self.length,
            posture_average: self.posture.lifetime.average(),
            focused_secs: self.focus.accumulator.focused_secs(),
            unfocused_secs: self.focus.accumulator.unfocused_secs(),
        }
    }

    /// End the session and produce its record.
    ///
    /// Only the first call returns a record; later calls return `None`, so a
    /// countdown expiry racing a manual stop yields a single record.
    pub fn finalize(&mut self, now: DateTime<Utc>) -> Option<SessionRecord> {
        let record = self.finalizer.finalize(&self.totals(), now)?;
        info!(
            "session {} finalized: posture={:?} focus={:?}",
            self.id,
            record.posture_avg,
            record.focus_stats.as_ref().map(|s| s.percent)
        );
        Some(record)
    }

    /// Finalize and persist in one step. Persistence failures are logged only.
    pub fn finish(
        &mut self,
        store: &dyn KeyValueStore,
        now: DateTime<Utc>,
    ) -> Option<SessionRecord> {
        let record = self.finalize(now)?;
        persist_session(store, &record);
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::fixtures::{BrokenAnnouncer, RecordingAnnouncer};
    use crate::history::{load_history, load_last_session, MemoryStore};
    use crate::scoring::fixtures::{frontal_face, slumped_pose, turned_face, upright_pose};
    use chrono::TimeZone;

    const W: f64 = 800.0;
    const H: f64 = 500.0;

    fn session(option: &str, time: &str) -> (TrackingSession, RecordingAnnouncer) {
        let announcer = RecordingAnnouncer::default();
        let session = TrackingSession::new(
            option,
            time,
            TrackerConfig::default(),
            Arc::new(announcer.clone()),
        )
        .unwrap();
        (session, announcer)
    }

    /// Feed pose frames every 100 ms for `secs`, starting at `*at_ms`
    fn feed_pose(s: &mut TrackingSession, pose: &LandmarkSet, at_ms: &mut f64, secs: f64) {
        let frames = (secs * 10.0).round() as usize;
        for _ in 0..frames {
            *at_ms += 100.0;
            s.on_pose(pose, W, H, *at_ms);
        }
    }

    /// Feed face frames every 100 ms for `secs`, starting at `*at_ms`
    fn feed_face(s: &mut TrackingSession, face: Option<&LandmarkSet>, at_ms: &mut f64, secs: f64) {
        let frames = (secs * 10.0).round() as usize;
        for _ in 0..frames {
            *at_ms += 100.0;
            s.on_face(face, *at_ms);
        }
    }

    #[test]
    fn test_rejects_unknown_mode() {
        let result = TrackingSession::new(
            "Meditation",
            "30m",
            TrackerConfig::default(),
            Arc::new(RecordingAnnouncer::default()),
        );
        assert!(matches!(result, Err(TrackerError::UnknownMode(_))));
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = TrackerConfig::default();
        config.focus.window = 0;
        let result = TrackingSession::new(
            "Focus",
            "None",
            config,
            Arc::new(RecordingAnnouncer::default()),
        );
        assert!(matches!(result, Err(TrackerError::InvalidConfig(_))));
    }

    #[test]
    fn test_pose_updates_scores() {
        let (mut s, _) = session("Posture", "None");

        let first = s.on_pose(&upright_pose(), W, H, 0.0).unwrap();
        assert!((first.raw_score - 10.0).abs() < 1e-9);
        assert_eq!(first.rolling_average, 10.0);
        assert_eq!(first.elapsed_secs, 0.0);

        let second = s.on_pose(&slumped_pose(), W, H, 200.0).unwrap();
        assert_eq!(second.raw_score, 0.0);
        assert_eq!(second.rolling_average, 5.0);
        assert_eq!(second.session_average, 5.0);
        assert!((second.elapsed_secs - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_rolling_and_lifetime_diverge() {
        let (mut s, _) = session("Posture", "None");
        let mut at = 0.0;

        feed_pose(&mut s, &slumped_pose(), &mut at, 2.0);
        feed_pose(&mut s, &upright_pose(), &mut at, 1.0);

        let snapshot = s.snapshot();
        // Window holds the last 10 frames, all upright
        assert_eq!(snapshot.posture_current, Some(10.0));
        // 20 frames of 0 and 10 frames of 10
        assert_eq!(snapshot.posture_average, Some(3.3));
    }

    #[test]
    fn test_posture_alert_once_per_streak() {
        let (mut s, announcer) = session("Posture", "None");
        let mut at = 0.0;
        s.on_pose(&slumped_pose(), W, H, at);

        feed_pose(&mut s, &slumped_pose(), &mut at, 6.0);
        assert_eq!(announcer.count(), 1);

        feed_pose(&mut s, &slumped_pose(), &mut at, 6.0);
        assert_eq!(announcer.count(), 1);

        // Recovery: the rolling average climbs back above the threshold
        feed_pose(&mut s, &upright_pose(), &mut at, 2.0);
        assert_eq!(announcer.count(), 1);

        feed_pose(&mut s, &slumped_pose(), &mut at, 6.0);
        assert_eq!(announcer.count(), 2);
        assert_eq!(
            announcer.messages(),
            vec!["Please Adjust Your Posture".to_string(); 2]
        );
    }

    #[test]
    fn test_no_posture_alert_below_threshold_time() {
        let (mut s, announcer) = session("Posture", "None");
        let mut at = 0.0;
        s.on_pose(&slumped_pose(), W, H, at);
        feed_pose(&mut s, &slumped_pose(), &mut at, 4.5);
        assert_eq!(announcer.count(), 0);
    }

    #[test]
    fn test_focus_accrual_and_alert() {
        let (mut s, announcer) = session("Focus", "None");
        let face = frontal_face();
        let away = turned_face();
        let mut at = 0.0;

        s.on_face(Some(&face), at);
        feed_face(&mut s, Some(&face), &mut at, 5.0);
        let snapshot = s.snapshot();
        assert!((snapshot.focused_secs - 5.0).abs() < 1e-6);
        assert_eq!(snapshot.unfocused_secs, 0.0);

        // Looking away: majority flips after a few frames, alert after 10 s
        feed_face(&mut s, Some(&away), &mut at, 12.0);
        assert_eq!(announcer.count(), 1);
        assert_eq!(announcer.messages()[0], "Please Focus");

        // No face at all still counts as unfocused, still one alert
        feed_face(&mut s, None, &mut at, 5.0);
        assert_eq!(announcer.count(), 1);

        let snapshot = s.snapshot();
        let total = snapshot.focused_secs + snapshot.unfocused_secs;
        assert!((total - 22.0).abs() < 1e-6);
        assert!(snapshot.unfocused_secs > 16.0);
    }

    #[test]
    fn test_focus_totals_track_observed_time() {
        let (mut s, _) = session("Focus", "None");
        let face = frontal_face();
        let away = turned_face();
        let mut at = 1_000.0;
        s.on_face(Some(&face), at);

        for step in 0..300u32 {
            at += 33.0 + f64::from(step % 7) * 11.0;
            let frame = if (step / 20) % 2 == 0 { &face } else { &away };
            s.on_face(Some(frame), at);
        }

        let snapshot = s.snapshot();
        let total = snapshot.focused_secs + snapshot.unfocused_secs;
        assert!((total - (at - 1_000.0) / 1000.0).abs() < 1e-6);
    }

    #[test]
    fn test_streams_are_independent() {
        let (mut s, _) = session("Focus & Posture", "None");
        let face = frontal_face();

        s.on_face(Some(&face), 0.0);
        // Pose callbacks do not advance the focus clock
        s.on_pose(&upright_pose(), W, H, 500.0);
        s.on_pose(&upright_pose(), W, H, 5_000.0);
        let update = s.on_face(Some(&face), 1_000.0).unwrap();

        assert!((update.focused_secs - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_mode_gates_streams() {
        let (mut posture_only, _) = session("Posture", "None");
        assert!(posture_only.on_face(Some(&frontal_face()), 0.0).is_none());

        let (mut focus_only, _) = session("Focus", "None");
        assert!(focus_only.on_pose(&upright_pose(), W, H, 0.0).is_none());
    }

    #[test]
    fn test_failed_announcer_does_not_disturb_tracking() {
        let mut s = TrackingSession::new(
            "Posture",
            "None",
            TrackerConfig::default(),
            Arc::new(BrokenAnnouncer),
        )
        .unwrap();
        let mut at = 0.0;
        s.on_pose(&slumped_pose(), W, H, at);
        feed_pose(&mut s, &slumped_pose(), &mut at, 6.0);

        let update = s.on_pose(&slumped_pose(), W, H, at + 100.0).unwrap();
        assert_eq!(update.rolling_average, 0.0);
        assert_eq!(s.snapshot().posture_current, Some(0.0));
    }

    #[test]
    fn test_countdown_expiry_then_stop_persists_once() {
        let (mut s, _) = session("Focus & Posture", "30m");
        let store = MemoryStore::new();
        let mut at = 0.0;
        s.on_face(Some(&frontal_face()), at);
        feed_face(&mut s, Some(&frontal_face()), &mut at, 3.0);
        s.on_pose(&upright_pose(), W, H, at);

        let mut expired = false;
        for _ in 0..1800 {
            if s.tick() == Tick::Expired {
                expired = true;
                assert!(s.finish(&store, Utc::now()).is_some());
            }
        }
        assert!(expired);

        // Manual stop arriving just after expiry
        assert!(s.finish(&store, Utc::now()).is_none());
        assert_eq!(s.tick(), Tick::Done);
        assert_eq!(load_history(&store).len(), 1);

        let record = load_last_session(&store).unwrap();
        assert_eq!(record.selected_time, "30m");
        assert_eq!(record.posture_avg, Some(1.0));
        assert_eq!(record.focus_stats.unwrap().percent, 100);
    }

    #[test]
    fn test_finalized_session_ignores_frames() {
        let (mut s, announcer) = session("Focus & Posture", "None");
        s.finalize(Utc.timestamp_millis_opt(0).unwrap()).unwrap();

        assert!(s.on_pose(&slumped_pose(), W, H, 10_000.0).is_none());
        assert!(s.on_face(None, 20_000.0).is_none());
        assert_eq!(announcer.count(), 0);
        assert!(s.snapshot().finalized);
    }

    #[test]
    fn test_record_reflects_session() {
        let (mut s, _) = session("Posture", "1h");
        let mut at = 0.0;
        s.on_pose(&upright_pose(), W, H, at);
        feed_pose(&mut s, &slumped_pose(), &mut at, 0.1);

        let now = Utc.timestamp_millis_opt(1_234_567).unwrap();
        let record = s.finalize(now).unwrap();

        assert_eq!(record.timestamp_ms(), 1_234_567);
        assert_eq!(record.selected_option, "Posture");
        assert_eq!(record.posture_avg, Some(0.5));
        assert_eq!(record.focus_stats, None);
        assert_eq!(record.selected_time, "1h");
        assert_eq!(s.snapshot().remaining_secs, Some(3600));
    }
}
