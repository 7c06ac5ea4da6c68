//! Replay pipeline
//!
//! Drives a [`TrackingSession`] from a recorded frame stream. The countdown is
//! derived from the recording's own clock: one tick per full second of `at_ms`
//! elapsed since the first event, applied before the event that crosses it.
//! A session ends on the first of a `stop` event, countdown expiry, or the end
//! of the stream.

use crate::alert::Announcer;
use crate::config::TrackerConfig;
use crate::countdown::Tick;
use crate::error::TrackerError;
use crate::finalizer::encode_record;
use crate::history::{persist_session, KeyValueStore, PersistReport};
use crate::schema::{FrameEvent, FrameStreamAdapter};
use crate::session::TrackingSession;
use crate::types::SessionRecord;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// How a replayed session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// A `stop` event was reached
    Stopped,
    /// The planned duration elapsed
    Expired,
    /// The recording ran out first
    EndOfStream,
}

/// Outcome of a replay
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayReport {
    pub session_id: Uuid,
    pub record: SessionRecord,
    pub ended_by: EndReason,
    /// Events applied to the session
    pub frames_processed: usize,
    /// Events after the session had ended
    pub frames_ignored: usize,
    pub posture_alerts: usize,
    pub focus_alerts: usize,
    /// Present when a store was given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persisted: Option<PersistReport>,
}

/// Replay a recording (JSON array or NDJSON) through a new session.
///
/// # Arguments
/// * `input` - The recorded frame stream
/// * `selected_option` - Mode selection, e.g. "Focus & Posture"
/// * `selected_time` - Duration label, e.g. "30m" or "None"
/// * `store` - When given, the record is persisted into it
/// * `now` - Wall-clock time stamped on the record
pub fn replay_session(
    input: &str,
    selected_option: &str,
    selected_time: &str,
    config: TrackerConfig,
    announcer: Arc<dyn Announcer>,
    store: Option<&dyn KeyValueStore>,
    now: DateTime<Utc>,
) -> Result<ReplayReport, TrackerError> {
    let events = FrameStreamAdapter::parse(input)?;
    replay_events(
        &events,
        selected_option,
        selected_time,
        config,
        announcer,
        store,
        now,
    )
}

/// Replay already parsed events through a new session.
pub fn replay_events(
    events: &[FrameEvent],
    selected_option: &str,
    selected_time: &str,
    config: TrackerConfig,
    announcer: Arc<dyn Announcer>,
    store: Option<&dyn KeyValueStore>,
    now: DateTime<Utc>,
) -> Result<ReplayReport, TrackerError> {
    let session = TrackingSession::new(selected_option, selected_time, config, announcer)?;

    let mut replayer = SessionReplayer::new(session);
    for event in events {
        replayer.push(event, now)?;
    }
    Ok(replayer.finish(store, now))
}

/// Stateful replayer for feeding events incrementally.
pub struct SessionReplayer {
    session: TrackingSession,
    origin_ms: Option<f64>,
    ticks_applied: u64,
    ended_by: Option<EndReason>,
    record: Option<SessionRecord>,
    frames_processed: usize,
    frames_ignored: usize,
    posture_alerts: usize,
    focus_alerts: usize,
}

impl SessionReplayer {
    pub fn new(session: TrackingSession) -> Self {
        Self {
            session,
            origin_ms: None,
            ticks_applied: 0,
            ended_by: None,
            record: None,
            frames_processed: 0,
            frames_ignored: 0,
            posture_alerts: 0,
            focus_alerts: 0,
        }
    }

    pub fn session(&self) -> &TrackingSession {
        &self.session
    }

    /// Why the session ended, if it has
    pub fn ended_by(&self) -> Option<EndReason> {
        self.ended_by
    }

    /// Apply one event. Returns the record when this event ended the session.
    pub fn push(
        &mut self,
        event: &FrameEvent,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>, TrackerError> {
        event
            .validate()
            .map_err(|e| TrackerError::ParseError(format!("Invalid event: {e}")))?;

        if self.ended_by.is_some() {
            self.frames_ignored += 1;
            return Ok(None);
        }

        if let Some(record) = self.advance_countdown(event.at_ms(), now) {
            self.frames_ignored += 1;
            return Ok(Some(record));
        }

        self.frames_processed += 1;
        match event {
            FrameEvent::Pose {
                at_ms,
                width,
                height,
                landmarks,
            } => {
                let update = self.session.on_pose(landmarks, *width, *height, *at_ms);
                if update.is_some_and(|u| u.alerted) {
                    self.posture_alerts += 1;
                }
            }
            FrameEvent::Face { at_ms, landmarks } => {
                let update = self.session.on_face(landmarks.as_ref(), *at_ms);
                if update.is_some_and(|u| u.alerted) {
                    self.focus_alerts += 1;
                }
            }
            FrameEvent::Stop { .. } => {
                return Ok(self.end(EndReason::Stopped, now));
            }
        }
        Ok(None)
    }

    /// Apply the countdown ticks due by `at_ms`
    fn advance_countdown(&mut self, at_ms: f64, now: DateTime<Utc>) -> Option<SessionRecord> {
        let origin = *self.origin_ms.get_or_insert(at_ms);
        let due = ((at_ms - origin).max(0.0) / 1000.0).floor() as u64;

        while self.ticks_applied < due {
            self.ticks_applied += 1;
            match self.session.tick() {
                Tick::Expired => return self.end(EndReason::Expired, now),
                Tick::Untimed | Tick::Done => {
                    // Nothing left to count down
                    self.ticks_applied = due;
                }
                Tick::Running(_) => {}
            }
        }
        None
    }

    fn end(&mut self, reason: EndReason, now: DateTime<Utc>) -> Option<SessionRecord> {
        self.ended_by = Some(reason);
        let record = self.session.finalize(now);
        debug!("replay of session {} ended: {reason:?}", self.session.id());
        self.record.clone_from(&record);
        record
    }

    /// End the replay and build the report, persisting into `store` if given.
    pub fn finish(mut self, store: Option<&dyn KeyValueStore>, now: DateTime<Utc>) -> ReplayReport {
        if self.ended_by.is_none() {
            self.end(EndReason::EndOfStream, now);
        }
        let ended_by = self.ended_by.unwrap_or(EndReason::EndOfStream);

        let record = match self.record.take() {
            Some(record) => record,
            None => {
                // The session was finalized outside the replayer
                warn!(
                    "session {} had no record; encoding current totals",
                    self.session.id()
                );
                encode_record(&self.session.totals(), now)
            }
        };

        let persisted = store.map(|store| persist_session(store, &record));

        ReplayReport {
            session_id: self.session.id(),
            record,
            ended_by,
            frames_processed: self.frames_processed,
            frames_ignored: self.frames_ignored,
            posture_alerts: self.posture_alerts,
            focus_alerts: self.focus_alerts,
            persisted,
        }
    }
}
