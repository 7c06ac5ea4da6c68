//! Session actor
//!
//! Runs one [`TrackingSession`] on its own tokio task. Landmark callbacks, stop
//! and snapshot requests arrive over a channel from any number of
//! [`SessionHandle`]s, and the one-second countdown ticker lives in the same
//! `select!` loop, so the session is never shared between threads.
//!
//! The actor ends on a stop request, on countdown expiry, or once every handle
//! has been dropped. On every exit path the ticker stops and each registered
//! [`LandmarkSource`] is told to stop.

use crate::countdown::Tick;
use crate::error::TrackerError;
use crate::history::{persist_session, KeyValueStore};
use crate::session::{LiveSnapshot, TrackingSession};
use crate::types::{LandmarkSet, SessionRecord};
use chrono::Utc;
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{self, JoinHandle};
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use uuid::Uuid;

const COMMAND_BUFFER: usize = 64;
const TICK_PERIOD: Duration = Duration::from_secs(1);

/// A running landmark producer (camera plus detector) feeding a session
pub trait LandmarkSource: Send {
    fn name(&self) -> &str;

    /// Release the camera and stop producing callbacks
    fn stop(&mut self);
}

enum Command {
    Pose {
        landmarks: LandmarkSet,
        width: f64,
        height: f64,
        at_ms: f64,
    },
    Face {
        landmarks: Option<LandmarkSet>,
        at_ms: f64,
    },
    Snapshot(oneshot::Sender<LiveSnapshot>),
    Stop(oneshot::Sender<Option<SessionRecord>>),
}

/// Why the actor ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Stopped,
    Expired,
    /// Every handle was dropped before the session ended; nothing is recorded
    Abandoned,
}

/// Final result of an actor task
#[derive(Debug, Clone, PartialEq)]
pub struct ActorExit {
    pub session_id: Uuid,
    pub reason: ExitReason,
    pub record: Option<SessionRecord>,
}

/// Cloneable sender side of a running session
#[derive(Clone)]
pub struct SessionHandle {
    session_id: Uuid,
    tx: mpsc::Sender<Command>,
}

impl SessionHandle {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// The session has ended and accepts no more input
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Deliver a pose callback
    pub async fn pose(
        &self,
        landmarks: LandmarkSet,
        width: f64,
        height: f64,
        at_ms: f64,
    ) -> Result<(), TrackerError> {
        self.send(Command::Pose {
            landmarks,
            width,
            height,
            at_ms,
        })
        .await
    }

    /// Deliver a face callback; `None` when no face was detected
    pub async fn face(&self, landmarks: Option<LandmarkSet>, at_ms: f64) -> Result<(), TrackerError> {
        self.send(Command::Face { landmarks, at_ms }).await
    }

    /// Current live values
    pub async fn snapshot(&self) -> Result<LiveSnapshot, TrackerError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot(reply)).await?;
        rx.await.map_err(|_| TrackerError::SessionClosed)
    }

    /// Stop the session.
    ///
    /// Returns the record when this call ended the session, `None` when it had
    /// already ended (for example by countdown expiry).
    pub async fn stop(&self) -> Result<Option<SessionRecord>, TrackerError> {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Command::Stop(reply)).await.is_err() {
            debug!("session {} already ended; stop ignored", self.session_id);
            return Ok(None);
        }
        Ok(rx.await.unwrap_or(None))
    }

    async fn send(&self, command: Command) -> Result<(), TrackerError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| TrackerError::SessionClosed)
    }
}

/// Start an actor for `session` on the current tokio runtime.
///
/// The record is persisted into `store` when the session ends by stop or
/// expiry. `sources` are stopped when the actor exits.
pub fn spawn_session(
    session: TrackingSession,
    store: Arc<dyn KeyValueStore>,
    sources: Vec<Box<dyn LandmarkSource>>,
) -> (SessionHandle, JoinHandle<ActorExit>) {
    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
    let handle = SessionHandle {
        session_id: session.id(),
        tx,
    };
    let actor = SessionActor {
        session,
        store,
        sources,
        rx,
    };
    (handle, tokio::spawn(actor.run()))
}

struct SessionActor {
    session: TrackingSession,
    store: Arc<dyn KeyValueStore>,
    sources: Vec<Box<dyn LandmarkSource>>,
    rx: mpsc::Receiver<Command>,
}

impl SessionActor {
    async fn run(mut self) -> ActorExit {
        let mut ticker = time::interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let (reason, record) = loop {
            tokio::select! {
                command = self.rx.recv() => match command {
                    Some(Command::Pose { landmarks, width, height, at_ms }) => {
                        self.session.on_pose(&landmarks, width, height, at_ms);
                    }
                    Some(Command::Face { landmarks, at_ms }) => {
                        self.session.on_face(landmarks.as_ref(), at_ms);
                    }
                    Some(Command::Snapshot(reply)) => {
                        let _ = reply.send(self.session.snapshot());
                    }
                    Some(Command::Stop(reply)) => {
                        self.rx.close();
                        let record = self.finish().await;
                        let _ = reply.send(record.clone());
                        break (ExitReason::Stopped, record);
                    }
                    None => {
                        warn!(
                            "session {}: every handle dropped before stop; discarding",
                            self.session.id()
                        );
                        break (ExitReason::Abandoned, None);
                    }
                },
                _ = ticker.tick() => {
                    if self.session.tick() == Tick::Expired {
                        break (ExitReason::Expired, self.finish().await);
                    }
                }
            }
        };

        self.rx.close();
        self.release_sources();
        info!("session {} actor exited: {reason:?}", self.session.id());

        ActorExit {
            session_id: self.session.id(),
            reason,
            record,
        }
    }

    /// Finalize, then persist on the blocking pool since stores may do file I/O
    async fn finish(&mut self) -> Option<SessionRecord> {
        let record = self.session.finalize(Utc::now())?;
        let store = Arc::clone(&self.store);
        let persisted = record.clone();
        match task::spawn_blocking(move || persist_session(store.as_ref(), &persisted)).await {
            Ok(report) => debug!("session {} persisted: {report:?}", self.session.id()),
            Err(e) => warn!("session {}: persisting record failed: {e}", self.session.id()),
        }
        Some(record)
    }

    fn release_sources(&mut self) {
        for mut source in self.sources.drain(..) {
            debug!("stopping landmark source {}", source.name());
            source.stop();
        }
    }
}

impl Drop for SessionActor {
    fn drop(&mut self) {
        // Covers an aborted task
        self.release_sources();
    }
}
