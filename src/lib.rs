//! Postura - Posture and focus session tracking from body and face landmarks
//!
//! Postura turns per-frame landmark callbacks from an external pose detector and
//! face-mesh detector into live posture and focus scores, spoken-alert
//! decisions, a persisted record per session, and multi-range averages across
//! past sessions:
//! landmarks → scoring → smoothing → accumulation / alert debouncing →
//! session record → history → range summaries.
//!
//! ## Modules
//!
//! - **Session core**: [`session::TrackingSession`] owns one session's state and
//!   is driven by injected timestamps
//! - **Actor**: [`actor::spawn_session`] runs a session on a tokio task with its
//!   countdown ticker
//! - **Replay**: [`pipeline::replay_session`] drives a session from a recorded
//!   frame stream
//! - **Summaries**: [`summary::DashboardSummary`] aggregates the stored history

pub mod accumulator;
pub mod actor;
pub mod alert;
pub mod config;
pub mod countdown;
pub mod error;
pub mod finalizer;
pub mod history;
pub mod pipeline;
pub mod schema;
pub mod scoring;
pub mod session;
pub mod smoothing;
pub mod summary;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use actor::{spawn_session, LandmarkSource, SessionHandle};
pub use alert::{Announcer, LogAnnouncer, SilentAnnouncer};
pub use config::TrackerConfig;
pub use error::TrackerError;
pub use history::{FileStore, KeyValueStore, MemoryStore};
pub use pipeline::{replay_events, replay_session, SessionReplayer};
pub use session::TrackingSession;
pub use summary::DashboardSummary;
pub use types::{Landmark, LandmarkSet, SessionLength, SessionRecord, TrackingMode};

// Schema exports
pub use schema::{FrameEvent, FrameStreamAdapter};

/// Postura library version
pub const POSTURA_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI
pub const PRODUCER_NAME: &str = "postura";
