//! Recorded frame stream schema
//!
//! A recording is a sequence of detector callbacks (pose, face) and a stop
//! marker, replayable through a tracking session.

mod adapter;
mod frame_event;

pub use adapter::*;
pub use frame_event::*;
