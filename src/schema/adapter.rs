//! Reading and writing frame streams
//!
//! Recordings are stored either as a JSON array of events or as NDJSON, one
//! event per line.

use crate::error::TrackerError;
use crate::schema::frame_event::*;

/// Parser and writer for recorded frame streams
pub struct FrameStreamAdapter;

impl FrameStreamAdapter {
    /// Parse a JSON string containing an array of frame events
    pub fn parse_array(json: &str) -> Result<Vec<FrameEvent>, TrackerError> {
        let events: Vec<FrameEvent> = serde_json::from_str(json)?;
        Ok(events)
    }

    /// Parse NDJSON (newline-delimited JSON) containing frame events
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<FrameEvent>, TrackerError> {
        let mut events = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<FrameEvent>(trimmed) {
                Ok(event) => events.push(event),
                Err(e) => {
                    return Err(TrackerError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(events)
    }

    /// Parse either format, deciding by the first non-blank character
    pub fn parse(input: &str) -> Result<Vec<FrameEvent>, TrackerError> {
        if input.trim_start().starts_with('[') {
            Self::parse_array(input)
        } else {
            Self::parse_ndjson(input)
        }
    }

    /// Write events as NDJSON
    pub fn to_ndjson(events: &[FrameEvent]) -> Result<String, TrackerError> {
        let mut out = String::new();
        for event in events {
            out.push_str(&serde_json::to_string(event)?);
            out.push('\n');
        }
        Ok(out)
    }

    /// Validate a batch of events, returning only the failures
    pub fn validate_events(events: &[FrameEvent]) -> Vec<ValidationResult> {
        events
            .iter()
            .enumerate()
            .filter_map(|(idx, event)| {
                event.validate().err().map(|error| ValidationResult {
                    index: idx,
                    stream: event.stream(),
                    error,
                })
            })
            .collect()
    }
}

/// A failed event of a batch
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub index: usize,
    pub stream: Stream,
    pub error: ValidationError,
}
