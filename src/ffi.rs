//! FFI bindings for Postura
//!
//! This module provides C-compatible functions for embedding a tracking session
//! in a host application. Landmarks, snapshots and records cross the boundary
//! as JSON in null-terminated C strings; returned strings are allocated here and
//! must be freed by the caller using `postura_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use log::warn;
use serde::Serialize;

use crate::alert::LogAnnouncer;
use crate::config::TrackerConfig;
use crate::countdown::Tick;
use crate::history::{parse_history, persist_session, FileStore};
use crate::session::TrackingSession;
use crate::summary::DashboardSummary;
use crate::types::{LandmarkSet, SessionRecord};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// `postura_session_tick` result: the countdown is running or the session is untimed
pub const POSTURA_TICK_RUNNING: i32 = 0;
/// `postura_session_tick` result: planned time elapsed on this tick; finalize now
pub const POSTURA_TICK_EXPIRED: i32 = 1;
/// `postura_session_tick` result: the session already ended
pub const POSTURA_TICK_DONE: i32 = 2;

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Serialize `value` into a newly allocated C string, NULL on failure
fn json_to_cstr<T: Serialize>(value: &T) -> *mut c_char {
    match serde_json::to_string(value) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Epoch milliseconds to a timestamp; zero or negative means now
fn timestamp_or_now(epoch_ms: i64) -> DateTime<Utc> {
    if epoch_ms <= 0 {
        return Utc::now();
    }
    Utc.timestamp_millis_opt(epoch_ms)
        .single()
        .unwrap_or_else(Utc::now)
}

// ============================================================================
// Session API
// ============================================================================

/// Opaque handle to a TrackingSession
pub struct PosturaSession {
    session: TrackingSession,
}

/// Create a new tracking session.
///
/// # Safety
/// - `selected_option` must be a valid null-terminated C string naming the mode
///   (e.g. "Focus & Posture").
/// - `selected_time` must be a valid null-terminated C string ("30m", "1h",
///   "1h 30m", "2h" or "None"), or NULL for an untimed session.
/// - `config_json` may be NULL for the default configuration.
/// - Must be freed with `postura_session_free`.
/// - Returns NULL on error; call `postura_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn postura_session_new(
    selected_option: *const c_char,
    selected_time: *const c_char,
    config_json: *const c_char,
) -> *mut PosturaSession {
    clear_last_error();

    let option = match cstr_to_string(selected_option) {
        Some(s) => s,
        None => {
            set_last_error("Invalid selected_option string pointer");
            return ptr::null_mut();
        }
    };
    let time = cstr_to_string(selected_time).unwrap_or_default();

    let config = if config_json.is_null() {
        TrackerConfig::default()
    } else {
        let json = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        };
        match TrackerConfig::from_json(&json) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    match TrackingSession::new(&option, &time, config, Arc::new(LogAnnouncer)) {
        Ok(session) => Box::into_raw(Box::new(PosturaSession { session })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a session.
///
/// # Safety
/// - `session` must be a valid pointer returned by `postura_session_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn postura_session_free(session: *mut PosturaSession) {
    if !session.is_null() {
        drop(Box::from_raw(session));
    }
}

/// Deliver a pose callback and return the update as JSON.
///
/// # Safety
/// - `session` must be a valid pointer returned by `postura_session_new`.
/// - `landmarks_json` must be a valid null-terminated C string holding the
///   landmark array (`null` entries mark absent points).
/// - Returns a newly allocated string that must be freed with `postura_free_string`.
///   The string is `null` when the session does not track posture or has ended.
/// - Returns NULL on error; call `postura_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn postura_session_pose(
    session: *mut PosturaSession,
    landmarks_json: *const c_char,
    width: f64,
    height: f64,
    at_ms: f64,
) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }
    let handle = &mut *session;

    let json = match cstr_to_string(landmarks_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid landmarks string pointer");
            return ptr::null_mut();
        }
    };
    let landmarks: LandmarkSet = match serde_json::from_str(&json) {
        Ok(set) => set,
        Err(e) => {
            set_last_error(&format!("Invalid pose landmarks: {e}"));
            return ptr::null_mut();
        }
    };

    json_to_cstr(&handle.session.on_pose(&landmarks, width, height, at_ms))
}

/// Deliver a face callback and return the update as JSON.
///
/// # Safety
/// - `session` must be a valid pointer returned by `postura_session_new`.
/// - `landmarks_json` must be a valid null-terminated C string holding the face
///   mesh array, or NULL (or `null`) when no face was detected.
/// - Returns a newly allocated string that must be freed with `postura_free_string`.
///   The string is `null` when the session does not track focus or has ended.
/// - Returns NULL on error; call `postura_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn postura_session_face(
    session: *mut PosturaSession,
    landmarks_json: *const c_char,
    at_ms: f64,
) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }
    let handle = &mut *session;

    let landmarks: Option<LandmarkSet> = if landmarks_json.is_null() {
        None
    } else {
        let json = match cstr_to_string(landmarks_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid landmarks string pointer");
                return ptr::null_mut();
            }
        };
        match serde_json::from_str(&json) {
            Ok(set) => set,
            Err(e) => {
                set_last_error(&format!("Invalid face landmarks: {e}"));
                return ptr::null_mut();
            }
        }
    };

    json_to_cstr(&handle.session.on_face(landmarks.as_ref(), at_ms))
}

/// Advance the session countdown by one second.
///
/// # Safety
/// - `session` must be a valid pointer returned by `postura_session_new`.
/// - Returns `POSTURA_TICK_RUNNING`, `POSTURA_TICK_EXPIRED` (call
///   `postura_session_finalize` next) or `POSTURA_TICK_DONE`; -1 on error.
#[no_mangle]
pub unsafe extern "C" fn postura_session_tick(session: *mut PosturaSession) -> i32 {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }
    let handle = &mut *session;

    match handle.session.tick() {
        Tick::Untimed | Tick::Running(_) => POSTURA_TICK_RUNNING,
        Tick::Expired => POSTURA_TICK_EXPIRED,
        Tick::Done => POSTURA_TICK_DONE,
    }
}

/// Return the live values of a session as JSON.
///
/// # Safety
/// - `session` must be a valid pointer returned by `postura_session_new`.
/// - Returns a newly allocated string that must be freed with `postura_free_string`.
/// - Returns NULL on error; call `postura_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn postura_session_snapshot(session: *const PosturaSession) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }
    let handle = &*session;

    json_to_cstr(&handle.session.snapshot())
}

/// End the session and return its record as JSON.
///
/// # Safety
/// - `session` must be a valid pointer returned by `postura_session_new`.
/// - `now_ms` is the wall-clock end time in epoch milliseconds; 0 means now.
/// - `store_dir` may be NULL. Otherwise it must be a valid null-terminated C
///   string naming a directory; the record is persisted there.
/// - Returns a newly allocated string that must be freed with `postura_free_string`.
///   The string is `null` when the session had already been finalized.
/// - Returns NULL on error; call `postura_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn postura_session_finalize(
    session: *mut PosturaSession,
    now_ms: i64,
    store_dir: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }
    let handle = &mut *session;

    let store = if store_dir.is_null() {
        None
    } else {
        match cstr_to_string(store_dir) {
            Some(dir) => Some(FileStore::new(dir)),
            None => {
                set_last_error("Invalid store_dir string pointer");
                return ptr::null_mut();
            }
        }
    };

    let record = handle.session.finalize(timestamp_or_now(now_ms));
    if let (Some(record), Some(store)) = (&record, &store) {
        persist_session(store, record);
    }
    json_to_cstr(&record)
}

// ============================================================================
// Summary API
// ============================================================================

/// Summarize a stored session history for the dashboard.
///
/// # Safety
/// - `history_json` must be a valid null-terminated C string holding the stored
///   history list. Malformed entries are skipped.
/// - `last_session_json` may be NULL. A malformed record is logged and treated
///   as absent.
/// - `now_ms` is the reference time in epoch milliseconds; 0 means now.
/// - Returns a newly allocated string that must be freed with `postura_free_string`.
/// - Returns NULL on error; call `postura_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn postura_summarize(
    history_json: *const c_char,
    last_session_json: *const c_char,
    now_ms: i64,
) -> *mut c_char {
    clear_last_error();

    let history = match cstr_to_string(history_json) {
        Some(s) => parse_history(&s),
        None => {
            set_last_error("Invalid history string pointer");
            return ptr::null_mut();
        }
    };

    let last_session = if last_session_json.is_null() {
        None
    } else {
        match cstr_to_string(last_session_json).map(|s| SessionRecord::from_json(&s)) {
            Some(Ok(record)) => Some(record),
            Some(Err(e)) => {
                warn!("Unable to parse lastSession: {e}");
                None
            }
            None => {
                set_last_error("Invalid last session string pointer");
                return ptr::null_mut();
            }
        }
    };

    let summary = DashboardSummary::build(&history, last_session.as_ref(), timestamp_or_now(now_ms));
    json_to_cstr(&summary)
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Postura functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Postura function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn postura_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Postura function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn postura_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Postura library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn postura_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
