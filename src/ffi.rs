//! FFI bindings for the engagement engine
//!
//! This module provides C-compatible functions for calling the engine from a
//! presentation host. All functions use C strings (null-terminated) and return
//! allocated memory that must be freed by the caller using `engage_free_string`.
//!
//! Capture sessions are opaque handles. The host calls
//! `engage_session_push_frame` once per display refresh; the session throttles
//! itself to the sample interval.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;
use std::slice;

use crate::clock::SystemClock;
use crate::config::EngageConfig;
use crate::pipeline::{practice_summary_json, test_result_json};
use crate::sampler::RgbaFrameSource;
use crate::scheduler::ManualScheduler;
use crate::scoring::{compare_engagement_insight, TimeWindow};
use crate::session::{FrameOutcome, PracticeSession};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

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

// ============================================================================
// Stateless API
// ============================================================================

/// Score practice metrics JSON and return the practice summary JSON.
///
/// # Safety
/// - `metrics_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `engage_free_string`.
/// - Returns NULL on error; call `engage_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn engage_practice_summary(metrics_json: *const c_char) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(metrics_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid metrics string pointer");
            return ptr::null_mut();
        }
    };

    match practice_summary_json(&json_str) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Score test session metrics JSON and return the test result JSON.
///
/// A non-positive `expected_min_sec` or `expected_max_sec` selects the default
/// test window (20-180 seconds).
///
/// # Safety
/// - `metrics_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `engage_free_string`.
/// - Returns NULL on error; call `engage_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn engage_test_result(
    metrics_json: *const c_char,
    expected_min_sec: f64,
    expected_max_sec: f64,
) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(metrics_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid metrics string pointer");
            return ptr::null_mut();
        }
    };

    let window = if expected_min_sec > 0.0 && expected_max_sec >= expected_min_sec {
        TimeWindow::new(expected_min_sec, expected_max_sec)
    } else {
        TimeWindow::TEST
    };

    match test_result_json(&json_str, window) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Insight message comparing the two most recent practice engagements.
///
/// Pass a negative value for a session that does not exist.
///
/// # Safety
/// - Returns a newly allocated string that must be freed with `engage_free_string`.
/// - Returns NULL if a score is above 100; call `engage_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn engage_engagement_insight(last: i32, previous: i32) -> *mut c_char {
    clear_last_error();
    if last > 100 || previous > 100 {
        set_last_error(&format!(
            "scores must be within 0-100, got last {last} and previous {previous}"
        ));
        return ptr::null_mut();
    }
    let last = u32::try_from(last).ok();
    let previous = u32::try_from(previous).ok();
    string_to_cstr(compare_engagement_insight(last, previous))
}

// ============================================================================
// Capture Session API
// ============================================================================

/// Opaque handle to a capture session
pub struct EngageSessionHandle {
    session: PracticeSession<SystemClock, ManualScheduler>,
    frames: ManualScheduler,
    source: RgbaFrameSource,
}

/// Create a capture session.
///
/// `config_json` may be NULL for the default configuration.
///
/// # Safety
/// - `config_json` must be NULL or a valid null-terminated C string.
/// - Returns NULL on error; call `engage_last_error` to get the error message.
/// - The returned handle must be freed with `engage_session_free`.
#[no_mangle]
pub unsafe extern "C" fn engage_session_new(config_json: *const c_char) -> *mut EngageSessionHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        EngageConfig::default()
    } else {
        let json_str = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        };
        match EngageConfig::from_json(&json_str) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    let frames = ManualScheduler::new();
    let handle = Box::new(EngageSessionHandle {
        session: PracticeSession::with_config(SystemClock, frames.clone(), &config.sampler),
        frames,
        source: RgbaFrameSource::new(),
    });
    Box::into_raw(handle)
}

/// Free a capture session, cancelling it if it is still running.
///
/// # Safety
/// - `session` must be a valid pointer returned by `engage_session_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn engage_session_free(session: *mut EngageSessionHandle) {
    if !session.is_null() {
        drop(Box::from_raw(session));
    }
}

/// Start capturing.
///
/// # Safety
/// - `session` must be a valid pointer returned by `engage_session_new`.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn engage_session_start(session: *mut EngageSessionHandle) -> i32 {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }
    let handle = &mut *session;

    match handle.session.start() {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Offer the current camera frame on a display refresh.
///
/// `data` holds `width * height` tightly packed RGBA pixels. Pass NULL (or a
/// zero size) when the camera has no frame yet.
///
/// # Safety
/// - `session` must be a valid pointer returned by `engage_session_new`.
/// - `data` must be NULL or point to `len` readable bytes.
/// - Returns 1 if a sample with motion was recorded, 0 for any other accepted
///   call, and -1 on error.
#[no_mangle]
pub unsafe extern "C" fn engage_session_push_frame(
    session: *mut EngageSessionHandle,
    data: *const u8,
    len: usize,
    width: u32,
    height: u32,
) -> i32 {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }
    let handle = &mut *session;

    if data.is_null() || len == 0 || width == 0 || height == 0 {
        handle.source.clear();
    } else {
        let bytes = slice::from_raw_parts(data, len);
        if let Err(e) = handle.source.push_frame(width, height, bytes) {
            set_last_error(&e.to_string());
            return -1;
        }
    }

    let Some(id) = handle.frames.next_frame() else {
        return 0;
    };
    match handle.session.on_frame(id, &handle.source) {
        FrameOutcome::Sampled { has_motion: true, .. } => 1,
        _ => 0,
    }
}

/// Stop capturing and return the practice metrics JSON.
///
/// # Safety
/// - `session` must be a valid pointer returned by `engage_session_new`.
/// - Returns a newly allocated string that must be freed with `engage_free_string`.
/// - Returns NULL on error; call `engage_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn engage_session_stop(session: *mut EngageSessionHandle) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }
    let handle = &mut *session;

    let metrics = match handle.session.stop() {
        Ok(metrics) => metrics,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };
    handle.source.clear();

    match serde_json::to_string(&metrics) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Abandon a running session without metrics.
///
/// # Safety
/// - `session` must be a valid pointer returned by `engage_session_new`.
/// - Returns 1 if a session was cancelled, 0 if none was running, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn engage_session_cancel(session: *mut EngageSessionHandle) -> i32 {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }
    let handle = &mut *session;
    handle.source.clear();
    i32::from(handle.session.cancel())
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by engine functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by an engine function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn engage_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next engine call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn engage_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn engage_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
