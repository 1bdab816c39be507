//! C ABI over [`Session`].
//!
//! Every buffer crossing the boundary lives in the session's arena and is
//! named by a non-zero `u64` handle. Functions returning a handle give the
//! caller ownership of a fresh buffer; the caller must pass it to
//! [`th_release`] exactly once.
//!
//! Failures are signalled by a sentinel (`0` handle, `-1`, `NaN` or a null
//! pointer) and leave a message in a thread-local slot, prefixed with the
//! pipeline stage (`"fit: ..."`), readable through
//! [`th_last_error_message`].
//!
//! Pointers from [`th_buffer_f64_ptr`] / [`th_buffer_bytes_ptr`] stay valid
//! until the buffer is released or the session is freed.

use std::cell::RefCell;
use std::ffi::{CStr, CString, c_char};
use std::ptr;

use crate::arena::{ArenaError, BufferHandle};
use crate::error::{Error, Result, Stage};
use crate::io::{ReadError, ReaderConfig, TimeEncoding};
use crate::session::Session;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(message: String) {
    let message = CString::new(message.replace('\0', "")).unwrap_or_default();
    LAST_ERROR.with(|slot| {
        *slot.borrow_mut() = Some(message);
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|slot| {
        *slot.borrow_mut() = None;
    });
}

fn finish<T>(result: Result<T>, fallback: T) -> T {
    match result {
        Ok(value) => {
            clear_last_error();
            value
        }
        Err(e) => {
            set_last_error(e.staged_message());
            fallback
        }
    }
}

/// # Safety
/// `session` must be null or a pointer from [`th_session_new`] not yet freed.
unsafe fn session_mut<'a>(session: *mut Session) -> Result<&'a mut Session> {
    // SAFETY: caller guarantees the pointer is null or live.
    unsafe { session.as_mut() }.ok_or(Error::NotReady {
        stage: Stage::Buffer,
        missing: "a non-null session",
    })
}

fn handle(raw: u64) -> Result<BufferHandle> {
    BufferHandle::from_raw(raw).ok_or_else(|| ArenaError::InvalidHandle(raw).into())
}

/// Copy `text` into a caller buffer with a trailing NUL, truncating if
/// needed. Returns the full length of `text`.
unsafe fn copy_str(text: &str, buffer: *mut c_char, capacity: usize) -> usize {
    let bytes = text.as_bytes();
    if capacity > 0 && !buffer.is_null() {
        let to_copy = bytes.len().min(capacity - 1);
        // SAFETY: caller guarantees `buffer` holds `capacity` bytes.
        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr() as *const c_char, buffer, to_copy);
            *buffer.add(to_copy) = 0;
        }
    }
    bytes.len()
}

/// Create a session. Free it with [`th_session_free`].
#[unsafe(no_mangle)]
pub extern "C" fn th_session_new() -> *mut Session {
    Box::into_raw(Box::new(Session::new()))
}

/// Destroy a session and every buffer it still owns. Null is ignored.
///
/// # Safety
/// `session` must be null or a pointer from [`th_session_new`] not yet freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn th_session_free(session: *mut Session) {
    if session.is_null() {
        return;
    }
    // SAFETY: pointer came from Box::into_raw in th_session_new.
    drop(unsafe { Box::from_raw(session) });
}

/// Allocate a zeroed f64 buffer of `len` elements. Returns 0 on failure.
///
/// # Safety
/// `session` must be null or a live session pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn th_alloc_f64(session: *mut Session, len: usize) -> u64 {
    let result = unsafe { session_mut(session) }
        .and_then(|s| Ok(s.arena_mut().alloc_f64(len)?.raw()));
    finish(result, 0)
}

/// Allocate a zeroed byte buffer of `len` bytes. Returns 0 on failure.
///
/// # Safety
/// `session` must be null or a live session pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn th_alloc_bytes(session: *mut Session, len: usize) -> u64 {
    let result = unsafe { session_mut(session) }
        .and_then(|s| Ok(s.arena_mut().alloc_bytes(len)?.raw()));
    finish(result, 0)
}

/// Data pointer of an f64 buffer, or null.
///
/// # Safety
/// `session` must be null or a live session pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn th_buffer_f64_ptr(session: *mut Session, buffer: u64) -> *mut f64 {
    let result = unsafe { session_mut(session) }.and_then(|s| {
        let h = handle(buffer)?;
        Ok(s.arena_mut().f64_mut(h)?.as_mut_ptr())
    });
    finish(result, ptr::null_mut())
}

/// Data pointer of a byte buffer, or null.
///
/// # Safety
/// `session` must be null or a live session pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn th_buffer_bytes_ptr(session: *mut Session, buffer: u64) -> *mut u8 {
    let result = unsafe { session_mut(session) }.and_then(|s| {
        let h = handle(buffer)?;
        Ok(s.arena_mut().bytes_mut(h)?.as_mut_ptr())
    });
    finish(result, ptr::null_mut())
}

/// Element count of a buffer. Returns 0 on failure (check the last error).
///
/// # Safety
/// `session` must be null or a live session pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn th_buffer_len(session: *mut Session, buffer: u64) -> usize {
    let result = unsafe { session_mut(session) }
        .and_then(|s| Ok(s.arena().len(handle(buffer)?)?));
    finish(result, 0)
}

/// Release a buffer. Returns 0, or -1 for a double release, a stale or
/// unknown handle, or a buffer the session holds for its current series.
///
/// # Safety
/// `session` must be null or a live session pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn th_release(session: *mut Session, buffer: u64) -> i32 {
    let result = unsafe { session_mut(session) }.and_then(|s| {
        s.arena_mut().release(handle(buffer)?)?;
        Ok(0)
    });
    finish(result, -1)
}

/// Parse the text held in byte buffer `text` into the session's series.
///
/// `separator` is a Unicode scalar value; columns are 0-based. `format` is a
/// NUL-terminated "format or units" string (null selects the default
/// timestamp pattern). Returns the point count, or -1 on failure.
///
/// # Safety
/// `session` must be null or a live session pointer; `format` must be null
/// or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn th_read_series(
    session: *mut Session,
    text: u64,
    separator: u32,
    time_column: usize,
    height_column: usize,
    format: *const c_char,
) -> i64 {
    let encoding = if format.is_null() {
        TimeEncoding::default()
    } else {
        // SAFETY: caller guarantees a valid C string.
        let format = unsafe { CStr::from_ptr(format) }.to_string_lossy();
        TimeEncoding::from_format_or_units(&format)
    };

    let result = unsafe { session_mut(session) }.and_then(|s| {
        let Some(separator) = char::from_u32(separator) else {
            return Err(ReadError::InvalidConfig(format!(
                "separator {separator:#x} is not a character"
            ))
            .into());
        };
        let config = ReaderConfig::default()
            .with_separator(separator)
            .with_columns(time_column, height_column)
            .with_encoding(encoding);
        let count = s.ingest_buffer(handle(text)?, &config)?;
        Ok(count as i64)
    });
    finish(result, -1)
}

/// Fresh buffer with a copy of the series times. Returns 0 on failure.
///
/// # Safety
/// `session` must be null or a live session pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn th_series_times(session: *mut Session) -> u64 {
    let result = unsafe { session_mut(session) }.and_then(|s| Ok(s.export_times()?.raw()));
    finish(result, 0)
}

/// Fresh buffer with a copy of the series heights. Returns 0 on failure.
///
/// # Safety
/// `session` must be null or a live session pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn th_series_heights(session: *mut Session) -> u64 {
    let result = unsafe { session_mut(session) }.and_then(|s| Ok(s.export_heights()?.raw()));
    finish(result, 0)
}

/// Mean of all heights, or NaN on failure.
///
/// # Safety
/// `session` must be null or a live session pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn th_series_mean(session: *mut Session) -> f64 {
    let result = unsafe { session_mut(session) }.and_then(|s| s.mean());
    finish(result, f64::NAN)
}

/// Copy the epoch label into `buffer` (NUL-terminated, truncated to fit).
/// Returns the full label length, or 0 on failure.
///
/// # Safety
/// `session` must be null or a live session pointer; `buffer` must be null
/// or hold `capacity` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn th_series_epoch(
    session: *mut Session,
    buffer: *mut c_char,
    capacity: usize,
) -> usize {
    let result = unsafe { session_mut(session) }
        .and_then(|s| Ok(unsafe { copy_str(&s.epoch()?.label(), buffer, capacity) }));
    finish(result, 0)
}

/// Multiply all heights by `factor`. Returns 0, or -1 on failure.
///
/// # Safety
/// `session` must be null or a live session pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn th_scale_heights(session: *mut Session, factor: f64) -> i32 {
    let result = unsafe { session_mut(session) }.and_then(|s| {
        s.scale_heights(factor)?;
        Ok(0)
    });
    finish(result, -1)
}

/// Fit the pulsations in f64 buffer `pulsations` over samples `[lo, hi)`.
/// Returns the numerical rank of the solve, or -1 on failure.
///
/// # Safety
/// `session` must be null or a live session pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn th_fit(session: *mut Session, pulsations: u64, lo: usize, hi: usize) -> i64 {
    let result = unsafe { session_mut(session) }.and_then(|s| {
        let pulsations = s.arena().f64(handle(pulsations)?)?.to_vec();
        let fit = s.fit(&pulsations, lo, hi)?;
        Ok(fit.rank as i64)
    });
    finish(result, -1)
}

/// Fresh buffer with the model amplitudes. Returns 0 on failure.
///
/// # Safety
/// `session` must be null or a live session pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn th_model_amplitudes(session: *mut Session) -> u64 {
    let result = unsafe { session_mut(session) }.and_then(|s| Ok(s.export_amplitudes()?.raw()));
    finish(result, 0)
}

/// Fresh buffer with the model phases (radians, as fitted). Returns 0 on failure.
///
/// # Safety
/// `session` must be null or a live session pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn th_model_phases(session: *mut Session) -> u64 {
    let result = unsafe { session_mut(session) }.and_then(|s| Ok(s.export_phases()?.raw()));
    finish(result, 0)
}

/// Fresh buffer with the model evaluated at each time in f64 buffer `times`.
/// Returns 0 on failure.
///
/// # Safety
/// `session` must be null or a live session pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn th_synthesize(session: *mut Session, times: u64) -> u64 {
    let result = unsafe { session_mut(session) }
        .and_then(|s| Ok(s.synthesize_buffer(handle(times)?)?.raw()));
    finish(result, 0)
}

/// Maximum absolute residual over `[lo, hi)`, or NaN on failure.
///
/// # Safety
/// `session` must be null or a live session pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn th_error_inf(session: *mut Session, lo: usize, hi: usize) -> f64 {
    let result = unsafe { session_mut(session) }.and_then(|s| s.error_inf(lo, hi));
    finish(result, f64::NAN)
}

/// Mean absolute residual over `[lo, hi)`, or NaN on failure.
///
/// # Safety
/// `session` must be null or a live session pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn th_error_mean(session: *mut Session, lo: usize, hi: usize) -> f64 {
    let result = unsafe { session_mut(session) }.and_then(|s| s.error_mean(lo, hi));
    finish(result, f64::NAN)
}

/// Copy the component report into `buffer`. Returns its full length, or 0.
///
/// # Safety
/// `session` must be null or a live session pointer; `buffer` must be null
/// or hold `capacity` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn th_model_report(
    session: *mut Session,
    buffer: *mut c_char,
    capacity: usize,
) -> usize {
    let result = unsafe { session_mut(session) }
        .and_then(|s| Ok(unsafe { copy_str(&s.report()?, buffer, capacity) }));
    finish(result, 0)
}

/// Length of the last error message in bytes, excluding the NUL.
#[unsafe(no_mangle)]
pub extern "C" fn th_last_error_length() -> usize {
    LAST_ERROR.with(|slot| slot.borrow().as_ref().map_or(0, |m| m.as_bytes().len()))
}

/// Copy the last error message into `buffer`. Returns the bytes copied
/// (excluding the NUL), or 0 when there is no error.
///
/// # Safety
/// `buffer` must be null or hold `capacity` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn th_last_error_message(buffer: *mut c_char, capacity: usize) -> usize {
    if buffer.is_null() || capacity == 0 {
        return 0;
    }
    LAST_ERROR.with(|slot| match slot.borrow().as_ref() {
        Some(message) => {
            let text = message.to_string_lossy();
            let full = unsafe { copy_str(&text, buffer, capacity) };
            full.min(capacity - 1)
        }
        None => 0,
    })
}

/// Clear the last error.
#[unsafe(no_mangle)]
pub extern "C" fn th_clear_last_error() {
    clear_last_error();
}
