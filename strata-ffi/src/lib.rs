//! C ABI for front-ends that cannot link Rust directly
//!
//! Every entry point returns 0 on success and the status code of the failure
//! otherwise (see [`strata_core::Error::status_code`]). The message of the
//! last call on the calling thread is available from
//! [`strata_last_error_message`].

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use strata_core::{decode_to_tar, pack_and_encode, DecodeOptions, EncodeOptions, Error};

/// Status returned when the library itself panicked
pub const STATUS_INTERNAL: c_int = 1;

thread_local! {
    static LAST_ERROR: RefCell<CString> = RefCell::new(CString::default());
}

/// Pack `input_path` and write its frames into `out_dir` with default
/// parameters
///
/// # Safety
///
/// Each pointer must be null or point to a NUL-terminated string that stays
/// valid for the duration of the call.
#[no_mangle]
pub unsafe extern "C" fn strata_pack_and_encode_to_frames(
    input_path: *const c_char,
    out_dir: *const c_char,
) -> c_int {
    let input = path_arg(input_path, "input_path");
    let out_dir = path_arg(out_dir, "out_dir");
    run(move || pack_and_encode(&input?, &out_dir?, &EncodeOptions::default()))
}

/// Rebuild the archive with the most usable frames in `in_dir` and write it
/// to `output_tar`
///
/// # Safety
///
/// Same contract as [`strata_pack_and_encode_to_frames`].
#[no_mangle]
pub unsafe extern "C" fn strata_decode_frames_to_tar(
    in_dir: *const c_char,
    output_tar: *const c_char,
) -> c_int {
    let in_dir = path_arg(in_dir, "in_dir");
    let output_tar = path_arg(output_tar, "output_tar");
    run(move || decode_to_tar(&in_dir?, &output_tar?, &DecodeOptions::default()))
}

/// Message of the last failed call on this thread, or an empty string after
/// a successful one
///
/// The pointer stays valid until the next entry point call on this thread.
#[no_mangle]
pub extern "C" fn strata_last_error_message() -> *const c_char {
    LAST_ERROR.with(|last| last.borrow().as_ptr())
}

unsafe fn path_arg(ptr: *const c_char, name: &str) -> Result<PathBuf, Error> {
    if ptr.is_null() {
        return Err(Error::UnreadableInput {
            path: PathBuf::from(name),
            reason: "null path".to_string(),
        });
    }
    let raw = CStr::from_ptr(ptr);
    let path = raw.to_str().map_err(|_| Error::UnreadableInput {
        path: PathBuf::from(raw.to_string_lossy().into_owned()),
        reason: "path is not valid UTF-8".to_string(),
    })?;
    Ok(PathBuf::from(path))
}

fn run<T>(call: impl FnOnce() -> Result<T, Error>) -> c_int {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(_)) => {
            set_last_error("");
            0
        }
        Ok(Err(err)) => {
            set_last_error(&err.to_string());
            err.status_code()
        }
        Err(_) => {
            set_last_error("internal error");
            STATUS_INTERNAL
        }
    }
}

fn set_last_error(message: &str) {
    let message = CString::new(message.replace('\0', " ")).unwrap_or_default();
    LAST_ERROR.with(|last| *last.borrow_mut() = message);
}
