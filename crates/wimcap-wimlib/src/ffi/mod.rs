//! Raw bindings to the subset of `wimlib.h` used for capture.
//!
//! `wimlib_tchar` is `wchar_t` (UTF-16) on Windows and `char` (bytes) on
//! every other platform; [`TString`] hides the difference.

#![allow(non_camel_case_types)]

use std::ffi::{OsStr, c_char, c_int, c_long, c_uint};

/// Character unit of every `wimlib` path and name argument.
#[cfg(windows)]
pub type wimlib_tchar = u16;
/// Character unit of every `wimlib` path and name argument.
#[cfg(not(windows))]
pub type wimlib_tchar = c_char;

/// Opaque in-memory WIM.
#[repr(C)]
pub struct WIMStruct {
    _private: [u8; 0],
}

/// One `(filesystem path, path inside the image)` pair.
#[repr(C)]
pub struct wimlib_capture_source {
    /// Absolute or relative path on the host filesystem.
    pub fs_source_path: *mut wimlib_tchar,
    /// Destination path inside the image; `\` separated.
    pub wim_target_path: *mut wimlib_tchar,
    /// Must be zero.
    pub reserved: c_long,
}

/// Selects every image when writing.
pub const WIMLIB_ALL_IMAGES: c_int = -1;

/// Print each captured file; no effect without a progress callback.
pub const WIMLIB_ADD_FLAG_VERBOSE: c_int = 0x0000_0004;
/// Report excluded files; no effect without a progress callback.
pub const WIMLIB_ADD_FLAG_EXCLUDE_VERBOSE: c_int = 0x0000_0080;
/// Apply the default Windows capture exclusions.
pub const WIMLIB_ADD_FLAG_WINCONFIG: c_int = 0x0000_0800;
/// Do not retain source paths after capture.
pub const WIMLIB_ADD_FLAG_FILE_PATHS_UNNEEDED: c_int = 0x0001_0000;

/// Flags used for every multi-source capture.
pub const CAPTURE_ADD_FLAGS: c_int = WIMLIB_ADD_FLAG_VERBOSE
    | WIMLIB_ADD_FLAG_EXCLUDE_VERBOSE
    | WIMLIB_ADD_FLAG_WINCONFIG
    | WIMLIB_ADD_FLAG_FILE_PATHS_UNNEEDED;

unsafe extern "C" {
    /// Allocate an empty WIM using compression `ctype`.
    pub fn wimlib_create_new_wim(ctype: c_int, wim_ret: *mut *mut WIMStruct) -> c_int;

    /// Capture several directory trees into one new image.
    pub fn wimlib_add_image_multisource(
        wim: *mut WIMStruct,
        sources: *const wimlib_capture_source,
        num_sources: usize,
        name: *const wimlib_tchar,
        config_file: *const wimlib_tchar,
        add_flags: c_int,
    ) -> c_int;

    /// Append an image with no files.
    pub fn wimlib_add_empty_image(
        wim: *mut WIMStruct,
        name: *const wimlib_tchar,
        new_idx_ret: *mut c_int,
    ) -> c_int;

    /// Serialise the selected images to a standalone file.
    pub fn wimlib_write(
        wim: *mut WIMStruct,
        path: *const wimlib_tchar,
        image: c_int,
        write_flags: c_int,
        num_threads: c_uint,
    ) -> c_int;

    /// Release a `WIMStruct`.
    pub fn wimlib_free(wim: *mut WIMStruct);

    /// Release library-global state.
    pub fn wimlib_global_cleanup();

    /// Static description of a status code.
    pub fn wimlib_get_error_string(code: c_int) -> *const wimlib_tchar;
}

/// NUL-terminated, owned `wimlib_tchar` buffer.
pub struct TString {
    units: Vec<wimlib_tchar>,
}

impl TString {
    /// Encode `value`; `None` when it contains an interior NUL.
    #[must_use]
    pub fn new(value: &OsStr) -> Option<Self> {
        let mut units = encode(value);
        if units.contains(&0) {
            return None;
        }
        units.push(0);
        Some(Self { units })
    }

    /// Pointer valid while `self` is alive and unmoved in memory.
    #[must_use]
    pub fn as_ptr(&self) -> *const wimlib_tchar {
        self.units.as_ptr()
    }

    /// Mutable pointer for struct fields declared non-const.
    pub fn as_mut_ptr(&mut self) -> *mut wimlib_tchar {
        self.units.as_mut_ptr()
    }
}

#[cfg(windows)]
fn encode(value: &OsStr) -> Vec<wimlib_tchar> {
    use std::os::windows::ffi::OsStrExt;
    value.encode_wide().collect()
}

#[cfg(not(windows))]
#[allow(clippy::cast_possible_wrap, clippy::unnecessary_cast)]
fn encode(value: &OsStr) -> Vec<wimlib_tchar> {
    use std::os::unix::ffi::OsStrExt;
    value.as_bytes().iter().map(|&byte| byte as c_char).collect()
}

/// Engine message for a status code.
#[must_use]
pub fn error_string(code: c_int) -> String {
    // SAFETY: wimlib returns a pointer to a static string or NULL.
    let ptr = unsafe { wimlib_get_error_string(code) };
    if ptr.is_null() {
        return format!("wimlib error {code}");
    }
    // SAFETY: non-null results are NUL-terminated and never freed.
    unsafe { decode(ptr) }
}

#[cfg(not(windows))]
unsafe fn decode(ptr: *const wimlib_tchar) -> String {
    // SAFETY: caller guarantees a valid NUL-terminated string.
    unsafe { std::ffi::CStr::from_ptr(ptr) }
        .to_string_lossy()
        .into_owned()
}

#[cfg(windows)]
unsafe fn decode(ptr: *const wimlib_tchar) -> String {
    let mut len = 0;
    // SAFETY: caller guarantees a valid NUL-terminated string.
    unsafe {
        while *ptr.add(len) != 0 {
            len += 1;
        }
        String::from_utf16_lossy(std::slice::from_raw_parts(ptr, len))
    }
}
