//! Setting list-valued AVOptions.
//!
//! Some FFmpeg options (the `buffersink` pixel-format list among them) are
//! binary blobs holding a C array. The C API builds them from a
//! terminator-delimited list via the `av_opt_set_int_list` macro, which has
//! no exported symbol; [`set_int_list`] does the same from a Rust slice.

use std::ffi::{CString, c_int, c_void};
use std::mem::size_of;

use crate::error::VidfilterError;
use crate::status::translate;

/// The elements of `list` preceding the first `terminator`.
///
/// # Errors
///
/// Returns [`VidfilterError::InvalidArgument`] if `terminator` does not occur
/// in `list`.
pub fn terminated_prefix<T: PartialEq + Copy>(
    list: &[T],
    terminator: T,
) -> Result<&[T], VidfilterError> {
    list.iter()
        .position(|value| *value == terminator)
        .map(|end| &list[..end])
        .ok_or_else(|| VidfilterError::InvalidArgument("option list is not terminated".to_string()))
}

/// Set a binary integer-list option on an FFmpeg object.
///
/// Only the elements before the first `terminator` are encoded. A list that
/// starts with the terminator sets nothing and succeeds. Returns the number
/// of elements written.
///
/// # Errors
///
/// - [`VidfilterError::InvalidArgument`] if the terminator is missing, the
///   name contains a NUL byte, or the encoded list exceeds `c_int::MAX` bytes.
/// - [`VidfilterError::Ffmpeg`] if `av_opt_set_bin` rejects the value.
///
/// # Safety
///
/// `target` must point to a live AVOptions-enabled struct (for instance an
/// `AVFilterContext`) whenever the prefix is non-empty.
pub unsafe fn set_int_list(
    target: *mut c_void,
    name: &str,
    list: &[c_int],
    terminator: c_int,
    search_flags: c_int,
) -> Result<usize, VidfilterError> {
    let prefix = terminated_prefix(list, terminator)?;
    if prefix.is_empty() {
        return Ok(0);
    }

    let option_name = CString::new(name)
        .map_err(|_| VidfilterError::InvalidArgument(format!("option name {name:?}")))?;
    let byte_length = c_int::try_from(prefix.len() * size_of::<c_int>()).map_err(|_| {
        VidfilterError::InvalidArgument(format!("option list for {name} is too long"))
    })?;

    // av_opt_set_bin copies the bytes, so a transient buffer is enough.
    let buffer: Vec<c_int> = prefix.to_vec();
    log::trace!("Setting {name} to {buffer:?}");

    // SAFETY: the caller guarantees `target`; `buffer` holds `byte_length`
    // readable bytes for the duration of the call.
    translate(unsafe {
        ffmpeg_sys_next::av_opt_set_bin(
            target,
            option_name.as_ptr(),
            buffer.as_ptr().cast::<u8>(),
            byte_length,
            search_flags,
        )
    })?;

    Ok(prefix.len())
}

/// Set an array-typed option from a list of names, joined with `,`.
///
/// An empty list sets nothing and succeeds.
///
/// # Safety
///
/// Same contract as [`set_int_list`].
pub unsafe fn set_name_list(
    target: *mut c_void,
    name: &str,
    values: &[&str],
    search_flags: c_int,
) -> Result<usize, VidfilterError> {
    if values.is_empty() {
        return Ok(0);
    }

    let option_name = CString::new(name)
        .map_err(|_| VidfilterError::InvalidArgument(format!("option name {name:?}")))?;
    let joined = CString::new(values.join(","))
        .map_err(|_| VidfilterError::InvalidArgument(format!("option value for {name}")))?;

    // SAFETY: the caller guarantees `target`; both strings outlive the call.
    translate(unsafe {
        ffmpeg_sys_next::av_opt_set(target, option_name.as_ptr(), joined.as_ptr(), search_flags)
    })?;

    Ok(values.len())
}
