//! FFmpeg status-code translation.
//!
//! Every libav* call returns a signed integer: non-negative on success,
//! negative on failure. Two negative values are not failures but flow
//! control for the send/receive APIs: `AVERROR(EAGAIN)` ("try again after
//! feeding more input") and `AVERROR_EOF` ("no more output"). [`check`]
//! folds a raw code into [`Flow`] so callers branch on a variant instead of
//! comparing magic numbers; [`translate`] is the strict form used during
//! setup, where any negative code is an error.

use std::ffi::{CStr, c_char, c_int};

use ffmpeg_next::Error as FfmpegError;
use ffmpeg_sys_next::{AVERROR_EOF, EAGAIN};

use crate::error::VidfilterError;

/// Size of the scratch buffer handed to `av_strerror`.
const ERROR_BUFFER_SIZE: usize = 1024;

/// Substituted when FFmpeg has no description for a code.
const NO_ERROR_INFO: &str = "No Error Info";

/// `AVERROR(EAGAIN)`.
pub const AVERROR_EAGAIN: c_int = -EAGAIN;

/// Why a send/receive call did not produce a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// More input is required before output is available.
    Retry,
    /// The producer has been fully drained.
    EndOfStream,
    /// A genuine failure carrying the FFmpeg status code.
    Error(c_int),
}

impl Flow {
    /// Whether this is one of the two flow-control sentinels.
    pub fn is_sentinel(self) -> bool {
        matches!(self, Flow::Retry | Flow::EndOfStream)
    }

    /// The raw FFmpeg code this variant stands for.
    pub fn code(self) -> c_int {
        match self {
            Flow::Retry => AVERROR_EAGAIN,
            Flow::EndOfStream => AVERROR_EOF,
            Flow::Error(code) => code,
        }
    }
}

impl From<FfmpegError> for Flow {
    fn from(error: FfmpegError) -> Self {
        match check(c_int::from(error)) {
            Ok(_) => Flow::Error(c_int::from(error)),
            Err(flow) => flow,
        }
    }
}

/// Classify a raw status code.
///
/// Non-negative codes are returned unchanged.
pub fn check(code: c_int) -> Result<c_int, Flow> {
    match code {
        code if code >= 0 => Ok(code),
        AVERROR_EAGAIN => Err(Flow::Retry),
        AVERROR_EOF => Err(Flow::EndOfStream),
        code => Err(Flow::Error(code)),
    }
}

/// Pass a non-negative code through, or turn it into an error.
///
/// Sentinels are errors here too: this is for calls that have no
/// "try again" semantics.
pub fn translate(code: c_int) -> Result<c_int, VidfilterError> {
    if code < 0 {
        Err(VidfilterError::from_code(code))
    } else {
        Ok(code)
    }
}

/// Look up FFmpeg's description of a status code.
pub fn error_message(code: c_int) -> String {
    let mut buffer = [0 as c_char; ERROR_BUFFER_SIZE];

    // SAFETY: `av_strerror` writes at most `ERROR_BUFFER_SIZE` bytes,
    // including the terminating NUL, into `buffer`.
    let message = unsafe {
        ffmpeg_sys_next::av_strerror(code, buffer.as_mut_ptr(), ERROR_BUFFER_SIZE);
        CStr::from_ptr(buffer.as_ptr())
    };

    match message.to_str() {
        Ok(text) if !text.is_empty() => text.to_string(),
        _ => NO_ERROR_INFO.to_string(),
    }
}
