//! Error types for the `vidfilter` crate.
//!
//! This module defines [`VidfilterError`], the unified error type returned by
//! all fallible operations in the crate. Variants that originate from an
//! FFmpeg call carry the raw status code and the library's description of it.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

use crate::status::{Flow, error_message};

/// The unified error type for all `vidfilter` operations.
///
/// Setup failures (opening the input, building the filter graph) and pump
/// failures (decoding, filtering) are distinct variants so callers can tell
/// whether any frame was processed. The two flow-control sentinels of the
/// FFmpeg send/receive API never surface here unless they occur where they
/// are not expected.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VidfilterError {
    /// The input path does not reference an existing file.
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The container could not be opened.
    #[error("Cannot open input file {}: {message}", path.display())]
    InputOpen {
        /// Path that was passed to the opener.
        path: PathBuf,
        /// FFmpeg status code.
        code: i32,
        /// FFmpeg description of `code`.
        message: String,
    },

    /// Stream probing failed after the container was opened.
    #[error("Cannot find stream information: {message}")]
    StreamInfo {
        /// FFmpeg status code.
        code: i32,
        /// FFmpeg description of `code`.
        message: String,
    },

    /// The container has no decodable video stream.
    #[error("Cannot find a video stream in the input file")]
    NoVideoStream,

    /// A native allocation returned null.
    #[error("Out of memory while allocating {0}")]
    OutOfMemory(&'static str),

    /// The video decoder could not be opened.
    #[error("Cannot open video decoder: {message}")]
    DecoderOpen {
        /// FFmpeg status code.
        code: i32,
        /// FFmpeg description of `code`.
        message: String,
    },

    /// A filter type is missing from the linked libavfilter.
    #[error("FFmpeg filter '{0}' not found")]
    FilterNotFound(&'static str),

    /// Filter graph construction failed.
    #[error("Filter graph {stage} failed: {message}")]
    FilterGraph {
        /// The build step that failed (e.g. `parse`, `configure`).
        stage: &'static str,
        /// FFmpeg status code.
        code: i32,
        /// FFmpeg description of `code`.
        message: String,
    },

    /// An argument could not be handed to FFmpeg.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Sending a packet to, or receiving a frame from, the decoder failed.
    #[error("Error while decoding: {message}")]
    Decode {
        /// FFmpeg status code.
        code: i32,
        /// FFmpeg description of `code`.
        message: String,
    },

    /// Pushing a frame into, or pulling a frame from, the filter graph failed.
    #[error("Error while filtering: {message}")]
    Filter {
        /// FFmpeg status code.
        code: i32,
        /// FFmpeg description of `code`.
        message: String,
    },

    /// Any other FFmpeg failure.
    #[error("FFmpeg error {code}: {message}")]
    Ffmpeg {
        /// FFmpeg status code.
        code: i32,
        /// FFmpeg description of `code`.
        message: String,
    },

    /// A native resource was acquired or used out of dependency order.
    #[error("Resource lifecycle violation: {0}")]
    LifecycleOrder(&'static str),

    /// A consumer received a frame in a pixel format it cannot handle.
    #[error("Unsupported pixel format: {0}")]
    UnsupportedPixelFormat(String),

    /// An I/O error occurred while writing output.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate while saving a frame.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),
}

impl VidfilterError {
    /// Build an [`VidfilterError::Ffmpeg`] from a raw status code.
    pub fn from_code(code: i32) -> Self {
        VidfilterError::Ffmpeg {
            code,
            message: error_message(code),
        }
    }

    /// The FFmpeg status code behind this error, if there is one.
    ///
    /// Allocation failures and argument errors raised on the Rust side carry
    /// no library code and return `None`.
    pub fn code(&self) -> Option<i32> {
        match self {
            VidfilterError::InputOpen { code, .. }
            | VidfilterError::StreamInfo { code, .. }
            | VidfilterError::DecoderOpen { code, .. }
            | VidfilterError::FilterGraph { code, .. }
            | VidfilterError::Decode { code, .. }
            | VidfilterError::Filter { code, .. }
            | VidfilterError::Ffmpeg { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<FfmpegError> for VidfilterError {
    fn from(error: FfmpegError) -> Self {
        VidfilterError::from_code(i32::from(error))
    }
}

impl From<Flow> for VidfilterError {
    fn from(flow: Flow) -> Self {
        VidfilterError::from_code(flow.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_memory_has_no_code() {
        let error = VidfilterError::OutOfMemory("frame buffers");
        assert_eq!(error.code(), None);
        assert!(error.to_string().contains("frame buffers"));
    }

    #[test]
    fn library_errors_keep_their_code() {
        let error = VidfilterError::from_code(-22);
        assert_eq!(error.code(), Some(-22));

        let error = VidfilterError::Decode {
            code: -5,
            message: "Input/output error".to_string(),
        };
        assert_eq!(error.code(), Some(-5));
        assert!(error.to_string().contains("decoding"));
    }

    #[test]
    fn file_not_found_mentions_path() {
        let error = VidfilterError::FileNotFound(PathBuf::from("missing.mp4"));
        assert!(error.to_string().contains("missing.mp4"));
    }
}
