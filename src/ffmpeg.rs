//! FFmpeg log level and library version.
//!
//! FFmpeg has its own internal logging system, separate from the Rust
//! [`log`](https://crates.io/crates/log) crate. By default it prints warnings
//! and errors to stderr. [`set_ffmpeg_log_level`] tunes that output without
//! importing `ffmpeg-next` directly.
//!
//! # Example
//!
//! ```no_run
//! use vidfilter::{FfmpegLogLevel, LibraryVersion};
//!
//! vidfilter::set_ffmpeg_log_level(FfmpegLogLevel::Error);
//! println!("avcodec {}", LibraryVersion::avcodec());
//! ```
//!
//! # Note
//!
//! This controls **FFmpeg's own console output**, not the messages the crate
//! emits through the `log` facade.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use ffmpeg_next::util::log::Level;

use crate::error::VidfilterError;

/// FFmpeg internal log verbosity level.
///
/// Maps directly to FFmpeg's `AV_LOG_*` constants. Setting a level causes
/// FFmpeg to suppress all messages below that severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FfmpegLogLevel {
    /// Print no output at all.
    Quiet,
    /// Only log conditions after which the process will abort.
    Panic,
    /// Only log unrecoverable errors.
    Fatal,
    /// Log recoverable errors.
    Error,
    /// Log warnings (FFmpeg's default).
    Warning,
    /// Log informational messages.
    Info,
    /// Log verbose informational messages.
    Verbose,
    /// Log debugging messages.
    Debug,
    /// Extremely verbose tracing output.
    Trace,
}

impl FfmpegLogLevel {
    fn to_ffmpeg_level(self) -> Level {
        match self {
            FfmpegLogLevel::Quiet => Level::Quiet,
            FfmpegLogLevel::Panic => Level::Panic,
            FfmpegLogLevel::Fatal => Level::Fatal,
            FfmpegLogLevel::Error => Level::Error,
            FfmpegLogLevel::Warning => Level::Warning,
            FfmpegLogLevel::Info => Level::Info,
            FfmpegLogLevel::Verbose => Level::Verbose,
            FfmpegLogLevel::Debug => Level::Debug,
            FfmpegLogLevel::Trace => Level::Trace,
        }
    }

    fn from_ffmpeg_level(level: Level) -> Self {
        match level {
            Level::Quiet => FfmpegLogLevel::Quiet,
            Level::Panic => FfmpegLogLevel::Panic,
            Level::Fatal => FfmpegLogLevel::Fatal,
            Level::Error => FfmpegLogLevel::Error,
            Level::Warning => FfmpegLogLevel::Warning,
            Level::Info => FfmpegLogLevel::Info,
            Level::Verbose => FfmpegLogLevel::Verbose,
            Level::Debug => FfmpegLogLevel::Debug,
            Level::Trace => FfmpegLogLevel::Trace,
        }
    }
}

impl FromStr for FfmpegLogLevel {
    type Err = VidfilterError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "quiet" => Ok(FfmpegLogLevel::Quiet),
            "panic" => Ok(FfmpegLogLevel::Panic),
            "fatal" => Ok(FfmpegLogLevel::Fatal),
            "error" => Ok(FfmpegLogLevel::Error),
            "warning" | "warn" => Ok(FfmpegLogLevel::Warning),
            "info" => Ok(FfmpegLogLevel::Info),
            "verbose" => Ok(FfmpegLogLevel::Verbose),
            "debug" => Ok(FfmpegLogLevel::Debug),
            "trace" => Ok(FfmpegLogLevel::Trace),
            _ => Err(VidfilterError::InvalidArgument(format!(
                "unknown FFmpeg log level '{value}'"
            ))),
        }
    }
}

/// Set the FFmpeg internal log verbosity level.
///
/// This controls what FFmpeg prints to stderr. It does **not** affect
/// Rust-side `log` output.
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    ffmpeg_next::util::log::set_level(level.to_ffmpeg_level());
}

/// Get the current FFmpeg internal log verbosity level.
///
/// Returns `None` if the current level does not map to a known variant.
pub fn get_ffmpeg_log_level() -> Option<FfmpegLogLevel> {
    ffmpeg_next::util::log::get_level()
        .ok()
        .map(FfmpegLogLevel::from_ffmpeg_level)
}

/// A packed `major.minor.micro` library version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LibraryVersion {
    pub major: u32,
    pub minor: u32,
    pub micro: u32,
}

impl LibraryVersion {
    /// Decode an `AV_VERSION_INT` value: major in bits 16 and up, minor in
    /// bits 8..16, micro in bits 0..8.
    pub fn from_raw(raw: u32) -> Self {
        Self {
            major: raw >> 16,
            minor: (raw >> 8) & 0xff,
            micro: raw & 0xff,
        }
    }

    /// Version of the linked libavcodec.
    pub fn avcodec() -> Self {
        // SAFETY: reads a compile-time constant of the library.
        Self::from_raw(unsafe { ffmpeg_sys_next::avcodec_version() })
    }
}

impl Display for LibraryVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_packed_versions() {
        let version = LibraryVersion::from_raw((61 << 16) | (19 << 8) | 101);
        assert_eq!(
            version,
            LibraryVersion {
                major: 61,
                minor: 19,
                micro: 101
            }
        );
        assert_eq!(version.to_string(), "61.19.101");
    }

    #[test]
    fn versions_order_numerically() {
        assert!(LibraryVersion::from_raw(0x3D_13_65) > LibraryVersion::from_raw(0x3C_1F_66));
    }

    #[test]
    fn linked_avcodec_is_recent() {
        assert!(LibraryVersion::avcodec().major >= 58);
    }

    #[test]
    fn parses_log_levels() {
        assert_eq!("warn".parse::<FfmpegLogLevel>().unwrap(), FfmpegLogLevel::Warning);
        assert_eq!("QUIET".parse::<FfmpegLogLevel>().unwrap(), FfmpegLogLevel::Quiet);
        assert!("loud".parse::<FfmpegLogLevel>().is_err());
    }

    #[test]
    fn log_level_round_trips_through_ffmpeg() {
        let previous = get_ffmpeg_log_level();
        set_ffmpeg_log_level(FfmpegLogLevel::Error);
        assert_eq!(get_ffmpeg_log_level(), Some(FfmpegLogLevel::Error));
        if let Some(level) = previous {
            set_ffmpeg_log_level(level);
        }
    }
}
