//! Filtering configuration.
//!
//! [`FilterOptions`] is a builder that carries the filter description, the
//! pixel formats accepted at the sink and the end-of-stream behaviour into
//! [`VideoFilter`](crate::VideoFilter).
//!
//! # Example
//!
//! ```no_run
//! use vidfilter::{FilterOptions, OutputPixelFormat};
//!
//! let options = FilterOptions::new()
//!     .with_filter_description("scale=160:90,hflip")
//!     .with_output_pixel_formats([OutputPixelFormat::Rgb8])
//!     .with_drain_at_end_of_stream(true);
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use ffmpeg_next::format::Pixel;

use crate::error::VidfilterError;

/// The chain applied when no description is configured: shrink to 78x24
/// and rotate a quarter turn counter-clockwise.
pub const DEFAULT_FILTER_DESCRIPTION: &str = "scale=78:24,transpose=cclock";

/// A pixel format the filter graph's sink may be restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputPixelFormat {
    /// 8-bit grayscale (8 bpp). This is the default.
    #[default]
    Gray8,
    /// 8-bit packed RGB (24 bpp).
    Rgb8,
    /// 8-bit packed RGBA (32 bpp).
    Rgba8,
    /// Planar YUV 4:2:0 (12 bpp).
    Yuv420p,
}

impl OutputPixelFormat {
    /// Every supported format.
    pub const ALL: [OutputPixelFormat; 4] = [
        OutputPixelFormat::Gray8,
        OutputPixelFormat::Rgb8,
        OutputPixelFormat::Rgba8,
        OutputPixelFormat::Yuv420p,
    ];

    /// Map to the corresponding FFmpeg pixel format constant.
    pub fn to_ffmpeg_pixel(self) -> Pixel {
        match self {
            OutputPixelFormat::Gray8 => Pixel::GRAY8,
            OutputPixelFormat::Rgb8 => Pixel::RGB24,
            OutputPixelFormat::Rgba8 => Pixel::RGBA,
            OutputPixelFormat::Yuv420p => Pixel::YUV420P,
        }
    }

    /// FFmpeg's name for the format, as accepted by name-based options.
    pub fn name(self) -> &'static str {
        match self {
            OutputPixelFormat::Gray8 => "gray",
            OutputPixelFormat::Rgb8 => "rgb24",
            OutputPixelFormat::Rgba8 => "rgba",
            OutputPixelFormat::Yuv420p => "yuv420p",
        }
    }
}

impl Display for OutputPixelFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

impl FromStr for OutputPixelFormat {
    type Err = VidfilterError;

    /// Accepts FFmpeg names (`gray`, `rgb24`, `rgba`, `yuv420p`) and the
    /// variant spellings (`gray8`, `rgb8`, `rgba8`), case-insensitively.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "gray" | "gray8" => Ok(OutputPixelFormat::Gray8),
            "rgb24" | "rgb8" | "rgb" => Ok(OutputPixelFormat::Rgb8),
            "rgba" | "rgba8" => Ok(OutputPixelFormat::Rgba8),
            "yuv420p" => Ok(OutputPixelFormat::Yuv420p),
            _ => Err(VidfilterError::InvalidArgument(format!(
                "unknown pixel format '{value}'"
            ))),
        }
    }
}

/// Settings for one filtering run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOptions {
    /// Filtergraph description placed between the `in` source and the
    /// `out` sink.
    pub(crate) filter_description: String,
    /// Formats the sink accepts. Empty leaves the sink unconstrained.
    pub(crate) output_pixel_formats: Vec<OutputPixelFormat>,
    /// Flush the decoder and the graph after the last packet.
    pub(crate) drain_at_end_of_stream: bool,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterOptions {
    /// Create options with default settings.
    ///
    /// Defaults: [`DEFAULT_FILTER_DESCRIPTION`], GRAY8 output, no
    /// end-of-stream drain.
    pub fn new() -> Self {
        Self {
            filter_description: DEFAULT_FILTER_DESCRIPTION.to_string(),
            output_pixel_formats: vec![OutputPixelFormat::Gray8],
            drain_at_end_of_stream: false,
        }
    }

    /// Set the filtergraph description.
    #[must_use]
    pub fn with_filter_description(mut self, description: impl Into<String>) -> Self {
        self.filter_description = description.into();
        self
    }

    /// Restrict the sink to `formats`, in order of preference.
    ///
    /// Duplicates are dropped. An empty list lets the graph output whatever
    /// its last filter produces.
    #[must_use]
    pub fn with_output_pixel_formats<I>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = OutputPixelFormat>,
    {
        self.output_pixel_formats.clear();
        for format in formats {
            if !self.output_pixel_formats.contains(&format) {
                self.output_pixel_formats.push(format);
            }
        }
        self
    }

    /// Flush frames buffered in the decoder and the graph once the input
    /// is exhausted. Defaults to `false`, which leaves them unemitted.
    #[must_use]
    pub fn with_drain_at_end_of_stream(mut self, drain: bool) -> Self {
        self.drain_at_end_of_stream = drain;
        self
    }

    pub fn filter_description(&self) -> &str {
        &self.filter_description
    }

    pub fn output_pixel_formats(&self) -> &[OutputPixelFormat] {
        &self.output_pixel_formats
    }

    pub fn drain_at_end_of_stream(&self) -> bool {
        self.drain_at_end_of_stream
    }
}
