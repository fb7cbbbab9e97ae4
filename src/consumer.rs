//! Downstream consumers of filtered frames.
//!
//! The pump hands every filtered frame, together with the sink's time base,
//! to a [`FrameConsumer`]. The frame is only borrowed: it is unreferenced as
//! soon as `consume` returns, so a consumer that wants to keep pixel data
//! must copy it.
//!
//! # Example
//!
//! ```no_run
//! use vidfilter::{FilterOptions, FrameCounter, VideoFilter};
//!
//! let mut counter = FrameCounter::new();
//! VideoFilter::new(FilterOptions::new()).run("input.mp4", &mut counter)?;
//! println!("{} filtered frames", counter.frames());
//! # Ok::<(), vidfilter::VidfilterError>(())
//! ```

use std::path::{Path, PathBuf};

use ffmpeg_next::{Rational, format::Pixel, frame::Video as VideoFrame};
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};

use crate::error::VidfilterError;
use crate::utilities::frame_to_buffer;

/// Receives filtered frames.
pub trait FrameConsumer {
    /// Handle one filtered frame.
    ///
    /// Returning an error aborts the run; the error is propagated to the
    /// caller after teardown.
    fn consume(&mut self, frame: &VideoFrame, time_base: Rational) -> Result<(), VidfilterError>;
}

impl<F> FrameConsumer for F
where
    F: FnMut(&VideoFrame, Rational) -> Result<(), VidfilterError>,
{
    fn consume(&mut self, frame: &VideoFrame, time_base: Rational) -> Result<(), VidfilterError> {
        self(frame, time_base)
    }
}

/// Ignores every frame. This is the display hook of a plain run.
#[derive(Debug, Clone, Copy, Default)]
pub struct Discard;

impl FrameConsumer for Discard {
    fn consume(&mut self, _frame: &VideoFrame, _time_base: Rational) -> Result<(), VidfilterError> {
        Ok(())
    }
}

/// Counts frames and remembers what the last one looked like.
#[derive(Debug, Clone, Default)]
pub struct FrameCounter {
    frames: u64,
    last_pts: Option<i64>,
    last_time_base: Option<Rational>,
    dimensions: Option<(u32, u32)>,
    format: Option<Pixel>,
}

impl FrameCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames received.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Presentation timestamp of the last frame, in its time base.
    pub fn last_pts(&self) -> Option<i64> {
        self.last_pts
    }

    /// Time base of the last frame.
    pub fn last_time_base(&self) -> Option<Rational> {
        self.last_time_base
    }

    /// `(width, height)` of the last frame.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }

    /// Pixel format of the last frame.
    pub fn format(&self) -> Option<Pixel> {
        self.format
    }
}

impl FrameConsumer for FrameCounter {
    fn consume(&mut self, frame: &VideoFrame, time_base: Rational) -> Result<(), VidfilterError> {
        self.frames += 1;
        self.last_pts = frame.pts();
        self.last_time_base = Some(time_base);
        self.dimensions = Some((frame.width(), frame.height()));
        self.format = Some(frame.format());
        Ok(())
    }
}

/// Writes every frame as a numbered PNG file.
///
/// Supports the packed formats the `image` crate can represent directly:
/// GRAY8, RGB24 and RGBA. Files are named `frame_000000.png`,
/// `frame_000001.png`, … in arrival order.
#[derive(Debug, Clone)]
pub struct ImageSequenceWriter {
    directory: PathBuf,
    next_index: u64,
}

impl ImageSequenceWriter {
    /// Write into `directory`, creating it if needed.
    ///
    /// # Errors
    ///
    /// [`VidfilterError::IoError`] if the directory cannot be created.
    pub fn new<P: AsRef<Path>>(directory: P) -> Result<Self, VidfilterError> {
        let directory = directory.as_ref().to_path_buf();
        std::fs::create_dir_all(&directory)?;
        Ok(Self {
            directory,
            next_index: 0,
        })
    }

    /// Number of files written so far.
    pub fn written(&self) -> u64 {
        self.next_index
    }

    fn frame_path(&self) -> PathBuf {
        self.directory
            .join(format!("frame_{:06}.png", self.next_index))
    }
}

impl FrameConsumer for ImageSequenceWriter {
    fn consume(&mut self, frame: &VideoFrame, _time_base: Rational) -> Result<(), VidfilterError> {
        let image = frame_to_image(frame)?;
        let path = self.frame_path();
        image.save(&path)?;
        log::trace!("Wrote {}", path.display());
        self.next_index += 1;
        Ok(())
    }
}

/// Copy a packed GRAY8, RGB24 or RGBA frame into a [`DynamicImage`].
pub fn frame_to_image(frame: &VideoFrame) -> Result<DynamicImage, VidfilterError> {
    let width = frame.width();
    let height = frame.height();
    let invalid = || {
        VidfilterError::UnsupportedPixelFormat(format!(
            "{:?} frame of {width}x{height} has no usable pixel data",
            frame.format()
        ))
    };

    match frame.format() {
        Pixel::GRAY8 => {
            let buffer = frame_to_buffer(frame, width, height, 1).ok_or_else(invalid)?;
            GrayImage::from_raw(width, height, buffer)
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(invalid)
        }
        Pixel::RGB24 => {
            let buffer = frame_to_buffer(frame, width, height, 3).ok_or_else(invalid)?;
            RgbImage::from_raw(width, height, buffer)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(invalid)
        }
        Pixel::RGBA => {
            let buffer = frame_to_buffer(frame, width, height, 4).ok_or_else(invalid)?;
            RgbaImage::from_raw(width, height, buffer)
                .map(DynamicImage::ImageRgba8)
                .ok_or_else(invalid)
        }
        other => Err(VidfilterError::UnsupportedPixelFormat(format!("{other:?}"))),
    }
}
