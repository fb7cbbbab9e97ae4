//! # vidfilter
//!
//! Run FFmpeg filter graphs over the video stream of a media file.
//!
//! `vidfilter` opens a file, picks its best video stream, decodes it, and
//! pushes every decoded frame through a filter chain written in FFmpeg's
//! filtergraph syntax. Filtered frames are handed to a [`FrameConsumer`].
//! Native handles are released in reverse order of acquisition on every exit
//! path. Powered by FFmpeg via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) and
//! [`ffmpeg-sys-next`](https://crates.io/crates/ffmpeg-sys-next) crates.
//!
//! ## Quick Start
//!
//! ### Run the default chain
//!
//! ```no_run
//! // scale=78:24,transpose=cclock, GRAY8 output, frames discarded.
//! let stats = vidfilter::filter_video("input.mp4", vidfilter::DEFAULT_FILTER_DESCRIPTION)?;
//! println!("{} frames", stats.frames_filtered);
//! # Ok::<(), vidfilter::VidfilterError>(())
//! ```
//!
//! ### Save filtered frames
//!
//! ```no_run
//! use vidfilter::{FilterOptions, ImageSequenceWriter, OutputPixelFormat, VideoFilter};
//!
//! let options = FilterOptions::new()
//!     .with_filter_description("scale=320:-1,edgedetect")
//!     .with_output_pixel_formats([OutputPixelFormat::Gray8])
//!     .with_drain_at_end_of_stream(true);
//! let mut writer = ImageSequenceWriter::new("frames")?;
//! VideoFilter::new(options).run("input.mp4", &mut writer)?;
//! # Ok::<(), vidfilter::VidfilterError>(())
//! ```
//!
//! ## Features
//!
//! - **Textual filter chains**: any description `avfilter_graph_parse_ptr`
//!   accepts, between a `buffer` source `in` and a `buffersink` `out`
//! - **Sink format restriction**: GRAY8 by default, or any set of
//!   [`OutputPixelFormat`]s
//! - **Pluggable consumers**: closures, [`FrameCounter`],
//!   [`ImageSequenceWriter`], or [`Discard`]
//! - **Optional end-of-stream drain** of the decoder and the graph
//! - **FFmpeg status translation** with the EAGAIN/EOF sentinels kept apart
//!   from real failures
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod config;
pub mod consumer;
pub mod error;
pub mod ffmpeg;
pub mod graph;
pub mod input;
pub mod lifecycle;
pub mod options;
pub mod pipeline;
pub mod pump;
pub mod status;
#[cfg(test)]
mod testing;
mod utilities;

pub use config::{DEFAULT_FILTER_DESCRIPTION, FilterOptions, OutputPixelFormat};
pub use consumer::{Discard, FrameConsumer, FrameCounter, ImageSequenceWriter, frame_to_image};
pub use error::VidfilterError;
pub use ffmpeg::{FfmpegLogLevel, LibraryVersion, get_ffmpeg_log_level, set_ffmpeg_log_level};
pub use graph::{FilterGraph, SourceParameters};
pub use input::{Container, Decoder, VideoStream, open_input};
pub use lifecycle::Resources;
pub use pipeline::{VideoFilter, filter_video};
pub use pump::{FrameBuffers, FramePump, PumpStats};
pub use status::{Flow, check, error_message, translate};
pub use utilities::pts_to_duration;
