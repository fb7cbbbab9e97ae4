//! Filter graph construction and frame exchange.
//!
//! A [`FilterGraph`] is a configured libavfilter graph with one `buffer`
//! source named `"in"` and one `buffersink` named `"out"`. The chain between
//! them comes from a textual description in FFmpeg's filtergraph syntax,
//! e.g. `scale=78:24,transpose=cclock`.
//!
//! The graph owns every filter context in it; the source and sink pointers
//! kept here are borrowed views that die with the graph.

use std::ffi::{CStr, CString, c_int, c_void};
use std::ptr::{null, null_mut};

use ffmpeg_next::{Rational, frame::Video as VideoFrame};
use ffmpeg_sys_next::{AVFilterContext, AVFilterGraph, AVFilterInOut, AVPixelFormat};

use crate::config::OutputPixelFormat;
use crate::error::VidfilterError;
use crate::input::Decoder;
use crate::options::{set_int_list, set_name_list};
use crate::pump::FrameFilter;
use crate::status::{Flow, check, error_message};

/// Name of the source endpoint and label of the chain's open input.
pub const SOURCE_NAME: &str = "in";
/// Name of the sink endpoint and label of the chain's open output.
pub const SINK_NAME: &str = "out";

/// What the `buffer` source must be told about incoming frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceParameters {
    pub width: u32,
    pub height: u32,
    /// Raw `AVPixelFormat` value.
    pub pixel_format: c_int,
    pub time_base: Rational,
    pub sample_aspect_ratio: Rational,
}

impl SourceParameters {
    /// Parameters of frames produced by `decoder` for a stream with
    /// `time_base`.
    pub fn from_decoder(decoder: &Decoder, time_base: Rational) -> Self {
        Self {
            width: decoder.width(),
            height: decoder.height(),
            pixel_format: decoder.pixel_format(),
            time_base,
            sample_aspect_ratio: decoder.sample_aspect_ratio(),
        }
    }

    /// The `buffer` filter's argument string.
    pub fn to_args(&self) -> String {
        format!(
            "video_size={}x{}:pix_fmt={}:time_base={}/{}:pixel_aspect={}/{}",
            self.width,
            self.height,
            self.pixel_format,
            self.time_base.numerator(),
            self.time_base.denominator(),
            self.sample_aspect_ratio.numerator(),
            self.sample_aspect_ratio.denominator(),
        )
    }
}

/// The endpoint descriptors handed to the parser. Whatever the parser does
/// not consume is freed on drop, on every exit path.
struct InOutGuard {
    outputs: *mut AVFilterInOut,
    inputs: *mut AVFilterInOut,
}

impl Drop for InOutGuard {
    fn drop(&mut self) {
        // SAFETY: both pointers are null or lists allocated by
        // `avfilter_inout_alloc`; the call frees names and nulls the pointer.
        unsafe {
            ffmpeg_sys_next::avfilter_inout_free(&mut self.inputs);
            ffmpeg_sys_next::avfilter_inout_free(&mut self.outputs);
        }
    }
}

/// A configured filter graph with a single source and a single sink.
pub struct FilterGraph {
    graph: *mut AVFilterGraph,
    source: *mut AVFilterContext,
    sink: *mut AVFilterContext,
}

impl FilterGraph {
    /// Build and configure a graph running `description` on frames
    /// described by `parameters`.
    ///
    /// `pixel_formats` restricts what the sink accepts; libavfilter inserts a
    /// conversion when the chain produces something else. An empty slice
    /// leaves the sink unrestricted.
    ///
    /// # Errors
    ///
    /// - [`VidfilterError::FilterNotFound`] if `buffer` or `buffersink` is
    ///   missing from the linked libavfilter.
    /// - [`VidfilterError::OutOfMemory`] if an allocation returns null.
    /// - [`VidfilterError::FilterGraph`] if creating an endpoint, restricting
    ///   the sink, parsing `description` or configuring the graph fails.
    /// - [`VidfilterError::InvalidArgument`] if `description` contains a
    ///   NUL byte.
    pub fn build(
        description: &str,
        parameters: &SourceParameters,
        pixel_formats: &[OutputPixelFormat],
    ) -> Result<Self, VidfilterError> {
        log::debug!("Building filter graph '{description}' for {}", parameters.to_args());

        let description = CString::new(description).map_err(|_| {
            VidfilterError::InvalidArgument("filter description contains a NUL byte".to_string())
        })?;
        let args = CString::new(parameters.to_args())
            .map_err(|_| VidfilterError::InvalidArgument("source arguments".to_string()))?;

        // SAFETY: all pointers below are checked for null before use, and
        // ownership of every allocation is held by a guard or by `graph`.
        unsafe {
            let buffer = ffmpeg_sys_next::avfilter_get_by_name(c"buffer".as_ptr());
            if buffer.is_null() {
                return Err(VidfilterError::FilterNotFound("buffer"));
            }
            let buffersink = ffmpeg_sys_next::avfilter_get_by_name(c"buffersink".as_ptr());
            if buffersink.is_null() {
                return Err(VidfilterError::FilterNotFound("buffersink"));
            }

            let mut endpoints = InOutGuard {
                outputs: ffmpeg_sys_next::avfilter_inout_alloc(),
                inputs: ffmpeg_sys_next::avfilter_inout_alloc(),
            };
            let mut graph = FilterGraph {
                graph: ffmpeg_sys_next::avfilter_graph_alloc(),
                source: null_mut(),
                sink: null_mut(),
            };
            if endpoints.outputs.is_null() || endpoints.inputs.is_null() || graph.graph.is_null() {
                return Err(VidfilterError::OutOfMemory("filter graph"));
            }

            let source_name = CString::new(SOURCE_NAME).map_err(|_| {
                VidfilterError::InvalidArgument("source name".to_string())
            })?;
            let sink_name = CString::new(SINK_NAME)
                .map_err(|_| VidfilterError::InvalidArgument("sink name".to_string()))?;

            graph_step(
                "source creation",
                ffmpeg_sys_next::avfilter_graph_create_filter(
                    &mut graph.source,
                    buffer,
                    source_name.as_ptr(),
                    args.as_ptr(),
                    null_mut(),
                    graph.graph,
                ),
            )?;
            graph_step(
                "sink creation",
                ffmpeg_sys_next::avfilter_graph_create_filter(
                    &mut graph.sink,
                    buffersink,
                    sink_name.as_ptr(),
                    null(),
                    null_mut(),
                    graph.graph,
                ),
            )?;

            restrict_sink_formats(graph.sink, pixel_formats)?;

            // The names are handed over to the descriptors, which free them
            // in `avfilter_inout_free`.
            let output_label = ffmpeg_sys_next::av_strdup(source_name.as_ptr());
            let input_label = ffmpeg_sys_next::av_strdup(sink_name.as_ptr());
            (*endpoints.outputs).name = output_label;
            (*endpoints.inputs).name = input_label;
            if output_label.is_null() || input_label.is_null() {
                return Err(VidfilterError::OutOfMemory("filter endpoint names"));
            }

            (*endpoints.outputs).filter_ctx = graph.source;
            (*endpoints.outputs).pad_idx = 0;
            (*endpoints.outputs).next = null_mut();

            (*endpoints.inputs).filter_ctx = graph.sink;
            (*endpoints.inputs).pad_idx = 0;
            (*endpoints.inputs).next = null_mut();

            graph_step(
                "parse",
                ffmpeg_sys_next::avfilter_graph_parse_ptr(
                    graph.graph,
                    description.as_ptr(),
                    &mut endpoints.inputs,
                    &mut endpoints.outputs,
                    null_mut(),
                ),
            )?;
            graph_step(
                "configure",
                ffmpeg_sys_next::avfilter_graph_config(graph.graph, null_mut()),
            )?;

            if let Some(dump) = graph.describe() {
                log::debug!("Filter graph configured:\n{dump}");
            }
            Ok(graph)
        }
    }

    /// Human-readable layout of the configured graph.
    pub fn describe(&self) -> Option<String> {
        if self.graph.is_null() {
            return None;
        }
        // SAFETY: the graph is live; the dump is allocated by libavutil and
        // released with `av_free`.
        unsafe {
            let dump = ffmpeg_sys_next::avfilter_graph_dump(self.graph, null());
            if dump.is_null() {
                return None;
            }
            let text = CStr::from_ptr(dump).to_string_lossy().into_owned();
            ffmpeg_sys_next::av_free(dump.cast::<c_void>());
            Some(text)
        }
    }

    /// Number of filters in the graph, endpoints and auto-inserted
    /// conversions included.
    pub fn filter_count(&self) -> usize {
        // SAFETY: the graph is live.
        unsafe { (*self.graph).nb_filters as usize }
    }
}

fn graph_step(stage: &'static str, code: c_int) -> Result<c_int, VidfilterError> {
    if code < 0 {
        Err(VidfilterError::FilterGraph {
            stage,
            code,
            message: error_message(code),
        })
    } else {
        Ok(code)
    }
}

/// Limit the pixel formats the sink accepts.
///
/// Uses the binary `pix_fmts` list where the sink still has it and the
/// `pixel_formats` array option on libavfilter builds that dropped it.
unsafe fn restrict_sink_formats(
    sink: *mut AVFilterContext,
    pixel_formats: &[OutputPixelFormat],
) -> Result<(), VidfilterError> {
    let mut list: Vec<c_int> = pixel_formats
        .iter()
        .map(|format| AVPixelFormat::from(format.to_ffmpeg_pixel()) as c_int)
        .collect();
    let terminator = AVPixelFormat::AV_PIX_FMT_NONE as c_int;
    list.push(terminator);

    let search = ffmpeg_sys_next::AV_OPT_SEARCH_CHILDREN as c_int;
    // SAFETY: `sink` is a live filter context owned by the graph.
    match unsafe { set_int_list(sink.cast::<c_void>(), "pix_fmts", &list, terminator, search) } {
        Ok(written) => {
            log::debug!("Restricted sink to {written} pixel format(s)");
            Ok(())
        }
        Err(error) if error.code() == Some(ffmpeg_sys_next::AVERROR_OPTION_NOT_FOUND) => {
            let names: Vec<&str> = pixel_formats.iter().map(|format| format.name()).collect();
            // SAFETY: as above.
            unsafe { set_name_list(sink.cast::<c_void>(), "pixel_formats", &names, search) }
                .map(drop)
                .map_err(|error| restrict_error(&error))
        }
        Err(error) => Err(restrict_error(&error)),
    }
}

fn restrict_error(error: &VidfilterError) -> VidfilterError {
    match error.code() {
        Some(code) => VidfilterError::FilterGraph {
            stage: "sink format restriction",
            code,
            message: error_message(code),
        },
        None => VidfilterError::InvalidArgument(error.to_string()),
    }
}

impl FrameFilter for FilterGraph {
    fn push_frame(&mut self, frame: &mut VideoFrame) -> Result<(), Flow> {
        // SAFETY: the source belongs to this configured graph; with
        // KEEP_REF the graph takes its own reference to the frame data.
        check(unsafe {
            ffmpeg_sys_next::av_buffersrc_add_frame_flags(
                self.source,
                frame.as_mut_ptr(),
                ffmpeg_sys_next::AV_BUFFERSRC_FLAG_KEEP_REF as c_int,
            )
        })
        .map(drop)
    }

    fn push_eof(&mut self) -> Result<(), Flow> {
        // SAFETY: a null frame marks the end of the source's input.
        check(unsafe { ffmpeg_sys_next::av_buffersrc_add_frame_flags(self.source, null_mut(), 0) })
            .map(drop)
    }

    fn pull_frame(&mut self, frame: &mut VideoFrame) -> Result<(), Flow> {
        // SAFETY: the sink belongs to this configured graph.
        check(unsafe { ffmpeg_sys_next::av_buffersink_get_frame(self.sink, frame.as_mut_ptr()) })
            .map(drop)
    }

    fn output_time_base(&self) -> Rational {
        // SAFETY: the sink is configured.
        Rational::from(unsafe { ffmpeg_sys_next::av_buffersink_get_time_base(self.sink) })
    }
}

impl Drop for FilterGraph {
    fn drop(&mut self) {
        if !self.graph.is_null() {
            // SAFETY: frees the graph and every filter in it, the endpoints
            // included; the call nulls the pointer.
            unsafe { ffmpeg_sys_next::avfilter_graph_free(&mut self.graph) };
            self.source = null_mut();
            self.sink = null_mut();
        }
    }
}
