//! Opening the input container and its video decoder.
//!
//! [`Container`] and [`Decoder`] own an `AVFormatContext` and an
//! `AVCodecContext` respectively and free them on drop. [`open_input`]
//! creates both and hands them to a [`Resources`] in dependency order.

use std::ffi::{CString, c_int};
use std::path::Path;
use std::ptr::{null, null_mut};

use ffmpeg_next::{Packet, Rational, frame::Video as VideoFrame};
use ffmpeg_sys_next::{AVCodec, AVCodecContext, AVFormatContext, AVMediaType, AVStream};

use crate::error::VidfilterError;
use crate::lifecycle::Resources;
use crate::pump::{FrameDecoder, PacketSource};
use crate::status::{Flow, check, error_message, translate};

/// The stream chosen for decoding.
#[derive(Debug, Clone, Copy)]
pub struct VideoStream {
    /// Index of the stream in the container; packets are routed on it.
    pub index: usize,
    /// Time base of the stream's timestamps.
    pub time_base: Rational,
    codec: *const AVCodec,
}

/// An open, probed media container.
pub struct Container {
    context: *mut AVFormatContext,
}

impl Container {
    /// Open `path` and read its stream information.
    ///
    /// # Errors
    ///
    /// - [`VidfilterError::InvalidArgument`] if the path is not valid UTF-8
    ///   or contains a NUL byte.
    /// - [`VidfilterError::InputOpen`] if FFmpeg cannot open the file.
    /// - [`VidfilterError::StreamInfo`] if probing the streams fails.
    pub fn open(path: &Path) -> Result<Self, VidfilterError> {
        let url = path
            .to_str()
            .and_then(|path| CString::new(path).ok())
            .ok_or_else(|| {
                VidfilterError::InvalidArgument(format!("unusable path {}", path.display()))
            })?;

        let mut context = null_mut();
        // SAFETY: on failure `avformat_open_input` frees the context and
        // leaves the pointer null.
        let code =
            unsafe { ffmpeg_sys_next::avformat_open_input(&mut context, url.as_ptr(), null_mut(), null_mut()) };
        if code < 0 {
            return Err(VidfilterError::InputOpen {
                path: path.to_path_buf(),
                code,
                message: error_message(code),
            });
        }
        let container = Container { context };

        // SAFETY: `context` is a freshly opened format context.
        let code = unsafe { ffmpeg_sys_next::avformat_find_stream_info(container.context, null_mut()) };
        if code < 0 {
            return Err(VidfilterError::StreamInfo {
                code,
                message: error_message(code),
            });
        }

        log::debug!(
            "Opened {} ({} streams, format {})",
            path.display(),
            container.stream_count(),
            container.format_name()
        );
        Ok(container)
    }

    /// Number of streams in the container.
    pub fn stream_count(&self) -> usize {
        // SAFETY: `context` is valid for the lifetime of `self`.
        unsafe { (*self.context).nb_streams as usize }
    }

    /// Short name of the demuxer, e.g. `mov,mp4,m4a,3gp,3g2,mj2`.
    pub fn format_name(&self) -> String {
        // SAFETY: an opened context always has an input format with a
        // static name.
        unsafe {
            let format = (*self.context).iformat;
            if format.is_null() || (*format).name.is_null() {
                return String::new();
            }
            std::ffi::CStr::from_ptr((*format).name)
                .to_string_lossy()
                .into_owned()
        }
    }

    /// Time base of the stream at `index`, if it exists.
    pub fn time_base(&self, index: usize) -> Option<Rational> {
        self.stream(index)
            // SAFETY: `stream` only returns pointers into the live stream table.
            .map(|stream| Rational::from(unsafe { (*stream).time_base }))
    }

    fn stream(&self, index: usize) -> Option<*mut AVStream> {
        if index >= self.stream_count() {
            return None;
        }
        // SAFETY: `index` is within `nb_streams`.
        let stream = unsafe { *(*self.context).streams.add(index) };
        (!stream.is_null()).then_some(stream)
    }

    /// Pick the best video stream and the decoder for it.
    ///
    /// # Errors
    ///
    /// [`VidfilterError::NoVideoStream`] if no stream qualifies.
    pub fn best_video_stream(&self) -> Result<VideoStream, VidfilterError> {
        let mut codec: *const AVCodec = null();
        // SAFETY: `context` is valid and `codec` receives a pointer to a
        // static codec descriptor.
        let code = unsafe {
            ffmpeg_sys_next::av_find_best_stream(
                self.context,
                AVMediaType::AVMEDIA_TYPE_VIDEO,
                -1,
                -1,
                &mut codec,
                0,
            )
        };
        if code < 0 || codec.is_null() {
            log::debug!("No usable video stream: {}", error_message(code));
            return Err(VidfilterError::NoVideoStream);
        }

        let index = code as usize;
        let time_base = self.time_base(index).ok_or(VidfilterError::NoVideoStream)?;
        log::debug!("Selected video stream {index} (time base {time_base})");

        Ok(VideoStream {
            index,
            time_base,
            codec,
        })
    }
}

impl PacketSource for Container {
    fn read_packet(&mut self, packet: &mut Packet) -> Result<(), Flow> {
        // SAFETY: `packet` is blank; the pump unreferences it after each use.
        check(unsafe { ffmpeg_sys_next::av_read_frame(self.context, packet.as_mut_ptr()) })
            .map(drop)
    }
}

impl Drop for Container {
    fn drop(&mut self) {
        if !self.context.is_null() {
            // SAFETY: the context was opened by `avformat_open_input`; the
            // call nulls the pointer.
            unsafe { ffmpeg_sys_next::avformat_close_input(&mut self.context) };
        }
    }
}

/// An opened decoder for one video stream.
pub struct Decoder {
    context: *mut AVCodecContext,
}

impl Decoder {
    /// Allocate, configure and open a decoder for `stream`.
    ///
    /// # Errors
    ///
    /// - [`VidfilterError::OutOfMemory`] if the context cannot be allocated.
    /// - [`VidfilterError::Ffmpeg`] if the stream parameters are rejected.
    /// - [`VidfilterError::DecoderOpen`] if the codec fails to open.
    pub fn open(container: &Container, stream: &VideoStream) -> Result<Self, VidfilterError> {
        let av_stream = container
            .stream(stream.index)
            .ok_or(VidfilterError::NoVideoStream)?;

        // SAFETY: `stream.codec` was returned by `av_find_best_stream`.
        let context = unsafe { ffmpeg_sys_next::avcodec_alloc_context3(stream.codec) };
        if context.is_null() {
            return Err(VidfilterError::OutOfMemory("decoder context"));
        }
        let decoder = Decoder { context };

        // SAFETY: both pointers are live; the parameters are copied.
        translate(unsafe {
            ffmpeg_sys_next::avcodec_parameters_to_context(decoder.context, (*av_stream).codecpar)
        })?;

        // SAFETY: the context was allocated for `stream.codec`.
        let code = unsafe { ffmpeg_sys_next::avcodec_open2(decoder.context, stream.codec, null_mut()) };
        if code < 0 {
            return Err(VidfilterError::DecoderOpen {
                code,
                message: error_message(code),
            });
        }

        log::debug!(
            "Opened decoder: {}x{}, pixel format {}",
            decoder.width(),
            decoder.height(),
            decoder.pixel_format()
        );
        Ok(decoder)
    }

    /// Coded width in pixels.
    pub fn width(&self) -> u32 {
        // SAFETY: `context` is valid for the lifetime of `self`.
        unsafe { (*self.context).width.max(0) as u32 }
    }

    /// Coded height in pixels.
    pub fn height(&self) -> u32 {
        // SAFETY: as above.
        unsafe { (*self.context).height.max(0) as u32 }
    }

    /// Raw `AVPixelFormat` value of the decoded frames.
    pub fn pixel_format(&self) -> c_int {
        // SAFETY: as above.
        unsafe { (*self.context).pix_fmt as c_int }
    }

    /// Sample (pixel) aspect ratio; `0/1` when unknown.
    pub fn sample_aspect_ratio(&self) -> Rational {
        // SAFETY: as above.
        Rational::from(unsafe { (*self.context).sample_aspect_ratio })
    }
}

impl FrameDecoder for Decoder {
    fn send_packet(&mut self, packet: &Packet) -> Result<(), Flow> {
        // SAFETY: the decoder is open; the packet is only read.
        check(unsafe { ffmpeg_sys_next::avcodec_send_packet(self.context, packet.as_ptr()) })
            .map(drop)
    }

    fn send_eof(&mut self) -> Result<(), Flow> {
        // SAFETY: a null packet enters draining mode.
        check(unsafe { ffmpeg_sys_next::avcodec_send_packet(self.context, null()) }).map(drop)
    }

    fn receive_frame(&mut self, frame: &mut VideoFrame) -> Result<(), Flow> {
        // SAFETY: the decoder is open; `frame` is owned by the caller.
        check(unsafe { ffmpeg_sys_next::avcodec_receive_frame(self.context, frame.as_mut_ptr()) })
            .map(drop)
    }
}

impl Drop for Decoder {
    fn drop(&mut self) {
        if !self.context.is_null() {
            // SAFETY: allocated by `avcodec_alloc_context3`; the call nulls
            // the pointer.
            unsafe { ffmpeg_sys_next::avcodec_free_context(&mut self.context) };
        }
    }
}

/// Open `path`, select its best video stream and open a decoder for it.
///
/// The container is placed in `resources` before the decoder is created, so
/// a decoder failure leaves only the container to release.
///
/// # Errors
///
/// - [`VidfilterError::FileNotFound`] if `path` is not an existing file.
/// - Any error of [`Container::open`], [`Container::best_video_stream`] or
///   [`Decoder::open`].
pub fn open_input<G>(
    path: &Path,
    resources: &mut Resources<Container, Decoder, G>,
) -> Result<VideoStream, VidfilterError> {
    if !path.is_file() {
        return Err(VidfilterError::FileNotFound(path.to_path_buf()));
    }

    let container = resources.acquire_container(Container::open(path)?)?;
    let stream = container.best_video_stream()?;
    let decoder = Decoder::open(container, &stream)?;
    resources.acquire_decoder(decoder)?;

    Ok(stream)
}
