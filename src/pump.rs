//! The decode → filter frame pump.
//!
//! [`FramePump`] reads packets from a [`PacketSource`], feeds those of the
//! selected stream to a [`FrameDecoder`], pushes every decoded frame into a
//! [`FrameFilter`] and hands every filtered frame to a
//! [`FrameConsumer`]. Packet and frame buffers are allocated once in
//! [`FrameBuffers`] and unreferenced after each use.
//!
//! The three traits are the seams to FFmpeg: [`Container`](crate::input::Container),
//! [`Decoder`](crate::input::Decoder) and [`FilterGraph`](crate::graph::FilterGraph)
//! implement them. They report the send/receive sentinels as [`Flow`] values,
//! which the pump treats as control flow rather than failure.

use ffmpeg_next::{Packet, Rational, frame::Video as VideoFrame};

use crate::consumer::FrameConsumer;
use crate::error::VidfilterError;
use crate::status::{Flow, error_message};

/// Produces compressed packets.
pub trait PacketSource {
    /// Read the next packet into `packet`.
    ///
    /// `Err(Flow::EndOfStream)` once the input is exhausted.
    fn read_packet(&mut self, packet: &mut Packet) -> Result<(), Flow>;
}

/// Turns packets into frames.
pub trait FrameDecoder {
    /// Submit one packet.
    fn send_packet(&mut self, packet: &Packet) -> Result<(), Flow>;

    /// Signal that no more packets will be sent.
    fn send_eof(&mut self) -> Result<(), Flow>;

    /// Fetch the next decoded frame into `frame`.
    ///
    /// `Err(Flow::Retry)` when more input is needed.
    fn receive_frame(&mut self, frame: &mut VideoFrame) -> Result<(), Flow>;
}

/// A filter graph with a single source and a single sink.
pub trait FrameFilter {
    /// Push a frame into the source. The caller keeps its reference.
    fn push_frame(&mut self, frame: &mut VideoFrame) -> Result<(), Flow>;

    /// Close the source.
    fn push_eof(&mut self) -> Result<(), Flow>;

    /// Pull the next filtered frame from the sink into `frame`.
    fn pull_frame(&mut self, frame: &mut VideoFrame) -> Result<(), Flow>;

    /// Time base of the frames produced by the sink.
    fn output_time_base(&self) -> Rational;
}

/// Counters collected over one pump run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    /// Packets read from the container, all streams.
    pub packets_read: u64,
    /// Packets discarded because they belong to another stream.
    pub packets_skipped: u64,
    /// Frames received from the decoder.
    pub frames_decoded: u64,
    /// Frames pulled from the filter sink and handed to the consumer.
    pub frames_filtered: u64,
}

/// The reusable packet and frame buffers of a run.
pub struct FrameBuffers {
    packet: Packet,
    decoded: VideoFrame,
    filtered: VideoFrame,
}

impl FrameBuffers {
    /// Allocate one packet and two frames.
    ///
    /// # Errors
    ///
    /// [`VidfilterError::OutOfMemory`] if a frame could not be allocated.
    pub fn allocate() -> Result<Self, VidfilterError> {
        let decoded = VideoFrame::empty();
        let filtered = VideoFrame::empty();

        // SAFETY: only the pointer values are inspected.
        let allocated = unsafe { !decoded.as_ptr().is_null() && !filtered.as_ptr().is_null() };
        if !allocated {
            return Err(VidfilterError::OutOfMemory("frame buffers"));
        }

        Ok(Self {
            packet: Packet::empty(),
            decoded,
            filtered,
        })
    }
}

/// Drop whatever data `packet` references, leaving it blank and reusable.
///
/// Safe on a packet that was never filled.
pub fn release_packet(packet: &mut Packet) {
    // SAFETY: `packet` is a valid AVPacket owned by the caller.
    unsafe { ffmpeg_sys_next::av_packet_unref(packet.as_mut_ptr()) }
}

/// Drop whatever data `frame` references, leaving it blank and reusable.
///
/// Safe on a frame that was never filled.
pub fn release_frame(frame: &mut VideoFrame) {
    // SAFETY: `frame` wraps a valid AVFrame owned by the caller.
    unsafe { ffmpeg_sys_next::av_frame_unref(frame.as_mut_ptr()) }
}

fn decode_error(flow: Flow) -> VidfilterError {
    VidfilterError::Decode {
        code: flow.code(),
        message: error_message(flow.code()),
    }
}

fn filter_error(flow: Flow) -> VidfilterError {
    VidfilterError::Filter {
        code: flow.code(),
        message: error_message(flow.code()),
    }
}

/// Drives packets of one stream through a decoder and a filter graph.
#[derive(Debug, Clone, Copy)]
pub struct FramePump {
    stream_index: usize,
    drain_at_end_of_stream: bool,
}

impl FramePump {
    /// A pump for the stream at `stream_index`.
    pub fn new(stream_index: usize) -> Self {
        Self {
            stream_index,
            drain_at_end_of_stream: false,
        }
    }

    /// Flush the decoder and the filter graph once the input is exhausted.
    pub fn with_drain_at_end_of_stream(mut self, drain: bool) -> Self {
        self.drain_at_end_of_stream = drain;
        self
    }

    /// Run until the source is exhausted or a fatal error occurs.
    ///
    /// A read failure of any kind ends the run normally. Send/receive
    /// sentinels only move the pump to its next state.
    ///
    /// # Errors
    ///
    /// - [`VidfilterError::Decode`] if the decoder rejects a packet or fails
    ///   to produce a frame.
    /// - [`VidfilterError::Filter`] if the filter graph rejects a frame or
    ///   fails to produce one.
    /// - Whatever the consumer returns.
    pub fn run<S, D, F, C>(
        &self,
        source: &mut S,
        decoder: &mut D,
        filter: &mut F,
        consumer: &mut C,
        buffers: &mut FrameBuffers,
    ) -> Result<PumpStats, VidfilterError>
    where
        S: PacketSource + ?Sized,
        D: FrameDecoder + ?Sized,
        F: FrameFilter + ?Sized,
        C: FrameConsumer + ?Sized,
    {
        let FrameBuffers {
            packet,
            decoded,
            filtered,
        } = buffers;

        let mut stats = PumpStats::default();
        let mut stages = Stages {
            decoder,
            filter,
            consumer,
            decoded,
            filtered,
            stats: &mut stats,
        };

        loop {
            match source.read_packet(packet) {
                Ok(()) => {}
                Err(Flow::EndOfStream) => break,
                Err(flow) => {
                    log::warn!(
                        "Stopping at read failure: {}",
                        error_message(flow.code())
                    );
                    break;
                }
            }
            stages.stats.packets_read += 1;

            if packet.stream() != self.stream_index {
                stages.stats.packets_skipped += 1;
                release_packet(packet);
                continue;
            }

            let result = stages.decode(packet);
            release_packet(packet);
            result?;
        }

        if self.drain_at_end_of_stream {
            stages.finish()?;
        }

        log::debug!(
            "Pump finished: {} packets read, {} frames decoded, {} frames filtered",
            stats.packets_read,
            stats.frames_decoded,
            stats.frames_filtered
        );
        Ok(stats)
    }
}

/// Borrowed state of the decode and filter stages.
struct Stages<'a, D: ?Sized, F: ?Sized, C: ?Sized> {
    decoder: &'a mut D,
    filter: &'a mut F,
    consumer: &'a mut C,
    decoded: &'a mut VideoFrame,
    filtered: &'a mut VideoFrame,
    stats: &'a mut PumpStats,
}

impl<D, F, C> Stages<'_, D, F, C>
where
    D: FrameDecoder + ?Sized,
    F: FrameFilter + ?Sized,
    C: FrameConsumer + ?Sized,
{
    fn decode(&mut self, packet: &Packet) -> Result<(), VidfilterError> {
        match self.decoder.send_packet(packet) {
            Ok(()) => {}
            Err(flow) if flow.is_sentinel() => log::trace!("Decoder answered {flow:?} on send"),
            Err(flow) => return Err(decode_error(flow)),
        }
        self.drain_decoder()
    }

    fn drain_decoder(&mut self) -> Result<(), VidfilterError> {
        loop {
            match self.decoder.receive_frame(self.decoded) {
                Ok(()) => {}
                Err(flow) if flow.is_sentinel() => return Ok(()),
                Err(flow) => return Err(decode_error(flow)),
            }
            self.stats.frames_decoded += 1;

            let result = self.filter_decoded();
            release_frame(self.decoded);
            result?;
        }
    }

    fn filter_decoded(&mut self) -> Result<(), VidfilterError> {
        let timestamp = self.decoded.timestamp();
        self.decoded.set_pts(timestamp);
        log::trace!("Decoded frame at {timestamp:?}");

        self.filter
            .push_frame(self.decoded)
            .map_err(filter_error)?;
        self.drain_filter()
    }

    fn drain_filter(&mut self) -> Result<(), VidfilterError> {
        let time_base = self.filter.output_time_base();
        loop {
            match self.filter.pull_frame(self.filtered) {
                Ok(()) => {}
                Err(flow) if flow.is_sentinel() => return Ok(()),
                Err(flow) => return Err(filter_error(flow)),
            }
            self.stats.frames_filtered += 1;

            let result = self.consumer.consume(self.filtered, time_base);
            release_frame(self.filtered);
            result?;
        }
    }

    fn finish(&mut self) -> Result<(), VidfilterError> {
        match self.decoder.send_eof() {
            Ok(()) => {}
            Err(flow) if flow.is_sentinel() => {}
            Err(flow) => return Err(decode_error(flow)),
        }
        self.drain_decoder()?;

        match self.filter.push_eof() {
            Ok(()) => {}
            Err(flow) if flow.is_sentinel() => {}
            Err(flow) => return Err(filter_error(flow)),
        }
        self.drain_filter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Resources;
    use crate::testing::{
        RecordingConsumer, ReleaseLog, ScriptedDecoder, ScriptedFilter, ScriptedSource,
    };

    const VIDEO: usize = 0;
    const AUDIO: usize = 1;

    fn run(
        pump: FramePump,
        source: &mut ScriptedSource,
        decoder: &mut ScriptedDecoder,
        filter: &mut ScriptedFilter,
        consumer: &mut RecordingConsumer,
    ) -> Result<PumpStats, VidfilterError> {
        let mut buffers = FrameBuffers::allocate().unwrap();
        pump.run(source, decoder, filter, consumer, &mut buffers)
    }

    #[test]
    fn empty_input_ends_cleanly() {
        let mut source = ScriptedSource::new([]);
        let mut decoder = ScriptedDecoder::new([]);
        let mut filter = ScriptedFilter::new();
        let mut consumer = RecordingConsumer::default();

        let stats = run(FramePump::new(VIDEO), &mut source, &mut decoder, &mut filter, &mut consumer)
            .unwrap();

        assert_eq!(stats, PumpStats::default());
        assert!(consumer.frames.is_empty());
        assert_eq!(decoder.packets_sent, 0);
    }

    #[test]
    fn skips_packets_of_other_streams() {
        let mut source = ScriptedSource::new([Ok(AUDIO), Ok(VIDEO), Ok(AUDIO)]);
        let mut decoder = ScriptedDecoder::new([vec![Ok(0)]]);
        let mut filter = ScriptedFilter::new();
        let mut consumer = RecordingConsumer::default();

        let stats = run(FramePump::new(VIDEO), &mut source, &mut decoder, &mut filter, &mut consumer)
            .unwrap();

        assert_eq!(stats.packets_read, 3);
        assert_eq!(stats.packets_skipped, 2);
        assert_eq!(decoder.packets_sent, 1);
        assert_eq!(consumer.frames.len(), 1);
    }

    #[test]
    fn stamps_best_effort_timestamp_before_pushing() {
        let mut source = ScriptedSource::new([Ok(VIDEO), Ok(VIDEO)]);
        let mut decoder = ScriptedDecoder::new([vec![Ok(40), Ok(80)], vec![Ok(120)]]);
        let mut filter = ScriptedFilter::new();
        let mut consumer = RecordingConsumer::default();

        let stats = run(FramePump::new(VIDEO), &mut source, &mut decoder, &mut filter, &mut consumer)
            .unwrap();

        assert_eq!(filter.pushed, [Some(40), Some(80), Some(120)]);
        assert_eq!(stats.frames_decoded, 3);
        assert_eq!(stats.frames_filtered, 3);
        let pts: Vec<_> = consumer.frames.iter().map(|(pts, _)| *pts).collect();
        assert_eq!(pts, [Some(40), Some(80), Some(120)]);
        assert!(consumer.frames.iter().all(|(_, tb)| *tb == filter.time_base));
    }

    #[test]
    fn send_sentinels_fall_through_to_draining() {
        let mut source = ScriptedSource::new([Ok(VIDEO)]);
        let mut decoder = ScriptedDecoder::new([vec![Ok(1)]]);
        decoder.send_results.push_back(Err(Flow::Retry));
        let mut filter = ScriptedFilter::new();
        let mut consumer = RecordingConsumer::default();

        run(FramePump::new(VIDEO), &mut source, &mut decoder, &mut filter, &mut consumer).unwrap();
        assert_eq!(consumer.frames.len(), 1);
    }

    #[test]
    fn filter_may_hold_frames_back() {
        let mut source = ScriptedSource::new([Ok(VIDEO), Ok(VIDEO)]);
        let mut decoder = ScriptedDecoder::new([vec![Ok(1)], vec![Ok(2)]]);
        let mut filter = ScriptedFilter::new().outputs_per_push(0);
        let mut consumer = RecordingConsumer::default();

        let stats = run(FramePump::new(VIDEO), &mut source, &mut decoder, &mut filter, &mut consumer)
            .unwrap();
        assert_eq!(stats.frames_decoded, 2);
        assert_eq!(stats.frames_filtered, 0);
        assert!(consumer.frames.is_empty());
    }

    #[test]
    fn read_failure_ends_the_run() {
        let mut source = ScriptedSource::new([Ok(VIDEO), Err(Flow::Error(-5)), Ok(VIDEO)]);
        let mut decoder = ScriptedDecoder::new([vec![Ok(1)], vec![Ok(2)]]);
        let mut filter = ScriptedFilter::new();
        let mut consumer = RecordingConsumer::default();

        let stats = run(FramePump::new(VIDEO), &mut source, &mut decoder, &mut filter, &mut consumer)
            .unwrap();
        assert_eq!(stats.packets_read, 1);
        assert_eq!(consumer.frames.len(), 1);
    }

    #[test]
    fn send_failure_is_fatal() {
        let mut source = ScriptedSource::new([Ok(VIDEO), Ok(VIDEO)]);
        let mut decoder = ScriptedDecoder::new([vec![Ok(1)], vec![Ok(2)]]);
        decoder.send_results.push_back(Err(Flow::Error(-1094995529)));
        let mut filter = ScriptedFilter::new();
        let mut consumer = RecordingConsumer::default();

        let error = run(FramePump::new(VIDEO), &mut source, &mut decoder, &mut filter, &mut consumer)
            .unwrap_err();
        assert!(matches!(error, VidfilterError::Decode { code: -1094995529, .. }));
        assert!(consumer.frames.is_empty());
        assert_eq!(source.remaining(), 1);
    }

    #[test]
    fn receive_failure_is_fatal() {
        let mut source = ScriptedSource::new([Ok(VIDEO)]);
        let mut decoder = ScriptedDecoder::new([vec![Ok(1), Err(Flow::Error(-12))]]);
        let mut filter = ScriptedFilter::new();
        let mut consumer = RecordingConsumer::default();

        let error = run(FramePump::new(VIDEO), &mut source, &mut decoder, &mut filter, &mut consumer)
            .unwrap_err();
        assert_eq!(error.code(), Some(-12));
        assert_eq!(consumer.frames.len(), 1);
    }

    #[test]
    fn push_failure_is_fatal_even_for_sentinels() {
        let mut source = ScriptedSource::new([Ok(VIDEO)]);
        let mut decoder = ScriptedDecoder::new([vec![Ok(1)]]);
        let mut filter = ScriptedFilter::new();
        filter.fail_push = Some(Flow::EndOfStream);
        let mut consumer = RecordingConsumer::default();

        let error = run(FramePump::new(VIDEO), &mut source, &mut decoder, &mut filter, &mut consumer)
            .unwrap_err();
        assert!(matches!(error, VidfilterError::Filter { .. }));
    }

    #[test]
    fn pull_failure_is_fatal() {
        let mut source = ScriptedSource::new([Ok(VIDEO)]);
        let mut decoder = ScriptedDecoder::new([vec![Ok(1)]]);
        let mut filter = ScriptedFilter::new();
        filter.fail_pull = Some(Flow::Error(-22));
        let mut consumer = RecordingConsumer::default();

        let error = run(FramePump::new(VIDEO), &mut source, &mut decoder, &mut filter, &mut consumer)
            .unwrap_err();
        assert!(matches!(error, VidfilterError::Filter { code: -22, .. }));
    }

    #[test]
    fn consumer_failure_stops_the_run() {
        let mut source = ScriptedSource::new([Ok(VIDEO), Ok(VIDEO)]);
        let mut decoder = ScriptedDecoder::new([vec![Ok(1)], vec![Ok(2)]]);
        let mut filter = ScriptedFilter::new();
        let mut consumer = RecordingConsumer {
            fail_after: Some(1),
            ..Default::default()
        };

        let result = run(FramePump::new(VIDEO), &mut source, &mut decoder, &mut filter, &mut consumer);
        assert!(result.is_err());
        assert_eq!(consumer.frames.len(), 1);
        assert_eq!(decoder.packets_sent, 1);
    }

    #[test]
    fn drain_flushes_decoder_and_graph() {
        let mut source = ScriptedSource::new([Ok(VIDEO)]);
        let mut decoder = ScriptedDecoder::new([vec![Ok(1)]]).flushing([Ok(2), Ok(3)]);
        let mut filter = ScriptedFilter::new();
        let mut consumer = RecordingConsumer::default();

        let pump = FramePump::new(VIDEO).with_drain_at_end_of_stream(true);
        let stats = run(pump, &mut source, &mut decoder, &mut filter, &mut consumer).unwrap();

        assert_eq!(stats.frames_decoded, 3);
        assert_eq!(consumer.frames.len(), 3);
        assert!(decoder.eof_sent);
        assert!(filter.eof_pushed);
    }

    #[test]
    fn no_drain_by_default() {
        let mut source = ScriptedSource::new([Ok(VIDEO)]);
        let mut decoder = ScriptedDecoder::new([vec![Ok(1)]]).flushing([Ok(2)]);
        let mut filter = ScriptedFilter::new();
        let mut consumer = RecordingConsumer::default();

        run(FramePump::new(VIDEO), &mut source, &mut decoder, &mut filter, &mut consumer).unwrap();
        assert!(!decoder.eof_sent);
        assert_eq!(consumer.frames.len(), 1);
    }

    #[test]
    fn fatal_error_still_tears_everything_down() {
        let log = ReleaseLog::default();
        {
            let mut resources = Resources::new();
            resources
                .acquire_container(ScriptedSource::new([Ok(VIDEO)]).tracked(log.track("container")))
                .unwrap();
            resources
                .acquire_decoder(
                    ScriptedDecoder::new([vec![Err(Flow::Error(-5))]]).tracked(log.track("decoder")),
                )
                .unwrap();
            resources
                .acquire_graph(ScriptedFilter::new().tracked(log.track("graph")))
                .unwrap();

            let mut consumer = RecordingConsumer::default();
            let mut buffers = FrameBuffers::allocate().unwrap();
            let (source, decoder, filter) = resources.parts_mut().unwrap();
            let result = FramePump::new(VIDEO).run(source, decoder, filter, &mut consumer, &mut buffers);
            assert!(result.is_err());
            assert!(log.released().is_empty());
        }
        assert_eq!(log.released(), ["graph", "decoder", "container"]);
    }

    #[test]
    fn releasing_blank_buffers_is_harmless() {
        let mut buffers = FrameBuffers::allocate().unwrap();

        release_packet(&mut buffers.packet);
        release_packet(&mut buffers.packet);
        release_frame(&mut buffers.decoded);
        release_frame(&mut buffers.decoded);

        buffers.packet.set_stream(VIDEO);
        assert_eq!(buffers.packet.stream(), VIDEO);
        assert_eq!(buffers.decoded.timestamp(), None);
    }
}
