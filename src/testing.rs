//! Scripted stand-ins for the FFmpeg seams, used by unit tests.

use std::{cell::RefCell, collections::VecDeque, rc::Rc};

use ffmpeg_next::{Packet, Rational, frame::Video as VideoFrame};

use crate::consumer::FrameConsumer;
use crate::error::VidfilterError;
use crate::pump::{FrameDecoder, FrameFilter, PacketSource};
use crate::status::Flow;

/// Shared record of release order.
#[derive(Debug, Clone, Default)]
pub struct ReleaseLog(Rc<RefCell<Vec<&'static str>>>);

impl ReleaseLog {
    pub fn track(&self, name: &'static str) -> Tracked {
        Tracked {
            name,
            log: self.clone(),
        }
    }

    pub fn released(&self) -> Vec<&'static str> {
        self.0.borrow().clone()
    }
}

/// Appends its name to a [`ReleaseLog`] when dropped.
#[derive(Debug)]
pub struct Tracked {
    name: &'static str,
    log: ReleaseLog,
}

impl Tracked {
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.log.0.borrow_mut().push(self.name);
    }
}

/// Yields packets for the scripted stream indices, then end of stream.
pub struct ScriptedSource {
    reads: VecDeque<Result<usize, Flow>>,
    _tracked: Option<Tracked>,
}

impl ScriptedSource {
    pub fn new<I: IntoIterator<Item = Result<usize, Flow>>>(reads: I) -> Self {
        Self {
            reads: reads.into_iter().collect(),
            _tracked: None,
        }
    }

    pub fn tracked(mut self, tracked: Tracked) -> Self {
        self._tracked = Some(tracked);
        self
    }

    pub fn remaining(&self) -> usize {
        self.reads.len()
    }
}

impl PacketSource for ScriptedSource {
    fn read_packet(&mut self, packet: &mut Packet) -> Result<(), Flow> {
        match self.reads.pop_front() {
            Some(Ok(stream)) => {
                packet.set_stream(stream);
                Ok(())
            }
            Some(Err(flow)) => Err(flow),
            None => Err(Flow::EndOfStream),
        }
    }
}

/// Emits one scripted batch of frames per packet sent.
///
/// `Ok(timestamp)` entries become frames whose best-effort timestamp is
/// `timestamp` and whose pts is deliberately wrong; `Err` entries are
/// returned from `receive_frame` as they are.
pub struct ScriptedDecoder {
    batches: VecDeque<Vec<Result<i64, Flow>>>,
    flush: Vec<Result<i64, Flow>>,
    pending: VecDeque<Result<i64, Flow>>,
    pub send_results: VecDeque<Result<(), Flow>>,
    pub packets_sent: usize,
    pub eof_sent: bool,
    _tracked: Option<Tracked>,
}

impl ScriptedDecoder {
    pub fn new<I: IntoIterator<Item = Vec<Result<i64, Flow>>>>(batches: I) -> Self {
        Self {
            batches: batches.into_iter().collect(),
            flush: Vec::new(),
            pending: VecDeque::new(),
            send_results: VecDeque::new(),
            packets_sent: 0,
            eof_sent: false,
            _tracked: None,
        }
    }

    /// Frames released only after end of stream is signalled.
    pub fn flushing<I: IntoIterator<Item = Result<i64, Flow>>>(mut self, frames: I) -> Self {
        self.flush = frames.into_iter().collect();
        self
    }

    pub fn tracked(mut self, tracked: Tracked) -> Self {
        self._tracked = Some(tracked);
        self
    }
}

impl FrameDecoder for ScriptedDecoder {
    fn send_packet(&mut self, _packet: &Packet) -> Result<(), Flow> {
        self.packets_sent += 1;
        if let Some(batch) = self.batches.pop_front() {
            self.pending.extend(batch);
        }
        self.send_results.pop_front().unwrap_or(Ok(()))
    }

    fn send_eof(&mut self) -> Result<(), Flow> {
        self.eof_sent = true;
        self.pending.extend(self.flush.drain(..));
        Ok(())
    }

    fn receive_frame(&mut self, frame: &mut VideoFrame) -> Result<(), Flow> {
        match self.pending.pop_front() {
            Some(Ok(timestamp)) => {
                unsafe {
                    (*frame.as_mut_ptr()).best_effort_timestamp = timestamp;
                }
                frame.set_pts(Some(-1));
                Ok(())
            }
            Some(Err(flow)) => Err(flow),
            None if self.eof_sent => Err(Flow::EndOfStream),
            None => Err(Flow::Retry),
        }
    }
}

/// Passes pts values through, optionally holding frames back.
pub struct ScriptedFilter {
    ready: VecDeque<Option<i64>>,
    outputs_per_push: usize,
    pub pushed: Vec<Option<i64>>,
    pub fail_push: Option<Flow>,
    pub fail_pull: Option<Flow>,
    pub eof_pushed: bool,
    pub time_base: Rational,
    _tracked: Option<Tracked>,
}

impl ScriptedFilter {
    pub fn new() -> Self {
        Self {
            ready: VecDeque::new(),
            outputs_per_push: 1,
            pushed: Vec::new(),
            fail_push: None,
            fail_pull: None,
            eof_pushed: false,
            time_base: Rational::new(1, 25),
            _tracked: None,
        }
    }

    pub fn outputs_per_push(mut self, outputs: usize) -> Self {
        self.outputs_per_push = outputs;
        self
    }

    pub fn tracked(mut self, tracked: Tracked) -> Self {
        self._tracked = Some(tracked);
        self
    }
}

impl FrameFilter for ScriptedFilter {
    fn push_frame(&mut self, frame: &mut VideoFrame) -> Result<(), Flow> {
        if let Some(flow) = self.fail_push {
            return Err(flow);
        }
        let pts = frame.pts();
        self.pushed.push(pts);
        for _ in 0..self.outputs_per_push {
            self.ready.push_back(pts);
        }
        Ok(())
    }

    fn push_eof(&mut self) -> Result<(), Flow> {
        self.eof_pushed = true;
        Ok(())
    }

    fn pull_frame(&mut self, frame: &mut VideoFrame) -> Result<(), Flow> {
        if let Some(flow) = self.fail_pull {
            return Err(flow);
        }
        match self.ready.pop_front() {
            Some(pts) => {
                frame.set_pts(pts);
                Ok(())
            }
            None if self.eof_pushed => Err(Flow::EndOfStream),
            None => Err(Flow::Retry),
        }
    }

    fn output_time_base(&self) -> Rational {
        self.time_base
    }
}

/// Records the pts and time base of every frame it receives.
#[derive(Debug, Default)]
pub struct RecordingConsumer {
    pub frames: Vec<(Option<i64>, Rational)>,
    /// Fail once this many frames have been recorded.
    pub fail_after: Option<usize>,
}

impl FrameConsumer for RecordingConsumer {
    fn consume(&mut self, frame: &VideoFrame, time_base: Rational) -> Result<(), VidfilterError> {
        self.frames.push((frame.pts(), time_base));
        match self.fail_after {
            Some(limit) if self.frames.len() >= limit => {
                Err(VidfilterError::InvalidArgument("consumer gave up".to_string()))
            }
            _ => Ok(()),
        }
    }
}
