// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as fixed-size little-endian records. [`decode`] reads them back
//! as an iterator of [`RecordedEvent`]. Durations are stored as nanoseconds.

use core::time::Duration;
use std::sync::Arc;

use lamina_core::time::HostTime;
use lamina_core::trace::{
    BeginFrameEvent, FrameRasterizedEvent, FrameSubmittedEvent, FrameSummary, PhaseBeginEvent,
    PhaseEndEvent, PhaseKind, RasterOutcome, TraceFlowEvent, TraceSink,
};
use parking_lot::Mutex;

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_BEGIN_FRAME: u8 = 1;
const TAG_PHASE_BEGIN: u8 = 2;
const TAG_PHASE_END: u8 = 3;
const TAG_FRAME_SUBMITTED: u8 = 4;
const TAG_FRAME_RASTERIZED: u8 = 5;
const TAG_TRACE_FLOW: u8 = 6;
const TAG_FRAME_SUMMARY: u8 = 7;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty recorder behind a lock, ready to hand to a shell.
    ///
    /// The returned handle coerces to the shell's shared sink type; keep a
    /// clone to read the bytes back.
    #[must_use]
    pub fn shared() -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Returns the recorded bytes and starts over with an empty buffer.
    pub fn take_bytes(&mut self) -> Vec<u8> {
        core::mem::take(&mut self.buf)
    }

    /// Decodes what has been recorded so far.
    pub fn events(&self) -> DecodeIter<'_> {
        decode(&self.buf)
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_time(&mut self, t: HostTime) {
        self.write_u64(t.as_nanos());
    }

    fn write_duration(&mut self, d: Duration) {
        self.write_u64(u64::try_from(d.as_nanos()).unwrap_or(u64::MAX));
    }

    fn write_phase(&mut self, p: PhaseKind) {
        self.write_u8(match p {
            PhaseKind::Build => 0,
            PhaseKind::Preroll => 1,
            PhaseKind::Paint => 2,
            PhaseKind::Submit => 3,
        });
    }

    fn write_outcome(&mut self, o: RasterOutcome) {
        self.write_u8(match o {
            RasterOutcome::Success => 0,
            RasterOutcome::Resubmitted => 1,
            RasterOutcome::Failed => 2,
        });
    }
}

impl TraceSink for RecorderSink {
    fn on_begin_frame(&mut self, e: &BeginFrameEvent) {
        self.write_u8(TAG_BEGIN_FRAME);
        self.write_u64(e.frame_number);
        self.write_time(e.frame_start);
        self.write_time(e.frame_target);
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        self.write_u8(TAG_PHASE_BEGIN);
        self.write_u64(e.frame_number);
        self.write_phase(e.phase);
        self.write_time(e.timestamp);
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        self.write_u8(TAG_PHASE_END);
        self.write_u64(e.frame_number);
        self.write_phase(e.phase);
        self.write_time(e.timestamp);
    }

    fn on_frame_submitted(&mut self, e: &FrameSubmittedEvent) {
        self.write_u8(TAG_FRAME_SUBMITTED);
        self.write_u64(e.frame_number);
        self.write_u64(e.trace_id);
        self.write_time(e.timestamp);
    }

    fn on_frame_rasterized(&mut self, e: &FrameRasterizedEvent) {
        self.write_u8(TAG_FRAME_RASTERIZED);
        self.write_u64(e.frame_number);
        self.write_outcome(e.outcome);
        self.write_time(e.timestamp);
    }

    fn on_trace_flow(&mut self, e: &TraceFlowEvent) {
        self.write_u8(TAG_TRACE_FLOW);
        self.write_u64(e.flow_id);
        self.write_u64(e.frame_number);
        self.write_time(e.timestamp);
    }

    fn on_frame_summary(&mut self, s: &FrameSummary) {
        self.write_u8(TAG_FRAME_SUMMARY);
        self.write_u64(s.frame_number);
        self.write_time(s.frame_start);
        self.write_duration(s.build);
        self.write_duration(s.preroll);
        self.write_duration(s.paint);
        self.write_duration(s.submit);
        self.write_u8(u8::from(s.over_budget));
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Copy, Debug)]
pub enum RecordedEvent {
    /// A [`BeginFrameEvent`].
    BeginFrame(BeginFrameEvent),
    /// A [`PhaseBeginEvent`].
    PhaseBegin(PhaseBeginEvent),
    /// A [`PhaseEndEvent`].
    PhaseEnd(PhaseEndEvent),
    /// A [`FrameSubmittedEvent`].
    FrameSubmitted(FrameSubmittedEvent),
    /// A [`FrameRasterizedEvent`].
    FrameRasterized(FrameRasterizedEvent),
    /// A [`TraceFlowEvent`].
    TraceFlow(TraceFlowEvent),
    /// A [`FrameSummary`].
    FrameSummary(FrameSummary),
}

impl RecordedEvent {
    /// Frame the event belongs to.
    #[must_use]
    pub fn frame_number(&self) -> u64 {
        match self {
            Self::BeginFrame(e) => e.frame_number,
            Self::PhaseBegin(e) => e.frame_number,
            Self::PhaseEnd(e) => e.frame_number,
            Self::FrameSubmitted(e) => e.frame_number,
            Self::FrameRasterized(e) => e.frame_number,
            Self::TraceFlow(e) => e.frame_number,
            Self::FrameSummary(s) => s.frame_number,
        }
    }
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
///
/// Iteration stops at the first unknown tag or truncated record.
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter { data: bytes, pos: 0 }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn read_u8(&mut self) -> Option<u8> {
        let v = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(v)
    }

    fn read_u64(&mut self) -> Option<u64> {
        let bytes = self.data.get(self.pos..self.pos + 8)?;
        let v = u64::from_le_bytes(bytes.try_into().ok()?);
        self.pos += 8;
        Some(v)
    }

    fn read_time(&mut self) -> Option<HostTime> {
        self.read_u64().map(HostTime)
    }

    fn read_duration(&mut self) -> Option<Duration> {
        self.read_u64().map(Duration::from_nanos)
    }

    fn read_phase(&mut self) -> Option<PhaseKind> {
        Some(match self.read_u8()? {
            0 => PhaseKind::Build,
            1 => PhaseKind::Preroll,
            2 => PhaseKind::Paint,
            3 => PhaseKind::Submit,
            _ => return None,
        })
    }

    fn read_outcome(&mut self) -> Option<RasterOutcome> {
        Some(match self.read_u8()? {
            0 => RasterOutcome::Success,
            1 => RasterOutcome::Resubmitted,
            2 => RasterOutcome::Failed,
            _ => return None,
        })
    }

    fn decode_frame_summary(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::FrameSummary(FrameSummary {
            frame_number: self.read_u64()?,
            frame_start: self.read_time()?,
            build: self.read_duration()?,
            preroll: self.read_duration()?,
            paint: self.read_duration()?,
            submit: self.read_duration()?,
            over_budget: self.read_u8()? != 0,
        }))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let event = match self.read_u8()? {
            TAG_BEGIN_FRAME => RecordedEvent::BeginFrame(BeginFrameEvent {
                frame_number: self.read_u64()?,
                frame_start: self.read_time()?,
                frame_target: self.read_time()?,
            }),
            TAG_PHASE_BEGIN => RecordedEvent::PhaseBegin(PhaseBeginEvent {
                frame_number: self.read_u64()?,
                phase: self.read_phase()?,
                timestamp: self.read_time()?,
            }),
            TAG_PHASE_END => RecordedEvent::PhaseEnd(PhaseEndEvent {
                frame_number: self.read_u64()?,
                phase: self.read_phase()?,
                timestamp: self.read_time()?,
            }),
            TAG_FRAME_SUBMITTED => RecordedEvent::FrameSubmitted(FrameSubmittedEvent {
                frame_number: self.read_u64()?,
                trace_id: self.read_u64()?,
                timestamp: self.read_time()?,
            }),
            TAG_FRAME_RASTERIZED => RecordedEvent::FrameRasterized(FrameRasterizedEvent {
                frame_number: self.read_u64()?,
                outcome: self.read_outcome()?,
                timestamp: self.read_time()?,
            }),
            TAG_TRACE_FLOW => RecordedEvent::TraceFlow(TraceFlowEvent {
                flow_id: self.read_u64()?,
                frame_number: self.read_u64()?,
                timestamp: self.read_time()?,
            }),
            TAG_FRAME_SUMMARY => return self.decode_frame_summary(),
            // Unknown tag: the rest of the buffer is not ours to interpret.
            _ => return None,
        };
        Some(event)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
