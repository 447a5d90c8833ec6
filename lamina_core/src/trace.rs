// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for the frame pipeline.
//!
//! [`TraceSink`] has one method per event the animator and rasterizer emit.
//! All bodies default to no-ops, so a sink implements only what it needs.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. With the `trace` feature
//! **off** every `Tracer` method compiles to nothing; with it **on**, each
//! method is one `Option` branch.
//!
//! [`FrameSummaryBuilder`] collects phase timestamps for one frame and
//! produces a [`FrameSummary`].

use core::time::Duration;

use crate::time::HostTime;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which phase of a frame is being measured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    /// Authoring-side scene construction.
    Build,
    /// Bounds computation over the layer tree.
    Preroll,
    /// Emitting draw commands to the canvas.
    Paint,
    /// Handing the finished frame to the surface.
    Submit,
}

impl PhaseKind {
    /// Every phase, in frame order.
    pub const ALL: [Self; 4] = [Self::Build, Self::Preroll, Self::Paint, Self::Submit];

    /// Short lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Preroll => "preroll",
            Self::Paint => "paint",
            Self::Submit => "submit",
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Build => 0,
            Self::Preroll => 1,
            Self::Paint => 2,
            Self::Submit => 3,
        }
    }
}

/// How a rasterization attempt ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RasterOutcome {
    /// Presented.
    Success,
    /// Surface not ready; the tree will be drawn again.
    Resubmitted,
    /// Dropped without presenting.
    Failed,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when the animator starts a frame on vsync.
#[derive(Clone, Copy, Debug)]
pub struct BeginFrameEvent {
    /// Monotonic frame counter.
    pub frame_number: u64,
    /// Vsync timestamp.
    pub frame_start: HostTime,
    /// Time by which the frame should be on screen.
    pub frame_target: HostTime,
}

/// Marks the beginning of a phase.
#[derive(Clone, Copy, Debug)]
pub struct PhaseBeginEvent {
    /// Frame counter.
    pub frame_number: u64,
    /// Which phase is starting.
    pub phase: PhaseKind,
    /// Host time at the start of the phase.
    pub timestamp: HostTime,
}

/// Marks the end of a phase.
#[derive(Clone, Copy, Debug)]
pub struct PhaseEndEvent {
    /// Frame counter.
    pub frame_number: u64,
    /// Which phase is ending.
    pub phase: PhaseKind,
    /// Host time at the end of the phase.
    pub timestamp: HostTime,
}

/// Emitted when a layer tree enters the pipeline.
#[derive(Clone, Copy, Debug)]
pub struct FrameSubmittedEvent {
    /// Frame counter.
    pub frame_number: u64,
    /// Pipeline continuation id.
    pub trace_id: u64,
    /// Host time of submission.
    pub timestamp: HostTime,
}

/// Emitted after each rasterization attempt.
#[derive(Clone, Copy, Debug)]
pub struct FrameRasterizedEvent {
    /// Frame counter of the tree that was drawn.
    pub frame_number: u64,
    /// Result of the attempt.
    pub outcome: RasterOutcome,
    /// Host time when the attempt finished.
    pub timestamp: HostTime,
}

/// Emitted when the animator flushes a queued trace-flow id.
#[derive(Clone, Copy, Debug)]
pub struct TraceFlowEvent {
    /// Flow id supplied by the input path.
    pub flow_id: u64,
    /// Frame the flow ends in.
    pub frame_number: u64,
    /// Host time of the flush.
    pub timestamp: HostTime,
}

/// Per-frame timing summary produced by [`FrameSummaryBuilder`].
#[derive(Clone, Copy, Debug)]
pub struct FrameSummary {
    /// Frame counter.
    pub frame_number: u64,
    /// Vsync timestamp.
    pub frame_start: HostTime,
    /// Build duration (zero if not measured).
    pub build: Duration,
    /// Preroll duration (zero if not measured).
    pub preroll: Duration,
    /// Paint duration (zero if not measured).
    pub paint: Duration,
    /// Submit duration (zero if not measured).
    pub submit: Duration,
    /// Whether the frame took longer than its budget.
    pub over_budget: bool,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the frame pipeline.
///
/// All methods have default no-op implementations.
pub trait TraceSink {
    /// Called when a frame begins on vsync.
    fn on_begin_frame(&mut self, e: &BeginFrameEvent) {
        _ = e;
    }

    /// Called at the beginning of a phase.
    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        _ = e;
    }

    /// Called at the end of a phase.
    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        _ = e;
    }

    /// Called when a tree enters the pipeline.
    fn on_frame_submitted(&mut self, e: &FrameSubmittedEvent) {
        _ = e;
    }

    /// Called after each rasterization attempt.
    fn on_frame_rasterized(&mut self, e: &FrameRasterizedEvent) {
        _ = e;
    }

    /// Called for each trace-flow id flushed at the start of a frame.
    fn on_trace_flow(&mut self, e: &TraceFlowEvent) {
        _ = e;
    }

    /// Called with a per-frame timing summary.
    fn on_frame_summary(&mut self, s: &FrameSummary) {
        _ = s;
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

macro_rules! dispatch {
    ($self:ident, $method:ident, $e:ident) => {{
        #[cfg(feature = "trace")]
        if let Some(s) = &mut $self.sink {
            s.$method($e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = $e;
        }
    }};
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer over an optional sink.
    #[inline]
    #[must_use]
    pub fn maybe(sink: Option<&'a mut dyn TraceSink>) -> Self {
        match sink {
            Some(s) => Self::new(s),
            None => Self::none(),
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Emits a [`BeginFrameEvent`].
    #[inline]
    pub fn begin_frame(&mut self, e: &BeginFrameEvent) {
        dispatch!(self, on_begin_frame, e);
    }

    /// Emits a [`PhaseBeginEvent`].
    #[inline]
    pub fn phase_begin(&mut self, e: &PhaseBeginEvent) {
        dispatch!(self, on_phase_begin, e);
    }

    /// Emits a [`PhaseEndEvent`].
    #[inline]
    pub fn phase_end(&mut self, e: &PhaseEndEvent) {
        dispatch!(self, on_phase_end, e);
    }

    /// Emits a [`FrameSubmittedEvent`].
    #[inline]
    pub fn frame_submitted(&mut self, e: &FrameSubmittedEvent) {
        dispatch!(self, on_frame_submitted, e);
    }

    /// Emits a [`FrameRasterizedEvent`].
    #[inline]
    pub fn frame_rasterized(&mut self, e: &FrameRasterizedEvent) {
        dispatch!(self, on_frame_rasterized, e);
    }

    /// Emits a [`TraceFlowEvent`].
    #[inline]
    pub fn trace_flow(&mut self, e: &TraceFlowEvent) {
        dispatch!(self, on_trace_flow, e);
    }

    /// Emits a [`FrameSummary`].
    #[inline]
    pub fn frame_summary(&mut self, s: &FrameSummary) {
        dispatch!(self, on_frame_summary, s);
    }
}

// ---------------------------------------------------------------------------
// FrameSummaryBuilder
// ---------------------------------------------------------------------------

/// Collects phase timestamps during a frame and produces a [`FrameSummary`].
#[derive(Debug)]
pub struct FrameSummaryBuilder {
    frame_number: u64,
    frame_start: HostTime,
    budget: Duration,
    starts: [Option<HostTime>; 4],
    ends: [Option<HostTime>; 4],
}

impl FrameSummaryBuilder {
    /// Starts a summary for a frame with the given budget.
    #[must_use]
    pub fn new(frame_number: u64, frame_start: HostTime, budget: Duration) -> Self {
        Self {
            frame_number,
            frame_start,
            budget,
            starts: [None; 4],
            ends: [None; 4],
        }
    }

    /// Records the start of a phase.
    pub fn phase_begin(&mut self, phase: PhaseKind, t: HostTime) {
        self.starts[phase.index()] = Some(t);
    }

    /// Records the end of a phase.
    pub fn phase_end(&mut self, phase: PhaseKind, t: HostTime) {
        self.ends[phase.index()] = Some(t);
    }

    fn duration(&self, phase: PhaseKind) -> Duration {
        match (self.starts[phase.index()], self.ends[phase.index()]) {
            (Some(s), Some(e)) => e.saturating_duration_since(s),
            _ => Duration::ZERO,
        }
    }

    /// Consumes the builder and produces the final [`FrameSummary`].
    #[must_use]
    pub fn finish(self) -> FrameSummary {
        let [build, preroll, paint, submit] = PhaseKind::ALL.map(|p| self.duration(p));
        FrameSummary {
            frame_number: self.frame_number,
            frame_start: self.frame_start,
            build,
            preroll,
            paint,
            submit,
            over_budget: build + preroll + paint + submit > self.budget,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_measures_recorded_phases() {
        let mut b = FrameSummaryBuilder::new(3, HostTime(0), Duration::from_millis(16));
        b.phase_begin(PhaseKind::Preroll, HostTime(1_000));
        b.phase_end(PhaseKind::Preroll, HostTime(3_000));
        b.phase_begin(PhaseKind::Paint, HostTime(3_000));
        b.phase_end(PhaseKind::Paint, HostTime(10_000));
        let s = b.finish();
        assert_eq!(s.frame_number, 3, "frame number carried");
        assert_eq!(s.preroll, Duration::from_nanos(2_000), "preroll span");
        assert_eq!(s.paint, Duration::from_nanos(7_000), "paint span");
        assert_eq!(s.build, Duration::ZERO, "unmeasured phase is zero");
        assert!(!s.over_budget, "well under 16 ms");
    }

    #[test]
    fn summary_flags_over_budget() {
        let mut b = FrameSummaryBuilder::new(0, HostTime(0), Duration::from_millis(1));
        b.phase_begin(PhaseKind::Build, HostTime(0));
        b.phase_end(PhaseKind::Build, HostTime(2_000_000));
        assert!(b.finish().over_budget, "2 ms build exceeds a 1 ms budget");
    }

    #[test]
    fn noop_tracer_accepts_events() {
        let mut sink = NoopSink;
        let mut t = Tracer::new(&mut sink);
        t.begin_frame(&BeginFrameEvent {
            frame_number: 1,
            frame_start: HostTime(0),
            frame_target: HostTime(16),
        });
        Tracer::none().trace_flow(&TraceFlowEvent {
            flow_id: 9,
            frame_number: 1,
            timestamp: HostTime(1),
        });
    }
}
