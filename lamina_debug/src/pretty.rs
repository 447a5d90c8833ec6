// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`] destination (default: stderr). Timestamps are printed in
//! microseconds since the host clock epoch.

use core::time::Duration;
use std::io::Write;

use lamina_core::time::HostTime;
use lamina_core::trace::{
    BeginFrameEvent, FrameRasterizedEvent, FrameSubmittedEvent, FrameSummary, PhaseBeginEvent,
    PhaseEndEvent, RasterOutcome, TraceFlowEvent, TraceSink,
};

/// Writes human-readable trace lines to a [`Write`] destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write + Send>> {
    writer: W,
}

impl<W: Write> core::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PrettyPrintSink").finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
        }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes the sink and returns its writer.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn us(t: HostTime) -> f64 {
    t.as_nanos() as f64 / 1000.0
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn outcome_name(o: RasterOutcome) -> &'static str {
    match o {
        RasterOutcome::Success => "presented",
        RasterOutcome::Resubmitted => "resubmitted",
        RasterOutcome::Failed => "failed",
    }
}

// Write errors are dropped: a diagnostics sink must never fail a frame.
impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_begin_frame(&mut self, e: &BeginFrameEvent) {
        let _ = writeln!(
            self.writer,
            "[begin] frame={} start={:.1}µs target={:.1}µs",
            e.frame_number,
            us(e.frame_start),
            us(e.frame_target),
        );
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:begin] frame={} {} at {:.1}µs",
            e.frame_number,
            e.phase.name(),
            us(e.timestamp),
        );
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:end] frame={} {} at {:.1}µs",
            e.frame_number,
            e.phase.name(),
            us(e.timestamp),
        );
    }

    fn on_frame_submitted(&mut self, e: &FrameSubmittedEvent) {
        let _ = writeln!(
            self.writer,
            "[submitted] frame={} trace_id={} at {:.1}µs",
            e.frame_number,
            e.trace_id,
            us(e.timestamp),
        );
    }

    fn on_frame_rasterized(&mut self, e: &FrameRasterizedEvent) {
        let _ = writeln!(
            self.writer,
            "[raster] frame={} {} at {:.1}µs",
            e.frame_number,
            outcome_name(e.outcome),
            us(e.timestamp),
        );
    }

    fn on_trace_flow(&mut self, e: &TraceFlowEvent) {
        let _ = writeln!(
            self.writer,
            "[flow] id={} frame={} at {:.1}µs",
            e.flow_id,
            e.frame_number,
            us(e.timestamp),
        );
    }

    fn on_frame_summary(&mut self, s: &FrameSummary) {
        let _ = writeln!(
            self.writer,
            "[summary] frame={} build={:.2}ms preroll={:.2}ms paint={:.2}ms submit={:.2}ms{}",
            s.frame_number,
            ms(s.build),
            ms(s.preroll),
            ms(s.paint),
            ms(s.submit),
            if s.over_budget { " OVER BUDGET" } else { "" },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lamina_core::trace::PhaseKind;

    #[test]
    fn phase_lines_name_the_phase() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_phase_begin(&PhaseBeginEvent {
            frame_number: 2,
            phase: PhaseKind::Preroll,
            timestamp: HostTime(1_500),
        });
        let output = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(output, "[phase:begin] frame=2 preroll at 1.5µs\n", "got: {output}");
    }

    #[test]
    fn summary_flags_over_budget_frames() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        let summary = FrameSummary {
            frame_number: 3,
            frame_start: HostTime(0),
            build: Duration::from_millis(20),
            preroll: Duration::ZERO,
            paint: Duration::ZERO,
            submit: Duration::ZERO,
            over_budget: true,
        };
        sink.on_frame_summary(&summary);
        sink.on_frame_summary(&FrameSummary {
            over_budget: false,
            ..summary
        });
        let output = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), 2, "one line per event");
        assert!(lines[0].contains("build=20.00ms"), "got: {}", lines[0]);
        assert!(lines[0].ends_with("OVER BUDGET"), "got: {}", lines[0]);
        assert!(!lines[1].contains("OVER BUDGET"), "got: {}", lines[1]);
    }

    #[test]
    fn raster_outcome_is_spelled_out() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_frame_rasterized(&FrameRasterizedEvent {
            frame_number: 5,
            outcome: RasterOutcome::Resubmitted,
            timestamp: HostTime(0),
        });
        let output = String::from_utf8(sink.into_inner()).unwrap();
        assert!(output.contains("frame=5 resubmitted"), "got: {output}");
    }
}
