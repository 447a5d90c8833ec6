// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][format] JSON to the given writer.
//!
//! Build runs on the UI thread and the other phases on the raster thread, so
//! the two land on separate tracks (`tid` 1 and 2). Submitted trees become
//! flow arrows from the UI track to the raster track, keyed by frame number.
//!
//! [format]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use core::time::Duration;
use std::io::{self, Write};

use serde_json::{Value, json};

use lamina_core::time::HostTime;
use lamina_core::trace::{PhaseKind, RasterOutcome};

use crate::recorder::{RecordedEvent, decode};

const UI_TID: u32 = 1;
const RASTER_TID: u32 = 2;

fn us(t: HostTime) -> f64 {
    t.as_nanos() as f64 / 1000.0
}

fn dur_us(d: Duration) -> f64 {
    d.as_secs_f64() * 1_000_000.0
}

fn phase_tid(phase: PhaseKind) -> u32 {
    match phase {
        PhaseKind::Build => UI_TID,
        PhaseKind::Preroll | PhaseKind::Paint | PhaseKind::Submit => RASTER_TID,
    }
}

fn outcome_name(o: RasterOutcome) -> &'static str {
    match o {
        RasterOutcome::Success => "Success",
        RasterOutcome::Resubmitted => "Resubmitted",
        RasterOutcome::Failed => "Failed",
    }
}

fn thread_name(tid: u32, name: &str) -> Value {
    json!({
        "ph": "M",
        "name": "thread_name",
        "pid": 0,
        "tid": tid,
        "args": { "name": name },
    })
}

/// Converts recorded events to Chrome trace event objects.
#[must_use]
pub fn to_trace_events(bytes: &[u8]) -> Vec<Value> {
    let mut events = vec![thread_name(UI_TID, "ui"), thread_name(RASTER_TID, "raster")];

    for recorded in decode(bytes) {
        match recorded {
            RecordedEvent::BeginFrame(e) => events.push(json!({
                "ph": "i",
                "name": "BeginFrame",
                "cat": "Animator",
                "ts": us(e.frame_start),
                "pid": 0,
                "tid": UI_TID,
                "s": "t",
                "args": {
                    "frame_number": e.frame_number,
                    "target_us": us(e.frame_target),
                }
            })),
            RecordedEvent::PhaseBegin(e) => events.push(json!({
                "ph": "B",
                "name": e.phase.name(),
                "cat": "Frame",
                "ts": us(e.timestamp),
                "pid": 0,
                "tid": phase_tid(e.phase),
                "args": { "frame_number": e.frame_number }
            })),
            RecordedEvent::PhaseEnd(e) => events.push(json!({
                "ph": "E",
                "name": e.phase.name(),
                "cat": "Frame",
                "ts": us(e.timestamp),
                "pid": 0,
                "tid": phase_tid(e.phase),
                "args": { "frame_number": e.frame_number }
            })),
            RecordedEvent::FrameSubmitted(e) => events.push(json!({
                "ph": "s",
                "name": "Pipeline",
                "cat": "Pipeline",
                "id": e.frame_number,
                "ts": us(e.timestamp),
                "pid": 0,
                "tid": UI_TID,
                "args": { "trace_id": e.trace_id }
            })),
            RecordedEvent::FrameRasterized(e) => {
                if e.outcome == RasterOutcome::Success {
                    events.push(json!({
                        "ph": "f",
                        "bp": "e",
                        "name": "Pipeline",
                        "cat": "Pipeline",
                        "id": e.frame_number,
                        "ts": us(e.timestamp),
                        "pid": 0,
                        "tid": RASTER_TID,
                    }));
                }
                events.push(json!({
                    "ph": "i",
                    "name": "Rasterized",
                    "cat": "Rasterizer",
                    "ts": us(e.timestamp),
                    "pid": 0,
                    "tid": RASTER_TID,
                    "s": "t",
                    "args": {
                        "frame_number": e.frame_number,
                        "outcome": outcome_name(e.outcome),
                    }
                }));
            }
            RecordedEvent::TraceFlow(e) => events.push(json!({
                "ph": "i",
                "name": "TraceFlow",
                "cat": "Input",
                "ts": us(e.timestamp),
                "pid": 0,
                "tid": UI_TID,
                "s": "t",
                "args": {
                    "flow_id": e.flow_id,
                    "frame_number": e.frame_number,
                }
            })),
            RecordedEvent::FrameSummary(s) => events.push(json!({
                "ph": "i",
                "name": "FrameSummary",
                "cat": "Summary",
                "ts": us(s.frame_start),
                "pid": 0,
                "tid": RASTER_TID,
                "s": "g",
                "args": {
                    "frame_number": s.frame_number,
                    "build_us": dur_us(s.build),
                    "preroll_us": dur_us(s.preroll),
                    "paint_us": dur_us(s.paint),
                    "submit_us": dur_us(s.submit),
                    "over_budget": s.over_budget,
                }
            })),
        }
    }
    events
}

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
/// It opens with two metadata records naming the UI and raster tracks.
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    serde_json::to_writer_pretty(writer, &to_trace_events(bytes))?;
    Ok(())
}
