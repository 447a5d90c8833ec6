// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A recorder installed on a running shell sees every phase of a frame.

use core::time::Duration;

use kurbo::{Rect, Size, Vec2};
use lamina_core::canvas::Canvas;
use lamina_core::paint::Color;
use lamina_core::picture::PictureRecorder;
use lamina_core::time::HostTime;
use lamina_core::trace::{PhaseKind, RasterOutcome};
use lamina_core::{LayerTree, SceneBuilder};
use lamina_debug::chrome;
use lamina_debug::recorder::{RecordedEvent, RecorderSink};
use lamina_render::RecordingCanvas;
use lamina_shell::{ManualVsync, Settings, Shell, Surface, SurfaceFrame, ViewportMetrics};

struct NullSurface;

struct NullFrame(RecordingCanvas);

impl SurfaceFrame for NullFrame {
    fn paint(&mut self, paint: &mut dyn FnMut(&mut dyn Canvas)) {
        paint(&mut self.0);
    }

    fn submit(self: Box<Self>) -> bool {
        true
    }
}

impl Surface for NullSurface {
    fn size(&self) -> Size {
        Size::new(32.0, 32.0)
    }

    fn acquire_frame(&mut self, _: Size) -> Option<Box<dyn SurfaceFrame + '_>> {
        Some(Box::new(NullFrame(RecordingCanvas::new())))
    }
}

fn runtime(_: HostTime, _: HostTime, metrics: &ViewportMetrics) -> Option<LayerTree> {
    let mut rec = PictureRecorder::new();
    rec.fill_rect(Rect::new(0.0, 0.0, 8.0, 8.0), Color::from_rgb8(0, 0, 255));
    let mut b = SceneBuilder::new();
    b.add_picture(Vec2::ZERO, rec.finish(), 0);
    b.build().take_layer_tree(metrics.frame_metadata())
}

#[test]
fn one_frame_records_build_through_submit() {
    let (waiter, handle) = ManualVsync::new();
    let mut shell = Shell::create(Settings::default(), Box::new(waiter), Box::new(runtime), None).unwrap();
    let recorder = RecorderSink::shared();
    shell.set_trace_sink(Some(recorder.clone())).unwrap();
    shell.set_viewport_metrics(ViewportMetrics::with_size(32.0, 32.0)).unwrap();
    shell.on_surface_created(Box::new(NullSurface)).unwrap();
    shell.flush().unwrap();
    assert!(handle.fire_now(Duration::from_millis(16)), "vsync requested");
    shell.wait_for_first_frame(Duration::from_secs(2)).unwrap();
    shell.shutdown().unwrap();

    let bytes = recorder.lock().take_bytes();
    let events: Vec<_> = lamina_debug::recorder::decode(&bytes).collect();
    assert!(
        matches!(events.first(), Some(RecordedEvent::BeginFrame(e)) if e.frame_number == 1),
        "frame opens with begin frame: {events:?}"
    );
    let ended: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            RecordedEvent::PhaseEnd(p) => Some(p.phase),
            _ => None,
        })
        .collect();
    for phase in PhaseKind::ALL {
        assert!(ended.contains(&phase), "{phase:?} recorded: {events:?}");
    }
    assert!(
        events.iter().any(|e| matches!(e, RecordedEvent::FrameRasterized(r) if r.outcome == RasterOutcome::Success)),
        "presented"
    );
    assert!(
        events.iter().any(|e| matches!(e, RecordedEvent::FrameSummary(s) if s.frame_number == 1)),
        "summary emitted"
    );

    let mut json = Vec::new();
    chrome::export(&bytes, &mut json).unwrap();
    let parsed: Vec<serde_json::Value> = serde_json::from_slice(&json).unwrap();
    assert_eq!(parsed.len(), events.len() + 3, "track names plus a flow finish");
}
