// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame cadence on the UI thread.
//!
//! The [`Animator`] turns frame requests into at most one vsync wait, and
//! each vsync into at most one layer tree submitted to the pipeline.
//!
//! ```text
//!   request_frame(regenerate) ──► waiter.async_wait_for_vsync
//!                                          │
//!                 vsync target posts on_vsync to the ui thread
//!                                          ▼
//!   on_vsync ─┬─ reuse allowed ──► delegate.on_animator_draw_last_layer_tree
//!             └─ otherwise ──► take a permit ─► delegate.on_animator_begin_frame
//!                                                    │ Some(tree)
//!                                                    ▼
//!                                 render: complete(tree) ─► delegate.on_animator_draw
//! ```
//!
//! The animator never owns its delegate. Methods that call back take it as
//! `&mut dyn AnimatorDelegate`.

use core::fmt;
use core::time::Duration;
use std::collections::VecDeque;
use std::sync::Arc;

use lamina_core::time::HostTime;
use lamina_core::trace::{BeginFrameEvent, FrameSubmittedEvent, PhaseBeginEvent, PhaseEndEvent, PhaseKind, TraceFlowEvent};
use lamina_core::{BuildTimes, LayerTree};

use crate::pipeline::{Pipeline, ProducerContinuation};
use crate::settings::Settings;
use crate::vsync::VsyncWaiter;
use crate::{SharedTraceSink, with_tracer};

/// Called with `(frame_start, frame_target)` when a requested vsync arrives.
///
/// Typically posts [`Animator::on_vsync`] to the UI thread.
pub type VsyncTarget = Arc<dyn Fn(HostTime, HostTime) + Send + Sync>;

/// Callback run at the next vsync regardless of frame production.
pub type SecondaryVsyncCallback = Box<dyn FnOnce(HostTime) + Send>;

/// What the animator asks of the engine.
pub trait AnimatorDelegate {
    /// Build a layer tree for the frame. `None` submits nothing; the held
    /// pipeline permit carries over to the next frame.
    fn on_animator_begin_frame(&mut self, frame_start: HostTime, frame_target: HostTime) -> Option<LayerTree>;

    /// The UI thread is idle until `deadline`.
    fn on_animator_notify_idle(&mut self, deadline: HostTime);

    /// A tree was queued; arrange for the rasterizer to consume it.
    fn on_animator_draw(&mut self, pipeline: &Arc<Pipeline<LayerTree>>);

    /// Present the previous tree again.
    fn on_animator_draw_last_layer_tree(&mut self);
}

/// Frame scheduler driving the UI side of the pipeline.
pub struct Animator {
    waiter: Box<dyn VsyncWaiter>,
    vsync_target: VsyncTarget,
    pipeline: Arc<Pipeline<LayerTree>>,
    producer_continuation: Option<ProducerContinuation<LayerTree>>,
    frame_budget: Duration,

    paused: bool,
    regenerate_layer_tree: bool,
    frame_scheduled: bool,
    awaiting_vsync: bool,
    dimension_change_pending: bool,

    frame_number: u64,
    frame_start: HostTime,
    frame_target: HostTime,
    build_start: HostTime,

    trace_flow_ids: VecDeque<u64>,
    secondary_callbacks: Vec<SecondaryVsyncCallback>,
    trace_sink: Option<SharedTraceSink>,
}

impl fmt::Debug for Animator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Animator")
            .field("pipeline", &self.pipeline.id())
            .field("paused", &self.paused)
            .field("regenerate_layer_tree", &self.regenerate_layer_tree)
            .field("frame_scheduled", &self.frame_scheduled)
            .field("awaiting_vsync", &self.awaiting_vsync)
            .field("dimension_change_pending", &self.dimension_change_pending)
            .field("frame_number", &self.frame_number)
            .finish_non_exhaustive()
    }
}

impl Animator {
    /// Creates a paused animator with a pipeline sized by `settings`.
    ///
    /// Nothing happens until [`start`](Self::start).
    #[must_use]
    pub fn new(settings: &Settings, waiter: Box<dyn VsyncWaiter>, vsync_target: VsyncTarget) -> Self {
        Self {
            waiter,
            vsync_target,
            pipeline: Pipeline::new(settings.effective_pipeline_depth()),
            producer_continuation: None,
            frame_budget: settings.frame_budget(),
            paused: true,
            regenerate_layer_tree: false,
            frame_scheduled: false,
            awaiting_vsync: false,
            dimension_change_pending: false,
            frame_number: 0,
            frame_start: HostTime::ZERO,
            frame_target: HostTime::ZERO,
            build_start: HostTime::ZERO,
            trace_flow_ids: VecDeque::new(),
            secondary_callbacks: Vec::new(),
            trace_sink: None,
        }
    }

    /// Attaches a trace sink for frame events.
    pub fn set_trace_sink(&mut self, sink: Option<SharedTraceSink>) {
        self.trace_sink = sink;
    }

    /// The pipeline trees are submitted to.
    #[must_use]
    pub fn pipeline(&self) -> &Arc<Pipeline<LayerTree>> {
        &self.pipeline
    }

    /// Frames begun so far.
    #[must_use]
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Returns `true` while stopped.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Returns `true` if a frame is waiting for its vsync.
    #[must_use]
    pub fn frame_scheduled(&self) -> bool {
        self.frame_scheduled
    }

    /// Target time of the current frame, for idle deadlines.
    #[must_use]
    pub fn frame_target(&self) -> HostTime {
        self.frame_target
    }

    /// Flow ids not yet attached to a frame.
    #[must_use]
    pub fn pending_trace_flows(&self) -> usize {
        self.trace_flow_ids.len()
    }

    /// Resumes vsync requests and asks for a frame.
    pub fn start(&mut self) {
        if !self.paused {
            return;
        }
        self.paused = false;
        self.request_frame(true);
    }

    /// Stops requesting vsync. A vsync already requested still arrives.
    pub fn stop(&mut self) {
        self.paused = true;
    }

    /// The next frame must build a new tree even if reuse was requested.
    pub fn set_dimension_change_pending(&mut self) {
        self.dimension_change_pending = true;
    }

    /// Associates an input event's flow id with the next frame.
    pub fn enqueue_trace_flow_id(&mut self, flow_id: u64) {
        self.trace_flow_ids.push_back(flow_id);
    }

    /// Asks for a frame at the next vsync.
    ///
    /// With `regenerate_layer_tree` false the previous tree is presented
    /// again unless a regenerating request is also pending.
    pub fn request_frame(&mut self, regenerate_layer_tree: bool) {
        if regenerate_layer_tree {
            self.regenerate_layer_tree = true;
        }
        if self.paused && !self.dimension_change_pending {
            return;
        }
        if self.frame_scheduled {
            return;
        }
        self.frame_scheduled = true;
        self.await_vsync();
    }

    /// Runs `callback` at the next vsync without producing a frame.
    pub fn schedule_secondary_vsync_callback(&mut self, callback: SecondaryVsyncCallback) {
        self.secondary_callbacks.push(callback);
        self.await_vsync();
    }

    fn await_vsync(&mut self) {
        if self.awaiting_vsync {
            return;
        }
        self.awaiting_vsync = true;
        let target = Arc::clone(&self.vsync_target);
        self.waiter
            .async_wait_for_vsync(Box::new(move |start, frame_target| target(start, frame_target)));
    }

    fn can_reuse_last_layer_tree(&self) -> bool {
        !self.regenerate_layer_tree && !self.dimension_change_pending
    }

    /// Handles a vsync delivered through the vsync target.
    pub fn on_vsync(&mut self, frame_start: HostTime, frame_target: HostTime, delegate: &mut dyn AnimatorDelegate) {
        self.awaiting_vsync = false;
        for callback in core::mem::take(&mut self.secondary_callbacks) {
            callback(frame_start);
        }
        if !self.frame_scheduled {
            return;
        }
        if self.can_reuse_last_layer_tree() {
            self.frame_scheduled = false;
            delegate.on_animator_draw_last_layer_tree();
            return;
        }
        self.begin_frame(frame_start, frame_target, delegate);
    }

    fn begin_frame(&mut self, frame_start: HostTime, frame_target: HostTime, delegate: &mut dyn AnimatorDelegate) {
        self.frame_number += 1;
        self.frame_scheduled = false;
        self.regenerate_layer_tree = false;
        self.frame_start = frame_start;
        self.frame_target = frame_target;

        let frame_number = self.frame_number;
        let flows: Vec<u64> = self.trace_flow_ids.drain(..).collect();
        with_tracer(self.trace_sink.as_ref(), |t| {
            t.begin_frame(&BeginFrameEvent {
                frame_number,
                frame_start,
                frame_target,
            });
            for flow_id in flows {
                t.trace_flow(&TraceFlowEvent {
                    flow_id,
                    frame_number,
                    timestamp: frame_start,
                });
            }
        });

        if self.producer_continuation.is_none() {
            self.producer_continuation = self.pipeline.produce();
            if self.producer_continuation.is_none() {
                log::debug!("frame {frame_number} skipped: pipeline full");
                // Queued trees hold every permit; only a draw releases them.
                if !self.pipeline.is_empty() {
                    delegate.on_animator_draw(&self.pipeline);
                }
                delegate.on_animator_notify_idle(frame_target);
                self.request_frame(true);
                return;
            }
        }

        self.build_start = HostTime::now();
        let build_start = self.build_start;
        with_tracer(self.trace_sink.as_ref(), |t| {
            t.phase_begin(&PhaseBeginEvent {
                frame_number,
                phase: PhaseKind::Build,
                timestamp: build_start,
            });
        });
        if let Some(tree) = delegate.on_animator_begin_frame(frame_start, frame_target) {
            self.render(tree, delegate);
        }
        let build_end = HostTime::now();
        with_tracer(self.trace_sink.as_ref(), |t| {
            t.phase_end(&PhaseEndEvent {
                frame_number,
                phase: PhaseKind::Build,
                timestamp: build_end,
            });
        });
        if build_end.saturating_duration_since(frame_start) > self.frame_budget {
            log::debug!("frame {frame_number} build overran its budget");
        }

        if !self.frame_scheduled {
            delegate.on_animator_notify_idle(frame_target);
        }
    }

    /// Submits `tree` for the current frame and asks the delegate to draw.
    ///
    /// Returns `false` if no frame is in progress; the tree is dropped.
    pub fn render(&mut self, mut tree: LayerTree, delegate: &mut dyn AnimatorDelegate) -> bool {
        let Some(continuation) = self.producer_continuation.take() else {
            log::warn!("render outside a frame; layer tree dropped");
            return false;
        };
        if self.dimension_change_pending {
            self.dimension_change_pending = false;
        }
        tree.record_build(
            self.frame_number,
            BuildTimes {
                vsync_start: self.frame_start,
                build_start: self.build_start,
                build_finish: HostTime::now(),
            },
        );
        let trace_id = continuation.trace_id();
        if !continuation.complete(tree) {
            return false;
        }
        let frame_number = self.frame_number;
        with_tracer(self.trace_sink.as_ref(), |t| {
            t.frame_submitted(&FrameSubmittedEvent {
                frame_number,
                trace_id,
                timestamp: HostTime::now(),
            });
        });
        delegate.on_animator_draw(&self.pipeline);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ConsumeResult;
    use crate::vsync::{ManualVsync, ManualVsyncHandle};
    use lamina_core::{FrameMetadata, SceneBuilder};

    #[derive(Default)]
    struct Recorder {
        build: bool,
        begin_frames: u32,
        idle: u32,
        draws: u32,
        draw_last: u32,
    }

    impl AnimatorDelegate for Recorder {
        fn on_animator_begin_frame(&mut self, _: HostTime, _: HostTime) -> Option<LayerTree> {
            self.begin_frames += 1;
            self.build.then(|| {
                SceneBuilder::new()
                    .build()
                    .take_layer_tree(FrameMetadata::with_size(10.0, 10.0))
                    .expect("fresh scene")
            })
        }
        fn on_animator_notify_idle(&mut self, _: HostTime) {
            self.idle += 1;
        }
        fn on_animator_draw(&mut self, _: &Arc<Pipeline<LayerTree>>) {
            self.draws += 1;
        }
        fn on_animator_draw_last_layer_tree(&mut self) {
            self.draw_last += 1;
        }
    }

    fn animator(settings: &Settings) -> (Animator, ManualVsyncHandle) {
        let (waiter, handle) = ManualVsync::new();
        let a = Animator::new(settings, Box::new(waiter), Arc::new(|_, _| {}));
        (a, handle)
    }

    fn vsync(a: &mut Animator, handle: &ManualVsyncHandle, d: &mut Recorder) {
        assert!(handle.fire(HostTime(0), HostTime(16)), "vsync was requested");
        a.on_vsync(HostTime(0), HostTime(16), d);
    }

    #[test]
    fn paused_animator_requests_nothing_until_started() {
        let (mut a, handle) = animator(&Settings::default());
        a.request_frame(true);
        assert!(!handle.is_waiting(), "paused: no vsync");
        a.start();
        assert!(handle.is_waiting(), "start requests a frame");
    }

    #[test]
    fn begin_frame_submits_one_tree() {
        let (mut a, handle) = animator(&Settings::default());
        let mut d = Recorder {
            build: true,
            ..Recorder::default()
        };
        a.start();
        vsync(&mut a, &handle, &mut d);
        assert_eq!(a.frame_number(), 1, "frame counted");
        assert_eq!((d.begin_frames, d.draws), (1, 1), "built and drawn");
        assert_eq!(a.pipeline().len(), 1, "tree queued");
        a.pipeline().consume(|tree| {
            assert_eq!(tree.frame_number(), 1, "tree stamped with its frame");
            assert!(tree.build_times().is_some(), "build times recorded");
            ConsumeResult::Done
        });
        assert!(!handle.is_waiting(), "no further frame requested");
        assert_eq!(d.idle, 1, "idle notified after the frame");
    }

    #[test]
    fn reuse_request_draws_last_tree() {
        let (mut a, handle) = animator(&Settings::default());
        let mut d = Recorder::default();
        a.start();
        vsync(&mut a, &handle, &mut d);
        a.request_frame(false);
        vsync(&mut a, &handle, &mut d);
        assert_eq!(d.begin_frames, 1, "only the first frame regenerated");
        assert_eq!(d.draw_last, 1, "second frame reused the last tree");
        assert_eq!(a.frame_number(), 1, "reuse does not count a frame");
    }

    #[test]
    fn dimension_change_forces_regeneration() {
        let (mut a, handle) = animator(&Settings::default());
        let mut d = Recorder {
            build: true,
            ..Recorder::default()
        };
        a.start();
        vsync(&mut a, &handle, &mut d);
        a.set_dimension_change_pending();
        a.request_frame(false);
        vsync(&mut a, &handle, &mut d);
        assert_eq!((d.begin_frames, d.draw_last), (2, 0), "regenerated despite reuse request");
    }

    #[test]
    fn full_pipeline_skips_frame() {
        let (mut a, handle) = animator(&Settings::strict());
        let mut d = Recorder {
            build: true,
            ..Recorder::default()
        };
        a.start();
        vsync(&mut a, &handle, &mut d);
        a.request_frame(true);
        vsync(&mut a, &handle, &mut d);
        assert_eq!(d.begin_frames, 1, "second frame skipped");
        assert_eq!(d.draws, 2, "skipped frame asked for the queued tree to be drawn");
        assert_eq!(a.pipeline().len(), 1, "one tree in flight");
        assert!(handle.is_waiting(), "frame requested again");
        a.pipeline().consume(|_| ConsumeResult::Done);
        vsync(&mut a, &handle, &mut d);
        assert_eq!(d.begin_frames, 2, "built once a permit was free");
    }

    #[test]
    fn render_without_frame_is_dropped() {
        let (mut a, _handle) = animator(&Settings::default());
        let mut d = Recorder::default();
        let tree = SceneBuilder::new()
            .build()
            .take_layer_tree(FrameMetadata::with_size(1.0, 1.0))
            .expect("tree");
        assert!(!a.render(tree, &mut d), "no continuation held");
        assert_eq!(d.draws, 0, "nothing drawn");
        assert!(a.pipeline().is_empty(), "nothing queued");
    }

    #[test]
    fn continuation_carries_over_when_nothing_rendered() {
        let (mut a, handle) = animator(&Settings::strict());
        let mut d = Recorder::default();
        a.start();
        vsync(&mut a, &handle, &mut d);
        assert_eq!(a.pipeline().available_permits(), 0, "permit held for the next render");
        let tree = SceneBuilder::new()
            .build()
            .take_layer_tree(FrameMetadata::with_size(1.0, 1.0))
            .expect("tree");
        assert!(a.render(tree, &mut d), "late render uses the held permit");
        assert_eq!(a.pipeline().len(), 1, "queued");
    }

    #[test]
    fn trace_flows_flush_at_begin_frame() {
        let (mut a, handle) = animator(&Settings::default());
        let mut d = Recorder::default();
        a.enqueue_trace_flow_id(7);
        a.enqueue_trace_flow_id(8);
        assert_eq!(a.pending_trace_flows(), 2, "queued");
        a.start();
        vsync(&mut a, &handle, &mut d);
        assert_eq!(a.pending_trace_flows(), 0, "flushed");
    }

    #[test]
    fn secondary_callback_runs_without_a_frame() {
        let (mut a, handle) = animator(&Settings::default());
        let mut d = Recorder::default();
        let ran = Arc::new(parking_lot::Mutex::new(None));
        let r = Arc::clone(&ran);
        a.schedule_secondary_vsync_callback(Box::new(move |t| *r.lock() = Some(t)));
        vsync(&mut a, &handle, &mut d);
        assert_eq!(*ran.lock(), Some(HostTime(0)), "ran with the frame start");
        assert_eq!((d.begin_frames, d.draw_last), (0, 0), "no frame produced");
    }
}
