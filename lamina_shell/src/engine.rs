// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! UI-thread glue between the authoring runtime and the animator.

use core::fmt;
use std::sync::Arc;

use kurbo::Size;
use lamina_core::time::HostTime;
use lamina_core::{FrameMetadata, LayerTree};

use crate::animator::{Animator, AnimatorDelegate, VsyncTarget};
use crate::pipeline::Pipeline;
use crate::settings::Settings;
use crate::vsync::VsyncWaiter;
use crate::SharedTraceSink;

/// Size and density of the view being drawn into.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportMetrics {
    /// Physical pixels per logical pixel.
    pub device_pixel_ratio: f64,
    /// Width in physical pixels.
    pub physical_width: f64,
    /// Height in physical pixels.
    pub physical_height: f64,
    /// Maximum elevation for physical shapes.
    pub physical_depth: f64,
}

impl Default for ViewportMetrics {
    fn default() -> Self {
        Self {
            device_pixel_ratio: 1.0,
            physical_width: 0.0,
            physical_height: 0.0,
            physical_depth: f64::MAX,
        }
    }
}

impl ViewportMetrics {
    /// Metrics for a `width` x `height` view at ratio 1.
    #[must_use]
    pub fn with_size(width: f64, height: f64) -> Self {
        Self {
            physical_width: width,
            physical_height: height,
            ..Self::default()
        }
    }

    /// Physical size.
    #[must_use]
    pub fn size(&self) -> Size {
        Size::new(self.physical_width, self.physical_height)
    }

    /// Frame metadata for a tree built against these metrics.
    #[must_use]
    pub fn frame_metadata(&self) -> FrameMetadata {
        FrameMetadata {
            frame_size: self.size(),
            device_pixel_ratio: self.device_pixel_ratio,
            physical_depth: self.physical_depth,
        }
    }

    fn dimensions_differ(&self, other: &Self) -> bool {
        self.physical_width != other.physical_width
            || self.physical_height != other.physical_height
            || self.physical_depth != other.physical_depth
    }
}

/// Application lifecycle as reported by the host.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AppLifecycleState {
    /// Not attached to any view.
    Detached,
    /// Visible and receiving input.
    #[default]
    Resumed,
    /// Visible but not receiving input.
    Inactive,
    /// Not visible.
    Paused,
}

impl AppLifecycleState {
    const fn draws_frames(self) -> bool {
        matches!(self, Self::Resumed | Self::Inactive)
    }
}

/// The authoring side: builds a layer tree when a frame begins.
pub trait Runtime: Send {
    /// Builds the tree for a frame. `None` submits nothing.
    fn begin_frame(&mut self, frame_start: HostTime, frame_target: HostTime, metrics: &ViewportMetrics)
    -> Option<LayerTree>;

    /// Idle until `deadline`.
    fn notify_idle(&mut self, deadline: HostTime) {
        _ = deadline;
    }

    /// An input event with trace flow `flow_id` arrived.
    fn dispatch_pointer_data(&mut self, flow_id: u64) {
        _ = flow_id;
    }
}

impl<F> Runtime for F
where
    F: FnMut(HostTime, HostTime, &ViewportMetrics) -> Option<LayerTree> + Send,
{
    fn begin_frame(&mut self, frame_start: HostTime, frame_target: HostTime, metrics: &ViewportMetrics) -> Option<LayerTree> {
        self(frame_start, frame_target, metrics)
    }
}

/// What the engine asks of the shell.
pub trait EngineDelegate: Send {
    /// A tree was queued in `pipeline`.
    fn on_engine_draw(&mut self, pipeline: &Arc<Pipeline<LayerTree>>);

    /// Present the previous tree again.
    fn on_engine_draw_last_layer_tree(&mut self);
}

/// Owns the animator and the runtime on the UI thread.
pub struct Engine {
    animator: Animator,
    runtime: Box<dyn Runtime>,
    delegate: Box<dyn EngineDelegate>,
    viewport_metrics: ViewportMetrics,
    lifecycle_state: AppLifecycleState,
    have_surface: bool,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("animator", &self.animator)
            .field("viewport_metrics", &self.viewport_metrics)
            .field("lifecycle_state", &self.lifecycle_state)
            .field("have_surface", &self.have_surface)
            .finish_non_exhaustive()
    }
}

/// Borrowed pieces of the engine the animator calls back into.
struct Hooks<'a> {
    runtime: &'a mut dyn Runtime,
    delegate: &'a mut dyn EngineDelegate,
    metrics: &'a ViewportMetrics,
}

impl AnimatorDelegate for Hooks<'_> {
    fn on_animator_begin_frame(&mut self, frame_start: HostTime, frame_target: HostTime) -> Option<LayerTree> {
        self.runtime
            .begin_frame(frame_start, frame_target, self.metrics)
            .filter(is_well_formed)
    }

    fn on_animator_notify_idle(&mut self, deadline: HostTime) {
        self.runtime.notify_idle(deadline);
    }

    fn on_animator_draw(&mut self, pipeline: &Arc<Pipeline<LayerTree>>) {
        self.delegate.on_engine_draw(pipeline);
    }

    fn on_animator_draw_last_layer_tree(&mut self) {
        self.delegate.on_engine_draw_last_layer_tree();
    }
}

fn is_well_formed(tree: &LayerTree) -> bool {
    match tree.validate() {
        Ok(()) => true,
        Err(err) => {
            log::debug!("layer tree dropped: {err}");
            false
        }
    }
}

impl Engine {
    /// Creates an engine whose animator waits on `waiter`.
    #[must_use]
    pub fn new(
        settings: &Settings,
        runtime: Box<dyn Runtime>,
        delegate: Box<dyn EngineDelegate>,
        waiter: Box<dyn VsyncWaiter>,
        vsync_target: VsyncTarget,
    ) -> Self {
        Self {
            animator: Animator::new(settings, waiter, vsync_target),
            runtime,
            delegate,
            viewport_metrics: ViewportMetrics::default(),
            lifecycle_state: AppLifecycleState::default(),
            have_surface: false,
        }
    }

    /// The animator.
    #[must_use]
    pub fn animator(&self) -> &Animator {
        &self.animator
    }

    /// Attaches a trace sink to the animator.
    pub fn set_trace_sink(&mut self, sink: Option<SharedTraceSink>) {
        self.animator.set_trace_sink(sink);
    }

    /// Current viewport metrics.
    #[must_use]
    pub fn viewport_metrics(&self) -> &ViewportMetrics {
        &self.viewport_metrics
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn lifecycle_state(&self) -> AppLifecycleState {
        self.lifecycle_state
    }

    fn hooks(&mut self) -> (&mut Animator, Hooks<'_>) {
        (
            &mut self.animator,
            Hooks {
                runtime: &mut *self.runtime,
                delegate: &mut *self.delegate,
                metrics: &self.viewport_metrics,
            },
        )
    }

    /// Handles a vsync delivered to the UI thread.
    pub fn on_vsync(&mut self, frame_start: HostTime, frame_target: HostTime) {
        let (animator, mut hooks) = self.hooks();
        animator.on_vsync(frame_start, frame_target, &mut hooks);
    }

    /// Submits a tree built outside [`Runtime::begin_frame`].
    ///
    /// Malformed trees are dropped. Returns `true` if the tree was queued.
    pub fn render(&mut self, tree: LayerTree) -> bool {
        if !is_well_formed(&tree) {
            return false;
        }
        let (animator, mut hooks) = self.hooks();
        animator.render(tree, &mut hooks)
    }

    /// Asks for a frame. See [`Animator::request_frame`].
    pub fn schedule_frame(&mut self, regenerate_layer_tree: bool) {
        self.animator.request_frame(regenerate_layer_tree);
    }

    /// Records new metrics. A size or depth change forces the next frame to
    /// rebuild.
    pub fn set_viewport_metrics(&mut self, metrics: ViewportMetrics) {
        let changed = metrics.dimensions_differ(&self.viewport_metrics);
        self.viewport_metrics = metrics;
        if changed {
            self.animator.set_dimension_change_pending();
        }
        if self.have_surface {
            self.schedule_frame(true);
        }
    }

    /// The rasterizer has a surface; frames may be produced.
    pub fn on_output_surface_created(&mut self) {
        self.have_surface = true;
        self.update_animator();
        self.schedule_frame(true);
    }

    /// The surface is gone; stop producing frames.
    pub fn on_output_surface_destroyed(&mut self) {
        self.have_surface = false;
        self.update_animator();
    }

    /// Records a lifecycle transition.
    pub fn set_lifecycle_state(&mut self, state: AppLifecycleState) {
        log::debug!("lifecycle {:?} -> {state:?}", self.lifecycle_state);
        self.lifecycle_state = state;
        self.update_animator();
        if state == AppLifecycleState::Resumed && self.have_surface {
            self.schedule_frame(true);
        }
    }

    fn update_animator(&mut self) {
        if self.have_surface && self.lifecycle_state.draws_frames() {
            self.animator.start();
        } else {
            self.animator.stop();
        }
    }

    /// Forwards an input event and ties its flow id to the next frame.
    pub fn dispatch_pointer_data(&mut self, flow_id: u64) {
        self.animator.enqueue_trace_flow_id(flow_id);
        self.runtime.dispatch_pointer_data(flow_id);
        self.schedule_frame(true);
    }

    /// Stops the animator for good.
    pub fn shutdown(&mut self) {
        self.have_surface = false;
        self.animator.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vsync::{ManualVsync, ManualVsyncHandle};
    use lamina_core::SceneBuilder;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Counts {
        draws: usize,
        draw_last: usize,
    }

    struct Shared(Arc<Mutex<Counts>>);

    impl EngineDelegate for Shared {
        fn on_engine_draw(&mut self, _: &Arc<Pipeline<LayerTree>>) {
            self.0.lock().draws += 1;
        }
        fn on_engine_draw_last_layer_tree(&mut self) {
            self.0.lock().draw_last += 1;
        }
    }

    fn engine(
        runtime: Box<dyn Runtime>,
    ) -> (Engine, ManualVsyncHandle, Arc<Mutex<Counts>>) {
        let (waiter, handle) = ManualVsync::new();
        let counts = Arc::new(Mutex::new(Counts::default()));
        let e = Engine::new(
            &Settings::default(),
            runtime,
            Box::new(Shared(Arc::clone(&counts))),
            Box::new(waiter),
            Arc::new(|_, _| {}),
        );
        (e, handle, counts)
    }

    fn sized_tree(metrics: &ViewportMetrics) -> Option<LayerTree> {
        SceneBuilder::new().build().take_layer_tree(metrics.frame_metadata())
    }

    fn vsync(e: &mut Engine, handle: &ManualVsyncHandle) {
        assert!(handle.fire(HostTime(0), HostTime(16)), "vsync requested");
        e.on_vsync(HostTime(0), HostTime(16));
    }

    #[test]
    fn no_frames_without_a_surface() {
        let (mut e, handle, _) = engine(Box::new(|_: HostTime, _: HostTime, m: &ViewportMetrics| sized_tree(m)));
        e.schedule_frame(true);
        assert!(!handle.is_waiting(), "animator stays paused");
        e.on_output_surface_created();
        assert!(handle.is_waiting(), "surface starts frames");
    }

    #[test]
    fn runtime_tree_reaches_the_pipeline() {
        let (mut e, handle, counts) = engine(Box::new(|_: HostTime, _: HostTime, m: &ViewportMetrics| sized_tree(m)));
        e.set_viewport_metrics(ViewportMetrics::with_size(64.0, 48.0));
        e.on_output_surface_created();
        vsync(&mut e, &handle);
        assert_eq!(counts.lock().draws, 1, "draw requested");
        assert_eq!(e.animator().pipeline().len(), 1, "tree queued");
    }

    #[test]
    fn malformed_trees_are_dropped() {
        let (mut e, handle, counts) = engine(Box::new(|_: HostTime, _: HostTime, m: &ViewportMetrics| sized_tree(m)));
        e.on_output_surface_created();
        vsync(&mut e, &handle);
        assert_eq!(counts.lock().draws, 0, "zero-size tree never queued");
        assert!(e.animator().pipeline().is_empty(), "pipeline untouched");

        let bad = SceneBuilder::new()
            .build()
            .take_layer_tree(FrameMetadata {
                device_pixel_ratio: f64::NAN,
                ..FrameMetadata::with_size(10.0, 10.0)
            })
            .expect("tree");
        assert!(!e.render(bad), "invalid ratio rejected");
    }

    #[test]
    fn resize_forces_rebuild() {
        let (mut e, handle, counts) = engine(Box::new(|_: HostTime, _: HostTime, m: &ViewportMetrics| sized_tree(m)));
        e.set_viewport_metrics(ViewportMetrics::with_size(10.0, 10.0));
        e.on_output_surface_created();
        vsync(&mut e, &handle);
        e.animator().pipeline().consume(|_| crate::pipeline::ConsumeResult::Done);
        e.schedule_frame(false);
        e.set_viewport_metrics(ViewportMetrics::with_size(20.0, 10.0));
        vsync(&mut e, &handle);
        let c = counts.lock();
        assert_eq!((c.draws, c.draw_last), (2, 0), "rebuilt rather than reused");
    }

    #[test]
    fn lifecycle_pauses_and_resumes() {
        let (mut e, handle, _) = engine(Box::new(|_: HostTime, _: HostTime, m: &ViewportMetrics| sized_tree(m)));
        e.on_output_surface_created();
        vsync(&mut e, &handle);
        e.set_lifecycle_state(AppLifecycleState::Paused);
        assert!(e.animator().is_paused(), "paused state stops the animator");
        e.schedule_frame(true);
        assert!(!handle.is_waiting(), "no vsync while paused");
        e.set_lifecycle_state(AppLifecycleState::Resumed);
        assert!(handle.is_waiting(), "resumed with a surface schedules a frame");
    }

    #[test]
    fn pointer_data_enqueues_flow() {
        let (mut e, _, _) = engine(Box::new(|_: HostTime, _: HostTime, _: &ViewportMetrics| None));
        e.dispatch_pointer_data(42);
        assert_eq!(e.animator().pending_trace_flows(), 1, "flow queued for the next frame");
    }
}
