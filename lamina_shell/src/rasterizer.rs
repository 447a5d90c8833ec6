// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Raster-thread consumer of the layer-tree pipeline.
//!
//! Each [`Rasterizer::draw`] takes at most one tree, prerolls and paints it
//! into a frame acquired from the [`Surface`], and submits the frame.
//!
//! A tree that cannot be drawn yet is never lost:
//!
//! - no surface, or the surface is not valid: the tree goes back to the front
//!   of the pipeline and keeps its permit;
//! - the surface had no frame to give: the tree is kept as the
//!   [resubmitted tree](Rasterizer::resubmitted_layer_tree) and drawn before
//!   anything else on the next [`draw`](Rasterizer::draw).

use core::fmt;
use core::time::Duration;
use std::sync::Arc;

use kurbo::{Rect, Size};
use lamina_core::canvas::Canvas;
use lamina_core::layer::{PaintContext, PrerollContext};
use lamina_core::overlay::{OverlayOptions, OverlayStats, Stopwatch, paint_overlay};
use lamina_core::platform_view::PlatformViewEmbedder;
use lamina_core::raster_cache::{PictureRasterCache, PictureRasterizer, RasterCache};
use lamina_core::texture::{Texture, TextureMap};
use lamina_core::time::HostTime;
use lamina_core::trace::{FrameRasterizedEvent, FrameSummaryBuilder, PhaseBeginEvent, PhaseEndEvent, PhaseKind, RasterOutcome};
use lamina_core::LayerTree;

use crate::error::ShellError;
use crate::frame_timing::FrameTiming;
use crate::pipeline::{ConsumeResult, Pipeline, PipelineConsumeResult};
use crate::settings::Settings;
use crate::{SharedTraceSink, with_tracer};

/// A render target the rasterizer draws frames into.
pub trait Surface: Send {
    /// Current size in physical pixels.
    fn size(&self) -> Size;

    /// Returns `false` while the surface cannot accept frames.
    fn is_valid(&self) -> bool {
        true
    }

    /// Acquires a frame of `size` to draw into, or `None` if the surface
    /// has nothing to give right now.
    fn acquire_frame(&mut self, size: Size) -> Option<Box<dyn SurfaceFrame + '_>>;
}

/// One frame's worth of drawing on a [`Surface`].
pub trait SurfaceFrame {
    /// Runs `paint` with the frame's canvas.
    fn paint(&mut self, paint: &mut dyn FnMut(&mut dyn Canvas));

    /// Presents the frame. Returns `false` if presentation failed.
    fn submit(self: Box<Self>) -> bool;
}

/// Receives per-frame results from the rasterizer.
pub trait RasterizerDelegate: Send {
    /// Called after a frame was submitted.
    fn on_frame_rasterized(&mut self, timing: &FrameTiming);
}

/// Result of drawing one tree.
#[derive(Debug)]
pub enum RasterStatus {
    /// Presented.
    Success,
    /// Not drawn yet; the tree is handed back.
    Resubmit(LayerTree),
    /// The frame could not be drawn or presented. The tree is handed back;
    /// callers drawing from the pipeline drop it.
    Failed(LayerTree),
    /// Dropped without an attempt.
    Discarded,
}

/// Result of one [`Rasterizer::draw`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawStatus {
    /// Nothing was queued.
    Empty,
    /// A tree was handled and the pipeline is empty.
    Done,
    /// A tree was handled and more are queued. Call `draw` again.
    MoreAvailable,
    /// A tree is waiting for the surface.
    Resubmitted,
    /// A tree was dropped and nothing else is queued.
    Failed,
}

/// Draws layer trees onto a surface.
pub struct Rasterizer {
    surface: Option<Box<dyn Surface>>,
    delegate: Box<dyn RasterizerDelegate>,
    last_layer_tree: Option<LayerTree>,
    resubmitted_layer_tree: Option<LayerTree>,
    raster_cache: Option<Box<dyn RasterCache + Send>>,
    embedder: Option<Box<dyn PlatformViewEmbedder + Send>>,
    textures: TextureMap,
    raster_times: Stopwatch,
    build_times: Stopwatch,
    frame_budget: Duration,
    performance_overlay: bool,
    trace_sink: Option<SharedTraceSink>,
}

impl fmt::Debug for Rasterizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rasterizer")
            .field("surface", &self.surface.is_some())
            .field("last_layer_tree", &self.last_layer_tree.is_some())
            .field("resubmitted_layer_tree", &self.resubmitted_layer_tree.is_some())
            .field("raster_cache", &self.raster_cache.is_some())
            .field("embedder", &self.embedder.is_some())
            .field("textures", &self.textures)
            .finish_non_exhaustive()
    }
}

impl Rasterizer {
    /// Creates a rasterizer without a surface.
    ///
    /// With `picture_rasterizer` given and a cache configured in `settings`,
    /// pictures are drawn through a [`PictureRasterCache`].
    #[must_use]
    pub fn new(
        settings: &Settings,
        delegate: Box<dyn RasterizerDelegate>,
        picture_rasterizer: Option<Box<dyn PictureRasterizer + Send>>,
    ) -> Self {
        let raster_cache = match (settings.raster_cache, picture_rasterizer) {
            (Some(cache), Some(rasterizer)) => Some(Box::new(PictureRasterCache::new(
                rasterizer,
                cache.access_threshold,
                cache.picture_limit,
            )) as Box<dyn RasterCache + Send>),
            _ => None,
        };
        Self {
            surface: None,
            delegate,
            last_layer_tree: None,
            resubmitted_layer_tree: None,
            raster_cache,
            embedder: None,
            textures: TextureMap::new(),
            raster_times: Stopwatch::new(),
            build_times: Stopwatch::new(),
            frame_budget: settings.frame_budget(),
            performance_overlay: settings.enable_performance_overlay,
            trace_sink: None,
        }
    }

    /// Replaces the raster cache.
    pub fn set_raster_cache(&mut self, cache: Option<Box<dyn RasterCache + Send>>) {
        self.raster_cache = cache;
    }

    /// Attaches a platform-view embedder.
    pub fn set_embedder(&mut self, embedder: Option<Box<dyn PlatformViewEmbedder + Send>>) {
        self.embedder = embedder;
    }

    /// Attaches a trace sink for raster events.
    pub fn set_trace_sink(&mut self, sink: Option<SharedTraceSink>) {
        self.trace_sink = sink;
    }

    /// Starts drawing into `surface`.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError::InvalidSurface`] if the surface reports itself
    /// invalid. The previous surface, if any, is kept.
    pub fn setup(&mut self, surface: Box<dyn Surface>) -> Result<(), ShellError> {
        if !surface.is_valid() {
            return Err(ShellError::InvalidSurface);
        }
        log::info!("rasterizer set up with a {:?} surface", surface.size());
        self.surface = Some(surface);
        Ok(())
    }

    /// Drops the surface and every retained tree.
    pub fn teardown(&mut self) {
        if self.surface.take().is_some() {
            log::info!("rasterizer torn down");
        }
        self.last_layer_tree = None;
        self.resubmitted_layer_tree = None;
        if let Some(cache) = &mut self.raster_cache {
            cache.clear();
        }
    }

    /// Returns `true` while a surface is attached.
    #[must_use]
    pub fn has_surface(&self) -> bool {
        self.surface.is_some()
    }

    /// The last tree presented.
    #[must_use]
    pub fn last_layer_tree(&self) -> Option<&LayerTree> {
        self.last_layer_tree.as_ref()
    }

    /// A tree that failed to acquire a frame and will be drawn first.
    #[must_use]
    pub fn resubmitted_layer_tree(&self) -> Option<&LayerTree> {
        self.resubmitted_layer_tree.as_ref()
    }

    /// Raster durations of recent frames.
    #[must_use]
    pub fn raster_times(&self) -> &Stopwatch {
        &self.raster_times
    }

    /// Build durations of recent frames, as stamped by the animator.
    #[must_use]
    pub fn build_times(&self) -> &Stopwatch {
        &self.build_times
    }

    /// Registers an external texture.
    pub fn register_texture(&mut self, texture: Arc<dyn Texture>) {
        self.textures.register(texture);
    }

    /// Unregisters the texture with `id`.
    pub fn unregister_texture(&mut self, id: i64) {
        if self.textures.unregister(id).is_none() {
            log::debug!("unregister of unknown texture {id}");
        }
    }

    /// Forwards a new-frame signal to the texture with `id`.
    pub fn mark_texture_frame_available(&self, id: i64) -> bool {
        self.textures.mark_frame_available(id)
    }

    fn surface_ready(&self) -> bool {
        self.surface.as_ref().is_some_and(|s| s.is_valid())
    }

    /// Draws the resubmitted tree if there is one, otherwise the next tree
    /// in `pipeline`.
    pub fn draw(&mut self, pipeline: &Arc<Pipeline<LayerTree>>) -> DrawStatus {
        if let Some(tree) = self.resubmitted_layer_tree.take() {
            log::debug!("drawing resubmitted frame {}", tree.frame_number());
            return match self.do_draw(tree) {
                RasterStatus::Resubmit(tree) => {
                    self.resubmitted_layer_tree = Some(tree);
                    DrawStatus::Resubmitted
                }
                _ if !pipeline.is_empty() => DrawStatus::MoreAvailable,
                RasterStatus::Success => DrawStatus::Done,
                RasterStatus::Failed(_) | RasterStatus::Discarded => DrawStatus::Failed,
            };
        }

        let mut outcome = None;
        let mut sent_back = false;
        let consumed = pipeline.consume(|tree| {
            if !self.surface_ready() {
                log::debug!("no ready surface; frame {} resubmitted", tree.frame_number());
                sent_back = true;
                return ConsumeResult::Resubmit(tree);
            }
            match self.do_draw(tree) {
                RasterStatus::Resubmit(tree) => {
                    log::debug!("surface frame unavailable; frame {} kept", tree.frame_number());
                    self.resubmitted_layer_tree = Some(tree);
                    outcome = Some(RasterOutcome::Resubmitted);
                }
                RasterStatus::Success => outcome = Some(RasterOutcome::Success),
                RasterStatus::Failed(_) | RasterStatus::Discarded => outcome = Some(RasterOutcome::Failed),
            }
            ConsumeResult::Done
        });

        match consumed {
            PipelineConsumeResult::NoneAvailable => DrawStatus::Empty,
            _ if sent_back => DrawStatus::Resubmitted,
            PipelineConsumeResult::MoreAvailable => DrawStatus::MoreAvailable,
            PipelineConsumeResult::Done => match outcome {
                Some(RasterOutcome::Success) => DrawStatus::Done,
                Some(RasterOutcome::Resubmitted) => DrawStatus::Resubmitted,
                Some(RasterOutcome::Failed) | None => DrawStatus::Failed,
            },
        }
    }

    /// Presents the previous tree again. Returns `false` if there is none or
    /// it could not be drawn.
    ///
    /// The tree stays available for the next attempt when the redraw fails.
    pub fn draw_last_layer_tree(&mut self) -> bool {
        let Some(tree) = self.last_layer_tree.take() else {
            log::debug!("no previous frame to draw");
            return false;
        };
        match self.do_draw(tree) {
            RasterStatus::Success => true,
            RasterStatus::Resubmit(tree) | RasterStatus::Failed(tree) => {
                self.last_layer_tree = Some(tree);
                false
            }
            RasterStatus::Discarded => false,
        }
    }

    fn do_draw(&mut self, mut tree: LayerTree) -> RasterStatus {
        let raster_start = HostTime::now();
        let Some(surface) = &self.surface else {
            return RasterStatus::Resubmit(tree);
        };

        let mut metadata = *tree.metadata();
        metadata.frame_size = surface.size();
        if let Err(err) = metadata.validate() {
            log::debug!("frame {} dropped: {err}", tree.frame_number());
            self.report(tree.frame_number(), RasterOutcome::Failed);
            return RasterStatus::Failed(tree);
        }
        tree.set_metadata(metadata);

        let build = tree.build_times().unwrap_or_default();
        let mut summary = FrameSummaryBuilder::new(tree.frame_number(), build.vsync_start, self.frame_budget);
        summary.phase_begin(PhaseKind::Build, build.build_start);
        summary.phase_end(PhaseKind::Build, build.build_finish);

        match self.draw_to_surface(&mut tree, &mut summary) {
            RasterOutcome::Success => {}
            RasterOutcome::Resubmitted => {
                self.report(tree.frame_number(), RasterOutcome::Resubmitted);
                return RasterStatus::Resubmit(tree);
            }
            RasterOutcome::Failed => {
                self.report(tree.frame_number(), RasterOutcome::Failed);
                return RasterStatus::Failed(tree);
            }
        }

        let raster_finish = HostTime::now();
        let timing = FrameTiming::new(tree.frame_number(), build, raster_start, raster_finish);
        self.raster_times.record(timing.raster_duration());
        self.build_times.record(timing.build_duration());
        self.delegate.on_frame_rasterized(&timing);
        self.report(tree.frame_number(), RasterOutcome::Success);
        let summary = summary.finish();
        if summary.over_budget {
            log::debug!("frame {} over budget", summary.frame_number);
        }
        with_tracer(self.trace_sink.as_ref(), |t| t.frame_summary(&summary));
        self.last_layer_tree = Some(tree);
        RasterStatus::Success
    }

    fn report(&self, frame_number: u64, outcome: RasterOutcome) {
        with_tracer(self.trace_sink.as_ref(), |t| {
            t.frame_rasterized(&FrameRasterizedEvent {
                frame_number,
                outcome,
                timestamp: HostTime::now(),
            });
        });
    }

    fn draw_to_surface(&mut self, tree: &mut LayerTree, summary: &mut FrameSummaryBuilder) -> RasterOutcome {
        let Self {
            surface,
            raster_cache,
            embedder,
            textures,
            raster_times,
            build_times,
            frame_budget,
            performance_overlay,
            trace_sink,
            ..
        } = self;
        let Some(surface) = surface.as_deref_mut() else {
            return RasterOutcome::Resubmitted;
        };
        let size = tree.frame_size();
        let Some(mut frame) = surface.acquire_frame(size) else {
            return RasterOutcome::Resubmitted;
        };
        let frame_number = tree.frame_number();
        let mut phase = |kind: PhaseKind, begin: bool| {
            let timestamp = HostTime::now();
            if begin {
                summary.phase_begin(kind, timestamp);
            } else {
                summary.phase_end(kind, timestamp);
            }
            with_tracer(trace_sink.as_ref(), |t| {
                if begin {
                    t.phase_begin(&PhaseBeginEvent {
                        frame_number,
                        phase: kind,
                        timestamp,
                    });
                } else {
                    t.phase_end(&PhaseEndEvent {
                        frame_number,
                        phase: kind,
                        timestamp,
                    });
                }
            });
        };

        phase(PhaseKind::Preroll, true);
        if let Some(embedder) = embedder.as_deref_mut() {
            embedder.begin_frame(size);
        }
        {
            let mut ctx = PrerollContext::new(Rect::from_origin_size((0.0, 0.0), size));
            if let Some(cache) = raster_cache.as_deref_mut() {
                ctx = ctx.with_raster_cache(cache);
            }
            if let Some(embedder) = embedder.as_deref_mut() {
                ctx = ctx.with_embedder(embedder);
            }
            tree.preroll(&mut ctx);
        }
        phase(PhaseKind::Preroll, false);

        phase(PhaseKind::Paint, true);
        let flags = tree.flags();
        let overlay = OverlayStats {
            raster: raster_times,
            ui: build_times,
            frame_budget: *frame_budget,
        };
        let mut painted = Ok(());
        frame.paint(&mut |canvas: &mut dyn Canvas| {
            let mut ctx = PaintContext::new(canvas).with_textures(&*textures).with_overlay(overlay);
            if let Some(cache) = raster_cache.as_deref() {
                ctx = ctx.with_raster_cache(cache);
            }
            ctx.checkerboard_offscreen_layers = flags.checkerboard_offscreen_layers;
            ctx.checkerboard_raster_cache_images = flags.checkerboard_raster_cache_images;
            painted = tree.paint(&mut ctx);
            if *performance_overlay {
                let bounds = Rect::new(0.0, 0.0, size.width, (size.height * 0.25).min(120.0));
                paint_overlay(&mut *ctx.canvas, OverlayOptions::ALL, bounds, &overlay);
            }
        });
        phase(PhaseKind::Paint, false);
        if let Err(err) = painted {
            log::warn!("frame {frame_number} not painted: {err}");
            return RasterOutcome::Failed;
        }

        phase(PhaseKind::Submit, true);
        let submitted = frame.submit();
        if let Some(embedder) = embedder.as_deref_mut() {
            embedder.submit_frame();
        }
        if let Some(cache) = raster_cache.as_deref_mut() {
            cache.sweep_after_frame();
        }
        phase(PhaseKind::Submit, false);
        if submitted {
            RasterOutcome::Success
        } else {
            log::debug!("frame {frame_number} failed to present");
            RasterOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::{Affine, BezPath, RoundedRect, Vec2};
    use lamina_core::paint::{BlendMode, Color, LayerPaint, Shader};
    use lamina_core::picture::{Picture, PictureRecorder};
    use lamina_core::raster_cache::RasterImage;
    use lamina_core::{BuildTimes, FrameMetadata, SceneBuilder};
    use parking_lot::Mutex;

    /// Counts calls; draws nothing.
    struct Tally {
        saves: usize,
        ops: Arc<Mutex<usize>>,
    }

    impl Canvas for Tally {
        fn save(&mut self) {
            self.saves += 1;
        }
        fn save_layer(&mut self, _: Option<Rect>, _: &LayerPaint) {
            self.saves += 1;
        }
        fn restore(&mut self) {
            self.saves = self.saves.saturating_sub(1);
        }
        fn save_count(&self) -> usize {
            self.saves + 1
        }
        fn concat(&mut self, _: Affine) {}
        fn total_transform(&self) -> Affine {
            Affine::IDENTITY
        }
        fn clip_rect(&mut self, _: Rect, _: bool) {}
        fn clip_rounded_rect(&mut self, _: RoundedRect, _: bool) {}
        fn clip_path(&mut self, _: &BezPath, _: bool) {}
        fn draw_rect(&mut self, _: Rect, _: &Shader, _: BlendMode) {
            *self.ops.lock() += 1;
        }
        fn draw_path(&mut self, _: &BezPath, _: Color) {
            *self.ops.lock() += 1;
        }
        fn draw_shadow(&mut self, _: &BezPath, _: Color, _: f64, _: bool) {}
        fn draw_image(&mut self, _: &RasterImage, _: Rect) {}
        fn draw_picture(&mut self, picture: &Picture) {
            lamina_core::canvas::replay(self, picture);
        }
    }

    struct TallySurface {
        size: Size,
        valid: bool,
        frames_available: usize,
        ops: Arc<Mutex<usize>>,
    }

    struct TallyFrame<'a> {
        ops: &'a Arc<Mutex<usize>>,
    }

    impl SurfaceFrame for TallyFrame<'_> {
        fn paint(&mut self, paint: &mut dyn FnMut(&mut dyn Canvas)) {
            paint(&mut Tally {
                saves: 0,
                ops: Arc::clone(self.ops),
            });
        }
        fn submit(self: Box<Self>) -> bool {
            true
        }
    }

    impl Surface for TallySurface {
        fn size(&self) -> Size {
            self.size
        }
        fn is_valid(&self) -> bool {
            self.valid
        }
        fn acquire_frame(&mut self, _: Size) -> Option<Box<dyn SurfaceFrame + '_>> {
            if self.frames_available == 0 {
                return None;
            }
            self.frames_available -= 1;
            Some(Box::new(TallyFrame { ops: &self.ops }))
        }
    }

    #[derive(Default)]
    struct Timings(Arc<Mutex<Vec<u64>>>);

    impl RasterizerDelegate for Timings {
        fn on_frame_rasterized(&mut self, timing: &FrameTiming) {
            self.0.lock().push(timing.frame_number);
        }
    }

    fn tree(frame_number: u64) -> LayerTree {
        let mut b = SceneBuilder::new();
        let mut rec = PictureRecorder::new();
        rec.fill_rect(Rect::new(0.0, 0.0, 10.0, 10.0), Color::from_rgb8(255, 0, 0));
        b.add_picture(Vec2::ZERO, rec.finish(), 0);
        let mut tree = b
            .build()
            .take_layer_tree(FrameMetadata::with_size(20.0, 20.0))
            .expect("fresh scene");
        tree.record_build(frame_number, BuildTimes::default());
        tree
    }

    fn rasterizer(frames: usize, valid: bool) -> (Rasterizer, Arc<Mutex<Vec<u64>>>, Arc<Mutex<usize>>) {
        let timings = Timings::default();
        let drawn = Arc::clone(&timings.0);
        let ops = Arc::new(Mutex::new(0));
        let mut r = Rasterizer::new(&Settings::headless(), Box::new(timings), None);
        r.setup(Box::new(TallySurface {
            size: Size::new(20.0, 20.0),
            valid: true,
            frames_available: frames,
            ops: Arc::clone(&ops),
        }))
        .expect("valid surface");
        if !valid {
            r.surface = Some(Box::new(TallySurface {
                size: Size::new(20.0, 20.0),
                valid: false,
                frames_available: frames,
                ops: Arc::clone(&ops),
            }));
        }
        (r, drawn, ops)
    }

    fn enqueue(pipeline: &Arc<Pipeline<LayerTree>>, frame_number: u64) {
        let c = pipeline.produce().expect("permit");
        assert!(c.complete(tree(frame_number)), "queued");
    }

    #[test]
    fn draws_queued_tree() {
        let (mut r, drawn, ops) = rasterizer(8, true);
        let p = Pipeline::new(2);
        enqueue(&p, 1);
        assert_eq!(r.draw(&p), DrawStatus::Done, "one frame drawn");
        assert_eq!(*drawn.lock(), vec![1], "delegate told");
        assert_eq!(*ops.lock(), 1, "picture replayed");
        assert!(r.last_layer_tree().is_some(), "kept for reuse");
        assert_eq!(r.draw(&p), DrawStatus::Empty, "nothing left");
    }

    #[test]
    fn reports_more_available() {
        let (mut r, drawn, _) = rasterizer(8, true);
        let p = Pipeline::new(2);
        enqueue(&p, 1);
        enqueue(&p, 2);
        assert_eq!(r.draw(&p), DrawStatus::MoreAvailable, "second tree waiting");
        assert_eq!(r.draw(&p), DrawStatus::Done, "drained");
        assert_eq!(*drawn.lock(), vec![1, 2], "FIFO");
    }

    #[test]
    fn invalid_surface_sends_tree_back_to_front() {
        let (mut r, drawn, _) = rasterizer(8, false);
        let p = Pipeline::new(1);
        enqueue(&p, 1);
        assert_eq!(r.draw(&p), DrawStatus::Resubmitted, "surface not ready");
        assert_eq!(p.len(), 1, "tree back in the pipeline");
        assert_eq!(p.available_permits(), 0, "permit still held");
        assert!(drawn.lock().is_empty(), "nothing presented");
    }

    #[test]
    fn missing_frame_is_drawn_first_next_time() {
        let (mut r, drawn, _) = rasterizer(0, true);
        let p = Pipeline::new(2);
        enqueue(&p, 1);
        assert_eq!(r.draw(&p), DrawStatus::Resubmitted, "no frame to draw into");
        assert!(r.resubmitted_layer_tree().is_some(), "tree kept aside");
        assert_eq!(p.available_permits(), 2, "permit released");

        if let Some(surface) = r.surface.as_mut() {
            *surface = Box::new(TallySurface {
                size: Size::new(20.0, 20.0),
                valid: true,
                frames_available: 8,
                ops: Arc::new(Mutex::new(0)),
            });
        }
        enqueue(&p, 2);
        assert_eq!(r.draw(&p), DrawStatus::MoreAvailable, "resubmitted drawn, queue untouched");
        assert_eq!(r.draw(&p), DrawStatus::Done, "queued drawn");
        assert_eq!(*drawn.lock(), vec![1, 2], "resubmitted tree first");
    }

    #[test]
    fn draw_last_without_history_is_a_no_op() {
        let (mut r, drawn, ops) = rasterizer(8, true);
        assert!(!r.draw_last_layer_tree(), "nothing to redraw");
        assert!(drawn.lock().is_empty(), "nothing presented");
        assert_eq!(*ops.lock(), 0, "nothing painted");
    }

    #[test]
    fn draw_last_repaints_previous_tree() {
        let (mut r, drawn, ops) = rasterizer(8, true);
        let p = Pipeline::new(1);
        enqueue(&p, 5);
        r.draw(&p);
        assert!(r.draw_last_layer_tree(), "redrawn");
        assert_eq!(*drawn.lock(), vec![5, 5], "same frame twice");
        assert_eq!(*ops.lock(), 2, "painted twice");
    }

    #[test]
    fn failed_redraw_keeps_last_tree() {
        let (mut r, drawn, ops) = rasterizer(8, true);
        let p = Pipeline::new(1);
        enqueue(&p, 1);
        r.draw(&p);
        let resize = |r: &mut Rasterizer, size: Size| {
            r.surface = Some(Box::new(TallySurface {
                size,
                valid: true,
                frames_available: 8,
                ops: Arc::clone(&ops),
            }));
        };

        resize(&mut r, Size::ZERO);
        assert!(!r.draw_last_layer_tree(), "minimized surface cannot be drawn");
        assert!(r.last_layer_tree().is_some(), "last good tree kept");

        resize(&mut r, Size::new(20.0, 20.0));
        assert!(r.draw_last_layer_tree(), "redrawn once the surface has a size");
        assert_eq!(*drawn.lock(), vec![1, 1], "same frame presented again");
    }

    #[test]
    fn frame_takes_surface_size() {
        let (mut r, _, _) = rasterizer(8, true);
        let p = Pipeline::new(1);
        let c = p.produce().expect("permit");
        let mut t = tree(1);
        t.set_metadata(FrameMetadata::with_size(400.0, 300.0));
        assert!(c.complete(t), "queued");
        r.draw(&p);
        let last = r.last_layer_tree().expect("drawn");
        assert_eq!(last.frame_size(), Size::new(20.0, 20.0), "surface size wins");
    }

    #[test]
    fn teardown_forgets_trees() {
        let (mut r, _, _) = rasterizer(8, true);
        let p = Pipeline::new(1);
        enqueue(&p, 1);
        r.draw(&p);
        r.teardown();
        assert!(!r.has_surface(), "surface dropped");
        assert!(r.last_layer_tree().is_none(), "last tree dropped");
        assert!(!r.draw_last_layer_tree(), "nothing to redraw");
    }

    #[test]
    fn invalid_surface_is_rejected_at_setup() {
        let mut r = Rasterizer::new(&Settings::default(), Box::new(Timings::default()), None);
        let err = r.setup(Box::new(TallySurface {
            size: Size::new(1.0, 1.0),
            valid: false,
            frames_available: 0,
            ops: Arc::new(Mutex::new(0)),
        }));
        assert!(matches!(err, Err(ShellError::InvalidSurface)), "rejected");
        assert!(!r.has_surface(), "not attached");
    }
}
