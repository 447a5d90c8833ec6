// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Thread wiring: an [`Engine`] on the UI runner, a [`Rasterizer`] on the
//! raster runner, and the host-facing API on whatever thread calls it.
//!
//! Teardown order: stop the animator, drain and close the pipeline on the
//! raster thread, tear the rasterizer down, join the runners.

use core::fmt;
use core::time::Duration;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use lamina_core::raster_cache::{PictureRasterizer, RasterCache};
use lamina_core::platform_view::PlatformViewEmbedder;
use lamina_core::texture::Texture;
use lamina_core::time::HostTime;
use lamina_core::LayerTree;
use parking_lot::{Condvar, Mutex};

use crate::engine::{AppLifecycleState, Engine, EngineDelegate, Runtime, ViewportMetrics};
use crate::error::ShellError;
use crate::frame_timing::FrameTiming;
use crate::pipeline::Pipeline;
use crate::rasterizer::{DrawStatus, Rasterizer, RasterizerDelegate, Surface};
use crate::settings::Settings;
use crate::task_runner::{TaskRunner, TaskRunners, ThreadHost};
use crate::vsync::VsyncWaiter;
use crate::SharedTraceSink;

/// Frame timings kept for [`Shell::frame_timings`].
const TIMING_HISTORY: usize = 120;

/// Set once the first frame has been presented.
#[derive(Debug, Default)]
struct FirstFrameLatch {
    presented: Mutex<bool>,
    signal: Condvar,
}

impl FirstFrameLatch {
    fn open(&self) {
        let mut presented = self.presented.lock();
        if !*presented {
            *presented = true;
            self.signal.notify_all();
        }
    }

    fn wait(&self, timeout: Duration) -> bool {
        let mut presented = self.presented.lock();
        if !*presented {
            let _ = self.signal.wait_while_for(&mut presented, |p| !*p, timeout);
        }
        *presented
    }
}

struct RasterHooks {
    timings: Arc<Mutex<VecDeque<FrameTiming>>>,
    first_frame: Arc<FirstFrameLatch>,
}

impl RasterizerDelegate for RasterHooks {
    fn on_frame_rasterized(&mut self, timing: &FrameTiming) {
        let mut timings = self.timings.lock();
        if timings.len() == TIMING_HISTORY {
            timings.pop_front();
        }
        timings.push_back(*timing);
        drop(timings);
        self.first_frame.open();
    }
}

struct EngineHooks {
    raster: TaskRunner,
    rasterizer: Arc<Mutex<Rasterizer>>,
}

impl EngineDelegate for EngineHooks {
    fn on_engine_draw(&mut self, pipeline: &Arc<Pipeline<LayerTree>>) {
        post_draw(&self.raster, &self.rasterizer, pipeline);
    }

    fn on_engine_draw_last_layer_tree(&mut self) {
        let rasterizer = Arc::clone(&self.rasterizer);
        self.raster.post(move || {
            rasterizer.lock().draw_last_layer_tree();
        });
    }
}

/// Posts a draw to the raster runner, reposting while trees remain.
fn post_draw(raster: &TaskRunner, rasterizer: &Arc<Mutex<Rasterizer>>, pipeline: &Arc<Pipeline<LayerTree>>) {
    let runner = raster.clone();
    let rasterizer = Arc::clone(rasterizer);
    let pipeline = Arc::clone(pipeline);
    raster.post(move || {
        let status = rasterizer.lock().draw(&pipeline);
        if status == DrawStatus::MoreAvailable {
            post_draw(&runner, &rasterizer, &pipeline);
        }
    });
}

/// A running compositor: task runners, engine, and rasterizer.
pub struct Shell {
    settings: Settings,
    task_runners: TaskRunners,
    thread_host: Option<ThreadHost>,
    engine: Arc<Mutex<Engine>>,
    rasterizer: Arc<Mutex<Rasterizer>>,
    pipeline: Arc<Pipeline<LayerTree>>,
    timings: Arc<Mutex<VecDeque<FrameTiming>>>,
    first_frame: Arc<FirstFrameLatch>,
}

impl fmt::Debug for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shell")
            .field("settings", &self.settings)
            .field("running", &self.thread_host.is_some())
            .field("pipeline", &self.pipeline.id())
            .finish_non_exhaustive()
    }
}

impl Shell {
    /// Spawns the task runners and builds the engine and rasterizer.
    ///
    /// `picture_rasterizer` backs the raster cache when `settings` enables
    /// one.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError::Spawn`] if a runner thread cannot be started.
    pub fn create(
        settings: Settings,
        vsync: Box<dyn VsyncWaiter>,
        runtime: Box<dyn Runtime>,
        picture_rasterizer: Option<Box<dyn PictureRasterizer + Send>>,
    ) -> Result<Self, ShellError> {
        let started = HostTime::now();
        let (thread_host, task_runners) = ThreadHost::spawn("lamina")?;
        let timings = Arc::new(Mutex::new(VecDeque::with_capacity(TIMING_HISTORY)));
        let first_frame = Arc::new(FirstFrameLatch::default());

        let rasterizer = Arc::new(Mutex::new(Rasterizer::new(
            &settings,
            Box::new(RasterHooks {
                timings: Arc::clone(&timings),
                first_frame: Arc::clone(&first_frame),
            }),
            picture_rasterizer,
        )));

        let ui = task_runners.ui.clone();
        let hooks = EngineHooks {
            raster: task_runners.raster.clone(),
            rasterizer: Arc::clone(&rasterizer),
        };
        let engine = Arc::new_cyclic(|weak: &Weak<Mutex<Engine>>| {
            let weak = weak.clone();
            let vsync_target = Arc::new(move |start: HostTime, target: HostTime| {
                let weak = weak.clone();
                ui.post(move || {
                    if let Some(engine) = weak.upgrade() {
                        engine.lock().on_vsync(start, target);
                    }
                });
            });
            Mutex::new(Engine::new(&settings, runtime, Box::new(hooks), vsync, vsync_target))
        });
        let pipeline = Arc::clone(engine.lock().animator().pipeline());
        log::info!(
            "shell created: pipeline depth {}, {} Hz",
            pipeline.depth(),
            settings.refresh_rate_hz
        );
        if settings.trace_startup {
            log::info!("shell startup took {:?}", HostTime::now().saturating_duration_since(started));
        }

        Ok(Self {
            settings,
            task_runners,
            thread_host: Some(thread_host),
            engine,
            rasterizer,
            pipeline,
            timings,
            first_frame,
        })
    }

    /// Configuration the shell was created with.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The runners, for hosts that need to post their own work.
    #[must_use]
    pub fn task_runners(&self) -> &TaskRunners {
        &self.task_runners
    }

    /// The layer-tree pipeline between the engine and the rasterizer.
    #[must_use]
    pub fn pipeline(&self) -> &Arc<Pipeline<LayerTree>> {
        &self.pipeline
    }

    /// Returns `true` until [`shutdown`](Self::shutdown).
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.thread_host.is_some()
    }

    fn ensure_running(&self) -> Result<(), ShellError> {
        if self.is_running() { Ok(()) } else { Err(ShellError::AlreadyShutDown) }
    }

    fn on_ui(&self, task: impl FnOnce(&mut Engine) + Send + 'static) -> Result<(), ShellError> {
        self.ensure_running()?;
        let engine = Arc::clone(&self.engine);
        if self.task_runners.ui.post(move || task(&mut engine.lock())) {
            Ok(())
        } else {
            Err(ShellError::AlreadyShutDown)
        }
    }

    fn on_raster<R: Send + 'static>(
        &self,
        task: impl FnOnce(&mut Rasterizer) -> R + Send + 'static,
    ) -> Result<R, ShellError> {
        self.ensure_running()?;
        let rasterizer = Arc::clone(&self.rasterizer);
        self.task_runners
            .raster
            .post_sync(move || task(&mut rasterizer.lock()))
            .ok_or(ShellError::AlreadyShutDown)
    }

    /// Hands `surface` to the rasterizer and starts producing frames.
    ///
    /// Trees that were waiting for a surface are drawn first.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError::InvalidSurface`] if the surface is not usable,
    /// or [`ShellError::AlreadyShutDown`].
    pub fn on_surface_created(&self, surface: Box<dyn Surface>) -> Result<(), ShellError> {
        self.on_raster(move |r| r.setup(surface))??;
        if !self.pipeline.is_empty() {
            post_draw(&self.task_runners.raster, &self.rasterizer, &self.pipeline);
        }
        self.on_ui(Engine::on_output_surface_created)
    }

    /// Stops frames and releases the surface.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError::AlreadyShutDown`].
    pub fn on_surface_destroyed(&self) -> Result<(), ShellError> {
        self.ensure_running()?;
        let engine = Arc::clone(&self.engine);
        self.task_runners
            .ui
            .post_sync(move || engine.lock().on_output_surface_destroyed())
            .ok_or(ShellError::AlreadyShutDown)?;
        self.on_raster(Rasterizer::teardown)
    }

    /// Forwards new viewport metrics to the engine.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError::AlreadyShutDown`].
    pub fn set_viewport_metrics(&self, metrics: ViewportMetrics) -> Result<(), ShellError> {
        self.on_ui(move |e| e.set_viewport_metrics(metrics))
    }

    /// Forwards a lifecycle transition to the engine.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError::AlreadyShutDown`].
    pub fn set_lifecycle_state(&self, state: AppLifecycleState) -> Result<(), ShellError> {
        self.on_ui(move |e| e.set_lifecycle_state(state))
    }

    /// Forwards an input event's flow id to the engine.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError::AlreadyShutDown`].
    pub fn dispatch_pointer_data(&self, flow_id: u64) -> Result<(), ShellError> {
        self.on_ui(move |e| e.dispatch_pointer_data(flow_id))
    }

    /// Asks for a frame.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError::AlreadyShutDown`].
    pub fn schedule_frame(&self, regenerate_layer_tree: bool) -> Result<(), ShellError> {
        self.on_ui(move |e| e.schedule_frame(regenerate_layer_tree))
    }

    /// Submits a tree built outside the runtime's frame callback.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError::AlreadyShutDown`].
    pub fn render(&self, tree: LayerTree) -> Result<(), ShellError> {
        self.on_ui(move |e| {
            e.render(tree);
        })
    }

    /// Registers an external texture with the rasterizer.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError::AlreadyShutDown`].
    pub fn register_texture(&self, texture: Arc<dyn Texture>) -> Result<(), ShellError> {
        self.on_raster(move |r| r.register_texture(texture))
    }

    /// Unregisters a texture.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError::AlreadyShutDown`].
    pub fn unregister_texture(&self, id: i64) -> Result<(), ShellError> {
        self.on_raster(move |r| r.unregister_texture(id))
    }

    /// Signals that a texture has new content and redraws the last tree.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError::AlreadyShutDown`].
    pub fn mark_texture_frame_available(&self, id: i64) -> Result<(), ShellError> {
        if self.on_raster(move |r| r.mark_texture_frame_available(id))? {
            self.schedule_frame(false)?;
        }
        Ok(())
    }

    /// Replaces the raster cache.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError::AlreadyShutDown`].
    pub fn set_raster_cache(&self, cache: Option<Box<dyn RasterCache + Send>>) -> Result<(), ShellError> {
        self.on_raster(move |r| r.set_raster_cache(cache))
    }

    /// Attaches a platform-view embedder to the rasterizer.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError::AlreadyShutDown`].
    pub fn set_platform_view_embedder(
        &self,
        embedder: Option<Box<dyn PlatformViewEmbedder + Send>>,
    ) -> Result<(), ShellError> {
        self.on_raster(move |r| r.set_embedder(embedder))
    }

    /// Sends animator and rasterizer events to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError::AlreadyShutDown`].
    pub fn set_trace_sink(&self, sink: Option<SharedTraceSink>) -> Result<(), ShellError> {
        let ui_sink = sink.clone();
        self.on_ui(move |e| e.set_trace_sink(ui_sink))?;
        self.on_raster(move |r| r.set_trace_sink(sink))
    }

    /// Runs `f` against the rasterizer on the raster thread.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError::AlreadyShutDown`].
    pub fn with_rasterizer<R: Send + 'static>(
        &self,
        f: impl FnOnce(&mut Rasterizer) -> R + Send + 'static,
    ) -> Result<R, ShellError> {
        self.on_raster(f)
    }

    /// Waits for every task already posted to the UI and raster runners.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError::AlreadyShutDown`].
    pub fn flush(&self) -> Result<(), ShellError> {
        self.ensure_running()?;
        for _ in 0..2 {
            self.task_runners.ui.post_sync(|| ()).ok_or(ShellError::AlreadyShutDown)?;
            self.task_runners.raster.post_sync(|| ()).ok_or(ShellError::AlreadyShutDown)?;
        }
        Ok(())
    }

    /// Blocks until a frame has been presented.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError::Timeout`] if none was presented within
    /// `timeout`.
    pub fn wait_for_first_frame(&self, timeout: Duration) -> Result<(), ShellError> {
        if self.first_frame.wait(timeout) {
            Ok(())
        } else {
            Err(ShellError::Timeout(timeout))
        }
    }

    /// Timings of recent frames, oldest first.
    #[must_use]
    pub fn frame_timings(&self) -> Vec<FrameTiming> {
        self.timings.lock().iter().copied().collect()
    }

    /// Stops the animator, drains the pipeline, tears the rasterizer down,
    /// and joins the runners.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError::AlreadyShutDown`] if called twice.
    pub fn shutdown(&mut self) -> Result<(), ShellError> {
        let Some(thread_host) = self.thread_host.take() else {
            return Err(ShellError::AlreadyShutDown);
        };
        let engine = Arc::clone(&self.engine);
        let _ = self.task_runners.ui.post_sync(move || engine.lock().shutdown());

        let rasterizer = Arc::clone(&self.rasterizer);
        let pipeline = Arc::clone(&self.pipeline);
        let _ = self.task_runners.raster.post_sync(move || {
            let dropped = pipeline.drain().len();
            pipeline.close();
            if dropped > 0 {
                log::debug!("{dropped} queued frames discarded at shutdown");
            }
            rasterizer.lock().teardown();
        });

        thread_host.join();
        log::info!("shell shut down");
        Ok(())
    }
}

impl Drop for Shell {
    fn drop(&mut self) {
        if self.is_running() {
            let _ = self.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latch_times_out_then_opens() {
        let latch = FirstFrameLatch::default();
        assert!(!latch.wait(Duration::from_millis(5)), "closed");
        latch.open();
        assert!(latch.wait(Duration::ZERO), "open stays open");
    }

    #[test]
    fn shutdown_twice_is_an_error() {
        let (waiter, _handle) = crate::vsync::ManualVsync::new();
        let runtime = |_: HostTime, _: HostTime, _: &ViewportMetrics| -> Option<LayerTree> { None };
        let mut shell =
            Shell::create(Settings::headless(), Box::new(waiter), Box::new(runtime), None).expect("create");
        assert!(shell.is_running(), "running");
        shell.shutdown().expect("first shutdown");
        assert!(matches!(shell.shutdown(), Err(ShellError::AlreadyShutDown)), "second refused");
        assert!(
            matches!(shell.schedule_frame(true), Err(ShellError::AlreadyShutDown)),
            "no posting after shutdown"
        );
        assert!(shell.pipeline().is_closed(), "pipeline closed");
    }
}
