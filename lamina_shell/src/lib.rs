// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame pipeline and thread wiring for the lamina compositor.
//!
//! `lamina_shell` moves layer trees from the thread that builds them to the
//! thread that rasterizes them, one vsync at a time.
//!
//! # Architecture
//!
//! ```text
//!   platform thread            ui thread                    raster thread
//!   ───────────────            ─────────                    ─────────────
//!   Shell::on_surface_created ─────────────────────────────► Rasterizer::setup
//!        │                   Engine::on_output_surface_created
//!        │                        │ Animator::start
//!   VsyncWaiter ──vsync──────► Engine::on_vsync
//!                                 │ Runtime::begin_frame
//!                                 ▼
//!                            Animator::render ──► Pipeline<LayerTree>
//!                                                      │
//!                                                      ▼
//!                                               Rasterizer::draw
//!                                                 preroll, paint, submit
//!                                                      │
//!                                               FrameTiming ──► Shell
//! ```
//!
//! **[`pipeline`]**: Bounded producer/consumer queue with front resubmission.
//!
//! **[`animator`]**: Vsync-gated frame production on the UI thread.
//!
//! **[`rasterizer`]**: Consumes trees and presents them to a [`Surface`].
//!
//! **[`engine`]**: Owns the animator and the authoring-side [`Runtime`].
//!
//! **[`shell`]**: Spawns the task runners and connects everything.
//!
//! **[`task_runner`]**, **[`vsync`]**, **[`settings`]**, **[`frame_timing`]**:
//! Executors, vsync sources, configuration, and per-frame timestamps.
//!
//! # Crate features
//!
//! - `trace` (disabled by default): Forwards to `lamina_core/trace` so that
//!   sinks attached with `set_trace_sink` receive events.

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

use std::sync::Arc;

use lamina_core::trace::{TraceSink, Tracer};
use parking_lot::Mutex;

pub mod animator;
pub mod engine;
pub mod error;
pub mod frame_timing;
pub mod pipeline;
pub mod rasterizer;
pub mod settings;
pub mod shell;
pub mod task_runner;
pub mod vsync;

pub use animator::{Animator, AnimatorDelegate};
pub use engine::{AppLifecycleState, Engine, EngineDelegate, Runtime, ViewportMetrics};
pub use error::ShellError;
pub use frame_timing::FrameTiming;
pub use pipeline::{ConsumeResult, Pipeline, PipelineConsumeResult, ProducerContinuation};
pub use rasterizer::{DrawStatus, RasterStatus, Rasterizer, RasterizerDelegate, Surface, SurfaceFrame};
pub use settings::{RasterCacheSettings, Settings};
pub use shell::Shell;
pub use task_runner::{TaskRunner, TaskRunners, ThreadRole};
pub use vsync::{ManualVsync, ManualVsyncHandle, TimerVsync, VsyncWaiter};

/// A trace sink shared between the UI and raster threads.
pub type SharedTraceSink = Arc<Mutex<dyn TraceSink + Send>>;

/// Runs `f` with a tracer over `sink`, holding its lock for the duration.
pub(crate) fn with_tracer(sink: Option<&SharedTraceSink>, f: impl FnOnce(&mut Tracer<'_>)) {
    if !cfg!(feature = "trace") {
        return;
    }
    match sink {
        Some(sink) => {
            let mut guard = sink.lock();
            f(&mut Tracer::new(&mut *guard));
        }
        None => f(&mut Tracer::none()),
    }
}
