// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer tree, scene builder, and two-pass traversal for the lamina compositor.
//!
//! `lamina_core` holds the data model that application code builds each
//! frame and that the raster side consumes: an immutable arena of [`Layer`]
//! nodes addressed by [`LayerId`], wrapped in a [`LayerTree`] together with
//! the frame metadata it was built for.
//!
//! # Architecture
//!
//! ```text
//!   SceneBuilder ──push/add/pop──► LayerArena (sealed by build())
//!        │                               ▲
//!        │ build()                       │ EngineLayer (retained subtree)
//!        ▼                               │
//!      Scene ──take_layer_tree()──► LayerTree ──► (pipeline, other crate)
//!                                        │
//!                    ┌───────────────────┘
//!                    ▼
//!   LayerTree::preroll(PrerollContext) ──► PrerollState (bounds side table)
//!                    │
//!                    ▼
//!   LayerTree::paint(PaintContext) ──► dyn Canvas
//! ```
//!
//! **[`layer`]**: The closed [`Layer`] sum type, the per-build arena, retained
//! [`EngineLayer`] handles, and the `preroll`/`paint` traversal functions.
//!
//! **[`scene`]**: [`SceneBuilder`] push/pop stack and the [`Scene`] it yields.
//!
//! **[`layer_tree`]**: [`LayerTree`] with its frame metadata, validation, and
//! per-frame computed state.
//!
//! **[`canvas`]**: The [`Canvas`](canvas::Canvas) trait that 2D backends
//! implement, plus [`Picture`](picture::Picture) recordings replayed onto it.
//!
//! **[`texture`]**, **[`raster_cache`]**, **[`platform_view`]**: Boundary
//! traits for external textures, cached picture rasterization, and embedded
//! platform views.
//!
//! **[`overlay`]**: Frame-time stopwatches and the performance overlay painter.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types for
//! frame-loop instrumentation, with a zero-overhead [`Tracer`](trace::Tracer)
//! wrapper.
//!
//! # Crate features
//!
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod canvas;
pub mod error;
pub mod layer;
pub mod layer_tree;
pub mod overlay;
pub mod paint;
pub mod picture;
pub mod platform_view;
pub mod raster_cache;
pub mod scene;
pub mod texture;
pub mod time;
pub mod trace;
pub mod transform;

pub use error::{FrameError, SceneError};
pub use layer::{EngineLayer, Layer, LayerId};
pub use layer_tree::{BuildTimes, FrameMetadata, LayerTree, RasterFlags};
pub use scene::{PICTURE_IS_COMPLEX, PICTURE_WILL_CHANGE, Scene, SceneBuilder};
