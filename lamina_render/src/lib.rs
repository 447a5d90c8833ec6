// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reference 2D backend for lamina.
//!
//! This crate provides two [`Canvas`](lamina_core::canvas::Canvas)
//! implementations:
//!
//! - [`RecordingCanvas`]: appends every call to a [`DrawOp`] list, for
//!   comparing what two layer trees emit
//! - [`PixmapCanvas`]: rasterizes into a CPU [`Pixmap`] with pixel-center
//!   sampling, for pixel assertions and headless hosts
//!
//! [`PixmapPictureRasterizer`] plugs the pixmap backend into
//! [`PictureRasterCache`](lamina_core::raster_cache::PictureRasterCache).

#![cfg_attr(docsrs, feature(doc_cfg))]

mod pixmap;
mod recording;

pub use pixmap::{Pixmap, PixmapCanvas, PixmapPictureRasterizer};
pub use recording::{DrawOp, RecordingCanvas};
