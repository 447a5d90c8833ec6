// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! One frame's worth of layers plus the metadata it was built for.

use std::sync::Arc;

use kurbo::{Affine, Rect, Size};

use crate::error::FrameError;
use crate::layer::{self, LayerArena, LayerId, NodeState, PaintContext, PrerollContext, PrerollState};
use crate::time::HostTime;

/// Viewport parameters a layer tree was built against.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameMetadata {
    /// Size in physical pixels.
    pub frame_size: Size,
    /// Physical pixels per logical pixel.
    pub device_pixel_ratio: f64,
    /// Maximum elevation range of the viewport.
    pub physical_depth: f64,
}

impl Default for FrameMetadata {
    fn default() -> Self {
        Self {
            frame_size: Size::ZERO,
            device_pixel_ratio: 1.0,
            physical_depth: f64::MAX,
        }
    }
}

impl FrameMetadata {
    /// Metadata for a `width`×`height` physical-pixel frame at ratio 1.
    #[must_use]
    pub fn with_size(width: f64, height: f64) -> Self {
        Self {
            frame_size: Size::new(width, height),
            ..Self::default()
        }
    }

    /// Checks that the frame can be rasterized.
    ///
    /// # Errors
    ///
    /// Returns the first [`FrameError`] found: empty size, then non-positive
    /// device pixel ratio, then non-positive depth.
    pub fn validate(&self) -> Result<(), FrameError> {
        let Size { width, height } = self.frame_size;
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return Err(FrameError::EmptyFrameSize { width, height });
        }
        if !(self.device_pixel_ratio.is_finite() && self.device_pixel_ratio > 0.0) {
            return Err(FrameError::InvalidDevicePixelRatio(self.device_pixel_ratio));
        }
        if !(self.physical_depth.is_finite() && self.physical_depth > 0.0) {
            return Err(FrameError::InvalidPhysicalDepth(self.physical_depth));
        }
        Ok(())
    }
}

/// Debug flags a scene sets for the rasterizer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RasterFlags {
    /// Frames slower than this many frame budgets get traced (0 disables).
    pub rasterizer_tracing_threshold: u32,
    /// Draw a checkerboard over cached pictures.
    pub checkerboard_raster_cache_images: bool,
    /// Draw a checkerboard over offscreen layers.
    pub checkerboard_offscreen_layers: bool,
}

/// When the frame producing this tree was built.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuildTimes {
    /// Vsync timestamp the frame began on.
    pub vsync_start: HostTime,
    /// When the authoring side started building.
    pub build_start: HostTime,
    /// When the tree was handed to the pipeline.
    pub build_finish: HostTime,
}

/// A root container plus frame metadata, moved from the authoring thread to
/// the raster thread.
///
/// The tree owns its arena by `Arc` and its computed Preroll state outright.
/// Retained subtrees it references are shared read-only with other trees.
#[derive(Debug)]
pub struct LayerTree {
    arena: Arc<LayerArena>,
    root: LayerId,
    metadata: FrameMetadata,
    flags: RasterFlags,
    frame_number: u64,
    build_times: Option<BuildTimes>,
    preroll_state: Option<PrerollState>,
}

impl LayerTree {
    pub(crate) fn new(arena: Arc<LayerArena>, metadata: FrameMetadata, flags: RasterFlags) -> Self {
        Self {
            arena,
            root: LayerId::ROOT,
            metadata,
            flags,
            frame_number: 0,
            build_times: None,
            preroll_state: None,
        }
    }

    /// The arena holding the tree's own nodes.
    #[must_use]
    pub fn arena(&self) -> &Arc<LayerArena> {
        &self.arena
    }

    /// Root container id.
    #[must_use]
    pub fn root(&self) -> LayerId {
        self.root
    }

    /// Viewport metadata.
    #[must_use]
    pub fn metadata(&self) -> &FrameMetadata {
        &self.metadata
    }

    /// Frame size in physical pixels.
    #[must_use]
    pub fn frame_size(&self) -> Size {
        self.metadata.frame_size
    }

    /// Replaces the viewport metadata.
    pub fn set_metadata(&mut self, metadata: FrameMetadata) {
        self.metadata = metadata;
    }

    /// Rasterizer debug flags.
    #[must_use]
    pub fn flags(&self) -> RasterFlags {
        self.flags
    }

    /// Checks the metadata. See [`FrameMetadata::validate`].
    ///
    /// # Errors
    ///
    /// Returns a [`FrameError`] describing why the frame cannot be drawn.
    pub fn validate(&self) -> Result<(), FrameError> {
        self.metadata.validate()
    }

    /// Animator frame counter this tree was produced in.
    #[must_use]
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Records which frame produced the tree and when it was built.
    pub fn record_build(&mut self, frame_number: u64, times: BuildTimes) {
        self.frame_number = frame_number;
        self.build_times = Some(times);
    }

    /// Build timestamps, once recorded.
    #[must_use]
    pub fn build_times(&self) -> Option<BuildTimes> {
        self.build_times
    }

    /// Runs Preroll over the whole tree, replacing any earlier state.
    ///
    /// The traversal starts with the identity matrix: the frame is in
    /// physical pixels.
    pub fn preroll(&mut self, ctx: &mut PrerollContext<'_>) -> &PrerollState {
        let state = layer::preroll(&self.arena, self.root, ctx, Affine::IDENTITY);
        self.preroll_state.insert(state)
    }

    /// Convenience Preroll culling to the frame rectangle with no cache or
    /// embedder.
    pub fn preroll_frame(&mut self) -> &PrerollState {
        let mut ctx = PrerollContext::new(Rect::from_origin_size((0.0, 0.0), self.metadata.frame_size));
        self.preroll(&mut ctx)
    }

    /// Paints the tree.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::NotPrerolled`] if [`preroll`](Self::preroll) has
    /// not run on this tree.
    pub fn paint(&self, ctx: &mut PaintContext<'_>) -> Result<(), FrameError> {
        let state = self.preroll_state.as_ref().ok_or(FrameError::NotPrerolled)?;
        let saves = ctx.canvas.save_count();
        layer::paint(&self.arena, self.root, state, ctx);
        debug_assert_eq!(ctx.canvas.save_count(), saves, "unbalanced save/restore");
        Ok(())
    }

    /// Computed state from the last Preroll.
    #[must_use]
    pub fn preroll_state(&self) -> Option<&PrerollState> {
        self.preroll_state.as_ref()
    }

    /// Bounds of a node of this tree's arena, after Preroll.
    #[must_use]
    pub fn paint_bounds(&self, id: LayerId) -> Option<Rect> {
        self.node_state(id).map(|n| n.paint_bounds)
    }

    /// Whether a node of this tree's arena will be painted, after Preroll.
    #[must_use]
    pub fn needs_painting(&self, id: LayerId) -> Option<bool> {
        self.node_state(id).map(|n| n.needs_painting)
    }

    fn node_state(&self, id: LayerId) -> Option<&NodeState> {
        self.preroll_state.as_ref()?.node(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_malformed_metadata() {
        let ok = FrameMetadata::with_size(100.0, 50.0);
        assert_eq!(ok.validate(), Ok(()), "plain frame is valid");
        assert!(
            matches!(FrameMetadata::with_size(0.0, 50.0).validate(), Err(FrameError::EmptyFrameSize { .. })),
            "zero width"
        );
        assert!(
            matches!(
                FrameMetadata::with_size(f64::NAN, 5.0).validate(),
                Err(FrameError::EmptyFrameSize { .. })
            ),
            "NaN width"
        );
        let bad_dpr = FrameMetadata {
            device_pixel_ratio: 0.0,
            ..ok
        };
        assert_eq!(bad_dpr.validate(), Err(FrameError::InvalidDevicePixelRatio(0.0)), "zero dpr");
        let bad_depth = FrameMetadata {
            physical_depth: -1.0,
            ..ok
        };
        assert_eq!(bad_depth.validate(), Err(FrameError::InvalidPhysicalDepth(-1.0)), "negative depth");
    }

    #[test]
    fn paint_before_preroll_is_an_error() {
        struct Null;
        impl crate::canvas::Canvas for Null {
            fn save(&mut self) {}
            fn save_layer(&mut self, _: Option<Rect>, _: &crate::paint::LayerPaint) {}
            fn restore(&mut self) {}
            fn save_count(&self) -> usize {
                1
            }
            fn concat(&mut self, _: Affine) {}
            fn total_transform(&self) -> Affine {
                Affine::IDENTITY
            }
            fn clip_rect(&mut self, _: Rect, _: bool) {}
            fn clip_rounded_rect(&mut self, _: kurbo::RoundedRect, _: bool) {}
            fn clip_path(&mut self, _: &kurbo::BezPath, _: bool) {}
            fn draw_rect(&mut self, _: Rect, _: &crate::paint::Shader, _: crate::paint::BlendMode) {}
            fn draw_path(&mut self, _: &kurbo::BezPath, _: crate::paint::Color) {}
            fn draw_shadow(&mut self, _: &kurbo::BezPath, _: crate::paint::Color, _: f64, _: bool) {}
            fn draw_image(&mut self, _: &crate::raster_cache::RasterImage, _: Rect) {}
        }
        let tree = crate::SceneBuilder::new()
            .build()
            .take_layer_tree(FrameMetadata::with_size(10.0, 10.0))
            .expect("fresh scene has a tree");
        let mut canvas = Null;
        let mut ctx = PaintContext::new(&mut canvas);
        assert_eq!(tree.paint(&mut ctx), Err(FrameError::NotPrerolled), "no preroll yet");
    }
}
