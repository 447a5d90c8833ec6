// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Stack-based scene construction.

use std::sync::Arc;

use kurbo::{BezPath, Rect, RoundedRect, Size, Vec2};

use crate::error::SceneError;
use crate::layer::{
    BackdropFilterLayer, BuildSession, Clip, ClipPathLayer, ClipRRectLayer, ClipRectLayer, ColorFilterLayer,
    EngineLayer, ImageFilterLayer, Layer, LayerArena, LayerId, OpacityLayer, PerformanceOverlayLayer,
    PhysicalShapeLayer, PictureLayer, PlatformViewLayer, ShaderMaskLayer, TextureLayer, TransformLayer,
};
use crate::layer_tree::{FrameMetadata, LayerTree, RasterFlags};
use crate::overlay::OverlayOptions;
use crate::paint::{BlendMode, Color, ColorFilter, ImageFilter, Shader};
use crate::picture::Picture;
use crate::transform::Transform3d;

/// Picture hint bit: the picture is expensive to replay.
pub const PICTURE_IS_COMPLEX: u32 = 1 << 0;
/// Picture hint bit: the picture is about to change.
pub const PICTURE_WILL_CHANGE: u32 = 1 << 1;

/// Builds one scene by pushing grouping layers and adding leaves.
///
/// Each `push_*` opens a new grouping layer under the current one and makes
/// it current; [`pop`](Self::pop) closes it. Leaves are added under the
/// current layer in call order, which is also paint order.
///
/// ```
/// use kurbo::{Rect, Vec2};
/// use lamina_core::picture::PictureRecorder;
/// use lamina_core::paint::Color;
/// use lamina_core::{FrameMetadata, SceneBuilder};
///
/// let mut rec = PictureRecorder::new();
/// rec.fill_rect(Rect::new(0.0, 0.0, 10.0, 10.0), Color::from_rgba8(255, 0, 0, 255));
///
/// let mut builder = SceneBuilder::new();
/// builder.push_opacity(128, Vec2::ZERO);
/// builder.add_picture(Vec2::ZERO, rec.finish(), 0);
/// builder.pop();
/// let mut scene = builder.build();
/// let tree = scene.take_layer_tree(FrameMetadata::with_size(10.0, 10.0));
/// assert!(tree.is_some());
/// ```
#[derive(Debug)]
pub struct SceneBuilder {
    session: Arc<BuildSession>,
    arena: LayerArena,
    stack: Vec<LayerId>,
    flags: RasterFlags,
}

impl Default for SceneBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneBuilder {
    /// Creates a builder whose current layer is the root container.
    #[must_use]
    pub fn new() -> Self {
        let session = BuildSession::new();
        let arena = LayerArena::new(session.id());
        Self {
            session,
            arena,
            stack: vec![LayerId::ROOT],
            flags: RasterFlags::default(),
        }
    }

    /// Number of open layers, counting the root.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    fn current(&self) -> LayerId {
        self.stack.last().copied().unwrap_or(LayerId::ROOT)
    }

    fn push(&mut self, layer: Layer) -> EngineLayer {
        let id = self.arena.push(self.current(), layer);
        self.stack.push(id);
        EngineLayer::new(Arc::clone(&self.session), id)
    }

    fn add(&mut self, layer: Layer) {
        self.arena.push(self.current(), layer);
    }

    /// Pushes a transform layer.
    pub fn push_transform(&mut self, transform: Transform3d) -> EngineLayer {
        self.push(Layer::Transform(TransformLayer { transform }))
    }

    /// Pushes a transform layer that translates by `(dx, dy)`.
    pub fn push_offset(&mut self, dx: f64, dy: f64) -> EngineLayer {
        self.push_transform(Transform3d::from_translation(dx, dy, 0.0))
    }

    /// Pushes a rectangular clip.
    pub fn push_clip_rect(&mut self, rect: Rect, clip: Clip) -> EngineLayer {
        self.push(Layer::ClipRect(ClipRectLayer { clip_rect: rect, clip }))
    }

    /// Pushes a rounded-rectangle clip.
    pub fn push_clip_rrect(&mut self, rrect: RoundedRect, clip: Clip) -> EngineLayer {
        self.push(Layer::ClipRRect(ClipRRectLayer { clip_rrect: rrect, clip }))
    }

    /// Pushes a path clip.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::ClipBehaviorNone`] for [`Clip::None`]; nothing
    /// is pushed.
    ///
    /// # Panics
    ///
    /// Debug builds panic on [`Clip::None`].
    pub fn push_clip_path(&mut self, path: BezPath, clip: Clip) -> Result<EngineLayer, SceneError> {
        debug_assert!(clip.clips(), "clip path pushed with Clip::None");
        if !clip.clips() {
            log::warn!("push_clip_path with Clip::None ignored");
            return Err(SceneError::ClipBehaviorNone);
        }
        Ok(self.push(Layer::ClipPath(ClipPathLayer { clip_path: path, clip })))
    }

    /// Pushes an opacity layer.
    ///
    /// The opacity node gets a single container child that collects
    /// everything added until the matching [`pop`](Self::pop). The returned
    /// handle names the opacity node.
    pub fn push_opacity(&mut self, alpha: u8, offset: Vec2) -> EngineLayer {
        let handle = self.push(Layer::Opacity(OpacityLayer { alpha, offset }));
        let inner = self.arena.push(handle.layer_id(), Layer::Container);
        // The container replaces the opacity node as the current layer.
        if let Some(top) = self.stack.last_mut() {
            *top = inner;
        }
        handle
    }

    /// Pushes a color filter layer.
    pub fn push_color_filter(&mut self, filter: ColorFilter) -> EngineLayer {
        self.push(Layer::ColorFilter(ColorFilterLayer { filter }))
    }

    /// Pushes an image filter layer.
    pub fn push_image_filter(&mut self, filter: ImageFilter) -> EngineLayer {
        self.push(Layer::ImageFilter(ImageFilterLayer { filter }))
    }

    /// Pushes a backdrop filter layer.
    pub fn push_backdrop_filter(&mut self, filter: ImageFilter) -> EngineLayer {
        self.push(Layer::BackdropFilter(BackdropFilterLayer { filter }))
    }

    /// Pushes a shader mask layer.
    pub fn push_shader_mask(&mut self, shader: Shader, mask_rect: Rect, blend_mode: BlendMode) -> EngineLayer {
        self.push(Layer::ShaderMask(ShaderMaskLayer {
            shader,
            mask_rect,
            blend_mode,
        }))
    }

    /// Pushes a physical shape layer.
    pub fn push_physical_shape(
        &mut self,
        path: BezPath,
        elevation: f64,
        color: Color,
        shadow_color: Color,
        clip: Clip,
    ) -> EngineLayer {
        self.push(Layer::PhysicalShape(PhysicalShapeLayer {
            path,
            elevation,
            color,
            shadow_color,
            clip,
        }))
    }

    /// Closes the current layer. Does nothing when only the root is open.
    pub fn pop(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    /// Adds a picture leaf. `hints` is a mask of [`PICTURE_IS_COMPLEX`] and
    /// [`PICTURE_WILL_CHANGE`].
    pub fn add_picture(&mut self, offset: Vec2, picture: Picture, hints: u32) {
        self.add(Layer::Picture(PictureLayer {
            offset,
            picture,
            is_complex: hints & PICTURE_IS_COMPLEX != 0,
            will_change: hints & PICTURE_WILL_CHANGE != 0,
        }));
    }

    /// Adds a texture leaf.
    pub fn add_texture(&mut self, offset: Vec2, size: Size, texture_id: i64, freeze: bool) {
        self.add(Layer::Texture(TextureLayer {
            offset,
            size,
            texture_id,
            freeze,
        }));
    }

    /// Adds a platform view leaf.
    pub fn add_platform_view(&mut self, offset: Vec2, size: Size, view_id: i64) {
        self.add(Layer::PlatformView(PlatformViewLayer { offset, size, view_id }));
    }

    /// Adds a performance overlay leaf covering `bounds`.
    pub fn add_performance_overlay(&mut self, options: OverlayOptions, bounds: Rect) {
        self.add(Layer::PerformanceOverlay(PerformanceOverlayLayer { options, bounds }));
    }

    /// Adds the subtree behind `layer`, built by an earlier scene, under the
    /// current layer. The subtree is shared, not copied.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::RetainedLayerNotBuilt`] if the scene that
    /// produced `layer` has not been built. Handles from this builder are
    /// always in that state.
    ///
    /// # Panics
    ///
    /// Debug builds panic instead of returning the error.
    pub fn add_retained(&mut self, layer: &EngineLayer) -> Result<(), SceneError> {
        debug_assert!(layer.is_built(), "retained {layer:?} from an unbuilt scene");
        if !layer.is_built() {
            log::warn!("add_retained of {layer:?} ignored: scene not built");
            return Err(SceneError::RetainedLayerNotBuilt);
        }
        self.arena.push_retained(self.current(), layer.clone());
        Ok(())
    }

    /// Frames slower than `threshold` frame budgets get traced.
    pub fn set_rasterizer_tracing_threshold(&mut self, threshold: u32) {
        self.flags.rasterizer_tracing_threshold = threshold;
    }

    /// Draw a checkerboard over pictures served from the raster cache.
    pub fn set_checkerboard_raster_cache_images(&mut self, enabled: bool) {
        self.flags.checkerboard_raster_cache_images = enabled;
    }

    /// Draw a checkerboard over offscreen layers.
    pub fn set_checkerboard_offscreen_layers(&mut self, enabled: bool) {
        self.flags.checkerboard_offscreen_layers = enabled;
    }

    /// Seals the arena and returns the scene.
    ///
    /// Every [`EngineLayer`] this builder returned becomes usable with
    /// [`add_retained`](Self::add_retained). Layers still open are closed.
    #[must_use]
    pub fn build(self) -> Scene {
        if self.stack.len() > 1 {
            log::debug!("build with {} unpopped layers", self.stack.len() - 1);
        }
        let arena = Arc::new(self.arena);
        self.session.seal(Arc::clone(&arena));
        Scene {
            arena: Some(arena),
            flags: self.flags,
        }
    }
}

/// A built scene, ready to hand its layer tree to the engine once.
#[derive(Debug)]
pub struct Scene {
    arena: Option<Arc<LayerArena>>,
    flags: RasterFlags,
}

impl Scene {
    /// Moves the layer tree out, tagged with `metadata`.
    ///
    /// Returns `None` on every call after the first.
    pub fn take_layer_tree(&mut self, metadata: FrameMetadata) -> Option<LayerTree> {
        self.arena.take().map(|arena| LayerTree::new(arena, metadata, self.flags))
    }

    /// Returns `true` until the tree has been taken.
    #[must_use]
    pub fn has_layer_tree(&self) -> bool {
        self.arena.is_some()
    }
}
