// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer variants, the per-build arena, and the two-pass traversal.
//!
//! A scene is a tree of [`Layer`] values stored in a [`LayerArena`] and
//! addressed by [`LayerId`]. Each node owns its variant parameters and an
//! ordered list of [`ChildSlot`]s. A slot either names a node in the same
//! arena or holds an [`EngineLayer`] pointing into an arena built earlier.
//!
//! Arenas are sealed when their scene is built and never mutated afterwards.
//! Everything that changes per frame lives in a [`PrerollState`] owned by the
//! layer tree being drawn.
//!
//! # Traversal
//!
//! ```text
//!   preroll(arena, root, ctx, matrix)            paint(arena, root, state, ctx)
//!     visit node (pre-order)                       visit node (same order)
//!       apply own effect to matrix/cull/mutators     skip subtree if !needs_painting
//!       preroll children in insertion order          save/clip/save_layer
//!       bounds = union(children) mapped back         paint children
//!       record {bounds, needs_painting}              restore
//! ```
//!
//! Both passes walk the same slots in the same order, so Paint reads the
//! state Preroll wrote by visit position.

mod arena;
mod engine_layer;
mod id;
mod paint;
mod preroll;

pub use arena::{ChildSlot, LayerArena};
pub use engine_layer::EngineLayer;
pub use id::LayerId;
pub use paint::{PaintContext, paint};
pub use preroll::{NodeState, PrerollContext, PrerollState, preroll};

pub(crate) use engine_layer::BuildSession;

use kurbo::{BezPath, Rect, RoundedRect, Size, Vec2};

use crate::overlay::OverlayOptions;
use crate::paint::{BlendMode, Color, ColorFilter, ImageFilter, Shader};
use crate::picture::Picture;
use crate::platform_view::ClipShape;
use crate::transform::Transform3d;

/// How a clip layer clips its children.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Clip {
    /// No clipping.
    None,
    /// Aliased clip.
    HardEdge,
    /// Anti-aliased clip.
    #[default]
    AntiAlias,
    /// Anti-aliased clip with an offscreen layer to avoid edge bleeding.
    AntiAliasWithSaveLayer,
}

impl Clip {
    /// Returns `true` if children are clipped.
    #[inline]
    #[must_use]
    pub const fn clips(self) -> bool {
        !matches!(self, Self::None)
    }

    /// Returns `true` if the clip is anti-aliased.
    #[inline]
    #[must_use]
    pub const fn anti_alias(self) -> bool {
        matches!(self, Self::AntiAlias | Self::AntiAliasWithSaveLayer)
    }

    /// Returns `true` if painting opens an offscreen layer inside the clip.
    #[inline]
    #[must_use]
    pub const fn uses_save_layer(self) -> bool {
        matches!(self, Self::AntiAliasWithSaveLayer)
    }
}

/// Clips children to a rectangle.
#[derive(Clone, Debug, PartialEq)]
pub struct ClipRectLayer {
    /// Clip rectangle in local coordinates.
    pub clip_rect: Rect,
    /// Clip behavior.
    pub clip: Clip,
}

/// Clips children to a rounded rectangle.
#[derive(Clone, Debug, PartialEq)]
pub struct ClipRRectLayer {
    /// Clip shape in local coordinates.
    pub clip_rrect: RoundedRect,
    /// Clip behavior.
    pub clip: Clip,
}

/// Clips children to a path.
#[derive(Clone, Debug, PartialEq)]
pub struct ClipPathLayer {
    /// Clip path in local coordinates.
    pub clip_path: BezPath,
    /// Clip behavior; never [`Clip::None`].
    pub clip: Clip,
}

/// Paints children with group opacity, shifted by an offset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OpacityLayer {
    /// Group alpha, `0..=255`.
    pub alpha: u8,
    /// Translation applied to children.
    pub offset: Vec2,
}

/// Applies a color filter to the composited children.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorFilterLayer {
    /// The filter.
    pub filter: ColorFilter,
}

/// Applies an image filter to the composited children.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImageFilterLayer {
    /// The filter.
    pub filter: ImageFilter,
}

/// Filters whatever is behind the layer before painting children.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackdropFilterLayer {
    /// The filter applied to the backdrop.
    pub filter: ImageFilter,
}

/// Masks children with a shader.
#[derive(Clone, Debug, PartialEq)]
pub struct ShaderMaskLayer {
    /// Mask source.
    pub shader: Shader,
    /// Rectangle the shader is drawn into.
    pub mask_rect: Rect,
    /// How the mask combines with the children.
    pub blend_mode: BlendMode,
}

/// Transforms children.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransformLayer {
    /// The transform.
    pub transform: Transform3d,
}

/// A filled shape with an elevation shadow that optionally clips children.
#[derive(Clone, Debug, PartialEq)]
pub struct PhysicalShapeLayer {
    /// Outline of the shape.
    pub path: BezPath,
    /// Height above the parent; larger values cast wider shadows.
    pub elevation: f64,
    /// Fill color.
    pub color: Color,
    /// Shadow color.
    pub shadow_color: Color,
    /// How children are clipped to the path.
    pub clip: Clip,
}

impl PhysicalShapeLayer {
    /// Bounds of the shape together with its shadow.
    #[must_use]
    pub fn shape_bounds(&self) -> Rect {
        use kurbo::Shape as _;
        let b = self.path.bounding_box();
        if self.elevation > 0.0 {
            b.inflate(self.elevation, self.elevation)
        } else {
            b
        }
    }
}

/// Draws a recorded picture.
#[derive(Clone, Debug, PartialEq)]
pub struct PictureLayer {
    /// Where the picture's origin lands.
    pub offset: Vec2,
    /// The recording.
    pub picture: Picture,
    /// Author hint: expensive to replay.
    pub is_complex: bool,
    /// Author hint: about to change, not worth caching.
    pub will_change: bool,
}

/// Draws an externally produced texture.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextureLayer {
    /// Top-left corner.
    pub offset: Vec2,
    /// Size of the drawn area.
    pub size: Size,
    /// Registry id of the texture.
    pub texture_id: i64,
    /// Keep showing the current frame.
    pub freeze: bool,
}

/// Reserves space for a host-composited view.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlatformViewLayer {
    /// Top-left corner.
    pub offset: Vec2,
    /// Size of the view.
    pub size: Size,
    /// Host view id.
    pub view_id: i64,
}

/// Draws frame-time graphs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PerformanceOverlayLayer {
    /// Enabled graphs.
    pub options: OverlayOptions,
    /// Caller-supplied area.
    pub bounds: Rect,
}

/// A node in the scene graph.
///
/// Grouping variants hold children (see [`Layer::is_container`]); the last
/// four are leaves.
#[derive(Clone, Debug, PartialEq)]
pub enum Layer {
    /// Plain grouping node.
    Container,
    /// See [`ClipRectLayer`].
    ClipRect(ClipRectLayer),
    /// See [`ClipRRectLayer`].
    ClipRRect(ClipRRectLayer),
    /// See [`ClipPathLayer`].
    ClipPath(ClipPathLayer),
    /// See [`OpacityLayer`].
    Opacity(OpacityLayer),
    /// See [`ColorFilterLayer`].
    ColorFilter(ColorFilterLayer),
    /// See [`ImageFilterLayer`].
    ImageFilter(ImageFilterLayer),
    /// See [`BackdropFilterLayer`].
    BackdropFilter(BackdropFilterLayer),
    /// See [`ShaderMaskLayer`].
    ShaderMask(ShaderMaskLayer),
    /// See [`TransformLayer`].
    Transform(TransformLayer),
    /// See [`PhysicalShapeLayer`].
    PhysicalShape(PhysicalShapeLayer),
    /// See [`PictureLayer`].
    Picture(PictureLayer),
    /// See [`TextureLayer`].
    Texture(TextureLayer),
    /// See [`PlatformViewLayer`].
    PlatformView(PlatformViewLayer),
    /// See [`PerformanceOverlayLayer`].
    PerformanceOverlay(PerformanceOverlayLayer),
}

impl Layer {
    /// Returns `true` for variants that hold children.
    #[must_use]
    pub const fn is_container(&self) -> bool {
        !matches!(
            self,
            Self::Picture(_) | Self::Texture(_) | Self::PlatformView(_) | Self::PerformanceOverlay(_)
        )
    }

    /// Short variant name for diagnostics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Container => "Container",
            Self::ClipRect(_) => "ClipRect",
            Self::ClipRRect(_) => "ClipRRect",
            Self::ClipPath(_) => "ClipPath",
            Self::Opacity(_) => "Opacity",
            Self::ColorFilter(_) => "ColorFilter",
            Self::ImageFilter(_) => "ImageFilter",
            Self::BackdropFilter(_) => "BackdropFilter",
            Self::ShaderMask(_) => "ShaderMask",
            Self::Transform(_) => "Transform",
            Self::PhysicalShape(_) => "PhysicalShape",
            Self::Picture(_) => "Picture",
            Self::Texture(_) => "Texture",
            Self::PlatformView(_) => "PlatformView",
            Self::PerformanceOverlay(_) => "PerformanceOverlay",
        }
    }

    /// The clip this layer applies to its children, if any.
    pub(crate) fn clip(&self) -> Option<(ClipShape, Clip)> {
        let (shape, clip) = match self {
            Self::ClipRect(l) => (ClipShape::Rect(l.clip_rect), l.clip),
            Self::ClipRRect(l) => (ClipShape::RoundedRect(l.clip_rrect), l.clip),
            Self::ClipPath(l) => (ClipShape::Path(l.clip_path.clone()), l.clip),
            Self::PhysicalShape(l) => (ClipShape::Path(l.path.clone()), l.clip),
            _ => return None,
        };
        clip.clips().then_some((shape, clip))
    }
}

/// Union that treats zero-area rectangles as empty.
pub(crate) fn join(a: Rect, b: Rect) -> Rect {
    match (is_empty(a), is_empty(b)) {
        (true, _) => b,
        (_, true) => a,
        _ => a.union(b),
    }
}

/// Intersection that yields [`Rect::ZERO`] when nothing overlaps.
pub(crate) fn meet(a: Rect, b: Rect) -> Rect {
    let r = a.intersect(b);
    if is_empty(r) { Rect::ZERO } else { r }
}

pub(crate) fn is_empty(r: Rect) -> bool {
    !(r.width() > 0.0 && r.height() > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_classification() {
        assert!(Layer::Container.is_container(), "container groups");
        assert!(
            Layer::Opacity(OpacityLayer {
                alpha: 1,
                offset: Vec2::ZERO
            })
            .is_container(),
            "opacity groups"
        );
        let tex = Layer::Texture(TextureLayer {
            offset: Vec2::ZERO,
            size: Size::new(1.0, 1.0),
            texture_id: 0,
            freeze: false,
        });
        assert!(!tex.is_container(), "texture is a leaf");
        assert_eq!(tex.name(), "Texture", "diagnostic name");
    }

    #[test]
    fn clip_none_does_not_clip() {
        let l = Layer::ClipRect(ClipRectLayer {
            clip_rect: Rect::new(0.0, 0.0, 1.0, 1.0),
            clip: Clip::None,
        });
        assert!(l.clip().is_none(), "Clip::None applies no clip");
        assert!(Clip::AntiAliasWithSaveLayer.uses_save_layer(), "save layer flag");
        assert!(!Clip::HardEdge.anti_alias(), "hard edge is aliased");
    }

    #[test]
    fn join_ignores_empty() {
        let a = Rect::new(10.0, 10.0, 20.0, 20.0);
        assert_eq!(join(Rect::ZERO, a), a, "empty left operand");
        assert_eq!(join(a, Rect::ZERO), a, "empty right operand");
        assert_eq!(
            join(a, Rect::new(30.0, 0.0, 40.0, 5.0)),
            Rect::new(10.0, 0.0, 40.0, 20.0),
            "plain union"
        );
        assert_eq!(meet(a, Rect::new(50.0, 50.0, 60.0, 60.0)), Rect::ZERO, "disjoint meet is empty");
    }

    #[test]
    fn physical_shape_bounds_include_shadow() {
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((10.0, 0.0));
        path.line_to((10.0, 10.0));
        path.close_path();
        let l = PhysicalShapeLayer {
            path,
            elevation: 4.0,
            color: Color::from_rgba8(0, 0, 0, 255),
            shadow_color: Color::from_rgba8(0, 0, 0, 255),
            clip: Clip::None,
        };
        assert_eq!(l.shape_bounds(), Rect::new(-4.0, -4.0, 14.0, 14.0), "shadow spread");
    }
}
