// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Embedding of host-owned views into the composited frame.
//!
//! Platform views are not drawn by the canvas. Preroll instead reports where
//! each one goes, together with every clip, transform, and opacity its
//! ancestors apply, so the host compositor can reproduce them.

use kurbo::{Affine, BezPath, Rect, RoundedRect, Size, Vec2};
use smallvec::SmallVec;

/// A clip shape, as applied by the clip layer variants.
#[derive(Clone, Debug, PartialEq)]
pub enum ClipShape {
    /// Axis-aligned rectangle.
    Rect(Rect),
    /// Rounded rectangle.
    RoundedRect(RoundedRect),
    /// Arbitrary path.
    Path(BezPath),
}

impl ClipShape {
    /// Bounding box of the clip.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        use kurbo::Shape as _;
        match self {
            Self::Rect(r) => *r,
            Self::RoundedRect(r) => r.rect(),
            Self::Path(p) => p.bounding_box(),
        }
    }
}

/// One ancestor operation affecting an embedded view.
#[derive(Clone, Debug, PartialEq)]
pub enum Mutator {
    /// Clip in the coordinate space at this point of the stack.
    Clip(ClipShape),
    /// Transform applied to everything below.
    Transform(Affine),
    /// Group opacity, `0..=255`.
    Opacity(u8),
}

/// Ancestor operations from the root down, in application order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MutatorStack {
    ops: SmallVec<[Mutator; 8]>,
}

impl MutatorStack {
    /// Creates an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes an operation.
    pub fn push(&mut self, m: Mutator) {
        self.ops.push(m);
    }

    /// Pops the most recent operation.
    pub fn pop(&mut self) -> Option<Mutator> {
        self.ops.pop()
    }

    /// Operations from outermost to innermost.
    pub fn iter(&self) -> impl Iterator<Item = &Mutator> {
        self.ops.iter()
    }

    /// Number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns `true` if no ancestor mutates the view.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Product of every transform on the stack.
    #[must_use]
    pub fn total_transform(&self) -> Affine {
        self.ops.iter().fold(Affine::IDENTITY, |acc, m| match m {
            Mutator::Transform(t) => acc * *t,
            _ => acc,
        })
    }

    /// Product of every opacity on the stack, in `0.0..=1.0`.
    #[must_use]
    pub fn total_opacity(&self) -> f32 {
        self.ops.iter().fold(1.0, |acc, m| match m {
            Mutator::Opacity(a) => acc * f32::from(*a) / 255.0,
            _ => acc,
        })
    }
}

/// Placement of one platform view in the frame being prerolled.
#[derive(Clone, Debug, PartialEq)]
pub struct EmbeddedViewParams {
    /// Host view identifier.
    pub view_id: i64,
    /// Offset within the layer's coordinate space.
    pub offset: Vec2,
    /// Size in the layer's coordinate space.
    pub size: Size,
    /// Accumulated transform at the layer.
    pub transform: Affine,
    /// Ancestor clips, transforms, and opacities.
    pub mutators: MutatorStack,
}

/// Host compositor hook receiving platform-view placements.
pub trait PlatformViewEmbedder {
    /// Called before Preroll with the frame size.
    fn begin_frame(&mut self, frame_size: Size) {
        _ = frame_size;
    }

    /// Called once per platform view encountered during Preroll.
    fn prepare_view(&mut self, params: EmbeddedViewParams);

    /// Called after the frame has been submitted.
    fn submit_frame(&mut self) {}
}
