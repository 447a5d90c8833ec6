// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Canvas that records calls instead of drawing.

use kurbo::{Affine, BezPath, Rect, RoundedRect};
use lamina_core::canvas::Canvas;
use lamina_core::paint::{BlendMode, Color, LayerPaint, Shader};
use lamina_core::picture::{Picture, PictureId};
use lamina_core::raster_cache::RasterImage;

/// One recorded canvas call.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawOp {
    /// [`Canvas::save`].
    Save,
    /// [`Canvas::save_layer`].
    SaveLayer {
        /// Bounds hint.
        bounds: Option<Rect>,
        /// Layer paint.
        paint: LayerPaint,
    },
    /// [`Canvas::restore`].
    Restore,
    /// [`Canvas::concat`].
    Concat(Affine),
    /// [`Canvas::clip_rect`].
    ClipRect {
        /// Clip rectangle.
        rect: Rect,
        /// Anti-aliased.
        anti_alias: bool,
    },
    /// [`Canvas::clip_rounded_rect`].
    ClipRoundedRect {
        /// Clip shape.
        rect: RoundedRect,
        /// Anti-aliased.
        anti_alias: bool,
    },
    /// [`Canvas::clip_path`].
    ClipPath {
        /// Clip path.
        path: BezPath,
        /// Anti-aliased.
        anti_alias: bool,
    },
    /// [`Canvas::draw_rect`].
    DrawRect {
        /// Filled rectangle.
        rect: Rect,
        /// Fill shader.
        shader: Shader,
        /// Blend mode.
        blend: BlendMode,
    },
    /// [`Canvas::draw_path`].
    DrawPath {
        /// Filled path.
        path: BezPath,
        /// Fill color.
        color: Color,
    },
    /// [`Canvas::draw_shadow`].
    DrawShadow {
        /// Occluder outline.
        path: BezPath,
        /// Shadow color.
        color: Color,
        /// Elevation.
        elevation: f64,
    },
    /// [`Canvas::draw_picture`], recorded without replaying.
    DrawPicture(PictureId),
    /// [`Canvas::draw_image`].
    DrawImage {
        /// Device rectangle of the source image.
        image_rect: Rect,
        /// Destination rectangle.
        dst: Rect,
    },
}

/// A [`Canvas`] that appends every call to a list.
///
/// Transforms are tracked so that [`Canvas::total_transform`] answers
/// correctly; nothing else is interpreted.
#[derive(Clone, Debug)]
pub struct RecordingCanvas {
    ops: Vec<DrawOp>,
    transforms: Vec<Affine>,
    expand_pictures: bool,
}

impl Default for RecordingCanvas {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingCanvas {
    /// Creates an empty recording that logs pictures as single ops.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ops: Vec::new(),
            transforms: vec![Affine::IDENTITY],
            expand_pictures: false,
        }
    }

    /// Creates an empty recording that replays pictures into their fills.
    #[must_use]
    pub fn expanding_pictures() -> Self {
        Self {
            expand_pictures: true,
            ..Self::new()
        }
    }

    /// Recorded calls in order.
    #[must_use]
    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    /// Consumes the canvas and returns the calls.
    #[must_use]
    pub fn into_ops(self) -> Vec<DrawOp> {
        self.ops
    }

    /// Number of `save` plus `save_layer` calls.
    #[must_use]
    pub fn save_calls(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, DrawOp::Save | DrawOp::SaveLayer { .. }))
            .count()
    }

    /// Number of `restore` calls.
    #[must_use]
    pub fn restore_calls(&self) -> usize {
        self.ops.iter().filter(|op| matches!(op, DrawOp::Restore)).count()
    }

    /// Forgets every recorded call and resets the transform.
    pub fn clear(&mut self) {
        self.ops.clear();
        self.transforms.clear();
        self.transforms.push(Affine::IDENTITY);
    }

    fn push_state(&mut self) {
        let top = self.total_transform();
        self.transforms.push(top);
    }
}

impl Canvas for RecordingCanvas {
    fn save(&mut self) {
        self.ops.push(DrawOp::Save);
        self.push_state();
    }

    fn save_layer(&mut self, bounds: Option<Rect>, paint: &LayerPaint) {
        self.ops.push(DrawOp::SaveLayer {
            bounds,
            paint: paint.clone(),
        });
        self.push_state();
    }

    fn restore(&mut self) {
        if self.transforms.len() > 1 {
            self.ops.push(DrawOp::Restore);
            self.transforms.pop();
        } else {
            log::warn!("restore on an empty save stack ignored");
        }
    }

    fn save_count(&self) -> usize {
        self.transforms.len()
    }

    fn concat(&mut self, transform: Affine) {
        self.ops.push(DrawOp::Concat(transform));
        if let Some(top) = self.transforms.last_mut() {
            *top = *top * transform;
        }
    }

    fn total_transform(&self) -> Affine {
        self.transforms.last().copied().unwrap_or(Affine::IDENTITY)
    }

    fn clip_rect(&mut self, rect: Rect, anti_alias: bool) {
        self.ops.push(DrawOp::ClipRect { rect, anti_alias });
    }

    fn clip_rounded_rect(&mut self, rect: RoundedRect, anti_alias: bool) {
        self.ops.push(DrawOp::ClipRoundedRect { rect, anti_alias });
    }

    fn clip_path(&mut self, path: &BezPath, anti_alias: bool) {
        self.ops.push(DrawOp::ClipPath {
            path: path.clone(),
            anti_alias,
        });
    }

    fn draw_rect(&mut self, rect: Rect, shader: &Shader, blend: BlendMode) {
        self.ops.push(DrawOp::DrawRect {
            rect,
            shader: shader.clone(),
            blend,
        });
    }

    fn draw_path(&mut self, path: &BezPath, color: Color) {
        self.ops.push(DrawOp::DrawPath {
            path: path.clone(),
            color,
        });
    }

    fn draw_shadow(&mut self, path: &BezPath, color: Color, elevation: f64, _transparent_occluder: bool) {
        self.ops.push(DrawOp::DrawShadow {
            path: path.clone(),
            color,
            elevation,
        });
    }

    fn draw_image(&mut self, image: &RasterImage, dst: Rect) {
        self.ops.push(DrawOp::DrawImage {
            image_rect: image.device_rect,
            dst,
        });
    }

    fn draw_picture(&mut self, picture: &Picture) {
        if self.expand_pictures {
            lamina_core::canvas::replay(self, picture);
        } else {
            self.ops.push(DrawOp::DrawPicture(picture.id()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Vec2;
    use lamina_core::picture::PictureRecorder;

    #[test]
    fn tracks_transform_through_saves() {
        let mut c = RecordingCanvas::new();
        c.save();
        c.translate(Vec2::new(5.0, 0.0));
        assert_eq!(c.total_transform(), Affine::translate((5.0, 0.0)), "translated");
        c.restore();
        assert_eq!(c.total_transform(), Affine::IDENTITY, "restored");
        assert_eq!(c.save_count(), 1, "back at base");
        assert_eq!(c.save_calls(), c.restore_calls(), "balanced");
    }

    #[test]
    fn extra_restore_is_ignored() {
        let mut c = RecordingCanvas::new();
        c.restore();
        assert!(c.ops().is_empty(), "nothing recorded");
        assert_eq!(c.save_count(), 1, "floor of one");
    }

    #[test]
    fn pictures_record_or_expand() {
        let mut rec = PictureRecorder::new();
        rec.fill_rect(Rect::new(0.0, 0.0, 2.0, 2.0), Color::from_rgba8(1, 2, 3, 255));
        let pic = rec.finish();

        let mut flat = RecordingCanvas::new();
        flat.draw_picture(&pic);
        assert_eq!(flat.ops(), &[DrawOp::DrawPicture(pic.id())], "one op");

        let mut expanded = RecordingCanvas::expanding_pictures();
        expanded.draw_picture(&pic);
        assert!(
            matches!(expanded.ops(), [DrawOp::DrawRect { .. }]),
            "replayed into fills: {:?}",
            expanded.ops()
        );
    }
}
