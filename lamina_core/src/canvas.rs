// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The drawing-backend boundary.
//!
//! Paint drives a [`Canvas`]: a save/restore stack of transforms and clips
//! plus a handful of fill operations. Backends implement the trait; the layer
//! tree never sees pixels.

use kurbo::{Affine, BezPath, Rect, RoundedRect, Shape as _, Vec2};

use crate::paint::{BlendMode, Color, LayerPaint, Shader};
use crate::picture::{DrawCommand, Picture};
use crate::raster_cache::RasterImage;

/// A 2D drawing target with a save stack.
///
/// The save count starts at 1. Every `save` and `save_layer` increments it
/// and every `restore` decrements it, never below 1.
pub trait Canvas {
    /// Pushes the current transform and clip.
    fn save(&mut self);

    /// Pushes state and opens an offscreen layer composited with `paint` on
    /// the matching [`restore`](Self::restore).
    ///
    /// `bounds` is a hint in local coordinates; `None` means unbounded.
    fn save_layer(&mut self, bounds: Option<Rect>, paint: &LayerPaint);

    /// Pops the most recent save, compositing its layer if it opened one.
    fn restore(&mut self);

    /// Current depth of the save stack.
    fn save_count(&self) -> usize;

    /// Pre-multiplies the current transform.
    fn concat(&mut self, transform: Affine);

    /// Current local-to-device transform.
    fn total_transform(&self) -> Affine;

    /// Intersects the clip with a rectangle.
    fn clip_rect(&mut self, rect: Rect, anti_alias: bool);

    /// Intersects the clip with a rounded rectangle.
    fn clip_rounded_rect(&mut self, rect: RoundedRect, anti_alias: bool);

    /// Intersects the clip with a path.
    fn clip_path(&mut self, path: &BezPath, anti_alias: bool);

    /// Fills a rectangle with a shader.
    fn draw_rect(&mut self, rect: Rect, shader: &Shader, blend: BlendMode);

    /// Fills a path with a solid color.
    fn draw_path(&mut self, path: &BezPath, color: Color);

    /// Draws the shadow a shape casts at the given elevation.
    fn draw_shadow(&mut self, path: &BezPath, color: Color, elevation: f64, transparent_occluder: bool);

    /// Draws a pre-rasterized image into `dst` (local coordinates).
    fn draw_image(&mut self, image: &RasterImage, dst: Rect);

    /// Replays a picture's commands.
    fn draw_picture(&mut self, picture: &Picture) {
        replay(self, picture);
    }

    /// Translates the current transform.
    fn translate(&mut self, offset: Vec2) {
        self.concat(Affine::translate(offset));
    }

    /// Restores until the save count equals `count`.
    fn restore_to_count(&mut self, count: usize) {
        while self.save_count() > count.max(1) {
            self.restore();
        }
    }
}

/// Replays `picture` onto `canvas` through the fill operations.
///
/// Backends without a native picture type use this as their
/// [`Canvas::draw_picture`].
pub fn replay<C: Canvas + ?Sized>(canvas: &mut C, picture: &Picture) {
    let blend = BlendMode::default();
    for cmd in picture.commands() {
        match cmd {
            DrawCommand::FillRect { rect, color } => canvas.draw_rect(*rect, &Shader::Solid(*color), blend),
            DrawCommand::FillRoundedRect { rect, color } => {
                canvas.draw_path(&rect.to_path(0.1), *color);
            }
            DrawCommand::FillPath { path, color } => canvas.draw_path(path, *color),
        }
    }
}

/// Paints a translucent checkerboard over `rect`.
///
/// Used to flag offscreen layers and cached images when the layer tree asks
/// for it.
pub fn draw_checkerboard(canvas: &mut dyn Canvas, rect: Rect) {
    const CELL: f64 = 12.0;
    let light = Shader::Solid(Color::from_rgba8(255, 0, 255, 48));
    let blend = BlendMode::default();
    canvas.save();
    canvas.clip_rect(rect, false);
    let mut y = rect.y0;
    let mut row = 0_u32;
    while y < rect.y1 {
        let mut x = rect.x0 + if row % 2 == 0 { 0.0 } else { CELL };
        while x < rect.x1 {
            canvas.draw_rect(Rect::new(x, y, x + CELL, y + CELL), &light, blend);
            x += CELL * 2.0;
        }
        y += CELL;
        row += 1;
    }
    canvas.restore();
}
