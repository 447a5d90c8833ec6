// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Second traversal pass: emit drawing commands.

use kurbo::Rect;

use super::arena::{ChildSlot, LayerArena};
use super::id::LayerId;
use super::preroll::PrerollState;
use super::Layer;
use crate::canvas::{Canvas, draw_checkerboard};
use crate::overlay::{OverlayStats, paint_overlay};
use crate::paint::LayerPaint;
use crate::platform_view::ClipShape;
use crate::raster_cache::RasterCache;
use crate::texture::TextureRegistry;

/// Parameters threaded through [`paint`].
pub struct PaintContext<'a> {
    /// Destination of every drawing command.
    pub canvas: &'a mut dyn Canvas,
    /// Registry texture layers look their content up in.
    pub textures: Option<&'a dyn TextureRegistry>,
    /// Cache picture layers draw from when it has an image.
    pub raster_cache: Option<&'a dyn RasterCache>,
    /// Frame stopwatches for performance overlay layers.
    pub overlay: Option<OverlayStats<'a>>,
    /// Draw a checkerboard over every offscreen layer.
    pub checkerboard_offscreen_layers: bool,
    /// Draw a checkerboard over every cached picture.
    pub checkerboard_raster_cache_images: bool,
}

impl core::fmt::Debug for PaintContext<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PaintContext")
            .field("textures", &self.textures.is_some())
            .field("raster_cache", &self.raster_cache.is_some())
            .field("overlay", &self.overlay.is_some())
            .field("checkerboard_offscreen_layers", &self.checkerboard_offscreen_layers)
            .field("checkerboard_raster_cache_images", &self.checkerboard_raster_cache_images)
            .finish_non_exhaustive()
    }
}

impl<'a> PaintContext<'a> {
    /// Creates a context drawing to `canvas` with nothing else attached.
    #[must_use]
    pub fn new(canvas: &'a mut dyn Canvas) -> Self {
        Self {
            canvas,
            textures: None,
            raster_cache: None,
            overlay: None,
            checkerboard_offscreen_layers: false,
            checkerboard_raster_cache_images: false,
        }
    }

    /// Attaches a texture registry.
    #[must_use]
    pub fn with_textures(mut self, textures: &'a dyn TextureRegistry) -> Self {
        self.textures = Some(textures);
        self
    }

    /// Attaches a raster cache.
    #[must_use]
    pub fn with_raster_cache(mut self, cache: &'a dyn RasterCache) -> Self {
        self.raster_cache = Some(cache);
        self
    }

    /// Attaches overlay statistics.
    #[must_use]
    pub fn with_overlay(mut self, stats: OverlayStats<'a>) -> Self {
        self.overlay = Some(stats);
        self
    }
}

/// Paints the subtree at `root` using the bounds `state` computed.
///
/// Subtrees whose root does not need painting are skipped whole. The canvas
/// save count is the same before and after.
///
/// # Panics
///
/// In debug builds, panics if `state` was not produced by [`preroll`] for
/// the same arena and root.
///
/// [`preroll`]: super::preroll
pub fn paint(arena: &LayerArena, root: LayerId, state: &PrerollState, ctx: &mut PaintContext<'_>) {
    debug_assert!(state.matches(arena, root), "paint without a matching preroll");
    if !state.matches(arena, root) {
        log::warn!("paint skipped: no preroll state for {root:?}");
        return;
    }
    Painter { ctx, state, cursor: 0 }.node(arena, root);
}

struct Painter<'p, 'a> {
    ctx: &'p mut PaintContext<'a>,
    state: &'p PrerollState,
    cursor: usize,
}

impl Painter<'_, '_> {
    fn node(&mut self, arena: &LayerArena, id: LayerId) {
        let Some(ns) = self.state.visit(self.cursor) else {
            return;
        };
        let end = ns.end as usize;
        if !ns.needs_painting {
            self.cursor = end;
            return;
        }
        self.cursor += 1;
        let bounds = ns.paint_bounds;
        let layer = arena.layer(id);

        match layer {
            Layer::Container => self.children(arena, id),
            Layer::ClipRect(_) | Layer::ClipRRect(_) | Layer::ClipPath(_) => match layer.clip() {
                Some((shape, clip)) => self.clip_children(arena, id, &shape, clip.anti_alias(), clip.uses_save_layer(), bounds),
                None => self.children(arena, id),
            },
            Layer::Opacity(l) => {
                let canvas = &mut *self.ctx.canvas;
                canvas.save();
                canvas.translate(l.offset);
                if l.alpha == u8::MAX {
                    self.children(arena, id);
                } else {
                    let local = bounds - l.offset;
                    self.ctx.canvas.save_layer(Some(local), &LayerPaint::with_alpha(l.alpha));
                    self.children(arena, id);
                    self.end_layer(local);
                }
                self.ctx.canvas.restore();
            }
            Layer::ColorFilter(l) => {
                let paint = LayerPaint {
                    color_filter: Some(l.filter.clone()),
                    ..LayerPaint::default()
                };
                self.ctx.canvas.save_layer(Some(bounds), &paint);
                self.children(arena, id);
                self.end_layer(bounds);
            }
            Layer::ImageFilter(l) => {
                let paint = LayerPaint {
                    image_filter: Some(l.filter),
                    ..LayerPaint::default()
                };
                self.ctx.canvas.save_layer(Some(bounds), &paint);
                self.children(arena, id);
                self.end_layer(bounds);
            }
            Layer::BackdropFilter(l) => {
                let paint = LayerPaint {
                    backdrop: Some(l.filter),
                    ..LayerPaint::default()
                };
                self.ctx.canvas.save_layer(Some(bounds), &paint);
                self.children(arena, id);
                self.end_layer(bounds);
            }
            Layer::ShaderMask(l) => {
                self.ctx.canvas.save_layer(Some(bounds), &LayerPaint::default());
                self.children(arena, id);
                self.ctx.canvas.draw_rect(l.mask_rect, &l.shader, l.blend_mode);
                self.end_layer(bounds);
            }
            Layer::Transform(l) => {
                self.ctx.canvas.save();
                self.ctx.canvas.concat(l.transform.to_affine());
                self.children(arena, id);
                self.ctx.canvas.restore();
            }
            Layer::PhysicalShape(l) => {
                let canvas = &mut *self.ctx.canvas;
                if l.elevation > 0.0 {
                    let transparent = l.color.components[3] < 1.0;
                    canvas.draw_shadow(&l.path, l.shadow_color, l.elevation, transparent);
                }
                canvas.draw_path(&l.path, l.color);
                match layer.clip() {
                    Some((shape, clip)) => {
                        self.clip_children(arena, id, &shape, clip.anti_alias(), clip.uses_save_layer(), bounds);
                    }
                    None => self.children(arena, id),
                }
            }
            Layer::Picture(l) => {
                let canvas = &mut *self.ctx.canvas;
                canvas.save();
                canvas.translate(l.offset);
                let matrix = canvas.total_transform();
                let cached = self.ctx.raster_cache.and_then(|c| c.get(&l.picture, &matrix));
                match cached {
                    Some(image) => {
                        let canvas = &mut *self.ctx.canvas;
                        canvas.save();
                        canvas.concat(matrix.inverse());
                        canvas.draw_image(&image, image.device_rect);
                        if self.ctx.checkerboard_raster_cache_images {
                            draw_checkerboard(&mut *self.ctx.canvas, image.device_rect);
                        }
                        self.ctx.canvas.restore();
                    }
                    None => self.ctx.canvas.draw_picture(&l.picture),
                }
                self.ctx.canvas.restore();
            }
            Layer::Texture(l) => match self.ctx.textures.and_then(|t| t.get_texture(l.texture_id)) {
                Some(texture) => texture.paint(&mut *self.ctx.canvas, bounds, l.freeze),
                None => log::debug!("texture {} not registered; painting nothing", l.texture_id),
            },
            Layer::PlatformView(_) => {}
            Layer::PerformanceOverlay(l) => {
                if let Some(stats) = self.ctx.overlay {
                    paint_overlay(&mut *self.ctx.canvas, l.options, l.bounds, &stats);
                }
            }
        }

        debug_assert_eq!(self.cursor, end, "paint visited a different subtree than preroll");
        self.cursor = end;
    }

    fn children(&mut self, arena: &LayerArena, id: LayerId) {
        for slot in arena.children(id) {
            match slot {
                ChildSlot::Local(c) => self.node(arena, *c),
                ChildSlot::Retained(handle) => {
                    if let Some(other) = handle.arena() {
                        self.node(other, handle.layer_id());
                    }
                }
            }
        }
    }

    fn clip_children(
        &mut self,
        arena: &LayerArena,
        id: LayerId,
        shape: &ClipShape,
        anti_alias: bool,
        save_layer: bool,
        bounds: Rect,
    ) {
        let canvas = &mut *self.ctx.canvas;
        canvas.save();
        match shape {
            ClipShape::Rect(r) => canvas.clip_rect(*r, anti_alias),
            ClipShape::RoundedRect(r) => canvas.clip_rounded_rect(*r, anti_alias),
            ClipShape::Path(p) => canvas.clip_path(p, anti_alias),
        }
        if save_layer {
            canvas.save_layer(Some(bounds), &LayerPaint::default());
            self.children(arena, id);
            self.end_layer(bounds);
        } else {
            self.children(arena, id);
        }
        self.ctx.canvas.restore();
    }

    /// Closes an offscreen layer opened by the caller.
    fn end_layer(&mut self, bounds: Rect) {
        if self.ctx.checkerboard_offscreen_layers {
            draw_checkerboard(&mut *self.ctx.canvas, bounds);
        }
        self.ctx.canvas.restore();
    }
}
