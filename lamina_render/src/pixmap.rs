// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! CPU rasterizer over a premultiplied RGBA pixmap.
//!
//! Coverage is binary: a pixel is painted when its center falls inside the
//! shape and the clip. That is enough to make pixel assertions exact and to
//! keep cached and uncached pictures bit-identical.

use core::fmt;
use std::sync::Arc;

use kurbo::{Affine, BezPath, Point, Rect, RoundedRect, Shape, Size};
use lamina_core::canvas::Canvas;
use lamina_core::paint::{BlendMode, Color, Compose, ImageFilter, LayerPaint, Shader};
use lamina_core::picture::Picture;
use lamina_core::raster_cache::{PictureRasterizer, RasterImage};

type Premul = [f32; 4];

/// A grid of premultiplied RGBA pixels.
#[derive(Clone, PartialEq)]
pub struct Pixmap {
    width: u32,
    height: u32,
    data: Vec<Premul>,
}

impl fmt::Debug for Pixmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pixmap({}x{})", self.width, self.height)
    }
}

impl Pixmap {
    /// Creates a transparent pixmap.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![[0.0; 4]; width as usize * height as usize],
        }
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Size in pixels.
    #[must_use]
    pub fn size(&self) -> Size {
        Size::new(f64::from(self.width), f64::from(self.height))
    }

    /// The whole pixmap as a rectangle.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        self.size().to_rect()
    }

    /// Overwrites every pixel with `color`.
    pub fn fill(&mut self, color: Color) {
        let c = premultiply(color.components);
        self.data.fill(c);
    }

    /// Premultiplied value at `(x, y)`.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<Premul> {
        self.index(x, y).map(|i| self.data[i])
    }

    /// Unpremultiplied 8-bit value at `(x, y)`.
    #[must_use]
    pub fn pixel_rgba8(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.pixel(x, y).map(|p| unpremultiply(p).map(quantize))
    }

    /// Unpremultiplied RGBA8 bytes, row-major.
    #[must_use]
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.data.iter().flat_map(|p| unpremultiply(*p).map(quantize)).collect()
    }

    /// Premultiplied RGBA8 bytes, row-major.
    #[must_use]
    pub fn to_premul_rgba8(&self) -> Vec<u8> {
        self.data.iter().flat_map(|p| p.map(quantize)).collect()
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y as usize * self.width as usize + x as usize)
    }

    /// Calls `f` with the center and storage of every pixel in `region`.
    fn for_each_in(&mut self, region: Rect, mut f: impl FnMut(Point, &mut Premul)) {
        let Some((x0, y0, x1, y1)) = pixel_span(region.intersect(self.bounds())) else {
            return;
        };
        let w = self.width as usize;
        for y in y0..y1 {
            for x in x0..x1 {
                let p = Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
                f(p, &mut self.data[y as usize * w + x as usize]);
            }
        }
    }
}

/// Integer pixel range covering `r`, or `None` if it covers nothing.
#[expect(clippy::cast_possible_truncation, reason = "callers intersect with the pixmap bounds first")]
fn pixel_span(r: Rect) -> Option<(u32, u32, u32, u32)> {
    if !(r.width() > 0.0 && r.height() > 0.0) {
        return None;
    }
    let r = Rect::new(r.x0.max(0.0), r.y0.max(0.0), r.x1.max(0.0), r.y1.max(0.0));
    Some((
        r.x0.floor() as u32,
        r.y0.floor() as u32,
        r.x1.ceil() as u32,
        r.y1.ceil() as u32,
    ))
}

#[expect(clippy::cast_possible_truncation, reason = "clamped to 0..=255")]
fn quantize(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn premultiply(c: [f32; 4]) -> Premul {
    [c[0] * c[3], c[1] * c[3], c[2] * c[3], c[3]]
}

fn unpremultiply(p: Premul) -> [f32; 4] {
    if p[3] <= 0.0 {
        return [0.0; 4];
    }
    [p[0] / p[3], p[1] / p[3], p[2] / p[3], p[3]]
}

/// Porter-Duff composition of premultiplied colors.
fn compose(src: Premul, dst: Premul, mode: Compose) -> Premul {
    let (sa, da) = (src[3], dst[3]);
    let (fs, fd) = match mode {
        Compose::Clear => (0.0, 0.0),
        Compose::Copy => (1.0, 0.0),
        Compose::Dest => (0.0, 1.0),
        Compose::DestOver => (1.0 - da, 1.0),
        Compose::SrcIn => (da, 0.0),
        Compose::DestIn => (0.0, sa),
        Compose::SrcOut => (1.0 - da, 0.0),
        Compose::DestOut => (0.0, 1.0 - sa),
        Compose::SrcAtop => (da, 1.0 - sa),
        Compose::DestAtop => (1.0 - da, sa),
        Compose::Xor => (1.0 - da, 1.0 - sa),
        Compose::Plus => (1.0, 1.0),
        _ => (1.0, 1.0 - sa),
    };
    core::array::from_fn(|i| (src[i] * fs + dst[i] * fd).min(1.0))
}

#[derive(Clone, Debug)]
struct State {
    transform: Affine,
    /// Device-space clip bounds.
    clip: Rect,
    /// Device-space shapes every painted pixel must also fall inside.
    masks: Vec<BezPath>,
    opens_layer: bool,
}

impl State {
    fn admits(&self, p: Point) -> bool {
        self.clip.contains(p) && self.masks.iter().all(|m| m.contains(p))
    }
}

#[derive(Debug)]
struct Offscreen {
    pixels: Pixmap,
    paint: LayerPaint,
    region: Rect,
}

/// A [`Canvas`] that rasterizes into a [`Pixmap`].
pub struct PixmapCanvas<'p> {
    target: &'p mut Pixmap,
    states: Vec<State>,
    layers: Vec<Offscreen>,
}

impl fmt::Debug for PixmapCanvas<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixmapCanvas")
            .field("target", &self.target)
            .field("save_count", &self.states.len())
            .field("layers", &self.layers.len())
            .finish()
    }
}

impl<'p> PixmapCanvas<'p> {
    /// Creates a canvas drawing into `target` with an identity transform and
    /// no clip.
    pub fn new(target: &'p mut Pixmap) -> Self {
        let clip = target.bounds();
        Self {
            target,
            states: vec![State {
                transform: Affine::IDENTITY,
                clip,
                masks: Vec::new(),
                opens_layer: false,
            }],
            layers: Vec::new(),
        }
    }

    fn state(&self) -> &State {
        // The base state is never popped.
        &self.states[self.states.len() - 1]
    }

    fn state_mut(&mut self) -> &mut State {
        let last = self.states.len() - 1;
        &mut self.states[last]
    }

    /// Fills the device-space `shape` with colors from `shade`.
    fn fill(&mut self, shape: &BezPath, compose_mode: Compose, mut shade: impl FnMut(Point) -> Premul) {
        let Self { target, states, layers } = self;
        let state = &states[states.len() - 1];
        let dest = match layers.last_mut() {
            Some(layer) => &mut layer.pixels,
            None => &mut **target,
        };
        let region = shape.bounding_box().intersect(state.clip);
        dest.for_each_in(region, |p, px| {
            if state.admits(p) && shape.contains(p) {
                *px = compose(shade(p), *px, compose_mode);
            }
        });
    }

    fn intersect_clip(&mut self, local: &BezPath, rect: Option<Rect>) {
        let transform = self.state().transform;
        let [a, b, c, d, _, _] = transform.as_coeffs();
        let state = self.state_mut();
        match rect {
            Some(r) if b == 0.0 && c == 0.0 && a != 0.0 && d != 0.0 => {
                state.clip = state.clip.intersect(transform.transform_rect_bbox(r));
            }
            _ => {
                let device = transform * local.clone();
                state.clip = state.clip.intersect(device.bounding_box());
                state.masks.push(device);
            }
        }
        if !(state.clip.width() > 0.0 && state.clip.height() > 0.0) {
            state.clip = Rect::ZERO;
        }
    }
}

impl Canvas for PixmapCanvas<'_> {
    fn save(&mut self) {
        let mut next = self.state().clone();
        next.opens_layer = false;
        self.states.push(next);
    }

    fn save_layer(&mut self, bounds: Option<Rect>, paint: &LayerPaint) {
        let state = self.state().clone();
        let region = match bounds {
            Some(b) => state.clip.intersect(state.transform.transform_rect_bbox(b)),
            None => state.clip,
        };
        if let Some(filter) = paint.backdrop {
            let dest = match self.layers.last_mut() {
                Some(layer) => &mut layer.pixels,
                None => &mut *self.target,
            };
            let filtered = apply_image_filter(dest, filter, state.transform);
            dest.for_each_in(region, |p, px| {
                if state.admits(p) {
                    if let Some(v) = sample(&filtered, p) {
                        *px = v;
                    }
                }
            });
        }
        self.layers.push(Offscreen {
            pixels: Pixmap::new(self.target.width, self.target.height),
            paint: paint.clone(),
            region,
        });
        self.states.push(State {
            opens_layer: true,
            ..state
        });
    }

    fn restore(&mut self) {
        if self.states.len() <= 1 {
            log::warn!("restore on an empty save stack ignored");
            return;
        }
        let Some(state) = self.states.pop() else {
            return;
        };
        if !state.opens_layer {
            return;
        }
        let Some(Offscreen { pixels, paint, region }) = self.layers.pop() else {
            return;
        };
        let transform = state.transform;
        let src = match paint.image_filter {
            Some(filter) => apply_image_filter(&pixels, filter, transform),
            None => pixels,
        };
        let alpha = f32::from(paint.alpha) / 255.0;
        let mode = paint.blend.compose;
        let dest = match self.layers.last_mut() {
            Some(layer) => &mut layer.pixels,
            None => &mut *self.target,
        };
        dest.for_each_in(region, |p, px| {
            let Some(mut c) = sample(&src, p) else {
                return;
            };
            if let Some(filter) = &paint.color_filter {
                c = premultiply(filter.apply(unpremultiply(c)));
            }
            let c = c.map(|v| v * alpha);
            *px = compose(c, *px, mode);
        });
    }

    fn save_count(&self) -> usize {
        self.states.len()
    }

    fn concat(&mut self, transform: Affine) {
        let state = self.state_mut();
        state.transform = state.transform * transform;
    }

    fn total_transform(&self) -> Affine {
        self.state().transform
    }

    fn clip_rect(&mut self, rect: Rect, _anti_alias: bool) {
        self.intersect_clip(&rect.to_path(0.1), Some(rect));
    }

    fn clip_rounded_rect(&mut self, rect: RoundedRect, _anti_alias: bool) {
        self.intersect_clip(&rect.to_path(0.1), None);
    }

    fn clip_path(&mut self, path: &BezPath, _anti_alias: bool) {
        self.intersect_clip(path, None);
    }

    fn draw_rect(&mut self, rect: Rect, shader: &Shader, blend: BlendMode) {
        let transform = self.state().transform;
        let inverse = transform.inverse();
        let device = transform * rect.to_path(0.1);
        self.fill(&device, blend.compose, |p| premultiply(shader.color_at(inverse * p)));
    }

    fn draw_path(&mut self, path: &BezPath, color: Color) {
        let device = self.state().transform * path.clone();
        let c = premultiply(color.components);
        self.fill(&device, Compose::SrcOver, |_| c);
    }

    fn draw_shadow(&mut self, path: &BezPath, color: Color, elevation: f64, transparent_occluder: bool) {
        if elevation <= 0.0 {
            return;
        }
        let shift = Affine::translate((0.0, elevation * 0.5));
        let device = self.state().transform * (shift * path.clone());
        let mut c = color.components;
        c[3] *= if transparent_occluder { 0.15 } else { 0.25 };
        let c = premultiply(c);
        self.fill(&device, Compose::SrcOver, |_| c);
    }

    fn draw_image(&mut self, image: &RasterImage, dst: Rect) {
        if image.width == 0 || image.height == 0 || dst.width() <= 0.0 || dst.height() <= 0.0 {
            return;
        }
        let transform = self.state().transform;
        let inverse = transform.inverse();
        let device = transform * dst.to_path(0.1);
        let sx = f64::from(image.width) / dst.width();
        let sy = f64::from(image.height) / dst.height();
        let pixels = Arc::clone(&image.pixels);
        let (w, h) = (image.width, image.height);
        self.fill(&device, Compose::SrcOver, |p| {
            let local = inverse * p;
            let u = clamp_index((local.x - dst.x0) * sx, w);
            let v = clamp_index((local.y - dst.y0) * sy, h);
            let i = (v as usize * w as usize + u as usize) * 4;
            pixels
                .get(i..i + 4)
                .map_or([0.0; 4], |px| core::array::from_fn(|k| f32::from(px[k]) / 255.0))
        });
    }
}

#[expect(clippy::cast_possible_truncation, reason = "clamped to the image")]
fn clamp_index(v: f64, len: u32) -> u32 {
    (v.floor().max(0.0) as u32).min(len.saturating_sub(1))
}

/// Reads the pixel whose center is `p`.
#[expect(clippy::cast_possible_truncation, reason = "checked non-negative")]
fn sample(src: &Pixmap, p: Point) -> Option<Premul> {
    if p.x < 0.0 || p.y < 0.0 {
        return None;
    }
    src.pixel(p.x.floor() as u32, p.y.floor() as u32)
}

/// Filters a whole pixmap. Offsets and blur radii are scaled by `transform`.
fn apply_image_filter(src: &Pixmap, filter: ImageFilter, transform: Affine) -> Pixmap {
    let [a, b, c, d, _, _] = transform.as_coeffs();
    let scale_x = a.hypot(b);
    let scale_y = c.hypot(d);
    match filter {
        ImageFilter::Offset { dx, dy } => {
            let moved = transform * Point::new(dx, dy) - transform * Point::ZERO;
            let mut out = Pixmap::new(src.width, src.height);
            out.for_each_in(src.bounds(), |p, px| {
                if let Some(v) = sample(src, p - moved) {
                    *px = v;
                }
            });
            out
        }
        ImageFilter::Blur { sigma_x, sigma_y } => {
            let horizontal = box_blur(src, blur_radius(sigma_x * scale_x), true);
            box_blur(&horizontal, blur_radius(sigma_y * scale_y), false)
        }
    }
}

#[expect(clippy::cast_possible_truncation, reason = "small positive radius")]
fn blur_radius(sigma: f64) -> usize {
    (sigma.abs() * 1.5).round().min(256.0) as usize
}

/// One pass of a box blur along a row or a column.
fn box_blur(src: &Pixmap, radius: usize, horizontal: bool) -> Pixmap {
    if radius == 0 {
        return src.clone();
    }
    let (w, h) = (src.width as usize, src.height as usize);
    let mut out = Pixmap::new(src.width, src.height);
    let norm = 1.0 / (2 * radius + 1) as f32;
    let (lines, len) = if horizontal { (h, w) } else { (w, h) };
    let at = |line: usize, k: usize| if horizontal { line * w + k } else { k * w + line };
    for line in 0..lines {
        for k in 0..len {
            let lo = k.saturating_sub(radius);
            let hi = (k + radius + 1).min(len);
            let mut acc = [0.0_f32; 4];
            for j in lo..hi {
                let v = src.data[at(line, j)];
                for (a, v) in acc.iter_mut().zip(v) {
                    *a += v;
                }
            }
            out.data[at(line, k)] = acc.map(|v| v * norm);
        }
    }
    out
}

/// Rasterizes pictures into [`RasterImage`]s for the raster cache.
#[derive(Clone, Copy, Debug)]
pub struct PixmapPictureRasterizer {
    max_dimension: u32,
}

impl Default for PixmapPictureRasterizer {
    fn default() -> Self {
        Self { max_dimension: 4096 }
    }
}

impl PixmapPictureRasterizer {
    /// Creates a rasterizer that refuses images wider or taller than
    /// `max_dimension` pixels.
    #[must_use]
    pub fn new(max_dimension: u32) -> Self {
        Self { max_dimension }
    }
}

impl PictureRasterizer for PixmapPictureRasterizer {
    fn rasterize(&mut self, picture: &Picture, matrix: &Affine) -> Option<RasterImage> {
        let device = matrix.transform_rect_bbox(picture.cull_rect());
        let rect = Rect::new(device.x0.floor(), device.y0.floor(), device.x1.ceil(), device.y1.ceil());
        if !(rect.width() > 0.0 && rect.height() > 0.0) || rect.width() > f64::from(self.max_dimension) {
            return None;
        }
        if rect.height() > f64::from(self.max_dimension) {
            return None;
        }
        let (w, h) = pixel_dims(rect.size());
        let mut pixmap = Pixmap::new(w, h);
        {
            let mut canvas = PixmapCanvas::new(&mut pixmap);
            canvas.concat(Affine::translate(-rect.origin().to_vec2()) * *matrix);
            canvas.draw_picture(picture);
        }
        log::trace!("rasterized {:?} into {w}x{h}", picture.id());
        Some(RasterImage {
            device_rect: rect,
            width: w,
            height: h,
            pixels: pixmap.to_premul_rgba8().into(),
        })
    }
}

#[expect(clippy::cast_possible_truncation, reason = "bounded by max_dimension")]
fn pixel_dims(size: Size) -> (u32, u32) {
    (size.width as u32, size.height as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Vec2;
    use lamina_core::picture::PictureRecorder;

    const RED: Color = Color::from_rgba8(255, 0, 0, 255);
    const WHITE: Color = Color::from_rgba8(255, 255, 255, 255);

    fn red_square(size: f64) -> Picture {
        let mut rec = PictureRecorder::new();
        rec.fill_rect(Rect::new(0.0, 0.0, size, size), RED);
        rec.finish()
    }

    #[test]
    fn fill_rect_covers_pixel_centers() {
        let mut pm = Pixmap::new(4, 4);
        let mut c = PixmapCanvas::new(&mut pm);
        c.draw_rect(Rect::new(1.0, 1.0, 3.0, 3.0), &Shader::Solid(RED), BlendMode::default());
        drop(c);
        assert_eq!(pm.pixel_rgba8(1, 1), Some([255, 0, 0, 255]), "inside");
        assert_eq!(pm.pixel_rgba8(0, 0), Some([0, 0, 0, 0]), "outside");
        assert_eq!(pm.pixel_rgba8(3, 3), Some([0, 0, 0, 0]), "right/bottom edge excluded");
    }

    #[test]
    fn save_layer_alpha_blends_half() {
        let mut pm = Pixmap::new(2, 2);
        pm.fill(WHITE);
        let mut c = PixmapCanvas::new(&mut pm);
        c.save_layer(None, &LayerPaint::with_alpha(128));
        c.draw_rect(Rect::new(0.0, 0.0, 2.0, 2.0), &Shader::Solid(RED), BlendMode::default());
        c.restore();
        drop(c);
        let [r, g, b, a] = pm.pixel_rgba8(0, 0).expect("in range");
        assert_eq!((r, a), (255, 255), "red over white stays opaque");
        assert!(g.abs_diff(127) <= 1 && b.abs_diff(127) <= 1, "half blend, got {g} {b}");
    }

    #[test]
    fn clip_rect_restricts_and_restores() {
        let mut pm = Pixmap::new(4, 4);
        let mut c = PixmapCanvas::new(&mut pm);
        c.save();
        c.clip_rect(Rect::new(0.0, 0.0, 2.0, 2.0), true);
        c.draw_rect(Rect::new(0.0, 0.0, 4.0, 4.0), &Shader::Solid(RED), BlendMode::default());
        c.restore();
        assert_eq!(c.save_count(), 1, "balanced");
        drop(c);
        assert_eq!(pm.pixel_rgba8(1, 1), Some([255, 0, 0, 255]), "inside clip");
        assert_eq!(pm.pixel_rgba8(2, 2), Some([0, 0, 0, 0]), "clipped away");
    }

    #[test]
    fn rounded_clip_masks_corners() {
        let mut pm = Pixmap::new(10, 10);
        let mut c = PixmapCanvas::new(&mut pm);
        c.clip_rounded_rect(RoundedRect::new(0.0, 0.0, 10.0, 10.0, 5.0), true);
        c.draw_rect(Rect::new(0.0, 0.0, 10.0, 10.0), &Shader::Solid(RED), BlendMode::default());
        drop(c);
        assert_eq!(pm.pixel_rgba8(0, 0).map(|p| p[3]), Some(0), "corner masked");
        assert_eq!(pm.pixel_rgba8(5, 5).map(|p| p[3]), Some(255), "center painted");
    }

    #[test]
    fn dest_in_masks_layer() {
        let mut pm = Pixmap::new(4, 1);
        let mut c = PixmapCanvas::new(&mut pm);
        c.save_layer(None, &LayerPaint::default());
        c.draw_rect(Rect::new(0.0, 0.0, 4.0, 1.0), &Shader::Solid(RED), BlendMode::default());
        let mask = Shader::Solid(Color::from_rgba8(0, 0, 0, 0));
        c.draw_rect(
            Rect::new(2.0, 0.0, 4.0, 1.0),
            &mask,
            BlendMode::new(lamina_core::paint::Mix::Normal, Compose::DestIn),
        );
        c.restore();
        drop(c);
        assert_eq!(pm.pixel_rgba8(0, 0), Some([255, 0, 0, 255]), "unmasked");
        assert_eq!(pm.pixel_rgba8(3, 0), Some([0, 0, 0, 0]), "masked out");
    }

    #[test]
    fn cached_image_matches_direct_draw() {
        let pic = red_square(3.0);
        let matrix = Affine::translate(Vec2::new(2.0, 1.0));

        let mut direct = Pixmap::new(8, 8);
        {
            let mut c = PixmapCanvas::new(&mut direct);
            c.concat(matrix);
            c.draw_picture(&pic);
        }

        let image = PixmapPictureRasterizer::default()
            .rasterize(&pic, &matrix)
            .expect("small picture rasterizes");
        assert_eq!(image.device_rect, Rect::new(2.0, 1.0, 5.0, 4.0), "device placement");
        let mut cached = Pixmap::new(8, 8);
        {
            let mut c = PixmapCanvas::new(&mut cached);
            c.draw_image(&image, image.device_rect);
        }
        assert_eq!(direct.to_rgba8(), cached.to_rgba8(), "identical pixels");
    }

    #[test]
    fn offset_filter_moves_content() {
        let mut pm = Pixmap::new(4, 1);
        let mut c = PixmapCanvas::new(&mut pm);
        let paint = LayerPaint {
            image_filter: Some(ImageFilter::Offset { dx: 2.0, dy: 0.0 }),
            ..LayerPaint::default()
        };
        c.save_layer(None, &paint);
        c.draw_rect(Rect::new(0.0, 0.0, 1.0, 1.0), &Shader::Solid(RED), BlendMode::default());
        c.restore();
        drop(c);
        assert_eq!(pm.pixel_rgba8(0, 0).map(|p| p[3]), Some(0), "moved away");
        assert_eq!(pm.pixel_rgba8(2, 0), Some([255, 0, 0, 255]), "moved here");
    }
}
