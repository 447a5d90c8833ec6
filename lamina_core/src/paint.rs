// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Paint parameters carried by effect layers.
//!
//! Colors and blend modes come from `peniko`; the filters and shaders here are
//! the small closed set that scene builders can push.

use kurbo::{Point, Rect};
use smallvec::SmallVec;

pub use peniko::{BlendMode, Color, Compose, Mix};

/// Color transformation applied to a layer's composited content.
#[derive(Clone, Debug, PartialEq)]
pub enum ColorFilter {
    /// Blends a constant color onto each pixel with the given mode.
    Blend {
        /// Constant source color.
        color: Color,
        /// How the color combines with the content.
        mode: BlendMode,
    },
    /// 4×5 row-major color matrix over unpremultiplied `[r, g, b, a, 1]`.
    ///
    /// The fifth column is an offset in `0.0..=1.0` units.
    Matrix([f32; 20]),
}

impl ColorFilter {
    /// Applies the filter to one unpremultiplied RGBA color.
    #[must_use]
    pub fn apply(&self, rgba: [f32; 4]) -> [f32; 4] {
        match self {
            Self::Matrix(m) => {
                let mut out = [0.0_f32; 4];
                for (row, o) in out.iter_mut().enumerate() {
                    let r = &m[row * 5..row * 5 + 5];
                    *o = (r[0] * rgba[0] + r[1] * rgba[1] + r[2] * rgba[2] + r[3] * rgba[3] + r[4])
                        .clamp(0.0, 1.0);
                }
                out
            }
            Self::Blend { color, mode } => {
                let src = color.components;
                match mode.compose {
                    Compose::SrcIn => [src[0], src[1], src[2], src[3] * rgba[3]],
                    Compose::DestIn => [rgba[0], rgba[1], rgba[2], rgba[3] * src[3]],
                    Compose::Copy => src,
                    _ => {
                        let a = src[3] + rgba[3] * (1.0 - src[3]);
                        if a <= 0.0 {
                            return [0.0; 4];
                        }
                        let mix = |s: f32, d: f32| (s * src[3] + d * rgba[3] * (1.0 - src[3])) / a;
                        [mix(src[0], rgba[0]), mix(src[1], rgba[1]), mix(src[2], rgba[2]), a]
                    }
                }
            }
        }
    }
}

/// Spatial filter applied to a layer's content or to its backdrop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ImageFilter {
    /// Gaussian blur with per-axis standard deviations.
    Blur {
        /// Horizontal sigma in local units.
        sigma_x: f64,
        /// Vertical sigma in local units.
        sigma_y: f64,
    },
    /// Offsets content by a fixed amount.
    Offset {
        /// Horizontal shift.
        dx: f64,
        /// Vertical shift.
        dy: f64,
    },
}

impl ImageFilter {
    /// Maps content bounds to the bounds the filter can touch.
    ///
    /// A blur spreads three sigmas in each direction.
    #[must_use]
    pub fn map_bounds(&self, bounds: Rect) -> Rect {
        match *self {
            Self::Blur { sigma_x, sigma_y } => bounds.inflate(sigma_x.abs() * 3.0, sigma_y.abs() * 3.0),
            Self::Offset { dx, dy } => bounds + kurbo::Vec2::new(dx, dy),
        }
    }
}

/// Source of color for mask and rect fills.
#[derive(Clone, Debug, PartialEq)]
pub enum Shader {
    /// A single color everywhere.
    Solid(Color),
    /// Two or more stops interpolated along a line, clamped at the ends.
    LinearGradient {
        /// Point where offset `0.0` lands.
        start: Point,
        /// Point where offset `1.0` lands.
        end: Point,
        /// `(offset, color)` pairs sorted by offset.
        stops: SmallVec<[(f32, Color); 4]>,
    },
}

impl Shader {
    /// Evaluates the shader at a point in the shader's coordinate space,
    /// returning unpremultiplied RGBA.
    #[must_use]
    pub fn color_at(&self, p: Point) -> [f32; 4] {
        match self {
            Self::Solid(c) => c.components,
            Self::LinearGradient { start, end, stops } => {
                let Some(first) = stops.first() else {
                    return [0.0; 4];
                };
                let axis = *end - *start;
                let len2 = axis.hypot2();
                #[expect(clippy::cast_possible_truncation, reason = "gradient offsets are f32 by convention")]
                let t = if len2 > 0.0 { ((p - *start).dot(axis) / len2) as f32 } else { 0.0 };
                if t <= first.0 {
                    return first.1.components;
                }
                for pair in stops.windows(2) {
                    let (t0, c0) = pair[0];
                    let (t1, c1) = pair[1];
                    if t <= t1 {
                        let f = if t1 > t0 { (t - t0) / (t1 - t0) } else { 1.0 };
                        let (a, b) = (c0.components, c1.components);
                        return core::array::from_fn(|i| a[i] + (b[i] - a[i]) * f);
                    }
                }
                stops.last().map_or([0.0; 4], |s| s.1.components)
            }
        }
    }
}

/// Parameters for an offscreen layer opened with `save_layer`.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerPaint {
    /// Group opacity applied when the layer is composited, `0..=255`.
    pub alpha: u8,
    /// How the layer composites onto what is below it.
    pub blend: BlendMode,
    /// Color filter applied to the layer's content.
    pub color_filter: Option<ColorFilter>,
    /// Image filter applied to the layer's content.
    pub image_filter: Option<ImageFilter>,
    /// Filter applied to the backdrop before the layer's content is drawn.
    pub backdrop: Option<ImageFilter>,
}

impl Default for LayerPaint {
    fn default() -> Self {
        Self {
            alpha: 255,
            blend: BlendMode::default(),
            color_filter: None,
            image_filter: None,
            backdrop: None,
        }
    }
}

impl LayerPaint {
    /// A plain group with the given opacity.
    #[must_use]
    pub fn with_alpha(alpha: u8) -> Self {
        Self {
            alpha,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn blur_inflates_by_three_sigma() {
        let r = Rect::new(10.0, 10.0, 20.0, 20.0);
        let f = ImageFilter::Blur { sigma_x: 2.0, sigma_y: 1.0 };
        assert_eq!(f.map_bounds(r), Rect::new(4.0, 7.0, 26.0, 23.0), "3 sigma on each side");
    }

    #[test]
    fn identity_matrix_filter_is_noop() {
        let mut m = [0.0_f32; 20];
        m[0] = 1.0;
        m[6] = 1.0;
        m[12] = 1.0;
        m[18] = 1.0;
        let c = [0.25, 0.5, 0.75, 1.0];
        assert_eq!(ColorFilter::Matrix(m).apply(c), c, "identity matrix passes through");
    }

    #[test]
    fn gradient_clamps_and_interpolates() {
        let shader = Shader::LinearGradient {
            start: Point::new(0.0, 0.0),
            end: Point::new(10.0, 0.0),
            stops: smallvec![
                (0.0, Color::from_rgba8(0, 0, 0, 255)),
                (1.0, Color::from_rgba8(255, 255, 255, 255)),
            ],
        };
        assert_eq!(shader.color_at(Point::new(-5.0, 0.0))[0], 0.0, "clamped before start");
        assert_eq!(shader.color_at(Point::new(20.0, 3.0))[0], 1.0, "clamped after end");
        let mid = shader.color_at(Point::new(5.0, 0.0))[0];
        assert!((mid - 0.5).abs() < 1e-6, "midpoint interpolates, got {mid}");
    }

    #[test]
    fn layer_paint_default_is_opaque_src_over() {
        let p = LayerPaint::default();
        assert_eq!(p.alpha, 255, "default alpha is opaque");
        assert_eq!(p.blend, BlendMode::new(Mix::Normal, Compose::SrcOver), "default blend");
        assert_eq!(LayerPaint::with_alpha(9).alpha, 9, "with_alpha sets alpha");
    }
}
