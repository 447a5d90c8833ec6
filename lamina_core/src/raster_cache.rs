// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cached rasterizations of pictures.
//!
//! Preroll tells the cache which pictures it saw and under what matrix;
//! Paint asks for a cached image and falls back to replaying the picture.
//! Whether a cache is present never changes what ends up on screen.
//!
//! ```text
//!   preroll ──prepare(picture, matrix)──► PictureRasterCache
//!                                           │ policy says yes, threshold met
//!                                           ▼
//!                                     PictureRasterizer::rasterize
//!                                           │
//!   paint ────get(picture, matrix)───► Option<RasterImage>
//!   end of frame ── sweep_after_frame() evicts entries not seen this frame
//! ```

use core::fmt;
use std::collections::HashMap;
use std::sync::Arc;

use kurbo::{Affine, Rect, Vec2};

use crate::picture::{Picture, PictureId};

/// Premultiplied RGBA8 pixels positioned in device space.
#[derive(Clone, PartialEq)]
pub struct RasterImage {
    /// Device-space rectangle the pixels cover (integer aligned).
    pub device_rect: Rect,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// `width * height * 4` bytes, row-major, premultiplied RGBA.
    pub pixels: Arc<[u8]>,
}

impl fmt::Debug for RasterImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterImage")
            .field("device_rect", &self.device_rect)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// A cache of rasterized pictures consulted by picture layers.
pub trait RasterCache {
    /// Records that `picture` is visible this frame under `matrix` and
    /// rasterizes it if the cache decides it is worth it. Returns `true` if an
    /// image is available for Paint.
    fn prepare(&mut self, picture: &Picture, matrix: &Affine, is_complex: bool, will_change: bool) -> bool;

    /// Returns the cached image for `picture` under `matrix`, if any.
    fn get(&self, picture: &Picture, matrix: &Affine) -> Option<RasterImage>;

    /// Evicts entries that were not prepared since the last sweep.
    fn sweep_after_frame(&mut self);

    /// Drops every entry.
    fn clear(&mut self);
}

/// Rasterizes a picture into device-space pixels for the cache.
///
/// Provided by the 2D backend.
pub trait PictureRasterizer {
    /// Rasterizes `picture` as it would appear drawn with `matrix`.
    fn rasterize(&mut self, picture: &Picture, matrix: &Affine) -> Option<RasterImage>;
}

impl<R: PictureRasterizer + ?Sized> PictureRasterizer for Box<R> {
    fn rasterize(&mut self, picture: &Picture, matrix: &Affine) -> Option<RasterImage> {
        (**self).rasterize(picture, matrix)
    }
}

/// Decides whether a picture is worth caching.
pub trait CachePolicy {
    /// `access_count` is the number of consecutive frames the picture has
    /// been prepared under the same matrix, including this one.
    fn should_cache(&self, picture: &Picture, is_complex: bool, will_change: bool, access_count: u32) -> bool;
}

/// Caches pictures the author marked complex and not changing, once they have
/// been seen for `access_threshold` frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComplexityPolicy {
    /// Frames a picture must be seen before it is rasterized.
    pub access_threshold: u32,
}

impl Default for ComplexityPolicy {
    fn default() -> Self {
        Self { access_threshold: 3 }
    }
}

impl CachePolicy for ComplexityPolicy {
    fn should_cache(&self, _picture: &Picture, is_complex: bool, will_change: bool, access_count: u32) -> bool {
        is_complex && !will_change && access_count >= self.access_threshold
    }
}

/// Cache key: picture identity plus the matrix with its whole-pixel
/// translation removed, so a picture that only scrolls by whole pixels keeps
/// its entry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
struct CacheKey {
    picture: PictureId,
    matrix: [u64; 6],
}

impl CacheKey {
    fn new(picture: &Picture, matrix: &Affine) -> Self {
        let mut c = matrix.as_coeffs();
        c[4] -= c[4].floor();
        c[5] -= c[5].floor();
        Self {
            picture: picture.id(),
            matrix: c.map(f64::to_bits),
        }
    }
}

fn whole_pixels(matrix: &Affine) -> Vec2 {
    let t = matrix.translation();
    Vec2::new(t.x.floor(), t.y.floor())
}

#[derive(Debug)]
struct Entry {
    access_count: u32,
    used_this_frame: bool,
    /// Whole-pixel translation the image was rasterized under.
    origin: Vec2,
    image: Option<RasterImage>,
}

/// [`RasterCache`] keyed by picture and matrix, with a pluggable
/// [`CachePolicy`].
pub struct PictureRasterCache<R, P = ComplexityPolicy> {
    rasterizer: R,
    policy: P,
    picture_limit: usize,
    entries: HashMap<CacheKey, Entry>,
    rasterized_this_frame: usize,
}

impl<R, P> fmt::Debug for PictureRasterCache<R, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PictureRasterCache")
            .field("entries", &self.entries.len())
            .field("picture_limit", &self.picture_limit)
            .finish_non_exhaustive()
    }
}

impl<R: PictureRasterizer> PictureRasterCache<R> {
    /// Creates a cache with the default [`ComplexityPolicy`].
    #[must_use]
    pub fn new(rasterizer: R, access_threshold: u32, picture_limit: usize) -> Self {
        Self::with_policy(rasterizer, ComplexityPolicy { access_threshold }, picture_limit)
    }
}

impl<R: PictureRasterizer, P: CachePolicy> PictureRasterCache<R, P> {
    /// Creates a cache with a custom policy.
    ///
    /// `picture_limit` caps how many pictures are rasterized per frame.
    #[must_use]
    pub fn with_policy(rasterizer: R, policy: P, picture_limit: usize) -> Self {
        Self {
            rasterizer,
            policy,
            picture_limit,
            entries: HashMap::new(),
            rasterized_this_frame: 0,
        }
    }

    /// Number of live entries (rasterized or still counting).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries that hold an image.
    #[must_use]
    pub fn image_count(&self) -> usize {
        self.entries.values().filter(|e| e.image.is_some()).count()
    }
}

impl<R: PictureRasterizer, P: CachePolicy> RasterCache for PictureRasterCache<R, P> {
    fn prepare(&mut self, picture: &Picture, matrix: &Affine, is_complex: bool, will_change: bool) -> bool {
        let entry = self
            .entries
            .entry(CacheKey::new(picture, matrix))
            .or_insert(Entry {
                access_count: 0,
                used_this_frame: false,
                origin: Vec2::ZERO,
                image: None,
            });
        if !entry.used_this_frame {
            entry.access_count = entry.access_count.saturating_add(1);
            entry.used_this_frame = true;
        }
        if entry.image.is_some() {
            return true;
        }
        if self.rasterized_this_frame >= self.picture_limit
            || !self
                .policy
                .should_cache(picture, is_complex, will_change, entry.access_count)
        {
            return false;
        }
        entry.image = self.rasterizer.rasterize(picture, matrix);
        entry.origin = whole_pixels(matrix);
        if entry.image.is_some() {
            self.rasterized_this_frame += 1;
            log::debug!("raster cache: rasterized {:?}", picture.id());
        }
        entry.image.is_some()
    }

    fn get(&self, picture: &Picture, matrix: &Affine) -> Option<RasterImage> {
        let entry = self.entries.get(&CacheKey::new(picture, matrix))?;
        let mut image = entry.image.clone()?;
        image.device_rect = image.device_rect + (whole_pixels(matrix) - entry.origin);
        Some(image)
    }

    fn sweep_after_frame(&mut self) {
        self.entries.retain(|_, e| e.used_this_frame);
        for e in self.entries.values_mut() {
            e.used_this_frame = false;
        }
        self.rasterized_this_frame = 0;
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.rasterized_this_frame = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paint::Color;
    use crate::picture::PictureRecorder;

    /// Produces a 1-pixel image at the matrix-mapped cull rect and counts calls.
    #[derive(Default)]
    struct CountingRasterizer {
        calls: u32,
    }

    impl PictureRasterizer for CountingRasterizer {
        fn rasterize(&mut self, picture: &Picture, matrix: &Affine) -> Option<RasterImage> {
            self.calls += 1;
            Some(RasterImage {
                device_rect: matrix.transform_rect_bbox(picture.cull_rect()),
                width: 1,
                height: 1,
                pixels: Arc::from(vec![0_u8; 4]),
            })
        }
    }

    fn picture() -> Picture {
        let mut rec = PictureRecorder::new();
        rec.fill_rect(Rect::new(0.0, 0.0, 10.0, 10.0), Color::from_rgba8(0, 128, 0, 255));
        rec.finish()
    }

    fn frame(cache: &mut PictureRasterCache<CountingRasterizer>, pic: &Picture, m: &Affine, complex: bool) -> bool {
        let hit = cache.prepare(pic, m, complex, false);
        cache.sweep_after_frame();
        hit
    }

    #[test]
    fn caches_complex_picture_after_threshold() {
        let mut cache = PictureRasterCache::new(CountingRasterizer::default(), 2, 8);
        let pic = picture();
        let m = Affine::IDENTITY;
        assert!(!frame(&mut cache, &pic, &m, true), "first sighting only counts");
        assert!(frame(&mut cache, &pic, &m, true), "second sighting rasterizes");
        assert!(frame(&mut cache, &pic, &m, true), "third sighting hits");
        assert_eq!(cache.rasterizer.calls, 1, "rasterized exactly once");
    }

    #[test]
    fn simple_or_changing_pictures_are_not_cached() {
        let mut cache = PictureRasterCache::new(CountingRasterizer::default(), 1, 8);
        let pic = picture();
        assert!(!cache.prepare(&pic, &Affine::IDENTITY, false, false), "not complex");
        assert!(!cache.prepare(&pic, &Affine::IDENTITY, true, true), "will change");
        assert_eq!(cache.image_count(), 0, "no images");
    }

    #[test]
    fn whole_pixel_scroll_reuses_entry() {
        let mut cache = PictureRasterCache::new(CountingRasterizer::default(), 1, 8);
        let pic = picture();
        let a = Affine::translate((0.25, 3.0));
        let b = Affine::translate((5.25, -2.0));
        assert!(cache.prepare(&pic, &a, true, false), "rasterized at a");
        let img = cache.get(&pic, &b).expect("same fractional offset shares the entry");
        assert_eq!(img.device_rect, Rect::new(5.25, -2.0, 15.25, 8.0), "shifted by whole pixels");
        assert!(cache.get(&pic, &Affine::translate((0.5, 3.0))).is_none(), "fraction differs");
    }

    #[test]
    fn sweep_evicts_unused_entries() {
        let mut cache = PictureRasterCache::new(CountingRasterizer::default(), 1, 8);
        let pic = picture();
        frame(&mut cache, &pic, &Affine::IDENTITY, true);
        assert_eq!(cache.len(), 1, "entry survives the frame it was used in");
        cache.sweep_after_frame();
        assert!(cache.is_empty(), "entry not prepared in the next frame is evicted");
    }

    #[test]
    fn picture_limit_caps_rasterizations_per_frame() {
        let mut cache = PictureRasterCache::new(CountingRasterizer::default(), 1, 1);
        let (a, b) = (picture(), picture());
        assert!(cache.prepare(&a, &Affine::IDENTITY, true, false), "first fits the budget");
        assert!(!cache.prepare(&b, &Affine::IDENTITY, true, false), "second exceeds it");
        cache.sweep_after_frame();
        assert!(cache.prepare(&b, &Affine::IDENTITY, true, false), "budget resets next frame");
    }
}
