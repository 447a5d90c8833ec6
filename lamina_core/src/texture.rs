// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! External textures referenced by texture layers.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use kurbo::Rect;

use crate::canvas::Canvas;
use crate::paint::{BlendMode, Color, Shader};

/// Content produced outside the layer tree (video, camera, GPU surfaces).
pub trait Texture: Send + Sync {
    /// Identifier texture layers refer to.
    fn id(&self) -> i64;

    /// Draws the current content into `bounds`.
    ///
    /// With `freeze` set, the texture keeps showing the frame it showed last
    /// instead of picking up a new one.
    fn paint(&self, canvas: &mut dyn Canvas, bounds: Rect, freeze: bool);

    /// Called when the producer signals that a new frame is ready.
    fn mark_new_frame_available(&self) {}
}

/// Lookup of textures by id during Paint.
pub trait TextureRegistry {
    /// Returns the texture registered under `id`.
    fn get_texture(&self, id: i64) -> Option<Arc<dyn Texture>>;
}

/// A plain map-backed [`TextureRegistry`].
#[derive(Default)]
pub struct TextureMap {
    textures: HashMap<i64, Arc<dyn Texture>>,
}

impl core::fmt::Debug for TextureMap {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut ids: Vec<_> = self.textures.keys().copied().collect();
        ids.sort_unstable();
        f.debug_struct("TextureMap").field("ids", &ids).finish()
    }
}

impl TextureMap {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `texture` under its own id, replacing any previous entry.
    pub fn register(&mut self, texture: Arc<dyn Texture>) {
        self.textures.insert(texture.id(), texture);
    }

    /// Removes the texture registered under `id`.
    pub fn unregister(&mut self, id: i64) -> Option<Arc<dyn Texture>> {
        self.textures.remove(&id)
    }

    /// Forwards a new-frame notification. Returns `false` for unknown ids.
    pub fn mark_frame_available(&self, id: i64) -> bool {
        match self.textures.get(&id) {
            Some(t) => {
                t.mark_new_frame_available();
                true
            }
            None => false,
        }
    }

    /// Number of registered textures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

impl TextureRegistry for TextureMap {
    fn get_texture(&self, id: i64) -> Option<Arc<dyn Texture>> {
        self.textures.get(&id).cloned()
    }
}

/// A texture that fills its bounds with one color, switching to a second
/// color once a new frame has been marked available.
///
/// Handy for hosts that need a placeholder and for exercising texture layers.
#[derive(Debug)]
pub struct SolidTexture {
    id: i64,
    colors: [Color; 2],
    new_frame: AtomicBool,
    shown: AtomicBool,
}

impl SolidTexture {
    /// Creates a texture showing `first` until a frame is marked available,
    /// then `next`.
    #[must_use]
    pub fn new(id: i64, first: Color, next: Color) -> Self {
        Self {
            id,
            colors: [first, next],
            new_frame: AtomicBool::new(false),
            shown: AtomicBool::new(false),
        }
    }
}

impl Texture for SolidTexture {
    fn id(&self) -> i64 {
        self.id
    }

    fn paint(&self, canvas: &mut dyn Canvas, bounds: Rect, freeze: bool) {
        if !freeze && self.new_frame.swap(false, Ordering::AcqRel) {
            self.shown.store(true, Ordering::Release);
        }
        let color = self.colors[usize::from(self.shown.load(Ordering::Acquire))];
        canvas.draw_rect(
            bounds,
            &Shader::Solid(color),
            BlendMode::default(),
        );
    }

    fn mark_new_frame_available(&self) {
        self.new_frame.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_lookup_unregister() {
        let mut map = TextureMap::new();
        map.register(Arc::new(SolidTexture::new(
            7,
            Color::from_rgba8(0, 0, 0, 255),
            Color::from_rgba8(255, 255, 255, 255),
        )));
        assert_eq!(map.len(), 1, "one texture registered");
        assert!(map.get_texture(7).is_some(), "lookup by id");
        assert!(map.get_texture(8).is_none(), "unknown id misses");
        assert!(map.mark_frame_available(7), "known id accepts notification");
        assert!(!map.mark_frame_available(8), "unknown id rejects notification");
        assert!(map.unregister(7).is_some(), "unregister returns the texture");
        assert!(map.is_empty(), "registry empty after unregister");
    }
}
