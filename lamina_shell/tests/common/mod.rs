// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared fixtures: a pixmap-backed surface and a few scenes.

#![allow(dead_code, reason = "each test binary uses a subset")]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use kurbo::{Rect, Size, Vec2};
use lamina_core::canvas::Canvas;
use lamina_core::paint::Color;
use lamina_core::picture::{Picture, PictureRecorder};
use lamina_core::{BuildTimes, FrameMetadata, LayerTree, SceneBuilder};
use lamina_render::{Pixmap, PixmapCanvas};
use lamina_shell::{FrameTiming, Pipeline, RasterizerDelegate, Surface, SurfaceFrame};
use parking_lot::Mutex;

pub const WHITE: Color = Color::from_rgb8(255, 255, 255);
pub const RED: Color = Color::from_rgb8(255, 0, 0);
pub const GREEN: Color = Color::from_rgb8(0, 255, 0);
pub const BLUE: Color = Color::from_rgb8(0, 0, 255);

/// Knobs a test flips while the surface is owned by the rasterizer.
#[derive(Default)]
pub struct SurfaceControl {
    pub refuse_frames: AtomicUsize,
    pub invalid: AtomicBool,
    pub presented_frames: AtomicUsize,
}

/// A surface that paints into a white back buffer and copies it to
/// `presented` on submit.
pub struct PixmapSurface {
    size: Size,
    pub presented: Arc<Mutex<Pixmap>>,
    pub control: Arc<SurfaceControl>,
}

impl PixmapSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: Size::new(f64::from(width), f64::from(height)),
            presented: Arc::new(Mutex::new(Pixmap::new(width, height))),
            control: Arc::new(SurfaceControl::default()),
        }
    }
}

struct PixmapFrame<'a> {
    back: Pixmap,
    presented: &'a Mutex<Pixmap>,
    control: &'a SurfaceControl,
}

impl SurfaceFrame for PixmapFrame<'_> {
    fn paint(&mut self, paint: &mut dyn FnMut(&mut dyn Canvas)) {
        let mut canvas = PixmapCanvas::new(&mut self.back);
        paint(&mut canvas);
    }

    fn submit(self: Box<Self>) -> bool {
        let this = *self;
        *this.presented.lock() = this.back;
        this.control.presented_frames.fetch_add(1, Ordering::SeqCst);
        true
    }
}

impl Surface for PixmapSurface {
    fn size(&self) -> Size {
        self.size
    }

    fn is_valid(&self) -> bool {
        !self.control.invalid.load(Ordering::SeqCst)
    }

    fn acquire_frame(&mut self, size: Size) -> Option<Box<dyn SurfaceFrame + '_>> {
        let refused = self
            .control
            .refuse_frames
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return None;
        }
        #[expect(clippy::cast_possible_truncation, reason = "test surfaces are small")]
        let mut back = Pixmap::new(size.width as u32, size.height as u32);
        back.fill(WHITE);
        Some(Box::new(PixmapFrame {
            back,
            presented: &self.presented,
            control: &self.control,
        }))
    }
}

/// Frame numbers the rasterizer reported, in order.
#[derive(Clone, Default)]
pub struct Presented(pub Arc<Mutex<Vec<FrameTiming>>>);

impl Presented {
    pub fn frame_numbers(&self) -> Vec<u64> {
        self.0.lock().iter().map(|t| t.frame_number).collect()
    }
}

impl RasterizerDelegate for Presented {
    fn on_frame_rasterized(&mut self, timing: &FrameTiming) {
        self.0.lock().push(*timing);
    }
}

pub fn solid_picture(rect: Rect, color: Color) -> Picture {
    let mut rec = PictureRecorder::new();
    rec.fill_rect(rect, color);
    rec.finish()
}

/// A full-frame picture of `color`.
pub fn filled_tree(width: f64, height: f64, color: Color, frame_number: u64) -> LayerTree {
    let mut b = SceneBuilder::new();
    b.add_picture(Vec2::ZERO, solid_picture(Rect::new(0.0, 0.0, width, height), color), 0);
    finish(b, width, height, frame_number)
}

/// Builds the scene into a tree stamped with `frame_number`.
pub fn finish(builder: SceneBuilder, width: f64, height: f64, frame_number: u64) -> LayerTree {
    let mut tree = builder
        .build()
        .take_layer_tree(FrameMetadata::with_size(width, height))
        .expect("fresh scene");
    tree.record_build(frame_number, BuildTimes::default());
    tree
}

pub fn enqueue(pipeline: &Arc<Pipeline<LayerTree>>, tree: LayerTree) {
    let continuation = pipeline.produce().expect("free permit");
    assert!(continuation.complete(tree), "queued");
}

/// Asserts that `actual` is within `tolerance` of `expected` per channel.
pub fn assert_rgba_near(actual: Option<[u8; 4]>, expected: [u8; 4], tolerance: u8, what: &str) {
    let actual = actual.expect("pixel in bounds");
    let close = actual
        .iter()
        .zip(expected)
        .all(|(a, e)| a.abs_diff(e) <= tolerance);
    assert!(close, "{what}: got {actual:?}, expected {expected:?}");
}
