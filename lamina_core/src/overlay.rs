// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame-time stopwatches and the performance overlay.
//!
//! The rasterizer keeps one [`Stopwatch`] for raster time and one for build
//! time. Performance-overlay layers paint them as bar graphs against the frame
//! budget.

use core::time::Duration;
use std::collections::VecDeque;

use kurbo::Rect;

use crate::canvas::Canvas;
use crate::paint::{BlendMode, Color, Shader};

/// Number of samples a stopwatch keeps.
pub const STOPWATCH_CAPACITY: usize = 120;

/// Ring buffer of the most recent frame durations.
#[derive(Clone, Debug)]
pub struct Stopwatch {
    samples: VecDeque<Duration>,
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self {
            samples: VecDeque::with_capacity(STOPWATCH_CAPACITY),
        }
    }
}

impl Stopwatch {
    /// Creates an empty stopwatch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one frame's duration, discarding the oldest when full.
    pub fn record(&mut self, d: Duration) {
        if self.samples.len() == STOPWATCH_CAPACITY {
            self.samples.pop_front();
        }
        self.samples.push_back(d);
    }

    /// Most recent sample.
    #[must_use]
    pub fn last(&self) -> Option<Duration> {
        self.samples.back().copied()
    }

    /// Mean of the retained samples.
    #[must_use]
    pub fn average(&self) -> Duration {
        let n = u32::try_from(self.samples.len()).unwrap_or(u32::MAX);
        if n == 0 {
            return Duration::ZERO;
        }
        self.samples.iter().sum::<Duration>() / n
    }

    /// Largest retained sample.
    #[must_use]
    pub fn max(&self) -> Duration {
        self.samples.iter().copied().max().unwrap_or(Duration::ZERO)
    }

    /// Samples from oldest to newest.
    pub fn samples(&self) -> impl Iterator<Item = Duration> + '_ {
        self.samples.iter().copied()
    }

    /// Number of retained samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` before the first sample.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Which graphs a performance overlay layer shows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct OverlayOptions(pub u64);

impl OverlayOptions {
    /// Summary marker for raster time.
    pub const DISPLAY_RASTERIZER_STATISTICS: Self = Self(1 << 0);
    /// Bar graph of raster time.
    pub const VISUALIZE_RASTERIZER_STATISTICS: Self = Self(1 << 1);
    /// Summary marker for build time.
    pub const DISPLAY_ENGINE_STATISTICS: Self = Self(1 << 2);
    /// Bar graph of build time.
    pub const VISUALIZE_ENGINE_STATISTICS: Self = Self(1 << 3);
    /// Every graph.
    pub const ALL: Self = Self(0xf);

    /// Returns `true` if every bit of `other` is set.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if no graph is enabled.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 & 0xf == 0
    }
}

impl core::ops::BitOr for OverlayOptions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Stopwatches and budget handed to overlay layers during Paint.
#[derive(Clone, Copy, Debug)]
pub struct OverlayStats<'a> {
    /// Raster-thread frame times.
    pub raster: &'a Stopwatch,
    /// UI-thread build times.
    pub ui: &'a Stopwatch,
    /// Target duration of one frame.
    pub frame_budget: Duration,
}

/// Paints the enabled graphs into `bounds`: raster on the top half, build on
/// the bottom half.
pub fn paint_overlay(canvas: &mut dyn Canvas, options: OverlayOptions, bounds: Rect, stats: &OverlayStats<'_>) {
    let mid = bounds.y0 + bounds.height() / 2.0;
    let top = Rect::new(bounds.x0, bounds.y0, bounds.x1, mid);
    let bottom = Rect::new(bounds.x0, mid, bounds.x1, bounds.y1);
    paint_section(
        canvas,
        top,
        stats.raster,
        stats.frame_budget,
        options.contains(OverlayOptions::VISUALIZE_RASTERIZER_STATISTICS),
        options.contains(OverlayOptions::DISPLAY_RASTERIZER_STATISTICS),
    );
    paint_section(
        canvas,
        bottom,
        stats.ui,
        stats.frame_budget,
        options.contains(OverlayOptions::VISUALIZE_ENGINE_STATISTICS),
        options.contains(OverlayOptions::DISPLAY_ENGINE_STATISTICS),
    );
}

fn paint_section(
    canvas: &mut dyn Canvas,
    rect: Rect,
    watch: &Stopwatch,
    budget: Duration,
    visualize: bool,
    display: bool,
) {
    let blend = BlendMode::default();
    if visualize {
        canvas.draw_rect(rect, &Shader::Solid(Color::from_rgba8(255, 255, 255, 96)), blend);
        // Full height is two frame budgets; the budget line sits halfway.
        let scale = budget.as_secs_f64() * 2.0;
        let bar_w = rect.width() / STOPWATCH_CAPACITY as f64;
        let over = Shader::Solid(Color::from_rgba8(255, 64, 64, 200));
        let under = Shader::Solid(Color::from_rgba8(64, 160, 255, 200));
        for (i, d) in watch.samples().enumerate() {
            let frac = if scale > 0.0 { (d.as_secs_f64() / scale).min(1.0) } else { 0.0 };
            let x0 = rect.x0 + bar_w * i as f64;
            let bar = Rect::new(x0, rect.y1 - rect.height() * frac, x0 + bar_w, rect.y1);
            canvas.draw_rect(bar, if d > budget { &over } else { &under }, blend);
        }
        let line_y = rect.y0 + rect.height() / 2.0;
        canvas.draw_rect(
            Rect::new(rect.x0, line_y - 0.5, rect.x1, line_y + 0.5),
            &Shader::Solid(Color::from_rgba8(0, 200, 0, 255)),
            blend,
        );
    }
    if display {
        let color = if watch.average() > budget {
            Color::from_rgba8(220, 0, 0, 255)
        } else {
            Color::from_rgba8(0, 180, 0, 255)
        };
        let size = rect.height().min(8.0);
        canvas.draw_rect(
            Rect::new(rect.x0, rect.y0, rect.x0 + size, rect.y0 + size),
            &Shader::Solid(color),
            blend,
        );
    }
}
