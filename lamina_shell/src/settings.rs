// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shell configuration.
//!
//! A [`Settings`] value is built once and handed to [`Shell::create`]; the
//! shell passes the relevant parts to the pipeline, animator, and rasterizer
//! it constructs.
//!
//! [`Shell::create`]: crate::Shell::create

use core::time::Duration;

/// Raster cache tuning.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RasterCacheSettings {
    /// Consecutive frames a complex picture must be seen before it is cached.
    pub access_threshold: u32,
    /// Maximum cached pictures.
    pub picture_limit: usize,
}

impl Default for RasterCacheSettings {
    fn default() -> Self {
        Self {
            access_threshold: 3,
            picture_limit: 64,
        }
    }
}

/// Configuration for a [`Shell`](crate::Shell).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Settings {
    /// Layer trees that may be in flight between the UI and raster threads
    /// (0 is treated as 1).
    pub pipeline_depth: usize,
    /// Display refresh rate, used for the frame budget and the timer vsync.
    pub refresh_rate_hz: f64,
    /// Raster cache configuration; `None` disables the cache.
    pub raster_cache: Option<RasterCacheSettings>,
    /// Show the raster and UI frame-time graphs over every frame.
    pub enable_performance_overlay: bool,
    /// Log each startup step at `info` level.
    pub trace_startup: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

impl Settings {
    /// Default configuration: depth 2, 60 Hz, raster cache enabled.
    ///
    /// A depth of 2 lets the UI thread build the next frame while the raster
    /// thread draws the current one.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pipeline_depth: 2,
            refresh_rate_hz: 60.0,
            raster_cache: Some(RasterCacheSettings {
                access_threshold: 3,
                picture_limit: 64,
            }),
            enable_performance_overlay: false,
            trace_startup: false,
        }
    }

    /// Lowest-latency configuration: depth 1, so the UI thread never builds
    /// ahead of the raster thread.
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            pipeline_depth: 1,
            ..Self::new()
        }
    }

    /// Configuration for hosts without a display: no raster cache, so every
    /// frame replays its pictures.
    #[must_use]
    pub const fn headless() -> Self {
        Self {
            raster_cache: None,
            ..Self::new()
        }
    }

    /// Time available for one frame at the configured refresh rate.
    #[must_use]
    pub fn frame_budget(&self) -> Duration {
        if self.refresh_rate_hz.is_finite() && self.refresh_rate_hz > 0.0 {
            Duration::from_secs_f64(1.0 / self.refresh_rate_hz)
        } else {
            Duration::from_micros(16_667)
        }
    }

    /// Pipeline depth with the lower bound applied.
    #[must_use]
    pub fn effective_pipeline_depth(&self) -> usize {
        self.pipeline_depth.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_differ_where_documented() {
        assert_eq!(Settings::default().pipeline_depth, 2, "default depth");
        assert_eq!(Settings::strict().pipeline_depth, 1, "strict depth");
        assert!(Settings::headless().raster_cache.is_none(), "headless has no cache");
        assert_eq!(
            Settings::default().raster_cache,
            Some(RasterCacheSettings::default()),
            "default cache settings"
        );
    }

    #[test]
    fn frame_budget_follows_refresh_rate() {
        let s = Settings {
            refresh_rate_hz: 120.0,
            ..Settings::new()
        };
        assert_eq!(s.frame_budget(), Duration::from_secs_f64(1.0 / 120.0), "120 Hz budget");
        let broken = Settings {
            refresh_rate_hz: 0.0,
            ..Settings::new()
        };
        assert_eq!(broken.frame_budget(), Duration::from_micros(16_667), "fallback budget");
        let zero = Settings {
            pipeline_depth: 0,
            ..Settings::new()
        };
        assert_eq!(zero.effective_pipeline_depth(), 1, "depth floor");
    }
}
