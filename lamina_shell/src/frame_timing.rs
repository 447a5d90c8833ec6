// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-frame timestamps reported after rasterization.

use core::time::Duration;

use lamina_core::time::HostTime;
use lamina_core::BuildTimes;

/// When each phase of one frame started and finished.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameTiming {
    /// Animator frame counter.
    pub frame_number: u64,
    /// Vsync the frame began on.
    pub vsync_start: HostTime,
    /// Start of scene building on the UI thread.
    pub build_start: HostTime,
    /// Tree handed to the pipeline.
    pub build_finish: HostTime,
    /// Rasterizer picked the tree up.
    pub raster_start: HostTime,
    /// Frame submitted to the surface.
    pub raster_finish: HostTime,
}

impl FrameTiming {
    /// Combines a tree's build stamps with the raster stamps.
    #[must_use]
    pub fn new(frame_number: u64, build: BuildTimes, raster_start: HostTime, raster_finish: HostTime) -> Self {
        Self {
            frame_number,
            vsync_start: build.vsync_start,
            build_start: build.build_start,
            build_finish: build.build_finish,
            raster_start,
            raster_finish,
        }
    }

    /// Time spent building on the UI thread.
    #[must_use]
    pub fn build_duration(&self) -> Duration {
        self.build_finish.saturating_duration_since(self.build_start)
    }

    /// Time spent rasterizing.
    #[must_use]
    pub fn raster_duration(&self) -> Duration {
        self.raster_finish.saturating_duration_since(self.raster_start)
    }

    /// Vsync to submission.
    #[must_use]
    pub fn total_span(&self) -> Duration {
        self.raster_finish.saturating_duration_since(self.vsync_start)
    }

    /// Returns `true` if the frame took longer than `budget` end to end.
    #[must_use]
    pub fn is_over_budget(&self, budget: Duration) -> bool {
        self.total_span() > budget
    }
}
