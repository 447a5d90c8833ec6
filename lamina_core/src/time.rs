// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Monotonic host timestamps.
//!
//! [`HostTime`] is a nanosecond count on a process-wide monotonic clock.
//! Vsync sources, the animator, and the rasterizer all stamp events with it so
//! that timings taken on different threads compare directly.

use core::fmt;
use core::time::Duration;
use std::sync::OnceLock;
use std::time::Instant;

/// A point on the monotonic host clock, in nanoseconds since the clock's epoch.
///
/// The epoch is fixed the first time [`HostTime::now`] runs in the process.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HostTime(pub u64);

fn epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

impl HostTime {
    /// The clock epoch.
    pub const ZERO: Self = Self(0);

    /// Reads the monotonic clock.
    #[must_use]
    pub fn now() -> Self {
        Self::from_duration(epoch().elapsed())
    }

    /// Creates a host time from an offset since the epoch.
    #[must_use]
    pub fn from_duration(d: Duration) -> Self {
        Self(u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
    }

    /// Nanoseconds since the epoch.
    #[inline]
    #[must_use]
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Returns the time elapsed from `earlier` to `self`, or zero if `earlier`
    /// is later.
    #[inline]
    #[must_use]
    pub const fn saturating_duration_since(self, earlier: Self) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }

    /// Adds a duration, saturating at the end of the clock.
    #[must_use]
    pub fn saturating_add(self, d: Duration) -> Self {
        Self(self.0.saturating_add(u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)))
    }

    /// Subtracts a duration, saturating at the epoch.
    #[must_use]
    pub fn saturating_sub(self, d: Duration) -> Self {
        Self(self.0.saturating_sub(u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)))
    }
}

impl fmt::Debug for HostTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostTime({}ns)", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_monotonic() {
        let a = HostTime::now();
        let b = HostTime::now();
        assert!(b >= a, "host clock must not run backwards");
    }

    #[test]
    fn duration_since_saturates() {
        let early = HostTime(100);
        let late = HostTime(350);
        assert_eq!(late.saturating_duration_since(early), Duration::from_nanos(250), "forward span");
        assert_eq!(early.saturating_duration_since(late), Duration::ZERO, "backward span is zero");
    }

    #[test]
    fn add_and_sub_saturate() {
        assert_eq!(HostTime(u64::MAX - 1).saturating_add(Duration::from_secs(1)), HostTime(u64::MAX), "add clamps");
        assert_eq!(HostTime(5).saturating_sub(Duration::from_nanos(10)), HostTime::ZERO, "sub clamps");
        assert_eq!(HostTime(5).saturating_add(Duration::from_nanos(10)), HostTime(15), "plain add");
    }

    #[test]
    fn debug_format() {
        assert_eq!(format!("{:?}", HostTime(42)), "HostTime(42ns)", "debug shows nanoseconds");
    }
}
