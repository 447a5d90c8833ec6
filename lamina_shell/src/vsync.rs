// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Display-refresh signal sources.
//!
//! The animator asks a [`VsyncWaiter`] for exactly one callback per request.
//! The callback receives the frame start time and the target time by which
//! the frame should be on screen, and may run on any thread.

use core::fmt;
use core::time::Duration;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use lamina_core::time::HostTime;
use parking_lot::Mutex;

/// Callback invoked with `(frame_start, frame_target)`.
pub type VsyncCallback = Box<dyn FnOnce(HostTime, HostTime) + Send + 'static>;

/// A source of vsync signals.
pub trait VsyncWaiter: Send {
    /// Arranges for `callback` to run once at the next vsync.
    ///
    /// A request made while another is pending is ignored.
    fn async_wait_for_vsync(&mut self, callback: VsyncCallback);
}

/// A vsync source driven by hand, for tests and hosts with their own
/// display link.
pub struct ManualVsync {
    pending: Arc<Mutex<Option<VsyncCallback>>>,
}

impl fmt::Debug for ManualVsync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualVsync")
            .field("waiting", &self.pending.lock().is_some())
            .finish()
    }
}

/// Fires the callback a [`ManualVsync`] is holding.
#[derive(Clone)]
pub struct ManualVsyncHandle {
    pending: Arc<Mutex<Option<VsyncCallback>>>,
}

impl fmt::Debug for ManualVsyncHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualVsyncHandle")
            .field("waiting", &self.is_waiting())
            .finish()
    }
}

impl ManualVsync {
    /// Creates the waiter and the handle that fires it.
    #[must_use]
    pub fn new() -> (Self, ManualVsyncHandle) {
        let pending = Arc::new(Mutex::new(None));
        (
            Self {
                pending: Arc::clone(&pending),
            },
            ManualVsyncHandle { pending },
        )
    }
}

impl VsyncWaiter for ManualVsync {
    fn async_wait_for_vsync(&mut self, callback: VsyncCallback) {
        let mut pending = self.pending.lock();
        if pending.is_some() {
            log::debug!("vsync already requested");
            return;
        }
        *pending = Some(callback);
    }
}

impl ManualVsyncHandle {
    /// Returns `true` if a callback is waiting.
    #[must_use]
    pub fn is_waiting(&self) -> bool {
        self.pending.lock().is_some()
    }

    /// Runs the waiting callback on the calling thread. Returns `false` if
    /// nothing was waiting.
    pub fn fire(&self, frame_start: HostTime, frame_target: HostTime) -> bool {
        // Taken before running so the callback can request the next vsync.
        let callback = self.pending.lock().take();
        match callback {
            Some(cb) => {
                cb(frame_start, frame_target);
                true
            }
            None => false,
        }
    }

    /// Fires with the current time and a target one `interval` later.
    pub fn fire_now(&self, interval: Duration) -> bool {
        let now = HostTime::now();
        self.fire(now, now.saturating_add(interval))
    }
}

/// A vsync source that ticks on a fixed interval from a background thread.
///
/// Ticks are aligned to multiples of the interval since creation; a request
/// is answered at the next tick boundary.
pub struct TimerVsync {
    interval: Duration,
    sender: Option<Sender<VsyncCallback>>,
    thread: Option<JoinHandle<()>>,
    waiting: Arc<Mutex<bool>>,
}

impl fmt::Debug for TimerVsync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerVsync")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl TimerVsync {
    /// Starts the ticker thread.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be spawned.
    pub fn new(interval: Duration) -> io::Result<Self> {
        let interval = interval.max(Duration::from_micros(100));
        let (sender, receiver) = crossbeam_channel::unbounded::<VsyncCallback>();
        let waiting = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&waiting);
        let thread = thread::Builder::new().name("lamina.vsync".into()).spawn(move || {
            let epoch = HostTime::now();
            let step = u64::try_from(interval.as_nanos()).unwrap_or(u64::MAX).max(1);
            for callback in receiver {
                let now = HostTime::now();
                let ticks = now.as_nanos().saturating_sub(epoch.as_nanos()) / step + 1;
                let start = HostTime(epoch.as_nanos().saturating_add(ticks.saturating_mul(step)));
                thread::sleep(start.saturating_duration_since(now));
                *flag.lock() = false;
                callback(start, start.saturating_add(interval));
            }
        })?;
        Ok(Self {
            interval,
            sender: Some(sender),
            thread: Some(thread),
            waiting,
        })
    }

    /// Tick interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl VsyncWaiter for TimerVsync {
    fn async_wait_for_vsync(&mut self, callback: VsyncCallback) {
        let mut waiting = self.waiting.lock();
        if *waiting {
            log::debug!("vsync already requested");
            return;
        }
        if let Some(sender) = &self.sender {
            *waiting = sender.send(callback).is_ok();
        }
    }
}

impl Drop for TimerVsync {
    fn drop(&mut self) {
        self.sender = None;
        if let Some(thread) = self.thread.take() {
            if thread.thread().id() == thread::current().id() {
                return;
            }
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn manual_fires_once_per_request() {
        let (mut waiter, handle) = ManualVsync::new();
        let count = Arc::new(AtomicUsize::new(0));
        assert!(!handle.fire(HostTime(1), HostTime(2)), "nothing requested yet");
        let c = Arc::clone(&count);
        waiter.async_wait_for_vsync(Box::new(move |start, target| {
            assert!(target > start, "target after start");
            c.fetch_add(1, Ordering::SeqCst);
        }));
        assert!(handle.is_waiting(), "request recorded");
        assert!(handle.fire(HostTime(1), HostTime(2)), "fired");
        assert!(!handle.fire(HostTime(3), HostTime(4)), "one shot");
        assert_eq!(count.load(Ordering::SeqCst), 1, "ran once");
    }

    #[test]
    fn manual_ignores_duplicate_requests() {
        let (mut waiter, handle) = ManualVsync::new();
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let c = Arc::clone(&count);
            waiter.async_wait_for_vsync(Box::new(move |_, _| {
                c.fetch_add(1, Ordering::SeqCst);
            }));
        }
        handle.fire(HostTime(0), HostTime(1));
        assert_eq!(count.load(Ordering::SeqCst), 1, "only the first request kept");
    }

    #[test]
    fn timer_ticks_on_interval_boundaries() {
        let mut timer = TimerVsync::new(Duration::from_millis(2)).expect("spawn");
        let (tx, rx) = crossbeam_channel::bounded(1);
        timer.async_wait_for_vsync(Box::new(move |start, target| {
            let _ = tx.send((start, target));
        }));
        let (start, target) = rx.recv_timeout(Duration::from_secs(2)).expect("tick");
        assert_eq!(target.saturating_duration_since(start), Duration::from_millis(2), "one interval");
    }
}
