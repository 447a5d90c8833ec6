// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bounded producer/consumer hand-off between the UI and raster threads.
//!
//! ```text
//!   producer (ui)                         consumer (raster)
//!   produce() ──permit──► ProducerContinuation
//!                              │ complete(item)
//!                              ▼
//!                    ┌──── FIFO queue ────┐
//!                    │ front ...... back  │ ◄── resubmit(item) pushes to front
//!                    └────────────────────┘
//!                              │ consume(f)
//!                              ▼
//!                    f(item) ─► Done: permit released
//!                            └► Resubmit(item): back to the front, permit kept
//! ```
//!
//! At most `depth` continuations plus queued items hold permits at once, so a
//! producer that outruns the consumer either gets `None` from
//! [`Pipeline::produce`] or blocks in [`Pipeline::produce_blocking`]. Items
//! are never dropped for lack of room.

use core::fmt;
use core::time::Duration;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

/// What the consumer did with an item.
#[derive(Debug)]
pub enum ConsumeResult<T> {
    /// The item was used; its permit is released.
    Done,
    /// The item could not be used yet; it goes back to the front.
    Resubmit(T),
}

/// Outcome of [`Pipeline::consume`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineConsumeResult {
    /// The queue was empty; the callback did not run.
    NoneAvailable,
    /// The callback ran and the queue is now empty.
    Done,
    /// The callback ran and more items are queued.
    MoreAvailable,
}

struct Entry<T> {
    item: T,
    trace_id: u64,
    holds_permit: bool,
}

struct Inner<T> {
    free_permits: usize,
    queue: VecDeque<Entry<T>>,
    closed: bool,
}

/// A bounded FIFO of items with permit-based backpressure.
pub struct Pipeline<T> {
    id: u64,
    depth: usize,
    next_trace_id: AtomicU64,
    inner: Mutex<Inner<T>>,
    permit_released: Condvar,
}

impl<T> fmt::Debug for Pipeline<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Pipeline")
            .field("id", &self.id)
            .field("depth", &self.depth)
            .field("queued", &inner.queue.len())
            .field("free_permits", &inner.free_permits)
            .field("closed", &inner.closed)
            .finish_non_exhaustive()
    }
}

impl<T> Pipeline<T> {
    /// Creates a pipeline admitting `depth` items in flight. A depth of 0 is
    /// treated as 1.
    #[must_use]
    pub fn new(depth: usize) -> Arc<Self> {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        let depth = depth.max(1);
        Arc::new(Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            depth,
            next_trace_id: AtomicU64::new(1),
            inner: Mutex::new(Inner {
                free_permits: depth,
                queue: VecDeque::with_capacity(depth),
                closed: false,
            }),
            permit_released: Condvar::new(),
        })
    }

    /// Process-unique id of this pipeline.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Maximum items in flight.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of queued items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().queue.is_empty()
    }

    /// Permits not held by a continuation or queued item.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.inner.lock().free_permits
    }

    /// Returns `true` after [`close`](Self::close).
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Takes a permit if one is free.
    pub fn produce(self: &Arc<Self>) -> Option<ProducerContinuation<T>> {
        let mut inner = self.inner.lock();
        if inner.closed || inner.free_permits == 0 {
            return None;
        }
        inner.free_permits -= 1;
        drop(inner);
        Some(self.continuation())
    }

    /// Takes a permit, waiting for the consumer to release one.
    ///
    /// On a closed pipeline this returns at once with a continuation whose
    /// [`complete`](ProducerContinuation::complete) fails.
    pub fn produce_blocking(self: &Arc<Self>) -> ProducerContinuation<T> {
        let mut inner = self.inner.lock();
        while !inner.closed && inner.free_permits == 0 {
            self.permit_released.wait(&mut inner);
        }
        let holds_permit = !inner.closed;
        if holds_permit {
            inner.free_permits -= 1;
        }
        drop(inner);
        let mut continuation = self.continuation();
        continuation.holds_permit = holds_permit;
        continuation
    }

    /// Takes a permit, waiting at most `timeout`.
    pub fn produce_timeout(self: &Arc<Self>, timeout: Duration) -> Option<ProducerContinuation<T>> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        while !inner.closed && inner.free_permits == 0 {
            if self.permit_released.wait_until(&mut inner, deadline).timed_out() {
                break;
            }
        }
        if inner.closed || inner.free_permits == 0 {
            return None;
        }
        inner.free_permits -= 1;
        drop(inner);
        Some(self.continuation())
    }

    fn continuation(self: &Arc<Self>) -> ProducerContinuation<T> {
        ProducerContinuation {
            pipeline: Arc::clone(self),
            trace_id: self.next_trace_id.fetch_add(1, Ordering::Relaxed),
            holds_permit: true,
            completed: false,
        }
    }

    /// Pops the front item and hands it to `f`.
    ///
    /// The lock is not held while `f` runs.
    pub fn consume(&self, f: impl FnOnce(T) -> ConsumeResult<T>) -> PipelineConsumeResult {
        let Some(Entry {
            item,
            trace_id,
            holds_permit,
        }) = self.inner.lock().queue.pop_front()
        else {
            return PipelineConsumeResult::NoneAvailable;
        };
        let result = f(item);
        let mut inner = self.inner.lock();
        match result {
            ConsumeResult::Done => {
                if holds_permit {
                    inner.free_permits += 1;
                    self.permit_released.notify_one();
                }
            }
            ConsumeResult::Resubmit(item) => {
                log::debug!("pipeline {} resubmitting trace {trace_id}", self.id);
                inner.queue.push_front(Entry {
                    item,
                    trace_id,
                    holds_permit,
                });
            }
        }
        if inner.queue.is_empty() {
            PipelineConsumeResult::Done
        } else {
            PipelineConsumeResult::MoreAvailable
        }
    }

    /// Puts `item` at the front of the queue without taking a permit.
    pub fn resubmit(&self, item: T) {
        let trace_id = self.next_trace_id.fetch_add(1, Ordering::Relaxed);
        self.inner.lock().queue.push_front(Entry {
            item,
            trace_id,
            holds_permit: false,
        });
    }

    /// Removes every queued item, releasing their permits.
    pub fn drain(&self) -> Vec<T> {
        let mut inner = self.inner.lock();
        let mut out = Vec::with_capacity(inner.queue.len());
        while let Some(entry) = inner.queue.pop_front() {
            if entry.holds_permit {
                inner.free_permits += 1;
            }
            out.push(entry.item);
        }
        drop(inner);
        self.permit_released.notify_all();
        out
    }

    /// Refuses further items and wakes blocked producers.
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.permit_released.notify_all();
    }
}

/// Permission to put one item into a [`Pipeline`].
///
/// Dropping it without calling [`complete`](Self::complete) releases the
/// permit and queues nothing.
#[must_use = "dropping a continuation releases its permit without producing"]
pub struct ProducerContinuation<T> {
    pipeline: Arc<Pipeline<T>>,
    trace_id: u64,
    holds_permit: bool,
    completed: bool,
}

impl<T> fmt::Debug for ProducerContinuation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProducerContinuation")
            .field("pipeline", &self.pipeline.id)
            .field("trace_id", &self.trace_id)
            .finish_non_exhaustive()
    }
}

impl<T> ProducerContinuation<T> {
    /// Id for trace events about the item this continuation produces.
    #[must_use]
    pub fn trace_id(&self) -> u64 {
        self.trace_id
    }

    /// Queues `item` at the back. Returns `false` if the pipeline was closed;
    /// the item is dropped.
    pub fn complete(mut self, item: T) -> bool {
        let mut inner = self.pipeline.inner.lock();
        if inner.closed || !self.holds_permit {
            log::debug!("pipeline {} closed; dropping trace {}", self.pipeline.id, self.trace_id);
            return false;
        }
        inner.queue.push_back(Entry {
            item,
            trace_id: self.trace_id,
            holds_permit: true,
        });
        self.completed = true;
        true
    }
}

impl<T> Drop for ProducerContinuation<T> {
    fn drop(&mut self) {
        if self.completed || !self.holds_permit {
            return;
        }
        self.pipeline.inner.lock().free_permits += 1;
        self.pipeline.permit_released.notify_one();
    }
}
