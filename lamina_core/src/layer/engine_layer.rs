// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Handles to layers that outlive the scene they were built in.

use core::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use super::arena::LayerArena;
use super::id::LayerId;
use super::Layer;

/// Shared state of one scene build. The arena appears here once the build is
/// sealed.
#[derive(Debug)]
pub(crate) struct BuildSession {
    id: u64,
    arena: OnceLock<Arc<LayerArena>>,
}

impl BuildSession {
    pub(crate) fn new() -> Arc<Self> {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Arc::new(Self {
            id: NEXT.fetch_add(1, Ordering::Relaxed),
            arena: OnceLock::new(),
        })
    }

    #[inline]
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Publishes the finished arena to every handle issued by this build.
    pub(crate) fn seal(&self, arena: Arc<LayerArena>) {
        if self.arena.set(arena).is_err() {
            log::warn!("build session {} sealed twice; keeping the first arena", self.id);
        }
    }
}

/// A reference-counted handle to one layer of a built scene.
///
/// Every push on a [`SceneBuilder`](crate::SceneBuilder) returns one. After
/// that builder's `build()` the handle can be added to later scenes with
/// [`add_retained`](crate::SceneBuilder::add_retained), which reuses the whole
/// subtree without rebuilding it. The subtree lives as long as the longest
/// holder.
#[derive(Clone)]
pub struct EngineLayer {
    session: Arc<BuildSession>,
    id: LayerId,
}

impl EngineLayer {
    pub(crate) fn new(session: Arc<BuildSession>, id: LayerId) -> Self {
        Self { session, id }
    }

    /// Id of the layer within its arena.
    #[inline]
    #[must_use]
    pub fn layer_id(&self) -> LayerId {
        self.id
    }

    /// Identity of the build that created the layer.
    #[inline]
    #[must_use]
    pub fn session(&self) -> u64 {
        self.session.id()
    }

    /// Returns `true` once the owning scene has been built.
    #[inline]
    #[must_use]
    pub fn is_built(&self) -> bool {
        self.session.arena.get().is_some()
    }

    /// The sealed arena holding the layer, once built.
    #[inline]
    #[must_use]
    pub fn arena(&self) -> Option<&Arc<LayerArena>> {
        self.session.arena.get()
    }

    /// The layer itself, once built.
    #[must_use]
    pub fn layer(&self) -> Option<&Layer> {
        self.arena().map(|a| a.layer(self.id))
    }
}

impl PartialEq for EngineLayer {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.session, &other.session) && self.id == other.id
    }
}

impl fmt::Debug for EngineLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EngineLayer({:?}@session{}{})",
            self.id,
            self.session.id(),
            if self.is_built() { "" } else { ", unbuilt" }
        )
    }
}
