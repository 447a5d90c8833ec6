// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-build layer storage.

use core::fmt;

use super::engine_layer::EngineLayer;
use super::id::LayerId;
use super::Layer;

/// Sentinel for "no parent".
const INVALID: u32 = u32::MAX;

/// One entry in a node's ordered child list.
#[derive(Clone, PartialEq)]
pub enum ChildSlot {
    /// A node in the same arena.
    Local(LayerId),
    /// The root of a subtree in an arena sealed by an earlier build.
    Retained(EngineLayer),
}

impl fmt::Debug for ChildSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(id) => write!(f, "Local({id:?})"),
            Self::Retained(h) => write!(f, "Retained({h:?})"),
        }
    }
}

/// Arena of layer nodes produced by one scene build.
///
/// Nodes are stored in parallel arrays indexed by [`LayerId`]. The arena is
/// append-only while its builder is open and immutable once sealed.
#[derive(Clone, PartialEq)]
pub struct LayerArena {
    // -- Identity --
    pub(crate) session: u64,

    // -- Nodes --
    pub(crate) layers: Vec<Layer>,
    pub(crate) children: Vec<Vec<ChildSlot>>,
    pub(crate) parent: Vec<u32>,
}

impl fmt::Debug for LayerArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerArena")
            .field("session", &self.session)
            .field("len", &self.layers.len())
            .finish_non_exhaustive()
    }
}

impl LayerArena {
    /// Creates an arena holding only a root container.
    pub(crate) fn new(session: u64) -> Self {
        Self {
            session,
            layers: vec![Layer::Container],
            children: vec![Vec::new()],
            parent: vec![INVALID],
        }
    }

    /// Appends `layer` as the last child of `parent`.
    ///
    /// # Panics
    ///
    /// Panics if `parent` is not in this arena or is a leaf.
    pub(crate) fn push(&mut self, parent: LayerId, layer: Layer) -> LayerId {
        self.validate(parent);
        assert!(
            self.layers[parent.slot()].is_container(),
            "cannot add children to leaf {}",
            self.layers[parent.slot()].name()
        );
        let id = LayerId(u32::try_from(self.layers.len()).unwrap_or(INVALID - 1));
        self.layers.push(layer);
        self.children.push(Vec::new());
        self.parent.push(parent.0);
        self.children[parent.slot()].push(ChildSlot::Local(id));
        id
    }

    /// Appends a retained subtree as the last child of `parent`.
    pub(crate) fn push_retained(&mut self, parent: LayerId, handle: EngineLayer) {
        self.validate(parent);
        self.children[parent.slot()].push(ChildSlot::Retained(handle));
    }

    /// Identity of the build that produced this arena.
    #[inline]
    #[must_use]
    pub fn session(&self) -> u64 {
        self.session
    }

    /// Number of nodes, including the root.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Always `false`: every arena has a root.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Returns `true` if `id` names a node of this arena.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: LayerId) -> bool {
        id.slot() < self.layers.len()
    }

    /// The layer stored at `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` is out of range.
    #[must_use]
    pub fn layer(&self, id: LayerId) -> &Layer {
        self.validate(id);
        &self.layers[id.slot()]
    }

    /// Ordered children of `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` is out of range.
    #[must_use]
    pub fn children(&self, id: LayerId) -> &[ChildSlot] {
        self.validate(id);
        &self.children[id.slot()]
    }

    /// Parent of `id` within this arena, `None` for the root.
    ///
    /// # Panics
    ///
    /// Panics if `id` is out of range.
    #[must_use]
    pub fn parent(&self, id: LayerId) -> Option<LayerId> {
        self.validate(id);
        let p = self.parent[id.slot()];
        (p != INVALID).then_some(LayerId(p))
    }

    /// Total nodes reachable from `id`, following retained subtrees.
    #[must_use]
    pub fn subtree_len(&self, id: LayerId) -> usize {
        1 + self
            .children(id)
            .iter()
            .map(|slot| match slot {
                ChildSlot::Local(c) => self.subtree_len(*c),
                ChildSlot::Retained(h) => h.arena().map_or(0, |a| a.subtree_len(h.layer_id())),
            })
            .sum::<usize>()
    }

    fn validate(&self, id: LayerId) {
        assert!(
            self.contains(id),
            "{id:?} out of range (arena len {})",
            self.layers.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::OpacityLayer;
    use kurbo::Vec2;

    fn opacity(alpha: u8) -> Layer {
        Layer::Opacity(OpacityLayer {
            alpha,
            offset: Vec2::ZERO,
        })
    }

    #[test]
    fn new_arena_has_root_container() {
        let a = LayerArena::new(1);
        assert_eq!(a.len(), 1, "only the root");
        assert_eq!(*a.layer(LayerId::ROOT), Layer::Container, "root is a container");
        assert!(a.parent(LayerId::ROOT).is_none(), "root has no parent");
    }

    #[test]
    fn push_preserves_insertion_order() {
        let mut a = LayerArena::new(1);
        let x = a.push(LayerId::ROOT, opacity(1));
        let y = a.push(LayerId::ROOT, opacity(2));
        let z = a.push(x, Layer::Container);
        assert_eq!(
            a.children(LayerId::ROOT),
            &[ChildSlot::Local(x), ChildSlot::Local(y)],
            "children in insertion order"
        );
        assert_eq!(a.parent(z), Some(x), "nested parent");
        assert_eq!(a.subtree_len(LayerId::ROOT), 4, "root, x, y, z");
    }

    #[test]
    #[should_panic(expected = "cannot add children to leaf")]
    fn push_under_leaf_panics() {
        let mut a = LayerArena::new(1);
        let leaf = a.push(
            LayerId::ROOT,
            Layer::PlatformView(crate::layer::PlatformViewLayer {
                offset: Vec2::ZERO,
                size: kurbo::Size::new(1.0, 1.0),
                view_id: 3,
            }),
        );
        a.push(leaf, Layer::Container);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn foreign_id_panics() {
        let a = LayerArena::new(1);
        let _ = a.layer(LayerId(5));
    }
}
