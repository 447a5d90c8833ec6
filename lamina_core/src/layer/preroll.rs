// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! First traversal pass: bounds, culling, cache preparation, view placement.

use kurbo::{Affine, Rect};

use super::arena::{ChildSlot, LayerArena};
use super::id::LayerId;
use super::{Layer, is_empty, join, meet};
use crate::platform_view::{ClipShape, EmbeddedViewParams, Mutator, MutatorStack, PlatformViewEmbedder};
use crate::raster_cache::RasterCache;

const UNVISITED: u32 = u32::MAX;

/// Computed state of one visited node.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NodeState {
    /// Bounds of everything the node paints, in its parent's coordinates.
    pub paint_bounds: Rect,
    /// Whether Paint visits the node at all.
    pub needs_painting: bool,
    /// Visit index one past the node's subtree.
    pub(crate) end: u32,
}

/// Side table written by [`preroll`] and read by [`paint`](super::paint).
///
/// Entries are in visit order (pre-order, children in insertion order,
/// retained subtrees inlined). Retained arenas are shared between trees, so
/// their computed state lives here rather than on the nodes.
#[derive(Clone, Debug, Default)]
pub struct PrerollState {
    session: u64,
    root: Option<LayerId>,
    visits: Vec<NodeState>,
    local: Vec<u32>,
    has_platform_view: bool,
}

impl PrerollState {
    /// State for a node of the prerolled arena. `None` for ids the traversal
    /// did not reach.
    #[must_use]
    pub fn node(&self, id: LayerId) -> Option<&NodeState> {
        let visit = *self.local.get(id.slot())?;
        if visit == UNVISITED {
            return None;
        }
        self.visits.get(visit as usize)
    }

    /// Bounds of the traversal root.
    #[must_use]
    pub fn root_bounds(&self) -> Rect {
        self.visits.first().map_or(Rect::ZERO, |n| n.paint_bounds)
    }

    /// Number of nodes visited, counting retained subtrees once per use.
    #[must_use]
    pub fn visit_count(&self) -> usize {
        self.visits.len()
    }

    /// Returns `true` if a platform view was encountered.
    #[must_use]
    pub fn has_platform_view(&self) -> bool {
        self.has_platform_view
    }

    /// Returns `true` if this state was computed for `root` of `arena`.
    #[must_use]
    pub fn matches(&self, arena: &LayerArena, root: LayerId) -> bool {
        self.root == Some(root) && self.session == arena.session() && !self.visits.is_empty()
    }

    #[inline]
    pub(crate) fn visit(&self, index: usize) -> Option<NodeState> {
        self.visits.get(index).copied()
    }
}

/// Parameters threaded through [`preroll`].
///
/// The cull rect and mutator stack are updated in place as the traversal
/// descends and restored on the way back up.
pub struct PrerollContext<'a> {
    /// Visible area in the current node's coordinates.
    pub cull_rect: Rect,
    /// Cache that picture layers register with.
    pub raster_cache: Option<&'a mut dyn RasterCache>,
    /// Receiver of platform-view placements.
    pub embedder: Option<&'a mut dyn PlatformViewEmbedder>,
    /// Ancestor clips, transforms, and opacities of the current node.
    pub mutators: MutatorStack,
}

impl core::fmt::Debug for PrerollContext<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PrerollContext")
            .field("cull_rect", &self.cull_rect)
            .field("raster_cache", &self.raster_cache.is_some())
            .field("embedder", &self.embedder.is_some())
            .field("mutators", &self.mutators.len())
            .finish()
    }
}

impl<'a> PrerollContext<'a> {
    /// Creates a context culling to `cull_rect`, with no cache or embedder.
    #[must_use]
    pub fn new(cull_rect: Rect) -> Self {
        Self {
            cull_rect,
            raster_cache: None,
            embedder: None,
            mutators: MutatorStack::new(),
        }
    }

    /// Attaches a raster cache.
    #[must_use]
    pub fn with_raster_cache(mut self, cache: &'a mut dyn RasterCache) -> Self {
        self.raster_cache = Some(cache);
        self
    }

    /// Attaches a platform-view embedder.
    #[must_use]
    pub fn with_embedder(mut self, embedder: &'a mut dyn PlatformViewEmbedder) -> Self {
        self.embedder = Some(embedder);
        self
    }
}

/// Computes bounds and visibility for every node reachable from `root`.
///
/// `matrix` is the transform from `root`'s coordinates to device space; it is
/// what the raster cache and platform views see.
pub fn preroll(arena: &LayerArena, root: LayerId, ctx: &mut PrerollContext<'_>, matrix: Affine) -> PrerollState {
    let mut state = PrerollState {
        session: arena.session(),
        root: Some(root),
        visits: Vec::with_capacity(arena.len()),
        local: vec![UNVISITED; arena.len()],
        has_platform_view: false,
    };
    Walk {
        ctx,
        state: &mut state,
    }
    .node(arena, root, true, matrix);
    state
}

struct Walk<'w, 'a> {
    ctx: &'w mut PrerollContext<'a>,
    state: &'w mut PrerollState,
}

impl Walk<'_, '_> {
    fn node(&mut self, arena: &LayerArena, id: LayerId, local: bool, matrix: Affine) -> Rect {
        let visit = self.state.visits.len();
        self.state.visits.push(NodeState::default());
        if local {
            self.state.local[id.slot()] = u32::try_from(visit).unwrap_or(UNVISITED);
        }
        let cull = self.ctx.cull_rect;
        let layer = arena.layer(id);

        let (bounds, visible) = match layer {
            Layer::Container | Layer::ColorFilter(_) | Layer::ShaderMask(_) => {
                (self.children(arena, id, local, matrix), true)
            }
            Layer::ClipRect(_) | Layer::ClipRRect(_) | Layer::ClipPath(_) => {
                let b = match layer.clip() {
                    Some((shape, _)) => self.clipped(arena, id, local, matrix, shape),
                    None => self.children(arena, id, local, matrix),
                };
                (b, true)
            }
            Layer::Opacity(l) => {
                let shift = Affine::translate(l.offset);
                self.ctx.mutators.push(Mutator::Transform(shift));
                self.ctx.mutators.push(Mutator::Opacity(l.alpha));
                self.ctx.cull_rect = cull - l.offset;
                let child = self.children(arena, id, local, matrix * shift);
                self.ctx.cull_rect = cull;
                self.ctx.mutators.pop();
                self.ctx.mutators.pop();
                let b = if is_empty(child) { Rect::ZERO } else { child + l.offset };
                (b, l.alpha > 0)
            }
            Layer::ImageFilter(l) => {
                let child = self.children(arena, id, local, matrix);
                let b = if is_empty(child) { child } else { l.filter.map_bounds(child) };
                (b, true)
            }
            Layer::BackdropFilter(_) => {
                let child = self.children(arena, id, local, matrix);
                (join(child, cull), true)
            }
            Layer::Transform(l) => {
                let t = l.transform.to_affine();
                let det = t.determinant();
                let invertible = det.is_finite() && det.abs() > f64::EPSILON;
                self.ctx.mutators.push(Mutator::Transform(t));
                self.ctx.cull_rect = if invertible {
                    t.inverse().transform_rect_bbox(cull)
                } else {
                    Rect::ZERO
                };
                let child = self.children(arena, id, local, matrix * t);
                self.ctx.cull_rect = cull;
                self.ctx.mutators.pop();
                let b = if invertible && !is_empty(child) {
                    t.transform_rect_bbox(child)
                } else {
                    Rect::ZERO
                };
                (b, true)
            }
            Layer::PhysicalShape(l) => {
                let child = match layer.clip() {
                    Some((shape, _)) => self.clipped(arena, id, local, matrix, shape),
                    None => self.children(arena, id, local, matrix),
                };
                (join(l.shape_bounds(), child), true)
            }
            Layer::Picture(l) => {
                let b = l.picture.cull_rect() + l.offset;
                if !is_empty(meet(b, cull)) {
                    if let Some(cache) = self.ctx.raster_cache.as_deref_mut() {
                        let m = matrix * Affine::translate(l.offset);
                        cache.prepare(&l.picture, &m, l.is_complex, l.will_change);
                    }
                }
                (b, true)
            }
            Layer::Texture(l) => (Rect::from_origin_size(l.offset.to_point(), l.size), true),
            Layer::PlatformView(l) => {
                self.state.has_platform_view = true;
                if let Some(embedder) = self.ctx.embedder.as_deref_mut() {
                    embedder.prepare_view(EmbeddedViewParams {
                        view_id: l.view_id,
                        offset: l.offset,
                        size: l.size,
                        transform: matrix,
                        mutators: self.ctx.mutators.clone(),
                    });
                }
                (Rect::from_origin_size(l.offset.to_point(), l.size), true)
            }
            Layer::PerformanceOverlay(l) => (l.bounds, true),
        };

        let needs_painting = visible && !is_empty(bounds) && !is_empty(meet(bounds, cull));
        self.state.visits[visit] = NodeState {
            paint_bounds: bounds,
            needs_painting,
            end: u32::try_from(self.state.visits.len()).unwrap_or(UNVISITED),
        };
        bounds
    }

    fn clipped(&mut self, arena: &LayerArena, id: LayerId, local: bool, matrix: Affine, shape: ClipShape) -> Rect {
        let cull = self.ctx.cull_rect;
        let clip_bounds = shape.bounds();
        self.ctx.cull_rect = meet(cull, clip_bounds);
        self.ctx.mutators.push(Mutator::Clip(shape));
        let child = self.children(arena, id, local, matrix);
        self.ctx.mutators.pop();
        self.ctx.cull_rect = cull;
        meet(child, clip_bounds)
    }

    fn children(&mut self, arena: &LayerArena, id: LayerId, local: bool, matrix: Affine) -> Rect {
        let mut acc = Rect::ZERO;
        for slot in arena.children(id) {
            let b = match slot {
                ChildSlot::Local(c) => self.node(arena, *c, local, matrix),
                ChildSlot::Retained(handle) => match handle.arena() {
                    Some(other) => self.node(other, handle.layer_id(), false, matrix),
                    None => {
                        log::warn!("skipping unbuilt retained layer {handle:?}");
                        Rect::ZERO
                    }
                },
            };
            acc = join(acc, b);
        }
        acc
    }
}
