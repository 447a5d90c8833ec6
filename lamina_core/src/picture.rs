// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Immutable recordings of fill commands.
//!
//! A [`Picture`] is what a picture layer draws. It is produced by a
//! [`PictureRecorder`], shared by reference count, and replayed onto a
//! [`Canvas`](crate::canvas::Canvas) during Paint (or rasterized once into the
//! raster cache).

use core::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use kurbo::{BezPath, Rect, RoundedRect, Shape};

use crate::paint::Color;

/// Process-unique identity of a recorded picture.
///
/// Raster cache entries are keyed by this id, so two pictures never share an
/// entry even when their commands are identical.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PictureId(u64);

impl PictureId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw id value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for PictureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PictureId({})", self.0)
    }
}

/// One recorded fill.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    /// Fill an axis-aligned rectangle.
    FillRect {
        /// Rectangle in picture space.
        rect: Rect,
        /// Fill color.
        color: Color,
    },
    /// Fill a rounded rectangle.
    FillRoundedRect {
        /// Shape in picture space.
        rect: RoundedRect,
        /// Fill color.
        color: Color,
    },
    /// Fill an arbitrary path with the non-zero rule.
    FillPath {
        /// Path in picture space.
        path: BezPath,
        /// Fill color.
        color: Color,
    },
}

impl DrawCommand {
    /// Bounding box of the pixels this command can touch.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        match self {
            Self::FillRect { rect, .. } => *rect,
            Self::FillRoundedRect { rect, .. } => rect.bounding_box(),
            Self::FillPath { path, .. } => path.bounding_box(),
        }
    }
}

#[derive(Debug)]
struct PictureData {
    id: PictureId,
    cull_rect: Rect,
    commands: Vec<DrawCommand>,
}

/// A shared, immutable list of draw commands with a cull rectangle.
#[derive(Clone)]
pub struct Picture {
    data: Arc<PictureData>,
}

impl Picture {
    /// Returns this picture's identity.
    #[inline]
    #[must_use]
    pub fn id(&self) -> PictureId {
        self.data.id
    }

    /// The rectangle outside of which the picture draws nothing.
    #[inline]
    #[must_use]
    pub fn cull_rect(&self) -> Rect {
        self.data.cull_rect
    }

    /// The recorded commands in replay order.
    #[inline]
    #[must_use]
    pub fn commands(&self) -> &[DrawCommand] {
        &self.data.commands
    }

    /// Number of recorded commands.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.commands.len()
    }

    /// Returns `true` if nothing was recorded.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.commands.is_empty()
    }
}

impl PartialEq for Picture {
    fn eq(&self, other: &Self) -> bool {
        self.data.id == other.data.id
    }
}

impl fmt::Debug for Picture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Picture")
            .field("id", &self.data.id)
            .field("cull_rect", &self.data.cull_rect)
            .field("commands", &self.data.commands.len())
            .finish()
    }
}

/// Accumulates fill commands into a [`Picture`].
#[derive(Debug, Default)]
pub struct PictureRecorder {
    commands: Vec<DrawCommand>,
    bounds: Option<Rect>,
}

impl PictureRecorder {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, cmd: DrawCommand) -> &mut Self {
        let b = cmd.bounds();
        self.bounds = Some(self.bounds.map_or(b, |acc| acc.union(b)));
        self.commands.push(cmd);
        self
    }

    /// Records a rectangle fill.
    pub fn fill_rect(&mut self, rect: Rect, color: Color) -> &mut Self {
        self.push(DrawCommand::FillRect { rect, color })
    }

    /// Records a rounded rectangle fill.
    pub fn fill_rounded_rect(&mut self, rect: RoundedRect, color: Color) -> &mut Self {
        self.push(DrawCommand::FillRoundedRect { rect, color })
    }

    /// Records a path fill.
    pub fn fill_path(&mut self, path: BezPath, color: Color) -> &mut Self {
        self.push(DrawCommand::FillPath { path, color })
    }

    /// Finishes recording. The cull rect is the union of command bounds.
    #[must_use]
    pub fn finish(self) -> Picture {
        let cull = self.bounds.unwrap_or(Rect::ZERO);
        self.finish_with_cull_rect(cull)
    }

    /// Finishes recording with an explicit cull rect.
    #[must_use]
    pub fn finish_with_cull_rect(self, cull_rect: Rect) -> Picture {
        Picture {
            data: Arc::new(PictureData {
                id: PictureId::next(),
                cull_rect,
                commands: self.commands,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cull_rect_is_union_of_commands() {
        let mut rec = PictureRecorder::new();
        rec.fill_rect(Rect::new(0.0, 0.0, 10.0, 10.0), Color::from_rgba8(255, 0, 0, 255))
            .fill_rect(Rect::new(20.0, 5.0, 30.0, 40.0), Color::from_rgba8(0, 0, 255, 255));
        let pic = rec.finish();
        assert_eq!(pic.cull_rect(), Rect::new(0.0, 0.0, 30.0, 40.0), "union of fills");
        assert_eq!(pic.len(), 2, "two commands recorded");
    }

    #[test]
    fn empty_recorder_yields_empty_picture() {
        let pic = PictureRecorder::new().finish();
        assert!(pic.is_empty(), "no commands");
        assert_eq!(pic.cull_rect(), Rect::ZERO, "empty cull rect");
    }

    #[test]
    fn ids_are_unique_and_clones_share_identity() {
        let a = PictureRecorder::new().finish();
        let b = PictureRecorder::new().finish();
        assert_ne!(a.id(), b.id(), "distinct recordings have distinct ids");
        let a2 = a.clone();
        assert_eq!(a, a2, "clones are the same picture");
    }
}
