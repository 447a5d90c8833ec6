// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types for scene construction and frame validation.

use thiserror::Error;

/// A frame that cannot be rasterized.
///
/// Malformed trees are dropped before they reach the pipeline; this error
/// says why.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
#[non_exhaustive]
pub enum FrameError {
    /// The frame size has a zero, negative, or non-finite dimension.
    #[error("frame size {width}x{height} is empty")]
    EmptyFrameSize {
        /// Requested width in physical pixels.
        width: f64,
        /// Requested height in physical pixels.
        height: f64,
    },
    /// The device pixel ratio is not a positive finite number.
    #[error("device pixel ratio {0} is not positive")]
    InvalidDevicePixelRatio(f64),
    /// The physical depth is not a positive finite number.
    #[error("physical depth {0} is not positive")]
    InvalidPhysicalDepth(f64),
    /// Paint was requested before Preroll computed bounds for the tree.
    #[error("layer tree painted before preroll")]
    NotPrerolled,
}

/// A precondition violation while building a scene.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum SceneError {
    /// A clip-path layer was pushed with [`Clip::None`](crate::layer::Clip::None).
    #[error("clip path pushed with clip behavior none")]
    ClipBehaviorNone,
    /// A retained layer handle refers to a scene that has not been built yet.
    #[error("retained layer belongs to a scene that has not been built")]
    RetainedLayerNotBuilt,
}
