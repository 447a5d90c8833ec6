// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors surfaced by [`Shell`](crate::Shell).

use core::time::Duration;
use std::io;

use thiserror::Error;

/// A shell operation that could not be carried out.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ShellError {
    /// A task runner thread could not be started.
    #[error("failed to spawn task runner threads")]
    Spawn(#[from] io::Error),
    /// The surface handed to the rasterizer is not usable.
    #[error("surface is not valid")]
    InvalidSurface,
    /// No frame was presented within the allotted time.
    #[error("no frame presented within {0:?}")]
    Timeout(Duration),
    /// The shell has already been shut down.
    #[error("shell already shut down")]
    AlreadyShutDown,
}
