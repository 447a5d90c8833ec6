// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recording, pretty-printing, and Chrome trace export for lamina
//! diagnostics.
//!
//! This crate provides [`TraceSink`](lamina_core::trace::TraceSink)
//! implementations for development and post-mortem analysis:
//!
//! - [`pretty::PrettyPrintSink`]: one human-readable line per event.
//! - [`recorder::RecorderSink`]: compact binary recording, played back with
//!   [`recorder::decode`].
//! - [`chrome::export`]: Chrome Trace Event Format JSON from recorded bytes.
//!
//! A shell takes its sink as `Arc<parking_lot::Mutex<dyn TraceSink + Send>>`;
//! [`recorder::RecorderSink::shared`] builds one whose bytes stay readable
//! from the test or tool that installed it.

pub mod chrome;
pub mod pretty;
pub mod recorder;
