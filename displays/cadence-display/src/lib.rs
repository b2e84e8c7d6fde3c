//! Display pipeline and renderer for Cadence
//!
//! This crate provides:
//! - [`DisplayPipeline`] - interrupt-driven DMA streaming into a display
//!   controller, generic over a [`cadence_hal::DisplayDriver`]
//! - [`DisplayBackend`] - object-safe view of the pipeline used by the
//!   frame scheduler
//! - [`ColumnRenderer`] - column-wise, double-buffered frame renderer that
//!   overlaps pixel computation with DMA transfer
//!
//! # Architecture
//!
//! ```text
//!  main loop                          DMA completion IRQ
//!  ─────────                          ──────────────────
//!  ColumnRenderer::stream
//!    render column W-1 ─┐
//!    render column W-2 ─┼─ submit ──► in flight ──► on_interrupt
//!    reclaim ◄──────────┘             queued   ───►   start queued
//!    render column W-3 ── submit ──►                  callback
//!    ...                                              busy -= 1
//! ```
//!
//! Ownership of a pixel buffer moves into the pipeline on `submit` and
//! back out through `reclaim` once its transfer has completed, so a
//! buffer is never written while DMA reads it.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

mod fmt;

pub mod backend;
pub mod pipeline;
pub mod renderer;

// Re-export key types
pub use backend::DisplayBackend;
pub use pipeline::{Buffer, Callback, DisplayPipeline, Mode, MAX_BUFFERS};
pub use renderer::{ColumnRenderer, ColumnSource};
