//! Frame scheduler
//!
//! Applications implement [`App`] and are run by a [`Runtime`], which owns
//! the stack of nested applications and drives the per-frame cycle:
//!
//! ```text
//! update ──► tick ──► wait-for-render ──► draw ──► render
//!   ▲                                                 │
//!   └─────────────────────────────────────────────────┘
//! ```
//!
//! `wait-for-render` is the only synchronization point between the
//! display transfer of frame N and the drawing of frame N+1.

pub mod platform;
pub mod runtime;

pub use platform::Platform;
pub use runtime::{Runtime, RuntimeError};

use cadence_display::ColumnSource;

/// An application run by the frame scheduler
///
/// Rendering goes through the [`ColumnSource`] supertrait: after
/// [`draw`](Self::draw) the runtime asks the application for one display
/// column at a time.
pub trait App: ColumnSource {
    /// Called once when the application gains focus, before the warm-up
    /// updates. Typically programs the update region.
    fn on_focus(&mut self, _rt: &mut Runtime<'_>) {}

    /// Per-frame logic: read input, issue bus transactions, call
    /// [`Runtime::exit`] or launch nested applications with
    /// [`Runtime::run`].
    fn update(&mut self, rt: &mut Runtime<'_>);

    /// Prepare frame state for rendering; the previous frame has fully
    /// left the display buffers when this is called.
    fn draw(&mut self, _rt: &mut Runtime<'_>) {}

    /// Called once after the last frame has finished transferring
    fn on_blur(&mut self, _rt: &mut Runtime<'_>) {}
}
