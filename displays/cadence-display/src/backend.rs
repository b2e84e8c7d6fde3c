//! Display backend trait
//!
//! Object-safe interface to the display pipeline, so the frame scheduler
//! and applications can hold a `&dyn DisplayBackend` without knowing the
//! concrete display driver.

use cadence_hal::{Rect, RefreshDirection, Yield};

use crate::pipeline::{Buffer, Callback};

/// Display backend trait
///
/// All methods take `&self`: the same backend is shared with the DMA
/// completion interrupt, so implementations use interior mutability.
pub trait DisplayBackend {
    /// Reprogram the window receiving subsequent pixel writes
    ///
    /// Leaves streaming mode first, waiting for outstanding transfers.
    fn set_update_region(&self, region: Rect, y: &mut dyn Yield);

    /// Reprogram the pixel traversal order
    ///
    /// Leaves streaming mode first, waiting for outstanding transfers.
    fn set_refresh_direction(&self, direction: RefreshDirection, y: &mut dyn Yield);

    /// Currently programmed update region
    fn update_region(&self) -> Rect;

    /// Currently programmed refresh direction
    fn refresh_direction(&self) -> RefreshDirection;

    /// Queue `count` pixels from `buffer` for transfer
    ///
    /// `on_complete` is invoked once, from interrupt context, when this
    /// buffer's transfer finishes.
    fn submit(&self, buffer: Buffer, count: usize, on_complete: Option<Callback>);

    /// Take back a buffer whose transfer has completed
    fn reclaim(&self) -> Option<Buffer>;

    /// Whether any submitted transfer has not completed yet
    fn busy(&self) -> bool;

    /// Yield until the tearing signal marks the start of a blanking interval
    fn wait_vsync(&self, y: &mut dyn Yield);

    /// Yield until every submitted transfer has completed
    fn wait_idle(&self, y: &mut dyn Yield) {
        while self.busy() {
            y.yield_now();
        }
    }
}
