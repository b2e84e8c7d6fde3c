//! Platform services used by the frame scheduler

use cadence_hal::{Clock, Yield};

/// Device services outside the display pipeline
///
/// The clock times phases and FPS; the cooperative yield is used by every
/// wait the runtime performs.
pub trait Platform: Clock + Yield {
    /// Latch the current input state (button edges, etc.)
    fn poll_input(&mut self);

    /// Background heartbeat, run once per frame independent of rendering
    ///
    /// `fps` is the last value published by the frame counter, 0 until the
    /// first one-second window completes.
    fn tick(&mut self, fps: u32);
}
