//! Cooperative yield hook
//!
//! Every wait in the runtime (blocking bus transactions, waiting for the
//! display to drain, waiting for VSync) polls a condition and calls
//! [`Yield::yield_now`] between polls. On the device this services USB
//! and other registered background work; in tests it is where simulated
//! hardware completes pending operations.

/// Cooperative yield
///
/// Never preempts the caller and never hands control to another
/// application; it only runs background work before returning.
pub trait Yield {
    /// Run pending background work once
    fn yield_now(&mut self);
}

impl<F: FnMut()> Yield for F {
    fn yield_now(&mut self) {
        self()
    }
}

/// Yield hook that does nothing (pure spin)
#[derive(Debug, Clone, Copy, Default)]
pub struct NoYield;

impl Yield for NoYield {
    fn yield_now(&mut self) {}
}
