//! Monotonic time source

/// Monotonic microsecond clock
///
/// Used by the frame scheduler for phase timing and the FPS counter.
/// Must never go backwards; wrap-around is not expected within the
/// lifetime of the device (64 bits of microseconds).
pub trait Clock {
    /// Microseconds since an arbitrary fixed epoch (usually boot)
    fn now_us(&self) -> u64;
}
