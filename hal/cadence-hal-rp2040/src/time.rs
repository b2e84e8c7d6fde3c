//! Monotonic clock backed by the embassy time driver

use embassy_time::Instant;

/// Microsecond clock over `embassy_time::Instant`
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyClock;

impl cadence_hal::Clock for EmbassyClock {
    fn now_us(&self) -> u64 {
        Instant::now().as_micros()
    }
}
