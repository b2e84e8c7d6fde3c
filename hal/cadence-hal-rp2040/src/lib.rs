//! RP2040-specific HAL for the Cadence runtime
//!
//! This crate provides RP2040 implementations of the shared `cadence-hal`
//! traits:
//!
//! - Register-level I2C master FIFO (implements `cadence_hal::I2cFifo`)
//! - ST7789 display driver fed by a DMA channel into SPI
//!   (implements `cadence_hal::DisplayDriver`)
//! - Tearing-effect input pin (implements `cadence_hal::InputPin`)
//! - Monotonic clock over `embassy-time` (implements `cadence_hal::Clock`)
//!
//! Peripherals are brought up (pins, clocks, baud rates) with the regular
//! embassy-rp drivers; the types here then take over the registers for
//! interrupt-driven operation.

#![no_std]

pub mod gpio;
pub mod i2c;
pub mod st7789;
pub mod time;

pub use gpio::TePin;
pub use i2c::Rp2040I2c;
pub use st7789::St7789;
pub use time::EmbassyClock;

// Re-export shared traits from cadence-hal for convenience
pub use cadence_hal::{Clock, DisplayDriver, I2cFifo, InputPin};
