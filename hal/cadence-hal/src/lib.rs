//! Cadence Hardware Abstraction Layer
//!
//! This crate defines the boundary between the Cadence runtime and the
//! chip it runs on. Everything behind these traits is register-level
//! plumbing; everything in front of them is board-agnostic and can be
//! exercised on the host against simulated hardware.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  cadence-core / cadence-display         │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  cadence-hal (this crate - traits)      │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ cadence-hal-  │       │  host mocks   │
//! │    rp2040     │       │  (unit tests) │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`i2c::I2cFifo`] - Register-level I2C master command/receive FIFOs
//! - [`display::DisplayDriver`] - Display controller commands, pixel DMA and tearing signal
//! - [`gpio::InputPin`] - Digital input
//! - [`time::Clock`] - Monotonic microsecond clock
//! - [`cooperative::Yield`] - Cooperative yield hook used by every busy-wait

#![no_std]
#![deny(unsafe_code)]

pub mod cooperative;
pub mod display;
pub mod gpio;
pub mod i2c;
pub mod time;

// Re-export key traits at crate root for convenience
pub use cooperative::{NoYield, Yield};
pub use display::{DisplayDriver, Pixel, Rect, RefreshDirection};
pub use gpio::InputPin;
pub use i2c::{Cause, DataCmd, I2cConfig, I2cFifo, InterruptMask};
pub use time::Clock;
