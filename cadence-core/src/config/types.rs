//! Configuration type definitions

use cadence_hal::{I2cConfig, RefreshDirection};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Native display width in pixels
pub const WIDTH: u16 = 320;

/// Native display height in pixels
pub const HEIGHT: u16 = 240;

/// Maximum depth of the application stack
pub const MAX_NESTED_APPS: usize = 8;

/// Default number of logic-only cycles run when an application gains focus
pub const DEFAULT_WARMUP_CYCLES: u8 = 2;

/// Refresh direction as stored in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Direction {
    RowFirst,
    #[default]
    ColumnFirst,
}

impl From<Direction> for RefreshDirection {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::RowFirst => RefreshDirection::RowFirst,
            Direction::ColumnFirst => RefreshDirection::ColumnFirst,
        }
    }
}

/// Bus configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BusConfig {
    /// I2C clock in Hz
    pub frequency: u32,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            frequency: I2cConfig::FAST.frequency,
        }
    }
}

impl BusConfig {
    /// HAL-level controller configuration
    pub fn i2c(&self) -> I2cConfig {
        I2cConfig {
            frequency: self.frequency,
        }
    }
}

/// Display configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DisplayConfig {
    /// Width in pixels (number of columns)
    pub width: u16,
    /// Height in pixels (pixels per column)
    pub height: u16,
    /// Refresh direction programmed at boot
    pub direction: Direction,
    /// Wait for the tearing signal before streaming each frame
    pub wait_vsync: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: WIDTH,
            height: HEIGHT,
            direction: Direction::ColumnFirst,
            wait_vsync: true,
        }
    }
}

/// Frame scheduler configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SchedulerConfig {
    /// Logic-only cycles run on focus to flush stale input edges
    pub warmup_cycles: u8,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            warmup_cycles: DEFAULT_WARMUP_CYCLES,
        }
    }
}

/// Complete runtime configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RuntimeConfig {
    pub bus: BusConfig,
    pub display: DisplayConfig,
    pub scheduler: SchedulerConfig,
}
