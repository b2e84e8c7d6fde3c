//! I2C bus abstractions
//!
//! Unlike a blocking `write_read` style bus, the runtime drives the I2C
//! master at FIFO level: a whole transaction is pushed into the command
//! FIFO up front and the controller raises an interrupt when it is done.
//! Implementations only need to expose those register-level primitives.

/// Maximum number of entries the controller's command FIFO can hold
pub const FIFO_DEPTH: usize = 16;

/// A single entry pushed into the controller's command FIFO
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataCmd {
    /// Transmit a data byte, optionally issuing STOP after it
    Write { byte: u8, stop: bool },
    /// Clock in one byte from the peer
    ///
    /// `restart` issues a repeated START before the byte (direction change
    /// after a write phase), `stop` issues STOP after it.
    Read { restart: bool, stop: bool },
}

/// Why the controller raised its completion interrupt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Cause {
    /// Transmit FIFO drained or receive FIFO reached its threshold
    Complete,
    /// Transmission aborted (NACK, arbitration loss, ...)
    Abort,
}

/// Interrupt sources armed for an in-flight transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterruptMask {
    /// Write-only transaction: transmit empty or abort
    TxEmpty,
    /// Transaction with a read phase: receive above threshold or abort
    RxFull,
}

/// Register-level I2C master
///
/// All methods are called either from the main loop while the bus is
/// idle, or from the bus completion interrupt. The runtime guarantees
/// at most one transaction is programmed at a time.
pub trait I2cFifo {
    /// Disable the controller, set the target address and re-enable it
    fn restart(&mut self, address: u8);

    /// Push one entry into the command FIFO
    fn push(&mut self, cmd: DataCmd);

    /// Set the receive FIFO threshold (interrupt fires above `level`)
    fn set_rx_threshold(&mut self, level: u8);

    /// Arm the completion interrupt
    fn enable_interrupts(&mut self, mask: InterruptMask);

    /// Mask all bus interrupts
    fn disable_interrupts(&mut self);

    /// Read and clear the completion cause
    fn take_cause(&mut self) -> Cause;

    /// Number of bytes currently held in the receive FIFO
    fn rx_level(&self) -> u8;

    /// Pop one byte from the receive FIFO
    fn pop(&mut self) -> u8;
}

/// I2C configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct I2cConfig {
    /// Clock frequency in Hz
    pub frequency: u32,
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self::FAST
    }
}

impl I2cConfig {
    /// Standard mode (100 kHz)
    pub const STANDARD: Self = Self { frequency: 100_000 };

    /// Fast mode (400 kHz)
    pub const FAST: Self = Self { frequency: 400_000 };

    /// Fast mode plus (1 MHz)
    pub const FAST_PLUS: Self = Self {
        frequency: 1_000_000,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_fast_mode() {
        assert_eq!(I2cConfig::default().frequency, 400_000);
    }
}
