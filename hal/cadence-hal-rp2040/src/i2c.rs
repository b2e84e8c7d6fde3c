//! Register-level I2C master
//!
//! The controller is first configured with `embassy_rp::i2c::I2c` (pin
//! functions, timing); [`Rp2040I2c`] then drives its command and receive
//! FIFOs directly so a whole transaction can run from interrupts.

use cadence_hal::{Cause, DataCmd, I2cFifo, InterruptMask};
use embassy_rp::pac;

/// I2C controller FIFO access
pub struct Rp2040I2c {
    regs: pac::i2c::I2c,
}

impl Rp2040I2c {
    /// Controller I2C0
    pub const fn i2c0() -> Self {
        Self { regs: pac::I2C0 }
    }

    /// Controller I2C1
    pub const fn i2c1() -> Self {
        Self { regs: pac::I2C1 }
    }

    /// Prepare the already-configured controller for FIFO-driven use
    ///
    /// Transmit-empty only fires once the last command has completed on
    /// the wire, and all interrupts start masked.
    pub fn init(&mut self) {
        let p = self.regs;
        p.ic_enable().write(|w| w.set_enable(false));
        p.ic_con().modify(|w| w.set_tx_empty_ctrl(true));
        p.ic_tx_tl().write(|w| w.set_tx_tl(0));
        p.ic_intr_mask().write_value(pac::i2c::regs::IcIntrMask::default());
        p.ic_enable().write(|w| w.set_enable(true));
    }
}

impl I2cFifo for Rp2040I2c {
    fn restart(&mut self, address: u8) {
        let p = self.regs;
        p.ic_enable().write(|w| w.set_enable(false));
        p.ic_tar().write(|w| w.set_ic_tar(address as u16));
        p.ic_enable().write(|w| w.set_enable(true));
    }

    fn push(&mut self, cmd: DataCmd) {
        let p = self.regs;
        match cmd {
            DataCmd::Write { byte, stop } => p.ic_data_cmd().write(|w| {
                w.set_dat(byte);
                w.set_stop(stop);
            }),
            DataCmd::Read { restart, stop } => p.ic_data_cmd().write(|w| {
                w.set_cmd(true);
                w.set_restart(restart);
                w.set_stop(stop);
            }),
        }
    }

    fn set_rx_threshold(&mut self, level: u8) {
        self.regs.ic_rx_tl().write(|w| w.set_rx_tl(level));
    }

    fn enable_interrupts(&mut self, mask: InterruptMask) {
        self.regs.ic_intr_mask().write(|w| {
            w.set_m_tx_abrt(true);
            match mask {
                InterruptMask::TxEmpty => w.set_m_tx_empty(true),
                InterruptMask::RxFull => w.set_m_rx_full(true),
            }
        });
    }

    fn disable_interrupts(&mut self) {
        self.regs
            .ic_intr_mask()
            .write_value(pac::i2c::regs::IcIntrMask::default());
    }

    fn take_cause(&mut self) -> Cause {
        let p = self.regs;
        if p.ic_raw_intr_stat().read().tx_abrt() {
            // Reading the clear register acknowledges the abort
            let _ = p.ic_clr_tx_abrt().read();
            Cause::Abort
        } else {
            Cause::Complete
        }
    }

    fn rx_level(&self) -> u8 {
        self.regs.ic_rxflr().read().rxflr()
    }

    fn pop(&mut self) -> u8 {
        self.regs.ic_data_cmd().read().dat()
    }
}
