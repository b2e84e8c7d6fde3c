//! Board services for the frame scheduler
//!
//! The input controller (an AVR at `INPUT_CHIP`) reports button and power
//! state as a short status block. The status is requested asynchronously
//! once per frame from `tick` and latched into the button state by
//! `poll_input` at the start of the next frame.

use core::cell::Cell;

use cadence_core::app::Platform;
use cadence_core::bus::{Response, TransactionQueue};
use cadence_hal::{Cause, Clock, Yield};
use cadence_hal_rp2040::{EmbassyClock, Rp2040I2c};
use defmt::*;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use portable_atomic::{AtomicBool, AtomicU32, Ordering};

/// Bus queue capacity (slab slots)
pub const BUS_SLOTS: usize = 16;

/// Interrupt-driven I2C transaction queue on I2C0
pub type Bus = TransactionQueue<Rp2040I2c, BUS_SLOTS>;

/// I2C address of the input controller
pub const INPUT_CHIP: u8 = 0x43;

/// Size of the input controller's status block
pub const STATUS_LEN: usize = 6;

/// Last published frames per second
pub static FPS: AtomicU32 = AtomicU32::new(0);

/// Raw status block, written from the bus interrupt
static STATUS: Mutex<CriticalSectionRawMutex, Cell<[u8; STATUS_LEN]>> =
    Mutex::new(Cell::new([0; STATUS_LEN]));

/// A status request is queued or in flight
static STATUS_PENDING: AtomicBool = AtomicBool::new(false);

/// Latched button state for the current frame
static BUTTONS: Mutex<CriticalSectionRawMutex, Cell<Buttons>> =
    Mutex::new(Cell::new(Buttons::new()));

/// Buttons, as bits of the first status byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
#[repr(u8)]
pub enum Button {
    Up = 0x01,
    Down = 0x02,
    Left = 0x04,
    Right = 0x08,
    A = 0x10,
    B = 0x20,
    Select = 0x40,
    Start = 0x80,
}

/// Button state of the current and the previous frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Buttons {
    current: u8,
    previous: u8,
}

impl Buttons {
    pub const fn new() -> Self {
        Self {
            current: 0,
            previous: 0,
        }
    }

    fn latch(self, raw: u8) -> Self {
        Self {
            current: raw,
            previous: self.current,
        }
    }

    /// Button is held down
    pub fn down(&self, button: Button) -> bool {
        self.current & button as u8 != 0
    }

    /// Button went down since the previous frame
    pub fn pressed(&self, button: Button) -> bool {
        self.down(button) && self.previous & button as u8 == 0
    }

    /// Button was let go since the previous frame
    pub fn released(&self, button: Button) -> bool {
        !self.down(button) && self.previous & button as u8 != 0
    }
}

/// Button state latched by the most recent `poll_input`
pub fn buttons() -> Buttons {
    BUTTONS.lock(Cell::get)
}

fn on_status(response: &Response) {
    if response.cause() == Cause::Complete && response.len() == STATUS_LEN {
        let mut raw = [0u8; STATUS_LEN];
        response.copy_to(&mut raw);
        STATUS.lock(|status| status.set(raw));
    }
    STATUS_PENDING.store(false, Ordering::Release);
}

/// Platform implementation for the device
pub struct Device {
    clock: EmbassyClock,
    bus: &'static Bus,
    last_report_us: u64,
}

impl Device {
    pub fn new(bus: &'static Bus) -> Self {
        Self {
            clock: EmbassyClock,
            bus,
            last_report_us: 0,
        }
    }

    fn request_status(&mut self) {
        if STATUS_PENDING.swap(true, Ordering::AcqRel) {
            return;
        }
        if self
            .bus
            .enqueue(INPUT_CHIP, &[], STATUS_LEN, Some(on_status))
            .is_err()
        {
            STATUS_PENDING.store(false, Ordering::Release);
            warn!("Bus queue full, status request dropped");
        }
    }

    fn report_fps(&mut self) {
        let now = self.clock.now_us();
        if now.saturating_sub(self.last_report_us) >= 1_000_000 {
            self.last_report_us = now;
            info!("{} fps", FPS.load(Ordering::Relaxed));
        }
    }
}

impl Clock for Device {
    fn now_us(&self) -> u64 {
        self.clock.now_us()
    }
}

impl Yield for Device {
    fn yield_now(&mut self) {
        // All background work is interrupt driven
        core::hint::spin_loop();
    }
}

impl Platform for Device {
    fn poll_input(&mut self) {
        let raw = STATUS.lock(|status| status.get()[0]);
        BUTTONS.lock(|buttons| buttons.set(buttons.get().latch(raw)));
    }

    fn tick(&mut self, fps: u32) {
        FPS.store(fps, Ordering::Relaxed);
        self.request_status();
        self.report_fps();
    }
}
