//! Cadence - Handheld Runtime Firmware
//!
//! Device binary for RP2040-based handhelds: brings up the I2C bus and
//! the ST7789 panel, binds their interrupts to the runtime and runs the
//! demo application stack.

#![no_std]
#![no_main]

use cadence_core::app::Runtime;
use cadence_core::config::{RuntimeConfig, HEIGHT, WIDTH};
use cadence_display::{ColumnRenderer, DisplayPipeline};
use cadence_hal::{NoYield, Pixel, Rect, RefreshDirection};
use cadence_hal_rp2040::{Rp2040I2c, St7789, TePin};
use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::i2c::{self, I2c};
use embassy_rp::interrupt;
use embassy_rp::interrupt::InterruptExt;
use embassy_rp::peripherals::{I2C0, SPI0};
use embassy_rp::spi::{self, Blocking, Spi};
use embassy_time::Delay;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use crate::board::{Bus, Device, INPUT_CHIP};
use crate::demo::Gradient;

mod board;
mod demo;

/// DMA channel reserved for pixel transfers
const DISPLAY_DMA_CH: usize = 0;

/// SPI clock for the panel
const DISPLAY_SPI_HZ: u32 = 62_500_000;

/// Pixels in one native column
const COLUMN_LEN: usize = HEIGHT as usize;

/// Chips reported at boot
const KNOWN_CHIPS: [(&str, u8); 3] = [
    ("input controller", INPUT_CHIP),
    ("accelerometer", 0x6A),
    ("light sensor", 0x53),
];

type Panel = St7789<Spi<'static, SPI0, Blocking>, Output<'static>, TePin<'static>>;

/// Bus queue shared with `I2C0_IRQ`
static BUS: Bus = Bus::new(Rp2040I2c::i2c0());

/// Display pipeline shared with `DMA_IRQ_1`
static DISPLAY: DisplayPipeline<Panel> = DisplayPipeline::new(
    St7789::spi0(DISPLAY_DMA_CH),
    Rect::wh(WIDTH, HEIGHT),
    RefreshDirection::ColumnFirst,
);

// The embassy driver only configures the controller; it must outlive the
// queue driving its FIFOs
static I2C_DRIVER: StaticCell<I2c<'static, I2C0, i2c::Blocking>> = StaticCell::new();

// Column buffers handed to the renderer
static FRONT: StaticCell<[Pixel; COLUMN_LEN]> = StaticCell::new();
static BACK: StaticCell<[Pixel; COLUMN_LEN]> = StaticCell::new();

#[interrupt]
unsafe fn I2C0_IRQ() {
    BUS.on_interrupt();
}

#[interrupt]
unsafe fn DMA_IRQ_1() {
    DISPLAY.on_interrupt();
}

/// Main entry point
#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    info!("Cadence firmware starting...");

    let p = embassy_rp::init(Default::default());
    let config = RuntimeConfig::default();
    info!("Peripherals initialized");

    // I2C0 on GPIO4 (SDA) / GPIO5 (SCL)
    let mut i2c_config = i2c::Config::default();
    i2c_config.frequency = config.bus.i2c().frequency;
    I2C_DRIVER.init(I2c::new_blocking(p.I2C0, p.PIN_5, p.PIN_4, i2c_config));
    BUS.with_bus(Rp2040I2c::init);
    interrupt::I2C0_IRQ.unpend();
    unsafe { interrupt::I2C0_IRQ.enable() };
    info!("I2C initialized at {} Hz", config.bus.frequency);

    // Panel on SPI0: SCK GPIO18, MOSI GPIO19, CS GPIO17, DC GPIO16,
    // TE GPIO21, backlight GPIO22
    let mut spi_config = spi::Config::default();
    spi_config.frequency = DISPLAY_SPI_HZ;
    let spi = Spi::new_blocking_txonly(p.SPI0, p.PIN_18, p.PIN_19, spi_config);
    let _cs = Output::new(p.PIN_17, Level::Low);
    let dc = Output::new(p.PIN_16, Level::High);
    let te = TePin::new(Input::new(p.PIN_21, Pull::None));
    let _dma = p.DMA_CH0;

    DISPLAY.with_driver(|panel| {
        panel.attach(spi, dc, te);
        panel.init(&mut Delay);
    });
    DISPLAY.init();
    let mut spin = NoYield;
    DISPLAY.set_refresh_direction(config.display.direction.into(), &mut spin);
    DISPLAY.set_update_region(
        Rect::wh(config.display.width, config.display.height),
        &mut spin,
    );
    interrupt::DMA_IRQ_1.unpend();
    unsafe { interrupt::DMA_IRQ_1.enable() };
    let _backlight = Output::new(p.PIN_22, Level::High);
    info!("Display initialized");

    for (name, address) in KNOWN_CHIPS {
        if BUS.probe(address, &mut spin) {
            info!("Found {} at {:#04x}", name, address);
        } else {
            warn!("No {} at {:#04x}", name, address);
        }
    }

    let front: &'static mut [Pixel] = FRONT.init([0; COLUMN_LEN]);
    let back: &'static mut [Pixel] = BACK.init([0; COLUMN_LEN]);
    let renderer = ColumnRenderer::new(front, back, config.display.wait_vsync);

    let mut device = Device::new(&BUS);
    let mut runtime = Runtime::new(&mut device, &DISPLAY, renderer, config.scheduler);
    let mut root = Gradient::new();

    info!("Starting root application");
    if let Err(e) = runtime.run(&mut root) {
        error!("Root application failed: {}", e);
    }

    // Root application exited; nothing left to drive
    loop {
        embassy_time::Timer::after_secs(60).await;
        trace!("Main loop heartbeat");
    }
}
