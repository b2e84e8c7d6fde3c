//! ST7789 display controller over SPI with DMA pixel streaming
//!
//! Commands are sent through a blocking `embedded-hal` SPI bus with a
//! data/command select pin. Pixel data bypasses the SPI driver: once a
//! RAM write is open the SPI is switched to 16-bit frames and a DMA
//! channel, paced by the SPI transmit request, copies RGB565 pixels
//! straight into its data register.
//!
//! The panel is 240x320 portrait; in its native (column-first) scan order
//! a display column of the 320x240 landscape image is one panel row.

use cadence_hal::{DisplayDriver, InputPin, Pixel, Rect, RefreshDirection};
use embassy_rp::pac;
use embassy_rp::pac::dma::vals::{DataSize, TreqSel};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;

// Command set (subset used by the runtime)
const SWRESET: u8 = 0x01;
const SLPOUT: u8 = 0x11;
const INVON: u8 = 0x21;
const DISPON: u8 = 0x29;
const CASET: u8 = 0x2A;
const RASET: u8 = 0x2B;
const RAMWR: u8 = 0x2C;
const TEON: u8 = 0x35;
const MADCTL: u8 = 0x36;
const COLMOD: u8 = 0x3A;

const MADCTL_MY: u8 = 0x80;
const MADCTL_MV: u8 = 0x20;
const COLMOD_565: u8 = 0x55;

/// SPI frame size field values (bits per frame minus one)
const DSS_8BIT: u8 = 7;
const DSS_16BIT: u8 = 15;

struct Io<SPI, DC, TE> {
    spi: SPI,
    dc: DC,
    te: TE,
}

/// ST7789 driver
pub struct St7789<SPI, DC, TE> {
    regs: pac::spi::Spi,
    treq: TreqSel,
    dma_channel: usize,
    io: Option<Io<SPI, DC, TE>>,
}

impl<SPI, DC, TE> St7789<SPI, DC, TE>
where
    SPI: SpiBus,
    DC: OutputPin,
    TE: InputPin,
{
    /// Create a detached driver
    ///
    /// # Arguments
    ///
    /// * `regs` - Registers of the SPI block the panel is wired to
    /// * `treq` - DMA transfer request of that SPI block's transmit FIFO
    /// * `dma_channel` - DMA channel reserved for pixel transfers
    pub const fn new(regs: pac::spi::Spi, treq: TreqSel, dma_channel: usize) -> Self {
        Self {
            regs,
            treq,
            dma_channel,
            io: None,
        }
    }

    /// Driver on SPI0 using `dma_channel`
    pub const fn spi0(dma_channel: usize) -> Self {
        Self::new(pac::SPI0, TreqSel::SPI0_TX, dma_channel)
    }

    /// Hand over the configured bus and pins
    pub fn attach(&mut self, spi: SPI, dc: DC, te: TE) {
        self.io = Some(Io { spi, dc, te });
    }

    fn command(&mut self, cmd: u8, data: &[u8]) {
        let Some(io) = self.io.as_mut() else {
            return;
        };
        // Pin and bus errors have no recovery path at this level
        let _ = io.dc.set_low();
        let _ = io.spi.write(&[cmd]);
        let _ = io.spi.flush();
        let _ = io.dc.set_high();
        if !data.is_empty() {
            let _ = io.spi.write(data);
            let _ = io.spi.flush();
        }
    }

    fn range(&mut self, cmd: u8, start: u16, end: u16) {
        let [s_hi, s_lo] = start.to_be_bytes();
        let [e_hi, e_lo] = end.to_be_bytes();
        self.command(cmd, &[s_hi, s_lo, e_hi, e_lo]);
    }

    /// Reset and wake the panel, enable the tearing signal
    pub fn init(&mut self, delay: &mut impl DelayNs) {
        self.command(SWRESET, &[]);
        delay.delay_ms(150);
        self.command(SLPOUT, &[]);
        delay.delay_ms(10);
        self.command(COLMOD, &[COLMOD_565]);
        self.command(INVON, &[]);
        // TE on VBlank only
        self.command(TEON, &[0x00]);
        self.command(DISPON, &[]);
        delay.delay_ms(10);

        self.enable_dma_interrupt();
    }

    /// Route this driver's DMA channel to `DMA_IRQ_1`
    ///
    /// `DMA_IRQ_0` belongs to the embassy-rp DMA driver.
    fn enable_dma_interrupt(&mut self) {
        let mask = 1u32 << self.dma_channel;
        pac::DMA.inte(0).modify(|w| *w &= !mask);
        pac::DMA.inte(1).modify(|w| *w |= mask);
    }

    fn wait_spi_idle(&self) {
        while self.regs.sr().read().bsy() {}
    }

    fn wait_dma_idle(&self) {
        while pac::DMA.ch(self.dma_channel).ctrl_trig().read().busy() {}
    }
}

impl<SPI, DC, TE> DisplayDriver for St7789<SPI, DC, TE>
where
    SPI: SpiBus,
    DC: OutputPin,
    TE: InputPin,
{
    fn set_refresh_direction(&mut self, direction: RefreshDirection) {
        let madctl = match direction {
            RefreshDirection::ColumnFirst => 0,
            RefreshDirection::RowFirst => MADCTL_MY | MADCTL_MV,
        };
        self.command(MADCTL, &[madctl]);
    }

    fn set_update_region(&mut self, region: Rect, direction: RefreshDirection) {
        if region.is_empty() {
            return;
        }
        let (columns, rows) = match direction {
            // Panel columns run along the image's y axis
            RefreshDirection::ColumnFirst => (
                (region.top(), region.bottom() - 1),
                (region.left(), region.right() - 1),
            ),
            RefreshDirection::RowFirst => (
                (region.left(), region.right() - 1),
                (region.top(), region.bottom() - 1),
            ),
        };
        self.range(CASET, columns.0, columns.1);
        self.range(RASET, rows.0, rows.1);
    }

    fn begin_write(&mut self) {
        self.command(RAMWR, &[]);
        self.wait_spi_idle();
        self.regs.cr0().modify(|w| w.set_dss(DSS_16BIT));
        self.regs.dmacr().modify(|w| w.set_txdmae(true));
    }

    fn end_write(&mut self) {
        self.wait_dma_idle();
        self.wait_spi_idle();
        self.regs.dmacr().modify(|w| w.set_txdmae(false));
        self.regs.cr0().modify(|w| w.set_dss(DSS_8BIT));
    }

    fn start_transfer(&mut self, pixels: &[Pixel]) {
        let ch = pac::DMA.ch(self.dma_channel);
        ch.read_addr().write_value(pixels.as_ptr() as u32);
        ch.write_addr().write_value(self.regs.dr().as_ptr() as u32);
        ch.trans_count().write_value(pixels.len() as u32);
        ch.ctrl_trig().write(|w| {
            w.set_data_size(DataSize::SIZE_HALFWORD);
            w.set_incr_read(true);
            w.set_incr_write(false);
            w.set_treq_sel(self.treq);
            // Chaining to itself disables chaining
            w.set_chain_to(self.dma_channel as u8);
            w.set_en(true);
        });
    }

    fn acknowledge(&mut self) -> bool {
        let mask = 1u32 << self.dma_channel;
        if pac::DMA.ints(1).read() & mask == 0 {
            return false;
        }
        pac::DMA.ints(1).write_value(mask);
        true
    }

    fn tearing(&self) -> bool {
        self.io.as_ref().is_some_and(|io| io.te.is_high())
    }
}
