//! Display controller abstractions
//!
//! The display is driven in two modes. In *command* mode the controller
//! accepts configuration (refresh direction, update window). In
//! *streaming* mode a RAM write is open and pixel data is pushed into it
//! by DMA, one buffer per transfer, with a completion interrupt after
//! each buffer.

/// RGB565 pixel as sent to the controller
pub type Pixel = u16;

/// Order in which the controller consumes pixels of the update region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RefreshDirection {
    /// Row-major: left to right, then top to bottom
    RowFirst,
    /// Column-major (the panel's native scan order)
    #[default]
    ColumnFirst,
}

/// Rectangle in display coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Rect {
    /// Create a rectangle from its top-left corner and size
    pub const fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a rectangle anchored at the origin
    pub const fn wh(width: u16, height: u16) -> Self {
        Self::new(0, 0, width, height)
    }

    pub const fn left(&self) -> u16 {
        self.x
    }

    pub const fn top(&self) -> u16 {
        self.y
    }

    /// First column past the right edge
    pub const fn right(&self) -> u16 {
        self.x + self.width
    }

    /// First row past the bottom edge
    pub const fn bottom(&self) -> u16 {
        self.y + self.height
    }

    /// Number of pixels covered
    pub const fn area(&self) -> u32 {
        self.width as u32 * self.height as u32
    }

    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Display controller with a DMA-fed pixel stream
///
/// Command methods are only called while no RAM write is open; the
/// transfer methods only between [`begin_write`](Self::begin_write) and
/// [`end_write`](Self::end_write).
pub trait DisplayDriver {
    /// Program the pixel traversal order
    fn set_refresh_direction(&mut self, direction: RefreshDirection);

    /// Program the window receiving subsequent writes
    ///
    /// `direction` is the currently programmed traversal order, which
    /// decides how the region maps onto the controller's row/column
    /// address ranges.
    fn set_update_region(&mut self, region: Rect, direction: RefreshDirection);

    /// Open a RAM write and hand the data lines to the DMA engine
    fn begin_write(&mut self);

    /// Close the RAM write and return the data lines to command mode
    fn end_write(&mut self);

    /// Start a DMA transfer of `pixels` into the open RAM write
    ///
    /// The caller keeps `pixels` untouched until the transfer's
    /// completion has been acknowledged.
    fn start_transfer(&mut self, pixels: &[Pixel]);

    /// Clear the transfer-complete interrupt
    ///
    /// Returns `false` if the interrupt was not raised by this driver's
    /// channel (shared DMA interrupt line).
    fn acknowledge(&mut self) -> bool;

    /// Level of the tearing-effect (TE) line; high during vertical blank
    fn tearing(&self) -> bool;
}
