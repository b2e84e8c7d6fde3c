//! Demo applications
//!
//! `Gradient` is the root application: a scrolling full-screen gradient.
//! Pressing A launches `Overlay`, a nested application that animates a
//! checkerboard in a centred window until B is pressed.

use cadence_core::app::{App, Runtime};
use cadence_core::config::{HEIGHT, WIDTH};
use cadence_display::ColumnSource;
use cadence_hal::{Pixel, Rect};
use defmt::*;

use crate::board::{buttons, Button};

/// Pack 8-bit channels into RGB565
pub const fn rgb565(r: u8, g: u8, b: u8) -> Pixel {
    ((r as u16 & 0xF8) << 8) | ((g as u16 & 0xFC) << 3) | (b as u16 >> 3)
}

/// Full-screen scrolling gradient
pub struct Gradient {
    offset: u16,
}

impl Gradient {
    pub const fn new() -> Self {
        Self { offset: 0 }
    }
}

impl ColumnSource for Gradient {
    fn render_column(&mut self, column: u16, pixels: &mut [Pixel]) {
        let x = column.wrapping_add(self.offset);
        for (row, pixel) in pixels.iter_mut().enumerate() {
            *pixel = rgb565(x as u8, row as u8, (x >> 1) as u8 ^ row as u8);
        }
    }
}

impl App for Gradient {
    fn update(&mut self, rt: &mut Runtime<'_>) {
        self.offset = self.offset.wrapping_add(1);

        if buttons().pressed(Button::A) {
            let mut overlay = Overlay::new();
            if rt.run(&mut overlay).is_err() {
                warn!("Cannot launch overlay");
            }
        }
    }
}

/// Checkerboard in a window half the size of the screen
pub struct Overlay {
    frame: u16,
}

impl Overlay {
    const SQUARE: u16 = 8;

    pub const fn new() -> Self {
        Self { frame: 0 }
    }
}

impl ColumnSource for Overlay {
    fn render_column(&mut self, column: u16, pixels: &mut [Pixel]) {
        let light = rgb565(0xF0, 0xF0, 0xF0);
        let dark = rgb565(0x20, 0x40, 0x80);
        let x = (column.wrapping_add(self.frame) / Self::SQUARE) & 1;
        for (row, pixel) in pixels.iter_mut().enumerate() {
            let y = (row as u16 / Self::SQUARE) & 1;
            *pixel = if x ^ y == 0 { light } else { dark };
        }
    }
}

impl App for Overlay {
    fn on_focus(&mut self, rt: &mut Runtime<'_>) {
        rt.set_update_region(Rect::new(WIDTH / 4, HEIGHT / 4, WIDTH / 2, HEIGHT / 2));
    }

    fn update(&mut self, rt: &mut Runtime<'_>) {
        self.frame = self.frame.wrapping_add(1);

        if buttons().pressed(Button::B) {
            rt.exit();
        }
    }
}
