//! GPIO adapters

use embassy_rp::gpio::Input;

/// Tearing-effect (TE) input from the display controller
pub struct TePin<'d> {
    input: Input<'d>,
}

impl<'d> TePin<'d> {
    pub fn new(input: Input<'d>) -> Self {
        Self { input }
    }
}

impl cadence_hal::InputPin for TePin<'_> {
    fn is_high(&self) -> bool {
        self.input.is_high()
    }
}
