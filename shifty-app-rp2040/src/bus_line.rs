use core::convert::Infallible;

use embassy_rp::gpio::{Flex, Level, Pull};
use embedded_hal_1::digital::{ErrorType, InputPin, OutputPin};
use shifty_core::DataLine;

/// Data bus line on a bidirectional GPIO
pub struct BusLine<'d> {
    pin: Flex<'d>,
}

impl<'d> BusLine<'d> {
    /// Create a new BusLine. The line starts as an input with its output level low.
    pub fn new(mut pin: Flex<'d>) -> Self {
        pin.set_pull(Pull::None);
        pin.set_level(Level::Low);
        pin.set_as_input();
        Self { pin }
    }
}

impl ErrorType for BusLine<'_> {
    type Error = Infallible;
}

impl InputPin for BusLine<'_> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.pin.is_high())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.pin.is_low())
    }
}

impl OutputPin for BusLine<'_> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.pin.set_low();
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.pin.set_high();
        Ok(())
    }
}

impl DataLine for BusLine<'_> {
    fn set_as_input(&mut self) -> Result<(), Self::Error> {
        self.pin.set_as_input();
        Ok(())
    }

    fn set_as_output(&mut self) -> Result<(), Self::Error> {
        self.pin.set_as_output();
        Ok(())
    }
}
