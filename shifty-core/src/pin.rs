use embedded_hal_1::delay::DelayNs;
use embedded_hal_1::digital::{InputPin, OutputPin, PinState};

use crate::error::ChipIoError;

/// One line of the bidirectional data bus
///
/// Same shape as embassy-rp `Flex`: the line keeps its output level while it
/// is switched to input, so the level can be preloaded before the driver is
/// enabled.
pub trait DataLine: InputPin + OutputPin {
    /// Stop driving the line
    fn set_as_input(&mut self) -> Result<(), Self::Error>;
    /// Drive the line with the last level set
    fn set_as_output(&mut self) -> Result<(), Self::Error>;
}

/// Drive `pin` to `level`, then hold it for `delay_us`
pub fn change_with_delay<P, D>(
    pin: &mut P,
    level: PinState,
    delay: &mut D,
    delay_us: u32,
) -> Result<(), ChipIoError>
where
    P: OutputPin,
    D: DelayNs + ?Sized,
{
    pin.set_state(level).map_err(ChipIoError::pin)?;
    if delay_us > 0 {
        delay.delay_us(delay_us);
    }
    Ok(())
}

/// Put an output pin into its idle level
pub fn init_output_with_level<P: OutputPin>(
    pin: &mut P,
    level: PinState,
) -> Result<(), ChipIoError> {
    pin.set_state(level).map_err(ChipIoError::pin)
}

/// Sample the logic level of `pin`
pub fn read_level<P: InputPin>(pin: &mut P) -> Result<PinState, ChipIoError> {
    pin.is_high()
        .map(PinState::from)
        .map_err(ChipIoError::pin)
}
