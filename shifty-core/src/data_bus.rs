use bit_field::BitField;
use embedded_hal_1::digital::PinState;

use crate::error::ChipIoError;
use crate::pin::DataLine;

/// Number of data lines (D0..D7)
pub const DATA_BUS_WIDTH: usize = 8;

/// Direction of the data bus as seen from the programmer
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusDirection {
    /// Chip drives, programmer samples
    Input,
    /// Programmer drives
    Output,
}

/// 8-bit bidirectional data bus
///
/// | Bit  | 7  | 6  | 5  | 4  | 3  | 2  | 1  | 0  |
/// | ---- | -- | -- | -- | -- | -- | -- | -- | -- |
/// | Line | D7 | D6 | D5 | D4 | D3 | D2 | D1 | D0 |
pub struct DataBus<L: DataLine> {
    lines: [L; DATA_BUS_WIDTH],
    /// None until a direction was applied, or after a partial reconfiguration
    direction: Option<BusDirection>,
}

impl<L: DataLine> DataBus<L> {
    /// Create a new DataBus. Lines are indexed D0..D7.
    pub fn new(lines: [L; DATA_BUS_WIDTH]) -> Self {
        Self {
            lines,
            direction: None,
        }
    }

    /// Current direction, if known
    pub fn direction(&self) -> Option<BusDirection> {
        self.direction
    }

    /// Release all lines so the chip can drive them
    pub fn set_direction_input(&mut self) -> Result<(), ChipIoError> {
        self.direction = None;
        for line in self.lines.iter_mut() {
            line.set_as_input().map_err(ChipIoError::pin)?;
        }
        self.direction = Some(BusDirection::Input);
        trace!("Set Data Bus Dir: input");
        Ok(())
    }

    /// Drive all lines
    pub fn set_direction_output(&mut self) -> Result<(), ChipIoError> {
        self.direction = None;
        for line in self.lines.iter_mut() {
            line.set_as_output().map_err(ChipIoError::pin)?;
        }
        self.direction = Some(BusDirection::Output);
        trace!("Set Data Bus Dir: output");
        Ok(())
    }

    /// Sample all lines; bit n comes from Dn
    pub fn read_byte(&mut self) -> Result<u8, ChipIoError> {
        if self.direction != Some(BusDirection::Input) {
            return Err(ChipIoError::BusDirection);
        }

        let mut data = 0u8;
        for (bit, line) in self.lines.iter_mut().enumerate() {
            let high = line.is_high().map_err(ChipIoError::pin)?;
            data.set_bit(bit, high);
        }
        Ok(data)
    }

    /// Set the level of all lines; bit n goes to Dn.
    ///
    /// The direction is left untouched, so lines only show up on the bus once
    /// the caller switches to output.
    pub fn write_byte(&mut self, data: u8) -> Result<(), ChipIoError> {
        for (bit, line) in self.lines.iter_mut().enumerate() {
            line.set_state(PinState::from(data.get_bit(bit)))
                .map_err(ChipIoError::pin)?;
        }
        Ok(())
    }
}
