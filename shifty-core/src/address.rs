use bit_field::BitField;
use bitfield::bitfield;
use embedded_hal_1::delay::DelayNs;
use embedded_hal_1::digital::{OutputPin, PinState};

use crate::error::ChipIoError;
use crate::pin::{change_with_delay, init_output_with_level};

/// Latch pulse width
/// 74HC595 needs ~20ns, which is below the delay resolution
pub const DEFAULT_LATCH_DELAY_US: u32 = 1;

bitfield! {
    /// Address as it is shifted into the two cascaded 74HC595
    ///
    /// | Shift Order | Q7  | Q6  | Q5  | Q4  | Q3  | Q2  | Q1 | Q0 |
    /// | ----------- | --- | --- | --- | --- | --- | --- | -- | -- |
    /// | First Byte  | A15 | A14 | A13 | A12 | A11 | A10 | A9 | A8 |
    /// | Second Byte | A7  | A6  | A5  | A4  | A3  | A2  | A1 | A0 |
    ///
    /// Each byte goes out MSB first.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct LatchAddress(u16);
    pub u8, low, set_low: 7, 0;
    pub u8, high, set_high: 15, 8;
}

impl LatchAddress {
    /// Bytes in shift order
    pub fn to_shift_bytes(&self) -> [u8; 2] {
        [self.high(), self.low()]
    }
}

/// When the shift register is reloaded
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LatchPolicy {
    /// Shift and latch on every call
    #[default]
    Always,
    /// Skip the shift/latch sequence when the address is already latched.
    /// Callers must not rely on a latch pulse per access.
    SkipUnchanged,
}

/// Drives the chip's address pins
#[cfg_attr(test, mockall::automock)]
pub trait AddressBus {
    /// Put all address lines into their idle level
    fn setup(&mut self) -> Result<(), ChipIoError>;
    /// Latch `address`, subject to the latch policy
    fn set_address(&mut self, address: u16, delay: &mut dyn DelayNs) -> Result<(), ChipIoError>;
    /// Latch `address` regardless of the latch policy
    fn force_address(&mut self, address: u16, delay: &mut dyn DelayNs)
        -> Result<(), ChipIoError>;
    /// Last address handed to `set_address`/`force_address`, even when that
    /// call failed before the latch pulse
    fn current_address(&self) -> u16;
}

/// Address bus behind a serial-in/parallel-out shift register, bit-banged
/// over clock and data lines and committed with a latch pulse.
pub struct ShiftRegisterLatch<CLK, DAT, LAT> {
    clock: CLK,
    data: DAT,
    latch: LAT,
    policy: LatchPolicy,
    latch_delay_us: u32,
    current: LatchAddress,
    /// false when the register content is unknown (before setup or after a
    /// failed shift)
    valid: bool,
}

impl<CLK, DAT, LAT> ShiftRegisterLatch<CLK, DAT, LAT>
where
    CLK: OutputPin,
    DAT: OutputPin,
    LAT: OutputPin,
{
    /// Create a new ShiftRegisterLatch
    pub fn new(clock: CLK, data: DAT, latch: LAT, policy: LatchPolicy) -> Self {
        Self {
            clock,
            data,
            latch,
            policy,
            latch_delay_us: DEFAULT_LATCH_DELAY_US,
            current: LatchAddress::default(),
            valid: false,
        }
    }

    /// Override the latch pulse width
    pub fn with_latch_delay_us(mut self, latch_delay_us: u32) -> Self {
        self.latch_delay_us = latch_delay_us;
        self
    }

    pub fn policy(&self) -> LatchPolicy {
        self.policy
    }

    /// Clock one byte out, MSB first
    fn shift_out(&mut self, byte: u8) -> Result<(), ChipIoError> {
        for bit in (0..8).rev() {
            self.data
                .set_state(PinState::from(byte.get_bit(bit)))
                .map_err(ChipIoError::pin)?;
            self.clock.set_high().map_err(ChipIoError::pin)?;
            self.clock.set_low().map_err(ChipIoError::pin)?;
        }
        Ok(())
    }

    fn latch_address(&mut self, address: u16, delay: &mut dyn DelayNs) -> Result<(), ChipIoError> {
        let target = LatchAddress(address);
        self.current = target;
        self.valid = false;

        for byte in target.to_shift_bytes() {
            self.shift_out(byte)?;
        }
        change_with_delay(&mut self.latch, PinState::High, delay, self.latch_delay_us)?;
        change_with_delay(&mut self.latch, PinState::Low, delay, self.latch_delay_us)?;

        self.valid = true;
        trace!("Latch Address: 0x{:04x}", address);
        Ok(())
    }
}

impl<CLK, DAT, LAT> AddressBus for ShiftRegisterLatch<CLK, DAT, LAT>
where
    CLK: OutputPin,
    DAT: OutputPin,
    LAT: OutputPin,
{
    fn setup(&mut self) -> Result<(), ChipIoError> {
        init_output_with_level(&mut self.latch, PinState::Low)?;
        init_output_with_level(&mut self.clock, PinState::Low)?;
        init_output_with_level(&mut self.data, PinState::Low)?;
        self.valid = false;
        trace!("Setup Address Latch");
        Ok(())
    }

    fn set_address(&mut self, address: u16, delay: &mut dyn DelayNs) -> Result<(), ChipIoError> {
        if self.policy == LatchPolicy::SkipUnchanged && self.valid && self.current.0 == address {
            trace!("Latch Address: 0x{:04x} (unchanged)", address);
            return Ok(());
        }
        self.latch_address(address, delay)
    }

    fn force_address(
        &mut self,
        address: u16,
        delay: &mut dyn DelayNs,
    ) -> Result<(), ChipIoError> {
        self.latch_address(address, delay)
    }

    fn current_address(&self) -> u16 {
        self.current.0
    }
}
