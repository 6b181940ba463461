use embedded_hal_1::delay::DelayNs;
use embedded_hal_1::digital::{OutputPin, PinState};

use crate::address::AddressBus;
use crate::chip::{ChipDescription, ChipTiming};
use crate::data_bus::{BusDirection, DataBus};
use crate::error::ChipIoError;
use crate::pin::{change_with_delay, init_output_with_level, DataLine};

/// Data polling retry limit
/// Each poll costs 2 x (t_OE + t_DF) + settle time
pub const DEFAULT_VERIFY_POLL_LIMIT: u32 = 100;

/// Pause between two data polls
pub const DEFAULT_VERIFY_SETTLE_US: u32 = 1;

/// How long data polling keeps going after a write
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VerifyPolicy {
    /// Poll until the chip returns the written value.
    /// Hangs forever on a dead or worn-out chip.
    Unbounded,
    /// Give up after `max_polls` polls (at least one poll is made)
    Bounded { max_polls: u32 },
}

impl Default for VerifyPolicy {
    fn default() -> Self {
        Self::Bounded {
            max_polls: DEFAULT_VERIFY_POLL_LIMIT,
        }
    }
}

/// Programmer behaviour that is not a property of the chip
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProgrammerConfig {
    verify: VerifyPolicy,
    verify_settle_us: u32,
}

impl Default for ProgrammerConfig {
    fn default() -> Self {
        Self::new(VerifyPolicy::default())
    }
}

impl ProgrammerConfig {
    pub const fn new(verify: VerifyPolicy) -> Self {
        Self {
            verify,
            verify_settle_us: DEFAULT_VERIFY_SETTLE_US,
        }
    }

    /// Pause between polls, 1us minimum
    pub const fn with_verify_settle_us(mut self, verify_settle_us: u32) -> Self {
        self.verify_settle_us = if verify_settle_us == 0 {
            1
        } else {
            verify_settle_us
        };
        self
    }

    pub fn verify(&self) -> VerifyPolicy {
        self.verify
    }

    pub fn verify_settle_us(&self) -> u32 {
        self.verify_settle_us
    }
}

/// Parallel EEPROM/ROM programmer
///
/// Reads and writes single bytes of a parallel memory chip through an
/// address bus, an 8-bit data bus and the /OE and /WE control lines.
///
/// Call order: `open`, `set_chip`, then any number of `read`/`write`, then
/// `close`. The driver keeps the latched address and the data bus direction
/// between calls and must only be used from one thread of control.
pub struct ParallelProgrammer<'c, A, L, OE, WE, D>
where
    A: AddressBus,
    L: DataLine,
    OE: OutputPin,
    WE: OutputPin,
    D: DelayNs,
{
    address: A,
    data: DataBus<L>,
    /// /OE: low enables chip outputs
    oe: OE,
    /// /WE: low pulse commits a byte
    we: WE,
    delay: D,
    chip: Option<&'c ChipDescription>,
    config: ProgrammerConfig,
    opened: bool,
}

impl<'c, A, L, OE, WE, D> ParallelProgrammer<'c, A, L, OE, WE, D>
where
    A: AddressBus,
    L: DataLine,
    OE: OutputPin,
    WE: OutputPin,
    D: DelayNs,
{
    /// Create a new ParallelProgrammer. No pin is touched until `open`.
    pub fn new(
        address: A,
        data: DataBus<L>,
        oe: OE,
        we: WE,
        delay: D,
        config: ProgrammerConfig,
    ) -> Self {
        Self {
            address,
            data,
            oe,
            we,
            delay,
            chip: None,
            config,
            opened: false,
        }
    }

    /// Init all pins and latch address 0x0000
    ///
    /// Control lines are deasserted (/OE, /WE high), the address latch is
    /// idle and the data bus is an input when this returns.
    pub fn open(&mut self) -> Result<(), ChipIoError> {
        self.opened = false;

        init_output_with_level(&mut self.oe, PinState::High)?;
        init_output_with_level(&mut self.we, PinState::High)?;
        self.address.setup()?;
        self.data.set_direction_input()?;
        self.address.force_address(0x0000, &mut self.delay)?;

        self.opened = true;
        info!("Open: address=0x0000");
        Ok(())
    }

    /// Release the data bus. Can be called any number of times.
    pub fn close(&mut self) -> Result<(), ChipIoError> {
        self.opened = false;
        self.data.set_direction_input()?;
        info!("Close");
        Ok(())
    }

    /// Bind the chip used by all following reads and writes
    pub fn set_chip(&mut self, chip: &'c ChipDescription) {
        self.chip = Some(chip);
        debug!("Set Chip: size={}", chip.size);
    }

    pub fn chip(&self) -> Option<&'c ChipDescription> {
        self.chip
    }

    pub fn config(&self) -> &ProgrammerConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.opened
    }

    /// Address currently held by the address latch
    pub fn current_address(&self) -> u16 {
        self.address.current_address()
    }

    pub fn bus_direction(&self) -> Option<BusDirection> {
        self.data.direction()
    }

    /// Read one byte
    ///
    /// `address` is truncated to the chip's address range. The returned byte
    /// is sampled once, t_OE after /OE went low on a stable address.
    pub fn read(&mut self, address: u32) -> Result<u8, ChipIoError> {
        let chip = self.session()?;
        let address = Self::masked_address(chip, address);
        let timing = chip.timing;

        self.data.set_direction_input()?;
        let data = critical_section::with(|_| self.read_cycle(address, &timing))?;

        trace!("Read: address=0x{:04x} data=0x{:02x}", address, data);
        Ok(data)
    }

    /// Write one byte and wait until the chip returns it
    ///
    /// Returns the verified byte. When data polling gives up,
    /// `ChipIoError::VerifyTimeout` carries the last value read back.
    pub fn write(&mut self, address: u32, data: u8) -> Result<u8, ChipIoError> {
        let chip = self.session()?;
        let address = Self::masked_address(chip, address);
        let timing = chip.timing;

        change_with_delay(
            &mut self.oe,
            PinState::High,
            &mut self.delay,
            timing.output_disable_us,
        )?;
        critical_section::with(|_| self.program_cycle(address, data, &timing))?;

        self.verify(address, data, &timing)
    }

    fn masked_address(chip: &ChipDescription, address: u32) -> u16 {
        if !chip.contains(address) {
            debug!("Address 0x{:08x} outside chip (size={}), masked", address, chip.size);
        }
        chip.mask_address(address)
    }

    fn session(&self) -> Result<&'c ChipDescription, ChipIoError> {
        let chip = self.chip.ok_or(ChipIoError::NoChipConfigured)?;
        if !self.opened {
            return Err(ChipIoError::NotOpened);
        }
        Ok(chip)
    }

    /// /OE high, latch address, /OE low, sample
    fn read_cycle(&mut self, address: u16, timing: &ChipTiming) -> Result<u8, ChipIoError> {
        change_with_delay(
            &mut self.oe,
            PinState::High,
            &mut self.delay,
            timing.output_disable_us,
        )?;
        self.address.set_address(address, &mut self.delay)?;
        change_with_delay(
            &mut self.oe,
            PinState::Low,
            &mut self.delay,
            timing.output_enable_us,
        )?;
        self.data.read_byte()
    }

    /// Latch address, drive data, pulse /WE, wait t_WC, release the bus
    fn program_cycle(
        &mut self,
        address: u16,
        data: u8,
        timing: &ChipTiming,
    ) -> Result<(), ChipIoError> {
        self.address.set_address(address, &mut self.delay)?;

        let result = self.drive_and_pulse(data, timing);
        if result.is_err() {
            // /WE must not stay asserted; the first error is the one reported
            self.we.set_high().ok();
            warn!("Program Cycle Failed: address=0x{:04x}", address);
        }
        // the bus is released on every path
        let released = self.data.set_direction_input();
        result.and(released)
    }

    /// Drive data onto the bus and pulse /WE
    fn drive_and_pulse(&mut self, data: u8, timing: &ChipTiming) -> Result<(), ChipIoError> {
        // levels first, then enable the drivers
        self.data.write_byte(data)?;
        self.data.set_direction_output()?;

        change_with_delay(
            &mut self.we,
            PinState::Low,
            &mut self.delay,
            timing.write_pulse_us,
        )?;
        change_with_delay(
            &mut self.we,
            PinState::High,
            &mut self.delay,
            timing.write_cycle_us,
        )
    }

    /// Data polling: two consecutive reads must both return `data`
    fn verify(&mut self, address: u16, data: u8, timing: &ChipTiming) -> Result<u8, ChipIoError> {
        let mut polls: u32 = 0;
        loop {
            let first = self.poll_data(timing)?;
            let second = self.poll_data(timing)?;
            self.delay.delay_us(self.config.verify_settle_us);
            polls = polls.saturating_add(1);

            trace!(
                "Verify[{}]: [{:02x}, {:02x}, {:02x}]",
                polls,
                second,
                first,
                data
            );

            if first == second && first == data {
                debug!(
                    "Write OK: address=0x{:04x} data=0x{:02x} polls={}",
                    address,
                    data,
                    polls
                );
                return Ok(first);
            }

            if let VerifyPolicy::Bounded { max_polls } = self.config.verify {
                if polls >= max_polls {
                    warn!(
                        "Write Timeout: address=0x{:04x} data=0x{:02x} read=0x{:02x}",
                        address,
                        data,
                        second
                    );
                    return Err(ChipIoError::VerifyTimeout {
                        address,
                        expected: data,
                        last_read: second,
                        polls,
                    });
                }
            }
        }
    }

    /// One /OE low-high cycle with a sample in between
    fn poll_data(&mut self, timing: &ChipTiming) -> Result<u8, ChipIoError> {
        change_with_delay(
            &mut self.oe,
            PinState::Low,
            &mut self.delay,
            timing.output_enable_us,
        )?;
        let data = self.data.read_byte()?;
        change_with_delay(
            &mut self.oe,
            PinState::High,
            &mut self.delay,
            timing.output_disable_us,
        )?;
        Ok(data)
    }
}
