/// Timing characteristics of a parallel memory chip
///
/// All durations are in microseconds. Datasheet values are often in the
/// nanosecond range; those are rounded up to 1us since the delay provider
/// cannot go below that reliably.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChipTiming {
    /// Reference clock of the programmer
    pub clock_freq_hz: u32,
    /// t_WC: internal program time after the write pulse
    pub write_cycle_us: u32,
    /// t_WP: write enable low time
    pub write_pulse_us: u32,
    /// t_OE: output enable to output valid
    pub output_enable_us: u32,
    /// t_DF: output disable to output float
    pub output_disable_us: u32,
    /// t_ACC: address to output valid
    pub address_to_data_valid_us: u32,
}

/// A parallel memory chip model
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChipDescription {
    /// Capacity in bytes
    pub size: u32,
    pub timing: ChipTiming,
}

impl ChipDescription {
    /// 8KiB EEPROM (28C64)
    ///
    /// | Parameter | Datasheet | Used   |
    /// | --------- | --------- | ------ |
    /// | t_WC      | 1ms       | 1000us |
    /// | t_WP      | 1000ns    | 1us    |
    /// | t_OE      | 100ns     | 1us    |
    /// | t_DF      | 60ns      | 1us    |
    /// | t_ACC     | 250ns     | 1us    |
    pub const EEPROM_28C64: Self = Self::new(
        8192,
        ChipTiming {
            clock_freq_hz: 4_000_000,
            write_cycle_us: 1000,
            write_pulse_us: 1,
            output_enable_us: 1,
            output_disable_us: 1,
            address_to_data_valid_us: 1,
        },
    );

    pub const fn new(size: u32, timing: ChipTiming) -> Self {
        Self { size, timing }
    }

    /// Check if `address` is inside the chip
    pub fn contains(&self, address: u32) -> bool {
        address < self.size
    }

    /// Truncate `address` to the chip's address lines.
    ///
    /// Capacity is rounded up to a power of two, and the address bus carries
    /// 16 bits at most.
    pub fn mask_address(&self, address: u32) -> u16 {
        let mask = self
            .size
            .checked_next_power_of_two()
            .map_or(u32::MAX, |n| n - 1);
        (address & mask) as u16
    }
}
