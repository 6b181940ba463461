#![no_std]
#![no_main]

mod bus_line;
mod constants;

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::gpio::{Flex, Level, Output};
use embassy_time::Delay;
use shifty_core::{
    ChipDescription, DataBus, LatchPolicy, ParallelProgrammer, ProgrammerConfig,
    ShiftRegisterLatch, VerifyPolicy,
};
use {defmt_rtt as _, panic_probe as _};

use crate::bus_line::BusLine;
use crate::constants::*;

static CHIP: ChipDescription = ChipDescription::EEPROM_28C64;

/// Pin mapping
///
/// | GPIO  | Signal                 |
/// | ----- | ---------------------- |
/// | 0..7  | D0..D7                 |
/// | 8     | SER (shift data)       |
/// | 9     | SRCLK (shift clock)    |
/// | 10    | RCLK (latch)           |
/// | 11    | /OE                    |
/// | 12    | /WE                    |
#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    info!("Hello there!");

    let p = embassy_rp::init(Default::default());

    let data = DataBus::new([
        BusLine::new(Flex::new(p.PIN_0)),
        BusLine::new(Flex::new(p.PIN_1)),
        BusLine::new(Flex::new(p.PIN_2)),
        BusLine::new(Flex::new(p.PIN_3)),
        BusLine::new(Flex::new(p.PIN_4)),
        BusLine::new(Flex::new(p.PIN_5)),
        BusLine::new(Flex::new(p.PIN_6)),
        BusLine::new(Flex::new(p.PIN_7)),
    ]);
    let address = ShiftRegisterLatch::new(
        Output::new(p.PIN_9, Level::Low),
        Output::new(p.PIN_8, Level::Low),
        Output::new(p.PIN_10, Level::Low),
        LatchPolicy::SkipUnchanged,
    )
    .with_latch_delay_us(LATCH_DELAY_US);
    let oe = Output::new(p.PIN_11, Level::High);
    let we = Output::new(p.PIN_12, Level::High);

    let config = ProgrammerConfig::new(VerifyPolicy::Bounded {
        max_polls: VERIFY_POLL_LIMIT,
    })
    .with_verify_settle_us(VERIFY_SETTLE_US);
    let mut programmer = ParallelProgrammer::new(address, data, oe, we, Delay, config);

    unwrap!(programmer.open());
    programmer.set_chip(&CHIP);
    info!("Chip: {}", CHIP);

    let mut row = [0u8; DUMP_ROW_SIZE];
    for base in (0..CHIP.size).step_by(DUMP_ROW_SIZE) {
        for (offset, byte) in row.iter_mut().enumerate() {
            match programmer.read(base + offset as u32) {
                Ok(data) => *byte = data,
                Err(e) => {
                    error!("Read failed at 0x{:04x}: {}", base + offset as u32, e);
                    *byte = 0x00;
                }
            }
        }
        info!("{:04x}: {:02x}", base, row);
    }

    unwrap!(programmer.close());
    info!("Dump done");
}
