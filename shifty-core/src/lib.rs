#![cfg_attr(not(test), no_std)]

// must stay first so the macros are visible to the modules below
#[macro_use]
mod fmt;

pub mod address;
pub mod chip;
pub mod data_bus;
pub mod error;
pub mod pin;
pub mod programmer;

#[cfg(test)]
mod sim;

pub use address::{AddressBus, LatchPolicy, ShiftRegisterLatch};
pub use chip::{ChipDescription, ChipTiming};
pub use data_bus::{BusDirection, DataBus};
pub use error::ChipIoError;
pub use pin::DataLine;
pub use programmer::{ParallelProgrammer, ProgrammerConfig, VerifyPolicy};
