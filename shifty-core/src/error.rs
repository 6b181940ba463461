use embedded_hal_1::digital::ErrorKind;

/// Errors reported by the programmer
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChipIoError {
    /// Read/Write issued before a chip description was bound
    NoChipConfigured,
    /// Read/Write issued before `open` (or after `close`)
    NotOpened,
    /// Data bus sampled while it is driven as an output
    BusDirection,
    /// Data polling never returned the written value
    VerifyTimeout {
        /// Address the write was issued to
        address: u16,
        /// Value that was written
        expected: u8,
        /// Last value read back from the chip
        last_read: u8,
        /// Number of polls spent before giving up
        polls: u32,
    },
    /// A GPIO line reported a failure
    Pin(ErrorKind),
}

impl ChipIoError {
    /// Wrap a GPIO error
    pub fn pin<E: embedded_hal_1::digital::Error>(err: E) -> Self {
        Self::Pin(err.kind())
    }

    /// Check if this is a write verification failure
    pub fn is_verify_failure(&self) -> bool {
        matches!(self, Self::VerifyTimeout { .. })
    }
}

impl core::fmt::Display for ChipIoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NoChipConfigured => write!(f, "no chip configured"),
            Self::NotOpened => write!(f, "programmer not opened"),
            Self::BusDirection => write!(f, "data bus is not an input"),
            Self::VerifyTimeout {
                address,
                expected,
                last_read,
                polls,
            } => write!(
                f,
                "write verify failed at 0x{:04x}: expected 0x{:02x}, read 0x{:02x} after {} polls",
                address, expected, last_read, polls
            ),
            Self::Pin(kind) => write!(f, "pin error: {}", kind),
        }
    }
}
