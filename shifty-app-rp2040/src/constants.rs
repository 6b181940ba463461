/// Bytes per line of the hex dump
pub const DUMP_ROW_SIZE: usize = 16;
/// Retry limit for data polling after a write
pub const VERIFY_POLL_LIMIT: u32 = 100;
/// Pause between two data polls in microseconds
pub const VERIFY_SETTLE_US: u32 = 1;
/// Shift register latch pulse width in microseconds
pub const LATCH_DELAY_US: u32 = 1;
