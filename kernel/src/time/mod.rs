//! System time
//!
//! Time is counted in ticks of the periodic timer interrupt, `CLOCK_FREQUENCY`
//! ticks per second. Helpers convert between ticks and wall units.

use crate::config::CLOCK_FREQUENCY;

/// Monotonic tick counter advanced once per timer interrupt.
#[derive(Debug, Default)]
pub struct Clock {
    ticks: u64,
}

impl Clock {
    pub const fn new() -> Self {
        Self { ticks: 0 }
    }

    /// Advance by one tick and return the new time.
    pub fn tick(&mut self) -> u64 {
        self.ticks += 1;
        self.ticks
    }

    pub fn now(&self) -> u64 {
        self.ticks
    }

    pub fn reset(&mut self) {
        self.ticks = 0;
    }
}

pub const fn ms_to_ticks(ms: u64) -> u64 {
    ms.saturating_mul(CLOCK_FREQUENCY) / 1000
}

pub const fn seconds_to_ms(seconds: u64) -> u64 {
    seconds.saturating_mul(1000)
}

pub const fn seconds_to_ticks(seconds: u64) -> u64 {
    seconds.saturating_mul(CLOCK_FREQUENCY)
}

/// Whole seconds, truncated.
pub const fn ticks_to_seconds(ticks: u64) -> u64 {
    ticks / CLOCK_FREQUENCY
}

/// Seconds rounded to the nearest whole second.
pub const fn ticks_to_rounded_seconds(ticks: u64) -> u64 {
    (ticks + CLOCK_FREQUENCY / 2) / CLOCK_FREQUENCY
}
