use crate::clock::ClockMode;
use crate::control::BlinkCount;

/// Cycles each half of a blink lasts.
pub const BLINK_DELAY_CYCLES: u32 = 5_000_000;

/// Application configuration passed to [`crate::App::new`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub struct Config {
    /// Clock mode applied at start-up.
    pub initial_clock_mode: ClockMode,
    /// Blinks for the first press of the blink button.
    pub initial_blink_count: BlinkCount,
    /// Busy-wait after each LED toggle.
    pub blink_delay_cycles: u32,
    /// Busy-wait after a clock change, before polling again.
    pub debounce_cycles: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub const fn new() -> Self {
        Self {
            initial_clock_mode: ClockMode::High,
            initial_blink_count: BlinkCount::Three,
            blink_delay_cycles: BLINK_DELAY_CYCLES,
            debounce_cycles: BLINK_DELAY_CYCLES / 2,
        }
    }

    pub const fn with_initial_clock_mode(mut self, mode: ClockMode) -> Self {
        self.initial_clock_mode = mode;
        self
    }

    pub const fn with_initial_blink_count(mut self, count: BlinkCount) -> Self {
        self.initial_blink_count = count;
        self
    }

    pub const fn with_blink_delay_cycles(mut self, cycles: u32) -> Self {
        self.blink_delay_cycles = cycles;
        self
    }

    pub const fn with_debounce_cycles(mut self, cycles: u32) -> Self {
        self.debounce_cycles = cycles;
        self
    }
}
