//! The polling loop: two buttons, two LEDs, two flip-flops.
//!
//! - Clock button: flip [`ClockMode`], reconfigure the clock system, flash
//!   the green LED once, then wait out the debounce delay.
//! - Blink button: flash the red LED [`BlinkCount`] times, then flip the
//!   count between 3 and 7.
//!
//! Both buttons are sampled on every pass, clock button first, so pressing
//! both services both in the same pass. Only the clock button is followed
//! by a debounce wait.

use crate::clock::{self, ClockMode};
use crate::config::Config;
use crate::hardware::traits::{Button, ClockSystem, CycleDelay, Led};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BlinkCount {
    #[default]
    Three,
    Seven,
}

impl BlinkCount {
    pub const fn times(self) -> u8 {
        match self {
            BlinkCount::Three => 3,
            BlinkCount::Seven => 7,
        }
    }

    pub const fn next(self) -> Self {
        match self {
            BlinkCount::Three => BlinkCount::Seven,
            BlinkCount::Seven => BlinkCount::Three,
        }
    }
}

/// The two independent toggles driven by the buttons.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlState {
    /// Always the mode last applied to the clock system.
    pub clock_mode: ClockMode,
    pub blink_count: BlinkCount,
}

impl ControlState {
    pub const fn new(clock_mode: ClockMode, blink_count: BlinkCount) -> Self {
        Self {
            clock_mode,
            blink_count,
        }
    }

    /// Flip the clock mode, returning the new one.
    pub fn toggle_clock_mode(&mut self) -> ClockMode {
        self.clock_mode = self.clock_mode.toggled();
        self.clock_mode
    }

    /// Take the count for this press and set up the next one.
    pub fn take_blink_count(&mut self) -> BlinkCount {
        let current = self.blink_count;
        self.blink_count = current.next();
        current
    }
}

/// What one pass of [`App::poll`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Serviced {
    /// The mode switched to, if the clock button was pressed.
    pub clock_mode: Option<ClockMode>,
    /// The number of blinks shown, if the blink button was pressed.
    pub blinks: Option<BlinkCount>,
}

impl Serviced {
    pub fn is_idle(&self) -> bool {
        self.clock_mode.is_none() && self.blinks.is_none()
    }
}

/// Everything the loop drives.
pub struct Board<RL, GL, BB, CB, C, D> {
    pub red_led: RL,
    pub green_led: GL,
    pub blink_button: BB,
    pub clock_button: CB,
    pub clocks: C,
    pub delay: D,
}

pub struct App<RL, GL, BB, CB, C, D> {
    board: Board<RL, GL, BB, CB, C, D>,
    state: ControlState,
    config: Config,
}

impl<RL, GL, BB, CB, C, D> App<RL, GL, BB, CB, C, D>
where
    RL: Led,
    GL: Led,
    BB: Button,
    CB: Button,
    C: ClockSystem,
    D: CycleDelay,
{
    /// Take over the board: apply the initial clock mode, then switch both
    /// LEDs off.
    ///
    /// The returned `App` is already running at the mode its state reports.
    pub fn new(board: Board<RL, GL, BB, CB, C, D>, config: Config) -> Self {
        let mut app = Self {
            board,
            state: ControlState::new(config.initial_clock_mode, config.initial_blink_count),
            config,
        };
        clock::configure(
            &mut app.board.clocks,
            &mut app.board.delay,
            app.state.clock_mode,
        );
        app.board.red_led.off();
        app.board.green_led.off();
        info!(
            "started: clock mode {}, next blink count {}",
            app.state.clock_mode.flag(),
            app.state.blink_count.times()
        );
        app
    }

    /// One pass of the main loop.
    pub fn poll(&mut self) -> Serviced {
        let mut serviced = Serviced::default();

        // Clock button first, so a double press blinks at the new speed
        if self.board.clock_button.is_pressed() {
            let mode = self.state.toggle_clock_mode();
            info!(
                "clock button: mode {} ({} Hz)",
                mode.flag(),
                mode.target_hz()
            );
            clock::configure(&mut self.board.clocks, &mut self.board.delay, mode);
            self.signal_clock_change();
            // Debounce
            self.board.delay.delay_cycles(self.config.debounce_cycles);
            serviced.clock_mode = Some(mode);
        }

        // No debounce here: a held button blinks again on the next pass
        if self.board.blink_button.is_pressed() {
            let count = self.state.take_blink_count();
            debug!("blink button: {} blinks", count.times());
            self.blink(count.times());
            serviced.blinks = Some(count);
        }

        serviced
    }

    pub fn run(mut self) -> ! {
        loop {
            self.poll();
        }
    }

    pub fn state(&self) -> ControlState {
        self.state
    }

    pub fn release(self) -> Board<RL, GL, BB, CB, C, D> {
        self.board
    }

    fn blink(&mut self, times: u8) {
        let delay = self.config.blink_delay_cycles;
        for _ in 0..times {
            self.board.red_led.toggle();
            self.board.delay.delay_cycles(delay);
            self.board.red_led.toggle();
            self.board.delay.delay_cycles(delay);
        }
    }

    /// One green flash. The LED goes off without a trailing wait; the
    /// debounce delay that follows covers it.
    fn signal_clock_change(&mut self) {
        let delay = self.config.blink_delay_cycles;
        self.board.green_led.toggle();
        self.board.delay.delay_cycles(delay);
        self.board.green_led.toggle();
    }
}
