//! STM32 Blue Pill Clock Speed Blinky
//! =============================================================================================
//!
//! Two buttons, two LEDs and two system clock speeds:
//! 1. Blink button (PB1): red LED (PA1) blinks 3 times, 7 on the next press, and so on
//! 2. Clock button (PB0): sysclk flips between ~8 MHz and ~24 MHz (default),
//!    green LED (PA2) blinks once to confirm
//!
//! Every delay is a busy loop of a fixed number of cycles, so blinks are
//! visibly three times slower at 8 MHz.
//!
//! Hardware Connections:
//!   - LEDs on PA1/PA2 to GND through resistors (high = on)
//!   - Buttons on PB1/PB0 to GND (internal pull-ups)
//!
//! Expected Behavior:
//!   - Both LEDs off after reset
//!   - Clock changes and blink counts are logged via defmt RTT

#![no_std] // No standard library
#![no_main] // Entry point comes from cortex-m-rt

use clock_speed_blink::hardware::blue_pill::{self, BluePillClocks, BusyWait};
use clock_speed_blink::{App, Board, Config};
use cortex_m_rt::entry; // Reset handler entry
use defmt::info; // Formatted logging
use {defmt_rtt as _, panic_probe as _}; // Logging and panic handlers

#[entry]
fn main() -> ! {
    // Initialize peripherals with reset clocks (HSI 8 MHz)
    let p = embassy_stm32::init(Default::default());

    // Print startup message (visible via defmt RTT)
    info!("Clock speed blinky");

    // LEDs as push-pull outputs (low = off), buttons as pulled-up inputs
    let pins = blue_pill::configure_pins(p);

    // Everything the loop drives, plus RCC/FLASH for clock switching
    let board = Board {
        red_led: pins.red_led,
        green_led: pins.green_led,
        blink_button: pins.blink_button,
        clock_button: pins.clock_button,
        clocks: BluePillClocks::new(),
        delay: BusyWait,
    };

    // Switch to the initial ~24 MHz mode and turn both LEDs off
    let app = App::new(board, Config::default());

    // Poll both buttons forever
    app.run()
}

// Notes:
// 1. No async executor: the loop busy-waits, and every wait is counted in
//    CPU cycles rather than time
// 2. `BluePillClocks` owns the RCC from `App::new` on; embassy's clock
//    configuration is only used for reset
// 3. The PLL is fed from HSE / 2 = 4 MHz: x2 gives 8 MHz, x6 gives 24 MHz
// 4. Flash latency is set to 2 wait states before any switch, which is
//    enough for both speeds
