//! Button-driven LED blinker with runtime clock-speed switching.
//!
//! Two push buttons and two LEDs:
//! - the blink button flashes the red LED 3 times, then 7 times on the next
//!   press, alternating forever;
//! - the clock button flips the CPU between 8 MHz and 24 MHz and confirms the
//!   switch with one flash of the green LED.
//!
//! Every wait is a busy loop counted in CPU cycles, so the same blink takes
//! three times longer at 8 MHz than at 24 MHz.
//!
//! The logic in [`control`] and [`clock`] only talks to the traits in
//! [`hardware::traits`]. [`hardware::fr2355`] drives the MSP430FR2355 clock
//! system and ports through a [`hardware::fr2355::RegisterFile`], which
//! `sim::SimulatedFr2355` (feature `sim`, on by default) implements for
//! host-side testing. The `blue-pill` feature adds an STM32F103 binding.

#![cfg_attr(not(test), no_std)]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod clock;
pub mod config;
pub mod control;
pub mod hardware;
#[cfg(feature = "sim")]
pub mod sim;

pub use clock::ClockMode;
pub use config::Config;
pub use control::{App, BlinkCount, Board};
