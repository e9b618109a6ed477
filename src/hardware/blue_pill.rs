//! STM32F103C8 "Blue Pill" binding.
//!
//! Hardware Connections:
//!   - Red LED:      PA1 -> resistor -> LED -> GND (high = on)
//!   - Green LED:    PA2 -> resistor -> LED -> GND (high = on)
//!   - Blink button: PB1 -> button -> GND (internal pull-up)
//!   - Clock button: PB0 -> button -> GND (internal pull-up)
//!   - 8 MHz HSE crystal on OSC_IN/OSC_OUT (fitted on the board)
//!
//! The F103 has no FLL, so the same sequence is run on the PLL:
//! HSE / 2 = 4 MHz into the PLL, x2 for ~8 MHz and x6 for ~24 MHz.

use core::convert::Infallible;

use embassy_stm32::Peripherals;
use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
use embassy_stm32::pac;
use embassy_stm32::pac::flash::vals::Latency;
use embassy_stm32::pac::rcc::vals::{Pllmul, Pllsrc, Pllxtpre, Sw};

use super::gpio_button::GpioButton;
use super::gpio_led::GpioLed;
use super::traits::{ClockSystem, CycleDelay};
use crate::clock::FllTuning;

pub const HSE_HZ: u32 = 8_000_000;

/// PLL input after the HSE /2 prescaler.
pub const PLL_INPUT_HZ: u32 = HSE_HZ / 2;

/// Nearest PLL multiplier for a tuning, within the F103's x2..x16.
pub const fn pll_multiplier(tuning: &FllTuning) -> u32 {
    let mul = (tuning.target_hz() + PLL_INPUT_HZ / 2) / PLL_INPUT_HZ;
    if mul < 2 {
        2
    } else if mul > 16 {
        16
    } else {
        mul
    }
}

/// RCC and FLASH, driven through the PAC.
///
/// Create it after `embassy_stm32::init`; from then on the system clock is
/// owned by this type.
pub struct BluePillClocks {
    _private: (),
}

impl BluePillClocks {
    pub fn new() -> Self {
        Self { _private: () }
    }
}

impl Default for BluePillClocks {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSystem for BluePillClocks {
    fn set_wait_states(&mut self) {
        pac::FLASH.acr().modify(|w| w.set_latency(Latency::WS2));
    }

    fn enable_reference(&mut self) {
        pac::RCC.cr().modify(|w| w.set_hseon(true));
    }

    fn poll_oscillator_fault(&mut self) -> nb::Result<(), Infallible> {
        pac::RCC.cir().modify(|w| w.set_cssc(true));
        let hse_ready = pac::RCC.cr().read().hserdy();
        let css_fault = pac::RCC.cir().read().cssf();
        if hse_ready && !css_fault {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    fn disable_fll(&mut self) {
        // PLLON cannot be cleared while the PLL clocks the core.
        pac::RCC.cfgr().modify(|w| w.set_sw(Sw::HSI));
        while pac::RCC.cfgr().read().sws() != Sw::HSI {}
        pac::RCC.cr().modify(|w| w.set_pllon(false));
    }

    fn select_reference(&mut self) {
        pac::RCC.cfgr().modify(|w| {
            w.set_pllsrc(Pllsrc::HSE_DIV_PREDIV);
            w.set_pllxtpre(Pllxtpre::DIV2);
            w.set_pllmul(Pllmul::MUL2);
        });
    }

    fn apply_tuning(&mut self, tuning: &FllTuning) {
        let mul = pll_multiplier(tuning);
        pac::RCC
            .cfgr()
            .modify(|w| w.set_pllmul(Pllmul::from_bits((mul - 2) as u8)));
        debug!("pll: x{} for {} Hz", mul, PLL_INPUT_HZ * mul);
    }

    fn enable_fll(&mut self) {
        pac::RCC.cr().modify(|w| w.set_pllon(true));
    }

    fn poll_lock(&mut self) -> nb::Result<(), Infallible> {
        if pac::RCC.cr().read().pllrdy() {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    fn route_clocks(&mut self) {
        pac::RCC.cfgr().modify(|w| w.set_sw(Sw::PLL1_P));
    }
}

/// Busy loop on the core, `cycles` long at whatever sysclk is.
pub struct BusyWait;

impl CycleDelay for BusyWait {
    fn delay_cycles(&mut self, cycles: u32) {
        cortex_m::asm::delay(cycles);
    }
}

pub struct Pins {
    pub red_led: GpioLed<Output<'static>>,
    pub green_led: GpioLed<Output<'static>>,
    pub blink_button: GpioButton<Input<'static>>,
    pub clock_button: GpioButton<Input<'static>>,
}

/// LEDs as push-pull outputs starting low, buttons as pulled-up inputs.
pub fn configure_pins(p: Peripherals) -> Pins {
    Pins {
        red_led: GpioLed::new(Output::new(p.PA1, Level::Low, Speed::Low)),
        green_led: GpioLed::new(Output::new(p.PA2, Level::Low, Speed::Low)),
        blink_button: GpioButton::new(Input::new(p.PB1, Pull::Up)),
        clock_button: GpioButton::new(Input::new(p.PB0, Pull::Up)),
    }
}
