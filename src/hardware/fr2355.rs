//! MSP430FR2355 clock system and digital ports, at register level.
//!
//! Pinout of the LaunchPad this drives:
//!
//! | Signal        | Pin  | Direction      | Active |
//! |---------------|------|----------------|--------|
//! | Red LED       | P1.0 | output         | high   |
//! | Green LED     | P6.6 | output         | high   |
//! | Blink button  | P2.3 | input, pull-up | low    |
//! | Clock button  | P4.1 | input, pull-up | low    |
//! | XT1 crystal   | P2.6, P2.7 | module function | |
//!
//! Everything goes through a [`RegisterFile`], so the same code runs against
//! the real peripherals or the `SimulatedFr2355` model behind the `sim`
//! feature.

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, InputPin, OutputPin, StatefulOutputPin};

use super::gpio_button::GpioButton;
use super::gpio_led::GpioLed;
use super::traits::{ClockSystem, CycleDelay};
use crate::clock::{DcoRange, FllTuning};
use crate::control::Board;

/// Registers touched by this firmware, by address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum Reg {
    Sfrifg1 = 0x0102,
    Pm5ctl0 = 0x0130,
    Csctl0 = 0x0180,
    Csctl1 = 0x0182,
    Csctl2 = 0x0184,
    Csctl3 = 0x0186,
    Csctl4 = 0x0188,
    Csctl7 = 0x018E,
    Frctl0 = 0x01A0,
    Wdtctl = 0x01CC,
    P1in = 0x0200,
    P2in = 0x0201,
    P1out = 0x0202,
    P2out = 0x0203,
    P1dir = 0x0204,
    P2dir = 0x0205,
    P1ren = 0x0206,
    P2ren = 0x0207,
    P2sel1 = 0x020D,
    P4in = 0x0221,
    P4out = 0x0223,
    P4dir = 0x0225,
    P4ren = 0x0227,
    P6in = 0x0241,
    P6out = 0x0243,
    P6dir = 0x0245,
    P6ren = 0x0247,
}

impl Reg {
    pub const ALL: [Reg; 27] = [
        Reg::Sfrifg1,
        Reg::Pm5ctl0,
        Reg::Csctl0,
        Reg::Csctl1,
        Reg::Csctl2,
        Reg::Csctl3,
        Reg::Csctl4,
        Reg::Csctl7,
        Reg::Frctl0,
        Reg::Wdtctl,
        Reg::P1in,
        Reg::P2in,
        Reg::P1out,
        Reg::P2out,
        Reg::P1dir,
        Reg::P2dir,
        Reg::P1ren,
        Reg::P2ren,
        Reg::P2sel1,
        Reg::P4in,
        Reg::P4out,
        Reg::P4dir,
        Reg::P4ren,
        Reg::P6in,
        Reg::P6out,
        Reg::P6dir,
        Reg::P6ren,
    ];

    pub const fn addr(self) -> u16 {
        self as u16
    }

    /// Port registers are byte wide, the rest are words.
    pub const fn is_byte(self) -> bool {
        self.addr() >= 0x0200
    }

    pub const fn is_clock_system(self) -> bool {
        matches!(
            self,
            Reg::Csctl0
                | Reg::Csctl1
                | Reg::Csctl2
                | Reg::Csctl3
                | Reg::Csctl4
                | Reg::Csctl7
                | Reg::Frctl0
        )
    }
}

/// Bit fields, named as in the device header.
pub mod bits {
    pub const BIT0: u16 = 1 << 0;
    pub const BIT1: u16 = 1 << 1;
    pub const BIT3: u16 = 1 << 3;
    pub const BIT6: u16 = 1 << 6;
    pub const BIT7: u16 = 1 << 7;

    // SFRIFG1
    pub const OFIFG: u16 = BIT1;

    // PM5CTL0
    pub const LOCKLPM5: u16 = BIT0;

    // WDTCTL
    pub const WDTPW: u16 = 0x5A00;
    pub const WDTHOLD: u16 = 0x0080;

    // FRCTL0
    pub const FRCTLPW: u16 = 0xA500;
    pub const NWAITS_2: u16 = 0x0020;

    // Status register
    pub const SCG0: u16 = 0x0040;

    // CSCTL1
    pub const DCORSEL_MASK: u16 = 0x000E;
    pub const DCORSEL_3: u16 = 0x0006;
    pub const DCORSEL_7: u16 = 0x000E;

    // CSCTL2
    pub const FLLN_MASK: u16 = 0x03FF;
    pub const FLLD_MASK: u16 = 0x7000;
    pub const FLLD_SHIFT: u16 = 12;
    pub const FLLD_0: u16 = 0x0000;

    // CSCTL3
    pub const SELREF_MASK: u16 = 0x0030;
    pub const SELREF__XT1CLK: u16 = 0x0000;

    // CSCTL4
    pub const SELMS_MASK: u16 = 0x0007;
    pub const SELMS__DCOCLKDIV: u16 = 0x0000;
    pub const SELA_MASK: u16 = 0x0300;
    pub const SELA__REFOCLK: u16 = 0x0100;

    // CSCTL7
    pub const DCOFFG: u16 = BIT0;
    pub const XT1OFFG: u16 = BIT1;
    pub const FLLUNLOCK0: u16 = 0x0100;
    pub const FLLUNLOCK1: u16 = 0x0200;
}

use bits::*;

/// Access to the memory-mapped registers and the CPU status register.
///
/// Methods take `&self` because peripherals are shared: the clock system
/// and each pin hold their own handle to the same register file.
pub trait RegisterFile {
    fn read(&self, reg: Reg) -> u16;
    fn write(&self, reg: Reg, value: u16);

    /// Set bits in the CPU status register (`bis.w #bits, SR`).
    fn bis_sr(&self, bits: u16);
    /// Clear bits in the CPU status register (`bic.w #bits, SR`).
    fn bic_sr(&self, bits: u16);

    fn modify<F>(&self, reg: Reg, f: F)
    where
        F: FnOnce(u16) -> u16,
    {
        self.write(reg, f(self.read(reg)));
    }

    fn set_bits(&self, reg: Reg, bits: u16) {
        self.modify(reg, |v| v | bits);
    }

    fn clear_bits(&self, reg: Reg, bits: u16) {
        self.modify(reg, |v| v & !bits);
    }
}

/// Stop the watchdog and release the power-on GPIO lock.
///
/// Until `LOCKLPM5` is cleared the ports stay high impedance and ignore
/// their configuration.
pub fn startup<R: RegisterFile + ?Sized>(regs: &R) {
    regs.write(Reg::Wdtctl, WDTPW | WDTHOLD);
    regs.clear_bits(Reg::Pm5ctl0, LOCKLPM5);
}

pub const fn dcorsel(range: DcoRange) -> u16 {
    match range {
        DcoRange::Range3 => DCORSEL_3,
        DcoRange::Range7 => DCORSEL_7,
    }
}

/// Value written to CSCTL2 for a tuning.
pub const fn csctl2(tuning: &FllTuning) -> u16 {
    ((tuning.divider.bits() << FLLD_SHIFT) & FLLD_MASK) | (tuning.multiplier & FLLN_MASK)
}

/// The CS module, driven through the status register and CSCTL0..7.
pub struct Clocks<'a, R: ?Sized> {
    regs: &'a R,
}

impl<'a, R: RegisterFile + ?Sized> Clocks<'a, R> {
    pub fn new(regs: &'a R) -> Self {
        Self { regs }
    }
}

impl<R: RegisterFile + ?Sized> ClockSystem for Clocks<'_, R> {
    fn set_wait_states(&mut self) {
        // Two FRAM wait states are needed above 8 MHz.
        self.regs.write(Reg::Frctl0, FRCTLPW | NWAITS_2);
    }

    fn enable_reference(&mut self) {
        self.regs.set_bits(Reg::P2sel1, BIT6 | BIT7);
    }

    fn poll_oscillator_fault(&mut self) -> nb::Result<(), Infallible> {
        self.regs.clear_bits(Reg::Csctl7, XT1OFFG | DCOFFG);
        self.regs.clear_bits(Reg::Sfrifg1, OFIFG);
        if self.regs.read(Reg::Sfrifg1) & OFIFG != 0 {
            Err(nb::Error::WouldBlock)
        } else {
            Ok(())
        }
    }

    fn disable_fll(&mut self) {
        self.regs.bis_sr(SCG0);
    }

    fn select_reference(&mut self) {
        self.regs
            .modify(Reg::Csctl3, |v| (v & !SELREF_MASK) | SELREF__XT1CLK);
        // DCO tap and modulation back to zero.
        self.regs.write(Reg::Csctl0, 0);
    }

    fn apply_tuning(&mut self, tuning: &FllTuning) {
        self.regs.write(Reg::Csctl1, dcorsel(tuning.range));
        self.regs.write(Reg::Csctl2, csctl2(tuning));
    }

    fn enable_fll(&mut self) {
        self.regs.bic_sr(SCG0);
    }

    fn poll_lock(&mut self) -> nb::Result<(), Infallible> {
        if self.regs.read(Reg::Csctl7) & (FLLUNLOCK0 | FLLUNLOCK1) != 0 {
            Err(nb::Error::WouldBlock)
        } else {
            Ok(())
        }
    }

    fn route_clocks(&mut self) {
        // MCLK and SMCLK from DCOCLKDIV, ACLK from the internal 32 kHz REFO.
        self.regs
            .write(Reg::Csctl4, SELMS__DCOCLKDIV | SELA__REFOCLK);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Port {
    P1,
    P2,
    P4,
    P6,
}

impl Port {
    pub const fn input(self) -> Reg {
        match self {
            Port::P1 => Reg::P1in,
            Port::P2 => Reg::P2in,
            Port::P4 => Reg::P4in,
            Port::P6 => Reg::P6in,
        }
    }

    pub const fn output(self) -> Reg {
        match self {
            Port::P1 => Reg::P1out,
            Port::P2 => Reg::P2out,
            Port::P4 => Reg::P4out,
            Port::P6 => Reg::P6out,
        }
    }

    pub const fn direction(self) -> Reg {
        match self {
            Port::P1 => Reg::P1dir,
            Port::P2 => Reg::P2dir,
            Port::P4 => Reg::P4dir,
            Port::P6 => Reg::P6dir,
        }
    }

    pub const fn resistor(self) -> Reg {
        match self {
            Port::P1 => Reg::P1ren,
            Port::P2 => Reg::P2ren,
            Port::P4 => Reg::P4ren,
            Port::P6 => Reg::P6ren,
        }
    }
}

/// A single port bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinId {
    pub port: Port,
    pub mask: u16,
}

pub const LED: PinId = PinId {
    port: Port::P1,
    mask: BIT0,
};
pub const LED1: PinId = PinId {
    port: Port::P6,
    mask: BIT6,
};
pub const BUTTON: PinId = PinId {
    port: Port::P2,
    mask: BIT3,
};
pub const BUTTON1: PinId = PinId {
    port: Port::P4,
    mask: BIT1,
};

/// embedded-hal view of one configured port bit.
pub struct PortPin<'a, R: ?Sized> {
    regs: &'a R,
    id: PinId,
}

impl<'a, R: RegisterFile + ?Sized> PortPin<'a, R> {
    pub fn new(regs: &'a R, id: PinId) -> Self {
        Self { regs, id }
    }

    pub fn id(&self) -> PinId {
        self.id
    }
}

impl<R: ?Sized> ErrorType for PortPin<'_, R> {
    type Error = Infallible;
}

impl<R: RegisterFile + ?Sized> OutputPin for PortPin<'_, R> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.regs.clear_bits(self.id.port.output(), self.id.mask);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.regs.set_bits(self.id.port.output(), self.id.mask);
        Ok(())
    }
}

impl<R: RegisterFile + ?Sized> StatefulOutputPin for PortPin<'_, R> {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.regs.read(self.id.port.output()) & self.id.mask != 0)
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.regs.read(self.id.port.output()) & self.id.mask == 0)
    }

    fn toggle(&mut self) -> Result<(), Self::Error> {
        let mask = self.id.mask;
        self.regs.modify(self.id.port.output(), |v| v ^ mask);
        Ok(())
    }
}

impl<R: RegisterFile + ?Sized> InputPin for PortPin<'_, R> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.regs.read(self.id.port.input()) & self.id.mask != 0)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.regs.read(self.id.port.input()) & self.id.mask == 0)
    }
}

pub struct Pins<'a, R: ?Sized> {
    pub red_led: GpioLed<PortPin<'a, R>>,
    pub green_led: GpioLed<PortPin<'a, R>>,
    pub blink_button: GpioButton<PortPin<'a, R>>,
    pub clock_button: GpioButton<PortPin<'a, R>>,
}

/// A [`Board`] made of the LaunchPad pins and clock system.
pub type Fr2355Board<'a, R, D> = Board<
    GpioLed<PortPin<'a, R>>,
    GpioLed<PortPin<'a, R>>,
    GpioButton<PortPin<'a, R>>,
    GpioButton<PortPin<'a, R>>,
    Clocks<'a, R>,
    D,
>;

impl<'a, R: RegisterFile + ?Sized> Pins<'a, R> {
    pub fn into_board<D: CycleDelay>(self, regs: &'a R, delay: D) -> Fr2355Board<'a, R, D> {
        Board {
            red_led: self.red_led,
            green_led: self.green_led,
            blink_button: self.blink_button,
            clock_button: self.clock_button,
            clocks: Clocks::new(regs),
            delay,
        }
    }
}

/// LEDs to output and off, buttons to input with pull-up.
pub fn configure_pins<R: RegisterFile + ?Sized>(regs: &R) -> Pins<'_, R> {
    for led in [LED, LED1] {
        regs.set_bits(led.port.direction(), led.mask);
        regs.clear_bits(led.port.output(), led.mask);
    }

    for button in [BUTTON, BUTTON1] {
        regs.set_bits(button.port.resistor(), button.mask);
        // OUT selects pull-up when the resistor is enabled.
        regs.set_bits(button.port.output(), button.mask);
    }

    Pins {
        red_led: GpioLed::new(PortPin::new(regs, LED)),
        green_led: GpioLed::new(PortPin::new(regs, LED1)),
        blink_button: GpioButton::new(PortPin::new(regs, BUTTON)),
        clock_button: GpioButton::new(PortPin::new(regs, BUTTON1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ClockMode;

    #[test]
    fn register_addresses_are_unique() {
        for (i, a) in Reg::ALL.iter().enumerate() {
            for b in &Reg::ALL[i + 1..] {
                assert_ne!(a.addr(), b.addr(), "{:?} and {:?}", a, b);
            }
        }
    }

    #[test]
    fn csctl2_holds_divider_and_multiplier() {
        assert_eq!(csctl2(&ClockMode::High.tuning()), FLLD_0 | 731);
        assert_eq!(csctl2(&ClockMode::Low.tuning()), FLLD_0 | 244);
    }

    #[test]
    fn dco_range_selects_dcorsel() {
        assert_eq!(dcorsel(ClockMode::Low.tuning().range), DCORSEL_3);
        assert_eq!(dcorsel(ClockMode::High.tuning().range), DCORSEL_7);
    }

    #[test]
    fn only_cs_and_fram_registers_count_as_clock_system() {
        let clock_regs = Reg::ALL.iter().filter(|r| r.is_clock_system()).count();
        assert_eq!(clock_regs, 7);
        assert!(!Reg::P2sel1.is_clock_system());
        assert!(!Reg::Sfrifg1.is_clock_system());
    }
}
