//! Host-side model of the MSP430FR2355 registers this firmware touches.
//!
//! [`SimulatedFr2355`] implements [`RegisterFile`] and [`CycleDelay`] so the
//! real driver code in [`crate::hardware::fr2355`] and [`crate::control`] can
//! run off-target. It models just enough device behaviour for that code:
//!
//! - the oscillator fault flag comes back a configurable number of times
//!   after being cleared;
//! - the FLL reports itself unlocked for a configurable number of CSCTL7
//!   reads after SCG0 is cleared, or forever;
//! - a button input reads low while pressed, and high only when its pull-up
//!   is enabled;
//! - delays advance a cycle counter and a wall-clock counter, the latter
//!   using the MCLK frequency implied by CSCTL2/CSCTL4 at the time.
//!
//! Every write, status register change and delay is kept in a bounded
//! trace.

use core::cell::{Cell, Ref, RefCell};

use heapless::Vec;

use crate::clock::{FllDivider, REFERENCE_HZ};
use crate::hardware::fr2355::bits::*;
use crate::hardware::fr2355::{PinId, Port, Reg, RegisterFile};
use crate::hardware::traits::CycleDelay;

pub const TRACE_DEPTH: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    Write { reg: Reg, value: u16 },
    StatusSet(u16),
    StatusClear(u16),
    Delay { cycles: u32, mclk_hz: u32 },
}

pub struct SimulatedFr2355 {
    regs: [Cell<u16>; Reg::ALL.len()],
    sr: Cell<u16>,
    pressed: [Cell<u16>; 4],
    faults_pending: Cell<u32>,
    lock_latency: Cell<u32>,
    lock_countdown: Cell<u32>,
    never_locks: Cell<bool>,
    cycles: Cell<u64>,
    elapsed_ns: Cell<u64>,
    trace: RefCell<Vec<Event, TRACE_DEPTH>>,
    dropped: Cell<u32>,
}

impl Default for SimulatedFr2355 {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedFr2355 {
    /// A device straight out of power-on reset.
    pub fn new() -> Self {
        let sim = Self {
            regs: core::array::from_fn(|_| Cell::new(0)),
            sr: Cell::new(0),
            pressed: core::array::from_fn(|_| Cell::new(0)),
            faults_pending: Cell::new(0),
            lock_latency: Cell::new(2),
            lock_countdown: Cell::new(0),
            never_locks: Cell::new(false),
            cycles: Cell::new(0),
            elapsed_ns: Cell::new(0),
            trace: RefCell::new(Vec::new()),
            dropped: Cell::new(0),
        };
        sim.poke(Reg::Sfrifg1, OFIFG);
        sim.poke(Reg::Pm5ctl0, LOCKLPM5);
        sim.poke(Reg::Wdtctl, 0x6904);
        sim.poke(Reg::Frctl0, 0x9600);
        sim.poke(Reg::Csctl1, 0x0033);
        sim.poke(Reg::Csctl2, 0x101F);
        sim.poke(Reg::Csctl7, XT1OFFG | DCOFFG);
        sim
    }

    /// Make the oscillator fault flag survive the next `count` clears.
    pub fn with_oscillator_faults(self, count: u32) -> Self {
        self.faults_pending.set(count);
        self
    }

    /// CSCTL7 reads that report unlocked after the FLL is enabled.
    pub fn with_lock_latency(self, polls: u32) -> Self {
        self.lock_latency.set(polls);
        self
    }

    /// The FLL never locks.
    pub fn with_dead_fll(self) -> Self {
        self.never_locks.set(true);
        self
    }

    /// Raw register value, without read side effects.
    pub fn peek(&self, reg: Reg) -> u16 {
        self.regs[index(reg)].get()
    }

    /// Overwrite a register without side effects or tracing.
    pub fn poke(&self, reg: Reg, value: u16) {
        let value = if reg.is_byte() { value & 0x00FF } else { value };
        self.regs[index(reg)].set(value);
    }

    pub fn press(&self, pin: PinId) {
        let cell = &self.pressed[port_index(pin.port)];
        cell.set(cell.get() | pin.mask);
    }

    pub fn release(&self, pin: PinId) {
        let cell = &self.pressed[port_index(pin.port)];
        cell.set(cell.get() & !pin.mask);
    }

    /// Whether the output latch drives `pin` high.
    pub fn output_high(&self, pin: PinId) -> bool {
        self.peek(pin.port.output()) & pin.mask != 0
    }

    pub fn fll_enabled(&self) -> bool {
        self.sr.get() & SCG0 == 0
    }

    /// MCLK frequency as currently configured.
    ///
    /// Uses the same `32768 * FLLN / FLLD` relation the firmware tunes by.
    pub fn mclk_hz(&self) -> u32 {
        if self.peek(Reg::Csctl4) & SELMS_MASK != SELMS__DCOCLKDIV {
            return REFERENCE_HZ;
        }
        let csctl2 = self.peek(Reg::Csctl2);
        let multiplier = (csctl2 & FLLN_MASK) as u32;
        let divider = FllDivider::from_bits((csctl2 & FLLD_MASK) >> FLLD_SHIFT)
            .map_or(1, FllDivider::divisor);
        (REFERENCE_HZ * multiplier / divider).max(1)
    }

    pub fn cycles(&self) -> u64 {
        self.cycles.get()
    }

    pub fn elapsed_ns(&self) -> u64 {
        self.elapsed_ns.get()
    }

    pub fn events(&self) -> Ref<'_, [Event]> {
        Ref::map(self.trace.borrow(), |trace| trace.as_slice())
    }

    pub fn clear_events(&self) {
        self.trace.borrow_mut().clear();
        self.dropped.set(0);
    }

    /// Events lost because the trace was full.
    pub fn dropped_events(&self) -> u32 {
        self.dropped.get()
    }

    fn record(&self, event: Event) {
        if self.trace.borrow_mut().push(event).is_err() {
            self.dropped.set(self.dropped.get().saturating_add(1));
        }
    }

    fn port_input(&self, port: Port) -> u16 {
        let out = self.peek(port.output());
        let dir = self.peek(port.direction());
        let pull_up = self.peek(port.resistor()) & out & !dir;
        let pressed = self.pressed[port_index(port)].get();
        ((out & dir) | (pull_up & !pressed)) & 0x00FF
    }

    fn csctl7(&self) -> u16 {
        let flags = self.peek(Reg::Csctl7);
        if !self.fll_enabled() {
            return flags;
        }
        if self.never_locks.get() {
            return flags | FLLUNLOCK0 | FLLUNLOCK1;
        }
        let left = self.lock_countdown.get();
        if left > 0 {
            self.lock_countdown.set(left - 1);
            flags | FLLUNLOCK0
        } else {
            flags
        }
    }
}

impl RegisterFile for SimulatedFr2355 {
    fn read(&self, reg: Reg) -> u16 {
        match reg {
            Reg::P1in => self.port_input(Port::P1),
            Reg::P2in => self.port_input(Port::P2),
            Reg::P4in => self.port_input(Port::P4),
            Reg::P6in => self.port_input(Port::P6),
            Reg::Csctl7 => self.csctl7(),
            _ => self.peek(reg),
        }
    }

    fn write(&self, reg: Reg, value: u16) {
        self.record(Event::Write { reg, value });
        match reg {
            // Inputs are read only.
            Reg::P1in | Reg::P2in | Reg::P4in | Reg::P6in => {}
            Reg::Wdtctl => self.poke(reg, 0x6900 | (value & 0x00FF)),
            Reg::Frctl0 => self.poke(reg, 0x9600 | (value & 0x00FF)),
            Reg::Csctl7 => {
                let mut flags = value & 0x00FF;
                if self.faults_pending.get() > 0 {
                    flags |= XT1OFFG;
                }
                self.poke(reg, flags);
            }
            Reg::Sfrifg1 => {
                let mut value = value;
                let pending = self.faults_pending.get();
                if value & OFIFG == 0 && pending > 0 {
                    self.faults_pending.set(pending - 1);
                    value |= OFIFG;
                }
                self.poke(reg, value);
            }
            _ => self.poke(reg, value),
        }
    }

    fn bis_sr(&self, bits: u16) {
        self.record(Event::StatusSet(bits));
        self.sr.set(self.sr.get() | bits);
    }

    fn bic_sr(&self, bits: u16) {
        self.record(Event::StatusClear(bits));
        let was_off = !self.fll_enabled();
        self.sr.set(self.sr.get() & !bits);
        if was_off && self.fll_enabled() {
            self.lock_countdown.set(self.lock_latency.get());
        }
    }
}

impl CycleDelay for &SimulatedFr2355 {
    fn delay_cycles(&mut self, cycles: u32) {
        let mclk_hz = self.mclk_hz();
        self.record(Event::Delay { cycles, mclk_hz });
        self.cycles.set(self.cycles.get() + u64::from(cycles));
        let ns = u64::from(cycles) * 1_000_000_000 / u64::from(mclk_hz);
        self.elapsed_ns.set(self.elapsed_ns.get() + ns);
    }
}

fn index(reg: Reg) -> usize {
    Reg::ALL
        .iter()
        .position(|r| *r == reg)
        .unwrap_or_else(|| panic!("register {:#06x} not modelled", reg.addr()))
}

const fn port_index(port: Port) -> usize {
    match port {
        Port::P1 => 0,
        Port::P2 => 1,
        Port::P4 => 2,
        Port::P6 => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{self, ClockMode};
    use crate::hardware::fr2355::{self, BUTTON, BUTTON1, Clocks, LED};

    #[test]
    fn reset_state_has_oscillator_fault_and_gpio_lock() {
        let sim = SimulatedFr2355::new();
        assert_eq!(sim.peek(Reg::Sfrifg1) & OFIFG, OFIFG);
        assert_eq!(sim.peek(Reg::Pm5ctl0) & LOCKLPM5, LOCKLPM5);
        assert!(sim.fll_enabled());
    }

    #[test]
    fn startup_holds_watchdog_and_unlocks_ports() {
        let sim = SimulatedFr2355::new();
        fr2355::startup(&sim);
        assert_eq!(sim.peek(Reg::Wdtctl) & WDTHOLD, WDTHOLD);
        assert_eq!(sim.peek(Reg::Pm5ctl0) & LOCKLPM5, 0);
    }

    #[test]
    fn button_reads_high_only_with_pull_up() {
        let sim = SimulatedFr2355::new();
        assert_eq!(sim.read(Reg::P2in) & BUTTON.mask, 0);

        fr2355::configure_pins(&sim);
        assert_eq!(sim.read(Reg::P2in) & BUTTON.mask, BUTTON.mask);
        assert_eq!(sim.read(Reg::P4in) & BUTTON1.mask, BUTTON1.mask);

        sim.press(BUTTON);
        assert_eq!(sim.read(Reg::P2in) & BUTTON.mask, 0);
        assert_eq!(sim.read(Reg::P4in) & BUTTON1.mask, BUTTON1.mask);
        sim.release(BUTTON);
        assert_eq!(sim.read(Reg::P2in) & BUTTON.mask, BUTTON.mask);
    }

    #[test]
    fn outputs_read_back_on_input_register() {
        let sim = SimulatedFr2355::new();
        fr2355::configure_pins(&sim);
        assert_eq!(sim.read(Reg::P1in) & LED.mask, 0);
        sim.write(Reg::P1out, LED.mask);
        assert_eq!(sim.read(Reg::P1in) & LED.mask, LED.mask);
    }

    #[test]
    fn fault_flag_survives_configured_clears() {
        let sim = SimulatedFr2355::new().with_oscillator_faults(2);
        for _ in 0..2 {
            sim.clear_bits(Reg::Sfrifg1, OFIFG);
            assert_eq!(sim.read(Reg::Sfrifg1) & OFIFG, OFIFG);
        }
        sim.clear_bits(Reg::Sfrifg1, OFIFG);
        assert_eq!(sim.read(Reg::Sfrifg1) & OFIFG, 0);
    }

    #[test]
    fn fll_unlocks_for_latency_reads_after_enable() {
        let sim = SimulatedFr2355::new().with_lock_latency(3);
        sim.bis_sr(SCG0);
        assert!(!sim.fll_enabled());
        sim.bic_sr(SCG0);
        for _ in 0..3 {
            assert_ne!(sim.read(Reg::Csctl7) & FLLUNLOCK0, 0);
        }
        assert_eq!(sim.read(Reg::Csctl7) & (FLLUNLOCK0 | FLLUNLOCK1), 0);
    }

    #[test]
    fn mclk_follows_tuning() {
        let sim = SimulatedFr2355::new();
        let mut delay = &sim;
        clock::configure(&mut Clocks::new(&sim), &mut delay, ClockMode::High);
        assert_eq!(sim.mclk_hz(), ClockMode::High.target_hz());
        clock::configure(&mut Clocks::new(&sim), &mut delay, ClockMode::Low);
        assert_eq!(sim.mclk_hz(), ClockMode::Low.target_hz());
    }

    #[test]
    fn same_cycles_take_three_times_longer_at_8mhz() {
        let sim = SimulatedFr2355::new();
        let mut delay = &sim;

        clock::configure(&mut Clocks::new(&sim), &mut delay, ClockMode::High);
        let before = sim.elapsed_ns();
        delay.delay_cycles(5_000_000);
        let fast = sim.elapsed_ns() - before;

        clock::configure(&mut Clocks::new(&sim), &mut delay, ClockMode::Low);
        let before = sim.elapsed_ns();
        delay.delay_cycles(5_000_000);
        let slow = sim.elapsed_ns() - before;

        // 731 / 244 is just under 3.
        assert!(
            slow > fast * 29 / 10 && slow < fast * 3,
            "{} vs {}",
            slow,
            fast
        );
    }

    #[test]
    fn full_trace_counts_dropped_events() {
        let sim = SimulatedFr2355::new();
        for _ in 0..TRACE_DEPTH + 5 {
            sim.write(Reg::P1out, 0);
        }
        assert_eq!(sim.events().len(), TRACE_DEPTH);
        assert_eq!(sim.dropped_events(), 5);
        sim.clear_events();
        assert!(sim.events().is_empty());
        assert_eq!(sim.dropped_events(), 0);
    }
}
