use core::convert::Infallible;

use crate::clock::FllTuning;

pub trait Led {
    fn on(&mut self);
    fn off(&mut self);
    fn toggle(&mut self);
}

pub trait Button {
    fn is_pressed(&mut self) -> bool;
}

/// Busy-wait for a number of CPU cycles.
///
/// The wall-clock length of a wait depends on whatever clock the CPU is
/// running from when it is called.
pub trait CycleDelay {
    fn delay_cycles(&mut self, cycles: u32);
}

impl<D: CycleDelay + ?Sized> CycleDelay for &mut D {
    fn delay_cycles(&mut self, cycles: u32) {
        (**self).delay_cycles(cycles)
    }
}

/// Register-level steps of a frequency-locked clock switch.
///
/// [`crate::clock::configure`] calls these in order. The two `poll_*`
/// methods never spin themselves; the caller decides whether to block on
/// them or give up after some number of attempts.
pub trait ClockSystem {
    /// Program the memory wait states needed at the highest target frequency.
    fn set_wait_states(&mut self);

    /// Hand the reference oscillator pins to the crystal.
    fn enable_reference(&mut self);

    /// Clear the oscillator fault flags once.
    ///
    /// Returns `WouldBlock` if the fault flag is still set afterwards.
    fn poll_oscillator_fault(&mut self) -> nb::Result<(), Infallible>;

    fn disable_fll(&mut self);

    /// Select the external reference and zero the tuning register.
    fn select_reference(&mut self);

    fn apply_tuning(&mut self, tuning: &FllTuning);

    fn enable_fll(&mut self);

    /// Returns `WouldBlock` while the loop reports itself unlocked.
    fn poll_lock(&mut self) -> nb::Result<(), Infallible>;

    /// Run the CPU from the locked loop output and the auxiliary clock from
    /// the low-frequency reference.
    fn route_clocks(&mut self);
}
