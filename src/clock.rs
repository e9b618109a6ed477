//! Clock modes and the frequency-locked loop switch sequence.
//!
//! The DCO is locked to the 32768 Hz crystal:
//!
//! ```text
//! f = 32768 * multiplier / divider
//! ```
//!
//! | Mode   | DCO range | multiplier | divider | f            |
//! |--------|-----------|------------|---------|--------------|
//! | `Low`  | 3         | 244        | 1       | ~8.0 MHz     |
//! | `High` | 7         | 731        | 1       | ~24.0 MHz    |

use core::convert::Infallible;

use crate::hardware::traits::{ClockSystem, CycleDelay};

/// Frequency of the external reference crystal.
pub const REFERENCE_HZ: u32 = 32_768;

/// Cycles to wait between writing the tuning and re-enabling the loop.
pub const FLL_SETTLE_CYCLES: u32 = 3;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockMode {
    /// ~8 MHz
    Low,
    /// ~24 MHz
    #[default]
    High,
}

impl ClockMode {
    /// 0 for `Low`, 1 for `High`.
    pub const fn flag(self) -> u8 {
        match self {
            ClockMode::Low => 0,
            ClockMode::High => 1,
        }
    }

    /// Any non-zero flag selects `High`.
    pub const fn from_flag(flag: u8) -> Self {
        if flag != 0 {
            ClockMode::High
        } else {
            ClockMode::Low
        }
    }

    pub const fn toggled(self) -> Self {
        match self {
            ClockMode::Low => ClockMode::High,
            ClockMode::High => ClockMode::Low,
        }
    }

    pub const fn tuning(self) -> FllTuning {
        match self {
            ClockMode::Low => FllTuning {
                range: DcoRange::Range3,
                multiplier: 244,
                divider: FllDivider::Div1,
            },
            ClockMode::High => FllTuning {
                range: DcoRange::Range7,
                multiplier: 731,
                divider: FllDivider::Div1,
            },
        }
    }

    pub const fn target_hz(self) -> u32 {
        self.tuning().target_hz()
    }
}

/// Coarse DCO frequency band.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DcoRange {
    /// Up to 8 MHz.
    Range3,
    /// Up to 24 MHz.
    Range7,
}

impl DcoRange {
    pub const fn max_hz(self) -> u32 {
        match self {
            DcoRange::Range3 => 8_000_000,
            DcoRange::Range7 => 24_000_000,
        }
    }
}

/// Post-divider on the loop output (FLLD field).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FllDivider {
    Div1,
    Div2,
    Div4,
    Div8,
    Div16,
    Div32,
}

impl FllDivider {
    /// Value of the FLLD field, before shifting into place.
    pub const fn bits(self) -> u16 {
        match self {
            FllDivider::Div1 => 0,
            FllDivider::Div2 => 1,
            FllDivider::Div4 => 2,
            FllDivider::Div8 => 3,
            FllDivider::Div16 => 4,
            FllDivider::Div32 => 5,
        }
    }

    pub const fn from_bits(bits: u16) -> Option<Self> {
        match bits {
            0 => Some(FllDivider::Div1),
            1 => Some(FllDivider::Div2),
            2 => Some(FllDivider::Div4),
            3 => Some(FllDivider::Div8),
            4 => Some(FllDivider::Div16),
            5 => Some(FllDivider::Div32),
            _ => None,
        }
    }

    pub const fn divisor(self) -> u32 {
        1 << self.bits()
    }
}

/// One complete setting of the loop: range, multiplier and divider.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FllTuning {
    pub range: DcoRange,
    pub multiplier: u16,
    pub divider: FllDivider,
}

impl FllTuning {
    pub const fn target_hz(&self) -> u32 {
        REFERENCE_HZ * self.multiplier as u32 / self.divider.divisor()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockError {
    /// The oscillator fault flag was still set after the allowed attempts.
    OscillatorFault,
    /// The loop had not relocked after the allowed polls.
    FllUnlocked,
}

/// Switch the clock system to `mode` and wait for it to lock.
///
/// Both waits are unbounded: a crystal that never starts, or a loop that
/// never locks, hangs here.
pub fn configure<C, D>(clocks: &mut C, delay: &mut D, mode: ClockMode) -> FllTuning
where
    C: ClockSystem + ?Sized,
    D: CycleDelay + ?Sized,
{
    let tuning = mode.tuning();
    begin(clocks, mode);

    let mut attempts: u32 = 0;
    let cleared = nb::block!({
        attempts = attempts.saturating_add(1);
        clocks.poll_oscillator_fault()
    });
    cleared.unwrap_or_else(|never| match never {});
    report_fault_attempts(attempts);

    retune(clocks, delay, &tuning);
    let locked = nb::block!(clocks.poll_lock());
    locked.unwrap_or_else(|never| match never {});

    finish(clocks, &tuning);
    tuning
}

/// Same sequence as [`configure`], giving up after `max_polls` attempts at
/// either wait.
pub fn try_configure<C, D>(
    clocks: &mut C,
    delay: &mut D,
    mode: ClockMode,
    max_polls: u32,
) -> Result<FllTuning, ClockError>
where
    C: ClockSystem + ?Sized,
    D: CycleDelay + ?Sized,
{
    let tuning = mode.tuning();
    begin(clocks, mode);

    let attempts = poll_bounded(|| clocks.poll_oscillator_fault(), max_polls)
        .ok_or(ClockError::OscillatorFault)?;
    report_fault_attempts(attempts);

    retune(clocks, delay, &tuning);
    let polls = poll_bounded(|| clocks.poll_lock(), max_polls).ok_or(ClockError::FllUnlocked)?;
    trace!("clock: locked after {} polls", polls);

    finish(clocks, &tuning);
    Ok(tuning)
}

fn begin<C: ClockSystem + ?Sized>(clocks: &mut C, mode: ClockMode) {
    debug!(
        "clock: switching to mode {} ({} Hz)",
        mode.flag(),
        mode.target_hz()
    );
    // Wait states go in first, whichever way the frequency is moving.
    clocks.set_wait_states();
    clocks.enable_reference();
}

fn report_fault_attempts(attempts: u32) {
    if attempts > 1 {
        warn!(
            "clock: oscillator fault cleared after {} attempts",
            attempts
        );
    }
}

fn retune<C, D>(clocks: &mut C, delay: &mut D, tuning: &FllTuning)
where
    C: ClockSystem + ?Sized,
    D: CycleDelay + ?Sized,
{
    clocks.disable_fll();
    clocks.select_reference();
    clocks.apply_tuning(tuning);
    delay.delay_cycles(FLL_SETTLE_CYCLES);
    clocks.enable_fll();
}

fn finish<C: ClockSystem + ?Sized>(clocks: &mut C, tuning: &FllTuning) {
    clocks.route_clocks();
    info!("clock: running at {} Hz", tuning.target_hz());
}

/// Poll `f` at most `max_polls` times, returning how many calls it took
/// to complete.
fn poll_bounded<F>(mut f: F, max_polls: u32) -> Option<u32>
where
    F: FnMut() -> nb::Result<(), Infallible>,
{
    for polls in 1..=max_polls {
        match f() {
            Ok(()) => return Some(polls),
            Err(nb::Error::WouldBlock) => {}
            Err(nb::Error::Other(never)) => match never {},
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_flags_match_the_binary_flag() {
        assert_eq!(ClockMode::Low.flag(), 0);
        assert_eq!(ClockMode::High.flag(), 1);
        assert_eq!(ClockMode::from_flag(0), ClockMode::Low);
        assert_eq!(ClockMode::from_flag(1), ClockMode::High);
        assert_eq!(ClockMode::from_flag(7), ClockMode::High);
        assert_eq!(ClockMode::default(), ClockMode::High);
    }

    #[test]
    fn multiplier_mapping_is_244_low_731_high() {
        assert_eq!(ClockMode::Low.tuning().multiplier, 244);
        assert_eq!(ClockMode::High.tuning().multiplier, 731);
        assert_eq!(ClockMode::Low.tuning().range, DcoRange::Range3);
        assert_eq!(ClockMode::High.tuning().range, DcoRange::Range7);
        assert_eq!(ClockMode::Low.tuning().divider, FllDivider::Div1);
        assert_eq!(ClockMode::High.tuning().divider, FllDivider::Div1);
    }

    #[test]
    fn target_frequencies_fit_their_ranges() {
        assert_eq!(ClockMode::Low.target_hz(), 7_995_392);
        assert_eq!(ClockMode::High.target_hz(), 23_953_408);
        for mode in [ClockMode::Low, ClockMode::High] {
            let tuning = mode.tuning();
            assert!(tuning.target_hz() <= tuning.range.max_hz());
        }
    }

    #[test]
    fn even_number_of_toggles_returns_to_731() {
        let mut mode = ClockMode::default();
        for toggles in 1..=10 {
            mode = mode.toggled();
            let expected = if toggles % 2 == 0 { 731 } else { 244 };
            assert_eq!(mode.tuning().multiplier, expected);
        }
    }

    #[test]
    fn divider_bits_round_trip() {
        for bits in 0..6 {
            let divider = FllDivider::from_bits(bits).unwrap();
            assert_eq!(divider.bits(), bits);
        }
        assert_eq!(FllDivider::from_bits(6), None);
        assert_eq!(FllDivider::Div32.divisor(), 32);
    }

    #[test]
    fn bounded_poll_counts_attempts() {
        let mut left = 3;
        let polls = poll_bounded(
            || {
                if left == 0 {
                    Ok(())
                } else {
                    left -= 1;
                    Err(nb::Error::WouldBlock)
                }
            },
            10,
        );
        assert_eq!(polls, Some(4));
    }

    #[test]
    fn bounded_poll_gives_up() {
        let mut calls = 0;
        let polls = poll_bounded(
            || {
                calls += 1;
                Err(nb::Error::WouldBlock)
            },
            5,
        );
        assert_eq!(polls, None);
        assert_eq!(calls, 5);
    }
}
