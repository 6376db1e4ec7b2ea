//! Transfer pacing and refill-trigger timing.
//!
//! Two clocks have to agree: a DMA pacing timer meters duty-cycle words out
//! of the transfer buffer at `sys_clk * num / den`, and a free-running
//! trigger PWM slice wraps once per transfer window to fire the refill
//! interrupt.  [`PaceConfig`] is the fraction; [`TriggerTiming`] derives the
//! trigger slice's divider from it so the two stay in lockstep.  When the
//! fraction does not divide the window into an exact number of sixteenths of
//! a system tick the trigger drifts slowly against the DMA, which the phase
//! head start absorbs for any realistic run length.

use crate::{PWM_RANGE, PWM_TOP, TRANSFER_WINDOW};

/// Counter ticks of head start the trigger slice gets on the DMA's
/// consumption point, so the writer always leads the reader.  Tuned on
/// hardware; retune with the calibration utility if a different system
/// clock or window size changes the margin.
pub const DEFAULT_TRIGGER_PHASE: u16 = 28;

/// Output sample rate as a fraction `num / den` of the system clock, the
/// ratio a DMA pacing timer applies in hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaceConfig {
    /// Numerator of the pacing fraction.
    pub num: u16,
    /// Denominator of the pacing fraction.
    pub den: u16,
}

impl PaceConfig {
    /// One sample every three carrier periods.  Divides the carrier rate
    /// exactly, so the refill trigger never drifts against the DMA.  This
    /// is the default pace.
    pub const CARRIER_THIRD: PaceConfig = PaceConfig {
        num: 1,
        den: 3 * PWM_RANGE as u16,
    };

    /// Closest 16-bit fraction to 44.1 kHz from a 133 MHz system clock.
    /// Inexact: the trigger divider rounds to its sixteenth-tick grid, so
    /// trigger and DMA drift slowly; see [`DEFAULT_TRIGGER_PHASE`].
    pub const KHZ_44_1: PaceConfig = PaceConfig { num: 7, den: 21111 };

    /// Sample rate this pace produces from a `sys_hz` system clock.
    pub fn sample_rate(&self, sys_hz: u32) -> u32 {
        let num = u64::from(sys_hz) * u64::from(self.num);
        let den = u64::from(self.den);
        ((num + den / 2) / den) as u32
    }
}

impl Default for PaceConfig {
    fn default() -> Self {
        PaceConfig::CARRIER_THIRD
    }
}

/// Divider and wrap settings for the trigger PWM slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerTiming {
    /// Integer part of the 8.4 clock divider.
    pub div_int: u8,
    /// Fractional sixteenths of the clock divider.
    pub div_frac: u8,
    /// Counter wrap value.
    pub top: u16,
}

impl TriggerTiming {
    /// Computes the trigger divider that makes the slice wrap once per
    /// [`TRANSFER_WINDOW`] output samples under `pace`.
    ///
    /// The ideal divider is `window * den / (num * range)` counter ticks in
    /// sixteenths; it is rounded to the nearest sixteenth and clamped to
    /// the divider's representable range rather than rejected.
    pub fn for_pace(pace: PaceConfig) -> Self {
        let ticks16 = 16 * TRANSFER_WINDOW as u64 * u64::from(pace.den);
        let per_wrap = u64::from(pace.num) * u64::from(PWM_RANGE);
        let div16 = ((ticks16 + per_wrap / 2) / per_wrap).clamp(16, 0xfff);
        TriggerTiming {
            div_int: (div16 >> 4) as u8,
            div_frac: (div16 & 0xf) as u8,
            top: PWM_TOP,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_phase_head_start() {
        assert_eq!(DEFAULT_TRIGGER_PHASE, 28);
    }

    #[test]
    fn carrier_third_divides_exactly() {
        let t = TriggerTiming::for_pace(PaceConfig::CARRIER_THIRD);
        assert_eq!((t.div_int, t.div_frac), (120, 0));
        assert_eq!(t.top, PWM_TOP);
    }

    #[test]
    fn cd_rate_divider_rounds_to_sixteenths() {
        let t = TriggerTiming::for_pace(PaceConfig::KHZ_44_1);
        assert_eq!((t.div_int, t.div_frac), (117, 13));
    }

    #[test]
    fn sample_rates_from_a_133_mhz_clock() {
        assert_eq!(PaceConfig::CARRIER_THIRD.sample_rate(133_000_000), 43_294);
        assert_eq!(PaceConfig::KHZ_44_1.sample_rate(133_000_000), 44_100);
    }

    #[test]
    fn absurd_pace_clamps_into_divider_range() {
        let t = TriggerTiming::for_pace(PaceConfig { num: 1, den: 65_535 });
        assert_eq!((t.div_int, t.div_frac), (255, 15));
        let t = TriggerTiming::for_pace(PaceConfig { num: 65_535, den: 1 });
        assert_eq!((t.div_int, t.div_frac), (1, 0));
    }
}
