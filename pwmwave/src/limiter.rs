//! Amplitude limiting at the end of the mix chain.
//!
//! Mixed samples are hard-limited to the signed PWM range before they are
//! shifted up to mid-scale duty cycles.  Overdriven tracks therefore flatten
//! instead of wrapping, which distorts but never produces the full-scale
//! clicks that wraparound would.  The engine takes the limiter as a trait so
//! ports can substitute hardware: the RP2040 build clamps through a SIO
//! interpolator lane instead of branching.

use crate::PWM_RANGE;

/// Lowest signed sample value that fits the PWM range.
pub const LIMIT_LO: i32 = -(PWM_RANGE as i32 / 2);

/// Highest signed sample value that fits the PWM range.
pub const LIMIT_HI: i32 = PWM_RANGE as i32 / 2 - 1;

/// Clamps one mixed sample into `[LIMIT_LO, LIMIT_HI]`.
///
/// Called once per output sample from the refill path, so implementations
/// must not allocate or block.  Takes `&mut self` because hardware limiters
/// work by writing the sample through peripheral registers.
pub trait Limiter {
    /// Returns `sample` limited to the representable signed range.
    fn limit(&mut self, sample: i32) -> i32;
}

/// Branch-based limiter with no hardware dependencies, used on the host and
/// as a fallback on targets without a spare interpolator.
#[derive(Debug, Default, Clone, Copy)]
pub struct SoftLimiter;

impl Limiter for SoftLimiter {
    #[inline]
    fn limit(&mut self, sample: i32) -> i32 {
        sample.clamp(LIMIT_LO, LIMIT_HI)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_range_samples_pass_through() {
        let mut lim = SoftLimiter;
        for s in [LIMIT_LO, -1, 0, 1, 300, LIMIT_HI] {
            assert_eq!(lim.limit(s), s);
        }
    }

    #[test]
    fn out_of_range_samples_flatten() {
        let mut lim = SoftLimiter;
        assert_eq!(lim.limit(LIMIT_HI + 1), LIMIT_HI);
        assert_eq!(lim.limit(LIMIT_LO - 1), LIMIT_LO);
        assert_eq!(lim.limit(i32::MAX), LIMIT_HI);
        assert_eq!(lim.limit(i32::MIN), LIMIT_LO);
    }

    #[test]
    fn range_is_asymmetric_by_one() {
        // Two's complement: one more value below zero than above.
        assert_eq!(LIMIT_LO, -512);
        assert_eq!(LIMIT_HI, 511);
    }
}
