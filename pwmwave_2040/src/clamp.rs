//! Branch-free limiting on the SIO interpolator.
//!
//! INTERP1 has a clamp mode the CPU cores do not otherwise need here, so
//! the mixer's limiter seam maps straight onto it: program the bounds once,
//! then limiting a sample is one register write and one register read.

use pwmwave::limiter::{Limiter, LIMIT_HI, LIMIT_LO};
use rp_pico::hal::sio::{Interp1, Lane, LaneCtrl};

/// The second SIO interpolator, configured as a signed hard clamp over the
/// PWM range.
pub struct ClampUnit {
    interp: Interp1,
}

impl ClampUnit {
    /// Claims `interp` and programs lane 0 for signed clamping, lower bound
    /// in BASE0 and upper bound in BASE1.
    pub fn new(mut interp: Interp1) -> Self {
        const CTRL: u32 = LaneCtrl {
            clamp: true,
            signed: true,
            ..LaneCtrl::new()
        }
        .encode();
        let lane0 = interp.get_lane0();
        lane0.set_ctrl(CTRL);
        lane0.set_base(LIMIT_LO as u32);
        interp.get_lane1().set_base(LIMIT_HI as u32);
        ClampUnit { interp }
    }
}

impl Limiter for ClampUnit {
    #[inline]
    fn limit(&mut self, sample: i32) -> i32 {
        let lane0 = self.interp.get_lane0();
        lane0.set_accum(sample as u32);
        lane0.peek() as i32
    }
}
