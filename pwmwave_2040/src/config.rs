//! Hardware resource assignment for the Pico build.
//!
//! GPIO2 and GPIO3 are the A and B outputs of PWM slice 1, so that slice is
//! the duty-cycle DAC.  Slice 7 stays unrouted and only times the refill
//! interrupt.  DMA channel 0 moves samples; channel 1 exists to rewind
//! channel 0's read pointer.

use rp_pico::hal::dma::{CH0, CH1};
use rp_pico::hal::pwm::{Pwm1, Pwm7};

/// PWM slice driving the output pins (GPIO2 = channel A, GPIO3 = channel B).
pub type AudioSliceId = Pwm1;

/// Free-running slice whose wrap fires the refill interrupt.
pub type TriggerSliceId = Pwm7;

/// DMA channel streaming duty cycles into the audio slice.
pub type DataChannelId = CH0;

/// DMA channel that rewinds [`DataChannelId`]'s read pointer.
pub type ControlChannelId = CH1;

/// Register index of [`AudioSliceId`].
pub const AUDIO_SLICE_NUM: usize = 1;

/// Register index of [`TriggerSliceId`].
pub const TRIGGER_SLICE_NUM: usize = 7;
