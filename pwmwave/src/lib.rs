//! Playback core for a PWM audio output engine.  This crate holds every part
//! of the engine that does not touch a hardware register: sample buffers and
//! the routines that generate or load their contents, fixed-point playback
//! cursors with variable speed, direction and looping, the amplitude limiter
//! seam, and the double-buffer render routine that the platform's refill
//! interrupt calls once per window.  It is `no_std` and allocation-free, so
//! everything here can be unit tested on a host as well as run on the target.
//!
//! The hardware half of the project (`pwmwave_2040`) owns the PWM slices, the
//! DMA channels and the interrupt itself, and calls into this crate for all
//! of the audio math.
//!
//! Samples are signed integers at [`PWM_BITS`] of effective depth.  Silence
//! on the wire is a duty cycle of exactly [`SILENCE`] (50%); the whole render
//! path is written against that mid-scale convention, and anything louder
//! than full scale is hard-limited before the shift to mid-scale rather than
//! wrapped.

#![no_std]
#![warn(missing_docs)]

pub mod buffer;
pub mod cursor;
pub mod limiter;
pub mod timing;
pub mod track;
pub mod transfer;

/// One audio sample as stored in a [`SampleBuffer`].
pub type Sample = i16;

/// One entry of the transfer buffer: an unsigned PWM duty-cycle level.
pub type Duty = u16;

/// Effective sample depth of the PWM carrier, in bits.
pub const PWM_BITS: u32 = 10;

/// Number of duty-cycle steps in one carrier period (`2^PWM_BITS`).  This is
/// also the nominal unity volume: a track level of `PWM_RANGE` plays its
/// buffer at unit gain, and levels above it overdrive into the limiter.
pub const PWM_RANGE: u16 = 1 << PWM_BITS;

/// Wrap value for the audio PWM counter.  The carrier frequency is the
/// system clock divided by `PWM_TOP + 1`.
pub const PWM_TOP: u16 = PWM_RANGE - 1;

/// Mid-scale duty cycle, the on-the-wire representation of silence.
pub const SILENCE: Duty = PWM_RANGE / 2;

/// Output frames generated per refill interrupt, which is also the size in
/// frames of one half of the transfer buffer.  Keeping this small keeps the
/// refill rate well above audibility; with a much larger window the
/// interrupt rate descends into the audio band and modulates the noise
/// floor audibly.
pub const TRANSFER_WINDOW: usize = 40;

/// Interleaved channel count of the transfer buffer (the two output pins of
/// one PWM slice).
pub const TRANSFER_CHANNELS: usize = 2;

/// Samples in one half of the transfer buffer.
pub const HALF_SAMPLES: usize = TRANSFER_WINDOW * TRANSFER_CHANNELS;

/// Samples in the whole double-buffered transfer buffer.
pub const TRANSFER_SAMPLES: usize = 2 * HALF_SAMPLES;

/// Size of the engine's track table.
pub const MAX_TRACKS: usize = 24;

pub use buffer::{LoadOutcome, SampleBuffer};
pub use cursor::Fp5;
pub use limiter::{Limiter, SoftLimiter};
pub use timing::{PaceConfig, TriggerTiming};
pub use track::Track;
pub use transfer::{render_half, BufferHalf, TransferBuffer};
