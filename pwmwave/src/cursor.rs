//! Fixed-point playback positions.
//!
//! Track cursors advance by a fractional increment once per output frame, so
//! they need sub-sample resolution without dragging an FPU into the refill
//! interrupt.  A 27.5 fixed-point signed integer gives 1/32 sample steps,
//! fine enough that the coarsest audible mistuning from speed quantization
//! stays below half a percent, while still addressing every sample of any
//! buffer that fits in RAM.

use fixed::types::I27F5;

/// Fixed-point sample position or per-frame increment, 5 fractional bits.
pub type Fp5 = I27F5;

/// Fractional bits carried by [`Fp5`].
pub const FRAC_BITS: u32 = 5;

/// Converts a sample index to a fixed-point position, saturating at the type
/// limit rather than wrapping.
#[inline]
pub fn from_index(index: usize) -> Fp5 {
    Fp5::saturating_from_num(index)
}

/// Converts a fixed-point position back to a sample index, dropping the
/// fractional part.  Negative positions clamp to index 0; cursors only go
/// negative transiently while a reverse wrap is being resolved, and callers
/// index buffers with the result.
#[inline]
pub fn to_index(position: Fp5) -> usize {
    position.max(Fp5::ZERO).to_num::<usize>()
}
