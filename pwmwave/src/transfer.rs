//! The double-buffered transfer window between the mixer and the DMA.
//!
//! The DMA engine reads duty cycles out of a [`TransferBuffer`] at sample
//! rate while the refill interrupt rewrites the half the DMA is not in.
//! Nothing locks: exclusivity holds by construction, because the writer
//! always targets [`BufferHalf::other`] of the half the reader reports busy,
//! and the two halves never overlap.  That invariant is the whole reason
//! the buffer is split.
//!
//! Entries are interleaved stereo duty cycles.  Adjacent channel pairs
//! share one aligned 32-bit word so a word-sized DMA transfer moves a whole
//! frame into the slice's dual compare register in one beat.

use crate::limiter::Limiter;
use crate::track::Track;
use crate::{Duty, HALF_SAMPLES, SILENCE, TRANSFER_CHANNELS, TRANSFER_SAMPLES};

/// Identifies one half of the transfer buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferHalf {
    /// The first `HALF_SAMPLES` entries.
    First,
    /// The second `HALF_SAMPLES` entries.
    Second,
}

impl BufferHalf {
    /// The opposite half.  Writing to `busy.other()` is what keeps the
    /// writer and the DMA reader disjoint.
    pub fn other(self) -> Self {
        match self {
            BufferHalf::First => BufferHalf::Second,
            BufferHalf::Second => BufferHalf::First,
        }
    }

    fn offset(self) -> usize {
        match self {
            BufferHalf::First => 0,
            BufferHalf::Second => HALF_SAMPLES,
        }
    }
}

/// Interleaved duty-cycle storage for both transfer windows.
///
/// Starts out, and idles at, mid-scale silence.  Lives for the whole time
/// audio is running; on the target it sits in a `static` so the DMA can
/// hold its address.
#[repr(C, align(4))]
pub struct TransferBuffer {
    samples: [Duty; TRANSFER_SAMPLES],
}

impl TransferBuffer {
    /// A buffer full of silence.
    pub const fn new() -> Self {
        TransferBuffer {
            samples: [SILENCE; TRANSFER_SAMPLES],
        }
    }

    /// One half as a read slice.
    pub fn half(&self, half: BufferHalf) -> &[Duty] {
        let at = half.offset();
        &self.samples[at..at + HALF_SAMPLES]
    }

    /// One half as a write slice for the refill path.
    pub fn half_mut(&mut self, half: BufferHalf) -> &mut [Duty] {
        let at = half.offset();
        &mut self.samples[at..at + HALF_SAMPLES]
    }

    /// Address of the first entry, where the DMA read pointer starts and is
    /// rewound to.
    pub fn as_ptr(&self) -> *const Duty {
        self.samples.as_ptr()
    }

    /// Address of the first entry of the second half.  A DMA read pointer
    /// below this is consuming the first half, at or above it the second.
    pub fn midpoint_ptr(&self) -> *const Duty {
        self.samples[HALF_SAMPLES..].as_ptr()
    }
}

impl Default for TransferBuffer {
    fn default() -> Self {
        TransferBuffer::new()
    }
}

/// Renders one transfer window into `half`.
///
/// For every output frame: sum each playing track's volume-scaled sample
/// with saturating adds, pass the sum through the limiter once, shift to
/// mid-scale, and write the result to every interleaved channel.  Each
/// playing track advances exactly once per frame no matter how many tracks
/// are mixed.  With nothing playing the window is pure silence.
///
/// This is the interrupt hot path: no allocation, no blocking, no panics.
pub fn render_half<L: Limiter>(
    half: &mut [Duty],
    tracks: &mut [Option<Track<'_>>],
    limiter: &mut L,
) {
    for frame in half.chunks_exact_mut(TRANSFER_CHANNELS) {
        let mut mixing = false;
        let mut sum: i32 = 0;
        for track in tracks.iter_mut().flatten() {
            if track.is_playing() {
                mixing = true;
                sum = sum.saturating_add(track.scaled_sample());
                track.advance();
            }
        }
        let duty = if mixing {
            (limiter.limit(sum) + i32::from(SILENCE)) as Duty
        } else {
            SILENCE
        };
        frame.fill(duty);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::SampleBuffer;
    use crate::cursor;
    use crate::limiter::SoftLimiter;

    // 16-bit PCM that loads back as exactly `make(frame)`.
    fn pcm<const N: usize>(make: impl Fn(usize) -> i16) -> [u8; N] {
        let mut bytes = [0u8; N];
        let mut frame = 0;
        while frame * 2 < N {
            let raw = make(frame) * 64;
            bytes[frame * 2..frame * 2 + 2].copy_from_slice(&raw.to_le_bytes());
            frame += 1;
        }
        bytes
    }

    #[test]
    fn fresh_buffer_is_all_silence() {
        let tb = TransferBuffer::new();
        assert!(tb.half(BufferHalf::First).iter().all(|&d| d == SILENCE));
        assert!(tb.half(BufferHalf::Second).iter().all(|&d| d == SILENCE));
    }

    #[test]
    fn other_half_is_an_involution() {
        assert_eq!(BufferHalf::First.other(), BufferHalf::Second);
        assert_eq!(BufferHalf::Second.other(), BufferHalf::First);
        for half in [BufferHalf::First, BufferHalf::Second] {
            assert_ne!(half, half.other());
            assert_eq!(half, half.other().other());
        }
    }

    #[test]
    fn halves_partition_the_buffer() {
        let mut tb = TransferBuffer::new();
        tb.half_mut(BufferHalf::First).fill(1);
        assert!(tb.half(BufferHalf::Second).iter().all(|&d| d == SILENCE));
        tb.half_mut(BufferHalf::Second).fill(2);
        assert!(tb.half(BufferHalf::First).iter().all(|&d| d == 1));
        assert_eq!(
            tb.midpoint_ptr() as usize - tb.as_ptr() as usize,
            HALF_SAMPLES * core::mem::size_of::<Duty>()
        );
    }

    #[test]
    fn idle_render_emits_midscale_silence() {
        let mut tb = TransferBuffer::new();
        let mut tracks: [Option<Track>; 0] = [];
        let half = tb.half_mut(BufferHalf::First);
        half.fill(0);
        render_half(half, &mut tracks, &mut SoftLimiter);
        assert!(half.iter().all(|&d| d == SILENCE));
    }

    #[test]
    fn paused_tracks_render_as_silence() {
        let mut data = [0; 8];
        let mut buf = SampleBuffer::new(&mut data, 1);
        buf.load_raw(&pcm::<16>(|_| 200));
        let trk = Track::new(&buf);
        let mut tracks = [Some(trk)];
        let mut tb = TransferBuffer::new();
        render_half(tb.half_mut(BufferHalf::Second), &mut tracks, &mut SoftLimiter);
        assert!(tb.half(BufferHalf::Second).iter().all(|&d| d == SILENCE));
    }

    #[test]
    fn render_shifts_samples_to_midscale_on_both_channels() {
        let mut data = [0; 48];
        let mut buf = SampleBuffer::new(&mut data, 1);
        buf.load_raw(&pcm::<96>(|f| f as i16));
        let mut trk = Track::new(&buf);
        trk.play();
        let mut tracks = [Some(trk)];
        let mut tb = TransferBuffer::new();
        render_half(tb.half_mut(BufferHalf::First), &mut tracks, &mut SoftLimiter);
        let half = tb.half(BufferHalf::First);
        for frame in 0..HALF_SAMPLES / TRANSFER_CHANNELS {
            let expect = frame as u16 + SILENCE;
            assert_eq!(half[2 * frame], expect, "frame {frame} channel a");
            assert_eq!(half[2 * frame + 1], expect, "frame {frame} channel b");
        }
        // The other half is untouched.
        assert!(tb.half(BufferHalf::Second).iter().all(|&d| d == SILENCE));
        // One advance per frame.
        let trk = tracks[0].take().unwrap();
        assert_eq!(trk.position(), cursor::from_index(40));
    }

    #[test]
    fn mix_is_summed_then_limited_once() {
        // Two in-range tracks whose sum exceeds full scale must flatten at
        // the rail, not fold back or double-clip.
        let mut data_a = [0; 4];
        let mut buf_a = SampleBuffer::new(&mut data_a, 1);
        buf_a.load_raw(&pcm::<8>(|_| 400));
        let mut data_b = [0; 4];
        let mut buf_b = SampleBuffer::new(&mut data_b, 1);
        buf_b.load_raw(&pcm::<8>(|_| 400));
        let mut ta = Track::new(&buf_a);
        let mut tb_ = Track::new(&buf_b);
        ta.play();
        tb_.play();
        let mut tracks = [Some(ta), Some(tb_)];
        let mut tb = TransferBuffer::new();
        render_half(tb.half_mut(BufferHalf::First), &mut tracks, &mut SoftLimiter);
        assert!(tb.half(BufferHalf::First).iter().all(|&d| d == 1023));
    }

    #[test]
    fn negative_mix_clamps_to_zero_duty() {
        let mut data = [0; 4];
        let mut buf = SampleBuffer::new(&mut data, 1);
        buf.load_raw(&pcm::<8>(|_| -400));
        let mut ta = Track::new(&buf);
        let mut tb_ = Track::new(&buf);
        ta.play();
        tb_.play();
        let mut tracks = [Some(ta), Some(tb_)];
        let mut tb = TransferBuffer::new();
        render_half(tb.half_mut(BufferHalf::First), &mut tracks, &mut SoftLimiter);
        assert!(tb.half(BufferHalf::First).iter().all(|&d| d == 0));
    }

    #[test]
    fn track_stopping_mid_window_leaves_silence_after() {
        let mut data = [0; 8];
        let mut buf = SampleBuffer::new(&mut data, 1);
        buf.load_raw(&pcm::<16>(|_| 100));
        let mut trk = Track::new(&buf);
        trk.set_loops(1);
        trk.play();
        let mut tracks = [Some(trk)];
        let mut tb = TransferBuffer::new();
        render_half(tb.half_mut(BufferHalf::First), &mut tracks, &mut SoftLimiter);
        let half = tb.half(BufferHalf::First);
        // 8 frames of signal, then idle silence for the rest of the window.
        assert!(half[..16].iter().all(|&d| d == 100 + SILENCE));
        assert!(half[16..].iter().all(|&d| d == SILENCE));
        assert!(!tracks[0].as_ref().unwrap().is_playing());
    }
}
