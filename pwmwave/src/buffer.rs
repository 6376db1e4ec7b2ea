//! Sample storage plus the routines that put audio into it.
//!
//! A [`SampleBuffer`] borrows a caller-owned slice of samples, usually a
//! `static` on the target, and layers an interleaved-channel view with a
//! valid range on top of it.  The fill routines sample a waveform function
//! across the buffer and the loader converts raw 16-bit little-endian PCM
//! down to the engine's internal depth.  Tracks hold shared borrows of the
//! buffer they read, so a buffer cannot be refilled while anything is
//! playing from it.

use log::{debug, warn};
use num_traits::Float;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::{Sample, PWM_BITS, SILENCE};

/// Divisor taking a native 16-bit sample down to the internal depth.
const DEPTH_DIVISOR: Sample = 1 << (16 - PWM_BITS);

/// Seed for [`SampleBuffer::fill_noise`], fixed so refills are identical.
const NOISE_SEED: u64 = 666;

/// What a raw-PCM load actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOutcome {
    /// Frames now valid in the buffer.
    pub frames: usize,
    /// The source held at least a full buffer's worth of bytes, so the tail
    /// of it was dropped.
    pub truncated: bool,
}

/// An interleaved sample buffer with a valid playback range.
///
/// `sample_start`/`sample_len` describe the frames the most recent fill or
/// load produced; newly constructed buffers consider their whole capacity
/// valid.  Tracks snapshot this range when they are created.
pub struct SampleBuffer<'a> {
    data: &'a mut [Sample],
    channels: usize,
    sample_start: usize,
    sample_len: usize,
}

impl<'a> SampleBuffer<'a> {
    /// Wraps a sample slice as an interleaved buffer of `channels` channels.
    pub fn new(data: &'a mut [Sample], channels: usize) -> Self {
        let channels = channels.max(1);
        let frames = data.len() / channels;
        SampleBuffer {
            data,
            channels,
            sample_start: 0,
            sample_len: frames,
        }
    }

    /// Interleaved channel count.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Whole frames the underlying slice can hold.
    pub fn capacity_frames(&self) -> usize {
        self.data.len() / self.channels
    }

    /// First valid frame.
    pub fn sample_start(&self) -> usize {
        self.sample_start
    }

    /// Valid frames counted from [`sample_start`](Self::sample_start).
    pub fn sample_len(&self) -> usize {
        self.sample_len
    }

    /// One past the last frame a cursor may read.
    pub fn valid_end(&self) -> usize {
        (self.sample_start + self.sample_len).min(self.capacity_frames())
    }

    /// The raw interleaved samples.
    pub fn data(&self) -> &[Sample] {
        self.data
    }

    /// Reads one sample, returning silence for out-of-range indices rather
    /// than faulting.
    #[inline]
    pub fn sample(&self, frame: usize, channel: usize) -> Sample {
        self.data
            .get(frame * self.channels + channel)
            .copied()
            .unwrap_or(0)
    }

    /// Writes `value` to every channel of `frame`.
    fn set_frame(&mut self, frame: usize, value: Sample) {
        let base = frame * self.channels;
        for channel in 0..self.channels {
            if let Some(entry) = self.data.get_mut(base + channel) {
                *entry = value;
            }
        }
    }

    /// Fills the whole buffer by sweeping `f` over `range` once per repeat,
    /// `repeats` times across the capacity, and marks it all valid.
    pub fn fill_with_fn<F>(&mut self, range: (f32, f32), f: F, repeats: f32)
    where
        F: Fn(f32) -> Sample,
    {
        let frames = self.capacity_frames();
        self.fill_range_with_fn(range, f, repeats, 0, frames);
    }

    /// Fills `len` frames starting at frame `start`, sweeping `f` over
    /// `range` `repeats` times across that window, and marks the window as
    /// the buffer's valid range.
    ///
    /// `start` wraps around the capacity and `len` is truncated against the
    /// end of the buffer, so oversized requests shrink instead of faulting.
    pub fn fill_range_with_fn<F>(
        &mut self,
        range: (f32, f32),
        f: F,
        repeats: f32,
        start: usize,
        len: usize,
    ) where
        F: Fn(f32) -> Sample,
    {
        let frames = self.capacity_frames();
        if frames == 0 {
            return;
        }
        let start = start % frames;
        let len = len.min(frames - start);
        if len == 0 {
            return;
        }
        self.sample_start = start;
        self.sample_len = len;

        let repeats = if repeats > 0.0 { repeats } else { 1.0 };
        let repeat_len = len as f32 / repeats;
        let dx = (range.1 - range.0) / repeat_len;
        let mut phase = 0.0f32;
        for frame in 0..len {
            phase += 1.0;
            while phase > repeat_len {
                phase -= repeat_len;
            }
            self.set_frame(start + frame, f(range.0 + phase * dx));
        }
    }

    /// Fills the buffer with `repeats` cycles of a full-scale sine.  With
    /// `positive` the wave rides on a half-scale offset so every sample is
    /// non-negative, which suits data consumed as raw duty cycles.
    pub fn fill_sine(&mut self, repeats: u32, positive: bool) {
        let scale = f32::from(SILENCE);
        let offset = if positive { scale } else { 0.0 };
        self.fill_with_fn(
            (0.0, core::f32::consts::TAU),
            |x| (Float::sin(x) * scale + offset) as Sample,
            repeats as f32,
        );
    }

    /// Fills the buffer with `repeats` cycles of a full-scale square wave,
    /// offset to all-positive when `positive` is set.
    pub fn fill_square(&mut self, repeats: u32, positive: bool) {
        let high = SILENCE as Sample;
        let offset = if positive { high } else { 0 };
        self.fill_with_fn(
            (0.0, 1.0),
            |x| if x >= 0.5 { offset - high } else { offset + high },
            repeats as f32,
        );
    }

    /// Fills the buffer with `repeats` cycles of a full-scale sawtooth
    /// running low to high.  `positive` offsets it like
    /// [`fill_sine`](Self::fill_sine).
    pub fn fill_saw(&mut self, repeats: u32, positive: bool) {
        let scale = f32::from(SILENCE);
        let offset = if positive { scale } else { 0.0 };
        self.fill_with_fn(
            (-1.0, 1.0),
            |x| (x * scale + offset) as Sample,
            repeats as f32,
        );
    }

    /// Fills every entry with uniform white noise at full scale.  The
    /// generator is seeded with a constant, so the noise is the same on
    /// every call.  The valid range is left as it was.
    pub fn fill_noise(&mut self) {
        let mut rng = SmallRng::seed_from_u64(NOISE_SEED);
        let range = i32::from(crate::PWM_RANGE);
        let mid = i32::from(SILENCE);
        for entry in self.data.iter_mut() {
            *entry = (rng.gen_range(0..range) - mid) as Sample;
        }
    }

    /// Loads signed 16-bit little-endian PCM, scaling each sample down to
    /// the internal depth.
    ///
    /// Consumes `min(bytes.len(), capacity)` bytes.  A short source leaves
    /// the remainder of the buffer zeroed; a source at least as long as the
    /// buffer reports truncation.  Both are recorded conditions, not errors,
    /// and playback proceeds on whatever was loaded.
    pub fn load_raw(&mut self, bytes: &[u8]) -> LoadOutcome {
        if bytes.is_empty() {
            warn!("sample load: read failure");
            return LoadOutcome {
                frames: 0,
                truncated: false,
            };
        }
        let cap_bytes = self.data.len() * 2;
        let taken = bytes.len().min(cap_bytes) & !1;
        let entries = taken / 2;
        for (entry, pair) in self.data.iter_mut().zip(bytes.chunks_exact(2)) {
            let raw = Sample::from_le_bytes([pair[0], pair[1]]);
            *entry = raw / DEPTH_DIVISOR;
        }
        for entry in &mut self.data[entries..] {
            *entry = 0;
        }
        let truncated = bytes.len() >= cap_bytes;
        if truncated {
            warn!("sample load: source truncated to {} bytes", cap_bytes);
        } else {
            debug!("sample load: short read, {} of {} bytes", taken, cap_bytes);
        }
        self.sample_start = 0;
        self.sample_len = entries / self.channels;
        LoadOutcome {
            frames: self.sample_len,
            truncated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_buffer_is_fully_valid() {
        let mut data = [0; 16];
        let buf = SampleBuffer::new(&mut data, 2);
        assert_eq!(buf.capacity_frames(), 8);
        assert_eq!(buf.sample_start(), 0);
        assert_eq!(buf.sample_len(), 8);
        assert_eq!(buf.valid_end(), 8);
    }

    #[test]
    fn short_load_zero_fills_and_counts_frames() {
        let mut data = [7; 8];
        let mut buf = SampleBuffer::new(&mut data, 1);
        let bytes = [0x40u8, 0x00, 0x80, 0xff]; // 64, -128
        let outcome = buf.load_raw(&bytes);
        assert_eq!(
            outcome,
            LoadOutcome {
                frames: 2,
                truncated: false
            }
        );
        assert_eq!(buf.data()[..2], [1, -2]);
        assert!(buf.data()[2..].iter().all(|&s| s == 0));
        assert_eq!(buf.sample_len(), 2);
    }

    #[test]
    fn full_load_reports_truncation() {
        let mut data = [0; 4];
        let mut buf = SampleBuffer::new(&mut data, 1);
        let outcome = buf.load_raw(&[0u8; 8]);
        assert!(outcome.truncated);
        assert_eq!(outcome.frames, 4);

        let mut data = [0; 4];
        let mut buf = SampleBuffer::new(&mut data, 1);
        let outcome = buf.load_raw(&[0u8; 10]);
        assert!(outcome.truncated);
        assert_eq!(outcome.frames, 4);
    }

    #[test]
    fn empty_load_is_recorded_not_fatal() {
        let mut data = [5; 4];
        let mut buf = SampleBuffer::new(&mut data, 1);
        let outcome = buf.load_raw(&[]);
        assert_eq!(outcome.frames, 0);
        assert!(!outcome.truncated);
        // Contents untouched by a failed read.
        assert_eq!(buf.data(), &[5, 5, 5, 5]);
    }

    #[test]
    fn load_scales_16_bit_down_toward_zero() {
        let mut data = [0; 3];
        let mut buf = SampleBuffer::new(&mut data, 1);
        let mut bytes = [0u8; 6];
        bytes[0..2].copy_from_slice(&6400i16.to_le_bytes());
        bytes[2..4].copy_from_slice(&(-100i16).to_le_bytes());
        bytes[4..6].copy_from_slice(&(-6400i16).to_le_bytes());
        buf.load_raw(&bytes);
        assert_eq!(buf.data(), &[100, -1, -100]);
    }

    #[test]
    fn load_drops_dangling_byte() {
        let mut data = [0; 4];
        let mut buf = SampleBuffer::new(&mut data, 1);
        let outcome = buf.load_raw(&[0x00, 0x01, 0xaa]);
        assert_eq!(outcome.frames, 1);
        assert_eq!(buf.data()[0], 256 / i16::from(DEPTH_DIVISOR));
    }

    #[test]
    fn fill_writes_every_channel() {
        let mut data = [0; 12];
        let mut buf = SampleBuffer::new(&mut data, 2);
        buf.fill_square(1, false);
        for frame in 0..buf.capacity_frames() {
            assert_eq!(buf.sample(frame, 0), buf.sample(frame, 1));
        }
    }

    #[test]
    fn ranged_fill_wraps_start_and_truncates_len() {
        let mut data = [0; 10];
        let mut buf = SampleBuffer::new(&mut data, 1);
        // Start one full lap past frame 6; only 4 frames fit from there.
        buf.fill_range_with_fn((0.0, 1.0), |_| 9, 1.0, 16, 100);
        assert_eq!(buf.sample_start(), 6);
        assert_eq!(buf.sample_len(), 4);
        assert_eq!(buf.data()[..6], [0; 6]);
        assert_eq!(buf.data()[6..], [9; 4]);
    }

    #[test]
    fn ranged_fill_with_zero_len_changes_nothing() {
        let mut data = [3; 4];
        let mut buf = SampleBuffer::new(&mut data, 1);
        buf.fill_range_with_fn((0.0, 1.0), |_| 9, 1.0, 4, 0);
        assert_eq!(buf.data(), &[3, 3, 3, 3]);
        assert_eq!(buf.sample_start(), 0);
        assert_eq!(buf.sample_len(), 4);
    }

    #[test]
    fn sine_fill_spans_full_scale() {
        let mut data = [0; 256];
        let mut buf = SampleBuffer::new(&mut data, 1);
        buf.fill_sine(1, false);
        let max = buf.data().iter().copied().max().unwrap();
        let min = buf.data().iter().copied().min().unwrap();
        assert!(max > 500, "peak {max}");
        assert!(min < -500, "trough {min}");
    }

    #[test]
    fn positive_sine_never_goes_negative() {
        let mut data = [0; 256];
        let mut buf = SampleBuffer::new(&mut data, 1);
        buf.fill_sine(3, true);
        assert!(buf.data().iter().all(|&s| s >= 0));
        assert!(buf.data().iter().any(|&s| s > 900));
    }

    #[test]
    fn square_fill_is_two_level() {
        let mut data = [0; 64];
        let mut buf = SampleBuffer::new(&mut data, 1);
        buf.fill_square(2, false);
        let high = SILENCE as Sample;
        assert!(buf.data().iter().all(|&s| s == high || s == -high));
        assert!(buf.data().iter().any(|&s| s == high));
        assert!(buf.data().iter().any(|&s| s == -high));
    }

    #[test]
    fn positive_square_sits_on_zero_and_full_scale() {
        let mut data = [0; 64];
        let mut buf = SampleBuffer::new(&mut data, 1);
        buf.fill_square(2, true);
        let high = SILENCE as Sample;
        assert!(buf.data().iter().all(|&s| s == 0 || s == 2 * high));
        assert!(buf.data().iter().any(|&s| s == 0));
        assert!(buf.data().iter().any(|&s| s == 2 * high));
    }

    #[test]
    fn saw_fill_ramps_within_each_cycle() {
        let mut data = [0; 64];
        let mut buf = SampleBuffer::new(&mut data, 1);
        buf.fill_saw(1, false);
        // A single cycle rises monotonically over the whole buffer.
        for pair in buf.data().windows(2) {
            assert!(pair[1] >= pair[0], "ramp broke at {pair:?}");
        }
    }

    #[test]
    fn positive_saw_never_goes_negative() {
        let mut data = [0; 64];
        let mut buf = SampleBuffer::new(&mut data, 1);
        buf.fill_saw(2, true);
        assert!(buf.data().iter().all(|&s| s >= 0));
        assert!(buf.data().iter().any(|&s| s > 900));
    }

    #[test]
    fn noise_fill_is_deterministic_and_bounded() {
        let mut a = [0; 128];
        let mut b = [0; 128];
        SampleBuffer::new(&mut a, 1).fill_noise();
        SampleBuffer::new(&mut b, 2).fill_noise();
        assert_eq!(a, b);
        let mid = SILENCE as Sample;
        assert!(a.iter().all(|&s| (-mid..mid).contains(&s)));
        assert!(a.iter().any(|&s| s != 0));
    }

    #[test]
    fn noise_fill_leaves_valid_range_alone() {
        let mut data = [0; 32];
        let mut buf = SampleBuffer::new(&mut data, 1);
        buf.fill_range_with_fn((0.0, 1.0), |_| 1, 1.0, 8, 8);
        buf.fill_noise();
        assert_eq!(buf.sample_start(), 8);
        assert_eq!(buf.sample_len(), 8);
    }
}
