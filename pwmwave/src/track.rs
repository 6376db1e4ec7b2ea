//! Playback tracks.
//!
//! A [`Track`] is a read head over a [`SampleBuffer`]: a fixed-point
//! position, a signed fixed-point speed whose sign selects direction, a
//! playable sub-range, loop bookkeeping and a volume scale.  The refill
//! interrupt is the only caller of [`Track::advance`], once per output
//! frame; everything else is a foreground setter that writes a single
//! self-contained field, so a setter interrupted mid-call never leaves a
//! track in a state the interrupt cannot consume.

use crate::buffer::SampleBuffer;
use crate::cursor::{self, Fp5};
use crate::PWM_RANGE;

/// One playback voice over a borrowed sample buffer.
///
/// The playable range is snapshotted from the buffer's valid range at
/// construction and may be narrowed afterwards with
/// [`set_playback_range`](Self::set_playback_range).  Reconfigure ranges or
/// buffers only while the track is stopped; the advance logic re-clamps
/// against the buffer every call, so a mid-flight change cannot fault, but
/// what it plays during the change is unspecified.
pub struct Track<'a> {
    buf: &'a SampleBuffer<'a>,
    position: Fp5,
    increment: Fp5,
    playback_start: usize,
    playback_len: usize,
    loops: i32,
    loop_count: i32,
    playing: bool,
    level: u32,
}

impl<'a> Track<'a> {
    /// Creates a stopped track over `buf` at unit speed and unity gain,
    /// looping forever, playing the buffer's whole valid range.
    pub fn new(buf: &'a SampleBuffer<'a>) -> Self {
        Track {
            buf,
            position: cursor::from_index(buf.sample_start()),
            increment: Fp5::ONE,
            playback_start: buf.sample_start(),
            playback_len: buf.sample_len(),
            loops: -1,
            loop_count: 0,
            playing: false,
            level: u32::from(PWM_RANGE),
        }
    }

    /// One past the last frame this track may read, clamped to the buffer.
    fn playback_end(&self) -> usize {
        (self.playback_start + self.playback_len).min(self.buf.valid_end())
    }

    fn done_looping(&self) -> bool {
        self.loops >= 0 && self.loop_count <= 1
    }

    /// Rewinds to the range boundary the current direction starts from and
    /// begins playing with a fresh loop budget.
    pub fn play(&mut self) {
        self.position = if self.increment >= Fp5::ZERO {
            cursor::from_index(self.playback_start)
        } else {
            cursor::from_index(self.playback_end())
        };
        self.loop_count = self.loops.max(1);
        self.playing = true;
    }

    /// Halts playback, leaving the position where it is.
    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// Continues playback from the paused position.
    pub fn resume(&mut self) {
        self.playing = true;
    }

    /// Halts playback and rewinds to the starting boundary for the current
    /// direction, so the track reads as freshly cued.
    pub fn stop(&mut self) {
        self.playing = false;
        self.position = if self.increment >= Fp5::ZERO {
            cursor::from_index(self.playback_start)
        } else {
            cursor::from_index(self.playback_end())
        };
    }

    /// Whether the track is currently generating samples.
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Current fixed-point read position.
    pub fn position(&self) -> Fp5 {
        self.position
    }

    /// Sets playback speed.  Negative plays in reverse; exactly zero is
    /// ignored, since a frozen cursor on a playing track would hang the
    /// loop accounting.
    pub fn set_speed(&mut self, speed: f32) {
        if speed == 0.0 {
            return;
        }
        self.increment = Fp5::saturating_from_num(speed);
    }

    /// Current speed, as close to the last accepted value as the cursor's
    /// fractional resolution allows.
    pub fn speed(&self) -> f32 {
        self.increment.to_num::<f32>()
    }

    /// Sets volume. `0.0` is silence and `1.0` unity; values above unity are
    /// deliberately allowed and will overdrive into the limiter.  Negative
    /// values clamp to silence.
    pub fn set_level(&mut self, level: f32) {
        self.level = ((level * f32::from(PWM_RANGE)) as i32).max(0) as u32;
    }

    /// Raw volume factor, where [`PWM_RANGE`] is unity gain.
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Sets how many times [`play`](Self::play) runs the range. `-1` loops
    /// forever; values below that clamp to `-1`.
    pub fn set_loops(&mut self, loops: i32) {
        self.loops = loops.max(-1);
    }

    /// Configured loop count.
    pub fn loops(&self) -> i32 {
        self.loops
    }

    /// Loops still to play in the current run.
    pub fn loop_count(&self) -> i32 {
        self.loop_count
    }

    /// Narrows playback to `len` frames starting at frame `start`.  Only
    /// meaningful while stopped.
    pub fn set_playback_range(&mut self, start: usize, len: usize) {
        self.playback_start = start;
        self.playback_len = len;
    }

    /// First frame of the playable range.
    pub fn playback_start(&self) -> usize {
        self.playback_start
    }

    /// Length of the playable range in frames.
    pub fn playback_len(&self) -> usize {
        self.playback_len
    }

    /// The sample under the cursor, scaled by the track's volume.  Over-unity
    /// volumes may push the result outside the PWM range; the mixer limits
    /// after summing.
    pub fn scaled_sample(&self) -> i32 {
        let raw = i32::from(self.buf.sample(cursor::to_index(self.position), 0));
        raw.saturating_mul(self.level as i32) / i32::from(PWM_RANGE)
    }

    /// Steps the cursor one output frame and resolves any range crossing.
    ///
    /// The wrap check is a loop, not a single test, so speeds larger than
    /// the whole playable range still land in range.  When the loop budget
    /// runs out the track stops with its position clamped to the boundary
    /// it was heading away from, ready to replay.
    pub fn advance(&mut self) {
        if !self.playing {
            return;
        }
        let start = cursor::from_index(self.playback_start);
        let end = cursor::from_index(self.playback_end());
        let range = end - start;
        if range <= Fp5::ZERO {
            self.playing = false;
            return;
        }
        self.position += self.increment;
        if self.increment >= Fp5::ZERO {
            while self.position >= end {
                if self.done_looping() {
                    self.playing = false;
                    self.position = start;
                    break;
                }
                self.position -= range;
                self.loop_count -= 1;
            }
        } else {
            while self.position <= start {
                if self.done_looping() {
                    self.playing = false;
                    self.position = end;
                    break;
                }
                self.position += range;
                self.loop_count -= 1;
            }
        }
    }
}
