//! Engine state, its control surface and the refill interrupt.
//!
//! A single [`AudioEngine`] lives behind a critical-section mutex.  It is
//! installed once by [`AudioEngine::init`], which refuses a second caller,
//! and from then on two parties touch it: the `PWM_IRQ_WRAP` handler, which
//! renders one buffer half per trigger wrap, and [`EngineHandle`], a `Copy`
//! token whose methods borrow the engine briefly with interrupts masked.

use core::cell::RefCell;
use core::sync::atomic::{AtomicU32, Ordering};

use critical_section::Mutex;
use pwmwave::timing::{PaceConfig, DEFAULT_TRIGGER_PHASE};
use pwmwave::transfer::render_half;
use pwmwave::{SampleBuffer, Track, TransferBuffer, MAX_TRACKS, PWM_RANGE};
use rp_pico::hal::dma::Channel;
use rp_pico::hal::pac;
use rp_pico::hal::pac::interrupt;
use rp_pico::hal::pwm::{FreeRunning, Slice};
use rp_pico::hal::sio::Interp1;

use crate::clamp::ClampUnit;
use crate::config::{AudioSliceId, ControlChannelId, DataChannelId, TriggerSliceId};
use crate::streamer::PwmStreamer;

static ENGINE: Mutex<RefCell<Option<AudioEngine>>> = Mutex::new(RefCell::new(None));

/// Refill interrupts serviced since boot.  Written only by the handler.
static REFILLS: AtomicU32 = AtomicU32::new(0);

/// A second [`AudioEngine::init`] call.  There is one PWM block and one DMA
/// unit, so there is one engine.
#[derive(Debug)]
pub enum InitError {
    /// An engine already owns the audio hardware.
    AlreadyInstalled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    /// Every slot in the track table is occupied.
    TrackTableFull,
}

const NO_TRACK: Option<Track<'static>> = None;

pub struct AudioEngine {
    streamer: PwmStreamer,
    clamp: ClampUnit,
    buffer: &'static mut TransferBuffer,
    tracks: [Option<Track<'static>>; MAX_TRACKS],
    phase: u16,
}

impl AudioEngine {
    /// Builds the engine around the audio hardware and installs it, leaving
    /// output stopped.  Fails if an engine is already installed.
    pub fn init(
        audio: Slice<AudioSliceId, FreeRunning>,
        trigger: Slice<TriggerSliceId, FreeRunning>,
        data_ch: Channel<DataChannelId>,
        ctrl_ch: Channel<ControlChannelId>,
        interp: Interp1,
        buffer: &'static mut TransferBuffer,
        pace: PaceConfig,
    ) -> Result<EngineHandle, InitError> {
        critical_section::with(|cs| {
            let mut slot = ENGINE.borrow_ref_mut(cs);
            if slot.is_some() {
                return Err(InitError::AlreadyInstalled);
            }
            let streamer = PwmStreamer::new(audio, trigger, data_ch, ctrl_ch, buffer, pace);
            *slot = Some(AudioEngine {
                streamer,
                clamp: ClampUnit::new(interp),
                buffer,
                tracks: [NO_TRACK; MAX_TRACKS],
                phase: DEFAULT_TRIGGER_PHASE,
            });
            Ok(())
        })?;
        unsafe { pac::NVIC::unmask(pac::Interrupt::PWM_IRQ_WRAP) };
        Ok(EngineHandle { _private: () })
    }

    fn refill(&mut self) {
        let idle = self.streamer.idle_half();
        self.streamer.ack_refill();
        render_half(self.buffer.half_mut(idle), &mut self.tracks, &mut self.clamp);
    }
}

fn with<R>(f: impl FnOnce(&mut AudioEngine) -> R) -> Option<R> {
    critical_section::with(|cs| ENGINE.borrow_ref_mut(cs).as_mut().map(f))
}

fn with_track<R>(index: usize, f: impl FnOnce(&mut Track<'static>) -> R) -> Option<R> {
    with(|engine| engine.tracks.get_mut(index).and_then(Option::as_mut).map(f)).flatten()
}

/// Control surface over the installed engine.
///
/// Methods on a missing engine or an out-of-range track index do nothing;
/// queries answer with the resting value.  All of them are cheap enough to
/// call from the foreground loop at any time.
#[derive(Clone, Copy)]
pub struct EngineHandle {
    _private: (),
}

#[allow(dead_code)]
impl EngineHandle {
    /// Claims a free track slot for `buffer` and returns its index.  The
    /// track starts stopped; configure it, then [`play`](Self::play).
    pub fn add_track(
        &self,
        buffer: &'static SampleBuffer<'static>,
    ) -> Result<usize, EngineError> {
        with(|engine| {
            let Some(index) = engine.tracks.iter().position(Option::is_none) else {
                return Err(EngineError::TrackTableFull);
            };
            engine.tracks[index] = Some(Track::new(buffer));
            Ok(index)
        })
        .unwrap_or(Err(EngineError::TrackTableFull))
    }

    /// Frees a track slot.  Its buffer is untouched and may be re-added.
    pub fn remove_track(&self, index: usize) {
        with(|engine| {
            if let Some(slot) = engine.tracks.get_mut(index) {
                *slot = None;
            }
        });
    }

    pub fn play(&self, index: usize) {
        with_track(index, Track::play);
    }

    pub fn pause(&self, index: usize) {
        with_track(index, Track::pause);
    }

    pub fn resume(&self, index: usize) {
        with_track(index, Track::resume);
    }

    pub fn stop(&self, index: usize) {
        with_track(index, Track::stop);
    }

    pub fn stop_all(&self) {
        with(|engine| {
            for track in engine.tracks.iter_mut().flatten() {
                track.stop();
            }
        });
    }

    pub fn is_playing(&self, index: usize) -> bool {
        with_track(index, |track| track.is_playing()).unwrap_or(false)
    }

    pub fn set_speed(&self, index: usize, speed: f32) {
        with_track(index, |track| track.set_speed(speed));
    }

    pub fn set_level(&self, index: usize, level: f32) {
        with_track(index, |track| track.set_level(level));
    }

    pub fn set_loops(&self, index: usize, loops: i32) {
        with_track(index, |track| track.set_loops(loops));
    }

    pub fn set_playback_range(&self, index: usize, start: usize, len: usize) {
        with_track(index, |track| track.set_playback_range(start, len));
    }

    /// Starts the output pipeline with the configured trigger phase.
    pub fn start(&self) {
        with(|engine| {
            let phase = engine.phase;
            engine.streamer.start(phase);
        });
    }

    /// Stops the output pipeline.
    pub fn stop_output(&self) {
        with(|engine| engine.streamer.stop());
    }

    pub fn output_busy(&self) -> bool {
        with(|engine| engine.streamer.is_busy()).unwrap_or(false)
    }

    /// Refill interrupts serviced since boot.
    pub fn isr_count(&self) -> u32 {
        REFILLS.load(Ordering::Relaxed)
    }

    pub fn trigger_phase(&self) -> u16 {
        with(|engine| engine.phase).unwrap_or(DEFAULT_TRIGGER_PHASE)
    }

    /// Sets the trigger head start in carrier ticks, applied at the next
    /// [`start`](Self::start).
    pub fn set_trigger_phase(&self, phase: u16) {
        with(|engine| engine.phase = phase % PWM_RANGE);
    }

    /// Offsets the trigger phase by `delta` ticks, wrapping within the
    /// carrier period, and returns the new value.
    pub fn nudge_trigger_phase(&self, delta: i16) -> u16 {
        with(|engine| {
            let range = i32::from(PWM_RANGE);
            let next = (i32::from(engine.phase) + i32::from(delta)).rem_euclid(range);
            engine.phase = next as u16;
            engine.phase
        })
        .unwrap_or(DEFAULT_TRIGGER_PHASE)
    }
}

#[interrupt]
fn PWM_IRQ_WRAP() {
    // No atomic read-modify-write on the M0+.
    let count = REFILLS.load(Ordering::Relaxed);
    REFILLS.store(count.wrapping_add(1), Ordering::Relaxed);
    critical_section::with(|cs| {
        if let Some(engine) = ENGINE.borrow_ref_mut(cs).as_mut() {
            engine.refill();
        }
    });
}
