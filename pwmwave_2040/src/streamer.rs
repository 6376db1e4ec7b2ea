//! The autonomous sample mover: two PWM slices and two DMA channels.
//!
//! The data channel reads the whole transfer buffer one 32-bit word (one
//! stereo frame) at a time, paced by DMA timer 0, and writes every word to
//! the audio slice's dual compare register.  When the buffer is exhausted
//! it chains to the control channel, whose single-word program writes the
//! buffer's base address back into the data channel's read pointer through
//! a trigger alias, restarting it.  Samples therefore flow forever with no
//! CPU involvement.
//!
//! The trigger slice wraps once per transfer window and raises the only
//! interrupt in the system.  Its counter gets a head start over the audio
//! slice so the refill lands just after the DMA crosses a half boundary,
//! leaving the writer nearly a full window ahead of the reader.

use core::sync::atomic::{compiler_fence, AtomicU32, Ordering};

use pwmwave::timing::{PaceConfig, TriggerTiming};
use pwmwave::transfer::{BufferHalf, TransferBuffer};
use pwmwave::PWM_TOP;
use rp_pico::hal::dma::{Channel, SingleChannel};
use rp_pico::hal::pac;
use rp_pico::hal::pwm::{FreeRunning, Slice};

use crate::config::{
    AudioSliceId, ControlChannelId, DataChannelId, TriggerSliceId, AUDIO_SLICE_NUM,
    TRIGGER_SLICE_NUM,
};

/// Source word for the control channel's rewind write.  Static because the
/// DMA engine keeps reading it for as long as audio runs.
static REWIND_ADDR: AtomicU32 = AtomicU32::new(0);

/// Owns the PWM slices and DMA channel pair for one stereo output.
pub struct PwmStreamer {
    audio: Slice<AudioSliceId, FreeRunning>,
    trigger: Slice<TriggerSliceId, FreeRunning>,
    data_ch: Channel<DataChannelId>,
    ctrl_ch: Channel<ControlChannelId>,
    buffer_mid: u32,
    running: bool,
}

impl PwmStreamer {
    /// Programs both slices, the pacing timer and the channel pair against
    /// `buffer`.  Nothing moves until [`start`](Self::start).
    pub fn new(
        mut audio: Slice<AudioSliceId, FreeRunning>,
        mut trigger: Slice<TriggerSliceId, FreeRunning>,
        data_ch: Channel<DataChannelId>,
        ctrl_ch: Channel<ControlChannelId>,
        buffer: &TransferBuffer,
        pace: PaceConfig,
    ) -> Self {
        let base = buffer.as_ptr() as u32;
        REWIND_ADDR.store(base, Ordering::Relaxed);

        audio.default_config();
        audio.set_top(PWM_TOP);
        audio.set_div_int(1);
        audio.set_div_frac(0);
        audio.set_counter(0);

        let timing = TriggerTiming::for_pace(pace);
        trigger.default_config();
        trigger.set_top(timing.top);
        trigger.set_div_int(timing.div_int);
        trigger.set_div_frac(timing.div_frac);
        trigger.enable_interrupt();

        let dma = unsafe { &*pac::DMA::ptr() };
        let pwm = unsafe { &*pac::PWM::ptr() };

        dma.timer0
            .write(|w| unsafe { w.x().bits(pace.num).y().bits(pace.den) });

        pwm.ch[AUDIO_SLICE_NUM]
            .cc
            .write(|w| unsafe { w.a().bits(0).b().bits(0) });

        let cc_addr = pwm.ch[AUDIO_SLICE_NUM].cc.as_ptr() as u32;
        let words = (core::mem::size_of::<TransferBuffer>() / 4) as u32;
        let data = data_ch.ch();
        data.ch_read_addr.write(|w| unsafe { w.bits(base) });
        data.ch_write_addr.write(|w| unsafe { w.bits(cc_addr) });
        data.ch_trans_count.write(|w| unsafe { w.bits(words) });
        data.ch_al1_ctrl.write(|w| unsafe {
            w.incr_read().set_bit();
            w.incr_write().clear_bit();
            w.data_size().size_word();
            w.treq_sel().timer0();
            w.chain_to().bits(ctrl_ch.id());
            w.en().set_bit();
            w
        });

        let ctrl = ctrl_ch.ch();
        ctrl.ch_read_addr
            .write(|w| unsafe { w.bits(REWIND_ADDR.as_ptr() as u32) });
        ctrl.ch_write_addr
            .write(|w| unsafe { w.bits(data.ch_al3_read_addr_trig.as_ptr() as u32) });
        ctrl.ch_trans_count.write(|w| unsafe { w.bits(1) });
        // Chaining to itself disables chaining; TREQ is unpaced.
        ctrl.ch_al1_ctrl.write(|w| unsafe {
            w.incr_read().clear_bit();
            w.incr_write().clear_bit();
            w.data_size().size_word();
            w.treq_sel().permanent();
            w.chain_to().bits(ctrl_ch.id());
            w.en().set_bit();
            w
        });

        PwmStreamer {
            audio,
            trigger,
            data_ch,
            ctrl_ch,
            buffer_mid: buffer.midpoint_ptr() as u32,
            running: false,
        }
    }

    /// Starts streaming from the top of the buffer.  If already running the
    /// pipeline is stopped and re-armed from zero.
    ///
    /// The audio counter is zeroed before the slice is enabled, otherwise
    /// the first carrier cycle's duty is undefined.  Both slices are then
    /// enabled in a single register write so `phase` is the exact counter
    /// lead of the trigger over the audio carrier.
    pub fn start(&mut self, phase: u16) {
        if self.running {
            self.stop();
        }
        self.audio.set_counter(0);
        self.trigger.set_counter(phase.min(PWM_TOP));
        self.trigger.clear_interrupt();

        self.data_ch.ch().ch_al1_ctrl.modify(|_, w| w.en().set_bit());
        self.ctrl_ch.ch().ch_al1_ctrl.modify(|_, w| w.en().set_bit());
        self.data_ch
            .ch()
            .ch_read_addr
            .write(|w| unsafe { w.bits(REWIND_ADDR.load(Ordering::Relaxed)) });

        compiler_fence(Ordering::SeqCst);
        let dma = unsafe { &*pac::DMA::ptr() };
        dma.multi_chan_trigger
            .write(|w| unsafe { w.bits(1 << self.data_ch.id()) });

        let pwm = unsafe { &*pac::PWM::ptr() };
        let slices = (1 << AUDIO_SLICE_NUM) | (1 << TRIGGER_SLICE_NUM);
        pwm.en.modify(|r, w| unsafe { w.bits(r.bits() | slices) });
        self.running = true;
    }

    /// Aborts both channels and disables both slices.  Safe to call when
    /// already stopped.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        let dma = unsafe { &*pac::DMA::ptr() };
        let pwm = unsafe { &*pac::PWM::ptr() };

        // Channel enables drop first so an in-flight chain cannot
        // retrigger while the abort drains.
        self.data_ch.ch().ch_al1_ctrl.modify(|_, w| w.en().clear_bit());
        self.ctrl_ch.ch().ch_al1_ctrl.modify(|_, w| w.en().clear_bit());
        let channels = (1u32 << self.data_ch.id()) | (1 << self.ctrl_ch.id());
        dma.chan_abort.write(|w| unsafe { w.bits(channels) });
        while self.transfers_in_flight() {}

        let slices = (1 << AUDIO_SLICE_NUM) | (1 << TRIGGER_SLICE_NUM);
        pwm.en.modify(|r, w| unsafe { w.bits(r.bits() & !slices) });
        self.trigger.clear_interrupt();
        self.running = false;
    }

    fn transfers_in_flight(&self) -> bool {
        let data_busy = self.data_ch.ch().ch_ctrl_trig.read().busy().bit_is_set();
        let ctrl_busy = self.ctrl_ch.ch().ch_ctrl_trig.read().busy().bit_is_set();
        data_busy || ctrl_busy
    }

    /// Whether a transfer is in flight.
    ///
    /// Sampled twice and ORed: once per buffer pass the rewind chain spends
    /// a handful of cycles during which both channels read idle, so a
    /// single sample can falsely report not-busy.  The double sample
    /// shrinks that window to near zero but does not close it.
    pub fn is_busy(&self) -> bool {
        self.transfers_in_flight() || self.transfers_in_flight()
    }

    /// The half of the transfer buffer the DMA is currently reading.
    pub fn busy_half(&self) -> BufferHalf {
        let addr = self.data_ch.ch().ch_read_addr.read().bits();
        if addr < self.buffer_mid {
            BufferHalf::First
        } else {
            BufferHalf::Second
        }
    }

    /// The half that is safe to rewrite right now.
    pub fn idle_half(&self) -> BufferHalf {
        self.busy_half().other()
    }

    /// Acknowledges the trigger slice's wrap interrupt.
    pub fn ack_refill(&mut self) {
        self.trigger.clear_interrupt();
    }
}
