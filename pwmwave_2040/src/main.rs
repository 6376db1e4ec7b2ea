//! RP2040 PWM audio output firmware.
//!
//! All sample storage is statically allocated here and handed to the rest
//! of the firmware as `'static` borrows; nothing allocates.

#![no_std]
#![no_main]

use core::mem::MaybeUninit;
use core::ptr::addr_of_mut;

use panic_halt as _;
use pwmwave::{Sample, SampleBuffer, TransferBuffer};
use rp_pico::entry;

#[cfg(feature = "calibrate")]
mod calib;
mod clamp;
mod config;
mod engine;
mod run;
mod streamer;

const SINE_FRAMES: usize = 1024;
const NOISE_FRAMES: usize = 2048;

static mut SINE_SAMPLES: [Sample; SINE_FRAMES] = [0; SINE_FRAMES];
static mut NOISE_SAMPLES: [Sample; NOISE_FRAMES] = [0; NOISE_FRAMES];
static mut SINE_BUFFER: MaybeUninit<SampleBuffer<'static>> = MaybeUninit::uninit();
static mut NOISE_BUFFER: MaybeUninit<SampleBuffer<'static>> = MaybeUninit::uninit();
static mut TRANSFER: TransferBuffer = TransferBuffer::new();

#[entry]
fn start() -> ! {
    let sine = unsafe {
        (*addr_of_mut!(SINE_BUFFER)).write(SampleBuffer::new(&mut *addr_of_mut!(SINE_SAMPLES), 1))
    };
    sine.fill_sine(8, false);
    let noise = unsafe {
        (*addr_of_mut!(NOISE_BUFFER)).write(SampleBuffer::new(&mut *addr_of_mut!(NOISE_SAMPLES), 1))
    };
    noise.fill_noise();
    let transfer = unsafe { &mut *addr_of_mut!(TRANSFER) };
    run::run(sine, noise, transfer)
}
