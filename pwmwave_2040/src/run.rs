//! Board bring-up and the demo program.
//!
//! After clocks, pins and DMA are up, the demo queues an endless sine
//! lead with a few loops of noise underneath it and goes to sleep; the
//! refill interrupt does all further work.  The `calibrate` feature
//! swaps the sleep loop for the serial phase tuner.

use pwmwave::timing::PaceConfig;
use pwmwave::{SampleBuffer, TransferBuffer};
use rp_pico::hal::clocks::init_clocks_and_plls;
use rp_pico::hal::dma::DMAExt;
use rp_pico::hal::pac;
use rp_pico::hal::pwm::Slices;
use rp_pico::hal::sio::Sio;
use rp_pico::hal::watchdog::Watchdog;

#[cfg(feature = "calibrate")]
use rp_pico::hal::clocks::Clock;
#[cfg(feature = "calibrate")]
use rp_pico::hal::fugit::RateExtU32;
#[cfg(feature = "calibrate")]
use rp_pico::hal::uart::{DataBits, StopBits, UartConfig, UartPeripheral};

use crate::engine::AudioEngine;

pub fn run(
    sine: &'static SampleBuffer<'static>,
    noise: &'static SampleBuffer<'static>,
    transfer: &'static mut TransferBuffer,
) -> ! {
    let mut pac = pac::Peripherals::take().unwrap();
    let mut watchdog = Watchdog::new(pac.WATCHDOG);
    let clocks = init_clocks_and_plls(
        rp_pico::XOSC_CRYSTAL_FREQ,
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut watchdog,
    )
    .ok()
    .unwrap();

    let sio = Sio::new(pac.SIO);
    let pins = rp_pico::Pins::new(
        pac.IO_BANK0,
        pac.PADS_BANK0,
        sio.gpio_bank0,
        &mut pac.RESETS,
    );

    let slices = Slices::new(pac.PWM, &mut pac.RESETS);
    let mut audio = slices.pwm1;
    audio.channel_a.output_to(pins.gpio2);
    audio.channel_b.output_to(pins.gpio3);

    let dma = pac.DMA.split(&mut pac.RESETS);

    let handle = AudioEngine::init(
        audio,
        slices.pwm7,
        dma.ch0,
        dma.ch1,
        sio.interp1,
        transfer,
        PaceConfig::CARRIER_THIRD,
    )
    .unwrap();

    if let Ok(lead) = handle.add_track(sine) {
        handle.set_level(lead, 0.8);
        handle.play(lead);
    }
    let texture = handle.add_track(noise).ok();
    if let Some(track) = texture {
        handle.set_speed(track, 0.5);
        handle.set_level(track, 0.25);
        handle.set_loops(track, 4);
        handle.play(track);
    }
    handle.start();

    #[cfg(feature = "calibrate")]
    {
        let _ = texture;
        let uart_pins = (pins.gpio0.into_function(), pins.gpio1.into_function());
        let mut uart = UartPeripheral::new(pac.UART0, uart_pins, &mut pac.RESETS)
            .enable(
                UartConfig::new(115_200.Hz(), DataBits::Eight, None, StopBits::One),
                clocks.peripheral_clock.freq(),
            )
            .unwrap();
        crate::calib::run(handle, &mut uart)
    }

    #[cfg(not(feature = "calibrate"))]
    {
        let _ = clocks;
        let mut texture = texture;
        loop {
            cortex_m::asm::wfi();
            // Reclaim the noise track's slot once its loops run out.
            if let Some(track) = texture {
                if !handle.is_playing(track) {
                    handle.remove_track(track);
                    texture = None;
                }
            }
        }
    }
}
