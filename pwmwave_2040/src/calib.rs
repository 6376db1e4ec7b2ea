//! Interactive trigger-phase tuner over UART0.
//!
//! The right phase head start puts the refill interrupt just behind the
//! DMA's half-buffer crossing; the wrong one lets the renderer write into
//! the half being read, which is audible as a buzz or tearing at the
//! refill rate.  This loop turns serial keystrokes into phase nudges so
//! the margin can be found by ear on real hardware: `+`/`-` step by one
//! counter tick, `]`/`[` by ten, and `p` reports the current phase and
//! the refill count.  Every nudge restarts the output pipeline so the new
//! head start takes effect immediately.
//!
//! Debug-build utility behind the `calibrate` feature.  The read loop
//! polls and never blocks, so audio keeps running underneath.

use core::fmt::Write;

use rp_pico::hal::uart::{Enabled, UartDevice, UartPeripheral, ValidUartPinout};

use crate::engine::EngineHandle;

pub fn run<D, P>(handle: EngineHandle, uart: &mut UartPeripheral<Enabled, D, P>) -> !
where
    D: UartDevice,
    P: ValidUartPinout<D>,
{
    let _ = write!(
        uart,
        "trigger phase tuner: +/- step 1, ]/[ step 10, p reports\r\n"
    );
    loop {
        if !uart.uart_is_readable() {
            continue;
        }
        let mut byte = [0u8; 1];
        let Ok(n) = uart.read_raw(&mut byte) else {
            continue;
        };
        if n == 0 {
            continue;
        }
        let delta = match byte[0] {
            b'+' => 1,
            b'-' => -1,
            b']' => 10,
            b'[' => -10,
            b'p' => {
                let _ = write!(
                    uart,
                    "phase {} refills {}\r\n",
                    handle.trigger_phase(),
                    handle.isr_count()
                );
                continue;
            }
            _ => continue,
        };
        let phase = handle.nudge_trigger_phase(delta);
        handle.stop_output();
        handle.start();
        let _ = write!(uart, "phase {phase}\r\n");
    }
}
