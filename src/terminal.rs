//! Serial terminal
//!
//! Commands:
//! - `shader open` / `shader close` - Move the shader if it is not already there
//! - `motor inc <steps>` - Rotate by a raw, signed step count
//! - `motor rot <degrees>` - Rotate by an angle
//! - `motor test` - Rotate 1000 steps forward and back
//!
//! Lines are only taken while the motor is idle. Unknown lines are dropped
//! without a reply. The only output is the `C:` and
//! `R:` diagnostic lines written by the controller.

use core::fmt::Write;

use defmt::*;
use embedded_hal::serial::Read;
use rtic::Mutex;
use shader_core::LineBuffer;
use stm32f0xx_hal::{
    pac::USART2,
    serial::{self, Rx},
};

use crate::{config::BUFFER_SIZE, temp_controller::Controller};

/// Move every byte waiting in the USART into the line buffer
#[cfg_attr(feature = "sizing", inline(never))]
pub fn receive(rx: &mut Rx<USART2>, buffer: &mut LineBuffer<BUFFER_SIZE>) {
    loop {
        match rx.read() {
            Ok(b) => {
                if buffer.push(b).is_err() {
                    warn!("Line longer than {} bytes, dropped", BUFFER_SIZE);
                }
            }
            Err(nb::Error::WouldBlock) => break,
            Err(nb::Error::Other(e)) => {
                warn!("USART error: {}", usart_error_str(e));
                break;
            }
        }
    }
}

fn usart_error_str(e: serial::Error) -> &'static str {
    match e {
        serial::Error::Framing => "Framing",
        serial::Error::Noise => "Noise",
        serial::Error::Overrun => "Overrun",
        serial::Error::Parity => "Parity",
        #[allow(unreachable_patterns)]
        _ => "Unknown",
    }
}

/// Run complete lines through the controller until one starts the motor.
/// The rest stay buffered until it stops.
#[cfg_attr(feature = "sizing", inline(never))]
pub fn dispatch<W: Write>(
    buffer: &mut impl Mutex<T = LineBuffer<BUFFER_SIZE>>,
    controller: &mut Controller,
    tx: &mut W,
) {
    while controller.is_idle() {
        let Some(line) = buffer.lock(LineBuffer::take_line) else {
            break;
        };
        match controller.on_command(&line, tx) {
            Ok(Some(command)) => info!("Command: {}", command),
            Ok(None) => trace!("Ignored line: {=[u8]:a}", line.as_slice()),
            Err(e) => match e {},
        }
    }
}
