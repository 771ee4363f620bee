//! Board wiring (NUCLEO-F042K6)
//!
//! | Function | Pin |
//! |---|---|
//! | USART2 TX / RX | PA2 / PA15 |
//! | DS18B20 data (4.7k pull-up) | PA12 |
//! | ULN2003 IN1, IN3, IN2, IN4 | PA0, PA1, PA3, PA4 |
//! | Status LED | PB3 |
//!
//! Controller constants live in [`shader_core::config`].

use shader_core::{
    config::{MOTOR_SPEED_RPM, STEPS_PER_POLL, STEPS_PER_REVOLUTION},
    stepper::step_delay_us,
};
use static_assertions::const_assert;

pub const BAUD_RATE: u32 = 9_600;

/// Serial receive buffer, longest accepted line including its newline
pub const BUFFER_SIZE: usize = 32;

/// System clock in Hz
pub const SYSCLK_HZ: u32 = 24_000_000;

/// Stepper delay timer tick before the first move
pub const STEPPER_TIMER_HZ: u32 = 1_000;

/// Independent watchdog rate, fed once per control loop pass
pub const WATCHDOG_HZ: u32 = 1;

const_assert!(BUFFER_SIZE >= "motor rot -360.0000\r".len());
// One motor slice must leave half the watchdog period for the rest of the loop
const_assert!(
    step_delay_us(STEPS_PER_REVOLUTION, MOTOR_SPEED_RPM) as u64 * STEPS_PER_POLL as u64
        <= 1_000_000 / WATCHDOG_HZ as u64 / 2
);
