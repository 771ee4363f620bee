//! Stepper motor driver trait and a four-wire unipolar implementation
//!
//! The shader motor is a 28BYJ-48 behind a ULN2003 darlington array, so each
//! of the four coil ends is a plain GPIO line.

use embedded_hal::{blocking::delay::DelayUs, digital::v2::OutputPin};
use num_traits::AsPrimitive;

use crate::config::MotorConfig;

/// Trait for motors that move in discrete steps
pub trait MotorDriver {
    type Error;

    /// Rotate by `steps`, blocking until the move is complete.
    ///
    /// Positive counts turn one way, negative counts the other.
    fn step(&mut self, steps: i32) -> Result<(), Self::Error>;
}

/// Convert an angle to a step count.
///
/// `degrees * steps_per_revolution / 360`, truncated toward zero and
/// saturated to the `i32` range. Non-finite angles map to 0.
pub fn degrees_to_steps(degrees: f32, steps_per_revolution: u16) -> i32 {
    (degrees * f32::from(steps_per_revolution) / 360.0).as_()
}

/// Time between steps for a given speed.
///
/// Zero speeds or step counts are treated as 1.
pub const fn step_delay_us(steps_per_revolution: u16, rpm: u16) -> u32 {
    let steps_per_revolution = if steps_per_revolution == 0 {
        1
    } else {
        steps_per_revolution as u32
    };
    let rpm = if rpm == 0 { 1 } else { rpm as u32 };
    60_000_000 / steps_per_revolution / rpm
}

/// Coil pattern for each of the four full-step phases.
const PHASES: [[bool; 4]; 4] = [
    [true, false, true, false],
    [false, true, true, false],
    [false, true, false, true],
    [true, false, false, true],
];

/// Four-wire stepper driven with the full-step sequence.
pub struct FourWireStepper<P, D> {
    pins: [P; 4],
    delay: D,
    step_delay_us: u32,
    phase: u8,
}

impl<P, D> FourWireStepper<P, D>
where
    P: OutputPin,
    D: DelayUs<u32>,
{
    /// `pins` are the coil lines in sequence order (IN1, IN3, IN2, IN4 on a
    /// ULN2003 board).
    pub fn new(pins: [P; 4], delay: D, config: MotorConfig) -> Self {
        Self {
            pins,
            delay,
            step_delay_us: step_delay_us(config.steps_per_revolution, config.speed_rpm),
            phase: 0,
        }
    }

    /// Index into the step sequence, 0..4
    pub fn phase(&self) -> u8 {
        self.phase
    }

    pub fn step_delay(&self) -> u32 {
        self.step_delay_us
    }

    pub fn pins(&self) -> &[P; 4] {
        &self.pins
    }

    /// De-energise all coils. The rotor is then free to turn.
    pub fn release(&mut self) -> Result<(), P::Error> {
        for pin in &mut self.pins {
            pin.set_low()?;
        }
        Ok(())
    }

    fn energise(&mut self) -> Result<(), P::Error> {
        let pattern = PHASES[usize::from(self.phase)];
        for (pin, on) in self.pins.iter_mut().zip(pattern) {
            if on {
                pin.set_high()?;
            } else {
                pin.set_low()?;
            }
        }
        Ok(())
    }
}

impl<P, D> MotorDriver for FourWireStepper<P, D>
where
    P: OutputPin,
    D: DelayUs<u32>,
{
    type Error = P::Error;

    fn step(&mut self, steps: i32) -> Result<(), Self::Error> {
        let forward = steps > 0;
        for _ in 0..steps.unsigned_abs() {
            self.phase = if forward {
                (self.phase + 1) % 4
            } else {
                (self.phase + 3) % 4
            };
            self.energise()?;
            self.delay.delay_us(self.step_delay_us);
        }
        Ok(())
    }
}
