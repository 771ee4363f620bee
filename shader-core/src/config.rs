//! Compile-time configuration
//!
//! The values match the cooker prototype: a 28BYJ-48 geared stepper
//! (2038 full steps per output revolution) and a DS18B20 sensor.

use fugit::MillisDurationU64;
use static_assertions::const_assert;

use crate::{
    ds18b20::Resolution,
    stepper::degrees_to_steps,
    temperature::Temperature,
};

/// Temperature at which the shader opens.
pub const THRESHOLD: Temperature = Temperature::const_from_int(30);

/// Full steps per output shaft revolution
pub const STEPS_PER_REVOLUTION: u16 = 2038;

pub const MOTOR_SPEED_RPM: u16 = 10;

/// Rotation between the open and closed positions, found empirically.
pub const SHADER_TOGGLE_DEGREES: f32 = 92.0;

/// Most steps taken per control loop pass, about 190 ms at 10 RPM
pub const STEPS_PER_POLL: u16 = 64;

pub const SELF_TEST_STEPS: i32 = 1000;
pub const SELF_TEST_PAUSE_MS: u32 = 1000;

pub const SENSOR_RESOLUTION: Resolution = Resolution::Bits12;
pub const SAMPLE_INTERVAL_MS: u64 = 1000;

const_assert!(STEPS_PER_REVOLUTION > 0);
const_assert!(MOTOR_SPEED_RPM > 0);
// 28BYJ-48 skips steps above ~15 RPM
const_assert!(MOTOR_SPEED_RPM <= 15);
const_assert!(STEPS_PER_POLL > 0);
const_assert!(SELF_TEST_STEPS > 0);
// A sample must finish converting before the next one starts
const_assert!(SAMPLE_INTERVAL_MS >= 750);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotorConfig {
    pub steps_per_revolution: u16,
    pub speed_rpm: u16,
}

impl MotorConfig {
    pub const DEFAULT: Self = Self {
        steps_per_revolution: STEPS_PER_REVOLUTION,
        speed_rpm: MOTOR_SPEED_RPM,
    };
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Controller configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShaderConfig {
    pub threshold: Temperature,
    pub toggle_degrees: f32,
    pub motor: MotorConfig,
    pub steps_per_poll: u16,
    pub self_test_steps: i32,
    pub self_test_pause_ms: u32,
}

impl ShaderConfig {
    pub const DEFAULT: Self = Self {
        threshold: THRESHOLD,
        toggle_degrees: SHADER_TOGGLE_DEGREES,
        motor: MotorConfig::DEFAULT,
        steps_per_poll: STEPS_PER_POLL,
        self_test_steps: SELF_TEST_STEPS,
        self_test_pause_ms: SELF_TEST_PAUSE_MS,
    };

    /// Steps between the open and closed positions
    pub fn toggle_steps(&self) -> i32 {
        self.degrees_to_steps(self.toggle_degrees)
    }

    pub fn degrees_to_steps(&self, degrees: f32) -> i32 {
        degrees_to_steps(degrees, self.motor.steps_per_revolution)
    }
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Sensor sampling configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorConfig {
    pub resolution: Resolution,
    pub sample_interval: MillisDurationU64,
}

impl SensorConfig {
    pub const DEFAULT: Self = Self {
        resolution: SENSOR_RESOLUTION,
        sample_interval: MillisDurationU64::millis(SAMPLE_INTERVAL_MS),
    };
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
