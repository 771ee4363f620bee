//! Board-agnostic control logic for the solar cooker shader
//!
//! Everything here is independent of the microcontroller:
//!
//! - The shader controller state machine (threshold + manual commands)
//! - The serial command grammar and line buffering
//! - A four-wire stepper driver over `embedded-hal` pins
//! - DS18B20 scratchpad decoding and sample pacing
//! - Compile-time configuration

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod command;
pub mod config;
pub mod controller;
pub mod ds18b20;
pub mod line;
pub mod report;
pub mod stepper;
pub mod temperature;

pub use command::Command;
pub use config::{MotorConfig, SensorConfig, ShaderConfig};
pub use controller::{Motion, ShaderController, ShaderPosition, Transition};
pub use line::LineBuffer;
pub use stepper::{degrees_to_steps, FourWireStepper, MotorDriver};
pub use temperature::{SamplePacer, Temperature, TemperatureSource};
