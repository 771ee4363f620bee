//! Temperature and motor side of the control loop

use core::fmt::Write;

use defmt::*;
use shader_core::{FourWireStepper, Motion, ShaderController, TemperatureSource, Transition};
use stm32f0xx_hal::{
    gpio::{Output, Pin, PushPull},
    pac::TIM3,
    timers::Timer,
};

use crate::{
    delay::TimerDelay,
    thermometer::{self, Ds18b20Source},
};

pub type Stepper = FourWireStepper<Pin<Output<PushPull>>, TimerDelay<Timer<TIM3>>>;
pub type Controller = ShaderController<Stepper, Pin<Output<PushPull>>>;

/// Feed a due sample, if any, to the controller
#[cfg_attr(feature = "sizing", inline(never))]
pub fn poll<W: Write>(thermometer: &mut Ds18b20Source, controller: &mut Controller, tx: &mut W) {
    let temp = match thermometer.sample_if_due() {
        Ok(Some(temp)) => temp,
        Ok(None) => return,
        Err(e) => {
            error!("Sensor error: {}", e.as_str());
            return;
        }
    };

    match controller.on_temperature_sample(temp, tx) {
        Ok(Some(Transition::Opened)) => {
            info!("Temperature {=f32} reached threshold, opening shader", temp.to_num::<f32>());
        }
        Ok(Some(Transition::Closed)) => {
            info!("Temperature {=f32} below threshold, closing shader", temp.to_num::<f32>());
        }
        Ok(None) => debug!(
            "Temperature: {=f32}, Shader: {}",
            temp.to_num::<f32>(),
            controller.position()
        ),
        Err(e) => match e {},
    }
}

/// Take the next slice of an in-flight rotation or pause
#[cfg_attr(feature = "sizing", inline(never))]
pub fn drive<W: Write>(controller: &mut Controller, tx: &mut W) {
    match controller.poll_motor(thermometer::now(), tx) {
        Ok(Motion::Idle) => debug!("Motor idle, shader {}", controller.position()),
        Ok(Motion::Rotating { remaining }) => trace!("Rotating, {=i32} steps left", remaining),
        Ok(Motion::Dwelling) => {}
        Err(e) => match e {},
    }
}
