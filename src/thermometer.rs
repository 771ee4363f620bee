//! DS18B20 as the controller's temperature source

use rtic_monotonics::{stm32::Tim2 as Mono, Monotonic};
use shader_core::{
    config::SensorConfig,
    ds18b20::FAMILY_CODE,
    temperature::{Instant, PacerAction},
    SamplePacer, Temperature, TemperatureSource,
};
use stm32f0xx_hal::delay::Delay;

use crate::{
    ds18b20::Ds18b20,
    onewire::{Address, Error, OneWire, Result},
};

/// Samples the first DS18B20 found on the bus.
///
/// Conversions run in the background: one poll starts a conversion, a later
/// poll past the conversion time collects it.
pub struct Ds18b20Source {
    wire: OneWire,
    delay: Delay,
    config: SensorConfig,
    pacer: SamplePacer,
    sensor: Option<Ds18b20>,
}

impl Ds18b20Source {
    pub fn new(wire: OneWire, delay: Delay, config: SensorConfig) -> Self {
        Self {
            wire,
            delay,
            config,
            pacer: SamplePacer::new(config.sample_interval, config.resolution.conversion_time()),
            sensor: None,
        }
    }

    pub fn devices(&mut self) -> impl Iterator<Item = Result<Address>> + '_ {
        self.wire.devices(&mut self.delay)
    }

    /// The bound sensor, searching the bus if there is none yet
    fn sensor(&mut self) -> Result<Ds18b20> {
        if let Some(sensor) = self.sensor {
            return Ok(sensor);
        }

        let addr = self
            .devices()
            .filter_map(|device| device.ok())
            .find(|addr| addr.family_code() == FAMILY_CODE)
            .ok_or(Error::NoDevice)?;

        let mut sensor = Ds18b20::new(addr)?;
        sensor.set_resolution(&mut self.wire, &mut self.delay, self.config.resolution)?;
        let resolution = sensor.resolution(&mut self.wire, &mut self.delay)?;
        defmt::info!("Using DS18B20 {} at {}", sensor.address(), resolution);
        self.pacer.set_conversion_time(resolution.conversion_time());

        self.sensor = Some(sensor);
        Ok(sensor)
    }

    fn start_conversion(&mut self) -> Result<()> {
        let sensor = self.sensor()?;
        sensor.start_measurement(&mut self.wire, &mut self.delay)
    }

    fn read_conversion(&mut self) -> Result<Temperature> {
        let sensor = self.sensor.ok_or(Error::NoDevice)?;
        sensor.read_data(&mut self.wire, &mut self.delay)
    }
}

/// Milliseconds since boot
pub fn now() -> Instant {
    Instant::from_ticks(Mono::now().duration_since_epoch().to_millis())
}

impl TemperatureSource for Ds18b20Source {
    type Error = Error;

    #[cfg_attr(feature = "sizing", inline(never))]
    fn sample_if_due(&mut self) -> Result<Option<Temperature>> {
        let now = now();

        let result = match self.pacer.poll(now) {
            PacerAction::Wait => return Ok(None),
            PacerAction::StartConversion => self.start_conversion().map(|()| None),
            PacerAction::ReadResult => self.read_conversion().map(Some),
        };

        if result.is_err() {
            // Search the bus again on the next sample, the sensor may have been swapped
            self.sensor = None;
            self.pacer.abort(now);
        }
        result
    }
}
