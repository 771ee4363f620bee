//! DS18B20 bus transactions
//!
//! Register decoding lives in [`shader_core::ds18b20`]; this module only moves
//! bytes over the 1-Wire bus.

use embedded_hal::blocking::delay::DelayUs;
use shader_core::{
    ds18b20::{
        check_crc8, decode_scratchpad, scratchpad_resolution, Resolution, FAMILY_CODE,
        SCRATCHPAD_LEN,
    },
    Temperature,
};

use crate::onewire::{Address, Error, OneWire, Result};

pub const CONVERT_T: u8 = 0x44;
pub const READ_SCRATCHPAD: u8 = 0xBE;
pub const WRITE_SCRATCHPAD: u8 = 0x4E;

#[derive(Debug, defmt::Format, Copy, Clone, Eq, PartialEq)]
pub struct Ds18b20 {
    addr: Address,
}

impl Ds18b20 {
    pub fn new(addr: Address) -> Result<Self> {
        if addr.family_code() == FAMILY_CODE {
            Ok(Self { addr })
        } else {
            Err(Error::FamilyCodeMismatch)
        }
    }

    pub const fn address(&self) -> Address {
        self.addr
    }

    fn read_scratchpad(
        &self,
        wire: &mut OneWire,
        delay: &mut impl DelayUs<u32>,
    ) -> Result<[u8; SCRATCHPAD_LEN]> {
        wire.send_command(Some(&self.addr), READ_SCRATCHPAD, delay)?;

        let mut buf = [0u8; SCRATCHPAD_LEN];
        wire.read_bytes(&mut buf, delay)?;
        Ok(buf)
    }

    /// Writes the TH, TL and config registers
    fn write_scratchpad(
        &mut self,
        wire: &mut OneWire,
        delay: &mut impl DelayUs<u32>,
        data: [u8; 3],
    ) -> Result<()> {
        wire.send_command(Some(&self.addr), WRITE_SCRATCHPAD, delay)?;
        wire.write_bytes(&data, delay)?;
        wire.reset(delay)
    }

    /// Retrieves the resolution of the sensor
    pub fn resolution(
        &self,
        wire: &mut OneWire,
        delay: &mut impl DelayUs<u32>,
    ) -> Result<Resolution> {
        let buf = self.read_scratchpad(wire, delay)?;
        check_crc8(&buf)?;
        Ok(scratchpad_resolution(&buf)?)
    }

    /// Sets the resolution of the sensor, keeping the alarm registers
    pub fn set_resolution(
        &mut self,
        wire: &mut OneWire,
        delay: &mut impl DelayUs<u32>,
        res: Resolution,
    ) -> Result<()> {
        let buf = self.read_scratchpad(wire, delay)?;
        check_crc8(&buf)?;
        self.write_scratchpad(wire, delay, [buf[2], buf[3], res.to_config_register()])
    }

    /// Starts a temperature conversion
    ///
    /// The result is ready after [`Resolution::conversion_time`]; read it with
    /// [`Ds18b20::read_data`].
    pub fn start_measurement(
        &self,
        wire: &mut OneWire,
        delay: &mut impl DelayUs<u32>,
    ) -> Result<()> {
        wire.send_command(Some(&self.addr), CONVERT_T, delay)
    }

    /// Reads the result of the last conversion
    pub fn read_data(
        &self,
        wire: &mut OneWire,
        delay: &mut impl DelayUs<u32>,
    ) -> Result<Temperature> {
        let buf = self.read_scratchpad(wire, delay)?;
        Ok(decode_scratchpad(&buf)?)
    }
}
