//! Bit-banged 1-Wire bus master

mod address;
pub mod commands;
mod error;

use embedded_hal::{
    blocking::delay::DelayUs,
    digital::v2::{InputPin, OutputPin},
};
use shader_core::ds18b20::check_crc8;
use stm32f0xx_hal::gpio::{OpenDrain, Output, Pin};

pub use self::{address::Address, error::*};

/// Standard-speed slot timings in microseconds
mod timing {
    pub const RESET_LOW: u32 = 480;
    pub const PRESENCE_SAMPLE: u32 = 70;
    pub const PRESENCE_END: u32 = 410;
    pub const WRITE_1_LOW: u32 = 10;
    pub const WRITE_1_RECOVER: u32 = 55;
    pub const WRITE_0_LOW: u32 = 65;
    pub const WRITE_0_RECOVER: u32 = 5;
    pub const READ_LOW: u32 = 1;
    pub const READ_SAMPLE: u32 = 1;
    pub const READ_RECOVER: u32 = 53;
}

pub struct OneWire {
    pin: Pin<Output<OpenDrain>>,
}

impl OneWire {
    pub fn new(pin: Pin<Output<OpenDrain>>) -> Self {
        Self { pin }
    }

    /// Reset the bus and check that at least one device answers with a presence pulse
    pub fn reset(&mut self, delay: &mut impl DelayUs<u32>) -> Result<()> {
        // Give the pull-up up to 250us to bring the bus high
        let mut retries = 125;
        while self.pin.is_low()? {
            if retries == 0 {
                return Err(Error::BusNotHigh);
            }
            retries -= 1;
            delay.delay_us(2);
        }

        self.pin.set_low()?;
        delay.delay_us(timing::RESET_LOW);
        self.pin.set_high()?;
        delay.delay_us(timing::PRESENCE_SAMPLE);

        let present = self.pin.is_low()?;
        delay.delay_us(timing::PRESENCE_END);

        if present {
            Ok(())
        } else {
            Err(Error::NoDevice)
        }
    }

    pub fn write_bit(&mut self, bit: bool, delay: &mut impl DelayUs<u32>) -> Result<()> {
        let (low, recover) = if bit {
            (timing::WRITE_1_LOW, timing::WRITE_1_RECOVER)
        } else {
            (timing::WRITE_0_LOW, timing::WRITE_0_RECOVER)
        };

        self.pin.set_low()?;
        delay.delay_us(low);
        self.pin.set_high()?;
        delay.delay_us(recover);
        Ok(())
    }

    pub fn read_bit(&mut self, delay: &mut impl DelayUs<u32>) -> Result<bool> {
        // The sample window is ~15us after the falling edge, so keep interrupts out
        let bit = cortex_m::interrupt::free(|_| -> Result<bool> {
            self.pin.set_low()?;
            delay.delay_us(timing::READ_LOW);
            self.pin.set_high()?;
            delay.delay_us(timing::READ_SAMPLE);
            Ok(self.pin.is_high()?)
        })?;

        delay.delay_us(timing::READ_RECOVER);
        Ok(bit)
    }

    /// Bytes go out LSB first
    pub fn write_byte(&mut self, byte: u8, delay: &mut impl DelayUs<u32>) -> Result<()> {
        for i in 0..8 {
            self.write_bit((byte >> i) & 1 == 1, delay)?;
        }
        Ok(())
    }

    pub fn write_bytes(&mut self, bytes: &[u8], delay: &mut impl DelayUs<u32>) -> Result<()> {
        for byte in bytes {
            self.write_byte(*byte, delay)?;
        }
        Ok(())
    }

    pub fn read_byte(&mut self, delay: &mut impl DelayUs<u32>) -> Result<u8> {
        let mut byte = 0;
        for i in 0..8 {
            if self.read_bit(delay)? {
                byte |= 1 << i;
            }
        }
        Ok(byte)
    }

    pub fn read_bytes(&mut self, bytes: &mut [u8], delay: &mut impl DelayUs<u32>) -> Result<()> {
        for byte in bytes {
            *byte = self.read_byte(delay)?;
        }
        Ok(())
    }

    /// Reset, address one device (or all of them with `None`), then send `command`
    pub fn send_command(
        &mut self,
        address: Option<&Address>,
        command: u8,
        delay: &mut impl DelayUs<u32>,
    ) -> Result<()> {
        self.reset(delay)?;
        match address {
            Some(address) => {
                self.write_byte(commands::MATCH_ROM, delay)?;
                self.write_bytes(address.rom(), delay)?;
            }
            None => self.write_byte(commands::SKIP_ROM, delay)?,
        }
        self.write_byte(command, delay)
    }

    /// Iterate over the ROM codes of every device on the bus
    pub fn devices<'a, 'd, D: DelayUs<u32>>(
        &'a mut self,
        delay: &'d mut D,
    ) -> DeviceSearch<'a, 'd, D> {
        DeviceSearch {
            wire: self,
            delay,
            rom: [0; 8],
            last_discrepancy: 0,
            done: false,
        }
    }
}

/// Maxim application note 187 ROM search
pub struct DeviceSearch<'a, 'd, D> {
    wire: &'a mut OneWire,
    delay: &'d mut D,
    rom: [u8; 8],
    /// Bit position (1-64) where the last pass took the 0 branch
    last_discrepancy: u8,
    done: bool,
}

impl<D: DelayUs<u32>> DeviceSearch<'_, '_, D> {
    fn next_address(&mut self) -> Result<Option<Address>> {
        if self.done {
            return Ok(None);
        }

        match self.wire.reset(self.delay) {
            Ok(()) => {}
            Err(Error::NoDevice) => {
                self.done = true;
                return Ok(None);
            }
            Err(e) => return Err(e),
        }
        self.wire.write_byte(commands::SEARCH_NORMAL, self.delay)?;

        let mut last_zero = 0u8;
        for bit_number in 1..=64u8 {
            let byte = usize::from((bit_number - 1) / 8);
            let mask = 1u8 << ((bit_number - 1) % 8);

            let id_bit = self.wire.read_bit(self.delay)?;
            let cmp_id_bit = self.wire.read_bit(self.delay)?;

            let direction = match (id_bit, cmp_id_bit) {
                // Nobody answered this slot
                (true, true) => {
                    self.done = true;
                    return Err(Error::UnexpectedResponse);
                }
                // Every remaining device agrees on this bit
                (bit, cmp) if bit != cmp => bit,
                // Conflict: replay the previous choice before the last
                // discrepancy, take 1 at it, 0 after it
                _ => {
                    let direction = if bit_number < self.last_discrepancy {
                        self.rom[byte] & mask != 0
                    } else {
                        bit_number == self.last_discrepancy
                    };
                    if !direction {
                        last_zero = bit_number;
                    }
                    direction
                }
            };

            if direction {
                self.rom[byte] |= mask;
            } else {
                self.rom[byte] &= !mask;
            }
            self.wire.write_bit(direction, self.delay)?;
        }

        self.last_discrepancy = last_zero;
        if last_zero == 0 {
            self.done = true;
        }

        check_crc8(&self.rom)?;
        Ok(Some(Address::from_rom(self.rom)))
    }
}

impl<D: DelayUs<u32>> Iterator for DeviceSearch<'_, '_, D> {
    type Item = Result<Address>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_address().transpose()
    }
}
