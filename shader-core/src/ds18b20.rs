//! DS18B20 register encoding, independent of the 1-Wire bus.

use fugit::MillisDurationU64;

use crate::temperature::Temperature;

/// 1-Wire family code of the DS18B20.
pub const FAMILY_CODE: u8 = 0x28;

/// Size of the scratchpad, including its CRC byte.
pub const SCRATCHPAD_LEN: usize = 9;

const CONFIG_BYTE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScratchpadError {
    CrcMismatch,
    /// The config register holds a value no resolution maps to.
    UnexpectedResponse,
}

impl ScratchpadError {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScratchpadError::CrcMismatch => "CRC mismatch",
            ScratchpadError::UnexpectedResponse => "Unexpected response",
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Resolution {
    Bits9,
    Bits10,
    Bits11,
    Bits12,
}

impl Resolution {
    pub fn from_config_register(reg: u8) -> Option<Resolution> {
        match reg {
            0b0001_1111 => Some(Resolution::Bits9),
            0b0011_1111 => Some(Resolution::Bits10),
            0b0101_1111 => Some(Resolution::Bits11),
            0b0111_1111 => Some(Resolution::Bits12),
            _ => None,
        }
    }

    pub const fn to_config_register(self) -> u8 {
        match self {
            Resolution::Bits9 => 0b0001_1111,
            Resolution::Bits10 => 0b0011_1111,
            Resolution::Bits11 => 0b0101_1111,
            Resolution::Bits12 => 0b0111_1111,
        }
    }

    /// Returns the maximum conversion time
    pub const fn conversion_time(self) -> MillisDurationU64 {
        match self {
            Resolution::Bits9 => MillisDurationU64::millis(94),
            Resolution::Bits10 => MillisDurationU64::millis(188),
            Resolution::Bits11 => MillisDurationU64::millis(375),
            Resolution::Bits12 => MillisDurationU64::millis(750),
        }
    }

    /// Undefined low bits of the LSB at this resolution
    const fn lsb_mask(self) -> u8 {
        match self {
            Resolution::Bits9 => 0b1111_1000,
            Resolution::Bits10 => 0b1111_1100,
            Resolution::Bits11 => 0b1111_1110,
            Resolution::Bits12 => 0b1111_1111,
        }
    }
}

/// Dallas/Maxim CRC-8 (polynomial x^8 + x^5 + x^4 + 1, reflected).
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in data {
        let mut b = byte;
        for _ in 0..8 {
            let mix = (crc ^ b) & 0x01;
            crc >>= 1;
            if mix != 0 {
                crc ^= 0x8C;
            }
            b >>= 1;
        }
    }
    crc
}

/// Check a buffer whose last byte is the CRC of the preceding bytes.
pub fn check_crc8(data: &[u8]) -> Result<(), ScratchpadError> {
    match data.split_last() {
        Some((&crc, body)) if crc8(body) == crc => Ok(()),
        _ => Err(ScratchpadError::CrcMismatch),
    }
}

/// Resolution stored in a scratchpad
pub fn scratchpad_resolution(
    buf: &[u8; SCRATCHPAD_LEN],
) -> Result<Resolution, ScratchpadError> {
    Resolution::from_config_register(buf[CONFIG_BYTE]).ok_or(ScratchpadError::UnexpectedResponse)
}

/// Decode the temperature held in a raw scratchpad read.
pub fn decode_scratchpad(buf: &[u8; SCRATCHPAD_LEN]) -> Result<Temperature, ScratchpadError> {
    check_crc8(buf)?;
    let resolution = scratchpad_resolution(buf)?;

    let lsb = buf[0] & resolution.lsb_mask();
    let value = i16::from_le_bytes([lsb, buf[1]]);
    Ok(Temperature::from_bits(i32::from(value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratchpad(lsb: u8, msb: u8, config: u8) -> [u8; SCRATCHPAD_LEN] {
        let mut buf = [lsb, msb, 0x4B, 0x46, config, 0xFF, 0x0C, 0x10, 0];
        buf[8] = crc8(&buf[..8]);
        buf
    }

    #[test]
    fn test_crc8_known_rom() {
        // ROM code of a real DS18B20: family 0x28, serial, CRC 0x05
        let rom = [0x28, 0x60, 0xFB, 0x83, 0x0F, 0x00, 0x00, 0x05];
        assert_eq!(crc8(&rom[..7]), rom[7]);
        assert!(check_crc8(&rom).is_ok());
    }

    #[test]
    fn test_crc8_empty_buffer_fails() {
        assert_eq!(check_crc8(&[]), Err(ScratchpadError::CrcMismatch));
    }

    #[test]
    fn test_decode_positive() {
        // +25.0625 °C = 0x0191
        let buf = scratchpad(0x91, 0x01, Resolution::Bits12.to_config_register());
        assert_eq!(decode_scratchpad(&buf), Ok(Temperature::from_num(25.0625)));
    }

    #[test]
    fn test_decode_negative() {
        // -10.125 °C = 0xFF5E
        let buf = scratchpad(0x5E, 0xFF, Resolution::Bits12.to_config_register());
        assert_eq!(decode_scratchpad(&buf), Ok(Temperature::from_num(-10.125)));
    }

    #[test]
    fn test_decode_masks_low_bits() {
        let buf = scratchpad(0x91, 0x01, Resolution::Bits9.to_config_register());
        assert_eq!(decode_scratchpad(&buf), Ok(Temperature::from_num(25.0)));
    }

    #[test]
    fn test_decode_rejects_bad_crc() {
        let mut buf = scratchpad(0x91, 0x01, Resolution::Bits12.to_config_register());
        buf[8] ^= 0xFF;
        assert_eq!(decode_scratchpad(&buf), Err(ScratchpadError::CrcMismatch));
    }

    #[test]
    fn test_decode_rejects_unknown_config() {
        let buf = scratchpad(0x91, 0x01, 0x00);
        assert_eq!(
            decode_scratchpad(&buf),
            Err(ScratchpadError::UnexpectedResponse)
        );
    }

    #[test]
    fn test_resolution_register_roundtrip() {
        for res in [
            Resolution::Bits9,
            Resolution::Bits10,
            Resolution::Bits11,
            Resolution::Bits12,
        ] {
            assert_eq!(
                Resolution::from_config_register(res.to_config_register()),
                Some(res)
            );
        }
    }
}
