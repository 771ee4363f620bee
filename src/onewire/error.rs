use core::convert::Infallible;

use defmt::Format;
use shader_core::ds18b20::ScratchpadError;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Format, Copy, Clone, PartialEq, Eq)]
pub enum Error {
    /// The Bus was expected to be pulled high by a ~5K ohm pull-up resistor, but it wasn't
    BusNotHigh,

    /// An unexpected response was received from a command. This generally happens when a new sensor is added
    /// or removed from the bus during a command, such as a device search.
    UnexpectedResponse,

    FamilyCodeMismatch,
    CrcMismatch,

    /// No DS18B20 answered the ROM search
    NoDevice,
}

impl Error {
    pub fn as_str(&self) -> &'static str {
        match self {
            Error::BusNotHigh => "Bus not high",
            Error::UnexpectedResponse => "Unexpected response",
            Error::FamilyCodeMismatch => "Family code mismatch",
            Error::CrcMismatch => "CRC mismatch",
            Error::NoDevice => "No device",
        }
    }
}

// GPIO on this chip cannot fail
impl From<Infallible> for Error {
    fn from(value: Infallible) -> Self {
        match value {}
    }
}

impl From<ScratchpadError> for Error {
    fn from(value: ScratchpadError) -> Self {
        match value {
            ScratchpadError::CrcMismatch => Error::CrcMismatch,
            ScratchpadError::UnexpectedResponse => Error::UnexpectedResponse,
        }
    }
}
