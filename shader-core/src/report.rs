//! Diagnostic lines written to the serial port

use core::fmt;

use crate::temperature::{Celsius, Temperature};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Report {
    /// `C: <temperature>`, on every sample
    Temperature(Temperature),
    /// `R: <steps>`, on every rotation
    Rotation(i32),
}

impl Report {
    /// Write the report as one `\r\n` terminated line.
    pub fn write_line<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        write!(out, "{self}\r\n")
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Report::Temperature(t) => write!(f, "C: {}", Celsius(*t)),
            Report::Rotation(steps) => write!(f, "R: {steps}"),
        }
    }
}
