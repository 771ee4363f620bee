//! Serial command grammar
//!
//! ```text
//! shader open
//! shader close
//! motor inc <steps>
//! motor rot <degrees>
//! motor test
//! ```
//!
//! Commands are case-sensitive and whitespace-separated. Anything else,
//! including extra arguments, is not a command.

use core::str::FromStr;

use crate::line::is_whitespace;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    ShaderOpen,
    ShaderClose,
    /// Rotate by a raw step count, sign is direction
    MotorIncrement(i32),
    /// Rotate by an angle in degrees
    MotorRotate(f32),
    /// Forward, pause, back
    MotorTest,
}

impl Command {
    /// Parse a received line. Returns `None` for anything unrecognised.
    pub fn parse(line: &[u8]) -> Option<Self> {
        let mut args = line
            .split(|b| is_whitespace(*b))
            .filter(|arg| !arg.is_empty());

        let command = match (args.next()?, args.next()?) {
            (b"shader", b"open") => Command::ShaderOpen,
            (b"shader", b"close") => Command::ShaderClose,
            (b"motor", b"inc") => Command::MotorIncrement(parse_arg(args.next()?)?),
            (b"motor", b"rot") => {
                let degrees: f32 = parse_arg(args.next()?)?;
                if !degrees.is_finite() {
                    return None;
                }
                Command::MotorRotate(degrees)
            }
            (b"motor", b"test") => Command::MotorTest,
            _ => return None,
        };

        if args.next().is_some() {
            return None;
        }
        Some(command)
    }
}

fn parse_arg<T: FromStr>(arg: &[u8]) -> Option<T> {
    core::str::from_utf8(arg).ok()?.parse().ok()
}
