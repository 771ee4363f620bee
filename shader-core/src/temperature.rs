//! Temperature sensor interface

use core::fmt;

use fixed::types::I28F4;
use fugit::{MillisDurationU64, TimerInstantU64};

/// I28F4 is a fixed point number with 4 fractional bits and 28 integer bits.
/// This gives us a precision of 0.0625 degrees Celsius & a range of (-2^27, 2^27 - 0.0625).
pub type Temperature = I28F4;

/// Millisecond instant used for sample pacing.
pub type Instant = TimerInstantU64<1000>;

/// A source of temperature samples that paces itself.
pub trait TemperatureSource {
    type Error;

    /// Returns a new reading once per sampling interval, `None` in between.
    ///
    /// Must not block for longer than a bus transaction; conversion waits are
    /// tracked internally.
    fn sample_if_due(&mut self) -> Result<Option<Temperature>, Self::Error>;
}

/// What a temperature source should do on this poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PacerAction {
    /// Nothing to do yet
    Wait,
    /// Kick off a new conversion on the sensor
    StartConversion,
    /// The conversion is done, read the result
    ReadResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle { next_at: Option<Instant> },
    Converting { started_at: Instant },
}

/// Timing state machine for a sensor that needs a conversion delay.
///
/// One conversion is started per `interval`; its result is read once
/// `conversion` has elapsed since the start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplePacer {
    interval: MillisDurationU64,
    conversion: MillisDurationU64,
    phase: Phase,
}

impl SamplePacer {
    pub const fn new(interval: MillisDurationU64, conversion: MillisDurationU64) -> Self {
        Self {
            interval,
            conversion,
            phase: Phase::Idle { next_at: None },
        }
    }

    pub const fn interval(&self) -> MillisDurationU64 {
        self.interval
    }

    /// Change the conversion time, e.g. after a resolution change.
    pub fn set_conversion_time(&mut self, conversion: MillisDurationU64) {
        self.conversion = conversion;
    }

    pub const fn is_converting(&self) -> bool {
        matches!(self.phase, Phase::Converting { .. })
    }

    /// Advance the pacer to `now`.
    pub fn poll(&mut self, now: Instant) -> PacerAction {
        match self.phase {
            Phase::Idle { next_at } => {
                if next_at.map_or(true, |at| now >= at) {
                    self.phase = Phase::Converting { started_at: now };
                    PacerAction::StartConversion
                } else {
                    PacerAction::Wait
                }
            }
            Phase::Converting { started_at } => {
                if now >= started_at + self.conversion {
                    self.phase = Phase::Idle {
                        next_at: Some(started_at + self.interval),
                    };
                    PacerAction::ReadResult
                } else {
                    PacerAction::Wait
                }
            }
        }
    }

    /// Drop an in-flight conversion and retry after a full interval.
    pub fn abort(&mut self, now: Instant) {
        self.phase = Phase::Idle {
            next_at: Some(now + self.interval),
        };
    }
}

/// Displays a temperature with two decimals, rounding half away from zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Celsius(pub Temperature);

impl fmt::Display for Celsius {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const ONE: u64 = 1 << Temperature::FRAC_NBITS;

        let bits = self.0.to_bits();
        let hundredths = (u64::from(bits.unsigned_abs()) * 100 + ONE / 2) / ONE;

        if bits < 0 && hundredths != 0 {
            f.write_str("-")?;
        }
        write!(f, "{}.{:02}", hundredths / 100, hundredths % 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: u64) -> Instant {
        Instant::from_ticks(ms)
    }

    fn pacer() -> SamplePacer {
        SamplePacer::new(
            MillisDurationU64::millis(1000),
            MillisDurationU64::millis(750),
        )
    }

    #[test]
    fn test_first_poll_starts_conversion() {
        let mut p = pacer();
        assert_eq!(p.poll(at(0)), PacerAction::StartConversion);
        assert!(p.is_converting());
    }

    #[test]
    fn test_result_read_after_conversion_time() {
        let mut p = pacer();
        p.poll(at(0));
        assert_eq!(p.poll(at(100)), PacerAction::Wait);
        assert_eq!(p.poll(at(749)), PacerAction::Wait);
        assert_eq!(p.poll(at(750)), PacerAction::ReadResult);
        assert!(!p.is_converting());
    }

    #[test]
    fn test_next_conversion_paced_from_previous_start() {
        let mut p = pacer();
        p.poll(at(10));
        p.poll(at(800));
        assert_eq!(p.poll(at(1009)), PacerAction::Wait);
        assert_eq!(p.poll(at(1010)), PacerAction::StartConversion);
    }

    #[test]
    fn test_late_poll_starts_immediately() {
        let mut p = pacer();
        p.poll(at(0));
        p.poll(at(5000));
        assert_eq!(p.poll(at(5001)), PacerAction::StartConversion);
    }

    #[test]
    fn test_abort_waits_full_interval() {
        let mut p = pacer();
        p.poll(at(0));
        p.abort(at(200));
        assert_eq!(p.poll(at(1199)), PacerAction::Wait);
        assert_eq!(p.poll(at(1200)), PacerAction::StartConversion);
    }

    #[test]
    fn test_celsius_display() {
        let show = |t: f32| std::format!("{}", Celsius(Temperature::from_num(t)));
        assert_eq!(show(25.0), "25.00");
        assert_eq!(show(29.875), "29.88");
        assert_eq!(show(25.0625), "25.06");
        assert_eq!(show(-0.5), "-0.50");
        assert_eq!(show(-10.125), "-10.13");
        assert_eq!(show(0.0), "0.00");
    }
}
