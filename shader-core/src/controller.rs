//! Shader controller
//!
//! Opens the shader when the cooker reaches the threshold temperature and
//! closes it again when it cools down, with manual overrides from the serial
//! terminal. The LED mirrors which side of the threshold the last crossing
//! was on.
//!
//! Requests only plan motor work. The plan is carried out by
//! [`ShaderController::poll_motor`], a bounded number of steps per call, so
//! the caller's loop keeps running while the motor turns. Nothing new starts
//! until the plan is finished.
//!
//! Diagnostic lines are best effort: a failing sink never stops the motor.

use core::fmt::Write;

use embedded_hal::digital::v2::OutputPin;
use fugit::MillisDurationU64;
use heapless::Deque;

use crate::{
    command::Command,
    config::ShaderConfig,
    report::Report,
    stepper::MotorDriver,
    temperature::{Instant, Temperature},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ShaderPosition {
    Open,
    Closed,
}

/// Motor activity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Motion {
    Idle,
    /// Turning, with `remaining` signed steps left in this rotation
    Rotating { remaining: i32 },
    /// Holding still halfway through a self-test
    Dwelling,
}

/// A threshold crossing handled by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Transition {
    /// Reading rose to the threshold: shader opening, LED on once it is open
    Opened,
    /// Reading fell below the threshold: shader closing, LED off once it is closed
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Steps(i32),
    Pause(MillisDurationU64),
    PauseUntil(Instant),
    /// Commit the result of a shader rotation
    Settle {
        position: ShaderPosition,
        led: Option<bool>,
    },
}

// Longest plan is the self-test: steps, pause, steps
const PLAN_LEN: usize = 4;

pub struct ShaderController<M, L> {
    motor: M,
    led: L,
    config: ShaderConfig,
    position: ShaderPosition,
    led_on: bool,
    plan: Deque<Stage, PLAN_LEN>,
    last_reading: Option<Temperature>,
}

impl<M, L> ShaderController<M, L> {
    /// Starts closed with the LED off. The LED pin is expected to be low
    /// already.
    pub const fn new(motor: M, led: L, config: ShaderConfig) -> Self {
        Self {
            motor,
            led,
            config,
            position: ShaderPosition::Closed,
            led_on: false,
            plan: Deque::new(),
            last_reading: None,
        }
    }

    /// Last committed position. A rotation in progress does not count until
    /// it finishes.
    pub const fn position(&self) -> ShaderPosition {
        self.position
    }

    pub const fn led_on(&self) -> bool {
        self.led_on
    }

    pub fn motion(&self) -> Motion {
        match self.plan.front() {
            Some(Stage::Steps(remaining)) => Motion::Rotating {
                remaining: *remaining,
            },
            Some(Stage::Pause(_) | Stage::PauseUntil(_)) => Motion::Dwelling,
            // Settling never outlives the call that reached it
            Some(Stage::Settle { .. }) | None => Motion::Idle,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.plan.is_empty()
    }

    pub const fn last_reading(&self) -> Option<Temperature> {
        self.last_reading
    }

    pub const fn config(&self) -> &ShaderConfig {
        &self.config
    }

    pub fn motor(&self) -> &M {
        &self.motor
    }

    pub fn motor_mut(&mut self) -> &mut M {
        &mut self.motor
    }

    pub fn led(&self) -> &L {
        &self.led
    }
}

impl<M, L, E> ShaderController<M, L>
where
    M: MotorDriver<Error = E>,
    L: OutputPin<Error = E>,
{
    /// Handle a new temperature sample.
    ///
    /// The reading is always reported. Crossings are only acted on while the
    /// motor is idle. The LED follows once the rotation has finished, so if
    /// it fails the next sample on the same side of the threshold retries.
    pub fn on_temperature_sample<W: Write>(
        &mut self,
        reading: Temperature,
        out: &mut W,
    ) -> Result<Option<Transition>, E> {
        self.last_reading = Some(reading);
        let _ = Report::Temperature(reading).write_line(out);

        if !self.is_idle() {
            return Ok(None);
        }

        if reading >= self.config.threshold && !self.led_on {
            self.move_shader(ShaderPosition::Open, Some(true), out)?;
            Ok(Some(Transition::Opened))
        } else if reading < self.config.threshold && self.led_on {
            self.move_shader(ShaderPosition::Closed, Some(false), out)?;
            Ok(Some(Transition::Closed))
        } else {
            Ok(None)
        }
    }

    /// Start rotating the shader open. Returns `false` if it already was, or
    /// if the motor is busy.
    pub fn open_shaders<W: Write>(&mut self, out: &mut W) -> Result<bool, E> {
        self.move_shader(ShaderPosition::Open, None, out)
    }

    /// Start rotating the shader closed. Returns `false` if it already was,
    /// or if the motor is busy.
    pub fn close_shaders<W: Write>(&mut self, out: &mut W) -> Result<bool, E> {
        self.move_shader(ShaderPosition::Closed, None, out)
    }

    /// Parse and run a terminal line. Returns the command that ran, or `None`
    /// if the line was not a command or the motor is busy.
    pub fn on_command<W: Write>(
        &mut self,
        line: &[u8],
        out: &mut W,
    ) -> Result<Option<Command>, E> {
        if !self.is_idle() {
            return Ok(None);
        }
        let Some(command) = Command::parse(line) else {
            return Ok(None);
        };
        self.execute(command, out)?;
        Ok(Some(command))
    }

    pub fn execute<W: Write>(&mut self, command: Command, out: &mut W) -> Result<(), E> {
        match command {
            Command::ShaderOpen => self.open_shaders(out).map(drop),
            Command::ShaderClose => self.close_shaders(out).map(drop),
            Command::MotorIncrement(steps) => self.rotate_steps(steps, out),
            Command::MotorRotate(degrees) => self.rotate_degrees(degrees, out),
            Command::MotorTest => self.self_test(out),
        }
    }

    /// Rotate by a raw step count without touching the shader position.
    pub fn rotate_steps<W: Write>(&mut self, steps: i32, out: &mut W) -> Result<(), E> {
        self.start(&[Stage::Steps(steps)], out)
    }

    pub fn rotate_degrees<W: Write>(&mut self, degrees: f32, out: &mut W) -> Result<(), E> {
        let steps = self.config.degrees_to_steps(degrees);
        self.rotate_steps(steps, out)
    }

    /// Turn forward, pause, and turn back to where we started.
    pub fn self_test<W: Write>(&mut self, out: &mut W) -> Result<(), E> {
        let steps = self.config.self_test_steps;
        let pause = MillisDurationU64::millis(u64::from(self.config.self_test_pause_ms));
        self.start(
            &[Stage::Steps(steps), Stage::Pause(pause), Stage::Steps(-steps)],
            out,
        )
    }

    /// Carry the current plan forward to `now`, taking at most
    /// `steps_per_poll` steps. Returns what the motor is doing afterwards.
    ///
    /// A motor or LED error abandons the rest of the plan.
    pub fn poll_motor<W: Write>(&mut self, now: Instant, out: &mut W) -> Result<Motion, E> {
        let budget = self.config.steps_per_poll.max(1);
        self.advance(Some(now), budget, out)?;
        Ok(self.motion())
    }

    fn move_shader<W: Write>(
        &mut self,
        target: ShaderPosition,
        led: Option<bool>,
        out: &mut W,
    ) -> Result<bool, E> {
        if !self.is_idle() {
            return Ok(false);
        }

        let settle = Stage::Settle {
            position: target,
            led,
        };
        if self.position == target {
            if led.is_some() {
                self.start(&[settle], out)?;
            }
            return Ok(false);
        }

        let steps = match target {
            ShaderPosition::Open => -self.config.toggle_steps(),
            ShaderPosition::Closed => self.config.toggle_steps(),
        };
        self.start(&[Stage::Steps(steps), settle], out)?;
        Ok(true)
    }

    /// Queue `stages` if the motor is idle and run whatever needs no time.
    fn start<W: Write>(&mut self, stages: &[Stage], out: &mut W) -> Result<(), E> {
        if !self.is_idle() {
            return Ok(());
        }
        for stage in stages {
            let _ = self.plan.push_back(*stage);
        }
        self.announce(out);
        self.advance(None, 0, out)
    }

    fn advance<W: Write>(
        &mut self,
        now: Option<Instant>,
        budget: u16,
        out: &mut W,
    ) -> Result<(), E> {
        let mut budget = i32::from(budget);

        while let Some(&stage) = self.plan.front() {
            match stage {
                Stage::Steps(0) => self.next_stage(out),
                Stage::Steps(remaining) => {
                    if budget == 0 {
                        break;
                    }
                    let chunk = remaining.clamp(-budget, budget);
                    budget -= chunk.abs();

                    if let Err(e) = self.motor.step(chunk) {
                        self.plan.clear();
                        return Err(e);
                    }
                    self.replace_front(Stage::Steps(remaining - chunk));
                }
                Stage::Pause(duration) => match now {
                    Some(now) => self.replace_front(Stage::PauseUntil(now + duration)),
                    None => break,
                },
                Stage::PauseUntil(until) => match now {
                    Some(now) if now >= until => self.next_stage(out),
                    _ => break,
                },
                Stage::Settle { position, led } => {
                    if let Some(on) = led {
                        if let Err(e) = self.set_led(on) {
                            self.plan.clear();
                            return Err(e);
                        }
                    }
                    self.position = position;
                    self.next_stage(out);
                }
            }
        }
        Ok(())
    }

    fn next_stage<W: Write>(&mut self, out: &mut W) {
        self.plan.pop_front();
        self.announce(out);
    }

    fn replace_front(&mut self, stage: Stage) {
        if let Some(front) = self.plan.front_mut() {
            *front = stage;
        }
    }

    /// `R:` goes out as a rotation begins
    fn announce<W: Write>(&self, out: &mut W) {
        if let Some(Stage::Steps(steps)) = self.plan.front() {
            let _ = Report::Rotation(*steps).write_line(out);
        }
    }

    fn set_led(&mut self, on: bool) -> Result<(), E> {
        if on {
            self.led.set_high()?;
        } else {
            self.led.set_low()?;
        }
        self.led_on = on;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use core::convert::Infallible;
    use std::{string::String, vec::Vec};

    use super::*;

    #[derive(Default)]
    struct Motor {
        moves: Vec<i32>,
        fail: bool,
    }

    impl MotorDriver for Motor {
        type Error = &'static str;

        fn step(&mut self, steps: i32) -> Result<(), Self::Error> {
            if self.fail {
                return Err("stuck");
            }
            self.moves.push(steps);
            Ok(())
        }
    }

    #[derive(Default)]
    struct Led(bool);

    impl OutputPin for Led {
        type Error = &'static str;

        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.0 = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.0 = true;
            Ok(())
        }
    }

    fn controller() -> ShaderController<Motor, Led> {
        ShaderController::new(Motor::default(), Led::default(), ShaderConfig::DEFAULT)
    }

    fn t(v: f32) -> Temperature {
        Temperature::from_num(v)
    }

    fn at(ms: u64) -> Instant {
        Instant::from_ticks(ms)
    }

    /// Poll every 100 ms until the plan is done
    fn finish<W: Write>(c: &mut ShaderController<Motor, Led>, out: &mut W) -> Result<(), &'static str> {
        let mut now = 0;
        while c.poll_motor(at(now), out)? != Motion::Idle {
            now += 100;
        }
        Ok(())
    }

    #[test]
    fn test_initial_state() {
        let c = controller();
        assert_eq!(c.position(), ShaderPosition::Closed);
        assert!(!c.led_on());
        assert_eq!(c.motion(), Motion::Idle);
        assert!(c.is_idle());
        assert_eq!(c.last_reading(), None);
    }

    #[test]
    fn test_open_rotates_negative_in_slices() {
        let mut c = controller();
        let mut out = String::new();

        assert_eq!(c.open_shaders(&mut out), Ok(true));
        assert_eq!(c.motion(), Motion::Rotating { remaining: -520 });
        assert_eq!(out, "R: -520\r\n");
        assert!(c.motor().moves.is_empty());

        assert_eq!(
            c.poll_motor(at(0), &mut out),
            Ok(Motion::Rotating { remaining: -456 })
        );
        assert_eq!(c.position(), ShaderPosition::Closed);

        finish(&mut c, &mut out).unwrap();
        assert_eq!(c.position(), ShaderPosition::Open);
        assert_eq!(c.motor().moves.iter().sum::<i32>(), -520);
        assert!(c.motor().moves.iter().all(|&m| (-64..0).contains(&m)));
        assert_eq!(out, "R: -520\r\n");
    }

    #[test]
    fn test_close_when_closed_is_noop() {
        let mut c = controller();
        let mut out = String::new();

        assert_eq!(c.close_shaders(&mut out), Ok(false));
        assert!(c.is_idle());
        assert!(out.is_empty());
    }

    #[test]
    fn test_sample_at_threshold_opens() {
        let mut c = controller();
        let mut out = String::new();

        let transition = c.on_temperature_sample(t(30.0), &mut out);
        assert_eq!(transition, Ok(Some(Transition::Opened)));
        assert_eq!(c.last_reading(), Some(t(30.0)));
        // LED waits for the shader
        assert!(!c.led_on());

        finish(&mut c, &mut out).unwrap();
        assert!(c.led_on());
        assert!(c.led().0);
        assert_eq!(out, "C: 30.00\r\nR: -520\r\n");
    }

    #[test]
    fn test_busy_controller_defers_everything() {
        let mut c = controller();
        let mut out = String::new();

        c.on_temperature_sample(t(35.0), &mut out).unwrap();
        assert_eq!(c.on_command(b"shader close", &mut out), Ok(None));
        assert_eq!(c.on_temperature_sample(t(10.0), &mut out), Ok(None));
        assert_eq!(c.open_shaders(&mut out), Ok(false));
        assert_eq!(c.last_reading(), Some(t(10.0)));

        finish(&mut c, &mut out).unwrap();
        assert_eq!(c.position(), ShaderPosition::Open);
        assert_eq!(out, "C: 35.00\r\nR: -520\r\nC: 10.00\r\n");

        // The cold reading is acted on once it is seen again
        assert_eq!(
            c.on_temperature_sample(t(10.0), &mut out),
            Ok(Some(Transition::Closed))
        );
    }

    #[test]
    fn test_failed_rotation_leaves_state() {
        let mut c = controller();
        let mut out = String::new();
        c.motor_mut().fail = true;

        c.on_temperature_sample(t(40.0), &mut out).unwrap();
        assert_eq!(c.poll_motor(at(0), &mut out), Err("stuck"));
        assert!(!c.led_on());
        assert_eq!(c.position(), ShaderPosition::Closed);
        assert_eq!(c.motion(), Motion::Idle);

        // Retried on the next hot sample
        c.motor_mut().fail = false;
        assert_eq!(
            c.on_temperature_sample(t(40.0), &mut out),
            Ok(Some(Transition::Opened))
        );
        finish(&mut c, &mut out).unwrap();
        assert_eq!(c.position(), ShaderPosition::Open);
        assert!(c.led_on());
    }

    #[test]
    fn test_manual_open_then_hot_sample_only_sets_led() {
        let mut c = controller();
        let mut out = String::new();

        c.execute(Command::ShaderOpen, &mut out).unwrap();
        finish(&mut c, &mut out).unwrap();
        let moves = c.motor().moves.len();

        c.on_temperature_sample(t(31.0), &mut out).unwrap();
        assert!(c.is_idle());
        assert!(c.led_on());
        assert_eq!(c.motor().moves.len(), moves);
    }

    #[test]
    fn test_self_test_dwells_then_returns() {
        let mut c = controller();
        let mut out = String::new();

        c.execute(Command::MotorTest, &mut out).unwrap();
        assert_eq!(out, "R: 1000\r\n");

        let mut now = 0;
        while c.motion() != Motion::Dwelling {
            c.poll_motor(at(now), &mut out).unwrap();
            now += 10;
        }
        assert_eq!(c.motor().moves.iter().sum::<i32>(), 1000);

        // Pause measured from the poll that finished the first half
        let paused_at = now - 10;
        assert_eq!(c.poll_motor(at(paused_at + 999), &mut out), Ok(Motion::Dwelling));
        assert_eq!(
            c.poll_motor(at(paused_at + 1000), &mut out),
            Ok(Motion::Rotating { remaining: -936 })
        );
        assert_eq!(out, "R: 1000\r\nR: -1000\r\n");

        finish(&mut c, &mut out).unwrap();
        assert_eq!(c.motor().moves.iter().sum::<i32>(), 0);
        assert_eq!(c.position(), ShaderPosition::Closed);
    }

    #[test]
    fn test_motor_commands_keep_position() {
        let mut c = controller();
        let mut out = String::new();

        c.execute(Command::MotorIncrement(-7), &mut out).unwrap();
        finish(&mut c, &mut out).unwrap();
        c.execute(Command::MotorRotate(92.0), &mut out).unwrap();
        finish(&mut c, &mut out).unwrap();
        assert_eq!(c.motor().moves, [-7, 64, 64, 64, 64, 64, 64, 64, 64, 8]);
        assert_eq!(c.position(), ShaderPosition::Closed);
    }

    #[test]
    fn test_zero_step_rotation_finishes_at_once() {
        let mut c = controller();
        let mut out = String::new();

        c.rotate_steps(0, &mut out).unwrap();
        assert!(c.is_idle());
        assert_eq!(out, "R: 0\r\n");
    }

    #[test]
    fn test_zero_steps_per_poll_still_moves() {
        let config = ShaderConfig {
            steps_per_poll: 0,
            ..ShaderConfig::DEFAULT
        };
        let mut c = ShaderController::new(Motor::default(), Led::default(), config);
        let mut out = String::new();

        c.rotate_steps(2, &mut out).unwrap();
        assert_eq!(
            c.poll_motor(at(0), &mut out),
            Ok(Motion::Rotating { remaining: 1 })
        );
    }

    struct Broken;

    impl Write for Broken {
        fn write_str(&mut self, _: &str) -> core::fmt::Result {
            Err(core::fmt::Error)
        }
    }

    #[test]
    fn test_broken_sink_does_not_stop_motor() {
        let mut c = controller();
        assert_eq!(c.open_shaders(&mut Broken), Ok(true));
        finish(&mut c, &mut Broken).unwrap();
        assert_eq!(c.motor().moves.iter().sum::<i32>(), -520);
    }

    #[test]
    fn test_on_command_with_infallible_pins() {
        struct Null;
        impl MotorDriver for Null {
            type Error = Infallible;
            fn step(&mut self, _: i32) -> Result<(), Infallible> {
                Ok(())
            }
        }
        struct Pin;
        impl OutputPin for Pin {
            type Error = Infallible;
            fn set_low(&mut self) -> Result<(), Infallible> {
                Ok(())
            }
            fn set_high(&mut self) -> Result<(), Infallible> {
                Ok(())
            }
        }

        let mut c = ShaderController::new(Null, Pin, ShaderConfig::DEFAULT);
        let mut out = String::new();
        assert_eq!(
            c.on_command(b"shader open\n", &mut out),
            Ok(Some(Command::ShaderOpen))
        );
        assert_eq!(
            c.poll_motor(Instant::from_ticks(0), &mut out),
            Ok(Motion::Rotating { remaining: -456 })
        );
    }
}
