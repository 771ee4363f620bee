//! Blocking delay on a general purpose timer
//!
//! SysTick already drives the 1-Wire bit timing, so the stepper gets its own
//! timer.

use embedded_hal::{
    blocking::delay::{DelayMs, DelayUs},
    timer::CountDown,
};
use nb::block;
use stm32f0xx_hal::time::Hertz;

pub struct TimerDelay<T> {
    timer: T,
}

impl<T: CountDown<Time = Hertz>> TimerDelay<T> {
    pub fn new(timer: T) -> Self {
        Self { timer }
    }

    fn wait_hz(&mut self, hz: u32) {
        self.timer.start(Hertz(hz));
        let _ = block!(self.timer.wait());
    }
}

impl<T: CountDown<Time = Hertz>> DelayUs<u32> for TimerDelay<T> {
    fn delay_us(&mut self, us: u32) {
        // Whole milliseconds first so the timer frequency never drops to 0 Hz
        self.delay_ms(us / 1_000);

        let rest = us % 1_000;
        if rest != 0 {
            self.wait_hz(1_000_000 / rest);
        }
    }
}

impl<T: CountDown<Time = Hertz>> DelayMs<u32> for TimerDelay<T> {
    fn delay_ms(&mut self, ms: u32) {
        for _ in 0..ms {
            self.wait_hz(1_000);
        }
    }
}
