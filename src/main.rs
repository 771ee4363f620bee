#![no_std]
#![no_main]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::wildcard_imports)]

mod config;
mod delay;
mod ds18b20;
mod onewire;
mod temp_controller;
mod terminal;
mod thermometer;

use defmt_rtt as _;
use panic_probe as _;

#[rtic::app(device = stm32f0xx_hal::pac)]
mod app {
    use defmt::*;
    use rtic_monotonics::{
        stm32::{Tim2 as Mono, *},
        Monotonic,
    };
    use shader_core::{
        config::{MotorConfig, SensorConfig, ShaderConfig},
        FourWireStepper, LineBuffer, ShaderController,
    };
    use stm32f0xx_hal::{
        delay::Delay,
        pac::USART2,
        prelude::*,
        serial::{Event, Rx, Serial, Tx},
        timers::Timer,
        watchdog::Watchdog,
    };

    use crate::{
        config::{BAUD_RATE, BUFFER_SIZE, STEPPER_TIMER_HZ, SYSCLK_HZ, WATCHDOG_HZ},
        delay::TimerDelay,
        onewire::OneWire,
        temp_controller::Controller,
        thermometer::Ds18b20Source,
    };

    #[shared]
    struct Shared {
        buffer: LineBuffer<BUFFER_SIZE>,
    }

    #[local]
    struct Local {
        rx: Rx<USART2>,
        tx: Tx<USART2>,
        controller: Controller,
        thermometer: Ds18b20Source,
        watchdog: Watchdog,
    }

    #[init]
    fn init(mut cx: init::Context) -> (Shared, Local) {
        let mut rcc = cx
            .device
            .RCC
            .configure()
            .hsi48()
            .sysclk(SYSCLK_HZ.hz())
            .pclk(SYSCLK_HZ.hz())
            .hclk(SYSCLK_HZ.hz())
            .freeze(&mut cx.device.FLASH);

        trace!("sysclk: {}", rcc.clocks.sysclk().0);
        trace!("hclk: {}", rcc.clocks.hclk().0);
        trace!("pclk: {}", rcc.clocks.pclk().0);

        // Enable tim2 monotonic
        let token = rtic_monotonics::create_stm32_tim2_monotonic_token!();
        Mono::start(SYSCLK_HZ, token);

        // SysTick times the 1-Wire slots
        let delay = Delay::new(cx.core.SYST, &rcc);

        let gpioa = cx.device.GPIOA.split(&mut rcc);
        let gpiob = cx.device.GPIOB.split(&mut rcc);

        // USART2: RX interrupt fills the line buffer, idle writes diagnostics
        let mut usart = Serial::usart2(
            cx.device.USART2,
            (
                gpioa.pa2.into_alternate_af1(&cx.cs),
                gpioa.pa15.into_alternate_af1(&cx.cs),
            ),
            BAUD_RATE.bps(),
            &mut rcc,
        );
        usart.listen(Event::Rxne);
        let (tx, rx) = usart.split();

        // Status LED, off until the first hot sample
        let mut led = gpiob.pb3.into_push_pull_output(&cx.cs).downgrade();
        unwrap!(led.set_low());

        // Stepper on its own timer
        let coils = [
            gpioa.pa0.into_push_pull_output(&cx.cs).downgrade(),
            gpioa.pa1.into_push_pull_output(&cx.cs).downgrade(),
            gpioa.pa3.into_push_pull_output(&cx.cs).downgrade(),
            gpioa.pa4.into_push_pull_output(&cx.cs).downgrade(),
        ];
        let timer = Timer::tim3(cx.device.TIM3, STEPPER_TIMER_HZ.hz(), &mut rcc);
        let mut stepper = FourWireStepper::new(coils, TimerDelay::new(timer), MotorConfig::DEFAULT);
        unwrap!(stepper.release());

        // Setup DS18B20
        let mut pa12 = gpioa.pa12.into_open_drain_output(&cx.cs);
        unwrap!(pa12.set_high());
        let wire = OneWire::new(pa12.downgrade());
        let mut thermometer = Ds18b20Source::new(wire, delay, SensorConfig::DEFAULT);

        for device in thermometer.devices() {
            match device {
                Ok(addr) => info!("Found device: {}", addr),
                Err(e) => warn!("Device search failed: {}", e),
            }
        }

        let controller = ShaderController::new(stepper, led, ShaderConfig::DEFAULT);
        info!(
            "Shader controller ready, threshold {=f32}",
            controller.config().threshold.to_num::<f32>()
        );

        // Fed by the control loop, so a wedged loop resets the MCU
        let mut watchdog = Watchdog::new(cx.device.IWDG);
        watchdog.start(WATCHDOG_HZ.hz());

        (
            Shared {
                buffer: LineBuffer::new(),
            },
            Local {
                rx,
                tx,
                controller,
                thermometer,
                watchdog,
            },
        )
    }

    /// The control loop. Never sleeps: sampling is paced by the thermometer
    /// and rotations are taken a slice per pass.
    ///
    /// While the motor is busy, samples and terminal lines wait.
    #[idle(local = [controller, thermometer, tx, watchdog], shared = [buffer])]
    fn idle(mut cx: idle::Context) -> ! {
        let controller = cx.local.controller;
        let thermometer = cx.local.thermometer;
        let tx = cx.local.tx;
        let watchdog = cx.local.watchdog;

        loop {
            watchdog.feed();

            if controller.is_idle() {
                crate::temp_controller::poll(thermometer, controller, tx);
                crate::terminal::dispatch(&mut cx.shared.buffer, controller, tx);
            } else {
                crate::temp_controller::drive(controller, tx);
            }
        }
    }

    #[task(binds = USART2, local = [rx], shared = [buffer])]
    fn usart2(mut cx: usart2::Context) {
        let rx = cx.local.rx;
        cx.shared
            .buffer
            .lock(|buffer| crate::terminal::receive(rx, buffer));
    }

    timestamp!("{=u64:us}", {
        Mono::now().duration_since_epoch().to_micros()
    });
}
