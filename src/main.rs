//! gesture-io demo firmware.
//!
//! One active-low button and one LED:
//!
//! | Gesture      | Effect                          |
//! |--------------|---------------------------------|
//! | Click        | toggle the LED                  |
//! | Double click | LED on for 10 s                 |
//! | Long click   | LED off                         |
//! | Hold 1 s     | log only                        |
//!
//! Button callbacks cannot borrow the service that owns the LED, so they
//! post a [`Command`] to a static channel that the main loop drains after
//! each pump.

use std::sync::Arc;

use anyhow::Result;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{info, warn};

use gesture_io::adapters::esp_gpio::EspGpio;
use gesture_io::adapters::time::MonotonicClock;
use gesture_io::config::{ButtonTiming, InputConfig, OutputConfig, PinMode, ServiceConfig, StartupState};
use gesture_io::irq::IrqShared;
use gesture_io::scheduler::Scheduler;
use gesture_io::{GpioService, LineId};

const BUTTON_GPIO: u8 = 0;
const LED_GPIO: u8 = 2;
const PUMP_INTERVAL_MS: u32 = 10;

#[derive(Debug, Clone, Copy)]
enum Command {
    Toggle,
    OnFor(u32),
    Off,
}

static COMMANDS: Channel<CriticalSectionRawMutex, Command, 8> = Channel::new();

fn post(cmd: Command) {
    if COMMANDS.try_send(cmd).is_err() {
        warn!("command queue full, {:?} dropped", cmd);
    }
}

fn main() -> Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;
    info!("gesture-io demo starting");

    let irq = Arc::new(IrqShared::new());
    let gpio = EspGpio::new(irq.clone())?;
    let mut service = GpioService::with_irq(
        gpio,
        Arc::new(MonotonicClock::new()),
        Arc::new(Scheduler::new()),
        irq,
        ServiceConfig::default(),
    );

    let button = service.add_button(
        LineId::Native(BUTTON_GPIO),
        &InputConfig {
            mode: PinMode::InputPullUp,
            active_level: false,
            debounce_ms: 30,
        },
        ButtonTiming::default(),
    )?;
    {
        let b = service.button_mut(button)?;
        b.on_click(|| post(Command::Toggle), false);
        b.on_double_click(|| post(Command::OnFor(10_000)), false);
        b.on_long_click(|| post(Command::Off), false);
        b.on_press_hold(1000, || info!("held for 1s"), true);
    }
    service.attach_interrupt(button)?;

    let led = service.add_pin_output(
        LineId::Native(LED_GPIO),
        true,
        &OutputConfig {
            startup: StartupState::Off,
            ..OutputConfig::default()
        },
    )?;
    service
        .output_mut(led)?
        .on_power_changed(|| info!("LED changed"), true);

    info!("ready: click / double-click / long-click GPIO{}", BUTTON_GPIO);
    loop {
        service.pump();
        while let Ok(cmd) = COMMANDS.try_receive() {
            let out = service.output_mut(led)?;
            match cmd {
                Command::Toggle => out.toggle(),
                Command::OnFor(ms) => out.on_for(0, ms, false),
                Command::Off => out.off(false),
            }
        }
        esp_idf_svc::hal::delay::FreeRtos::delay_ms(PUMP_INTERVAL_MS);
    }
}
