//! SmartGate: main entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Producers (any thread)                    │
//! │  Buttons (GPIO IRQ)   Command pipe (FIFO)   MCU bridge ("O") │
//! │              └───────────────┼───────────────┘               │
//! │                     CommandQueue (cap 10)                    │
//! │                              │                               │
//! │  ┌───────────────────────────▼───────────────────────────┐   │
//! │  │  Dispatcher ─▶ GateController (open · hold · close)   │   │
//! │  └───────────────────────────────────────────────────────┘   │
//! │  MotorDriver (relays)   SerialAnalog | MockAnalog   Mode file │
//! └──────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};
use tracing_subscriber::EnvFilter;

use smartgate::adapters::log_sink::LogEventSink;
use smartgate::adapters::mode_file::FileModeStore;
use smartgate::adapters::pipe::{remove_fifo, spawn_fifo_reader};
use smartgate::adapters::signals::{SHUTDOWN_SIGNALS, spawn_signal_watcher};
use smartgate::app::controller::GateController;
use smartgate::app::dispatcher::Dispatcher;
use smartgate::app::mode_watch::ModeWatch;
use smartgate::app::ports::{AnalogSource, MotorPort};
use smartgate::app::queue::CommandQueue;
use smartgate::config::GateConfig;
use smartgate::error::{ConfigError, Error};

const DEFAULT_CONFIG_PATH: &str = "smartgate.json";
const CONFIG_ENV: &str = "SMARTGATE_CONFIG";

fn main() -> Result<()> {
    // ── 1. Logging ────────────────────────────────────────────
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("SmartGate v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Config ─────────────────────────────────────────────
    let config = load_config()?;

    // ── 3. Queue and producers ────────────────────────────────
    let queue = Arc::new(CommandQueue::new());
    spawn_signal_watcher(&SHUTDOWN_SIGNALS, Arc::clone(&queue))
        .context("installing shutdown signal handlers")?;
    let fifo_path = PathBuf::from(&config.fifo_file);
    spawn_fifo_reader(&fifo_path, Arc::clone(&queue))
        .with_context(|| format!("creating command pipe {}", fifo_path.display()))?;

    let store = FileModeStore::new(&config.mode_file);

    // ── 4. Hardware and dispatch (blocks until `kill` or a signal) ─
    hardware::run(&config, store, Arc::clone(&queue), ModeWatch::default())?;

    if let Err(e) = remove_fifo(&fifo_path) {
        warn!("Could not remove command pipe: {e}");
    }
    info!("SmartGate stopped");
    Ok(())
}

fn load_config() -> Result<GateConfig> {
    let path = env::args()
        .nth(1)
        .or_else(|| env::var(CONFIG_ENV).ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.into());

    let config = match GateConfig::load(&path) {
        Ok(config) => {
            info!("Config loaded from {path}");
            config
        }
        Err(ConfigError::NotFound) => {
            warn!("No config at {path}, using defaults");
            GateConfig::default()
        }
        Err(e) => return Err(Error::from(e)).with_context(|| format!("loading {path}")),
    };
    config
        .validate()
        .map_err(Error::from)
        .context("invalid configuration")?;
    Ok(config)
}

fn dispatch<M: MotorPort, A: AnalogSource>(
    config: &GateConfig,
    motor: M,
    analog: A,
    store: FileModeStore,
    queue: Arc<CommandQueue>,
    mode: ModeWatch,
) {
    let controller = GateController::new(config, motor, analog, store, LogEventSink::new(), queue)
        .with_mode_watch(mode);
    Dispatcher::new(controller).run();
}

#[cfg(feature = "rpi")]
mod hardware {
    use std::sync::Arc;
    use std::time::Instant;

    use anyhow::{Context, Result};
    use log::warn;
    use rppal::gpio::{Gpio, Trigger};

    use smartgate::adapters::mode_file::FileModeStore;
    use smartgate::app::mode_watch::ModeWatch;
    use smartgate::app::ports::AnalogSource;
    use smartgate::app::queue::CommandQueue;
    use smartgate::config::GateConfig;
    use smartgate::drivers::button::ButtonInput;
    use smartgate::drivers::motor::MotorDriver;
    use smartgate::error::Error;
    use smartgate::pins;
    use smartgate::sensors::MockAnalog;
    use smartgate::sensors::serial_analog::SerialAnalog;

    pub fn run(
        config: &GateConfig,
        store: FileModeStore,
        queue: Arc<CommandQueue>,
        mode: ModeWatch,
    ) -> Result<()> {
        let gpio = Gpio::new().context("GPIO unavailable")?;

        let pin0 = gpio.get(pins::MOTOR_PIN0)?.into_output();
        let pin1 = gpio.get(pins::MOTOR_PIN1)?.into_output();
        let motor = MotorDriver::new(pin0, pin1, config.motor_active_high)
            .map_err(Error::from)
            .context("releasing motor relays")?;

        // Interrupts stay registered while the input pins are alive.
        let mut buttons = Vec::with_capacity(pins::BUTTONS.len());
        for (pin, name) in pins::BUTTONS {
            let mut input = gpio.get(pin)?.into_input_pullup();
            let mut button = ButtonInput::new(
                name,
                config.button_debounce(),
                Arc::clone(&queue),
                mode.clone(),
            );
            input
                .set_async_interrupt(Trigger::FallingEdge, None, move |_| {
                    button.on_press(Instant::now());
                })
                .with_context(|| format!("{name} button interrupt"))?;
            buttons.push(input);
        }

        let analog: Box<dyn AnalogSource + Send> =
            match SerialAnalog::open(config, Arc::clone(&queue), mode.clone()) {
                Ok(serial) => Box::new(serial),
                Err(e) => {
                    warn!("Serial analog unavailable ({e}), entering mock analog mode");
                    Box::new(MockAnalog::new())
                }
            };

        super::dispatch(config, motor, analog, store, queue, mode);
        drop(buttons);
        Ok(())
    }
}

#[cfg(not(feature = "rpi"))]
mod hardware {
    use std::sync::Arc;

    use anyhow::{Context, Result};
    use log::warn;

    use smartgate::adapters::mode_file::FileModeStore;
    use smartgate::app::mode_watch::ModeWatch;
    use smartgate::app::queue::CommandQueue;
    use smartgate::config::GateConfig;
    use smartgate::drivers::motor::MotorDriver;
    use smartgate::drivers::sim_pin::SimPin;
    use smartgate::error::Error;
    use smartgate::sensors::MockAnalog;

    pub fn run(
        config: &GateConfig,
        store: FileModeStore,
        queue: Arc<CommandQueue>,
        mode: ModeWatch,
    ) -> Result<()> {
        warn!("Built without the rpi feature, driving simulated hardware");
        let motor = MotorDriver::new(
            SimPin::new("motor0"),
            SimPin::new("motor1"),
            config.motor_active_high,
        )
        .map_err(Error::from)
        .context("releasing motor relays")?;

        super::dispatch(config, motor, MockAnalog::new(), store, queue, mode);
        Ok(())
    }
}
