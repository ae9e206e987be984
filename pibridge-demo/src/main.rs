//! Demonstration sequence for the H-bridge motor driver.
//!
//! Drives the left channel forward at 50%, coasts, brakes low, reverses at
//! 50%, each held for one second, then coasts both channels and exits.
//! Log verbosity is controlled through `RUST_LOG`.

use std::thread;
use std::time::Duration;

use anyhow::Result;
use tracing::info;
use tracing::metadata::LevelFilter;

use pibridge_driver::gpio::CdevPinController;
use pibridge_driver::motor::{Channel, MotorConfig, MotorDriver, Operation};

const HOLD: Duration = Duration::from_secs(1);

fn main() -> Result<()> {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{fmt, EnvFilter};
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    // gpiochip0 is the main GPIO controller on a Raspberry Pi
    let pins = CdevPinController::new("/dev/gpiochip0")?;
    let mut driver = MotorDriver::new(pins, MotorConfig::default())?;

    info!("left channel forward at 50%");
    driver.move_channel(Channel::Left, 50, Operation::Forward)?;
    thread::sleep(HOLD);

    info!("left channel coasting");
    driver.move_channel(Channel::Left, 50, Operation::Coast)?;
    thread::sleep(HOLD);

    info!("left channel braking low");
    driver.move_channel(Channel::Left, 50, Operation::BrakeLow)?;
    thread::sleep(HOLD);

    info!("left channel reverse at 50%");
    driver.move_channel(Channel::Left, 50, Operation::Reverse)?;
    thread::sleep(HOLD);

    // coast everything before the pin controller is torn down
    driver.stop_all()?;
    info!("done");
    Ok(())
}
