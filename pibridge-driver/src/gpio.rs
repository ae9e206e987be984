//! Hardware access for the motor driver.
//!
//! [`PinController`] is the only surface the drive logic talks to, so tests
//! can substitute a recording fake. [`CdevPinController`] is the real
//! implementation over `/dev/gpiochipN`: the character device only offers
//! digital line writes, so each claimed line gets a small worker thread that
//! generates the PWM waveform in software by timed high/low writes, the same
//! scheme the board's C-side GPIO daemons use. At duty 0 or 255 the line is
//! held steady and the worker parks until the next command.

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use gpio_cdev::{Chip, LineHandle, LineRequestFlags};
use log::{debug, warn};

use crate::Error;

/// BCM line offset on the GPIO character device.
pub type Pin = u32;

/// Soft-PWM frequency applied to a claimed line until
/// [`PinController::set_pwm_frequency`] overrides it.
pub const DEFAULT_PWM_FREQUENCY_HZ: u32 = 1000;

/// Consumer label shown for claimed lines in `gpioinfo`.
const CONSUMER: &str = "pibridge";

/// Logic level for a digital write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

/// Capability interface over the GPIO subsystem.
///
/// All methods are synchronous and complete (or fail) before returning;
/// failures surface as [`Error::HardwareWrite`] carrying the pin and the
/// backend error.
pub trait PinController {
    /// Claims `pin` and configures it as an output, initially low.
    fn set_output(&mut self, pin: Pin) -> Result<(), Error>;

    /// Sets the PWM frequency used for subsequent [`pwm_write`] calls on
    /// `pin`.
    ///
    /// [`pwm_write`]: PinController::pwm_write
    fn set_pwm_frequency(&mut self, pin: Pin, frequency_hz: u32) -> Result<(), Error>;

    /// Drives `pin` to a steady logic level.
    fn digital_write(&mut self, pin: Pin, level: Level) -> Result<(), Error>;

    /// Drives `pin` with a PWM waveform at `duty` out of 255.
    fn pwm_write(&mut self, pin: Pin, duty: u8) -> Result<(), Error>;
}

/// Per-line command slot shared between the controller and its worker.
struct Command {
    duty: u8,
    frequency_hz: u32,
    stop: bool,
}

struct Slot {
    command: Mutex<Command>,
    changed: Condvar,
}

struct SoftPwmLine {
    slot: Arc<Slot>,
    worker: Option<thread::JoinHandle<()>>,
}

/// [`PinController`] backed by the Linux GPIO character device.
///
/// Dropping the controller stops every worker and releases the claimed
/// lines. Callers must issue a Coast on every active channel before dropping
/// it, otherwise the driver IC is left in whatever state the final command
/// put it in; the controller does not enforce this.
pub struct CdevPinController {
    chip: Chip,
    lines: HashMap<Pin, SoftPwmLine>,
}

impl CdevPinController {
    /// Opens the GPIO character device, e.g. `/dev/gpiochip0` for the main
    /// controller on a Raspberry Pi.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let chip = Chip::new(path).map_err(|e| Error::Init(e.into()))?;
        Ok(Self {
            chip,
            lines: HashMap::new(),
        })
    }

    /// Updates the command slot for `pin` and wakes its worker.
    fn update(&self, pin: Pin, f: impl FnOnce(&mut Command)) -> Result<(), Error> {
        let line = self.lines.get(&pin).ok_or_else(|| Error::HardwareWrite {
            pin,
            source: not_an_output(pin),
        })?;
        let mut command = line.slot.command.lock().unwrap();
        f(&mut command);
        line.slot.changed.notify_one();
        Ok(())
    }
}

impl PinController for CdevPinController {
    fn set_output(&mut self, pin: Pin) -> Result<(), Error> {
        if self.lines.contains_key(&pin) {
            return Ok(());
        }
        let handle = self
            .chip
            .get_line(pin)
            .and_then(|line| line.request(LineRequestFlags::OUTPUT, 0, CONSUMER))
            .map_err(|e| Error::HardwareWrite {
                pin,
                source: e.into(),
            })?;
        let slot = Arc::new(Slot {
            command: Mutex::new(Command {
                duty: 0,
                frequency_hz: DEFAULT_PWM_FREQUENCY_HZ,
                stop: false,
            }),
            changed: Condvar::new(),
        });
        let worker_slot = Arc::clone(&slot);
        let worker = thread::Builder::new()
            .name(format!("pwm-{pin}"))
            .spawn(move || pwm_loop(pin, handle, worker_slot))
            .map_err(|e| Error::HardwareWrite {
                pin,
                source: e.into(),
            })?;
        debug!("claimed pin {pin} as output");
        self.lines.insert(
            pin,
            SoftPwmLine {
                slot,
                worker: Some(worker),
            },
        );
        Ok(())
    }

    fn set_pwm_frequency(&mut self, pin: Pin, frequency_hz: u32) -> Result<(), Error> {
        self.update(pin, |command| command.frequency_hz = frequency_hz.max(1))
    }

    fn digital_write(&mut self, pin: Pin, level: Level) -> Result<(), Error> {
        self.update(pin, |command| {
            command.duty = match level {
                Level::Low => 0,
                Level::High => u8::MAX,
            }
        })
    }

    fn pwm_write(&mut self, pin: Pin, duty: u8) -> Result<(), Error> {
        self.update(pin, |command| command.duty = duty)
    }
}

impl Drop for CdevPinController {
    fn drop(&mut self) {
        for (pin, line) in self.lines.iter_mut() {
            {
                let mut command = line.slot.command.lock().unwrap();
                command.stop = true;
            }
            line.slot.changed.notify_one();
            if let Some(worker) = line.worker.take() {
                if worker.join().is_err() {
                    warn!("soft-PWM worker for pin {pin} panicked");
                }
            }
        }
    }
}

fn not_an_output(pin: Pin) -> Box<dyn std::error::Error + Send + Sync> {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("pin {pin} was not configured as an output"),
    )
    .into()
}

/// Generates the waveform for one line until told to stop.
///
/// Holds the command mutex whenever it is not sleeping inside a PWM cycle,
/// so duty 0/255 states cost nothing: the line is written once and the
/// thread blocks on the condvar.
fn pwm_loop(pin: Pin, handle: LineHandle, slot: Arc<Slot>) {
    let mut command = slot.command.lock().unwrap();
    loop {
        if command.stop {
            let _ = handle.set_value(0);
            return;
        }
        match command.duty {
            0 => {
                if handle.set_value(0).is_err() {
                    break;
                }
                command = slot.changed.wait(command).unwrap();
            }
            u8::MAX => {
                if handle.set_value(1).is_err() {
                    break;
                }
                command = slot.changed.wait(command).unwrap();
            }
            duty => {
                let period_us = 1_000_000 / u64::from(command.frequency_hz);
                let on_us = period_us * u64::from(duty) / 255;
                drop(command);
                if handle.set_value(1).is_err() {
                    break;
                }
                thread::sleep(Duration::from_micros(on_us));
                if handle.set_value(0).is_err() {
                    break;
                }
                thread::sleep(Duration::from_micros(period_us - on_us));
                command = slot.command.lock().unwrap();
            }
        }
    }
    // The line is gone or rejecting writes; stop driving it.
    warn!("GPIO write on pin {pin} failed, soft-PWM stopped");
}
