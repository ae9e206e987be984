//! Driver library for a two-channel DC motor H-bridge connected to the
//! GPIO header of a Raspberry-Pi-class board.
//!
//! The [`motor::MotorDriver`] maps a (channel, duty, operation) request onto
//! the ordered pin writes an H-bridge module expects: one shared enable line
//! plus a PWM pin pair per channel. All hardware access goes through the
//! [`gpio::PinController`] trait so the drive logic can be exercised against
//! a fake in tests; [`gpio::CdevPinController`] is the real backend over the
//! Linux GPIO character device.

use thiserror::Error;

pub mod gpio;
pub mod motor;

/// Errors reported by the motor driver and its GPIO backend.
///
/// Validation errors (`InvalidChannel`, `DutyOutOfRange`, `InvalidOperation`,
/// `PinConflict`) are detected before any pin write, so a failed call leaves
/// the hardware untouched.
#[derive(Debug, Error)]
pub enum Error {
    /// The GPIO subsystem could not be acquired. Fatal at startup.
    #[error("failed to acquire GPIO character device")]
    Init(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Unrecognized motor channel selector.
    #[error("not a valid motor channel: `{0}`, specify left or right")]
    InvalidChannel(String),

    /// Duty cycle percentage outside 0-100.
    #[error("duty cycle {0} out of range, expected 0-100")]
    DutyOutOfRange(u8),

    /// Operation code outside the defined set.
    #[error("not a valid operation code: {0}")]
    InvalidOperation(i32),

    /// A write to the hardware backend failed.
    #[error("write to GPIO pin {pin} failed")]
    HardwareWrite {
        pin: gpio::Pin,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A pin is assigned to more than one output in the configuration.
    #[error("pin {0} is assigned to more than one output")]
    PinConflict(gpio::Pin),
}
