//! Drive logic for a two-channel H-bridge motor module.
//!
//! Each channel is wired to two PWM inputs of the bridge and both channels
//! share one enable line gating power to the driver IC. Drive states:
//!
//! | operation | enable | pwm_a | pwm_b |
//! |-----------|--------|-------|-------|
//! | Reverse   | high   | 0     | duty  |
//! | BrakeLow  | high   | 0     | 0     |
//! | Coast     | low    | 0     | 0     |
//! | Forward   | high   | duty  | 0     |
//!
//! The enable line is always written before the PWM pins so the driver IC
//! never sees a nonzero PWM input while its enable state is stale.

use std::str::FromStr;

use log::{debug, info};

use crate::gpio::{Level, Pin, PinController, DEFAULT_PWM_FREQUENCY_HZ};
use crate::Error;

/// Motor channel selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Left,
    Right,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Left, Channel::Right];
}

impl FromStr for Channel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "l" | "left" => Ok(Channel::Left),
            "r" | "right" => Ok(Channel::Right),
            other => Err(Error::InvalidChannel(other.to_string())),
        }
    }
}

/// H-bridge operation.
///
/// The integer wire encoding:
///
/// - `-2`: reverse at the given duty
/// - `-1`: brake low (both motor terminals shorted to ground)
/// - `0`: coast (bridge disabled, motor freewheels)
/// - `1`: forward at the given duty
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Coast,
    BrakeLow,
    Forward,
    Reverse,
}

impl Operation {
    /// Decodes an integer operation code.
    pub fn from_code(code: i32) -> Result<Self, Error> {
        match code {
            -2 => Ok(Operation::Reverse),
            -1 => Ok(Operation::BrakeLow),
            0 => Ok(Operation::Coast),
            1 => Ok(Operation::Forward),
            other => Err(Error::InvalidOperation(other)),
        }
    }

    /// Returns the integer code for this operation.
    pub fn code(&self) -> i32 {
        match self {
            Operation::Reverse => -2,
            Operation::BrakeLow => -1,
            Operation::Coast => 0,
            Operation::Forward => 1,
        }
    }
}

/// PWM pin pair driving one channel of the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelPins {
    pub pwm_a: Pin,
    pub pwm_b: Pin,
}

/// Wiring and PWM configuration, fixed at construction.
#[derive(Debug, Clone)]
pub struct MotorConfig {
    pub enable: Pin,
    pub left: ChannelPins,
    pub right: ChannelPins,
    pub pwm_frequency_hz: u32,
}

impl Default for MotorConfig {
    /// Wiring on the Raspberry Pi 4B header: enable on BCM 23 (pin 16),
    /// left channel on BCM 12/18 (pins 32/12), right channel on BCM 13/19
    /// (pins 33/35), 1 kHz PWM.
    fn default() -> Self {
        Self {
            enable: 23,
            left: ChannelPins {
                pwm_a: 12,
                pwm_b: 18,
            },
            right: ChannelPins {
                pwm_a: 13,
                pwm_b: 19,
            },
            pwm_frequency_hz: DEFAULT_PWM_FREQUENCY_HZ,
        }
    }
}

impl MotorConfig {
    /// Resolves a channel to its pin pair.
    pub fn channel_pins(&self, channel: Channel) -> ChannelPins {
        match channel {
            Channel::Left => self.left,
            Channel::Right => self.right,
        }
    }

    fn validate(&self) -> Result<(), Error> {
        let pins = [
            self.enable,
            self.left.pwm_a,
            self.left.pwm_b,
            self.right.pwm_a,
            self.right.pwm_b,
        ];
        for (i, pin) in pins.iter().enumerate() {
            if pins[..i].contains(pin) {
                return Err(Error::PinConflict(*pin));
            }
        }
        Ok(())
    }
}

/// Rescales a duty percentage to the 8-bit PWM range.
///
/// Truncating integer division: 50% maps to 127, not 128.
pub fn raw_pwm(duty: u8) -> u8 {
    (255 * u32::from(duty) / 100) as u8
}

/// Two-channel H-bridge driver over a [`PinController`].
///
/// Construction puts the bridge in a safe state (all PWM outputs zero,
/// enable de-asserted) so motors start stationary. Every call either issues
/// all of its pin writes or fails validation before the first one.
#[derive(Debug)]
pub struct MotorDriver<P: PinController> {
    pins: P,
    config: MotorConfig,
}

impl<P: PinController> MotorDriver<P> {
    /// Claims and configures all five output pins, then drives both
    /// channels to the coast state.
    pub fn new(mut pins: P, config: MotorConfig) -> Result<Self, Error> {
        config.validate()?;
        pins.set_output(config.enable)?;
        for channel in Channel::ALL {
            let ChannelPins { pwm_a, pwm_b } = config.channel_pins(channel);
            for pin in [pwm_a, pwm_b] {
                pins.set_output(pin)?;
                pins.set_pwm_frequency(pin, config.pwm_frequency_hz)?;
                pins.pwm_write(pin, 0)?;
            }
        }
        pins.digital_write(config.enable, Level::Low)?;
        info!("motor driver ready, both channels coasting");
        Ok(Self { pins, config })
    }

    /// Applies `operation` at `duty` percent to one channel.
    pub fn move_channel(
        &mut self,
        channel: Channel,
        duty: u8,
        operation: Operation,
    ) -> Result<(), Error> {
        let pins = self.config.channel_pins(channel);
        debug!("channel {channel:?}: {operation:?} at {duty}%");
        self.drive(pins, duty, operation)
    }

    /// Coasts both channels. Call before dropping the pin controller so the
    /// bridge is not left energized.
    pub fn stop_all(&mut self) -> Result<(), Error> {
        for channel in Channel::ALL {
            self.move_channel(channel, 0, Operation::Coast)?;
        }
        Ok(())
    }

    fn drive(&mut self, pins: ChannelPins, duty: u8, operation: Operation) -> Result<(), Error> {
        if duty > 100 {
            return Err(Error::DutyOutOfRange(duty));
        }
        let raw = raw_pwm(duty);
        let ChannelPins { pwm_a, pwm_b } = pins;
        match operation {
            Operation::Reverse => {
                self.pins.digital_write(self.config.enable, Level::High)?;
                self.pins.digital_write(pwm_a, Level::Low)?;
                self.pins.pwm_write(pwm_b, raw)?;
            }
            Operation::BrakeLow => {
                self.pins.digital_write(self.config.enable, Level::High)?;
                self.pins.digital_write(pwm_a, Level::Low)?;
                self.pins.digital_write(pwm_b, Level::Low)?;
            }
            Operation::Coast => {
                self.pins.digital_write(self.config.enable, Level::Low)?;
                self.pins.digital_write(pwm_a, Level::Low)?;
                self.pins.digital_write(pwm_b, Level::Low)?;
            }
            Operation::Forward => {
                self.pins.digital_write(self.config.enable, Level::High)?;
                self.pins.pwm_write(pwm_a, raw)?;
                self.pins.digital_write(pwm_b, Level::Low)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_pwm_truncates() {
        assert_eq!(raw_pwm(0), 0);
        assert_eq!(raw_pwm(50), 127);
        assert_eq!(raw_pwm(75), 191);
        assert_eq!(raw_pwm(99), 252);
        assert_eq!(raw_pwm(100), 255);
    }

    #[test]
    fn channel_parses_short_and_long_selectors() {
        assert_eq!("l".parse::<Channel>().unwrap(), Channel::Left);
        assert_eq!("left".parse::<Channel>().unwrap(), Channel::Left);
        assert_eq!("r".parse::<Channel>().unwrap(), Channel::Right);
        assert_eq!("right".parse::<Channel>().unwrap(), Channel::Right);
        assert!(matches!(
            "up".parse::<Channel>(),
            Err(Error::InvalidChannel(s)) if s == "up"
        ));
    }

    #[test]
    fn operation_codes_decode_and_reject() {
        for code in [-2, -1, 0, 1] {
            assert_eq!(Operation::from_code(code).unwrap().code(), code);
        }
        assert!(matches!(
            Operation::from_code(2),
            Err(Error::InvalidOperation(2))
        ));
        assert!(matches!(
            Operation::from_code(-3),
            Err(Error::InvalidOperation(-3))
        ));
    }

    #[test]
    fn config_rejects_overlapping_pins() {
        let mut config = MotorConfig::default();
        assert!(config.validate().is_ok());
        config.right = config.left;
        assert!(matches!(config.validate(), Err(Error::PinConflict(12))));
    }
}
