// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lamp I/O module lines.
//!
//! The lamp controller and the shutter are wired to a multi-function I/O
//! module. [`IoChannel`] is the seam to that hardware: the vendor driver
//! implements it in deployment and [`MemoryIoChannel`] implements it in
//! tests and simulation.
//!
//! | Line | Hardware | Meaning |
//! |------|----------|---------|
//! | [`AnalogInput::Photosensor`] | `AIN0` | photosensor voltage |
//! | [`AnalogOutput::LampPower`] | `DAC0` | lamp power setpoint |
//! | [`DigitalInput::BlinkingError`] | `FIO4` | controller: error code, blinking |
//! | [`DigitalInput::Cooldown`] | `FIO5` | controller: cooling down |
//! | [`DigitalInput::StandbyOrOn`] | `FIO6` | controller: standby or on |
//! | [`DigitalInput::ErrorExists`] | `FIO7` | controller: error present |
//! | [`DigitalInput::ShutterOpen`] | `EIO4` | shutter open limit switch |
//! | [`DigitalInput::ShutterClosed`] | `EIO6` | shutter closed limit switch |
//! | [`DigitalOutput::ShutterDirection`] | `EIO2` | low = open, high = close |
//! | [`DigitalOutput::ShutterEnable`] | `EIO3` | low = motor enabled |

mod memory;

pub use memory::{IoWrite, MemoryIoChannel};

use crate::error::IoChannelError;

/// Analog input lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalogInput {
    /// Photosensor watching the lamp.
    Photosensor,
}

/// Analog output lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalogOutput {
    /// Lamp power setpoint, 0-5 V.
    LampPower,
}

/// Digital input lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigitalInput {
    /// Lamp controller error signal; blinks the error code.
    BlinkingError,
    /// Lamp controller reports cooldown.
    Cooldown,
    /// Lamp controller reports standby or on.
    StandbyOrOn,
    /// Lamp controller reports an error.
    ErrorExists,
    /// Shutter open limit switch.
    ShutterOpen,
    /// Shutter closed limit switch.
    ShutterClosed,
}

/// Digital output lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigitalOutput {
    /// Shutter motor direction.
    ShutterDirection,
    /// Shutter motor enable.
    ShutterEnable,
}

impl AnalogInput {
    /// Returns the hardware line name.
    #[must_use]
    pub const fn hardware_name(self) -> &'static str {
        match self {
            Self::Photosensor => "AIN0",
        }
    }
}

impl AnalogOutput {
    /// Returns the hardware line name.
    #[must_use]
    pub const fn hardware_name(self) -> &'static str {
        match self {
            Self::LampPower => "DAC0",
        }
    }
}

impl DigitalInput {
    /// Returns the hardware line name.
    #[must_use]
    pub const fn hardware_name(self) -> &'static str {
        match self {
            Self::BlinkingError => "FIO4",
            Self::Cooldown => "FIO5",
            Self::StandbyOrOn => "FIO6",
            Self::ErrorExists => "FIO7",
            Self::ShutterOpen => "EIO4",
            Self::ShutterClosed => "EIO6",
        }
    }
}

impl DigitalOutput {
    /// Returns the hardware line name.
    #[must_use]
    pub const fn hardware_name(self) -> &'static str {
        match self {
            Self::ShutterDirection => "EIO2",
            Self::ShutterEnable => "EIO3",
        }
    }
}

/// Access to the lamp I/O module.
///
/// Implementations are blocking-free: each call is a single register read
/// or write. Logic levels are raw; `true` is high.
pub trait IoChannel: Send {
    /// Reads an analog input in volts.
    ///
    /// # Errors
    ///
    /// Returns `IoChannelError` if the module cannot be read.
    fn read_analog(&mut self, line: AnalogInput) -> Result<f64, IoChannelError>;

    /// Reads back the voltage an analog output is driving.
    ///
    /// # Errors
    ///
    /// Returns `IoChannelError` if the module cannot be read.
    fn read_analog_output(&mut self, line: AnalogOutput) -> Result<f64, IoChannelError>;

    /// Drives an analog output to `volts`.
    ///
    /// # Errors
    ///
    /// Returns `IoChannelError` if the module cannot be written.
    fn write_analog(&mut self, line: AnalogOutput, volts: f64) -> Result<(), IoChannelError>;

    /// Reads a digital input level.
    ///
    /// # Errors
    ///
    /// Returns `IoChannelError` if the module cannot be read.
    fn read_digital(&mut self, line: DigitalInput) -> Result<bool, IoChannelError>;

    /// Drives a digital output level.
    ///
    /// # Errors
    ///
    /// Returns `IoChannelError` if the module cannot be written.
    fn write_digital(&mut self, line: DigitalOutput, high: bool) -> Result<(), IoChannelError>;
}

impl<T: IoChannel + ?Sized> IoChannel for Box<T> {
    fn read_analog(&mut self, line: AnalogInput) -> Result<f64, IoChannelError> {
        (**self).read_analog(line)
    }

    fn read_analog_output(&mut self, line: AnalogOutput) -> Result<f64, IoChannelError> {
        (**self).read_analog_output(line)
    }

    fn write_analog(&mut self, line: AnalogOutput, volts: f64) -> Result<(), IoChannelError> {
        (**self).write_analog(line, volts)
    }

    fn read_digital(&mut self, line: DigitalInput) -> Result<bool, IoChannelError> {
        (**self).read_digital(line)
    }

    fn write_digital(&mut self, line: DigitalOutput, high: bool) -> Result<(), IoChannelError> {
        (**self).write_digital(line, high)
    }
}
