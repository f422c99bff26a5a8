// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lamp and shutter driver over an [`IoChannel`].

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::IoChannelError;
use crate::io::{AnalogInput, AnalogOutput, DigitalInput, DigitalOutput, IoChannel};
use crate::types::{
    ENERGIZED_THRESHOLD_VOLTS, LampControllerError, LampControllerState, LampPower,
    ShutterDirection, ShutterState, dac_code_to_volts,
};

use super::BlinkDecoder;

/// Lamp power as read back from the power output line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LampPowerReading {
    /// Power last commanded through this driver.
    pub commanded: LampPower,
    /// Power implied by the read-back voltage.
    pub measured_watts: f64,
    /// Read-back voltage.
    pub volts: f64,
    /// The output is high enough to run the lamp.
    pub energized: bool,
}

/// One sample of every lamp and shutter input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LampStatus {
    /// State from the controller status lines.
    pub controller_state: LampControllerState,
    /// Error decoded from the blinking error line.
    pub controller_error: LampControllerError,
    /// Photosensor voltage.
    pub photosensor_volts: f64,
    /// Photosensor is at or above the lit threshold.
    pub light_detected: bool,
    /// Shutter limit switches.
    pub shutter: ShutterState,
    /// Power output read-back.
    pub power: LampPowerReading,
}

impl LampStatus {
    /// Returns `true` if the controller reports any error.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.controller_state == LampControllerState::Error || self.controller_error.is_error()
    }
}

/// Drives the lamp power output and shutter, and samples their inputs.
///
/// Every operation is one short sequence of register accesses with no
/// internal retry.
///
/// # Examples
///
/// ```
/// use tokio::time::Instant;
/// use atwhitelight::io::MemoryIoChannel;
/// use atwhitelight::lamp::LampDriver;
/// use atwhitelight::types::LampPower;
///
/// let mut driver = LampDriver::new(MemoryIoChannel::new(), 1.0);
/// driver.set_power(LampPower::new(1000.0).unwrap()).unwrap();
///
/// let reading = driver.read_power().unwrap();
/// assert!(reading.energized);
/// assert!((reading.measured_watts - 1000.0).abs() < 1.0);
/// ```
#[derive(Debug)]
pub struct LampDriver<C> {
    channel: C,
    decoder: BlinkDecoder,
    commanded: LampPower,
    photosensor_threshold: f64,
}

impl<C: IoChannel> LampDriver<C> {
    /// Creates a driver. `photosensor_threshold` is the voltage at or above
    /// which the lamp counts as lit.
    #[must_use]
    pub fn new(channel: C, photosensor_threshold: f64) -> Self {
        Self {
            channel,
            decoder: BlinkDecoder::new(),
            commanded: LampPower::OFF,
            photosensor_threshold,
        }
    }

    /// Returns the underlying channel.
    #[must_use]
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Returns the power last commanded.
    #[must_use]
    pub fn commanded_power(&self) -> LampPower {
        self.commanded
    }

    /// Writes the power setpoint, quantized to the DAC.
    ///
    /// # Errors
    ///
    /// Returns `IoChannelError` if the output cannot be written. The
    /// commanded power is only updated on success.
    pub fn set_power(&mut self, power: LampPower) -> Result<(), IoChannelError> {
        let volts = dac_code_to_volts(power.dac_code());
        self.channel.write_analog(AnalogOutput::LampPower, volts)?;
        tracing::debug!(power = %power, volts, "Set lamp power");
        self.commanded = power;
        Ok(())
    }

    /// Reads back the power setpoint.
    ///
    /// # Errors
    ///
    /// Returns `IoChannelError` if the output cannot be read.
    pub fn read_power(&mut self) -> Result<LampPowerReading, IoChannelError> {
        let volts = self.channel.read_analog_output(AnalogOutput::LampPower)?;
        Ok(LampPowerReading {
            commanded: self.commanded,
            measured_watts: LampPower::watts_from_volts(volts),
            volts,
            energized: volts >= ENERGIZED_THRESHOLD_VOLTS,
        })
    }

    /// Samples every input and advances the blink decoder.
    ///
    /// # Errors
    ///
    /// Returns `IoChannelError` if any line cannot be read.
    pub fn read_status(&mut self, now: Instant) -> Result<LampStatus, IoChannelError> {
        let error_exists = self.channel.read_digital(DigitalInput::ErrorExists)?;
        let blinking = self.channel.read_digital(DigitalInput::BlinkingError)?;
        let standby_or_on = self.channel.read_digital(DigitalInput::StandbyOrOn)?;
        let cooldown = self.channel.read_digital(DigitalInput::Cooldown)?;
        let photosensor_volts = self.channel.read_analog(AnalogInput::Photosensor)?;
        let shutter = self.read_shutter()?;
        let power = self.read_power()?;

        Ok(LampStatus {
            controller_state: LampControllerState::from_lines(error_exists, standby_or_on, cooldown),
            controller_error: self.decoder.update(now, error_exists, blinking),
            photosensor_volts,
            light_detected: photosensor_volts >= self.photosensor_threshold,
            shutter,
            power,
        })
    }

    /// Reads the shutter limit switches.
    ///
    /// # Errors
    ///
    /// Returns `IoChannelError` if a switch cannot be read.
    pub fn read_shutter(&mut self) -> Result<ShutterState, IoChannelError> {
        let closed = self.channel.read_digital(DigitalInput::ShutterClosed)?;
        let open = self.channel.read_digital(DigitalInput::ShutterOpen)?;
        Ok(ShutterState::from_switches(closed, open))
    }

    /// Sets the shutter direction, then enables the motor.
    ///
    /// The motor keeps running until [`disable_shutter`](Self::disable_shutter).
    ///
    /// # Errors
    ///
    /// Returns `IoChannelError` if an output cannot be written.
    pub fn set_shutter(&mut self, direction: ShutterDirection) -> Result<(), IoChannelError> {
        // Both outputs are active low
        let high = direction == ShutterDirection::Close;
        self.channel
            .write_digital(DigitalOutput::ShutterDirection, high)?;
        self.channel.write_digital(DigitalOutput::ShutterEnable, false)?;
        tracing::debug!(target_state = direction.label(), "Shutter motor enabled");
        Ok(())
    }

    /// Disables the shutter motor.
    ///
    /// # Errors
    ///
    /// Returns `IoChannelError` if the output cannot be written.
    pub fn disable_shutter(&mut self) -> Result<(), IoChannelError> {
        self.channel.write_digital(DigitalOutput::ShutterEnable, true)
    }
}
