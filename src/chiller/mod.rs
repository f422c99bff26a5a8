// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed chiller operations.
//!
//! [`ChillerClient`] wraps a [`ChillerSession`] and turns each command into
//! a typed call. Quirk and device-error replies become errors, and a reply
//! of the wrong kind is a protocol error.
//!
//! # Examples
//!
//! ```no_run
//! use atwhitelight::chiller::ChillerClient;
//! use atwhitelight::config::ChillerConfig;
//! use atwhitelight::types::ChillerRunState;
//!
//! # async fn example() -> atwhitelight::Result<()> {
//! let config = ChillerConfig::new("192.168.1.40", 4001);
//! let mut chiller = ChillerClient::connect(&config).await?;
//!
//! chiller.configure(&config).await?;
//! chiller.set_status(ChillerRunState::Run).await?;
//!
//! let status = chiller.watchdog().await?;
//! println!("cooling: {}", status.is_cooling());
//! # Ok(())
//! # }
//! ```

mod alarm;
mod telemetry;

pub use alarm::{AlarmTracker, ChillerAlarmSnapshot};
pub use telemetry::{ChillerTelemetry, ChillerTemperatures, TemperatureReading};

use chrono::Utc;

use crate::command::{ChillerCommand, FAN_COUNT, TecBank};
use crate::config::ChillerConfig;
use crate::error::{Error, ProtocolError, Result, TransportError};
use crate::protocol::ChillerSession;
use crate::response::{ReplyBody, TecDrive, WatchdogStatus};
use crate::types::{
    AlarmBits, AlarmSublevel, ChillerRunState, ControlSensor, TemperatureSensor, ThresholdKind,
    ThresholdLevel,
};

/// Typed access to the chiller.
#[derive(Debug)]
pub struct ChillerClient {
    session: ChillerSession,
    set_temperature: Option<f64>,
}

impl ChillerClient {
    /// Connects to the configured chiller.
    ///
    /// # Errors
    ///
    /// Returns `Error::Transport` if the connection cannot be opened.
    pub async fn connect(config: &ChillerConfig) -> Result<Self> {
        Ok(Self::new(ChillerSession::connect(config).await?))
    }

    /// Wraps an existing session.
    #[must_use]
    pub fn new(session: ChillerSession) -> Self {
        Self {
            session,
            set_temperature: None,
        }
    }

    /// Returns the session.
    #[must_use]
    pub fn session(&self) -> &ChillerSession {
        &self.session
    }

    /// Returns `true` if commands may be sent.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// Returns the last control temperature accepted by the chiller.
    #[must_use]
    pub fn set_temperature(&self) -> Option<f64> {
        self.set_temperature
    }

    /// Redials the chiller.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::ConnectionFailed` if the connection cannot
    /// be opened.
    pub async fn reset(&mut self) -> std::result::Result<(), TransportError> {
        self.session.reset().await
    }

    async fn request(&mut self, command: ChillerCommand) -> Result<ReplyBody> {
        self.session.send(&command).await?.into_result()
    }

    async fn expect_ack(&mut self, command: ChillerCommand) -> Result<()> {
        match self.request(command).await? {
            ReplyBody::Ack => Ok(()),
            other => Err(unexpected(command, &other)),
        }
    }

    /// Reads the watchdog status.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn watchdog(&mut self) -> Result<WatchdogStatus> {
        match self.request(ChillerCommand::Watchdog).await? {
            ReplyBody::Watchdog(status) => Ok(status),
            other => Err(unexpected(ChillerCommand::Watchdog, &other)),
        }
    }

    /// Reads a temperature in C.
    ///
    /// The return temperature sensor is known to read incorrectly; use
    /// [`TemperatureSensor::is_unreliable`] before relying on it.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn read_temperature(&mut self, sensor: TemperatureSensor) -> Result<f64> {
        let command = ChillerCommand::ReadTemperature(sensor);
        match self.request(command).await? {
            ReplyBody::Temperature { celsius, .. } => Ok(celsius),
            other => Err(unexpected(command, &other)),
        }
    }

    /// Reads the coolant flow rate in L/min.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn read_coolant_flow(&mut self) -> Result<f64> {
        match self.request(ChillerCommand::ReadCoolantFlow).await? {
            ReplyBody::CoolantFlow(rate) => Ok(rate),
            other => Err(unexpected(ChillerCommand::ReadCoolantFlow, &other)),
        }
    }

    /// Reads a TEC bank current in A.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn read_tec_current(&mut self, bank: TecBank) -> Result<f64> {
        let command = ChillerCommand::ReadTecCurrent(bank);
        match self.request(command).await? {
            ReplyBody::TecCurrent { amps, .. } => Ok(amps),
            other => Err(unexpected(command, &other)),
        }
    }

    /// Reads the TEC drive level and mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn read_tec_drive(&mut self) -> Result<TecDrive> {
        match self.request(ChillerCommand::ReadTecDriveLevel).await? {
            ReplyBody::TecDrive(drive) => Ok(drive),
            other => Err(unexpected(ChillerCommand::ReadTecDriveLevel, &other)),
        }
    }

    /// Reads the level-1 alarms.
    ///
    /// The chiller clears its level-1 alarms when they are read, so the
    /// returned bits are the only record of them.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn read_l1_alarms(&mut self) -> Result<AlarmBits> {
        match self.request(ChillerCommand::ReadL1Alarms).await? {
            ReplyBody::L1Alarms(bits) => Ok(bits),
            other => Err(unexpected(ChillerCommand::ReadL1Alarms, &other)),
        }
    }

    /// Reads a level-2 alarm register.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or the reply is for the other
    /// register.
    pub async fn read_l2_alarms(&mut self, sublevel: AlarmSublevel) -> Result<AlarmBits> {
        let command = ChillerCommand::ReadL2Alarms(sublevel);
        match self.request(command).await? {
            ReplyBody::L2Alarms {
                sublevel: got,
                bits,
            } if got == sublevel => Ok(bits),
            other => Err(unexpected(command, &other)),
        }
    }

    /// Reads the warnings.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn read_warnings(&mut self) -> Result<AlarmBits> {
        match self.request(ChillerCommand::ReadWarnings).await? {
            ReplyBody::Warnings(bits) => Ok(bits),
            other => Err(unexpected(ChillerCommand::ReadWarnings, &other)),
        }
    }

    /// Reads the uptime in minutes.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn read_uptime(&mut self) -> Result<u32> {
        match self.request(ChillerCommand::ReadUptime).await? {
            ReplyBody::Uptime(minutes) => Ok(minutes),
            other => Err(unexpected(ChillerCommand::ReadUptime, &other)),
        }
    }

    /// Reads a fan speed (fan 1-4) in revolutions per second.
    ///
    /// # Errors
    ///
    /// Returns `Error::Value` for a fan outside 1-4, or an error if the
    /// command fails.
    pub async fn read_fan_speed(&mut self, fan: u8) -> Result<f64> {
        let command = ChillerCommand::ReadFanSpeed(fan);
        match self.request(command).await? {
            ReplyBody::FanSpeed { speed, .. } => Ok(speed),
            other => Err(unexpected(command, &other)),
        }
    }

    /// Switches the chiller between standby and run.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn set_status(&mut self, state: ChillerRunState) -> Result<()> {
        tracing::info!(state = ?state, "Setting chiller status");
        self.expect_ack(ChillerCommand::SetStatus(state)).await
    }

    /// Selects the control sensor.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn set_control_sensor(&mut self, sensor: ControlSensor) -> Result<()> {
        self.expect_ack(ChillerCommand::SetControlSensor(sensor)).await
    }

    /// Sets the control temperature in C.
    ///
    /// # Errors
    ///
    /// Returns `Error::Value` if the temperature does not fit the command,
    /// or an error if the command fails.
    pub async fn set_control_temperature(&mut self, celsius: f64) -> Result<()> {
        self.expect_ack(ChillerCommand::SetControlTemperature(celsius))
            .await?;
        tracing::info!(celsius, "Chiller control temperature set");
        self.set_temperature = Some(celsius);
        Ok(())
    }

    /// Sets one alarm or warning threshold.
    ///
    /// # Errors
    ///
    /// Returns `Error::Value` if the value does not fit the command or a
    /// flow threshold is not positive, or an error if the command fails.
    pub async fn set_threshold(
        &mut self,
        level: ThresholdLevel,
        kind: ThresholdKind,
        value: f64,
    ) -> Result<()> {
        tracing::debug!(level = ?level, kind = ?kind, value, "Setting chiller threshold");
        self.expect_ack(ChillerCommand::SetThreshold { level, kind, value })
            .await
    }

    /// Sends the configured control temperature, then every alarm
    /// threshold, then every warning threshold.
    ///
    /// # Errors
    ///
    /// Stops at the first failing command and returns its error.
    pub async fn configure(&mut self, config: &ChillerConfig) -> Result<()> {
        tracing::info!(
            initial_temperature = config.initial_temperature,
            "Configuring chiller"
        );
        self.set_control_temperature(config.initial_temperature)
            .await?;
        for level in [ThresholdLevel::Alarm, ThresholdLevel::Warning] {
            for kind in ThresholdKind::ALL {
                self.set_threshold(level, kind, config.threshold(level, kind))
                    .await?;
            }
        }
        Ok(())
    }

    async fn read_reading(&mut self, sensor: TemperatureSensor) -> Result<TemperatureReading> {
        let celsius = self.read_temperature(sensor).await?;
        Ok(TemperatureReading::new(sensor, celsius))
    }

    /// Reads every telemetry value.
    ///
    /// # Errors
    ///
    /// Stops at the first failing read and returns its error.
    pub async fn read_telemetry(&mut self) -> Result<ChillerTelemetry> {
        let temperatures = ChillerTemperatures {
            set_point: self.read_reading(TemperatureSensor::SetPoint).await?,
            supply: self.read_reading(TemperatureSensor::Supply).await?,
            return_coolant: self.read_reading(TemperatureSensor::Return).await?,
            ambient: self.read_reading(TemperatureSensor::Ambient).await?,
        };

        let coolant_flow = self.read_coolant_flow().await?;
        let mut fan_speeds = [0.0; FAN_COUNT as usize];
        for (fan, speed) in (1..=FAN_COUNT).zip(fan_speeds.iter_mut()) {
            *speed = self.read_fan_speed(fan).await?;
        }
        let tec_bank_currents = [
            self.read_tec_current(TecBank::One).await?,
            self.read_tec_current(TecBank::Two).await?,
        ];
        let tec_drive = self.read_tec_drive().await?;
        let uptime_minutes = self.read_uptime().await?;

        Ok(ChillerTelemetry {
            read_at: Utc::now(),
            temperatures,
            coolant_flow,
            fan_speeds,
            tec_bank_currents,
            tec_drive,
            uptime_minutes,
        })
    }
}

fn unexpected(command: ChillerCommand, body: &ReplyBody) -> Error {
    ProtocolError::UnexpectedReply(format!("sent {command}, got {body:?}")).into()
}
