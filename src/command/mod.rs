// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Chiller command definitions.
//!
//! Every chiller command is a two-digit command ID, an eight-character name
//! and up to eight characters of data. The codec in
//! [`protocol`](crate::protocol) adds the start character, device ID,
//! checksum and terminator.
//!
//! # Available Commands
//!
//! | Command | ID | Name | Data |
//! |---------|----|------|------|
//! | [`ChillerCommand::Watchdog`] | 01 | `WatchDog` | |
//! | [`ChillerCommand::ReadTemperature`] | 03/04/07/08 | `rSetTemp` etc. | |
//! | [`ChillerCommand::ReadCoolantFlow`] | 09 | `rProsFlo` | |
//! | [`ChillerCommand::ReadTecCurrent`] | 10/11 | `rTECB1Cr`/`rTECDrLv` | |
//! | [`ChillerCommand::ReadTecDriveLevel`] | 13 | `rTECB2Cr` | |
//! | [`ChillerCommand::SetStatus`] | 15 | `sStatus_` | `0`/`1` |
//! | [`ChillerCommand::SetControlSensor`] | 16 | `sCtrlSen` | sensor |
//! | [`ChillerCommand::SetControlTemperature`] | 17 | `sCtrlTmp` | `+dddd` |
//! | [`ChillerCommand::ReadL1Alarms`] | 18 | `rAlrmLv1` | |
//! | [`ChillerCommand::ReadL2Alarms`] | 19 | `rAlrmLv2` | sublevel |
//! | [`ChillerCommand::ReadWarnings`] | 20 | `rWarnLv1` | |
//! | [`ChillerCommand::SetThreshold`] | 21-30 | `sHiSpTWn` etc. | `+dddd` |
//! | [`ChillerCommand::ReadUptime`] | 49 | `rUpTime_` | |
//! | [`ChillerCommand::ReadFanSpeed`] | 50-53 | `rFanSpd1`-`4` | |
//!
//! The TEC bank 2 current and drive level commands carry each other's
//! names; the device firmware expects it that way.
//!
//! # Examples
//!
//! ```
//! use atwhitelight::command::ChillerCommand;
//! use atwhitelight::types::ChillerRunState;
//!
//! let cmd = ChillerCommand::SetStatus(ChillerRunState::Run);
//! assert_eq!(cmd.body().unwrap(), "15sStatus_1");
//! assert!(cmd.is_mutating());
//!
//! let cmd = ChillerCommand::SetControlTemperature(20.0);
//! assert_eq!(cmd.body().unwrap(), "17sCtrlTmp+0200");
//!
//! // Reading level-1 alarms clears them on the device
//! assert!(ChillerCommand::ReadL1Alarms.is_mutating());
//! assert!(!ChillerCommand::ReadWarnings.is_mutating());
//! ```

use std::fmt;

use crate::error::ValueError;
use crate::types::{
    AlarmSublevel, ChillerRunState, ControlSensor, TENTHS, TemperatureSensor, ThresholdKind,
    ThresholdLevel, format_command_value,
};

/// Number of fans reported by the chiller.
pub const FAN_COUNT: u8 = 4;

/// Thermo-electric cooler bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TecBank {
    /// Bank 1.
    One,
    /// Bank 2.
    Two,
}

/// A command that can be sent to the chiller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChillerCommand {
    /// Read controller state, pump state and alarm/warning presence.
    Watchdog,
    /// Read a temperature.
    ReadTemperature(TemperatureSensor),
    /// Read the coolant flow rate.
    ReadCoolantFlow,
    /// Read a TEC bank current.
    ReadTecCurrent(TecBank),
    /// Read the TEC drive level and mode.
    ReadTecDriveLevel,
    /// Switch between standby and run.
    SetStatus(ChillerRunState),
    /// Select the control sensor.
    SetControlSensor(ControlSensor),
    /// Set the control temperature (C).
    SetControlTemperature(f64),
    /// Read level-1 alarms.
    ///
    /// This clears the latched level-1 alarms on the device.
    ReadL1Alarms,
    /// Read a level-2 alarm register.
    ReadL2Alarms(AlarmSublevel),
    /// Read warnings.
    ReadWarnings,
    /// Set an alarm or warning threshold (C or L/min).
    SetThreshold {
        /// Alarm or warning.
        level: ThresholdLevel,
        /// Quantity being limited.
        kind: ThresholdKind,
        /// Threshold value.
        value: f64,
    },
    /// Read the uptime in minutes.
    ReadUptime,
    /// Read a fan speed (fan 1-4).
    ReadFanSpeed(u8),
}

impl ChillerCommand {
    /// Returns the two-digit command ID.
    #[must_use]
    pub fn id(&self) -> u8 {
        match self {
            Self::Watchdog => 1,
            Self::ReadTemperature(sensor) => match sensor {
                TemperatureSensor::SetPoint => 3,
                TemperatureSensor::Supply => 4,
                TemperatureSensor::Return => 7,
                TemperatureSensor::Ambient => 8,
            },
            Self::ReadCoolantFlow => 9,
            Self::ReadTecCurrent(TecBank::One) => 10,
            Self::ReadTecCurrent(TecBank::Two) => 11,
            Self::ReadTecDriveLevel => 13,
            Self::SetStatus(_) => 15,
            Self::SetControlSensor(_) => 16,
            Self::SetControlTemperature(_) => 17,
            Self::ReadL1Alarms => 18,
            Self::ReadL2Alarms(_) => 19,
            Self::ReadWarnings => 20,
            Self::SetThreshold { level, kind, .. } => threshold_id(*level, *kind),
            Self::ReadUptime => 49,
            Self::ReadFanSpeed(fan) => 49u8.saturating_add(*fan),
        }
    }

    /// Returns the eight-character command name.
    #[must_use]
    pub fn name(&self) -> String {
        let name = match self {
            Self::Watchdog => "WatchDog",
            Self::ReadTemperature(sensor) => match sensor {
                TemperatureSensor::SetPoint => "rSetTemp",
                TemperatureSensor::Supply => "rSupplyT",
                TemperatureSensor::Return => "rReturnT",
                TemperatureSensor::Ambient => "rAmbTemp",
            },
            Self::ReadCoolantFlow => "rProsFlo",
            Self::ReadTecCurrent(TecBank::One) => "rTECB1Cr",
            Self::ReadTecCurrent(TecBank::Two) => "rTECDrLv",
            Self::ReadTecDriveLevel => "rTECB2Cr",
            Self::SetStatus(_) => "sStatus_",
            Self::SetControlSensor(_) => "sCtrlSen",
            Self::SetControlTemperature(_) => "sCtrlTmp",
            Self::ReadL1Alarms => "rAlrmLv1",
            Self::ReadL2Alarms(_) => "rAlrmLv2",
            Self::ReadWarnings => "rWarnLv1",
            Self::SetThreshold { level, kind, .. } => threshold_name(*level, *kind),
            Self::ReadUptime => "rUpTime_",
            Self::ReadFanSpeed(fan) => return format!("rFanSpd{fan}"),
        };
        name.to_string()
    }

    /// Returns the data field.
    ///
    /// # Errors
    ///
    /// Returns `ValueError` if a numeric parameter does not fit its field,
    /// a fan number is out of range, or a flow threshold is not positive.
    pub fn data(&self) -> Result<String, ValueError> {
        match self {
            Self::SetStatus(state) => Ok(state.code().to_string()),
            Self::SetControlSensor(sensor) => Ok(sensor.code().to_string()),
            Self::SetControlTemperature(celsius) => format_command_value(*celsius, TENTHS, 5, true),
            Self::ReadL2Alarms(sublevel) => Ok(sublevel.code().to_string()),
            Self::SetThreshold { kind, value, .. } => {
                if *kind == ThresholdKind::LowCoolantFlowRate && *value <= 0.0 {
                    return Err(ValueError::NotPositive(*value));
                }
                format_command_value(*value, TENTHS, 5, true)
            }
            Self::ReadFanSpeed(fan) => {
                if (1..=FAN_COUNT).contains(fan) {
                    Ok(String::new())
                } else {
                    Err(ValueError::InvalidFan(*fan))
                }
            }
            _ => Ok(String::new()),
        }
    }

    /// Returns ID, name and data: the part of the frame between the device
    /// ID and the checksum.
    ///
    /// # Errors
    ///
    /// Returns `ValueError` if the data is invalid or the body is not 10-18
    /// characters long.
    pub fn body(&self) -> Result<String, ValueError> {
        let body = format!("{:02}{}{}", self.id(), self.name(), self.data()?);
        if (10..=18).contains(&body.len()) {
            Ok(body)
        } else {
            Err(ValueError::CommandLength(body))
        }
    }

    /// Returns `true` if the command changes device state.
    ///
    /// Reading level-1 alarms counts: the device clears its latched
    /// level-1 alarms when they are read.
    #[must_use]
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::SetStatus(_)
                | Self::SetControlSensor(_)
                | Self::SetControlTemperature(_)
                | Self::SetThreshold { .. }
                | Self::ReadL1Alarms
        )
    }
}

impl fmt::Display for ChillerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}{}", self.id(), self.name())?;
        match self.data() {
            Ok(data) => f.write_str(&data),
            Err(_) => f.write_str("<invalid>"),
        }
    }
}

const fn threshold_id(level: ThresholdLevel, kind: ThresholdKind) -> u8 {
    match (level, kind) {
        (ThresholdLevel::Warning, ThresholdKind::HighSupplyTemperature) => 21,
        (ThresholdLevel::Warning, ThresholdKind::LowSupplyTemperature) => 22,
        (ThresholdLevel::Alarm, ThresholdKind::HighSupplyTemperature) => 26,
        (ThresholdLevel::Alarm, ThresholdKind::LowSupplyTemperature) => 27,
        (_, ThresholdKind::HighAmbientTemperature) => 28,
        (_, ThresholdKind::LowAmbientTemperature) => 29,
        (_, ThresholdKind::LowCoolantFlowRate) => 30,
    }
}

const fn threshold_name(level: ThresholdLevel, kind: ThresholdKind) -> &'static str {
    match (level, kind) {
        (ThresholdLevel::Warning, ThresholdKind::HighSupplyTemperature) => "sHiSpTWn",
        (ThresholdLevel::Warning, ThresholdKind::LowSupplyTemperature) => "sLoSpTWn",
        (ThresholdLevel::Warning, ThresholdKind::HighAmbientTemperature) => "sHiAmTWn",
        (ThresholdLevel::Warning, ThresholdKind::LowAmbientTemperature) => "sLoAmTWn",
        (ThresholdLevel::Warning, ThresholdKind::LowCoolantFlowRate) => "sLoPFlWn",
        (ThresholdLevel::Alarm, ThresholdKind::HighSupplyTemperature) => "sHiSpTAl",
        (ThresholdLevel::Alarm, ThresholdKind::LowSupplyTemperature) => "sLoSpTAl",
        (ThresholdLevel::Alarm, ThresholdKind::HighAmbientTemperature) => "sHiAmTAl",
        (ThresholdLevel::Alarm, ThresholdKind::LowAmbientTemperature) => "sLoAmTAl",
        (ThresholdLevel::Alarm, ThresholdKind::LowCoolantFlowRate) => "sLoPFlAl",
    }
}
