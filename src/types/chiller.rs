// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Enumerations describing the chiller.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Controller state reported in the chiller watchdog reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChillerControllerState {
    /// Power-up sequence.
    Autostart,
    /// Not cooling.
    Standby,
    /// Cooling.
    Run,
    /// Tripped into safety mode.
    Safety,
    /// Factory test mode.
    Test,
    /// The watchdog reply could not be interpreted.
    Unknown,
}

impl ChillerControllerState {
    /// Maps the watchdog state digit.
    #[must_use]
    pub fn from_digit(digit: char) -> Option<Self> {
        match digit {
            '0' => Some(Self::Autostart),
            '1' => Some(Self::Standby),
            '2' => Some(Self::Run),
            '3' => Some(Self::Safety),
            '4' => Some(Self::Test),
            _ => None,
        }
    }

    /// Returns the watchdog state digit, or `None` for [`Self::Unknown`].
    #[must_use]
    pub const fn digit(&self) -> Option<char> {
        match self {
            Self::Autostart => Some('0'),
            Self::Standby => Some('1'),
            Self::Run => Some('2'),
            Self::Safety => Some('3'),
            Self::Test => Some('4'),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for ChillerControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Autostart => "AUTOSTART",
            Self::Standby => "STANDBY",
            Self::Run => "RUN",
            Self::Safety => "SAFETY",
            Self::Test => "TEST",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// Requested chiller mode for the set-status command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChillerRunState {
    /// Stop cooling (`0`).
    Standby,
    /// Start cooling (`1`).
    Run,
}

impl ChillerRunState {
    /// Returns the command data character.
    #[must_use]
    pub const fn code(&self) -> char {
        match self {
            Self::Standby => '0',
            Self::Run => '1',
        }
    }
}

/// Sensor the chiller regulates against.
///
/// The fitted unit only supports [`ControlSensor::Supply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlSensor {
    /// Coolant supply line.
    Supply,
    /// Coolant return line.
    Return,
    /// Ambient air.
    Ambient,
}

impl ControlSensor {
    /// Returns the command data character.
    #[must_use]
    pub const fn code(&self) -> char {
        match self {
            Self::Supply => '0',
            Self::Return => '1',
            Self::Ambient => '2',
        }
    }
}

/// Temperature readings available from the chiller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemperatureSensor {
    /// Commanded set point.
    SetPoint,
    /// Coolant supply.
    Supply,
    /// Coolant return.
    ///
    /// This sensor is known to read incorrectly; values are reported raw.
    Return,
    /// Ambient air.
    Ambient,
}

impl TemperatureSensor {
    /// Returns `true` if readings from this sensor are known to be wrong.
    #[must_use]
    pub const fn is_unreliable(&self) -> bool {
        matches!(self, Self::Return)
    }
}

/// Quantities for which alarm and warning thresholds can be set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThresholdKind {
    /// Supply temperature upper limit (C).
    HighSupplyTemperature,
    /// Supply temperature lower limit (C).
    LowSupplyTemperature,
    /// Ambient temperature upper limit (C).
    HighAmbientTemperature,
    /// Ambient temperature lower limit (C).
    LowAmbientTemperature,
    /// Coolant flow lower limit (L/min). Must be positive.
    LowCoolantFlowRate,
}

impl ThresholdKind {
    /// Every threshold, in the order they are configured.
    pub const ALL: [Self; 5] = [
        Self::HighSupplyTemperature,
        Self::LowSupplyTemperature,
        Self::HighAmbientTemperature,
        Self::LowAmbientTemperature,
        Self::LowCoolantFlowRate,
    ];
}

/// Whether a threshold raises an alarm or only a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThresholdLevel {
    /// Publish a warning.
    Warning,
    /// Raise an alarm.
    Alarm,
}

/// Level-2 alarm register sublevel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlarmSublevel {
    /// Sublevel 1.
    One,
    /// Sublevel 2.
    Two,
}

impl AlarmSublevel {
    /// Returns the command data character.
    #[must_use]
    pub const fn code(&self) -> char {
        match self {
            Self::One => '1',
            Self::Two => '2',
        }
    }

    /// Maps a reply data character.
    #[must_use]
    pub const fn from_code(code: char) -> Option<Self> {
        match code {
            '1' => Some(Self::One),
            '2' => Some(Self::Two),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controller_state_digits() {
        for digit in ['0', '1', '2', '3', '4'] {
            let state = ChillerControllerState::from_digit(digit).unwrap();
            assert_eq!(state.digit(), Some(digit));
        }
        assert_eq!(ChillerControllerState::from_digit('7'), None);
        assert_eq!(ChillerControllerState::Unknown.digit(), None);
    }

    #[test]
    fn controller_state_display() {
        assert_eq!(ChillerControllerState::Run.to_string(), "RUN");
    }

    #[test]
    fn only_return_temperature_is_unreliable() {
        assert!(TemperatureSensor::Return.is_unreliable());
        assert!(!TemperatureSensor::Supply.is_unreliable());
    }

    #[test]
    fn sublevel_codes() {
        assert_eq!(AlarmSublevel::from_code('2'), Some(AlarmSublevel::Two));
        assert_eq!(AlarmSublevel::from_code('3'), None);
        assert_eq!(AlarmSublevel::One.code(), '1');
    }
}
