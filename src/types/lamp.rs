// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Enumerations describing the lamp controller and shutter.

use std::fmt;

use serde::{Deserialize, Serialize};

/// State reported by the lamp controller's status lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LampControllerState {
    /// Not yet read.
    Unknown,
    /// Idle.
    Off,
    /// Ready or lit.
    StandbyOrOn,
    /// The controller's own cooldown timer is running.
    Cooldown,
    /// The error line is active.
    Error,
}

impl LampControllerState {
    /// Derives the controller state from its status lines.
    ///
    /// Error takes priority, then standby-or-on, then cooldown.
    #[must_use]
    pub const fn from_lines(error_exists: bool, standby_or_on: bool, cooldown: bool) -> Self {
        if error_exists {
            Self::Error
        } else if standby_or_on {
            Self::StandbyOrOn
        } else if cooldown {
            Self::Cooldown
        } else {
            Self::Off
        }
    }
}

/// Error reported by the lamp controller as a count of blinks.
///
/// # Examples
///
/// ```
/// use atwhitelight::types::LampControllerError;
///
/// assert_eq!(LampControllerError::from_blink_count(3), LampControllerError::AccessDoor);
/// assert_eq!(LampControllerError::AccessDoor.code(), Some(3));
/// assert_eq!(LampControllerError::from_blink_count(12), LampControllerError::Unknown);
/// assert_eq!(LampControllerError::None.code(), Some(0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LampControllerError {
    /// No error.
    None,
    /// An error is present but its code is not known yet.
    Unknown,
    /// 1: emergency kill switch.
    EmergencyKillSwitch,
    /// 2: chassis overheating.
    ChassisOverheating,
    /// 3: access door open.
    AccessDoor,
    /// 4: ballast hot.
    BallastHot,
    /// 5: USB disconnected.
    UsbDisconnected,
    /// 6: inadequate airflow.
    AirflowInadequate,
    /// 7: bulb did not extinguish.
    BulbDidNotExtinguish,
    /// 8: airflow sensing circuit malfunction.
    AirflowCircuitMalfunction,
}

impl LampControllerError {
    /// Maps a decoded blink count. Counts without a meaning are
    /// [`LampControllerError::Unknown`].
    #[must_use]
    pub const fn from_blink_count(count: u32) -> Self {
        match count {
            0 => Self::None,
            1 => Self::EmergencyKillSwitch,
            2 => Self::ChassisOverheating,
            3 => Self::AccessDoor,
            4 => Self::BallastHot,
            5 => Self::UsbDisconnected,
            6 => Self::AirflowInadequate,
            7 => Self::BulbDidNotExtinguish,
            8 => Self::AirflowCircuitMalfunction,
            _ => Self::Unknown,
        }
    }

    /// Returns the blink code, `0` for none, or `None` if not yet decoded.
    #[must_use]
    pub const fn code(&self) -> Option<u8> {
        match self {
            Self::None => Some(0),
            Self::Unknown => None,
            Self::EmergencyKillSwitch => Some(1),
            Self::ChassisOverheating => Some(2),
            Self::AccessDoor => Some(3),
            Self::BallastHot => Some(4),
            Self::UsbDisconnected => Some(5),
            Self::AirflowInadequate => Some(6),
            Self::BulbDidNotExtinguish => Some(7),
            Self::AirflowCircuitMalfunction => Some(8),
        }
    }

    /// Returns `true` for anything but [`LampControllerError::None`].
    #[must_use]
    pub const fn is_error(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for LampControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::None => "no error",
            Self::Unknown => "unknown error",
            Self::EmergencyKillSwitch => "emergency kill switch",
            Self::ChassisOverheating => "chassis overheating",
            Self::AccessDoor => "access door open",
            Self::BallastHot => "ballast hot",
            Self::UsbDisconnected => "USB disconnected",
            Self::AirflowInadequate => "airflow inadequate",
            Self::BulbDidNotExtinguish => "bulb did not extinguish",
            Self::AirflowCircuitMalfunction => "airflow circuitry malfunction",
        };
        f.write_str(text)
    }
}

/// Shutter position as sensed by its two limit switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShutterState {
    /// Neither switch active: moving or lost.
    Unknown,
    /// Closed switch active.
    Closed,
    /// Open switch active.
    Open,
    /// Both switches active: a switch is broken.
    Invalid,
}

impl ShutterState {
    /// Derives the state from the closed and open limit switches.
    #[must_use]
    pub const fn from_switches(closed: bool, open: bool) -> Self {
        match (closed, open) {
            (false, false) => Self::Unknown,
            (true, false) => Self::Closed,
            (false, true) => Self::Open,
            (true, true) => Self::Invalid,
        }
    }
}

/// Requested shutter movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShutterDirection {
    /// Move toward the open switch.
    Open,
    /// Move toward the closed switch.
    Close,
}

impl ShutterDirection {
    /// Returns the limit-switch state that ends the movement.
    #[must_use]
    pub const fn target(&self) -> ShutterState {
        match self {
            Self::Open => ShutterState::Open,
            Self::Close => ShutterState::Closed,
        }
    }

    pub(crate) const fn label(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Close => "closed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controller_state_priority() {
        assert_eq!(
            LampControllerState::from_lines(true, true, true),
            LampControllerState::Error
        );
        assert_eq!(
            LampControllerState::from_lines(false, true, true),
            LampControllerState::StandbyOrOn
        );
        assert_eq!(
            LampControllerState::from_lines(false, false, true),
            LampControllerState::Cooldown
        );
        assert_eq!(
            LampControllerState::from_lines(false, false, false),
            LampControllerState::Off
        );
    }

    #[test]
    fn blink_codes_round_trip() {
        for count in 0..=8 {
            let err = LampControllerError::from_blink_count(count);
            assert_eq!(err.code().map(u32::from), Some(count));
        }
        assert!(LampControllerError::Unknown.is_error());
        assert!(!LampControllerError::None.is_error());
    }

    #[test]
    fn shutter_from_switches() {
        assert_eq!(ShutterState::from_switches(false, false), ShutterState::Unknown);
        assert_eq!(ShutterState::from_switches(true, false), ShutterState::Closed);
        assert_eq!(ShutterState::from_switches(false, true), ShutterState::Open);
        assert_eq!(ShutterState::from_switches(true, true), ShutterState::Invalid);
    }

    #[test]
    fn shutter_direction_target() {
        assert_eq!(ShutterDirection::Open.target(), ShutterState::Open);
        assert_eq!(ShutterDirection::Close.target(), ShutterState::Closed);
    }
}
