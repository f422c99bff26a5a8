// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decoded chiller replies.
//!
//! A [`ChillerReply`] keeps the raw reply text next to the decoded
//! [`ReplyBody`]. Device quirks are explicit variants: the terse `#23`
//! reply decodes to [`ReplyBody::QuirkReply`], and a non-zero error code
//! decodes to [`ReplyBody::DeviceError`]. Callers turn those into typed
//! errors with [`ChillerReply::into_result`].

use serde::{Deserialize, Serialize};

use crate::error::{DeviceError, Error, ProtocolError};
use crate::types::{AlarmBits, AlarmSublevel, ChillerControllerState, TemperatureSensor};

mod parse;

pub(crate) use parse::parse_data;

/// Contents of the watchdog reply.
///
/// # Examples
///
/// ```
/// use atwhitelight::response::WatchdogStatus;
/// use atwhitelight::types::ChillerControllerState;
///
/// let status = WatchdogStatus::parse("2100");
/// assert_eq!(status.controller_state, ChillerControllerState::Run);
/// assert!(status.pump_running);
/// assert!(!status.alarms_present);
///
/// // Garbage is read as the worst case
/// let status = WatchdogStatus::parse("2x");
/// assert_eq!(status, WatchdogStatus::WORST_CASE);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchdogStatus {
    /// Controller mode.
    pub controller_state: ChillerControllerState,
    /// Coolant pump running.
    pub pump_running: bool,
    /// At least one alarm is latched.
    pub alarms_present: bool,
    /// At least one warning is active.
    pub warnings_present: bool,
}

impl WatchdogStatus {
    /// Assumed when the watchdog reply cannot be parsed.
    pub const WORST_CASE: Self = Self {
        controller_state: ChillerControllerState::Unknown,
        pump_running: false,
        alarms_present: true,
        warnings_present: true,
    };

    /// Parses the four watchdog digits, falling back to
    /// [`WatchdogStatus::WORST_CASE`].
    #[must_use]
    pub fn parse(data: &str) -> Self {
        Self::try_parse(data).unwrap_or_else(|| {
            tracing::warn!(data = %data, "Could not parse watchdog data; assuming the worst");
            Self::WORST_CASE
        })
    }

    fn try_parse(data: &str) -> Option<Self> {
        let mut chars = data.chars();
        let controller_state = ChillerControllerState::from_digit(chars.next()?)?;
        let mut flag = || match chars.next()? {
            '0' => Some(false),
            '1' => Some(true),
            _ => None,
        };
        let pump_running = flag()?;
        let alarms_present = flag()?;
        let warnings_present = flag()?;
        Some(Self {
            controller_state,
            pump_running,
            alarms_present,
            warnings_present,
        })
    }

    /// Returns `true` if the chiller is running with its pump on.
    #[must_use]
    pub fn is_cooling(&self) -> bool {
        self.controller_state == ChillerControllerState::Run && self.pump_running
    }
}

/// TEC drive level reply.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TecDrive {
    /// Drive level in percent.
    pub level: f64,
    /// `true` when cooling, `false` when heating.
    pub is_cooling: bool,
}

/// Decoded payload of a chiller reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyBody {
    /// A set command was accepted.
    Ack,
    /// Watchdog status.
    Watchdog(WatchdogStatus),
    /// A temperature in C.
    Temperature {
        /// Which sensor.
        sensor: TemperatureSensor,
        /// Reading in C, as reported.
        celsius: f64,
    },
    /// Level-1 alarm flags. Reading them cleared them on the device.
    L1Alarms(AlarmBits),
    /// Level-2 alarm flags for one sublevel.
    L2Alarms {
        /// Which register.
        sublevel: AlarmSublevel,
        /// Flags.
        bits: AlarmBits,
    },
    /// Warning flags.
    Warnings(AlarmBits),
    /// Coolant flow rate in L/min.
    CoolantFlow(f64),
    /// A TEC bank current in A.
    TecCurrent {
        /// Bank 1 or 2.
        bank: u8,
        /// Current in A.
        amps: f64,
    },
    /// TEC drive level and mode.
    TecDrive(TecDrive),
    /// Fan speed in revolutions per second.
    FanSpeed {
        /// Fan 1-4.
        fan: u8,
        /// Speed.
        speed: f64,
    },
    /// Uptime in minutes.
    Uptime(u32),
    /// The chiller rejected the command.
    DeviceError(DeviceError),
    /// A short non-conforming reply such as `#23`.
    QuirkReply,
}

/// A decoded chiller reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ChillerReply {
    raw: String,
    command_id: Option<u8>,
    body: ReplyBody,
}

impl ChillerReply {
    /// Creates a reply.
    #[must_use]
    pub fn new(raw: impl Into<String>, command_id: Option<u8>, body: ReplyBody) -> Self {
        Self {
            raw: raw.into(),
            command_id,
            body,
        }
    }

    /// Returns the reply text without the terminator.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Returns the command ID echoed by the chiller, if the reply had one.
    #[must_use]
    pub fn command_id(&self) -> Option<u8> {
        self.command_id
    }

    /// Returns the decoded body.
    #[must_use]
    pub fn body(&self) -> &ReplyBody {
        &self.body
    }

    /// Returns `true` for the quirk reply.
    #[must_use]
    pub fn is_quirk(&self) -> bool {
        matches!(self.body, ReplyBody::QuirkReply)
    }

    /// Converts quirk and device-error replies into errors.
    ///
    /// # Errors
    ///
    /// Returns `Error::Protocol(ProtocolError::QuirkReply)` for a quirk reply
    /// and `Error::Device` for a reply carrying a non-zero error code.
    pub fn into_result(self) -> Result<ReplyBody, Error> {
        match self.body {
            ReplyBody::QuirkReply => Err(ProtocolError::QuirkReply { raw: self.raw }.into()),
            ReplyBody::DeviceError(err) => Err(err.into()),
            body => Ok(body),
        }
    }
}
