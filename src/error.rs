// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the white-light supervisor.
//!
//! The hierarchy follows the layers of the system: value validation,
//! the byte transport to the chiller, the chiller wire protocol, errors
//! reported by the chiller itself, the lamp I/O module, and the local
//! safety policy enforced by the lamp lifecycle.

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// A value failed validation.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// The byte transport to the chiller failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A chiller reply could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The chiller rejected a command.
    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    /// The lamp I/O module failed.
    #[error("I/O channel error: {0}")]
    IoChannel(#[from] IoChannelError),

    /// The configuration is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A request was refused by the local safety policy.
    ///
    /// No hardware state is changed when this is returned.
    #[error("safety violation: {0}")]
    SafetyViolation(String),

    /// The lamp failed to ignite after every permitted attempt.
    #[error("lamp failed to ignite after {attempts} attempts")]
    IgnitionFailure {
        /// Number of ignition attempts made.
        attempts: u32,
    },

    /// The observed hardware state disagrees with the commanded state.
    #[error("unexpected state mismatch: {0}")]
    StateMismatch(String),
}

impl Error {
    /// Returns `true` if the error came from the chiller link rather than
    /// from the device or local policy.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Errors related to value validation and constraints.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValueError {
    /// Lamp power is neither zero nor within the supported band.
    #[error("lamp power {watts} W must be 0 or in range [{min}, {max}] W")]
    PowerOutOfRange {
        /// Minimum non-zero power.
        min: f64,
        /// Maximum power.
        max: f64,
        /// The power that was requested.
        watts: f64,
    },

    /// A value does not fit the fixed-width command field.
    #[error("value {value} does not fit in {width} characters at scale {scale}")]
    FieldOverflow {
        /// The value that was provided.
        value: f64,
        /// Multiplier applied before formatting.
        scale: f64,
        /// Width of the command field.
        width: usize,
    },

    /// A negative value was given for an unsigned field.
    #[error("value {0} must not be negative")]
    Negative(f64),

    /// A value that must be strictly positive was not.
    #[error("value {0} must be positive")]
    NotPositive(f64),

    /// A temperature is outside the permitted band.
    #[error("temperature {value} C is out of range [{min}, {max}] C")]
    TemperatureOutOfRange {
        /// Lower bound (inclusive).
        min: f64,
        /// Upper bound (inclusive).
        max: f64,
        /// The temperature that was provided.
        value: f64,
    },

    /// A fan number is not in `1..=4`.
    #[error("fan number {0} must be in range [1, 4]")]
    InvalidFan(u8),

    /// A chiller command body has an invalid length.
    #[error("command body {0:?} must be 10 to 18 characters")]
    CommandLength(String),
}

/// Errors on the byte stream to the chiller.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No reply arrived in time. The session is invalid until reset.
    #[error("no reply within {0} ms")]
    Timeout(u64),

    /// The session is not connected.
    #[error("not connected")]
    Disconnected,

    /// The session timed out earlier and must be reset before reuse.
    #[error("session invalid until reset: {0}")]
    Invalid(String),

    /// Opening the connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// A read or write failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors decoding chiller replies.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The terse non-conforming reply some firmware sends for rejected
    /// parameters, e.g. `#23`.
    #[error("quirk reply {raw:?}")]
    QuirkReply {
        /// The reply text, without the terminator.
        raw: String,
    },

    /// The reply does not start with `#`.
    #[error("reply {0:?} does not start with '#'")]
    BadStart(String),

    /// The reply checksum does not match its contents.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Checksum computed from the reply.
        expected: String,
        /// Checksum carried by the reply.
        actual: String,
    },

    /// The reply contains non-ASCII bytes.
    #[error("reply contains non-ASCII bytes")]
    NonAscii,

    /// A reply field could not be parsed.
    #[error("failed to parse {field}: {message}")]
    InvalidValue {
        /// The field that failed to parse.
        field: String,
        /// Description of the failure.
        message: String,
    },

    /// The reply does not belong to the command that was sent.
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),
}

impl ProtocolError {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Errors reported by the chiller in the reply error-code field.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    /// Code 1: the chiller computed a different checksum.
    #[error("chiller reported a checksum error")]
    ChecksumRejected,

    /// Code 2: unknown command name.
    #[error("chiller reported an invalid command")]
    InvalidCommand,

    /// Code 3: a command parameter is outside the hardware range.
    #[error("chiller reported a parameter out of range")]
    ParameterOutOfRange,

    /// Code 4: the message length is wrong.
    #[error("chiller reported an invalid message length")]
    InvalidLength,

    /// Code 5: the sensor or feature is not configured.
    #[error("chiller reported the sensor or feature is not configured")]
    NotConfigured,

    /// Any other non-zero code.
    #[error("chiller reported unrecognized error code {0:?}")]
    Unrecognized(char),
}

impl DeviceError {
    /// Maps a reply error-code character, or `None` for `'0'`.
    #[must_use]
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            '0' => None,
            '1' => Some(Self::ChecksumRejected),
            '2' => Some(Self::InvalidCommand),
            '3' => Some(Self::ParameterOutOfRange),
            '4' => Some(Self::InvalidLength),
            '5' => Some(Self::NotConfigured),
            other => Some(Self::Unrecognized(other)),
        }
    }
}

/// Errors from the lamp I/O module.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IoChannelError {
    /// The module is not connected.
    #[error("I/O module is not connected")]
    NotConnected,

    /// A read or write of a named line failed.
    #[error("{channel}: {message}")]
    Line {
        /// Hardware name of the line, e.g. `DAC0`.
        channel: &'static str,
        /// Description of the failure.
        message: String,
    },

    /// The shutter did not reach its limit switch in time.
    #[error("shutter did not reach the {target} position within {timeout_ms} ms")]
    ShutterTimeout {
        /// Requested position.
        target: &'static str,
        /// The timeout that elapsed.
        timeout_ms: u64,
    },
}

/// Errors in the configuration document.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document is not valid JSON for the schema.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A field has an invalid value.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_error_display() {
        let err = ValueError::PowerOutOfRange {
            min: 800.0,
            max: 1200.0,
            watts: 500.0,
        };
        assert_eq!(
            err.to_string(),
            "lamp power 500 W must be 0 or in range [800, 1200] W"
        );
    }

    #[test]
    fn error_from_protocol_error() {
        let err: Error = ProtocolError::QuirkReply {
            raw: "#23".to_string(),
        }
        .into();
        assert!(matches!(err, Error::Protocol(ProtocolError::QuirkReply { .. })));
        assert_eq!(err.to_string(), "protocol error: quirk reply \"#23\"");
    }

    #[test]
    fn device_error_codes() {
        assert_eq!(DeviceError::from_code('0'), None);
        assert_eq!(
            DeviceError::from_code('3'),
            Some(DeviceError::ParameterOutOfRange)
        );
        assert_eq!(
            DeviceError::from_code('9'),
            Some(DeviceError::Unrecognized('9'))
        );
    }

    #[test]
    fn transport_error_display() {
        let err = TransportError::Timeout(2000);
        assert_eq!(err.to_string(), "no reply within 2000 ms");
        assert!(Error::from(err).is_transport());
    }

    #[test]
    fn safety_violation_display() {
        let err = Error::SafetyViolation("lamp is on".to_string());
        assert_eq!(err.to_string(), "safety violation: lamp is on");
    }
}
