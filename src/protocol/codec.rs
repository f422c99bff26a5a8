// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Frame encoding and decoding for the chiller protocol.
//!
//! Command frame: `.` device-id(2) command-id(2) name(8) data(0-8)
//! checksum(2) `\r`.
//!
//! Reply frame: `#` device-id(2) command-id(2) error-code(1) name(8) data
//! checksum(2) `\r`.
//!
//! The checksum is the low byte of the sum of every preceding character,
//! written as two lower-case hex digits. Replies are accepted in either
//! case.

use crate::command::ChillerCommand;
use crate::error::{DeviceError, ProtocolError, ValueError};
use crate::response::{ChillerReply, ReplyBody, parse_data};

/// Start of a command frame.
pub const COMMAND_START: char = '.';

/// Start of a reply frame.
pub const REPLY_START: char = '#';

/// Frame terminator.
pub const TERMINATOR: u8 = b'\r';

/// Device ID used by the chiller unless configured otherwise.
pub const DEFAULT_DEVICE_ID: &str = "01";

/// Length of a reply header: start, device ID, command ID, error code, name.
const REPLY_HEADER_LEN: usize = 14;

/// Length of the checksum field.
const CHECKSUM_LEN: usize = 2;

/// Computes the frame checksum of `text`.
///
/// # Examples
///
/// ```
/// use atwhitelight::protocol::checksum;
///
/// assert_eq!(checksum(".0101WatchDog"), "01");
/// ```
#[must_use]
pub fn checksum(text: &str) -> String {
    let total = text.bytes().fold(0u8, u8::wrapping_add);
    format!("{total:02x}")
}

/// Encodes a command into a complete frame.
///
/// # Errors
///
/// Returns `ValueError` if the command data is invalid.
///
/// # Examples
///
/// ```
/// use atwhitelight::command::ChillerCommand;
/// use atwhitelight::protocol::encode;
///
/// let frame = encode(&ChillerCommand::Watchdog, "01").unwrap();
/// assert_eq!(frame, b".0101WatchDog01\r");
/// ```
pub fn encode(command: &ChillerCommand, device_id: &str) -> Result<Vec<u8>, ValueError> {
    let start = format!("{COMMAND_START}{device_id}{}", command.body()?);
    let mut frame = format!("{start}{}", checksum(&start)).into_bytes();
    frame.push(TERMINATOR);
    Ok(frame)
}

/// Decodes a reply frame.
///
/// A `#`-prefixed reply shorter than a full header decodes to
/// [`ReplyBody::QuirkReply`] and a non-zero error code decodes to
/// [`ReplyBody::DeviceError`]; neither is an `Err` at this level.
///
/// # Errors
///
/// Returns `ProtocolError` if the bytes are not ASCII, the frame does not
/// start with `#`, the checksum is wrong, or the data cannot be parsed.
///
/// # Examples
///
/// ```
/// use atwhitelight::protocol::decode;
/// use atwhitelight::response::ReplyBody;
///
/// let reply = decode(b"#23\r").unwrap();
/// assert_eq!(reply.body(), &ReplyBody::QuirkReply);
/// ```
pub fn decode(bytes: &[u8]) -> Result<ChillerReply, ProtocolError> {
    if !bytes.is_ascii() {
        return Err(ProtocolError::NonAscii);
    }
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim_end_matches(char::from(TERMINATOR));

    if !text.starts_with(REPLY_START) {
        return Err(ProtocolError::BadStart(text.to_string()));
    }
    if text.len() < REPLY_HEADER_LEN + CHECKSUM_LEN {
        tracing::warn!(reply = %text, "Chiller sent a quirk reply");
        return Ok(ChillerReply::new(text, None, ReplyBody::QuirkReply));
    }

    let (content, carried) = text.split_at(text.len() - CHECKSUM_LEN);
    let expected = checksum(content);
    if !carried.eq_ignore_ascii_case(&expected) {
        return Err(ProtocolError::ChecksumMismatch {
            expected,
            actual: carried.to_string(),
        });
    }

    let command_id: u8 = content[3..5].parse().map_err(|_| {
        ProtocolError::invalid("command ID", format!("{:?} is not a number", &content[3..5]))
    })?;
    let error_code = content[5..6].chars().next().unwrap_or('0');
    let body = match DeviceError::from_code(error_code) {
        Some(err) => ReplyBody::DeviceError(err),
        None => parse_data(command_id, &content[REPLY_HEADER_LEN..])?,
    };
    Ok(ChillerReply::new(content, Some(command_id), body))
}

/// Builds a reply frame the way the chiller does.
///
/// Used by simulators and tests.
#[must_use]
pub fn encode_reply(
    device_id: &str,
    command_id: u8,
    error_code: char,
    name: &str,
    data: &str,
) -> Vec<u8> {
    let content = format!("{REPLY_START}{device_id}{command_id:02}{error_code}{name}{data}");
    let mut frame = format!("{content}{}", checksum(&content)).into_bytes();
    frame.push(TERMINATOR);
    frame
}
