// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reply data parsing, keyed by command ID.

use crate::error::ProtocolError;
use crate::types::{
    AlarmBits, AlarmSublevel, L1_ALARM_DIGITS, L2_ALARM_DIGITS, TENTHS, THOUSANDTHS,
    TemperatureSensor, parse_scaled,
};

use super::{ReplyBody, TecDrive, WatchdogStatus};

/// Decodes the data field of a successful reply.
pub(crate) fn parse_data(command_id: u8, data: &str) -> Result<ReplyBody, ProtocolError> {
    let body = match command_id {
        1 => ReplyBody::Watchdog(WatchdogStatus::parse(data)),
        3 => temperature(TemperatureSensor::SetPoint, data)?,
        4 => temperature(TemperatureSensor::Supply, data)?,
        7 => temperature(TemperatureSensor::Return, data)?,
        8 => temperature(TemperatureSensor::Ambient, data)?,
        9 => ReplyBody::CoolantFlow(parse_scaled("coolant flow", data, TENTHS)?),
        10 => ReplyBody::TecCurrent {
            bank: 1,
            amps: parse_scaled("TEC bank 1 current", data, THOUSANDTHS)?,
        },
        11 => ReplyBody::TecCurrent {
            bank: 2,
            amps: parse_scaled("TEC bank 2 current", data, THOUSANDTHS)?,
        },
        13 => ReplyBody::TecDrive(tec_drive(data)?),
        15 | 16 | 17 | 21 | 22 | 26..=30 => ReplyBody::Ack,
        18 => ReplyBody::L1Alarms(alarm_bits("level-1 alarms", data, L1_ALARM_DIGITS)?),
        19 => l2_alarms(data)?,
        20 => ReplyBody::Warnings(alarm_bits("warnings", data, L2_ALARM_DIGITS)?),
        49 => ReplyBody::Uptime(
            data.trim()
                .parse()
                .map_err(|e| ProtocolError::invalid("uptime", format!("{data:?}: {e}")))?,
        ),
        50..=53 => ReplyBody::FanSpeed {
            fan: command_id - 49,
            speed: parse_scaled("fan speed", data, 1.0)?,
        },
        other => {
            return Err(ProtocolError::UnexpectedReply(format!(
                "unsupported command ID {other:02}"
            )));
        }
    };
    Ok(body)
}

fn temperature(sensor: TemperatureSensor, data: &str) -> Result<ReplyBody, ProtocolError> {
    Ok(ReplyBody::Temperature {
        sensor,
        celsius: parse_scaled("temperature", data, TENTHS)?,
    })
}

fn alarm_bits(field: &str, data: &str, digits: usize) -> Result<AlarmBits, ProtocolError> {
    if data.len() != digits {
        return Err(ProtocolError::invalid(
            field,
            format!("{data:?} must be {digits} hex digits"),
        ));
    }
    AlarmBits::decode_reversed_hex(data)
}

fn l2_alarms(data: &str) -> Result<ReplyBody, ProtocolError> {
    let mut chars = data.chars();
    let sublevel = chars
        .next()
        .and_then(AlarmSublevel::from_code)
        .ok_or_else(|| ProtocolError::invalid("level-2 alarms", format!("bad sublevel in {data:?}")))?;
    let bits = alarm_bits("level-2 alarms", chars.as_str(), L2_ALARM_DIGITS)?;
    Ok(ReplyBody::L2Alarms { sublevel, bits })
}

fn tec_drive(data: &str) -> Result<TecDrive, ProtocolError> {
    let (level, mode) = data
        .split_once(',')
        .ok_or_else(|| ProtocolError::invalid("TEC drive", format!("{data:?} has no mode")))?;
    let is_cooling = match mode {
        "C" => true,
        "H" => false,
        other => {
            return Err(ProtocolError::invalid(
                "TEC drive",
                format!("mode {other:?} must be C or H"),
            ));
        }
    };
    Ok(TecDrive {
        level: parse_scaled("TEC drive", level, 1.0)?,
        is_cooling,
    })
}
