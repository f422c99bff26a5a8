// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types for the lamp, shutter and chiller.
//!
//! Constrained values are validated at construction time so that an
//! out-of-range power or an over-wide command field never reaches the
//! hardware.
//!
//! # Types
//!
//! - [`LampPower`] - Lamp power: 0 or 800-1200 W
//! - [`AlarmBits`] - Chiller alarm/warning flags (reversed-hex on the wire)
//! - [`ChillerControllerState`] - Chiller mode from the watchdog reply
//! - [`LampControllerState`] / [`LampControllerError`] - Lamp controller status
//! - [`ShutterState`] - Shutter limit-switch state

mod alarm;
mod chiller;
mod lamp;
mod power;
mod value;

pub use alarm::{AlarmBits, L1_ALARM_DIGITS, L2_ALARM_DIGITS};
pub use chiller::{
    AlarmSublevel, ChillerControllerState, ChillerRunState, ControlSensor, TemperatureSensor,
    ThresholdKind, ThresholdLevel,
};
pub use lamp::{LampControllerError, LampControllerState, ShutterDirection, ShutterState};
pub use power::{
    DAC_FULL_SCALE_VOLTS, DAC_MAX_CODE, ENERGIZED_THRESHOLD_VOLTS, LampPower, VOLTS_AT_MAX_POWER,
    VOLTS_AT_MIN_POWER, dac_code_to_volts, volts_to_dac_code,
};
pub use value::{THOUSANDTHS, TENTHS, format_command_value, parse_scaled};
