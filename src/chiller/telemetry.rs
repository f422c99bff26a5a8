// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Chiller telemetry records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::command::FAN_COUNT;
use crate::response::TecDrive;
use crate::types::TemperatureSensor;

/// A temperature reading with its data-quality flag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureReading {
    /// Reading in C, as reported.
    pub celsius: f64,
    /// The sensor is known to read incorrectly; the value is not corrected.
    pub unreliable: bool,
}

impl TemperatureReading {
    /// Wraps a raw reading from `sensor`.
    #[must_use]
    pub fn new(sensor: TemperatureSensor, celsius: f64) -> Self {
        Self {
            celsius,
            unreliable: sensor.is_unreliable(),
        }
    }
}

/// Chiller temperatures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChillerTemperatures {
    /// Control set point.
    pub set_point: TemperatureReading,
    /// Coolant supplied to the lamp.
    pub supply: TemperatureReading,
    /// Coolant returning from the lamp.
    pub return_coolant: TemperatureReading,
    /// Ambient air.
    pub ambient: TemperatureReading,
}

/// One complete telemetry sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChillerTelemetry {
    /// When the sweep finished.
    pub read_at: DateTime<Utc>,
    /// Temperatures.
    pub temperatures: ChillerTemperatures,
    /// Coolant flow rate in L/min.
    pub coolant_flow: f64,
    /// Fan speeds in revolutions per second, fans 1 to 4.
    pub fan_speeds: [f64; FAN_COUNT as usize],
    /// TEC bank currents in A, banks 1 and 2.
    pub tec_bank_currents: [f64; 2],
    /// TEC drive level and mode.
    pub tec_drive: TecDrive,
    /// Uptime in minutes.
    pub uptime_minutes: u32,
}
