// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lamp power and its mapping onto the power-control DAC.
//!
//! The lamp controller takes an analog voltage: 0 V is off, and the
//! supported power band of 800-1200 W maps linearly onto 1.961-5.0 V.
//! The DAC has 12 bits over 0-5 V, so every written voltage is quantized.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// Voltage that commands [`LampPower::MIN_ON`].
pub const VOLTS_AT_MIN_POWER: f64 = 1.961;

/// Voltage that commands [`LampPower::MAX`].
pub const VOLTS_AT_MAX_POWER: f64 = 5.0;

/// Full-scale output of the power DAC.
pub const DAC_FULL_SCALE_VOLTS: f64 = 5.0;

/// Highest DAC code (12 bits).
pub const DAC_MAX_CODE: u16 = 4095;

/// Read-back voltages at or above this mean the lamp is commanded on.
///
/// Half the minimum-power voltage, so quantization noise on either side of
/// 0 V or 1.961 V cannot flip the reading.
pub const ENERGIZED_THRESHOLD_VOLTS: f64 = VOLTS_AT_MIN_POWER / 2.0;

/// Commanded lamp power in watts: either zero or 800-1200 W inclusive.
///
/// # Examples
///
/// ```
/// use atwhitelight::types::LampPower;
///
/// let power = LampPower::new(1000.0).unwrap();
/// assert_eq!(power.watts(), 1000.0);
/// assert!(power.is_on());
///
/// assert!(LampPower::OFF.volts().abs() < f64::EPSILON);
/// assert!(LampPower::new(500.0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct LampPower(f64);

impl LampPower {
    /// Lamp off.
    pub const OFF: Self = Self(0.0);

    /// Lowest non-zero power.
    pub const MIN_ON: Self = Self(800.0);

    /// Highest power.
    pub const MAX: Self = Self(1200.0);

    /// Creates a lamp power.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::PowerOutOfRange` unless `watts` is 0 or in
    /// `[800, 1200]`.
    pub fn new(watts: f64) -> Result<Self, ValueError> {
        if watts == 0.0 || (Self::MIN_ON.0..=Self::MAX.0).contains(&watts) {
            Ok(Self(watts))
        } else {
            Err(ValueError::PowerOutOfRange {
                min: Self::MIN_ON.0,
                max: Self::MAX.0,
                watts,
            })
        }
    }

    /// Creates a lamp power, clamping non-zero values into `[800, 1200]`.
    ///
    /// Values at or below zero (and NaN) are treated as off.
    ///
    /// # Examples
    ///
    /// ```
    /// use atwhitelight::types::LampPower;
    ///
    /// assert_eq!(LampPower::clamped(1500.0), LampPower::MAX);
    /// assert_eq!(LampPower::clamped(10.0), LampPower::MIN_ON);
    /// assert_eq!(LampPower::clamped(-3.0), LampPower::OFF);
    /// ```
    #[must_use]
    pub fn clamped(watts: f64) -> Self {
        if watts.is_nan() || watts <= 0.0 {
            Self::OFF
        } else {
            Self(watts.clamp(Self::MIN_ON.0, Self::MAX.0))
        }
    }

    /// Returns the power in watts.
    #[must_use]
    pub const fn watts(&self) -> f64 {
        self.0
    }

    /// Returns `true` for any non-zero power.
    #[must_use]
    pub fn is_on(&self) -> bool {
        self.0 > 0.0
    }

    /// Returns the ideal (unquantized) control voltage.
    #[must_use]
    pub fn volts(&self) -> f64 {
        if !self.is_on() {
            return 0.0;
        }
        let fraction = (self.0 - Self::MIN_ON.0) / (Self::MAX.0 - Self::MIN_ON.0);
        VOLTS_AT_MIN_POWER + fraction * (VOLTS_AT_MAX_POWER - VOLTS_AT_MIN_POWER)
    }

    /// Returns the DAC code for this power.
    #[must_use]
    pub fn dac_code(&self) -> u16 {
        volts_to_dac_code(self.volts())
    }

    /// Converts a read-back control voltage to watts.
    ///
    /// Voltages below [`ENERGIZED_THRESHOLD_VOLTS`] read as off. Anything
    /// above maps back through the linear band and is clamped to it.
    #[must_use]
    pub fn watts_from_volts(volts: f64) -> f64 {
        if volts < ENERGIZED_THRESHOLD_VOLTS {
            return 0.0;
        }
        let fraction = (volts - VOLTS_AT_MIN_POWER) / (VOLTS_AT_MAX_POWER - VOLTS_AT_MIN_POWER);
        (Self::MIN_ON.0 + fraction * (Self::MAX.0 - Self::MIN_ON.0))
            .clamp(Self::MIN_ON.0, Self::MAX.0)
    }
}

/// Converts a voltage to the nearest DAC code, saturating at the rails.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn volts_to_dac_code(volts: f64) -> u16 {
    let code = (volts / DAC_FULL_SCALE_VOLTS * f64::from(DAC_MAX_CODE)).round();
    // Clamped to the DAC range, so the cast cannot truncate
    code.clamp(0.0, f64::from(DAC_MAX_CODE)) as u16
}

/// Converts a DAC code back to volts.
#[must_use]
pub fn dac_code_to_volts(code: u16) -> f64 {
    f64::from(code.min(DAC_MAX_CODE)) / f64::from(DAC_MAX_CODE) * DAC_FULL_SCALE_VOLTS
}

impl Default for LampPower {
    fn default() -> Self {
        Self::OFF
    }
}

impl fmt::Display for LampPower {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} W", self.0)
    }
}

impl TryFrom<f64> for LampPower {
    type Error = ValueError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<LampPower> for f64 {
    fn from(power: LampPower) -> Self {
        power.0
    }
}
