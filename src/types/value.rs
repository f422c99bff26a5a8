// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fixed-point number fields used in chiller command and reply payloads.

use crate::error::{ProtocolError, ValueError};

/// Scale for temperatures (C) and coolant flow (L/min).
pub const TENTHS: f64 = 10.0;

/// Scale for TEC currents (A).
pub const THOUSANDTHS: f64 = 1000.0;

/// Formats a value as a fixed-width chiller command field.
///
/// The value is multiplied by `scale`, rounded to the nearest integer and
/// zero-padded to `width` characters. When `signed` is set the field starts
/// with `+` or `-` and the sign counts toward the width.
///
/// # Errors
///
/// Returns `ValueError::Negative` for a negative value when `signed` is
/// false, and `ValueError::FieldOverflow` if the result is wider than
/// `width`.
///
/// # Examples
///
/// ```
/// use atwhitelight::types::format_command_value;
///
/// assert_eq!(format_command_value(1.29, 10.0, 5, true).unwrap(), "+0013");
/// assert_eq!(format_command_value(-0.2012, 1000.0, 5, true).unwrap(), "-0201");
/// assert_eq!(format_command_value(67.0, 1.0, 3, false).unwrap(), "067");
/// assert!(format_command_value(1000.0, 10.0, 5, true).is_err());
/// ```
#[allow(clippy::cast_possible_truncation)]
pub fn format_command_value(
    value: f64,
    scale: f64,
    width: usize,
    signed: bool,
) -> Result<String, ValueError> {
    if !signed && value < 0.0 {
        return Err(ValueError::Negative(value));
    }
    let scaled = (value * scale).round();
    if !scaled.is_finite() || scaled.abs() > 1e15 {
        return Err(ValueError::FieldOverflow {
            value,
            scale,
            width,
        });
    }
    // Bounded above, so the cast is exact
    let scaled = scaled as i64;
    let formatted = if signed {
        format!("{scaled:+0width$}")
    } else {
        format!("{scaled:0width$}")
    };
    if formatted.len() > width {
        return Err(ValueError::FieldOverflow {
            value,
            scale,
            width,
        });
    }
    Ok(formatted)
}

/// Parses a fixed-point reply field such as `+0284` and divides by `scale`.
///
/// # Errors
///
/// Returns `ProtocolError::InvalidValue` if the text is not an integer.
pub fn parse_scaled(field: &str, text: &str, scale: f64) -> Result<f64, ProtocolError> {
    let raw: i32 = text
        .trim()
        .parse()
        .map_err(|e| ProtocolError::invalid(field, format!("{text:?}: {e}")))?;
    Ok(f64::from(raw) / scale)
}
