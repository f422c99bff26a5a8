// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Chiller alarm and warning bit sets.
//!
//! The chiller transmits these as hexadecimal text with the digit order
//! reversed: the least significant nibble comes first. Bit `n` of the
//! logical mask is therefore found in the `n / 4`-th character. The helpers
//! here keep that reversal in one place.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Number of hex digits in a level-1 alarm payload.
pub const L1_ALARM_DIGITS: usize = 6;

/// Number of hex digits in a level-2 alarm or warning payload.
pub const L2_ALARM_DIGITS: usize = 8;

/// A set of alarm or warning flags as reported by the chiller.
///
/// # Examples
///
/// ```
/// use atwhitelight::types::AlarmBits;
///
/// // The device sends "21" for the logical mask 0x12
/// let bits = AlarmBits::decode_reversed_hex("21").unwrap();
/// assert_eq!(bits.mask(), 0x12);
/// assert_eq!(bits.encode_reversed_hex(4), "2100");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlarmBits(u32);

impl AlarmBits {
    /// No flags set.
    pub const NONE: Self = Self(0);

    /// Creates a bit set from a logical mask.
    #[must_use]
    pub const fn new(mask: u32) -> Self {
        Self(mask)
    }

    /// Returns the logical mask.
    #[must_use]
    pub const fn mask(&self) -> u32 {
        self.0
    }

    /// Returns `true` if no flag is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if bit `bit` is set.
    #[must_use]
    pub const fn contains(&self, bit: u32) -> bool {
        bit < 32 && self.0 & (1 << bit) != 0
    }

    /// Returns the flags set here that are not set in `previous`.
    #[must_use]
    pub const fn newly_set(&self, previous: Self) -> Self {
        Self(self.0 & !previous.0)
    }

    /// Returns the union of both sets.
    #[must_use]
    pub const fn union(&self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Iterates over the indices of set bits, lowest first.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..32).filter(|bit| self.contains(*bit))
    }

    /// Decodes a reversed-digit hex payload.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::InvalidValue` if the text is empty, longer
    /// than eight digits, or not hexadecimal.
    pub fn decode_reversed_hex(text: &str) -> Result<Self, ProtocolError> {
        if text.is_empty() || text.len() > L2_ALARM_DIGITS {
            return Err(ProtocolError::invalid(
                "alarm bits",
                format!("{text:?} must be 1 to {L2_ALARM_DIGITS} hex digits"),
            ));
        }
        let logical: String = text.chars().rev().collect();
        u32::from_str_radix(&logical, 16)
            .map(Self)
            .map_err(|e| ProtocolError::invalid("alarm bits", format!("{text:?}: {e}")))
    }

    /// Encodes the mask the way the chiller sends it: upper-case hex,
    /// zero-padded to `digits`, then reversed.
    #[must_use]
    pub fn encode_reversed_hex(&self, digits: usize) -> String {
        format!("{:0digits$X}", self.0).chars().rev().collect()
    }
}

impl fmt::Display for AlarmBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl From<u32> for AlarmBits {
    fn from(mask: u32) -> Self {
        Self(mask)
    }
}
