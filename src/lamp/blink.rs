// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decoder for the lamp controller's blinking error signal.
//!
//! The controller reports error N by blinking its error line N times,
//! 0.5 s on and 0.5 s off, then staying dark for 1.5 s before repeating.
//! Each blink cycle lasts one second, so N is the time from the first
//! rising edge to the last falling edge, plus the final half-second off.
//!
//! The line must be sampled well above 2 Hz for this to work. The
//! supervisor samples every `status_interval`, and the decoder only looks
//! at edges.

use std::time::Duration;

use tokio::time::Instant;

use crate::types::LampControllerError;

/// Dark time that separates one blink code from the next.
pub const BLINK_GAP: Duration = Duration::from_secs(1);

/// Stateful blink-code decoder.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tokio::time::Instant;
/// use atwhitelight::lamp::BlinkDecoder;
/// use atwhitelight::types::LampControllerError;
///
/// let mut decoder = BlinkDecoder::new();
/// let start = Instant::now();
/// let at = |ms| start + Duration::from_millis(ms);
///
/// // Error line steady and dark first, so a gap has been seen
/// decoder.update(at(0), false, false);
///
/// // Two blinks, then the pause
/// for (ms, on) in [(2000, true), (2500, false), (3000, true), (3500, false)] {
///     decoder.update(at(ms), true, on);
/// }
/// assert_eq!(decoder.current(), LampControllerError::Unknown);
///
/// let error = decoder.update(at(4600), true, false);
/// assert_eq!(error, LampControllerError::ChassisOverheating);
/// ```
#[derive(Debug, Clone)]
pub struct BlinkDecoder {
    was_on: bool,
    off_time: Option<Instant>,
    gap_seen: bool,
    code_start: Option<Instant>,
    current: LampControllerError,
}

impl BlinkDecoder {
    /// Creates a decoder that has not yet seen a gap.
    ///
    /// A code already blinking at start-up is ignored until the first
    /// pause, so a partial count is never reported.
    #[must_use]
    pub fn new() -> Self {
        Self {
            was_on: false,
            off_time: None,
            gap_seen: false,
            code_start: None,
            current: LampControllerError::None,
        }
    }

    /// Returns the most recently decoded error.
    #[must_use]
    pub fn current(&self) -> LampControllerError {
        self.current
    }

    /// Feeds one sample of the error-exists and blinking lines.
    ///
    /// Returns the current error: [`LampControllerError::None`] when no
    /// error exists, [`LampControllerError::Unknown`] while a new code is
    /// still being counted, and the decoded code afterwards.
    pub fn update(
        &mut self,
        now: Instant,
        error_exists: bool,
        blinking: bool,
    ) -> LampControllerError {
        if !error_exists {
            *self = Self::new();
            self.gap_seen = true;
            return self.current;
        }

        if blinking {
            if !self.was_on {
                let dark_long_enough = self
                    .off_time
                    .is_none_or(|off| now.saturating_duration_since(off) > BLINK_GAP);
                if self.gap_seen && dark_long_enough {
                    tracing::debug!("Lamp controller started blinking an error code");
                    self.code_start = Some(now);
                }
            }
        } else if self.was_on {
            self.off_time = Some(now);
        } else {
            let dark_for = self
                .off_time
                .map_or(Duration::MAX, |off| now.saturating_duration_since(off));
            if dark_for >= BLINK_GAP {
                self.gap_seen = true;
                if let (Some(start), Some(off)) = (self.code_start.take(), self.off_time) {
                    self.current = decode_code(off.saturating_duration_since(start));
                }
            }
        }
        self.was_on = blinking;

        if self.current == LampControllerError::None {
            self.current = LampControllerError::Unknown;
        }
        self.current
    }
}

impl Default for BlinkDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_code(blinking_for: Duration) -> LampControllerError {
    // Rounded and clamped to a small positive count, so the cast is exact
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let count = (0.5 + blinking_for.as_secs_f64()).round().clamp(0.0, 1000.0) as u32;
    let error = LampControllerError::from_blink_count(count);
    if error == LampControllerError::Unknown || error == LampControllerError::None {
        tracing::warn!(count, "Unrecognized lamp controller blink count");
        LampControllerError::Unknown
    } else {
        tracing::info!(code = count, error = %error, "Decoded lamp controller error");
        error
    }
}
