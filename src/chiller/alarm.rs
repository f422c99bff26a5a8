// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Chiller alarm bookkeeping.
//!
//! Reading the level-1 alarms resets them on the device, so the value
//! returned by that read is the only record of which alarm fired. The
//! tracker keeps it, together with the level-2 registers and warnings,
//! and decides when the next consuming read is allowed.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::types::{AlarmBits, AlarmSublevel};

/// Alarm and warning registers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChillerAlarmSnapshot {
    /// Level-1 alarms, from the consuming read.
    pub level1: AlarmBits,
    /// Level-2 alarms, sublevel 1.
    pub level21: AlarmBits,
    /// Level-2 alarms, sublevel 2.
    pub level22: AlarmBits,
    /// Warnings.
    pub warnings: AlarmBits,
}

impl ChillerAlarmSnapshot {
    /// Returns `true` if any alarm bit is set.
    #[must_use]
    pub fn has_alarms(&self) -> bool {
        !(self.level1.is_empty() && self.level21.is_empty() && self.level22.is_empty())
    }

    fn union(&self, other: &Self) -> Self {
        Self {
            level1: self.level1.union(other.level1),
            level21: self.level21.union(other.level21),
            level22: self.level22.union(other.level22),
            warnings: self.warnings.union(other.warnings),
        }
    }
}

/// Tracks alarm onset, the consuming level-1 read and latched bits.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tokio::time::Instant;
/// use atwhitelight::chiller::AlarmTracker;
/// use atwhitelight::types::AlarmBits;
///
/// let mut tracker = AlarmTracker::new(Duration::from_secs(2));
/// let t0 = Instant::now();
///
/// assert!(tracker.note_watchdog(true, t0));
/// assert!(!tracker.l1_read_due(t0 + Duration::from_secs(1)));
/// assert!(tracker.l1_read_due(t0 + Duration::from_secs(2)));
///
/// tracker.record_l1(AlarmBits::new(0x4), t0 + Duration::from_secs(2));
/// assert_eq!(tracker.latched().level1, AlarmBits::new(0x4));
/// ```
#[derive(Debug, Clone)]
pub struct AlarmTracker {
    holdoff: Duration,
    onset: Option<Instant>,
    next_l1_read: Option<Instant>,
    current: ChillerAlarmSnapshot,
    latched: ChillerAlarmSnapshot,
}

impl AlarmTracker {
    /// Creates a tracker that waits `holdoff` after onset before the
    /// consuming level-1 read.
    #[must_use]
    pub fn new(holdoff: Duration) -> Self {
        Self {
            holdoff,
            onset: None,
            next_l1_read: None,
            current: ChillerAlarmSnapshot::default(),
            latched: ChillerAlarmSnapshot::default(),
        }
    }

    /// Notes the watchdog alarm flag. Returns `true` on alarm onset.
    pub fn note_watchdog(&mut self, alarms_present: bool, now: Instant) -> bool {
        match (alarms_present, self.onset) {
            (true, None) => {
                tracing::warn!("Chiller alarm onset");
                self.onset = Some(now);
                self.next_l1_read = Some(now + self.holdoff);
                true
            }
            (false, Some(_)) => {
                tracing::info!("Chiller alarms cleared");
                self.onset = None;
                self.next_l1_read = None;
                self.current = ChillerAlarmSnapshot {
                    warnings: self.current.warnings,
                    ..ChillerAlarmSnapshot::default()
                };
                false
            }
            _ => false,
        }
    }

    /// Returns the alarm onset time, while alarms are present.
    #[must_use]
    pub fn onset(&self) -> Option<Instant> {
        self.onset
    }

    /// Returns `true` if the consuming level-1 read may run now.
    #[must_use]
    pub fn l1_read_due(&self, now: Instant) -> bool {
        self.next_l1_read.is_some_and(|due| now >= due)
    }

    /// Records a consuming level-1 read. Returns the bits not already
    /// latched.
    pub fn record_l1(&mut self, bits: AlarmBits, now: Instant) -> AlarmBits {
        let new = bits.newly_set(self.latched.level1);
        self.current.level1 = bits;
        self.latched.level1 = self.latched.level1.union(bits);
        self.next_l1_read = self.onset.map(|_| now + self.holdoff);
        if !new.is_empty() {
            tracing::warn!(level1 = %bits, new = %new, "Chiller level-1 alarms read and reset");
        }
        new
    }

    /// Records a level-2 alarm register.
    pub fn record_l2(&mut self, sublevel: AlarmSublevel, bits: AlarmBits) {
        match sublevel {
            AlarmSublevel::One => self.current.level21 = bits,
            AlarmSublevel::Two => self.current.level22 = bits,
        }
        self.latched = self.latched.union(&self.current);
    }

    /// Records the warning register.
    pub fn record_warnings(&mut self, bits: AlarmBits) {
        self.current.warnings = bits;
        self.latched.warnings = self.latched.warnings.union(bits);
    }

    /// Returns the registers as last read.
    #[must_use]
    pub fn current(&self) -> ChillerAlarmSnapshot {
        self.current
    }

    /// Returns every bit seen since the last [`clear_latched`](Self::clear_latched).
    #[must_use]
    pub fn latched(&self) -> ChillerAlarmSnapshot {
        self.latched
    }

    /// Forgets latched bits.
    pub fn clear_latched(&mut self) {
        self.latched = self.current;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn onset_only_once() {
        let t0 = Instant::now();
        let mut tracker = AlarmTracker::new(secs(2));
        assert!(tracker.note_watchdog(true, t0));
        assert!(!tracker.note_watchdog(true, t0 + secs(1)));
        assert_eq!(tracker.onset(), Some(t0));
        assert!(!tracker.note_watchdog(false, t0 + secs(2)));
        assert_eq!(tracker.onset(), None);
        assert!(tracker.note_watchdog(true, t0 + secs(3)));
    }

    #[test]
    fn l1_read_waits_for_holdoff_then_repeats() {
        let t0 = Instant::now();
        let mut tracker = AlarmTracker::new(secs(2));
        assert!(!tracker.l1_read_due(t0));
        tracker.note_watchdog(true, t0);
        assert!(!tracker.l1_read_due(t0 + Duration::from_millis(1999)));
        assert!(tracker.l1_read_due(t0 + secs(2)));

        tracker.record_l1(AlarmBits::new(1), t0 + secs(2));
        assert!(!tracker.l1_read_due(t0 + secs(3)));
        assert!(tracker.l1_read_due(t0 + secs(4)));

        tracker.note_watchdog(false, t0 + secs(5));
        assert!(!tracker.l1_read_due(t0 + secs(10)));
    }

    #[test]
    fn latched_accumulates_after_clear() {
        let t0 = Instant::now();
        let mut tracker = AlarmTracker::new(secs(0));
        tracker.note_watchdog(true, t0);
        assert_eq!(tracker.record_l1(AlarmBits::new(0b01), t0), AlarmBits::new(0b01));
        assert_eq!(tracker.record_l1(AlarmBits::new(0b11), t0), AlarmBits::new(0b10));
        tracker.record_l2(AlarmSublevel::Two, AlarmBits::new(0x100));
        tracker.note_watchdog(false, t0);

        assert!(!tracker.current().has_alarms());
        let latched = tracker.latched();
        assert_eq!(latched.level1, AlarmBits::new(0b11));
        assert_eq!(latched.level22, AlarmBits::new(0x100));
        assert!(latched.has_alarms());

        tracker.clear_latched();
        assert!(!tracker.latched().has_alarms());
    }

    #[test]
    fn warnings_survive_alarm_clear() {
        let t0 = Instant::now();
        let mut tracker = AlarmTracker::new(secs(2));
        tracker.note_watchdog(true, t0);
        tracker.record_warnings(AlarmBits::new(0x8));
        tracker.note_watchdog(false, t0 + secs(1));
        assert_eq!(tracker.current().warnings, AlarmBits::new(0x8));
    }
}
