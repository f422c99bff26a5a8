// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! State change types.

use serde::{Deserialize, Serialize};

use crate::chiller::{ChillerAlarmSnapshot, ChillerTelemetry};
use crate::response::WatchdogStatus;

use super::LampStateSnapshot;

/// A single change to [`WhiteLightState`](super::WhiteLightState).
///
/// The supervisor builds one change per reading and applies them in a
/// batch; only the parts that actually changed are published.
///
/// # Examples
///
/// ```
/// use atwhitelight::state::{StateChange, WhiteLightState};
///
/// let mut state = WhiteLightState::default();
/// let change = StateChange::batch(vec![
///     StateChange::ChillerConnected(true),
///     StateChange::SetTemperature(20.0),
/// ]);
///
/// assert_eq!(change.change_count(), 2);
/// assert!(state.apply(&change));
/// assert!(!state.apply(&change));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StateChange {
    /// Lamp state.
    Lamp(LampStateSnapshot),
    /// Chiller session connected or lost.
    ChillerConnected(bool),
    /// Watchdog reply.
    Watchdog(WatchdogStatus),
    /// Alarm and warning registers.
    Alarms(ChillerAlarmSnapshot),
    /// Control temperature accepted by the chiller.
    SetTemperature(f64),
    /// Telemetry sweep.
    Telemetry(ChillerTelemetry),
    /// Several changes at once.
    Batch(Vec<StateChange>),
}

impl StateChange {
    /// Creates a batch change.
    #[must_use]
    pub fn batch(changes: Vec<StateChange>) -> Self {
        Self::Batch(changes)
    }

    /// Returns `true` if this change concerns the lamp.
    #[must_use]
    pub fn is_lamp(&self) -> bool {
        matches!(self, Self::Lamp(_))
    }

    /// Returns `true` if this change concerns the chiller.
    #[must_use]
    pub fn is_chiller(&self) -> bool {
        matches!(
            self,
            Self::ChillerConnected(_)
                | Self::Watchdog(_)
                | Self::Alarms(_)
                | Self::SetTemperature(_)
                | Self::Telemetry(_)
        )
    }

    /// Returns the number of individual changes, counting batch members.
    #[must_use]
    pub fn change_count(&self) -> usize {
        match self {
            Self::Batch(changes) => changes.iter().map(Self::change_count).sum(),
            _ => 1,
        }
    }
}
