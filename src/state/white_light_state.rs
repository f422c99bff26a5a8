// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Published white-light state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chiller::{ChillerAlarmSnapshot, ChillerTelemetry};
use crate::lamp::{FaultReason, LampBasicState};
use crate::response::WatchdogStatus;
use crate::types::{LampControllerError, LampControllerState, LampPower, ShutterState};

use super::StateChange;

/// Lamp state as published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LampStateSnapshot {
    /// Lifecycle state.
    pub basic_state: LampBasicState,
    /// State reported by the lamp controller.
    pub controller_state: LampControllerState,
    /// Error reported by the lamp controller.
    pub controller_error: LampControllerError,
    /// Commanded power.
    pub power: LampPower,
    /// The photosensor sees light.
    pub light_detected: bool,
    /// Shutter position.
    pub shutter: ShutterState,
    /// When the warmup period ends, while powered.
    pub warmup_end: Option<DateTime<Utc>>,
    /// When the cooldown period after the last power-off ends.
    pub cooldown_end: Option<DateTime<Utc>>,
    /// Cause of the current fault.
    pub fault: Option<FaultReason>,
}

impl Default for LampStateSnapshot {
    fn default() -> Self {
        Self {
            basic_state: LampBasicState::Off,
            controller_state: LampControllerState::Off,
            controller_error: LampControllerError::None,
            power: LampPower::OFF,
            light_detected: false,
            shutter: ShutterState::Unknown,
            warmup_end: None,
            cooldown_end: None,
            fault: None,
        }
    }
}

/// Chiller state as published.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChillerStateSnapshot {
    /// The session is connected.
    pub connected: bool,
    /// Latest watchdog reply.
    pub watchdog: Option<WatchdogStatus>,
    /// Alarm and warning registers as last read.
    pub alarms: ChillerAlarmSnapshot,
    /// Control temperature accepted by the chiller.
    pub set_temperature: Option<f64>,
    /// Latest telemetry sweep.
    pub telemetry: Option<ChillerTelemetry>,
}

/// Complete published state.
///
/// # Examples
///
/// ```
/// use atwhitelight::lamp::LampBasicState;
/// use atwhitelight::state::{LampStateSnapshot, StateChange, WhiteLightState};
///
/// let mut state = WhiteLightState::default();
/// let lamp = LampStateSnapshot {
///     basic_state: LampBasicState::Warmup,
///     ..LampStateSnapshot::default()
/// };
///
/// assert!(state.apply(&StateChange::Lamp(lamp.clone())));
/// assert_eq!(state.lamp().basic_state, LampBasicState::Warmup);
///
/// // Applying the same change again reports no change
/// assert!(!state.apply(&StateChange::Lamp(lamp)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WhiteLightState {
    lamp: LampStateSnapshot,
    chiller: ChillerStateSnapshot,
}

impl WhiteLightState {
    /// Returns the lamp state.
    #[must_use]
    pub fn lamp(&self) -> &LampStateSnapshot {
        &self.lamp
    }

    /// Returns the chiller state.
    #[must_use]
    pub fn chiller(&self) -> &ChillerStateSnapshot {
        &self.chiller
    }

    /// Applies a change. Returns `true` if anything changed.
    pub fn apply(&mut self, change: &StateChange) -> bool {
        match change {
            StateChange::Lamp(lamp) => replace(&mut self.lamp, lamp),
            StateChange::ChillerConnected(connected) => {
                replace(&mut self.chiller.connected, connected)
            }
            StateChange::Watchdog(status) => {
                replace(&mut self.chiller.watchdog, &Some(*status))
            }
            StateChange::Alarms(alarms) => replace(&mut self.chiller.alarms, alarms),
            StateChange::SetTemperature(celsius) => {
                replace(&mut self.chiller.set_temperature, &Some(*celsius))
            }
            StateChange::Telemetry(telemetry) => {
                replace(&mut self.chiller.telemetry, &Some(*telemetry))
            }
            StateChange::Batch(changes) => changes
                .iter()
                .fold(false, |changed, change| self.apply(change) || changed),
        }
    }
}

fn replace<T: Clone + PartialEq>(slot: &mut T, value: &T) -> bool {
    if slot == value {
        false
    } else {
        slot.clone_from(value);
        true
    }
}
