// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cycle reports.

use serde::{Deserialize, Serialize};

use crate::lamp::LampBasicState;
use crate::response::WatchdogStatus;
use crate::types::AlarmBits;

/// Why the chiller was commanded to standby.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StandbyCause {
    /// The watchdog reported alarms.
    Alarm,
    /// The lamp entered FAULT.
    LampFault,
    /// An earlier standby could not be sent and was reasserted.
    Reassert,
}

/// Something the supervisor did on its own to protect the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorrectiveAction {
    /// The chiller was commanded to standby.
    ChillerStandby(StandbyCause),
    /// Lamp power was removed.
    LampOff,
}

/// What one supervisor cycle saw and did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Watchdog reply, if it was read this cycle.
    pub watchdog: Option<WatchdogStatus>,
    /// The chiller session is connected at the end of the cycle.
    pub chiller_connected: bool,
    /// Corrective actions, in the order they were carried out.
    pub corrective: Vec<CorrectiveAction>,
    /// Level-1 alarm bits returned by a consuming read this cycle.
    pub level1_read: Option<AlarmBits>,
    /// A telemetry sweep completed this cycle.
    pub telemetry_read: bool,
    /// Lamp state at the end of the cycle.
    pub lamp_state: Option<LampBasicState>,
}

impl CycleReport {
    /// Returns `true` if standby was commanded this cycle.
    #[must_use]
    pub fn standby_sent(&self) -> bool {
        self.corrective
            .iter()
            .any(|action| matches!(action, CorrectiveAction::ChillerStandby(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standby_sent_looks_at_corrective_actions() {
        let mut report = CycleReport::default();
        report.corrective.push(CorrectiveAction::LampOff);
        assert!(!report.standby_sent());
        report
            .corrective
            .push(CorrectiveAction::ChillerStandby(StandbyCause::Alarm));
        assert!(report.standby_sent());
    }
}
