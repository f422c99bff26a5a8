// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! White-light event types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::lamp::FaultReason;
use crate::state::{StateChange, WhiteLightState};
use crate::supervisor::CorrectiveAction;
use crate::types::AlarmBits;

/// A hardware link the supervisor maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Link {
    /// TCP session to the chiller.
    Chiller,
    /// I/O module driving the lamp and shutter.
    LampIo,
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chiller => f.write_str("chiller"),
            Self::LampIo => f.write_str("lamp I/O"),
        }
    }
}

/// Events emitted by the supervisor.
///
/// # Examples
///
/// ```
/// use atwhitelight::event::{Link, WhiteLightEvent};
///
/// let event = WhiteLightEvent::disconnected(Link::Chiller, "connection refused");
/// assert!(event.is_connection());
/// assert!(!event.is_fault());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WhiteLightEvent {
    /// Published state changed.
    StateChanged {
        /// What changed.
        change: StateChange,
        /// The complete new state.
        new_state: WhiteLightState,
    },

    /// A link was established or lost.
    ConnectionChanged {
        /// Which link.
        link: Link,
        /// Whether it is now up.
        connected: bool,
        /// Error message if the link was lost due to an error.
        error: Option<String>,
    },

    /// The lamp entered FAULT.
    LampFault {
        /// Cause.
        reason: FaultReason,
    },

    /// The consuming level-1 alarm read returned bits not seen before.
    ChillerAlarmsRead {
        /// Bits returned by the read.
        level1: AlarmBits,
        /// Bits that were not already latched.
        new: AlarmBits,
    },

    /// Power was removed after the lamp had been powered.
    LampOnHours {
        /// Hours powered in the period that just ended.
        hours: f64,
        /// Hours powered since the supervisor started.
        total_hours: f64,
    },

    /// The supervisor acted on its own to protect the hardware.
    Corrective(CorrectiveAction),
}

impl WhiteLightEvent {
    /// Creates a connected event.
    #[must_use]
    pub fn connected(link: Link) -> Self {
        Self::ConnectionChanged {
            link,
            connected: true,
            error: None,
        }
    }

    /// Creates a disconnected event with an error.
    #[must_use]
    pub fn disconnected(link: Link, error: impl Into<String>) -> Self {
        Self::ConnectionChanged {
            link,
            connected: false,
            error: Some(error.into()),
        }
    }

    /// Returns `true` if this is a connection event.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::ConnectionChanged { .. })
    }

    /// Returns `true` if this is a state change event.
    #[must_use]
    pub fn is_state_change(&self) -> bool {
        matches!(self, Self::StateChanged { .. })
    }

    /// Returns `true` if this is a lamp fault event.
    #[must_use]
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::LampFault { .. })
    }
}
