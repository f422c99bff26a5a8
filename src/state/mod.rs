// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Published state.
//!
//! [`WhiteLightState`] holds what the supervisor last published about the
//! lamp and the chiller. [`StateChange`] values are applied to it, and
//! `apply` reports whether anything changed so that unchanged readings are
//! not re-published.

mod state_change;
mod white_light_state;

pub use state_change::StateChange;
pub use white_light_state::{ChillerStateSnapshot, LampStateSnapshot, WhiteLightState};
