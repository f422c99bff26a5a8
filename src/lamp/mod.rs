// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lamp control.
//!
//! - [`LampDriver`]: power output, status inputs and shutter over an
//!   [`IoChannel`](crate::io::IoChannel).
//! - [`BlinkDecoder`]: decodes the controller's blinking error signal.
//! - [`LampLifecycle`]: the OFF/WARMUP/ON/COOLDOWN/FAULT state machine.

mod blink;
mod driver;
mod lifecycle;

pub use blink::{BLINK_GAP, BlinkDecoder};
pub use driver::{LampDriver, LampPowerReading, LampStatus};
pub use lifecycle::{
    ChillerCondition, FaultReason, LampAction, LampBasicState, LampLifecycle, LifecycleState,
    Observation, Stamp,
};
