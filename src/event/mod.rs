// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Supervisor events.
//!
//! The supervisor publishes [`WhiteLightEvent`]s on an [`EventBus`], a
//! thin wrapper over a tokio broadcast channel. Subscribers see state
//! changes, link changes, faults and corrective actions.
//!
//! # Examples
//!
//! ```
//! use atwhitelight::event::{EventBus, Link, WhiteLightEvent};
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//!
//! bus.publish(WhiteLightEvent::disconnected(Link::Chiller, "timed out"));
//! ```

mod event_bus;
mod white_light_event;

pub use event_bus::EventBus;
pub use white_light_event::{Link, WhiteLightEvent};
