// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event bus for broadcasting supervisor events.

use tokio::sync::broadcast;

use super::WhiteLightEvent;

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Broadcasts [`WhiteLightEvent`]s to any number of subscribers.
///
/// A subscriber that falls more than the channel capacity behind loses
/// the oldest events and gets `RecvError::Lagged`.
///
/// # Examples
///
/// ```
/// use atwhitelight::event::{EventBus, Link, WhiteLightEvent};
///
/// let bus = EventBus::new();
/// let mut rx = bus.subscribe();
///
/// bus.publish(WhiteLightEvent::connected(Link::Chiller));
/// assert!(rx.try_recv().unwrap().is_connection());
/// ```
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<WhiteLightEvent>,
}

impl EventBus {
    /// Creates a bus with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Creates a bus buffering at most `capacity` events per subscriber.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribes to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<WhiteLightEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publishes an event. Dropped if nobody is subscribed.
    pub fn publish(&self, event: WhiteLightEvent) {
        let _ = self.sender.send(event);
    }

}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
