//! Runtime event bus.
//!
//! Uses [`tokio::sync::broadcast`] so that every subscriber receives every
//! lifecycle event without any subscriber blocking the runner.
//!
//! # Topics
//!
//! Each [`EventPayload`] belongs to one [`Topic`]:
//!
//! | Topic | Payloads |
//! |---|---|
//! | [`Topic::Lifecycle`] | `DefaultInjected`, `ActionStarted`, `ActionFinished`, `ActionDeactivated` |
//! | [`Topic::Faults`] | `ActionFailed`, `ReadFault` |

use cuebot_types::{Event, EventPayload};
use tokio::sync::broadcast;
use tracing::{trace, warn};

/// Number of buffered events before old ones are dropped for slow subscribers.
const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Lifecycle,
    Faults,
}

impl Topic {
    pub fn of(payload: &EventPayload) -> Self {
        match payload {
            EventPayload::ActionFailed { .. } | EventPayload::ReadFault { .. } => Topic::Faults,
            EventPayload::DefaultInjected { .. }
            | EventPayload::ActionStarted { .. }
            | EventPayload::ActionFinished { .. }
            | EventPayload::ActionDeactivated { .. } => Topic::Lifecycle,
        }
    }
}

/// Shared event bus.  Clones share the same channel.
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish `event`, returning how many subscribers received it.
    ///
    /// Having no subscribers is normal for a headless robot and yields `0`.
    pub fn publish(&self, event: Event) -> usize {
        match self.sender.send(event) {
            Ok(n) => n,
            Err(broadcast::error::SendError(event)) => {
                trace!(source = %event.source, "event dropped: no subscribers");
                0
            }
        }
    }

    /// Build an [`Event`] from `source` and `payload` and publish it.
    pub fn emit(&self, source: &str, payload: EventPayload) -> usize {
        self.publish(Event::new(source, payload))
    }

    /// Subscribe to every event.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Subscribe to the events of one [`Topic`].
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// A receiver that only yields events of one [`Topic`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next matching event.  Returns `None` once the bus is
    /// closed.  Lag is logged and skipped.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if Topic::of(&event.payload) == self.topic => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(topic = ?self.topic, lagged_by = n, "topic receiver lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`][Self::recv]: drains non-matching
    /// events and returns the first matching one already buffered.
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if Topic::of(&event.payload) == self.topic => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }
}
