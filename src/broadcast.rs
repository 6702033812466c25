//! Monitor lifecycle notifications.
//!
//! Every accepted monitor mutation is announced through a [`Broadcaster`].
//! Broadcasting is fire-and-forget: it never blocks and never fails the
//! caller.

use strum_macros::{AsRefStr, Display};
use tokio::sync::broadcast;

use crate::model::{Monitor, ObjectId};

/// Default number of events a lagging subscriber may fall behind.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Event kind, rendered as the event name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display)]
#[strum(serialize_all = "lowercase")]
pub enum MonitorEventKind {
    Added,
    Changed,
    Deleted,
}

/// A monitor lifecycle event.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    Added(Monitor),
    Changed(Monitor),
    Deleted(ObjectId),
}

impl MonitorEvent {
    pub fn kind(&self) -> MonitorEventKind {
        match self {
            Self::Added(_) => MonitorEventKind::Added,
            Self::Changed(_) => MonitorEventKind::Changed,
            Self::Deleted(_) => MonitorEventKind::Deleted,
        }
    }

    /// Event name: `added`, `changed` or `deleted`.
    pub fn name(&self) -> &'static str {
        match self.kind() {
            MonitorEventKind::Added => "added",
            MonitorEventKind::Changed => "changed",
            MonitorEventKind::Deleted => "deleted",
        }
    }

    /// Identifier of the affected monitor.
    pub fn monitor_id(&self) -> ObjectId {
        match self {
            Self::Added(m) | Self::Changed(m) => m.id,
            Self::Deleted(id) => *id,
        }
    }
}

/// Fan-out notifier of monitor lifecycle events.
pub trait Broadcaster: Send + Sync {
    /// Announce an event. Must not block.
    fn broadcast(&self, event: MonitorEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBroadcaster;

impl Broadcaster for NoopBroadcaster {
    fn broadcast(&self, _event: MonitorEvent) {}
}

/// Broadcaster over a `tokio::sync::broadcast` channel.
///
/// Events sent with no subscriber are dropped; a subscriber that falls more
/// than `capacity` events behind skips the oldest ones.
#[derive(Debug, Clone)]
pub struct ChannelBroadcaster {
    tx: broadcast::Sender<MonitorEvent>,
}

impl ChannelBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChannelBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl Broadcaster for ChannelBroadcaster {
    fn broadcast(&self, event: MonitorEvent) {
        let name = event.name();
        let id = event.monitor_id();
        match self.tx.send(event) {
            Ok(receivers) => tracing::trace!(event = name, monitor = %id, receivers, "Event broadcast"),
            Err(_) => tracing::trace!(event = name, monitor = %id, "Event dropped, no subscribers"),
        }
    }
}
