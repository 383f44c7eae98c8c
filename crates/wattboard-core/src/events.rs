//! Sync lifecycle events.
//!
//! Every dispatched, committed, discarded or failed fetch is announced on a
//! broadcast channel. Views usually observe state through
//! [`crate::SyncController::subscribe`]; events are for logging, tests, and
//! tooling that needs to see cycles that never reach state (discarded ones).

use serde::Serialize;
use tokio::sync::broadcast;

use wattboard_types::{FilterSet, ResourceKind};

/// Events emitted by controllers and the cascade resolver.
///
/// All events are serializable for logging and IPC.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum SyncEvent {
    /// `sync` was called without an institution and did nothing.
    Skipped { kind: ResourceKind },
    /// A fetch was issued.
    Dispatched {
        kind: ResourceKind,
        sequence: u64,
        filters: FilterSet,
    },
    /// A fetch response became the visible result set.
    Committed {
        kind: ResourceKind,
        sequence: u64,
        records: usize,
    },
    /// A fetch settled after a newer one was issued and was dropped.
    Discarded {
        kind: ResourceKind,
        sequence: u64,
        latest: u64,
    },
    /// The latest fetch failed; previous data stays visible.
    Failed {
        kind: ResourceKind,
        sequence: u64,
        error: String,
    },
    /// The device list for an institution arrived.
    DevicesLoaded { institution: String, count: usize },
    /// The device list request failed.
    DevicesFailed { institution: String, error: String },
    /// The only device of an institution was selected automatically.
    DeviceAutoSelected {
        institution: String,
        device_id: String,
    },
}

impl SyncEvent {
    /// Sequence number of the fetch this event refers to, if any.
    pub fn sequence(&self) -> Option<u64> {
        match self {
            SyncEvent::Dispatched { sequence, .. }
            | SyncEvent::Committed { sequence, .. }
            | SyncEvent::Discarded { sequence, .. }
            | SyncEvent::Failed { sequence, .. } => Some(*sequence),
            _ => None,
        }
    }
}

/// Sender for sync events.
pub type EventSender = broadcast::Sender<SyncEvent>;

/// Receiver for sync events.
pub type EventReceiver = broadcast::Receiver<SyncEvent>;

/// Event dispatcher shared by every component of one dashboard.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a new event dispatcher.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event.
    pub fn send(&self, event: SyncEvent) {
        // No receivers is fine.
        let _ = self.sender.send(event);
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(100)
    }
}
