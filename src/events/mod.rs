use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info};

/// What happened to a pantry row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryChange {
    Added { name: String },
    Incremented { quantity: i32 },
    Decremented { quantity: i32 },
    Removed,
    Deleted,
    LocationAssigned { location_id: Option<i32> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationChange {
    Created { name: String },
    Deleted { detached_items: u64 },
}

/// Events emitted after a committed mutation. Views treat any of them as a
/// signal to re-pull their rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    InventoryChanged {
        barcode: String,
        change: InventoryChange,
    },
    LocationsChanged {
        location_id: i32,
        change: LocationChange,
    },
    ChoresChanged {
        chore_id: i32,
    },
}

impl Event {
    /// Whether the pantry list must be re-read after this event.
    pub fn requires_inventory_refresh(&self) -> bool {
        match self {
            Event::InventoryChanged { .. } => true,
            // Deleting a location detaches items, which changes their location column.
            Event::LocationsChanged { change, .. } => {
                matches!(change, LocationChange::Deleted { detached_items } if *detached_items > 0)
            }
            Event::ChoresChanged { .. } => false,
        }
    }
}

/// Why an event was not queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EventSendError {
    #[error("event channel is full")]
    Full,
    #[error("event channel is closed")]
    Closed,
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Creates a sender together with its receiving end
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Queues an event without waiting. A full or closed channel drops it.
    pub fn try_send(&self, event: Event) -> Result<(), EventSendError> {
        self.sender.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => EventSendError::Full,
            TrySendError::Closed(_) => EventSendError::Closed,
        })
    }
}

/// Drains the event stream, logging each event. Returns when every sender is dropped.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    info!("Event processor started");
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::InventoryChanged { barcode, change } => {
                info!(barcode = %barcode, change = ?change, "inventory changed");
            }
            Event::LocationsChanged { location_id, change } => {
                info!(location_id, change = ?change, "locations changed");
            }
            Event::ChoresChanged { chore_id } => {
                debug!(chore_id, "chores changed");
            }
        }
    }
    info!("Event processor stopped");
}
