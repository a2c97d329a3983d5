//! Client events emitted by the Cloudbox core.
//!
//! Events are published on the client event bus and consumed by whatever
//! front end renders state (the CLI prints them; a GUI would redraw).
//! The core itself never renders.

pub mod bulk;
pub mod listing;
pub mod selection;
pub mod session;
pub mod upload;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use bulk::{BulkEvent, BulkFailure, BulkOperation, BulkReport};
pub use listing::ListingEvent;
pub use selection::{SelectionEvent, SelectionState};
pub use session::{LogoutReason, SessionEvent};
pub use upload::UploadEvent;

/// Wrapper for all client events with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientEvent {
    /// Unique event ID.
    pub id: Uuid,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// The event payload.
    pub payload: EventPayload,
}

/// Union of all client event types.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event")]
pub enum EventPayload {
    /// Session lifecycle change.
    Session(SessionEvent),
    /// Upload queue progress.
    Upload(UploadEvent),
    /// Bulk operation result.
    Bulk(BulkEvent),
    /// Listing refresh signal.
    Listing(ListingEvent),
    /// Selection change.
    Selection(SelectionEvent),
}

impl ClientEvent {
    /// Create a new client event.
    pub fn new(payload: EventPayload) -> Self {
        Self {
            id: Uuid::now_v7(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

impl From<SessionEvent> for EventPayload {
    fn from(event: SessionEvent) -> Self {
        Self::Session(event)
    }
}

impl From<UploadEvent> for EventPayload {
    fn from(event: UploadEvent) -> Self {
        Self::Upload(event)
    }
}

impl From<BulkEvent> for EventPayload {
    fn from(event: BulkEvent) -> Self {
        Self::Bulk(event)
    }
}

impl From<ListingEvent> for EventPayload {
    fn from(event: ListingEvent) -> Self {
        Self::Listing(event)
    }
}

impl From<SelectionEvent> for EventPayload {
    fn from(event: SelectionEvent) -> Self {
        Self::Selection(event)
    }
}
