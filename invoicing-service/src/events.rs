//! Outbound document events.
//!
//! Emitted after a lifecycle operation commits, fire-and-forget: the core
//! never waits on or fails because of a subscriber.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle events published for external subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DocumentEvent {
    DocumentCreated {
        tenant_id: Uuid,
        invoice_id: Uuid,
    },
    DocumentIssued {
        tenant_id: Uuid,
        invoice_id: Uuid,
        /// The permanent document number assigned by issuance.
        number: String,
    },
    DocumentCancelled {
        tenant_id: Uuid,
        invoice_id: Uuid,
        number: Option<String>,
    },
    DocumentPaid {
        tenant_id: Uuid,
        invoice_id: Uuid,
    },
}

impl DocumentEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            DocumentEvent::DocumentCreated { .. } => "invoicing.document.created",
            DocumentEvent::DocumentIssued { .. } => "invoicing.document.issued",
            DocumentEvent::DocumentCancelled { .. } => "invoicing.document.cancelled",
            DocumentEvent::DocumentPaid { .. } => "invoicing.document.paid",
        }
    }
}

/// Subscriber boundary. Implementations must not block or fail the caller.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &DocumentEvent);
}

/// Default sink: structured log line per event.
pub struct LogSink;

impl EventSink for LogSink {
    fn publish(&self, event: &DocumentEvent) {
        tracing::info!(
            event_type = event.event_type(),
            payload = %serde_json::to_string(event).unwrap_or_default(),
            "Document event"
        );
    }
}
