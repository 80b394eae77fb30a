//! Broadcast fan-out
//!
//! Delivery to one connection never affects delivery to another: each
//! recipient has its own outbound queue, and a failed enqueue is reported
//! as a `client-exception` event without interrupting the loop. Per
//! connection, lines arrive in the order the broadcasts were issued.

use std::sync::Arc;

use crate::events::{ChatEvent, EventSink};
use crate::protocol::{format_chat, format_server_broadcast};
use crate::registry::{ConnectionRegistry, RegistryError};
use crate::stats::RelayCounters;

/// Delivers lines to every live connection
#[derive(Clone)]
pub struct BroadcastRouter {
    registry: Arc<ConnectionRegistry>,
    events: Arc<EventSink>,
    counters: Arc<RelayCounters>,
}

impl BroadcastRouter {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        events: Arc<EventSink>,
        counters: Arc<RelayCounters>,
    ) -> Self {
        Self {
            registry,
            events,
            counters,
        }
    }

    /// Relay a participant message as `<loginId>> <text>`
    ///
    /// The sender is included in the fan-out and sees its own message echoed.
    pub async fn broadcast_chat(&self, login_id: &str, text: &str) {
        self.broadcast(&format_chat(login_id, text)).await;
    }

    /// Relay an operator message as `SERVER msg> <text>`
    pub async fn broadcast_system(&self, text: &str) {
        self.counters.system_broadcast();
        self.broadcast(&format_server_broadcast(text)).await;
    }

    /// Deliver an already formatted line to every live connection
    pub async fn broadcast(&self, line: &str) {
        let line: Arc<str> = Arc::from(line);
        let recipients = self.registry.connections().await;
        let mut delivered = 0usize;
        let mut failed = 0u64;

        for entry in &recipients {
            match entry.send(Arc::clone(&line)) {
                Ok(()) => delivered += 1,
                Err(RegistryError::ConnectionClosed(_)) if entry.is_closed() => {
                    // Already on its way out
                    tracing::trace!(connection_id = entry.id, "Skipping closing connection");
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!(connection_id = entry.id, error = %e, "Broadcast delivery failed");
                    self.events.notify(ChatEvent::ClientException {
                        connection_id: entry.id,
                        error: e.to_string(),
                    });
                }
            }
        }

        if failed > 0 {
            self.counters.delivery_failed(failed);
        }

        tracing::trace!(
            recipients = recipients.len(),
            delivered = delivered,
            failed = failed,
            "Broadcast complete"
        );
    }
}
