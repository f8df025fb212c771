// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process event bus feeding the `/ws` WebSocket channel.
//!
//! Events are fire-and-forget: a client that falls behind the channel
//! capacity loses the oldest events (see `RecvError::Lagged`).

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use utoipa::ToSchema;

use crate::blockchain::{EntityKind, LedgerAction, LedgerEntry, LedgerStatus};
use crate::models::Department;

/// Default number of buffered events per subscriber.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Audit-trail row summary pushed to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LedgerNotice {
    pub ledger_id: String,
    pub sequence: u64,
    pub tx_hash: String,
    pub entity_type: EntityKind,
    pub entity_id: String,
    pub action: LedgerAction,
    pub status: LedgerStatus,
    pub confirmations: usize,
    pub required_confirmations: u32,
    pub timestamp: DateTime<Utc>,
}

impl From<&LedgerEntry> for LedgerNotice {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            ledger_id: entry.id.clone(),
            sequence: entry.sequence,
            tx_hash: entry.tx_hash.clone(),
            entity_type: entry.entity_type,
            entity_id: entry.entity_id.clone(),
            action: entry.action,
            status: entry.status,
            confirmations: entry.confirmations.len(),
            required_confirmations: entry.required_confirmations,
            timestamp: entry.confirmed_at.unwrap_or(entry.created_at),
        }
    }
}

/// Synthetic liveness message for a verification node.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NodeHeartbeat {
    pub node_id: String,
    pub node_name: String,
    pub organization: Department,
    /// Number of audit rows the node has seen.
    pub ledger_height: u64,
    /// Audit rows still awaiting confirmation.
    pub pending: usize,
    pub timestamp: DateTime<Utc>,
}

/// Everything pushed over `/ws`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PortalEvent {
    LedgerRecorded(LedgerNotice),
    LedgerConfirmed(LedgerNotice),
    NodeHeartbeat(NodeHeartbeat),
}

/// Cloneable broadcast handle shared through `AppState`.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PortalEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event; returns how many subscribers received it.
    pub fn publish(&self, event: PortalEvent) -> usize {
        // No subscribers is the normal idle case.
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PortalEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heartbeat() -> PortalEvent {
        PortalEvent::NodeHeartbeat(NodeHeartbeat {
            node_id: "n1".into(),
            node_name: "cyber-cell-peer0".into(),
            organization: Department::CyberCrimeCell,
            ledger_height: 7,
            pending: 1,
            timestamp: Utc::now(),
        })
    }

    #[test]
    fn publish_without_subscribers_is_harmless() {
        let bus = EventBus::default();
        assert_eq!(bus.publish(heartbeat()), 0);
    }

    #[tokio::test]
    async fn subscribers_receive_events() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        assert_eq!(bus.publish(heartbeat()), 1);

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, PortalEvent::NodeHeartbeat(_)));
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(heartbeat()).unwrap();
        assert_eq!(json["type"], "node_heartbeat");
        assert_eq!(json["organization"], "cyber_crime_cell");
        assert_eq!(json["ledger_height"], 7);
    }
}
