// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Synthetic liveness messages for the verification nodes.
//!
//! Each tick stamps `last_heartbeat_at` on every active node and publishes
//! one `node_heartbeat` event per node, carrying the current ledger height.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::events::{EventBus, NodeHeartbeat, PortalEvent};
use crate::storage::{Database, LedgerRepository, NodeRepository, StorageResult};

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

pub struct NodeHeartbeatTask {
    db: Arc<Database>,
    events: EventBus,
    interval: Duration,
}

impl NodeHeartbeatTask {
    pub fn new(db: Arc<Database>, events: EventBus) -> Self {
        Self {
            db,
            events,
            interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub async fn run(self, shutdown: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "Node heartbeat starting");

        loop {
            if shutdown.is_cancelled() {
                info!("Node heartbeat shutting down");
                return;
            }

            if let Err(e) = self.beat() {
                warn!(error = %e, "Node heartbeat failed");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Node heartbeat shutting down");
                    return;
                }
            }
        }
    }

    /// Emit one heartbeat per active node. Returns how many were sent.
    pub fn beat(&self) -> StorageResult<usize> {
        let now = Utc::now();
        let ledger = LedgerRepository::new(&self.db);
        let ledger_height = ledger.height()?;
        let pending = ledger.pending_count()?;
        let nodes = NodeRepository::new(&self.db).record_heartbeat(now)?;

        for node in &nodes {
            self.events.publish(PortalEvent::NodeHeartbeat(NodeHeartbeat {
                node_id: node.id.clone(),
                node_name: node.name.clone(),
                organization: node.organization,
                ledger_height,
                pending,
                timestamp: now,
            }));
        }
        Ok(nodes.len())
    }
}
