// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Ledger Confirmation Worker
//!
//! Background task that flips `pending` audit rows to `confirmed` once they
//! are older than the configured delay.
//!
//! Every `poll_interval` (default 500 ms) the worker:
//! 1. Confirms every pending row with `created_at + delay <= now`, attaching
//!    one confirmation per active node.
//! 2. Publishes a `ledger_confirmed` event per changed row.
//!
//! Failures are logged and the sweep is retried on the next tick.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken`, like the heartbeat task.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::{EventBus, LedgerNotice, PortalEvent};
use crate::storage::{Database, LedgerRepository};

pub const DEFAULT_CONFIRMATION_DELAY: Duration = Duration::from_secs(3);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct ConfirmationWorker {
    db: Arc<Database>,
    events: EventBus,
    delay: Duration,
    poll_interval: Duration,
}

impl ConfirmationWorker {
    pub fn new(db: Arc<Database>, events: EventBus) -> Self {
        Self {
            db,
            events,
            delay: DEFAULT_CONFIRMATION_DELAY,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Run the worker loop until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// tokio::spawn(worker.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            delay_ms = self.delay.as_millis() as u64,
            interval_ms = self.poll_interval.as_millis() as u64,
            "Ledger confirmation worker starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Ledger confirmation worker shutting down");
                return;
            }

            self.step();

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Ledger confirmation worker shutting down");
                    return;
                }
            }
        }
    }

    /// One sweep. Returns the number of rows confirmed.
    pub fn step(&self) -> usize {
        let delay = match chrono::Duration::from_std(self.delay) {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "Confirmation delay out of range");
                return 0;
            }
        };

        let confirmed = match LedgerRepository::new(&self.db).confirm_due(Utc::now(), delay) {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "Ledger confirmation sweep failed");
                return 0;
            }
        };

        for entry in &confirmed {
            debug!(
                ledger_id = %entry.id,
                sequence = entry.sequence,
                confirmations = entry.confirmations.len(),
                "Ledger row confirmed"
            );
            self.events
                .publish(PortalEvent::LedgerConfirmed(LedgerNotice::from(entry)));
        }
        if !confirmed.is_empty() {
            info!(count = confirmed.len(), "Ledger confirmation sweep");
        }
        confirmed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::LedgerStatus;
    use crate::storage::repository::cases::tests::{ctx, new_case};
    use crate::storage::{CaseRepository, NodeRepository};

    fn setup() -> (Arc<Database>, EventBus) {
        let db = Arc::new(Database::in_memory().unwrap());
        NodeRepository::new(&db).seed_defaults().unwrap();
        (db, EventBus::new(16))
    }

    #[test]
    fn rows_younger_than_delay_stay_pending() {
        let (db, events) = setup();
        let audited = CaseRepository::new(&db).create(&ctx(), new_case("a")).unwrap();

        let worker = ConfirmationWorker::new(db.clone(), events).with_delay(Duration::from_secs(3600));
        assert_eq!(worker.step(), 0);
        let row = LedgerRepository::new(&db).get(&audited.ledger.id).unwrap();
        assert_eq!(row.status, LedgerStatus::Pending);
    }

    #[tokio::test]
    async fn due_rows_confirm_and_publish() {
        let (db, events) = setup();
        let mut rx = events.subscribe();
        let audited = CaseRepository::new(&db).create(&ctx(), new_case("a")).unwrap();

        let worker = ConfirmationWorker::new(db.clone(), events).with_delay(Duration::ZERO);
        assert_eq!(worker.step(), 1);
        // Already confirmed rows are not touched again
        assert_eq!(worker.step(), 0);

        let row = LedgerRepository::new(&db).get(&audited.ledger.id).unwrap();
        assert_eq!(row.status, LedgerStatus::Confirmed);
        assert!(row.confirmed_at.is_some());
        assert_eq!(row.confirmations.len() as u32, row.required_confirmations);

        match rx.recv().await.unwrap() {
            PortalEvent::LedgerConfirmed(notice) => assert_eq!(notice.ledger_id, row.id),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let (db, events) = setup();
        let shutdown = CancellationToken::new();
        let worker = ConfirmationWorker::new(db, events).with_poll_interval(Duration::from_millis(10));
        let handle = tokio::spawn(worker.run(shutdown.clone()));
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
