// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audited write path for cases, wallets and STRs.
//!
//! [`Database::audited`] runs the caller's mutation and appends the chained
//! `blockchain_transactions` row in the same redb write transaction, so the
//! record and its audit row commit or roll back together. Timeline events
//! produced by the mutation are stamped with the new row's id.

use chrono::{DateTime, Utc};
use redb::WriteTransaction;
use serde::Serialize;

use super::database::{Database, Record, StorageResult};
use super::repository::ledger::append_entry;
use super::repository::timeline::{append_event, NewTimelineEvent, TimelineEventType};
use crate::auth::AuthenticatedUser;
use crate::blockchain::{hashing, EntityKind, LedgerAction, LedgerEntry};
use crate::models::Department;

/// Who is performing a mutation.
#[derive(Debug, Clone, Default)]
pub struct AuditContext {
    /// `None` for system-initiated changes.
    pub actor_user_id: Option<String>,
    /// Used to pick the submitting node.
    pub department: Option<Department>,
}

impl AuditContext {
    pub fn system() -> Self {
        Self::default()
    }

    pub fn user(user_id: impl Into<String>, department: Department) -> Self {
        Self {
            actor_user_id: Some(user_id.into()),
            department: Some(department),
        }
    }

    pub fn actor(&self) -> Option<&str> {
        self.actor_user_id.as_deref()
    }
}

impl From<&AuthenticatedUser> for AuditContext {
    fn from(user: &AuthenticatedUser) -> Self {
        Self::user(user.user_id.clone(), user.department)
    }
}

/// Outcome of a mutation closure: the record as written plus any timeline
/// entries it should produce.
#[derive(Debug)]
pub struct Mutation<T> {
    pub record: T,
    pub timeline: Vec<NewTimelineEvent>,
}

impl<T> Mutation<T> {
    pub fn new(record: T) -> Self {
        Self {
            record,
            timeline: Vec::new(),
        }
    }

    /// Add a timeline entry for a case.
    pub fn with_timeline(
        mut self,
        case_id: impl Into<String>,
        event_type: TimelineEventType,
        description: impl Into<String>,
    ) -> Self {
        self.timeline.push(NewTimelineEvent {
            case_id: case_id.into(),
            event_type,
            description: description.into(),
        });
        self
    }
}

/// A committed record together with its audit row.
#[derive(Debug, Clone)]
pub struct Audited<T> {
    pub record: T,
    pub ledger: LedgerEntry,
}

impl Database {
    /// Run an audited mutation.
    ///
    /// `f` receives the write transaction and the commit timestamp. Exactly
    /// one audit row is appended per successful call; on any error nothing is
    /// committed.
    pub fn audited<T, F>(
        &self,
        ctx: &AuditContext,
        kind: EntityKind,
        action: LedgerAction,
        f: F,
    ) -> StorageResult<Audited<T>>
    where
        T: Serialize + Record,
        F: FnOnce(&WriteTransaction, DateTime<Utc>) -> StorageResult<Mutation<T>>,
    {
        let now = Utc::now();
        let audited = self.write(|txn| {
            let mutation = f(txn, now)?;
            let payload_hash = hashing::payload_hash(&mutation.record)?;
            let ledger = append_entry(
                txn,
                ctx,
                kind,
                action,
                mutation.record.id(),
                &payload_hash,
                now,
            )?;
            for event in mutation.timeline {
                append_event(txn, event, ctx.actor(), Some(&ledger.id), now)?;
            }
            Ok(Audited {
                record: mutation.record,
                ledger,
            })
        })?;

        tracing::info!(
            target: "audit",
            entity_type = kind.as_str(),
            entity_id = %audited.ledger.entity_id,
            action = action.as_str(),
            sequence = audited.ledger.sequence,
            tx_hash = %audited.ledger.tx_hash,
            actor = ?ctx.actor_user_id,
            "Audit row recorded"
        );

        Ok(audited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::{LedgerStatus, GENESIS_HASH};
    use crate::storage::database::{put_json, StorageError, NEWS};
    use crate::storage::LedgerRepository;

    #[derive(Debug, Serialize, serde::Deserialize)]
    struct Scratch {
        id: String,
        value: u32,
    }

    impl Record for Scratch {
        fn id(&self) -> &str {
            &self.id
        }
    }

    #[test]
    fn audited_write_appends_one_chained_row() {
        let db = Database::in_memory().unwrap();
        let ctx = AuditContext::system();

        let first = db
            .audited(&ctx, EntityKind::Case, LedgerAction::Create, |txn, _| {
                let scratch = Scratch { id: "p1".into(), value: 1 };
                put_json(txn, NEWS, &scratch)?;
                Ok(Mutation::new(scratch))
            })
            .unwrap();
        let second = db
            .audited(&ctx, EntityKind::Case, LedgerAction::Update, |_, _| {
                Ok(Mutation::new(Scratch { id: "p1".into(), value: 2 }))
            })
            .unwrap();

        assert_eq!(first.ledger.sequence, 1);
        assert_eq!(first.ledger.previous_hash, GENESIS_HASH);
        assert_eq!(second.ledger.sequence, 2);
        assert_eq!(second.ledger.previous_hash, first.ledger.tx_hash);
        assert_eq!(second.ledger.status, LedgerStatus::Pending);
        assert_ne!(first.ledger.payload_hash, second.ledger.payload_hash);

        let rows = LedgerRepository::new(&db).list_for_entity(EntityKind::Case, "p1").unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn failed_mutation_leaves_no_audit_row() {
        let db = Database::in_memory().unwrap();
        let result: StorageResult<Audited<Scratch>> = db.audited(
            &AuditContext::system(),
            EntityKind::Wallet,
            LedgerAction::Create,
            |_, _| Err(StorageError::Validation("nope".into())),
        );
        assert!(result.is_err());
        assert_eq!(LedgerRepository::new(&db).height().unwrap(), 0);
    }

    #[test]
    fn timeline_for_missing_case_rolls_back() {
        let db = Database::in_memory().unwrap();
        let result = db.audited(
            &AuditContext::system(),
            EntityKind::Wallet,
            LedgerAction::Create,
            |_, _| {
                Ok(Mutation::new(Scratch { id: "w1".into(), value: 0 }).with_timeline(
                    "no-such-case",
                    TimelineEventType::WalletAdded,
                    "added",
                ))
            },
        );
        assert!(matches!(result, Err(StorageError::ForeignKey(_))));
        assert_eq!(LedgerRepository::new(&db).height().unwrap(), 0);
    }
}
