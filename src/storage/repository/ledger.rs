// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! `blockchain_transactions` repository.
//!
//! Rows are appended only through [`append_entry`], which runs inside the
//! audited write transaction. `LEDGER_SEQUENCE` maps sequence numbers to row
//! ids so the chain can be walked in order.

use chrono::{DateTime, Duration, Utc};
use redb::{ReadableTable, WriteTransaction};
use serde::Deserialize;
use utoipa::IntoParams;

use super::super::audit::AuditContext;
use super::super::database::{
    all_json, current_sequence, get_json, next_sequence, put_json, Database, Page, Pagination,
    StorageError, StorageResult, LEDGER, LEDGER_SEQUENCE, NODES,
};
use crate::blockchain::{
    BlockchainNode, EntityKind, LedgerAction, LedgerEntry, LedgerStatus, NodeConfirmation,
    GENESIS_HASH,
};

/// Counter name for chain positions.
pub(crate) const LEDGER_COUNTER: &str = "ledger";

/// Filters for listing audit rows.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct LedgerFilter {
    pub entity_type: Option<EntityKind>,
    pub entity_id: Option<String>,
    pub status: Option<LedgerStatus>,
}

impl LedgerFilter {
    fn matches(&self, entry: &LedgerEntry) -> bool {
        self.entity_type.is_none_or(|k| entry.entity_type == k)
            && self.entity_id.as_deref().is_none_or(|id| entry.entity_id == id)
            && self.status.is_none_or(|s| entry.status == s)
    }
}

/// Append a chained audit row in the caller's write transaction.
pub(crate) fn append_entry(
    txn: &WriteTransaction,
    ctx: &AuditContext,
    kind: EntityKind,
    action: LedgerAction,
    entity_id: &str,
    payload_hash: &str,
    now: DateTime<Utc>,
) -> StorageResult<LedgerEntry> {
    let sequence = next_sequence(txn, LEDGER_COUNTER)?;
    let previous_hash = if sequence == 1 {
        GENESIS_HASH.to_string()
    } else {
        let previous: LedgerEntry = {
            let order = txn.open_table(LEDGER_SEQUENCE)?;
            let previous_id = order
                .get(sequence - 1)?
                .map(|v| v.value().to_string())
                .ok_or_else(|| StorageError::NotFound(format!("ledger row #{}", sequence - 1)))?;
            let ledger = txn.open_table(LEDGER)?;
            get_json(&ledger, &previous_id)?
                .ok_or_else(|| StorageError::NotFound(format!("ledger row {previous_id}")))?
        };
        previous.tx_hash
    };

    let active = active_nodes(txn)?;
    let node_id = ctx
        .department
        .and_then(|dept| active.iter().find(|n| n.organization == dept))
        .map(|n| n.id.clone());

    let mut entry = LedgerEntry {
        id: uuid::Uuid::new_v4().to_string(),
        sequence,
        tx_hash: String::new(),
        previous_hash,
        payload_hash: payload_hash.to_string(),
        entity_type: kind,
        entity_id: entity_id.to_string(),
        action,
        actor_user_id: ctx.actor_user_id.clone(),
        node_id,
        status: LedgerStatus::Pending,
        required_confirmations: active.len().max(1) as u32,
        confirmations: Vec::new(),
        created_at: now,
        confirmed_at: None,
    };
    entry.tx_hash = entry.compute_hash();

    put_json(txn, LEDGER, &entry)?;
    let mut order = txn.open_table(LEDGER_SEQUENCE)?;
    order.insert(sequence, entry.id.as_str())?;

    Ok(entry)
}

fn active_nodes(txn: &WriteTransaction) -> StorageResult<Vec<BlockchainNode>> {
    let table = txn.open_table(NODES)?;
    let mut nodes: Vec<BlockchainNode> = all_json(&table)?;
    nodes.retain(|n| n.is_active());
    nodes.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(nodes)
}

/// Read access to the audit trail plus the confirmation sweep.
pub struct LedgerRepository<'a> {
    db: &'a Database,
}

impl<'a> LedgerRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn get(&self, id: &str) -> StorageResult<LedgerEntry> {
        self.db
            .fetch(LEDGER, id)?
            .ok_or_else(|| StorageError::NotFound(format!("blockchain transaction {id}")))
    }

    /// Newest first.
    pub fn list(&self, filter: &LedgerFilter, pagination: Pagination) -> StorageResult<Page<LedgerEntry>> {
        let mut rows: Vec<LedgerEntry> = self.db.fetch_all(LEDGER)?;
        rows.retain(|e| filter.matches(e));
        rows.sort_by(|a, b| b.sequence.cmp(&a.sequence));
        Ok(Page::from_vec(rows, pagination))
    }

    /// Audit history of one entity, oldest first.
    pub fn list_for_entity(&self, kind: EntityKind, entity_id: &str) -> StorageResult<Vec<LedgerEntry>> {
        let mut rows: Vec<LedgerEntry> = self.db.fetch_all(LEDGER)?;
        rows.retain(|e| e.entity_type == kind && e.entity_id == entity_id);
        rows.sort_by_key(|e| e.sequence);
        Ok(rows)
    }

    /// Every row in chain order, following the sequence index.
    pub fn in_sequence(&self) -> StorageResult<Vec<LedgerEntry>> {
        self.db.read(|txn| {
            let order = txn.open_table(LEDGER_SEQUENCE)?;
            let ledger = txn.open_table(LEDGER)?;
            let mut rows = Vec::new();
            for item in order.iter()? {
                let (_, id) = item?;
                if let Some(entry) = get_json::<LedgerEntry, _>(&ledger, id.value())? {
                    rows.push(entry);
                }
            }
            Ok(rows)
        })
    }

    /// Number of rows appended so far.
    pub fn height(&self) -> StorageResult<u64> {
        self.db.read(|txn| current_sequence(txn, LEDGER_COUNTER))
    }

    pub fn pending_count(&self) -> StorageResult<usize> {
        let rows: Vec<LedgerEntry> = self.db.fetch_all(LEDGER)?;
        Ok(rows.iter().filter(|e| e.is_pending()).count())
    }

    /// Ids of pending rows created at least `delay` before `now`, read from
    /// a snapshot.
    pub fn due_ids(&self, now: DateTime<Utc>, delay: Duration) -> StorageResult<Vec<String>> {
        let mut due: Vec<LedgerEntry> = self.db.fetch_all(LEDGER)?;
        due.retain(|e| is_due(e, now, delay));
        due.sort_by_key(|e| e.sequence);
        Ok(due.into_iter().map(|e| e.id).collect())
    }

    /// Confirm every pending row created at least `delay` before `now`.
    ///
    /// Each confirmed row receives one confirmation per currently active
    /// node. Returns the rows that changed, in sequence order. An idle sweep
    /// only takes a read snapshot.
    pub fn confirm_due(&self, now: DateTime<Utc>, delay: Duration) -> StorageResult<Vec<LedgerEntry>> {
        let ids = self.due_ids(now, delay)?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.db.write(|txn| {
            let mut due = Vec::with_capacity(ids.len());
            {
                let table = txn.open_table(LEDGER)?;
                for id in &ids {
                    // Re-checked: another sweep may have confirmed it since the snapshot.
                    if let Some(entry) = get_json::<LedgerEntry, _>(&table, id.as_str())? {
                        if is_due(&entry, now, delay) {
                            due.push(entry);
                        }
                    }
                }
            }
            if due.is_empty() {
                return Ok(due);
            }

            let active = active_nodes(txn)?;
            for entry in &mut due {
                entry.status = LedgerStatus::Confirmed;
                entry.confirmed_at = Some(now);
                entry.confirmations = active
                    .iter()
                    .map(|node| NodeConfirmation {
                        node_id: node.id.clone(),
                        node_name: node.name.clone(),
                        confirmed_at: now,
                    })
                    .collect();
                put_json(txn, LEDGER, &*entry)?;
            }
            Ok(due)
        })
    }
}

fn is_due(entry: &LedgerEntry, now: DateTime<Utc>, delay: Duration) -> bool {
    entry.is_pending() && entry.created_at + delay <= now
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::hashing::verify_chain;
    use crate::models::Department;
    use crate::storage::NodeRepository;

    fn append(db: &Database, ctx: &AuditContext, entity_id: &str, at: DateTime<Utc>) -> LedgerEntry {
        db.write(|txn| append_entry(txn, ctx, EntityKind::Case, LedgerAction::Create, entity_id, "ab", at))
            .unwrap()
    }

    #[test]
    fn rows_chain_and_verify() {
        let db = Database::in_memory().unwrap();
        let ctx = AuditContext::system();
        let now = Utc::now();
        let a = append(&db, &ctx, "c1", now);
        let b = append(&db, &ctx, "c2", now);

        assert_eq!(b.previous_hash, a.tx_hash);
        let repo = LedgerRepository::new(&db);
        assert_eq!(repo.height().unwrap(), 2);
        let chain = repo.in_sequence().unwrap();
        assert!(verify_chain(&chain).valid);
    }

    #[test]
    fn submitting_node_matches_department() {
        let db = Database::in_memory().unwrap();
        NodeRepository::new(&db).seed_defaults().unwrap();
        let ctx = AuditContext::user("u1", Department::Cbi);

        let entry = append(&db, &ctx, "c1", Utc::now());
        let node = NodeRepository::new(&db).get(entry.node_id.as_deref().unwrap()).unwrap();
        assert_eq!(node.organization, Department::Cbi);
        assert_eq!(entry.required_confirmations as usize, Department::ALL.len());

        let system = append(&db, &AuditContext::system(), "c2", Utc::now());
        assert!(system.node_id.is_none());
    }

    #[test]
    fn required_confirmations_is_at_least_one() {
        let db = Database::in_memory().unwrap();
        let entry = append(&db, &AuditContext::system(), "c1", Utc::now());
        assert_eq!(entry.required_confirmations, 1);
    }

    #[test]
    fn confirm_due_only_flips_old_rows() {
        let db = Database::in_memory().unwrap();
        NodeRepository::new(&db).seed_defaults().unwrap();
        let ctx = AuditContext::system();
        let now = Utc::now();
        let old = append(&db, &ctx, "old", now - Duration::seconds(10));
        let fresh = append(&db, &ctx, "fresh", now);

        let repo = LedgerRepository::new(&db);
        let confirmed = repo.confirm_due(now, Duration::seconds(3)).unwrap();
        assert_eq!(confirmed.len(), 1);
        assert_eq!(confirmed[0].id, old.id);
        assert_eq!(confirmed[0].confirmations.len(), Department::ALL.len());

        assert_eq!(repo.get(&old.id).unwrap().status, LedgerStatus::Confirmed);
        assert_eq!(repo.get(&fresh.id).unwrap().status, LedgerStatus::Pending);
        assert_eq!(repo.pending_count().unwrap(), 1);

        // Already confirmed rows are not touched again
        assert!(repo.confirm_due(now, Duration::seconds(3)).unwrap().is_empty());
    }

    #[test]
    fn idle_sweep_finds_nothing_due() {
        let db = Database::in_memory().unwrap();
        let repo = LedgerRepository::new(&db);
        let now = Utc::now();
        assert!(repo.due_ids(now, Duration::seconds(3)).unwrap().is_empty());
        assert!(repo.confirm_due(now, Duration::seconds(3)).unwrap().is_empty());

        let ctx = AuditContext::system();
        let first = append(&db, &ctx, "c1", now - Duration::seconds(9));
        let second = append(&db, &ctx, "c2", now - Duration::seconds(8));
        append(&db, &ctx, "c3", now);
        assert_eq!(repo.due_ids(now, Duration::seconds(3)).unwrap(), vec![first.id, second.id]);

        repo.confirm_due(now, Duration::seconds(3)).unwrap();
        assert!(repo.due_ids(now, Duration::seconds(3)).unwrap().is_empty());
        assert_eq!(repo.height().unwrap(), 3);
    }

    #[test]
    fn confirmation_keeps_chain_valid() {
        let db = Database::in_memory().unwrap();
        let now = Utc::now();
        append(&db, &AuditContext::system(), "c1", now - Duration::seconds(5));
        let repo = LedgerRepository::new(&db);
        repo.confirm_due(now, Duration::seconds(1)).unwrap();
        assert!(verify_chain(&repo.in_sequence().unwrap()).valid);
    }

    #[test]
    fn list_filters_and_orders_newest_first() {
        let db = Database::in_memory().unwrap();
        let ctx = AuditContext::system();
        let now = Utc::now();
        append(&db, &ctx, "c1", now);
        append(&db, &ctx, "c2", now);
        append(&db, &ctx, "c1", now);

        let repo = LedgerRepository::new(&db);
        let all = repo.list(&LedgerFilter::default(), Pagination::default()).unwrap();
        assert_eq!(all.total, 3);
        assert_eq!(all.items[0].sequence, 3);

        let filter = LedgerFilter {
            entity_id: Some("c1".into()),
            ..Default::default()
        };
        let page = repo.list(&filter, Pagination::default()).unwrap();
        assert_eq!(page.total, 2);
        assert!(repo.get("missing").is_err());
    }
}
