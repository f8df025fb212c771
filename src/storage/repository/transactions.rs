// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Traced on-chain transactions attached to cases.
//!
//! Transactions are unique per `(blockchain, tx_hash)`. They are not
//! audited, but each insert adds a case timeline entry.

use chrono::{DateTime, Utc};
use redb::WriteTransaction;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::super::audit::AuditContext;
use super::super::database::{
    all_json, claim_unique, ensure_exists, put_json, require_json, Database, Page, Pagination,
    Record, StorageError, StorageResult, CASES, TRANSACTIONS, TX_HASHES,
};
use super::timeline::{append_event, NewTimelineEvent, TimelineEventType};
use crate::models::{limit_text, normalize_currency, Blockchain};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TracedTransaction {
    pub id: String,
    pub case_id: String,
    pub tx_hash: String,
    pub blockchain: Blockchain,
    pub from_address: String,
    pub to_address: String,
    pub amount: f64,
    pub currency: String,
    pub occurred_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    pub is_suspicious: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for TracedTransaction {
    fn id(&self) -> &str {
        &self.id
    }
}

impl TracedTransaction {
    pub fn involves(&self, address: &str) -> bool {
        self.from_address == address || self.to_address == address
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewTransaction {
    pub case_id: String,
    pub tx_hash: String,
    pub blockchain: Blockchain,
    pub from_address: String,
    pub to_address: String,
    pub amount: f64,
    /// Defaults to the chain's native asset.
    #[serde(default)]
    pub currency: Option<String>,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub block_number: Option<u64>,
    #[serde(default)]
    pub is_suspicious: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct TransactionPatch {
    pub is_suspicious: Option<bool>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct TransactionFilter {
    pub case_id: Option<String>,
    pub blockchain: Option<Blockchain>,
    /// Matches either side of the transfer.
    pub address: Option<String>,
    pub suspicious: Option<bool>,
}

fn hash_key(blockchain: Blockchain, tx_hash: &str) -> String {
    format!("{}:{}", blockchain.as_str(), tx_hash)
}

/// Set `is_suspicious` on the given rows inside a write transaction.
///
/// Returns how many rows actually changed.
pub(crate) fn flag_suspicious(
    txn: &WriteTransaction,
    ids: &[String],
    now: DateTime<Utc>,
) -> StorageResult<usize> {
    let mut changed = 0;
    for id in ids {
        let mut tx: TracedTransaction = require_json(txn, TRANSACTIONS, id, "transaction")?;
        if !tx.is_suspicious {
            tx.is_suspicious = true;
            tx.updated_at = now;
            put_json(txn, TRANSACTIONS, &tx)?;
            changed += 1;
        }
    }
    Ok(changed)
}

/// Rows of one case inside a write transaction, oldest first.
pub(crate) fn case_transactions(
    txn: &WriteTransaction,
    case_id: &str,
) -> StorageResult<Vec<TracedTransaction>> {
    let table = txn.open_table(TRANSACTIONS)?;
    let mut rows: Vec<TracedTransaction> = all_json(&table)?;
    rows.retain(|t| t.case_id == case_id);
    rows.sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at));
    Ok(rows)
}

pub struct TransactionRepository<'a> {
    db: &'a Database,
}

impl<'a> TransactionRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn get(&self, id: &str) -> StorageResult<TracedTransaction> {
        self.db
            .fetch(TRANSACTIONS, id)?
            .ok_or_else(|| StorageError::NotFound(format!("transaction {id}")))
    }

    /// Most recent transfer first.
    pub fn list(&self, filter: &TransactionFilter, pagination: Pagination) -> StorageResult<Page<TracedTransaction>> {
        let address = filter.address.as_deref().map(str::trim);
        let mut rows: Vec<TracedTransaction> = self.db.fetch_all(TRANSACTIONS)?;
        rows.retain(|t| {
            filter.case_id.as_deref().is_none_or(|c| t.case_id == c)
                && filter.blockchain.is_none_or(|b| t.blockchain == b)
                && filter.suspicious.is_none_or(|s| t.is_suspicious == s)
                && address.is_none_or(|a| {
                    t.from_address.eq_ignore_ascii_case(a) || t.to_address.eq_ignore_ascii_case(a)
                })
        });
        rows.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        Ok(Page::from_vec(rows, pagination))
    }

    /// Oldest first.
    pub fn for_case(&self, case_id: &str) -> StorageResult<Vec<TracedTransaction>> {
        let mut rows: Vec<TracedTransaction> = self.db.fetch_all(TRANSACTIONS)?;
        rows.retain(|t| t.case_id == case_id);
        rows.sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at));
        Ok(rows)
    }

    /// Transfers touching a normalized address on one chain, most recent first.
    pub fn for_address(
        &self,
        blockchain: Blockchain,
        address: &str,
        pagination: Pagination,
    ) -> StorageResult<Page<TracedTransaction>> {
        let mut rows: Vec<TracedTransaction> = self.db.fetch_all(TRANSACTIONS)?;
        rows.retain(|t| t.blockchain == blockchain && t.involves(address));
        rows.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        Ok(Page::from_vec(rows, pagination))
    }

    pub fn all(&self) -> StorageResult<Vec<TracedTransaction>> {
        self.db.fetch_all(TRANSACTIONS)
    }

    pub fn create(&self, ctx: &AuditContext, new: NewTransaction) -> StorageResult<TracedTransaction> {
        let chain = new.blockchain;
        let tx_hash = chain.normalize_tx_hash(&new.tx_hash).map_err(StorageError::Validation)?;
        let from_address = chain
            .normalize_address(&new.from_address)
            .map_err(|e| StorageError::Validation(format!("from_address: {e}")))?;
        let to_address = chain
            .normalize_address(&new.to_address)
            .map_err(|e| StorageError::Validation(format!("to_address: {e}")))?;
        if !new.amount.is_finite() || new.amount <= 0.0 {
            return Err(StorageError::Validation("amount must be greater than zero".to_string()));
        }
        let currency = match new.currency.as_deref().or(chain.native_currency()) {
            Some(code) => normalize_currency(code).map_err(StorageError::Validation)?,
            None => return Err(StorageError::Validation("currency is required".to_string())),
        };
        limit_text("notes", new.notes.as_deref(), 5_000).map_err(StorageError::Validation)?;

        let now = Utc::now();
        let tx = TracedTransaction {
            id: uuid::Uuid::new_v4().to_string(),
            case_id: new.case_id,
            tx_hash,
            blockchain: chain,
            from_address,
            to_address,
            amount: new.amount,
            currency,
            occurred_at: new.occurred_at,
            block_number: new.block_number,
            is_suspicious: new.is_suspicious,
            notes: new.notes,
            created_by: ctx.actor_user_id.clone(),
            created_at: now,
            updated_at: now,
        };

        self.db.write(|txn| {
            ensure_exists(txn, CASES, &tx.case_id, "case")?;
            claim_unique(txn, TX_HASHES, &hash_key(tx.blockchain, &tx.tx_hash), &tx.id, "transaction")?;
            put_json(txn, TRANSACTIONS, &tx)?;
            append_event(
                txn,
                NewTimelineEvent {
                    case_id: tx.case_id.clone(),
                    event_type: TimelineEventType::TransactionAdded,
                    description: format!(
                        "Traced {} {} from {} to {}",
                        tx.amount, tx.currency, tx.from_address, tx.to_address
                    ),
                },
                ctx.actor(),
                None,
                now,
            )?;
            Ok(())
        })?;
        Ok(tx)
    }

    pub fn update(&self, id: &str, patch: TransactionPatch) -> StorageResult<TracedTransaction> {
        limit_text("notes", patch.notes.as_deref(), 5_000).map_err(StorageError::Validation)?;
        self.db.write(|txn| {
            let mut tx: TracedTransaction = require_json(txn, TRANSACTIONS, id, "transaction")?;
            if let Some(flag) = patch.is_suspicious {
                tx.is_suspicious = flag;
            }
            if let Some(notes) = patch.notes {
                tx.notes = Some(notes);
            }
            tx.updated_at = Utc::now();
            put_json(txn, TRANSACTIONS, &tx)?;
            Ok(tx)
        })
    }
}
