// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded portal database backed by redb (pure Rust, ACID).
//!
//! Entity tables store JSON-encoded records keyed by UUID. Index tables map
//! unique natural keys to row IDs. All helpers here are table-agnostic; the
//! repositories in [`super::repository`] own the entity semantics.

use std::path::Path;

use redb::{
    backends::InMemoryBackend, ReadTransaction, ReadableDatabase, ReadableTable, TableDefinition,
    WriteTransaction,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use utoipa::IntoParams;

// =============================================================================
// Table Definitions
// =============================================================================

/// Entity table: row id -> JSON record.
pub(crate) type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;

/// Unique index: natural key -> row id.
pub(crate) type IndexTable = TableDefinition<'static, &'static str, &'static str>;

pub(crate) const USERS: JsonTable = TableDefinition::new("users");
pub(crate) const USERNAMES: IndexTable = TableDefinition::new("usernames");

pub(crate) const CASES: JsonTable = TableDefinition::new("cases");
pub(crate) const CASE_NUMBERS: IndexTable = TableDefinition::new("case_numbers");

pub(crate) const WALLETS: JsonTable = TableDefinition::new("wallets");
pub(crate) const WALLET_ADDRESSES: IndexTable = TableDefinition::new("wallet_addresses");

pub(crate) const TRANSACTIONS: JsonTable = TableDefinition::new("transactions");
pub(crate) const TX_HASHES: IndexTable = TableDefinition::new("tx_hashes");

pub(crate) const PATTERNS: JsonTable = TableDefinition::new("suspicious_patterns");

pub(crate) const STR_REPORTS: JsonTable = TableDefinition::new("str_reports");
pub(crate) const STR_NUMBERS: IndexTable = TableDefinition::new("str_numbers");

pub(crate) const TIMELINE: JsonTable = TableDefinition::new("case_timeline");

/// Keyed by `STATE_CODE:YEAR`.
pub(crate) const STATE_STATS: JsonTable = TableDefinition::new("state_fraud_stats");

pub(crate) const NODES: JsonTable = TableDefinition::new("blockchain_nodes");
pub(crate) const NODE_NAMES: IndexTable = TableDefinition::new("node_names");

pub(crate) const LEDGER: JsonTable = TableDefinition::new("blockchain_transactions");
/// Sequence number -> ledger row id, for chain-order scans.
pub(crate) const LEDGER_SEQUENCE: TableDefinition<'static, u64, &'static str> =
    TableDefinition::new("ledger_sequence");

pub(crate) const KYC: JsonTable = TableDefinition::new("kyc_information");

pub(crate) const EXPORTS: JsonTable = TableDefinition::new("court_exports");
pub(crate) const EXPORT_NUMBERS: IndexTable = TableDefinition::new("export_numbers");

pub(crate) const NEWS: JsonTable = TableDefinition::new("news");

/// Named monotonic counters (ID sequences, ledger height).
pub(crate) const COUNTERS: TableDefinition<'static, &'static str, u64> =
    TableDefinition::new("counters");

const JSON_TABLES: [JsonTable; 13] = [
    USERS,
    CASES,
    WALLETS,
    TRANSACTIONS,
    PATTERNS,
    STR_REPORTS,
    TIMELINE,
    STATE_STATS,
    NODES,
    LEDGER,
    KYC,
    EXPORTS,
    NEWS,
];

const INDEX_TABLES: [IndexTable; 7] = [
    USERNAMES,
    CASE_NUMBERS,
    WALLET_ADDRESSES,
    TX_HASHES,
    STR_NUMBERS,
    NODE_NAMES,
    EXPORT_NUMBERS,
];

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Entity addressed by the caller does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Unique natural key already taken.
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// A referenced row does not exist.
    #[error("referenced {0} does not exist")]
    ForeignKey(String),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("{0}")]
    Validation(String),

    /// Server-side failure outside the store, e.g. password hashing.
    #[error("internal error: {0}")]
    Internal(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// Records and Pagination
// =============================================================================

/// A row stored in one of the entity tables.
pub trait Record {
    /// Primary key of the row.
    fn id(&self) -> &str;
}

/// Limit/offset pagination for list endpoints.
#[derive(Debug, Clone, Copy, Deserialize, IntoParams)]
pub struct Pagination {
    /// Maximum number of items (default 50, max 500).
    pub limit: Option<usize>,
    /// Number of items to skip.
    pub offset: Option<usize>,
}

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MAX_PAGE_SIZE: usize = 500;

impl Pagination {
    pub fn new(limit: Option<usize>, offset: Option<usize>) -> Self {
        Self { limit, offset }
    }

    pub fn all() -> Self {
        Self {
            limit: Some(usize::MAX),
            offset: None,
        }
    }

    fn bounds(&self) -> (usize, usize) {
        let limit = match self.limit {
            Some(usize::MAX) => usize::MAX,
            Some(0) | None => DEFAULT_PAGE_SIZE,
            Some(n) => n.min(MAX_PAGE_SIZE),
        };
        (self.offset.unwrap_or(0), limit)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of a filtered list plus the total before paging.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> Page<T> {
    /// Slice an already filtered and ordered list.
    pub fn from_vec(items: Vec<T>, pagination: Pagination) -> Self {
        let total = items.len();
        let (offset, limit) = pagination.bounds();
        let items = items.into_iter().skip(offset).take(limit).collect();
        Self { items, total }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
        }
    }
}

// =============================================================================
// Table Helpers
// =============================================================================

/// Read and decode one JSON row.
pub(crate) fn get_json<T, Tbl>(table: &Tbl, id: &str) -> StorageResult<Option<T>>
where
    T: DeserializeOwned,
    Tbl: ReadableTable<&'static str, &'static [u8]>,
{
    match table.get(id)? {
        Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
        None => Ok(None),
    }
}

/// Decode every row of a JSON table.
pub(crate) fn all_json<T, Tbl>(table: &Tbl) -> StorageResult<Vec<T>>
where
    T: DeserializeOwned,
    Tbl: ReadableTable<&'static str, &'static [u8]>,
{
    let mut rows = Vec::new();
    for entry in table.iter()? {
        let (_, value) = entry?;
        rows.push(serde_json::from_slice(value.value())?);
    }
    Ok(rows)
}

/// Insert or overwrite a JSON row.
pub(crate) fn put_json<T: Serialize + Record>(
    txn: &WriteTransaction,
    def: JsonTable,
    record: &T,
) -> StorageResult<()> {
    let bytes = serde_json::to_vec(record)?;
    let mut table = txn.open_table(def)?;
    table.insert(record.id(), bytes.as_slice())?;
    Ok(())
}

/// Load a row inside a write transaction, failing with `NotFound`.
pub(crate) fn require_json<T: DeserializeOwned>(
    txn: &WriteTransaction,
    def: JsonTable,
    id: &str,
    what: &str,
) -> StorageResult<T> {
    let table = txn.open_table(def)?;
    let row = get_json(&table, id)?;
    row.ok_or_else(|| StorageError::NotFound(format!("{what} {id}")))
}

/// Check a foreign key inside a write transaction.
pub(crate) fn ensure_exists(
    txn: &WriteTransaction,
    def: JsonTable,
    id: &str,
    what: &str,
) -> StorageResult<()> {
    let table = txn.open_table(def)?;
    if table.get(id)?.is_none() {
        return Err(StorageError::ForeignKey(format!("{what} {id}")));
    }
    Ok(())
}

/// Reserve a unique natural key for `id`.
///
/// Re-claiming a key already owned by the same row is a no-op.
pub(crate) fn claim_unique(
    txn: &WriteTransaction,
    def: IndexTable,
    key: &str,
    id: &str,
    what: &str,
) -> StorageResult<()> {
    let mut index = txn.open_table(def)?;
    let owner = index.get(key)?.map(|v| v.value().to_string());
    match owner {
        Some(owner) if owner != id => Err(StorageError::AlreadyExists(format!("{what} {key}"))),
        Some(_) => Ok(()),
        None => {
            index.insert(key, id)?;
            Ok(())
        }
    }
}

/// Release a unique natural key.
pub(crate) fn release_unique(txn: &WriteTransaction, def: IndexTable, key: &str) -> StorageResult<()> {
    let mut index = txn.open_table(def)?;
    index.remove(key)?;
    Ok(())
}

/// Look up the row id owning a natural key.
pub(crate) fn lookup_unique<Tbl>(index: &Tbl, key: &str) -> StorageResult<Option<String>>
where
    Tbl: ReadableTable<&'static str, &'static str>,
{
    Ok(index.get(key)?.map(|v| v.value().to_string()))
}

/// Increment and return a named counter (first value is 1).
pub(crate) fn next_sequence(txn: &WriteTransaction, name: &str) -> StorageResult<u64> {
    let mut counters = txn.open_table(COUNTERS)?;
    let next = counters.get(name)?.map(|v| v.value()).unwrap_or(0) + 1;
    counters.insert(name, next)?;
    Ok(next)
}

/// Read a named counter without incrementing it.
pub(crate) fn current_sequence(txn: &ReadTransaction, name: &str) -> StorageResult<u64> {
    let counters = txn.open_table(COUNTERS)?;
    let current = counters.get(name)?.map(|v| v.value()).unwrap_or(0);
    Ok(current)
}

// =============================================================================
// Database
// =============================================================================

/// Embedded ACID portal database.
pub struct Database {
    db: redb::Database,
}

impl Database {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = redb::Database::create(path)?;
        Self::initialize(db)
    }

    /// Create a throwaway database held entirely in memory.
    pub fn in_memory() -> StorageResult<Self> {
        let db = redb::Builder::new().create_with_backend(InMemoryBackend::new())?;
        Self::initialize(db)
    }

    /// Pre-create all tables so later read transactions don't fail.
    fn initialize(db: redb::Database) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            for def in JSON_TABLES {
                let _ = write_txn.open_table(def)?;
            }
            for def in INDEX_TABLES {
                let _ = write_txn.open_table(def)?;
            }
            let _ = write_txn.open_table(LEDGER_SEQUENCE)?;
            let _ = write_txn.open_table(COUNTERS)?;
        }
        write_txn.commit()?;
        Ok(Self { db })
    }

    /// Run `f` against a consistent read snapshot.
    pub fn read<R>(&self, f: impl FnOnce(&ReadTransaction) -> StorageResult<R>) -> StorageResult<R> {
        let txn = self.db.begin_read()?;
        f(&txn)
    }

    /// Run `f` in a write transaction, committing only if it succeeds.
    pub fn write<R>(
        &self,
        f: impl FnOnce(&WriteTransaction) -> StorageResult<R>,
    ) -> StorageResult<R> {
        let txn = self.db.begin_write()?;
        match f(&txn) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(abort_err) = txn.abort() {
                    tracing::warn!(error = %abort_err, "Failed to abort write transaction");
                }
                Err(e)
            }
        }
    }

    /// Fetch a single row by id.
    pub(crate) fn fetch<T: DeserializeOwned>(
        &self,
        def: JsonTable,
        id: &str,
    ) -> StorageResult<Option<T>> {
        self.read(|txn| {
            let table = txn.open_table(def)?;
            get_json(&table, id)
        })
    }

    /// Fetch every row of a table.
    pub(crate) fn fetch_all<T: DeserializeOwned>(&self, def: JsonTable) -> StorageResult<Vec<T>> {
        self.read(|txn| {
            let table = txn.open_table(def)?;
            all_json(&table)
        })
    }

    /// Verify the database answers a read transaction.
    pub fn health_check(&self) -> StorageResult<()> {
        self.read(|txn| {
            let _ = current_sequence(txn, "ledger")?;
            Ok(())
        })
    }
}
