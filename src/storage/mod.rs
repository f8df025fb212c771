// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Portal Storage
//!
//! Persistent storage for the case portal, backed by a single embedded
//! [redb](https://docs.rs/redb) database file (`$DATA_DIR/portal.redb`).
//!
//! ## Table Layout
//!
//! Every relational entity lives in its own table keyed by UUID, with the
//! record serialized as JSON. Unique human-readable identifiers (case numbers,
//! STR numbers, wallet addresses, usernames, ...) are enforced through
//! secondary index tables that map the natural key to the row ID.
//!
//! ```text
//! users            id -> User            usernames        lower(username) -> id
//! cases            id -> Case            case_numbers     CASE-YYYY-NNNNN -> id
//! wallets          id -> WatchedWallet   wallet_addresses chain:address   -> id
//! transactions     id -> Transaction     tx_hashes        chain:hash      -> id
//! str_reports      id -> StrReport       str_numbers      STR-YYYY-NNNNN  -> id
//! court_exports    id -> CourtExport     export_numbers   EXP-YYYY-NNNNN  -> id
//! blockchain_nodes id -> BlockchainNode  node_names       lower(name)     -> id
//! blockchain_transactions id -> LedgerEntry
//! ledger_sequence  seq -> ledger id
//! counters         name -> u64
//! ```
//!
//! Referential integrity is checked inside the write transaction that performs
//! the mutation, so a dangling reference never reaches disk.

pub mod audit;
pub mod database;
pub mod repository;

pub use audit::{AuditContext, Audited, Mutation};
pub use database::{Database, Page, Pagination, Record, StorageError, StorageResult};
pub use repository::*;
