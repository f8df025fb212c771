// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Cryptocurrency fraud case portal for law enforcement.
//!
//! Investigators register fraud cases, watch wallets, trace transactions and
//! file suspicious transaction reports. Every case, wallet and STR mutation
//! appends a hash-chained audit row that a set of confirmation nodes
//! acknowledges in the background.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers and the `/ws` event stream (Axum)
//! - `auth` - Password login, JWT issuance and role checks
//! - `analysis` - Suspicious pattern detection over traced transactions
//! - `blockchain` - Audit ledger types, hashing and background workers
//! - `reports` - STR documents and court evidence bundles
//! - `storage` - Embedded redb database and repositories

pub mod analysis;
pub mod api;
pub mod auth;
pub mod blockchain;
pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod reports;
pub mod state;
pub mod storage;
