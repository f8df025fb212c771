// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Simulated blockchain verification layer.
//!
//! Audited mutations append hash-chained rows to the `blockchain_transactions`
//! table. Rows start `pending` and are confirmed by a background worker after
//! a fixed delay. There is no network or consensus: the chain exists so that
//! the trail can be checked for tampering.

pub mod confirmer;
pub mod hashing;
pub mod heartbeat;
pub mod types;

pub use confirmer::ConfirmationWorker;
pub use heartbeat::NodeHeartbeatTask;
pub use types::*;
