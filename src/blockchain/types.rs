// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit-trail types: ledger rows and verification nodes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Department;
use crate::storage::Record;

/// Previous hash of the first row in the chain.
pub const GENESIS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Kind of entity an audit row refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Case,
    Wallet,
    StrReport,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Case => "case",
            EntityKind::Wallet => "wallet",
            EntityKind::StrReport => "str_report",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "case" => Some(EntityKind::Case),
            "wallet" => Some(EntityKind::Wallet),
            "str_report" => Some(EntityKind::StrReport),
            _ => None,
        }
    }
}

/// Mutation recorded by an audit row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LedgerAction {
    Create,
    Update,
}

impl LedgerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerAction::Create => "create",
            LedgerAction::Update => "update",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LedgerStatus {
    Pending,
    Confirmed,
}

/// One node's acknowledgement of an audit row.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NodeConfirmation {
    pub node_id: String,
    pub node_name: String,
    pub confirmed_at: DateTime<Utc>,
}

/// A row of the `blockchain_transactions` table.
///
/// Rows are append-only apart from the status/confirmation fields, which the
/// confirmation worker fills in. Those fields are not part of the hash.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LedgerEntry {
    pub id: String,
    /// Position in the chain, starting at 1.
    pub sequence: u64,
    /// Hash of this row (hex SHA-256).
    pub tx_hash: String,
    pub previous_hash: String,
    /// Hash of the mutated record as serialized at commit time.
    pub payload_hash: String,
    pub entity_type: EntityKind,
    pub entity_id: String,
    pub action: LedgerAction,
    /// `None` for system-initiated mutations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_user_id: Option<String>,
    /// Node that submitted the row.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    pub status: LedgerStatus,
    pub required_confirmations: u32,
    #[serde(default)]
    pub confirmations: Vec<NodeConfirmation>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl Record for LedgerEntry {
    fn id(&self) -> &str {
        &self.id
    }
}

impl LedgerEntry {
    /// Recompute the row hash from its chained fields.
    pub fn compute_hash(&self) -> String {
        super::hashing::entry_hash(
            &self.previous_hash,
            self.sequence,
            self.entity_type,
            &self.entity_id,
            self.action,
            &self.payload_hash,
            &self.created_at,
        )
    }

    pub fn is_pending(&self) -> bool {
        self.status == LedgerStatus::Pending
    }
}

// =============================================================================
// Verification Nodes
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Active,
    Inactive,
    Maintenance,
}

/// A named participant that "confirms" audit rows.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BlockchainNode {
    pub id: String,
    /// Unique node name.
    pub name: String,
    pub organization: Department,
    pub endpoint: String,
    pub status: NodeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for BlockchainNode {
    fn id(&self) -> &str {
        &self.id
    }
}

impl BlockchainNode {
    pub fn is_active(&self) -> bool {
        self.status == NodeStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_kind_round_trips_through_str() {
        for kind in [EntityKind::Case, EntityKind::Wallet, EntityKind::StrReport] {
            assert_eq!(EntityKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(EntityKind::from_str("user"), None);
    }

    #[test]
    fn genesis_hash_is_64_zeros() {
        assert_eq!(GENESIS_HASH.len(), 64);
        assert!(GENESIS_HASH.chars().all(|c| c == '0'));
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&LedgerStatus::Pending).unwrap(),
            "\"pending\""
        );
        assert_eq!(
            serde_json::to_string(&EntityKind::StrReport).unwrap(),
            "\"str_report\""
        );
    }
}
