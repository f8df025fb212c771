// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! SHA-256 hash chaining for the audit trail.
//!
//! ```text
//! tx_hash = sha256(previous_hash | sequence | entity_type | entity_id | action | payload_hash | created_at)
//! ```
//!
//! `created_at` is rendered as RFC 3339 with nanoseconds so the hash survives
//! a JSON round trip unchanged.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use super::types::{EntityKind, LedgerAction, LedgerEntry, GENESIS_HASH};

/// Hex SHA-256 of arbitrary bytes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Hash of a record's canonical JSON (object keys sorted).
pub fn payload_hash<T: Serialize>(record: &T) -> Result<String, serde_json::Error> {
    // `Value` keeps object keys in a BTreeMap, which gives a stable order.
    let value = serde_json::to_value(record)?;
    let bytes = serde_json::to_vec(&value)?;
    Ok(sha256_hex(&bytes))
}

/// Hash of one chained audit row.
pub fn entry_hash(
    previous_hash: &str,
    sequence: u64,
    entity_type: EntityKind,
    entity_id: &str,
    action: LedgerAction,
    payload_hash: &str,
    created_at: &DateTime<Utc>,
) -> String {
    let material = format!(
        "{}|{}|{}|{}|{}|{}|{}",
        previous_hash,
        sequence,
        entity_type.as_str(),
        entity_id,
        action.as_str(),
        payload_hash,
        created_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
    );
    sha256_hex(material.as_bytes())
}

/// Why verification stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChainFault {
    /// Sequence numbers are not contiguous.
    SequenceGap,
    /// `previous_hash` does not match the prior row's hash.
    BrokenLink,
    /// Stored hash does not match the recomputed one.
    HashMismatch,
}

/// First row that failed verification.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChainBreak {
    pub sequence: u64,
    pub ledger_id: String,
    pub fault: ChainFault,
}

/// Result of walking the audit chain.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChainVerification {
    pub valid: bool,
    /// Rows checked before stopping.
    pub checked: u64,
    /// Hash of the last valid row (genesis hash for an empty chain).
    pub head_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_invalid: Option<ChainBreak>,
}

/// Walk rows in sequence order and report the first broken one.
pub fn verify_chain(entries: &[LedgerEntry]) -> ChainVerification {
    let mut expected_previous = GENESIS_HASH.to_string();
    let mut checked = 0u64;

    for (index, entry) in entries.iter().enumerate() {
        let fault = if entry.sequence != index as u64 + 1 {
            Some(ChainFault::SequenceGap)
        } else if entry.previous_hash != expected_previous {
            Some(ChainFault::BrokenLink)
        } else if entry.compute_hash() != entry.tx_hash {
            Some(ChainFault::HashMismatch)
        } else {
            None
        };

        if let Some(fault) = fault {
            return ChainVerification {
                valid: false,
                checked,
                head_hash: expected_previous,
                first_invalid: Some(ChainBreak {
                    sequence: entry.sequence,
                    ledger_id: entry.id.clone(),
                    fault,
                }),
            };
        }

        checked += 1;
        expected_previous = entry.tx_hash.clone();
    }

    ChainVerification {
        valid: true,
        checked,
        head_hash: expected_previous,
        first_invalid: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::LedgerStatus;

    fn chain(len: u64) -> Vec<LedgerEntry> {
        let mut previous = GENESIS_HASH.to_string();
        let mut rows = Vec::new();
        for sequence in 1..=len {
            let mut entry = LedgerEntry {
                id: format!("row-{sequence}"),
                sequence,
                tx_hash: String::new(),
                previous_hash: previous.clone(),
                payload_hash: sha256_hex(format!("payload-{sequence}").as_bytes()),
                entity_type: EntityKind::Case,
                entity_id: "case-1".into(),
                action: LedgerAction::Update,
                actor_user_id: None,
                node_id: None,
                status: LedgerStatus::Pending,
                required_confirmations: 1,
                confirmations: Vec::new(),
                created_at: Utc::now(),
                confirmed_at: None,
            };
            entry.tx_hash = entry.compute_hash();
            previous = entry.tx_hash.clone();
            rows.push(entry);
        }
        rows
    }

    #[test]
    fn sha256_of_empty_input() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn payload_hash_ignores_field_order() {
        let a = serde_json::json!({"a": 1, "b": [1, 2]});
        let b = serde_json::json!({"b": [1, 2], "a": 1});
        assert_eq!(payload_hash(&a).unwrap(), payload_hash(&b).unwrap());
    }

    #[test]
    fn hash_survives_json_round_trip() {
        let rows = chain(1);
        let json = serde_json::to_string(&rows[0]).unwrap();
        let back: LedgerEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.compute_hash(), rows[0].tx_hash);
    }

    #[test]
    fn intact_chain_verifies() {
        let rows = chain(5);
        let report = verify_chain(&rows);
        assert!(report.valid);
        assert_eq!(report.checked, 5);
        assert_eq!(report.head_hash, rows[4].tx_hash);
    }

    #[test]
    fn empty_chain_is_valid() {
        let report = verify_chain(&[]);
        assert!(report.valid);
        assert_eq!(report.head_hash, GENESIS_HASH);
    }

    #[test]
    fn tampered_field_is_detected() {
        let mut rows = chain(4);
        rows[2].entity_id = "case-2".into();
        let report = verify_chain(&rows);
        assert!(!report.valid);
        assert_eq!(report.checked, 2);
        let broken = report.first_invalid.unwrap();
        assert_eq!(broken.sequence, 3);
        assert_eq!(broken.fault, ChainFault::HashMismatch);
    }

    #[test]
    fn rehashed_row_breaks_next_link() {
        let mut rows = chain(3);
        rows[1].payload_hash = sha256_hex(b"forged");
        rows[1].tx_hash = rows[1].compute_hash();
        let broken = verify_chain(&rows).first_invalid.unwrap();
        assert_eq!(broken.sequence, 3);
        assert_eq!(broken.fault, ChainFault::BrokenLink);
    }

    #[test]
    fn missing_row_is_a_gap() {
        let mut rows = chain(3);
        rows.remove(1);
        let broken = verify_chain(&rows).first_invalid.unwrap();
        assert_eq!(broken.fault, ChainFault::SequenceGap);
    }
}
