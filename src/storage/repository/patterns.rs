// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Suspicious pattern repository.
//!
//! Patterns are either recorded by an analyst or produced by the detectors
//! in [`crate::analysis`]. Automatic runs skip patterns that were already
//! recorded for the same case, type and transactions.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use redb::WriteTransaction;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::super::audit::AuditContext;
use super::super::database::{
    all_json, ensure_exists, put_json, require_json, Database, Page, Pagination, Record,
    StorageError, StorageResult, CASES, PATTERNS, TRANSACTIONS,
};
use super::timeline::{append_event, NewTimelineEvent, TimelineEventType};
use super::transactions::{case_transactions, flag_suspicious, TracedTransaction};
use crate::analysis::DetectedPattern;
use crate::models::{limit_text, require_text};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    /// Deposits kept just under the reporting threshold
    Structuring,
    /// Funds passed through an address within minutes
    RapidMovement,
    /// One source paying many recipients
    FanOut,
    /// Repeated exact round amounts
    RoundAmounts,
    /// Interaction with a mixer or tumbler
    Mixing,
    Other,
}

impl PatternType {
    pub fn label(&self) -> &'static str {
        match self {
            PatternType::Structuring => "Structuring",
            PatternType::RapidMovement => "Rapid movement",
            PatternType::FanOut => "Fan-out",
            PatternType::RoundAmounts => "Round amounts",
            PatternType::Mixing => "Mixing",
            PatternType::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PatternStatus {
    New,
    Confirmed,
    Dismissed,
}

impl Default for PatternStatus {
    fn default() -> Self {
        Self::New
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PatternSource {
    Manual,
    Automatic,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SuspiciousPattern {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_id: Option<String>,
    pub pattern_type: PatternType,
    pub severity: Severity,
    /// 0.0 - 1.0
    pub confidence: f64,
    pub description: String,
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default)]
    pub transaction_ids: Vec<String>,
    pub status: PatternStatus,
    pub source: PatternSource,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for SuspiciousPattern {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewPattern {
    #[serde(default)]
    pub case_id: Option<String>,
    pub pattern_type: PatternType,
    pub severity: Severity,
    pub confidence: f64,
    pub description: String,
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default)]
    pub transaction_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct PatternPatch {
    pub severity: Option<Severity>,
    pub status: Option<PatternStatus>,
    pub confidence: Option<f64>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct PatternFilter {
    pub case_id: Option<String>,
    pub pattern_type: Option<PatternType>,
    pub severity: Option<Severity>,
    pub status: Option<PatternStatus>,
}

/// Result of persisting one detector run.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DetectionOutcome {
    pub case_id: String,
    pub transactions_analyzed: usize,
    /// Newly recorded patterns.
    pub patterns: Vec<SuspiciousPattern>,
    /// Detections already on record.
    pub skipped_duplicates: usize,
    /// Transactions newly marked suspicious.
    pub flagged_transactions: usize,
}

fn validate_confidence(confidence: f64) -> Result<(), String> {
    if !(0.0..=1.0).contains(&confidence) {
        return Err("confidence must be between 0 and 1".to_string());
    }
    Ok(())
}

fn insert_pattern(
    txn: &WriteTransaction,
    pattern: &SuspiciousPattern,
    actor: Option<&str>,
) -> StorageResult<()> {
    if let Some(case_id) = &pattern.case_id {
        ensure_exists(txn, CASES, case_id, "case")?;
    }
    for tx_id in &pattern.transaction_ids {
        ensure_exists(txn, TRANSACTIONS, tx_id, "transaction")?;
    }
    put_json(txn, PATTERNS, pattern)?;
    if let Some(case_id) = &pattern.case_id {
        append_event(
            txn,
            NewTimelineEvent {
                case_id: case_id.clone(),
                event_type: TimelineEventType::PatternDetected,
                description: format!(
                    "{} pattern ({:?} severity): {}",
                    pattern.pattern_type.label(),
                    pattern.severity,
                    pattern.description
                ),
            },
            actor,
            None,
            pattern.created_at,
        )?;
    }
    Ok(())
}

pub struct PatternRepository<'a> {
    db: &'a Database,
}

impl<'a> PatternRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn get(&self, id: &str) -> StorageResult<SuspiciousPattern> {
        self.db
            .fetch(PATTERNS, id)?
            .ok_or_else(|| StorageError::NotFound(format!("pattern {id}")))
    }

    /// Most severe first, then newest.
    pub fn list(&self, filter: &PatternFilter, pagination: Pagination) -> StorageResult<Page<SuspiciousPattern>> {
        let mut rows: Vec<SuspiciousPattern> = self.db.fetch_all(PATTERNS)?;
        rows.retain(|p| {
            filter
                .case_id
                .as_deref()
                .is_none_or(|c| p.case_id.as_deref() == Some(c))
                && filter.pattern_type.is_none_or(|t| p.pattern_type == t)
                && filter.severity.is_none_or(|s| p.severity == s)
                && filter.status.is_none_or(|s| p.status == s)
        });
        rows.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(Page::from_vec(rows, pagination))
    }

    pub fn for_case(&self, case_id: &str) -> StorageResult<Vec<SuspiciousPattern>> {
        let filter = PatternFilter {
            case_id: Some(case_id.to_string()),
            ..Default::default()
        };
        Ok(self.list(&filter, Pagination::all())?.items)
    }

    pub fn create(&self, ctx: &AuditContext, new: NewPattern) -> StorageResult<SuspiciousPattern> {
        validate_confidence(new.confidence).map_err(StorageError::Validation)?;
        require_text("description", &new.description, 2_000).map_err(StorageError::Validation)?;
        let now = Utc::now();
        let pattern = SuspiciousPattern {
            id: uuid::Uuid::new_v4().to_string(),
            case_id: new.case_id,
            pattern_type: new.pattern_type,
            severity: new.severity,
            confidence: new.confidence,
            description: new.description,
            addresses: new.addresses,
            transaction_ids: new.transaction_ids,
            status: PatternStatus::New,
            source: PatternSource::Manual,
            created_by: ctx.actor_user_id.clone(),
            created_at: now,
            updated_at: now,
        };
        self.db.write(|txn| insert_pattern(txn, &pattern, ctx.actor()))?;
        Ok(pattern)
    }

    pub fn update(&self, id: &str, patch: PatternPatch) -> StorageResult<SuspiciousPattern> {
        if let Some(confidence) = patch.confidence {
            validate_confidence(confidence).map_err(StorageError::Validation)?;
        }
        limit_text("description", patch.description.as_deref(), 2_000).map_err(StorageError::Validation)?;
        self.db.write(|txn| {
            let mut pattern: SuspiciousPattern = require_json(txn, PATTERNS, id, "pattern")?;
            if let Some(severity) = patch.severity {
                pattern.severity = severity;
            }
            if let Some(status) = patch.status {
                pattern.status = status;
            }
            if let Some(confidence) = patch.confidence {
                pattern.confidence = confidence;
            }
            if let Some(description) = patch.description {
                pattern.description = description;
            }
            pattern.updated_at = Utc::now();
            put_json(txn, PATTERNS, &pattern)?;
            Ok(pattern)
        })
    }

    /// Run `detect` over a case's transactions and persist the results.
    ///
    /// Transactions are read in the same write transaction, so the result
    /// reflects a consistent snapshot. Transactions in high or critical
    /// patterns are flagged suspicious.
    pub fn record_detections<F>(
        &self,
        ctx: &AuditContext,
        case_id: &str,
        detect: F,
    ) -> StorageResult<DetectionOutcome>
    where
        F: FnOnce(&[TracedTransaction]) -> Vec<DetectedPattern>,
    {
        self.db.write(|txn| {
            let _case: serde_json::Value = require_json(txn, CASES, case_id, "case")?;
            let transactions = case_transactions(txn, case_id)?;
            let detections = detect(&transactions);

            let existing: BTreeSet<(PatternType, Vec<String>)> = {
                let table = txn.open_table(PATTERNS)?;
                let rows: Vec<SuspiciousPattern> = all_json(&table)?;
                rows.into_iter()
                    .filter(|p| p.case_id.as_deref() == Some(case_id))
                    .map(|p| {
                        let mut ids = p.transaction_ids;
                        ids.sort();
                        (p.pattern_type, ids)
                    })
                    .collect()
            };

            let now = Utc::now();
            let mut outcome = DetectionOutcome {
                case_id: case_id.to_string(),
                transactions_analyzed: transactions.len(),
                patterns: Vec::new(),
                skipped_duplicates: 0,
                flagged_transactions: 0,
            };
            let mut to_flag = BTreeSet::new();

            for detection in detections {
                let mut ids = detection.transaction_ids.clone();
                ids.sort();
                if existing.contains(&(detection.pattern_type, ids)) {
                    outcome.skipped_duplicates += 1;
                    continue;
                }
                if detection.severity >= Severity::High {
                    to_flag.extend(detection.transaction_ids.iter().cloned());
                }
                let pattern = SuspiciousPattern {
                    id: uuid::Uuid::new_v4().to_string(),
                    case_id: Some(case_id.to_string()),
                    pattern_type: detection.pattern_type,
                    severity: detection.severity,
                    confidence: detection.confidence,
                    description: detection.description,
                    addresses: detection.addresses,
                    transaction_ids: detection.transaction_ids,
                    status: PatternStatus::New,
                    source: PatternSource::Automatic,
                    created_by: ctx.actor_user_id.clone(),
                    created_at: now,
                    updated_at: now,
                };
                insert_pattern(txn, &pattern, ctx.actor())?;
                outcome.patterns.push(pattern);
            }

            let to_flag: Vec<String> = to_flag.into_iter().collect();
            outcome.flagged_transactions = flag_suspicious(txn, &to_flag, now)?;
            Ok(outcome)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{detect_patterns, DetectionConfig};
    use crate::storage::repository::cases::tests::{ctx, new_case};
    use crate::storage::repository::transactions::tests::{evm, new_tx};
    use crate::storage::{CaseRepository, TransactionRepository};
    use chrono::Duration;

    fn structured_case(db: &Database) -> String {
        let case = CaseRepository::new(db).create(&ctx(), new_case("Structuring")).unwrap().record;
        let txs = TransactionRepository::new(db);
        let start = Utc::now() - Duration::hours(10);
        for (n, amount) in [(1u8, 9_500.0), (2, 9_800.0), (3, 9_900.0)] {
            txs.create(
                &ctx(),
                new_tx(&case.id, n, &evm(1), &evm(10 + n), amount, start + Duration::hours(n as i64)),
            )
            .unwrap();
        }
        case.id
    }

    #[test]
    fn manual_pattern_checks_references() {
        let db = Database::in_memory().unwrap();
        let repo = PatternRepository::new(&db);
        let new = NewPattern {
            case_id: None,
            pattern_type: PatternType::Mixing,
            severity: Severity::Medium,
            confidence: 0.7,
            description: "Funds routed via mixer".into(),
            addresses: vec![],
            transaction_ids: vec!["missing".into()],
        };
        assert!(matches!(
            repo.create(&ctx(), new.clone()),
            Err(StorageError::ForeignKey(_))
        ));

        let mut bad = new.clone();
        bad.confidence = 1.5;
        assert!(matches!(repo.create(&ctx(), bad), Err(StorageError::Validation(_))));

        let mut ok = new;
        ok.transaction_ids.clear();
        let pattern = repo.create(&ctx(), ok).unwrap();
        assert_eq!(pattern.source, PatternSource::Manual);

        let dismissed = repo
            .update(
                &pattern.id,
                PatternPatch {
                    status: Some(PatternStatus::Dismissed),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(dismissed.status, PatternStatus::Dismissed);
    }

    #[test]
    fn detection_persists_flags_and_is_idempotent() {
        let db = Database::in_memory().unwrap();
        let case_id = structured_case(&db);
        let repo = PatternRepository::new(&db);
        let config = DetectionConfig::default();

        let first = repo
            .record_detections(&ctx(), &case_id, |txs| detect_patterns(txs, &config))
            .unwrap();
        assert_eq!(first.transactions_analyzed, 3);
        assert!(first
            .patterns
            .iter()
            .any(|p| p.pattern_type == PatternType::Structuring));
        assert_eq!(first.flagged_transactions, 3);

        let second = repo
            .record_detections(&ctx(), &case_id, |txs| detect_patterns(txs, &config))
            .unwrap();
        assert!(second.patterns.is_empty());
        assert_eq!(second.skipped_duplicates, first.patterns.len());
        assert_eq!(second.flagged_transactions, 0);
    }

    #[test]
    fn detection_on_missing_case_is_not_found() {
        let db = Database::in_memory().unwrap();
        let err = PatternRepository::new(&db)
            .record_detections(&ctx(), "nope", |_| Vec::new())
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }
}
