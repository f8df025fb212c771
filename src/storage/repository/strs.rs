// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Suspicious Transaction Report repository.
//!
//! ## Workflow
//!
//! ```text
//! draft -> submitted -> under_review -> filed
//!                                    \-> rejected -> draft
//! ```
//!
//! Content can only be edited while a report is a draft or has been
//! rejected. Every create/update is audited.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::super::audit::{AuditContext, Audited, Mutation};
use super::super::database::{
    claim_unique, ensure_exists, next_sequence, put_json, require_json, Database, Page,
    Pagination, Record, StorageError, StorageResult, CASES, STR_NUMBERS, STR_REPORTS,
    TRANSACTIONS, WALLETS,
};
use super::cases::numbered;
use super::timeline::TimelineEventType;
use super::transactions::TracedTransaction;
use crate::blockchain::{EntityKind, LedgerAction};
use crate::models::{limit_text, normalize_currency, require_text, validate_amount};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StrStatus {
    Draft,
    Submitted,
    UnderReview,
    Filed,
    Rejected,
}

impl StrStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrStatus::Draft => "draft",
            StrStatus::Submitted => "submitted",
            StrStatus::UnderReview => "under_review",
            StrStatus::Filed => "filed",
            StrStatus::Rejected => "rejected",
        }
    }

    pub fn can_transition_to(&self, next: StrStatus) -> bool {
        use StrStatus::*;
        matches!(
            (self, next),
            (Draft, Submitted)
                | (Submitted, UnderReview)
                | (UnderReview, Filed)
                | (UnderReview, Rejected)
                | (Rejected, Draft)
        ) || *self == next
    }

    pub fn is_editable(&self) -> bool {
        matches!(self, StrStatus::Draft | StrStatus::Rejected)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StrReport {
    pub id: String,
    /// `STR-YYYY-NNNNN`
    pub str_number: String,
    pub case_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_id: Option<String>,
    pub subject_name: String,
    pub summary: String,
    pub grounds_for_suspicion: String,
    pub total_amount: f64,
    pub currency: String,
    pub status: StrStatus,
    #[serde(default)]
    pub transaction_ids: Vec<String>,
    pub prepared_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewer_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for StrReport {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewStrReport {
    pub case_id: String,
    #[serde(default)]
    pub wallet_id: Option<String>,
    pub subject_name: String,
    pub summary: String,
    pub grounds_for_suspicion: String,
    /// Defaults to the sum of the listed transactions.
    #[serde(default)]
    pub total_amount: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub transaction_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct StrPatch {
    pub status: Option<StrStatus>,
    pub subject_name: Option<String>,
    pub summary: Option<String>,
    pub grounds_for_suspicion: Option<String>,
    pub total_amount: Option<f64>,
    pub wallet_id: Option<String>,
    pub transaction_ids: Option<Vec<String>>,
    pub reviewer_notes: Option<String>,
}

impl StrPatch {
    fn edits_content(&self) -> bool {
        self.subject_name.is_some()
            || self.summary.is_some()
            || self.grounds_for_suspicion.is_some()
            || self.total_amount.is_some()
            || self.wallet_id.is_some()
            || self.transaction_ids.is_some()
    }

    fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.subject_name {
            require_text("subject_name", name, 200)?;
        }
        if let Some(summary) = &self.summary {
            require_text("summary", summary, 5_000)?;
        }
        if let Some(grounds) = &self.grounds_for_suspicion {
            require_text("grounds_for_suspicion", grounds, 10_000)?;
        }
        if let Some(amount) = self.total_amount {
            validate_amount("total_amount", amount)?;
        }
        limit_text("reviewer_notes", self.reviewer_notes.as_deref(), 5_000)
    }
}

impl NewStrReport {
    fn validate(&self) -> Result<(), String> {
        require_text("subject_name", &self.subject_name, 200)?;
        require_text("summary", &self.summary, 5_000)?;
        require_text("grounds_for_suspicion", &self.grounds_for_suspicion, 10_000)?;
        if let Some(amount) = self.total_amount {
            validate_amount("total_amount", amount)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct StrFilter {
    pub case_id: Option<String>,
    pub wallet_id: Option<String>,
    pub status: Option<StrStatus>,
}

/// Load the listed transactions, requiring each to belong to the case.
fn load_case_transactions(
    txn: &redb::WriteTransaction,
    case_id: &str,
    ids: &[String],
) -> StorageResult<Vec<TracedTransaction>> {
    let mut rows = Vec::with_capacity(ids.len());
    for id in ids {
        ensure_exists(txn, TRANSACTIONS, id, "transaction")?;
        let tx: TracedTransaction = require_json(txn, TRANSACTIONS, id, "transaction")?;
        if tx.case_id != case_id {
            return Err(StorageError::Validation(format!(
                "transaction {id} does not belong to case {case_id}"
            )));
        }
        rows.push(tx);
    }
    Ok(rows)
}

pub struct StrRepository<'a> {
    db: &'a Database,
}

impl<'a> StrRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn get(&self, id: &str) -> StorageResult<StrReport> {
        self.db
            .fetch(STR_REPORTS, id)?
            .ok_or_else(|| StorageError::NotFound(format!("STR report {id}")))
    }

    /// Newest first.
    pub fn list(&self, filter: &StrFilter, pagination: Pagination) -> StorageResult<Page<StrReport>> {
        let mut rows: Vec<StrReport> = self.db.fetch_all(STR_REPORTS)?;
        rows.retain(|r| {
            filter.case_id.as_deref().is_none_or(|c| r.case_id == c)
                && filter
                    .wallet_id
                    .as_deref()
                    .is_none_or(|w| r.wallet_id.as_deref() == Some(w))
                && filter.status.is_none_or(|s| r.status == s)
        });
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(Page::from_vec(rows, pagination))
    }

    pub fn all(&self) -> StorageResult<Vec<StrReport>> {
        self.db.fetch_all(STR_REPORTS)
    }

    pub fn create(&self, ctx: &AuditContext, new: NewStrReport) -> StorageResult<Audited<StrReport>> {
        new.validate().map_err(StorageError::Validation)?;
        let currency = normalize_currency(new.currency.as_deref().unwrap_or("INR"))
            .map_err(StorageError::Validation)?;

        self.db.audited(ctx, EntityKind::StrReport, LedgerAction::Create, |txn, now| {
            ensure_exists(txn, CASES, &new.case_id, "case")?;
            if let Some(wallet_id) = &new.wallet_id {
                ensure_exists(txn, WALLETS, wallet_id, "wallet")?;
            }
            let transactions = load_case_transactions(txn, &new.case_id, &new.transaction_ids)?;
            let total_amount = new
                .total_amount
                .unwrap_or_else(|| transactions.iter().map(|t| t.amount).sum());

            let year = now.year();
            let seq = next_sequence(txn, &format!("str:{year}"))?;
            let report = StrReport {
                id: uuid::Uuid::new_v4().to_string(),
                str_number: numbered("STR", year, seq),
                case_id: new.case_id,
                wallet_id: new.wallet_id,
                subject_name: new.subject_name.trim().to_string(),
                summary: new.summary,
                grounds_for_suspicion: new.grounds_for_suspicion,
                total_amount,
                currency,
                status: StrStatus::Draft,
                transaction_ids: new.transaction_ids,
                prepared_by: ctx.actor_user_id.clone(),
                reviewer_notes: None,
                submitted_at: None,
                filed_at: None,
                created_at: now,
                updated_at: now,
            };
            claim_unique(txn, STR_NUMBERS, &report.str_number, &report.id, "STR number")?;
            put_json(txn, STR_REPORTS, &report)?;

            let case_id = report.case_id.clone();
            let description = format!("STR {} drafted for {}", report.str_number, report.subject_name);
            Ok(Mutation::new(report).with_timeline(case_id, TimelineEventType::StrCreated, description))
        })
    }

    pub fn update(&self, ctx: &AuditContext, id: &str, patch: StrPatch) -> StorageResult<Audited<StrReport>> {
        patch.validate().map_err(StorageError::Validation)?;

        self.db.audited(ctx, EntityKind::StrReport, LedgerAction::Update, |txn, now| {
            let mut report: StrReport = require_json(txn, STR_REPORTS, id, "STR report")?;
            let mut timeline = Vec::new();

            if patch.edits_content() {
                if !report.status.is_editable() {
                    return Err(StorageError::InvalidTransition(format!(
                        "STR {} cannot be edited while {}",
                        report.str_number,
                        report.status.as_str()
                    )));
                }
                if let Some(wallet_id) = patch.wallet_id {
                    ensure_exists(txn, WALLETS, &wallet_id, "wallet")?;
                    report.wallet_id = Some(wallet_id);
                }
                if let Some(ids) = patch.transaction_ids {
                    load_case_transactions(txn, &report.case_id, &ids)?;
                    report.transaction_ids = ids;
                }
                if let Some(name) = patch.subject_name {
                    report.subject_name = name.trim().to_string();
                }
                if let Some(summary) = patch.summary {
                    report.summary = summary;
                }
                if let Some(grounds) = patch.grounds_for_suspicion {
                    report.grounds_for_suspicion = grounds;
                }
                if let Some(amount) = patch.total_amount {
                    report.total_amount = amount;
                }
            }

            if let Some(notes) = patch.reviewer_notes {
                report.reviewer_notes = Some(notes);
            }

            if let Some(next) = patch.status {
                if !report.status.can_transition_to(next) {
                    return Err(StorageError::InvalidTransition(format!(
                        "STR cannot move from {} to {}",
                        report.status.as_str(),
                        next.as_str()
                    )));
                }
                if next != report.status {
                    timeline.push(format!(
                        "STR {} moved from {} to {}",
                        report.str_number,
                        report.status.as_str(),
                        next.as_str()
                    ));
                    match next {
                        StrStatus::Submitted => report.submitted_at = Some(now),
                        StrStatus::Filed => report.filed_at = Some(now),
                        _ => {}
                    }
                    report.status = next;
                }
            }

            report.updated_at = now;
            put_json(txn, STR_REPORTS, &report)?;

            let case_id = report.case_id.clone();
            Ok(timeline.into_iter().fold(Mutation::new(report), |m, text| {
                m.with_timeline(case_id.clone(), TimelineEventType::StrStatusChanged, text)
            }))
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::repository::cases::tests::{ctx, new_case};
    use crate::storage::repository::transactions::tests::{evm, new_tx};
    use crate::storage::{CaseRepository, LedgerRepository, TimelineRepository, TransactionRepository};

    pub(crate) fn new_str(case_id: &str) -> NewStrReport {
        NewStrReport {
            case_id: case_id.to_string(),
            wallet_id: None,
            subject_name: "Unknown operator".to_string(),
            summary: "Layered transfers through mule accounts".to_string(),
            grounds_for_suspicion: "Amounts just below reporting threshold".to_string(),
            total_amount: None,
            currency: None,
            transaction_ids: Vec::new(),
        }
    }

    fn status(s: StrStatus) -> StrPatch {
        StrPatch {
            status: Some(s),
            ..Default::default()
        }
    }

    #[test]
    fn workflow_transitions() {
        use StrStatus::*;
        assert!(Draft.can_transition_to(Submitted));
        assert!(Submitted.can_transition_to(UnderReview));
        assert!(UnderReview.can_transition_to(Filed));
        assert!(UnderReview.can_transition_to(Rejected));
        assert!(Rejected.can_transition_to(Draft));
        assert!(!Draft.can_transition_to(Filed));
        assert!(!Filed.can_transition_to(Draft));
        assert!(!Submitted.can_transition_to(Draft));
    }

    #[test]
    fn create_numbers_and_sums_transactions() {
        let db = Database::in_memory().unwrap();
        let case = CaseRepository::new(&db).create(&ctx(), new_case("c")).unwrap().record;
        let txs = TransactionRepository::new(&db);
        let a = txs
            .create(&ctx(), new_tx(&case.id, 1, &evm(1), &evm(2), 100.0, Utc::now()))
            .unwrap();
        let b = txs
            .create(&ctx(), new_tx(&case.id, 2, &evm(1), &evm(3), 250.0, Utc::now()))
            .unwrap();

        let mut new = new_str(&case.id);
        new.transaction_ids = vec![a.id, b.id];
        let audited = StrRepository::new(&db).create(&ctx(), new).unwrap();
        let year = Utc::now().year();
        assert_eq!(audited.record.str_number, format!("STR-{year}-00001"));
        assert_eq!(audited.record.total_amount, 350.0);
        assert_eq!(audited.ledger.entity_type, EntityKind::StrReport);
    }

    #[test]
    fn foreign_transactions_are_rejected() {
        let db = Database::in_memory().unwrap();
        let cases = CaseRepository::new(&db);
        let one = cases.create(&ctx(), new_case("one")).unwrap().record;
        let two = cases.create(&ctx(), new_case("two")).unwrap().record;
        let tx = TransactionRepository::new(&db)
            .create(&ctx(), new_tx(&two.id, 1, &evm(1), &evm(2), 1.0, Utc::now()))
            .unwrap();

        let mut new = new_str(&one.id);
        new.transaction_ids = vec![tx.id];
        assert!(matches!(
            StrRepository::new(&db).create(&ctx(), new),
            Err(StorageError::Validation(_))
        ));
        assert!(matches!(
            StrRepository::new(&db).create(&ctx(), new_str("missing")),
            Err(StorageError::ForeignKey(_))
        ));
    }

    #[test]
    fn full_workflow_is_audited() {
        let db = Database::in_memory().unwrap();
        let case = CaseRepository::new(&db).create(&ctx(), new_case("c")).unwrap().record;
        let repo = StrRepository::new(&db);
        let report = repo.create(&ctx(), new_str(&case.id)).unwrap().record;

        let submitted = repo.update(&ctx(), &report.id, status(StrStatus::Submitted)).unwrap().record;
        assert!(submitted.submitted_at.is_some());

        // Content is frozen once submitted
        let edit = StrPatch {
            summary: Some("changed".into()),
            ..Default::default()
        };
        assert!(matches!(
            repo.update(&ctx(), &report.id, edit),
            Err(StorageError::InvalidTransition(_))
        ));

        repo.update(&ctx(), &report.id, status(StrStatus::UnderReview)).unwrap();
        let filed = repo.update(&ctx(), &report.id, status(StrStatus::Filed)).unwrap().record;
        assert!(filed.filed_at.is_some());
        assert!(matches!(
            repo.update(&ctx(), &report.id, status(StrStatus::Draft)),
            Err(StorageError::InvalidTransition(_))
        ));

        let rows = LedgerRepository::new(&db)
            .list_for_entity(EntityKind::StrReport, &report.id)
            .unwrap();
        assert_eq!(rows.len(), 4);

        let timeline = TimelineRepository::new(&db).for_case(&case.id).unwrap();
        let status_events = timeline
            .iter()
            .filter(|e| e.event_type == TimelineEventType::StrStatusChanged)
            .count();
        assert_eq!(status_events, 3);
    }

    #[test]
    fn rejected_report_can_be_reworked() {
        let db = Database::in_memory().unwrap();
        let case = CaseRepository::new(&db).create(&ctx(), new_case("c")).unwrap().record;
        let repo = StrRepository::new(&db);
        let report = repo.create(&ctx(), new_str(&case.id)).unwrap().record;
        for s in [StrStatus::Submitted, StrStatus::UnderReview, StrStatus::Rejected] {
            repo.update(&ctx(), &report.id, status(s)).unwrap();
        }
        let edited = repo
            .update(
                &ctx(),
                &report.id,
                StrPatch {
                    summary: Some("Revised summary".into()),
                    status: Some(StrStatus::Draft),
                    ..Default::default()
                },
            )
            .unwrap()
            .record;
        assert_eq!(edited.status, StrStatus::Draft);
        assert_eq!(edited.summary, "Revised summary");
    }
}
