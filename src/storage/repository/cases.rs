// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Fraud case repository.
//!
//! Case writes are audited: every create/update appends a ledger row and the
//! matching timeline entries in the same transaction. Creating a case and
//! resolving it for the first time also adjust the state statistics.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::super::audit::{AuditContext, Audited, Mutation};
use super::super::database::{
    claim_unique, ensure_exists, lookup_unique, next_sequence, put_json, require_json, Database,
    Page, Pagination, Record, StorageError, StorageResult, CASES, CASE_NUMBERS, USERS,
};
use super::state_stats::{record_case, record_resolution};
use super::timeline::TimelineEventType;
use crate::blockchain::{EntityKind, LedgerAction};
use crate::models::{
    limit_text, lookup_state, normalize_currency, require_text, validate_amount, Complainant,
    Department,
};

// =============================================================================
// Enums
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FraudType {
    InvestmentScam,
    Phishing,
    RugPull,
    PonziScheme,
    Ransomware,
    SimSwap,
    ExchangeHack,
    RomanceScam,
    MoneyLaundering,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Open,
    Investigating,
    Escalated,
    Resolved,
    Closed,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Open => "open",
            CaseStatus::Investigating => "investigating",
            CaseStatus::Escalated => "escalated",
            CaseStatus::Resolved => "resolved",
            CaseStatus::Closed => "closed",
        }
    }

    /// Whether a case may move from `self` to `next`.
    ///
    /// `closed` is terminal; a resolved case may be reopened for
    /// investigation or closed.
    pub fn can_transition_to(&self, next: CaseStatus) -> bool {
        use CaseStatus::*;
        match (self, next) {
            (a, b) if *a == b => true,
            (Closed, _) => false,
            (Resolved, Investigating | Closed) => true,
            (Resolved, _) => false,
            (_, Open) => false,
            _ => true,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, CaseStatus::Resolved | CaseStatus::Closed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CasePriority {
    Low,
    Medium,
    High,
    Critical,
}

impl Default for CasePriority {
    fn default() -> Self {
        Self::Medium
    }
}

// =============================================================================
// Records
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Case {
    pub id: String,
    /// `CASE-YYYY-NNNNN`
    pub case_number: String,
    pub title: String,
    pub description: String,
    pub fraud_type: FraudType,
    pub status: CaseStatus,
    pub priority: CasePriority,
    pub department: Department,
    pub state_code: String,
    pub complainant: Complainant,
    pub amount_lost: f64,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incident_date: Option<NaiveDate>,
    pub created_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Case {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewCase {
    pub title: String,
    pub description: String,
    pub fraud_type: FraudType,
    #[serde(default)]
    pub priority: CasePriority,
    /// Defaults to the creating officer's department.
    #[serde(default)]
    pub department: Option<Department>,
    pub state_code: String,
    pub complainant: Complainant,
    #[serde(default)]
    pub amount_lost: f64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub incident_date: Option<NaiveDate>,
    #[serde(default)]
    pub assigned_to: Option<String>,
}

/// Partial update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CasePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub fraud_type: Option<FraudType>,
    pub status: Option<CaseStatus>,
    pub priority: Option<CasePriority>,
    pub department: Option<Department>,
    pub assigned_to: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct CaseFilter {
    pub status: Option<CaseStatus>,
    pub priority: Option<CasePriority>,
    pub fraud_type: Option<FraudType>,
    pub department: Option<Department>,
    pub state_code: Option<String>,
    pub assigned_to: Option<String>,
    /// Substring match on case number, title or complainant name.
    pub q: Option<String>,
}

impl CaseFilter {
    fn matches(&self, case: &Case) -> bool {
        self.status.is_none_or(|s| case.status == s)
            && self.priority.is_none_or(|p| case.priority == p)
            && self.fraud_type.is_none_or(|f| case.fraud_type == f)
            && self.department.is_none_or(|d| case.department == d)
            && self
                .state_code
                .as_deref()
                .is_none_or(|c| case.state_code.eq_ignore_ascii_case(c))
            && self
                .assigned_to
                .as_deref()
                .is_none_or(|a| case.assigned_to.as_deref() == Some(a))
            && self.q.as_deref().is_none_or(|q| {
                let q = q.to_lowercase();
                case.case_number.to_lowercase().contains(&q)
                    || case.title.to_lowercase().contains(&q)
                    || case.complainant.name.to_lowercase().contains(&q)
            })
    }
}

impl NewCase {
    fn validate(&self) -> Result<(), String> {
        require_text("title", &self.title, 200)?;
        require_text("description", &self.description, 10_000)?;
        if lookup_state(&self.state_code).is_none() {
            return Err(format!("unknown state code {}", self.state_code));
        }
        self.complainant.validate()?;
        validate_amount("amount_lost", self.amount_lost)
    }
}

impl CasePatch {
    fn validate(&self) -> Result<(), String> {
        if let Some(title) = &self.title {
            require_text("title", title, 200)?;
        }
        if let Some(description) = &self.description {
            require_text("description", description, 10_000)?;
        }
        limit_text("assigned_to", self.assigned_to.as_deref(), 64)
    }
}

/// Sequence name and formatted number for a human-readable ID.
pub(crate) fn numbered(prefix: &str, year: i32, seq: u64) -> String {
    format!("{prefix}-{year}-{seq:05}")
}

// =============================================================================
// Repository
// =============================================================================

pub struct CaseRepository<'a> {
    db: &'a Database,
}

impl<'a> CaseRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn get(&self, id: &str) -> StorageResult<Case> {
        self.db
            .fetch(CASES, id)?
            .ok_or_else(|| StorageError::NotFound(format!("case {id}")))
    }

    pub fn find_by_number(&self, case_number: &str) -> StorageResult<Option<Case>> {
        let id = self.db.read(|txn| {
            let index = txn.open_table(CASE_NUMBERS)?;
            lookup_unique(&index, case_number)
        })?;
        match id {
            Some(id) => self.db.fetch(CASES, &id),
            None => Ok(None),
        }
    }

    /// Newest first.
    pub fn list(&self, filter: &CaseFilter, pagination: Pagination) -> StorageResult<Page<Case>> {
        let mut rows: Vec<Case> = self.db.fetch_all(CASES)?;
        rows.retain(|c| filter.matches(c));
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(Page::from_vec(rows, pagination))
    }

    pub fn all(&self) -> StorageResult<Vec<Case>> {
        self.db.fetch_all(CASES)
    }

    pub fn create(&self, ctx: &AuditContext, new: NewCase) -> StorageResult<Audited<Case>> {
        new.validate().map_err(StorageError::Validation)?;
        let department = new
            .department
            .or(ctx.department)
            .ok_or_else(|| StorageError::Validation("department is required".to_string()))?;
        let currency = normalize_currency(new.currency.as_deref().unwrap_or("INR"))
            .map_err(StorageError::Validation)?;

        self.db.audited(ctx, EntityKind::Case, LedgerAction::Create, |txn, now| {
            if let Some(assignee) = &new.assigned_to {
                ensure_exists(txn, USERS, assignee, "user")?;
            }
            let year = now.year();
            let seq = next_sequence(txn, &format!("case:{year}"))?;
            let (state_code, _) = lookup_state(&new.state_code)
                .ok_or_else(|| StorageError::Validation("unknown state code".to_string()))?;

            let case = Case {
                id: uuid::Uuid::new_v4().to_string(),
                case_number: numbered("CASE", year, seq),
                title: new.title.trim().to_string(),
                description: new.description,
                fraud_type: new.fraud_type,
                status: CaseStatus::Open,
                priority: new.priority,
                department,
                state_code: state_code.to_string(),
                complainant: new.complainant,
                amount_lost: new.amount_lost,
                currency,
                incident_date: new.incident_date,
                created_by: ctx.actor_user_id.clone(),
                assigned_to: new.assigned_to,
                resolved_at: None,
                created_at: now,
                updated_at: now,
            };

            claim_unique(txn, CASE_NUMBERS, &case.case_number, &case.id, "case number")?;
            put_json(txn, CASES, &case)?;
            record_case(txn, &case.state_code, year, case.amount_lost, now)?;

            let description = format!("Case {} opened: {}", case.case_number, case.title);
            let case_id = case.id.clone();
            Ok(Mutation::new(case).with_timeline(case_id, TimelineEventType::CaseCreated, description))
        })
    }

    pub fn update(&self, ctx: &AuditContext, id: &str, patch: CasePatch) -> StorageResult<Audited<Case>> {
        patch.validate().map_err(StorageError::Validation)?;

        self.db.audited(ctx, EntityKind::Case, LedgerAction::Update, |txn, now| {
            let mut case: Case = require_json(txn, CASES, id, "case")?;
            let mut events = Vec::new();

            if let Some(next) = patch.status {
                if !case.status.can_transition_to(next) {
                    return Err(StorageError::InvalidTransition(format!(
                        "case cannot move from {} to {}",
                        case.status.as_str(),
                        next.as_str()
                    )));
                }
                if next != case.status {
                    events.push((
                        TimelineEventType::StatusChanged,
                        format!("Status changed from {} to {}", case.status.as_str(), next.as_str()),
                    ));
                    if next.is_resolved() && case.resolved_at.is_none() {
                        case.resolved_at = Some(now);
                        record_resolution(txn, &case.state_code, case.created_at.year(), now)?;
                    }
                    case.status = next;
                }
            }

            if let Some(assignee) = patch.assigned_to {
                if case.assigned_to.as_deref() != Some(assignee.as_str()) {
                    ensure_exists(txn, USERS, &assignee, "user")?;
                    events.push((
                        TimelineEventType::AssignmentChanged,
                        format!("Case assigned to user {assignee}"),
                    ));
                    case.assigned_to = Some(assignee);
                }
            }

            let mut changed = Vec::new();
            if let Some(title) = patch.title {
                case.title = title.trim().to_string();
                changed.push("title");
            }
            if let Some(description) = patch.description {
                case.description = description;
                changed.push("description");
            }
            if let Some(fraud_type) = patch.fraud_type {
                case.fraud_type = fraud_type;
                changed.push("fraud_type");
            }
            if let Some(priority) = patch.priority {
                case.priority = priority;
                changed.push("priority");
            }
            if let Some(department) = patch.department {
                case.department = department;
                changed.push("department");
            }
            if !changed.is_empty() {
                events.push((
                    TimelineEventType::CaseUpdated,
                    format!("Updated {}", changed.join(", ")),
                ));
            }

            case.updated_at = now;
            put_json(txn, CASES, &case)?;

            let case_id = case.id.clone();
            Ok(events
                .into_iter()
                .fold(Mutation::new(case), |m, (kind, text)| {
                    m.with_timeline(case_id.clone(), kind, text)
                }))
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::{LedgerRepository, StateStatsRepository, TimelineRepository};

    pub(crate) fn new_case(title: &str) -> NewCase {
        NewCase {
            title: title.to_string(),
            description: "Victim lured into fake trading platform".to_string(),
            fraud_type: FraudType::InvestmentScam,
            priority: CasePriority::High,
            department: None,
            state_code: "KA".to_string(),
            complainant: Complainant {
                name: "Asha Verma".to_string(),
                phone: Some("+91 98450 12345".to_string()),
                email: None,
            },
            amount_lost: 250_000.0,
            currency: None,
            incident_date: None,
            assigned_to: None,
        }
    }

    pub(crate) fn ctx() -> AuditContext {
        AuditContext::user("officer-1", Department::CyberCrimeCell)
    }

    #[test]
    fn create_assigns_sequential_case_numbers() {
        let db = Database::in_memory().unwrap();
        let repo = CaseRepository::new(&db);
        let a = repo.create(&ctx(), new_case("First")).unwrap().record;
        let b = repo.create(&ctx(), new_case("Second")).unwrap().record;

        let year = Utc::now().year();
        assert_eq!(a.case_number, format!("CASE-{year}-00001"));
        assert_eq!(b.case_number, format!("CASE-{year}-00002"));
        assert_eq!(a.department, Department::CyberCrimeCell);
        assert_eq!(a.currency, "INR");
        assert_eq!(a.status, CaseStatus::Open);
        assert_eq!(repo.find_by_number(&a.case_number).unwrap().unwrap().id, a.id);
    }

    #[test]
    fn create_writes_audit_timeline_and_stats() {
        let db = Database::in_memory().unwrap();
        let audited = CaseRepository::new(&db).create(&ctx(), new_case("Audit me")).unwrap();

        let ledger = LedgerRepository::new(&db)
            .list_for_entity(EntityKind::Case, &audited.record.id)
            .unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].action, LedgerAction::Create);

        let timeline = TimelineRepository::new(&db).for_case(&audited.record.id).unwrap();
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].ledger_tx_id.as_deref(), Some(audited.ledger.id.as_str()));

        let stats = StateStatsRepository::new(&db).for_state("KA").unwrap();
        assert_eq!(stats[0].total_cases, 1);
        assert_eq!(stats[0].total_amount_lost, 250_000.0);
    }

    #[test]
    fn invalid_case_is_rejected_without_side_effects() {
        let db = Database::in_memory().unwrap();
        let mut bad = new_case("Bad");
        bad.amount_lost = -1.0;
        assert!(matches!(
            CaseRepository::new(&db).create(&ctx(), bad),
            Err(StorageError::Validation(_))
        ));

        let mut dangling = new_case("Dangling");
        dangling.assigned_to = Some("ghost".into());
        assert!(matches!(
            CaseRepository::new(&db).create(&ctx(), dangling),
            Err(StorageError::ForeignKey(_))
        ));
        assert_eq!(LedgerRepository::new(&db).height().unwrap(), 0);
        assert!(StateStatsRepository::new(&db).for_state("KA").unwrap().is_empty());
    }

    #[test]
    fn status_transitions() {
        use CaseStatus::*;
        assert!(Open.can_transition_to(Investigating));
        assert!(Investigating.can_transition_to(Escalated));
        assert!(Resolved.can_transition_to(Investigating));
        assert!(!Resolved.can_transition_to(Escalated));
        assert!(!Closed.can_transition_to(Open));
        assert!(!Investigating.can_transition_to(Open));
        assert!(Closed.can_transition_to(Closed));
    }

    #[test]
    fn resolution_is_counted_once() {
        let db = Database::in_memory().unwrap();
        let repo = CaseRepository::new(&db);
        let case = repo.create(&ctx(), new_case("Resolve me")).unwrap().record;

        let set = |status| CasePatch {
            status: Some(status),
            ..Default::default()
        };
        repo.update(&ctx(), &case.id, set(CaseStatus::Resolved)).unwrap();
        repo.update(&ctx(), &case.id, set(CaseStatus::Investigating)).unwrap();
        let closed = repo.update(&ctx(), &case.id, set(CaseStatus::Closed)).unwrap().record;
        assert!(closed.resolved_at.is_some());

        let stats = StateStatsRepository::new(&db).for_state("KA").unwrap();
        assert_eq!(stats[0].resolved_cases, 1);

        let err = repo.update(&ctx(), &case.id, set(CaseStatus::Open)).unwrap_err();
        assert!(matches!(err, StorageError::InvalidTransition(_)));
        // create + 3 updates
        assert_eq!(LedgerRepository::new(&db).height().unwrap(), 4);
    }

    #[test]
    fn update_missing_case_is_not_found() {
        let db = Database::in_memory().unwrap();
        let err = CaseRepository::new(&db)
            .update(&ctx(), "missing", CasePatch::default())
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[test]
    fn list_filters_by_status_and_query() {
        let db = Database::in_memory().unwrap();
        let repo = CaseRepository::new(&db);
        let a = repo.create(&ctx(), new_case("Pig butchering ring")).unwrap().record;
        repo.create(&ctx(), new_case("Fake exchange")).unwrap();
        repo.update(
            &ctx(),
            &a.id,
            CasePatch {
                status: Some(CaseStatus::Investigating),
                ..Default::default()
            },
        )
        .unwrap();

        let filter = CaseFilter {
            status: Some(CaseStatus::Investigating),
            ..Default::default()
        };
        assert_eq!(repo.list(&filter, Pagination::default()).unwrap().total, 1);

        let filter = CaseFilter {
            q: Some("exchange".into()),
            ..Default::default()
        };
        let page = repo.list(&filter, Pagination::default()).unwrap();
        assert_eq!(page.items[0].title, "Fake exchange");
    }
}
