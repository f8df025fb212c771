// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Case timeline repository.

use chrono::{DateTime, Utc};
use redb::WriteTransaction;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::super::audit::AuditContext;
use super::super::database::{
    ensure_exists, put_json, Database, Page, Pagination, Record, StorageError, StorageResult,
    CASES, TIMELINE,
};
use crate::models::require_text;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TimelineEventType {
    CaseCreated,
    StatusChanged,
    AssignmentChanged,
    CaseUpdated,
    WalletAdded,
    WalletUpdated,
    TransactionAdded,
    PatternDetected,
    StrCreated,
    StrStatusChanged,
    EvidenceExported,
    Note,
}

/// One entry in a case's chronology.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TimelineEvent {
    pub id: String,
    pub case_id: String,
    pub event_type: TimelineEventType,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_user_id: Option<String>,
    /// Audit row produced by the same mutation, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_tx_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Record for TimelineEvent {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewTimelineEvent {
    pub case_id: String,
    #[serde(default = "default_event_type")]
    pub event_type: TimelineEventType,
    pub description: String,
}

fn default_event_type() -> TimelineEventType {
    TimelineEventType::Note
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct TimelineFilter {
    pub case_id: Option<String>,
    pub event_type: Option<TimelineEventType>,
}

/// Append a timeline event in the caller's transaction.
pub(crate) fn append_event(
    txn: &WriteTransaction,
    event: NewTimelineEvent,
    actor: Option<&str>,
    ledger_tx_id: Option<&str>,
    now: DateTime<Utc>,
) -> StorageResult<TimelineEvent> {
    ensure_exists(txn, CASES, &event.case_id, "case")?;
    let row = TimelineEvent {
        id: uuid::Uuid::new_v4().to_string(),
        case_id: event.case_id,
        event_type: event.event_type,
        description: event.description,
        actor_user_id: actor.map(str::to_string),
        ledger_tx_id: ledger_tx_id.map(str::to_string),
        created_at: now,
    };
    put_json(txn, TIMELINE, &row)?;
    Ok(row)
}

pub struct TimelineRepository<'a> {
    db: &'a Database,
}

impl<'a> TimelineRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Newest first.
    pub fn list(&self, filter: &TimelineFilter, pagination: Pagination) -> StorageResult<Page<TimelineEvent>> {
        let mut rows: Vec<TimelineEvent> = self.db.fetch_all(TIMELINE)?;
        rows.retain(|e| {
            filter.case_id.as_deref().is_none_or(|id| e.case_id == id)
                && filter.event_type.is_none_or(|t| e.event_type == t)
        });
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(Page::from_vec(rows, pagination))
    }

    /// Chronology of one case, oldest first.
    pub fn for_case(&self, case_id: &str) -> StorageResult<Vec<TimelineEvent>> {
        let mut rows: Vec<TimelineEvent> = self.db.fetch_all(TIMELINE)?;
        rows.retain(|e| e.case_id == case_id);
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(rows)
    }

    /// Record a manual entry.
    pub fn create(&self, ctx: &AuditContext, event: NewTimelineEvent) -> StorageResult<TimelineEvent> {
        require_text("description", &event.description, 2000).map_err(StorageError::Validation)?;
        self.db
            .write(|txn| append_event(txn, event, ctx.actor(), None, Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_requires_existing_case() {
        let db = Database::in_memory().unwrap();
        let err = TimelineRepository::new(&db)
            .create(
                &AuditContext::system(),
                NewTimelineEvent {
                    case_id: "nope".into(),
                    event_type: TimelineEventType::Note,
                    description: "called the bank".into(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, StorageError::ForeignKey(_)));
    }

    #[test]
    fn blank_description_is_rejected() {
        let db = Database::in_memory().unwrap();
        let err = TimelineRepository::new(&db)
            .create(
                &AuditContext::system(),
                NewTimelineEvent {
                    case_id: "c1".into(),
                    event_type: TimelineEventType::Note,
                    description: "   ".into(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)));
    }

    #[test]
    fn event_type_defaults_to_note() {
        let event: NewTimelineEvent =
            serde_json::from_str(r#"{"case_id":"c1","description":"x"}"#).unwrap();
        assert_eq!(event.event_type, TimelineEventType::Note);
    }
}
