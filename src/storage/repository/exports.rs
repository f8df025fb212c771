// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Court evidence exports.
//!
//! The exported document is stored verbatim next to its SHA-256 digest so
//! a copy produced in court can be checked byte for byte.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::audit::AuditContext;
use super::super::database::{
    claim_unique, next_sequence, put_json, require_json, Database, Record, StorageError,
    StorageResult, CASES, EXPORTS, EXPORT_NUMBERS,
};
use super::cases::{numbered, Case};
use super::timeline::{append_event, NewTimelineEvent, TimelineEventType};
use crate::blockchain::hashing::sha256_hex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Text,
}

impl Default for ExportFormat {
    fn default() -> Self {
        Self::Json
    }
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Text => "text/plain; charset=utf-8",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CourtExport {
    pub id: String,
    /// `EXP-YYYY-NNNNN`
    pub export_number: String,
    pub case_id: String,
    pub format: ExportFormat,
    pub include_audit_trail: bool,
    /// Hex SHA-256 of `content`.
    pub digest: String,
    pub size_bytes: usize,
    pub content: String,
    pub requested_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Record for CourtExport {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Export metadata without the document body.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ExportSummary {
    pub id: String,
    pub export_number: String,
    pub case_id: String,
    pub format: ExportFormat,
    pub include_audit_trail: bool,
    pub digest: String,
    pub size_bytes: usize,
    pub requested_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<CourtExport> for ExportSummary {
    fn from(export: CourtExport) -> Self {
        Self {
            id: export.id,
            export_number: export.export_number,
            case_id: export.case_id,
            format: export.format,
            include_audit_trail: export.include_audit_trail,
            digest: export.digest,
            size_bytes: export.size_bytes,
            requested_by: export.requested_by,
            created_at: export.created_at,
        }
    }
}

impl CourtExport {
    /// Recompute the digest over the stored content.
    pub fn verify_digest(&self) -> bool {
        sha256_hex(self.content.as_bytes()) == self.digest
    }
}

pub struct ExportRepository<'a> {
    db: &'a Database,
}

impl<'a> ExportRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn get(&self, id: &str) -> StorageResult<CourtExport> {
        self.db
            .fetch(EXPORTS, id)?
            .ok_or_else(|| StorageError::NotFound(format!("export {id}")))
    }

    /// Newest first.
    pub fn for_case(&self, case_id: &str) -> StorageResult<Vec<CourtExport>> {
        let mut rows: Vec<CourtExport> = self.db.fetch_all(EXPORTS)?;
        rows.retain(|e| e.case_id == case_id);
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    /// Store a rendered document for a case.
    pub fn create(
        &self,
        ctx: &AuditContext,
        case_id: &str,
        format: ExportFormat,
        include_audit_trail: bool,
        content: String,
    ) -> StorageResult<CourtExport> {
        let now = Utc::now();
        self.db.write(|txn| {
            let case: Case = require_json(txn, CASES, case_id, "case")?;
            let year = now.year();
            let seq = next_sequence(txn, &format!("export:{year}"))?;
            let export = CourtExport {
                id: uuid::Uuid::new_v4().to_string(),
                export_number: numbered("EXP", year, seq),
                case_id: case.id.clone(),
                format,
                include_audit_trail,
                digest: sha256_hex(content.as_bytes()),
                size_bytes: content.len(),
                content,
                requested_by: ctx.actor_user_id.clone(),
                created_at: now,
            };
            claim_unique(txn, EXPORT_NUMBERS, &export.export_number, &export.id, "export number")?;
            put_json(txn, EXPORTS, &export)?;
            append_event(
                txn,
                NewTimelineEvent {
                    case_id: case.id,
                    event_type: TimelineEventType::EvidenceExported,
                    description: format!(
                        "Evidence export {} generated (sha256 {})",
                        export.export_number, export.digest
                    ),
                },
                ctx.actor(),
                None,
                now,
            )?;
            Ok(export)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::repository::cases::tests::{ctx, new_case};
    use crate::storage::CaseRepository;

    #[test]
    fn export_is_numbered_and_digested() {
        let db = Database::in_memory().unwrap();
        let case = CaseRepository::new(&db).create(&ctx(), new_case("c")).unwrap().record;
        let repo = ExportRepository::new(&db);
        let export = repo
            .create(&ctx(), &case.id, ExportFormat::Json, false, "{\"a\":1}".to_string())
            .unwrap();
        let year = Utc::now().year();
        assert_eq!(export.export_number, format!("EXP-{year}-00001"));
        assert!(export.verify_digest());
        assert_eq!(repo.for_case(&case.id).unwrap().len(), 1);

        let mut tampered = repo.get(&export.id).unwrap();
        tampered.content.push(' ');
        assert!(!tampered.verify_digest());
    }

    #[test]
    fn export_for_missing_case_is_not_found() {
        let db = Database::in_memory().unwrap();
        let err = ExportRepository::new(&db)
            .create(&ctx(), "missing", ExportFormat::Text, false, String::new())
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }
}
