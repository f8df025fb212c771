// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Court Evidence Bundles
//!
//! A bundle is a snapshot of everything recorded against a case: the case
//! and complainant, linked wallets, traced transactions, detected patterns,
//! STRs and the timeline. With `include_audit_trail` it also carries the
//! ledger rows for the case, its wallets and its STRs together with the
//! result of verifying the whole chain.
//!
//! The rendered document is stored verbatim and digested with SHA-256 by
//! [`ExportRepository`], so the digest printed on the export record matches
//! the bytes handed to the court.

use std::fmt::Write;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use redb::ReadableTable;

use super::{money, tag};
use crate::blockchain::hashing::{verify_chain, ChainVerification};
use crate::blockchain::{EntityKind, LedgerEntry};
use crate::storage::database::{
    all_json, get_json, CASES, LEDGER, LEDGER_SEQUENCE, PATTERNS, STR_REPORTS, TIMELINE,
    TRANSACTIONS, WALLETS,
};
use crate::storage::{
    AuditContext, Case, CourtExport, Database, ExportFormat, ExportRepository, StorageError,
    StorageResult, StrReport, SuspiciousPattern, TimelineEvent, TracedTransaction, WatchedWallet,
};

/// Bump when the bundle layout changes.
pub const BUNDLE_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize)]
pub struct AuditTrail {
    pub entries: Vec<LedgerEntry>,
    pub chain: ChainVerification,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvidenceBundle {
    pub bundle_version: u32,
    pub generated_at: DateTime<Utc>,
    pub generated_by: Option<String>,
    pub case: Case,
    pub wallets: Vec<WatchedWallet>,
    pub transactions: Vec<TracedTransaction>,
    pub patterns: Vec<SuspiciousPattern>,
    pub str_reports: Vec<StrReport>,
    pub timeline: Vec<TimelineEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_trail: Option<AuditTrail>,
}

/// Collect the case snapshot.
///
/// Every table is read from one transaction, so the records and the audit
/// trail describe the same instant.
pub fn assemble_bundle(
    db: &Database,
    ctx: &AuditContext,
    case_id: &str,
    include_audit_trail: bool,
) -> StorageResult<EvidenceBundle> {
    db.read(|txn| {
        let case: Case = get_json(&txn.open_table(CASES)?, case_id)?
            .ok_or_else(|| StorageError::NotFound(format!("case {case_id}")))?;

        let mut wallets: Vec<WatchedWallet> = all_json(&txn.open_table(WALLETS)?)?;
        wallets.retain(|w| w.case_id.as_deref() == Some(case_id));
        wallets.sort_by(|a, b| {
            b.risk_score
                .cmp(&a.risk_score)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });

        let mut transactions: Vec<TracedTransaction> = all_json(&txn.open_table(TRANSACTIONS)?)?;
        transactions.retain(|t| t.case_id == case_id);
        transactions.sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at));

        let mut patterns: Vec<SuspiciousPattern> = all_json(&txn.open_table(PATTERNS)?)?;
        patterns.retain(|p| p.case_id.as_deref() == Some(case_id));
        patterns.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });

        let mut str_reports: Vec<StrReport> = all_json(&txn.open_table(STR_REPORTS)?)?;
        str_reports.retain(|r| r.case_id == case_id);
        str_reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut timeline: Vec<TimelineEvent> = all_json(&txn.open_table(TIMELINE)?)?;
        timeline.retain(|e| e.case_id == case_id);
        timeline.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        let audit_trail = if include_audit_trail {
            let order = txn.open_table(LEDGER_SEQUENCE)?;
            let ledger = txn.open_table(LEDGER)?;
            let mut chain = Vec::new();
            for item in order.iter()? {
                let (_, id) = item?;
                if let Some(entry) = get_json::<LedgerEntry, _>(&ledger, id.value())? {
                    chain.push(entry);
                }
            }
            let verification = verify_chain(&chain);

            let mut subjects: Vec<(EntityKind, &str)> = vec![(EntityKind::Case, case.id.as_str())];
            subjects.extend(wallets.iter().map(|w| (EntityKind::Wallet, w.id.as_str())));
            subjects.extend(str_reports.iter().map(|s| (EntityKind::StrReport, s.id.as_str())));

            let entries: Vec<LedgerEntry> = chain
                .into_iter()
                .filter(|e| {
                    subjects
                        .iter()
                        .any(|(kind, id)| e.entity_type == *kind && e.entity_id == *id)
                })
                .collect();
            Some(AuditTrail {
                entries,
                chain: verification,
            })
        } else {
            None
        };

        Ok(EvidenceBundle {
            bundle_version: BUNDLE_VERSION,
            generated_at: Utc::now(),
            generated_by: ctx.actor_user_id.clone(),
            case,
            wallets,
            transactions,
            patterns,
            str_reports,
            timeline,
            audit_trail,
        })
    })
}

/// Serialize a bundle in the requested format.
pub fn render_bundle(bundle: &EvidenceBundle, format: ExportFormat) -> StorageResult<String> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(bundle)?),
        ExportFormat::Text => Ok(render_text(bundle)),
    }
}

/// Assemble, render and store an export for a case.
pub fn generate_export(
    db: &Database,
    ctx: &AuditContext,
    case_id: &str,
    format: ExportFormat,
    include_audit_trail: bool,
) -> StorageResult<CourtExport> {
    let bundle = assemble_bundle(db, ctx, case_id, include_audit_trail)?;
    let content = render_bundle(&bundle, format)?;
    let export = ExportRepository::new(db).create(ctx, case_id, format, include_audit_trail, content)?;
    tracing::info!(
        export_id = %export.id,
        export_number = %export.export_number,
        case_id = %case_id,
        digest = %export.digest,
        size_bytes = export.size_bytes,
        "Court export generated"
    );
    Ok(export)
}

fn ts(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn render_text(b: &EvidenceBundle) -> String {
    let mut out = String::new();
    let case = &b.case;

    let _ = writeln!(out, "EVIDENCE BUNDLE v{}", b.bundle_version);
    let _ = writeln!(out, "Generated {} by {}", ts(&b.generated_at), b.generated_by.as_deref().unwrap_or("system"));
    let _ = writeln!(out);
    let _ = writeln!(out, "CASE {}: {}", case.case_number, case.title);
    let _ = writeln!(
        out,
        "  status {} | priority {} | {} | {} | state {}",
        case.status.as_str(),
        tag(&case.priority),
        tag(&case.fraud_type),
        case.department.display_name(),
        case.state_code
    );
    let _ = writeln!(out, "  amount lost {}", money(case.amount_lost, &case.currency));
    if let Some(date) = case.incident_date {
        let _ = writeln!(out, "  incident date {date}");
    }
    let _ = writeln!(out, "  complainant {}", case.complainant.name);
    let _ = writeln!(out, "  {}", case.description);

    let _ = writeln!(out, "\nWALLETS ({})", b.wallets.len());
    for w in &b.wallets {
        let _ = writeln!(out, "  {} {} risk {} ({})", w.blockchain, w.address, w.risk_score, tag(&w.status));
    }

    let _ = writeln!(out, "\nTRANSACTIONS ({})", b.transactions.len());
    for t in &b.transactions {
        let _ = writeln!(
            out,
            "  {} {} -> {} {}{}",
            ts(&t.occurred_at),
            t.from_address,
            t.to_address,
            money(t.amount, &t.currency),
            if t.is_suspicious { " [suspicious]" } else { "" }
        );
        let _ = writeln!(out, "    {} {}", t.blockchain, t.tx_hash);
    }

    let _ = writeln!(out, "\nPATTERNS ({})", b.patterns.len());
    for p in &b.patterns {
        let _ = writeln!(
            out,
            "  [{}] {} ({:.0}% confidence, {}): {}",
            tag(&p.severity),
            p.pattern_type.label(),
            p.confidence * 100.0,
            tag(&p.status),
            p.description
        );
    }

    let _ = writeln!(out, "\nSTR REPORTS ({})", b.str_reports.len());
    for s in &b.str_reports {
        let _ = writeln!(
            out,
            "  {} {} {} subject {}",
            s.str_number,
            s.status.as_str(),
            money(s.total_amount, &s.currency),
            s.subject_name
        );
    }

    let _ = writeln!(out, "\nTIMELINE ({})", b.timeline.len());
    for e in &b.timeline {
        let _ = writeln!(out, "  {} {} {}", ts(&e.created_at), tag(&e.event_type), e.description);
    }

    if let Some(trail) = &b.audit_trail {
        let _ = writeln!(out, "\nAUDIT TRAIL ({})", trail.entries.len());
        for e in &trail.entries {
            let _ = writeln!(
                out,
                "  #{} {} {} {} {} {}",
                e.sequence,
                e.entity_type.as_str(),
                e.action.as_str(),
                tag(&e.status),
                ts(&e.created_at),
                e.tx_hash
            );
        }
        let _ = writeln!(
            out,
            "  chain {} ({} rows checked, head {})",
            if trail.chain.valid { "valid" } else { "BROKEN" },
            trail.chain.checked,
            trail.chain.head_hash
        );
    }
    out
}
