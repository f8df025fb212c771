// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Aggregate counts for the landing dashboard.

use std::collections::BTreeMap;

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    auth::Auth,
    error::ApiError,
    state::AppState,
    storage::{
        Case, CaseRepository, LedgerRepository, NodeRepository, PatternFilter, PatternRepository,
        PatternStatus, Pagination, RiskLevel, StrRepository, TransactionRepository,
        WalletRepository, WalletStatus,
    },
};

/// Number of cases listed under `recent_cases`.
const RECENT_CASES: usize = 5;

#[derive(Debug, Serialize, ToSchema)]
pub struct CaseCounts {
    pub total: usize,
    /// Keyed by status tag.
    pub by_status: BTreeMap<String, usize>,
    /// Not yet resolved or closed.
    pub open: usize,
    pub resolved: usize,
    pub total_amount_lost: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WalletCounts {
    pub total: usize,
    /// Risk level high or critical.
    pub high_risk: usize,
    pub frozen: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionCounts {
    pub total: usize,
    pub suspicious: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PatternCounts {
    pub total: usize,
    pub unreviewed: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LedgerCounts {
    pub height: u64,
    pub pending: usize,
    pub active_nodes: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardResponse {
    pub cases: CaseCounts,
    pub wallets: WalletCounts,
    pub transactions: TransactionCounts,
    pub patterns: PatternCounts,
    /// STR count keyed by status tag.
    pub str_reports: BTreeMap<String, usize>,
    pub ledger: LedgerCounts,
    /// Most recently opened cases.
    pub recent_cases: Vec<Case>,
}

#[utoipa::path(
    get,
    path = "/api/dashboard",
    tag = "Dashboard",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Dashboard counts", body = DashboardResponse)
    )
)]
pub async fn dashboard(
    Auth(_user): Auth,
    State(state): State<AppState>,
) -> Result<Json<DashboardResponse>, ApiError> {
    let db = &state.db;

    let mut cases = CaseRepository::new(db).all()?;
    let mut by_status = BTreeMap::new();
    for case in &cases {
        *by_status.entry(case.status.as_str().to_string()).or_insert(0) += 1;
    }
    let resolved = cases.iter().filter(|c| c.status.is_resolved()).count();
    let case_counts = CaseCounts {
        total: cases.len(),
        by_status,
        open: cases.len() - resolved,
        resolved,
        total_amount_lost: cases.iter().map(|c| c.amount_lost).sum(),
    };
    cases.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    cases.truncate(RECENT_CASES);

    let wallets = WalletRepository::new(db).all()?;
    let wallet_counts = WalletCounts {
        total: wallets.len(),
        high_risk: wallets.iter().filter(|w| w.risk_level >= RiskLevel::High).count(),
        frozen: wallets.iter().filter(|w| w.status == WalletStatus::Frozen).count(),
    };

    let transactions = TransactionRepository::new(db).all()?;
    let transaction_counts = TransactionCounts {
        total: transactions.len(),
        suspicious: transactions.iter().filter(|t| t.is_suspicious).count(),
    };

    let patterns = PatternRepository::new(db).list(&PatternFilter::default(), Pagination::all())?;
    let pattern_counts = PatternCounts {
        total: patterns.total,
        unreviewed: patterns
            .items
            .iter()
            .filter(|p| p.status == PatternStatus::New)
            .count(),
    };

    let mut str_reports = BTreeMap::new();
    for report in StrRepository::new(db).all()? {
        *str_reports.entry(report.status.as_str().to_string()).or_insert(0) += 1;
    }

    let ledger = LedgerRepository::new(db);
    let ledger_counts = LedgerCounts {
        height: ledger.height()?,
        pending: ledger.pending_count()?,
        active_nodes: NodeRepository::new(db).active()?.len(),
    };

    Ok(Json(DashboardResponse {
        cases: case_counts,
        wallets: wallet_counts,
        transactions: transaction_counts,
        patterns: pattern_counts,
        str_reports,
        ledger: ledger_counts,
        recent_cases: cases,
    }))
}
