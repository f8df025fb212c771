// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Case endpoints.
//!
//! Case create and update are audited: the response carries the
//! `blockchain_transactions` row written with the change, and a
//! `ledger_recorded` event is pushed to WebSocket clients.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;

use super::extract::{ApiJson, ApiQuery};
use super::{audited_response, AuditedResponse, ListResponse};
use crate::{
    analysis::{detect_patterns, DetectionConfig},
    auth::{Auth, Writer},
    blockchain::{EntityKind, LedgerEntry},
    error::ApiError,
    reports::generate_export,
    state::AppState,
    storage::{
        AuditContext, Case, CaseFilter, CasePatch, CaseRepository, DetectionOutcome, ExportFormat,
        ExportRepository, ExportSummary, LedgerRepository, NewCase, Pagination, PatternRepository,
        TimelineEvent, TimelineRepository,
    },
};

#[utoipa::path(
    get,
    path = "/api/cases",
    tag = "Cases",
    security(("bearer_auth" = [])),
    params(CaseFilter, Pagination),
    responses(
        (status = 200, description = "Cases, newest first", body = ListResponse<Case>),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_cases(
    Auth(_user): Auth,
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<CaseFilter>,
    ApiQuery(pagination): ApiQuery<Pagination>,
) -> Result<Json<ListResponse<Case>>, ApiError> {
    let page = CaseRepository::new(&state.db).list(&filter, pagination)?;
    Ok(Json(page.into()))
}

/// Open a new case.
///
/// Assigns the next `CASE-YYYY-NNNNN` number and counts the case in the
/// statistics for its state.
#[utoipa::path(
    post,
    path = "/api/cases",
    tag = "Cases",
    security(("bearer_auth" = [])),
    request_body = NewCase,
    responses(
        (status = 201, description = "Case created", body = AuditedResponse<Case>),
        (status = 400, description = "Invalid case or unknown assignee"),
        (status = 403, description = "Read-only role")
    )
)]
pub async fn create_case(
    Writer(user): Writer,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<NewCase>,
) -> Result<(StatusCode, Json<AuditedResponse<Case>>), ApiError> {
    let audited = CaseRepository::new(&state.db).create(&AuditContext::from(&user), request)?;
    tracing::info!(
        case_id = %audited.record.id,
        case_number = %audited.record.case_number,
        user_id = %user.user_id,
        "Case created"
    );
    Ok((StatusCode::CREATED, Json(audited_response(&state, audited))))
}

#[utoipa::path(
    get,
    path = "/api/cases/{id}",
    tag = "Cases",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Case ID")),
    responses(
        (status = 200, description = "Case", body = Case),
        (status = 404, description = "Case not found")
    )
)]
pub async fn get_case(
    Auth(_user): Auth,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Case>, ApiError> {
    Ok(Json(CaseRepository::new(&state.db).get(&id)?))
}

/// Partially update a case, including status transitions.
#[utoipa::path(
    patch,
    path = "/api/cases/{id}",
    tag = "Cases",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Case ID")),
    request_body = CasePatch,
    responses(
        (status = 200, description = "Case updated", body = AuditedResponse<Case>),
        (status = 400, description = "Invalid update or status transition"),
        (status = 403, description = "Read-only role"),
        (status = 404, description = "Case not found")
    )
)]
pub async fn update_case(
    Writer(user): Writer,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<CasePatch>,
) -> Result<Json<AuditedResponse<Case>>, ApiError> {
    let audited = CaseRepository::new(&state.db).update(&AuditContext::from(&user), &id, patch)?;
    tracing::info!(
        case_id = %audited.record.id,
        status = audited.record.status.as_str(),
        user_id = %user.user_id,
        "Case updated"
    );
    Ok(Json(audited_response(&state, audited)))
}

#[utoipa::path(
    get,
    path = "/api/cases/{id}/timeline",
    tag = "Cases",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Case ID")),
    responses(
        (status = 200, description = "Timeline, oldest first", body = Vec<TimelineEvent>),
        (status = 404, description = "Case not found")
    )
)]
pub async fn case_timeline(
    Auth(_user): Auth,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<TimelineEvent>>, ApiError> {
    CaseRepository::new(&state.db).get(&id)?;
    Ok(Json(TimelineRepository::new(&state.db).for_case(&id)?))
}

/// Audit rows recorded for the case itself.
#[utoipa::path(
    get,
    path = "/api/cases/{id}/audit",
    tag = "Cases",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Case ID")),
    responses(
        (status = 200, description = "Audit rows in chain order", body = Vec<LedgerEntry>),
        (status = 404, description = "Case not found")
    )
)]
pub async fn case_audit_trail(
    Auth(_user): Auth,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<LedgerEntry>>, ApiError> {
    CaseRepository::new(&state.db).get(&id)?;
    Ok(Json(
        LedgerRepository::new(&state.db).list_for_entity(EntityKind::Case, &id)?,
    ))
}

/// Run the pattern detectors over the case's transactions.
#[utoipa::path(
    post,
    path = "/api/cases/{id}/patterns/detect",
    tag = "Cases",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Case ID")),
    responses(
        (status = 200, description = "Detection result", body = DetectionOutcome),
        (status = 403, description = "Read-only role"),
        (status = 404, description = "Case not found")
    )
)]
pub async fn detect_case_patterns(
    Writer(user): Writer,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DetectionOutcome>, ApiError> {
    let config = DetectionConfig::default();
    let outcome = PatternRepository::new(&state.db).record_detections(
        &AuditContext::from(&user),
        &id,
        |transactions| detect_patterns(transactions, &config),
    )?;
    tracing::info!(
        case_id = %id,
        analyzed = outcome.transactions_analyzed,
        new_patterns = outcome.patterns.len(),
        flagged = outcome.flagged_transactions,
        "Pattern detection run"
    );
    Ok(Json(outcome))
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CreateExportRequest {
    #[serde(default)]
    pub format: ExportFormat,
    #[serde(default)]
    pub include_audit_trail: bool,
}

#[utoipa::path(
    get,
    path = "/api/cases/{id}/exports",
    tag = "Exports",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Case ID")),
    responses(
        (status = 200, description = "Exports, newest first", body = Vec<ExportSummary>),
        (status = 404, description = "Case not found")
    )
)]
pub async fn list_case_exports(
    Auth(_user): Auth,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ExportSummary>>, ApiError> {
    CaseRepository::new(&state.db).get(&id)?;
    let exports = ExportRepository::new(&state.db).for_case(&id)?;
    Ok(Json(exports.into_iter().map(ExportSummary::from).collect()))
}

/// Generate a court evidence bundle for the case.
#[utoipa::path(
    post,
    path = "/api/cases/{id}/exports",
    tag = "Exports",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Case ID")),
    request_body = CreateExportRequest,
    responses(
        (status = 201, description = "Export generated", body = ExportSummary),
        (status = 403, description = "Read-only role"),
        (status = 404, description = "Case not found")
    )
)]
pub async fn create_case_export(
    Writer(user): Writer,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<CreateExportRequest>,
) -> Result<(StatusCode, Json<ExportSummary>), ApiError> {
    let export = generate_export(
        &state.db,
        &AuditContext::from(&user),
        &id,
        request.format,
        request.include_audit_trail,
    )?;
    Ok((StatusCode::CREATED, Json(export.into())))
}
