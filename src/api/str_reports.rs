// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Suspicious Transaction Report endpoints.
//!
//! Status workflow: `draft -> submitted -> under_review -> filed | rejected`,
//! and `rejected -> draft` for rework. Content can only change while the
//! report is a draft or rejected. Create and update are audited.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::extract::{ApiJson, ApiQuery};
use super::{audited_response, AuditedResponse, ListResponse};
use crate::{
    auth::{Auth, Writer},
    error::ApiError,
    reports::{render_str_document, StrDocument},
    state::AppState,
    storage::{AuditContext, NewStrReport, Pagination, StrFilter, StrPatch, StrReport, StrRepository},
};

#[utoipa::path(
    get,
    path = "/api/str-reports",
    tag = "STR Reports",
    security(("bearer_auth" = [])),
    params(StrFilter, Pagination),
    responses(
        (status = 200, description = "Reports, newest first", body = ListResponse<StrReport>)
    )
)]
pub async fn list_str_reports(
    Auth(_user): Auth,
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<StrFilter>,
    ApiQuery(pagination): ApiQuery<Pagination>,
) -> Result<Json<ListResponse<StrReport>>, ApiError> {
    let page = StrRepository::new(&state.db).list(&filter, pagination)?;
    Ok(Json(page.into()))
}

#[utoipa::path(
    post,
    path = "/api/str-reports",
    tag = "STR Reports",
    security(("bearer_auth" = [])),
    request_body = NewStrReport,
    responses(
        (status = 201, description = "Draft report created", body = AuditedResponse<StrReport>),
        (status = 400, description = "Invalid report, unknown case/wallet or foreign transaction"),
        (status = 403, description = "Read-only role")
    )
)]
pub async fn create_str_report(
    Writer(user): Writer,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<NewStrReport>,
) -> Result<(StatusCode, Json<AuditedResponse<StrReport>>), ApiError> {
    let audited = StrRepository::new(&state.db).create(&AuditContext::from(&user), request)?;
    tracing::info!(
        str_id = %audited.record.id,
        str_number = %audited.record.str_number,
        case_id = %audited.record.case_id,
        "STR drafted"
    );
    Ok((StatusCode::CREATED, Json(audited_response(&state, audited))))
}

#[utoipa::path(
    get,
    path = "/api/str-reports/{id}",
    tag = "STR Reports",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "STR ID")),
    responses(
        (status = 200, description = "Report", body = StrReport),
        (status = 404, description = "Report not found")
    )
)]
pub async fn get_str_report(
    Auth(_user): Auth,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StrReport>, ApiError> {
    Ok(Json(StrRepository::new(&state.db).get(&id)?))
}

#[utoipa::path(
    patch,
    path = "/api/str-reports/{id}",
    tag = "STR Reports",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "STR ID")),
    request_body = StrPatch,
    responses(
        (status = 200, description = "Report updated", body = AuditedResponse<StrReport>),
        (status = 400, description = "Invalid update or status transition"),
        (status = 403, description = "Read-only role"),
        (status = 404, description = "Report not found")
    )
)]
pub async fn update_str_report(
    Writer(user): Writer,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<StrPatch>,
) -> Result<Json<AuditedResponse<StrReport>>, ApiError> {
    let audited = StrRepository::new(&state.db).update(&AuditContext::from(&user), &id, patch)?;
    tracing::info!(
        str_id = %audited.record.id,
        status = audited.record.status.as_str(),
        user_id = %user.user_id,
        "STR updated"
    );
    Ok(Json(audited_response(&state, audited)))
}

/// Render the report as a plain-text compliance document.
#[utoipa::path(
    get,
    path = "/api/str-reports/{id}/document",
    tag = "STR Reports",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "STR ID")),
    responses(
        (status = 200, description = "Rendered document", body = StrDocument),
        (status = 404, description = "Report not found")
    )
)]
pub async fn str_document(
    Auth(_user): Auth,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StrDocument>, ApiError> {
    Ok(Json(render_str_document(&state.db, &id)?))
}
