// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Suspicious pattern endpoints. Detection runs live under
//! `/api/cases/{id}/patterns/detect`; these cover manual records and review.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::extract::{ApiJson, ApiQuery};
use super::ListResponse;
use crate::{
    auth::{Auth, Writer},
    error::ApiError,
    state::AppState,
    storage::{
        AuditContext, NewPattern, Pagination, PatternFilter, PatternPatch, PatternRepository,
        SuspiciousPattern,
    },
};

#[utoipa::path(
    get,
    path = "/api/patterns",
    tag = "Patterns",
    security(("bearer_auth" = [])),
    params(PatternFilter, Pagination),
    responses(
        (status = 200, description = "Patterns", body = ListResponse<SuspiciousPattern>)
    )
)]
pub async fn list_patterns(
    Auth(_user): Auth,
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<PatternFilter>,
    ApiQuery(pagination): ApiQuery<Pagination>,
) -> Result<Json<ListResponse<SuspiciousPattern>>, ApiError> {
    let page = PatternRepository::new(&state.db).list(&filter, pagination)?;
    Ok(Json(page.into()))
}

#[utoipa::path(
    post,
    path = "/api/patterns",
    tag = "Patterns",
    security(("bearer_auth" = [])),
    request_body = NewPattern,
    responses(
        (status = 201, description = "Pattern recorded", body = SuspiciousPattern),
        (status = 400, description = "Invalid pattern or dangling reference"),
        (status = 403, description = "Read-only role")
    )
)]
pub async fn create_pattern(
    Writer(user): Writer,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<NewPattern>,
) -> Result<(StatusCode, Json<SuspiciousPattern>), ApiError> {
    let pattern = PatternRepository::new(&state.db).create(&AuditContext::from(&user), request)?;
    Ok((StatusCode::CREATED, Json(pattern)))
}

#[utoipa::path(
    get,
    path = "/api/patterns/{id}",
    tag = "Patterns",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Pattern ID")),
    responses(
        (status = 200, description = "Pattern", body = SuspiciousPattern),
        (status = 404, description = "Pattern not found")
    )
)]
pub async fn get_pattern(
    Auth(_user): Auth,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuspiciousPattern>, ApiError> {
    Ok(Json(PatternRepository::new(&state.db).get(&id)?))
}

#[utoipa::path(
    patch,
    path = "/api/patterns/{id}",
    tag = "Patterns",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Pattern ID")),
    request_body = PatternPatch,
    responses(
        (status = 200, description = "Pattern updated", body = SuspiciousPattern),
        (status = 403, description = "Read-only role"),
        (status = 404, description = "Pattern not found")
    )
)]
pub async fn update_pattern(
    Writer(_user): Writer,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<PatternPatch>,
) -> Result<Json<SuspiciousPattern>, ApiError> {
    Ok(Json(PatternRepository::new(&state.db).update(&id, patch)?))
}
