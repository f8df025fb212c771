// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Case timeline across all cases, and manual notes.

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};

use super::extract::{ApiJson, ApiQuery};
use super::ListResponse;
use crate::{
    auth::{Auth, Writer},
    error::ApiError,
    state::AppState,
    storage::{AuditContext, NewTimelineEvent, Pagination, TimelineEvent, TimelineFilter, TimelineRepository},
};

#[utoipa::path(
    get,
    path = "/api/timeline",
    tag = "Timeline",
    security(("bearer_auth" = [])),
    params(TimelineFilter, Pagination),
    responses(
        (status = 200, description = "Timeline events, newest first", body = ListResponse<TimelineEvent>)
    )
)]
pub async fn list_timeline(
    Auth(_user): Auth,
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<TimelineFilter>,
    ApiQuery(pagination): ApiQuery<Pagination>,
) -> Result<Json<ListResponse<TimelineEvent>>, ApiError> {
    let page = TimelineRepository::new(&state.db).list(&filter, pagination)?;
    Ok(Json(page.into()))
}

#[utoipa::path(
    post,
    path = "/api/timeline",
    tag = "Timeline",
    security(("bearer_auth" = [])),
    request_body = NewTimelineEvent,
    responses(
        (status = 201, description = "Timeline entry added", body = TimelineEvent),
        (status = 400, description = "Invalid entry or unknown case"),
        (status = 403, description = "Read-only role")
    )
)]
pub async fn create_timeline_event(
    Writer(user): Writer,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<NewTimelineEvent>,
) -> Result<(StatusCode, Json<TimelineEvent>), ApiError> {
    let event = TimelineRepository::new(&state.db).create(&AuditContext::from(&user), request)?;
    Ok((StatusCode::CREATED, Json(event)))
}
