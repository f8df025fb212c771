// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-state fraud statistics.
//!
//! Case intake and resolution keep the counters current; admins can load
//! baseline figures for years that predate the portal.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use super::extract::{ApiJson, ApiQuery};
use crate::{
    auth::{AdminOnly, Auth},
    error::ApiError,
    state::AppState,
    storage::{NationalTotals, StateFraudStats, StateStatsRepository, StatsBaseline, StatsFilter},
};

#[derive(Debug, Serialize, ToSchema)]
pub struct StateStatsResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    pub totals: NationalTotals,
    /// Highest case count first.
    pub states: Vec<StateFraudStats>,
}

#[utoipa::path(
    get,
    path = "/api/stats/states",
    tag = "Statistics",
    security(("bearer_auth" = [])),
    params(StatsFilter),
    responses(
        (status = 200, description = "Statistics by state", body = StateStatsResponse)
    )
)]
pub async fn list_state_stats(
    Auth(_user): Auth,
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<StatsFilter>,
) -> Result<Json<StateStatsResponse>, ApiError> {
    let repo = StateStatsRepository::new(&state.db);
    Ok(Json(StateStatsResponse {
        year: filter.year,
        totals: repo.totals(&filter)?,
        states: repo.list(&filter)?,
    }))
}

#[utoipa::path(
    get,
    path = "/api/stats/states/{code}",
    tag = "Statistics",
    security(("bearer_auth" = [])),
    params(("code" = String, Path, description = "Two-letter state code")),
    responses(
        (status = 200, description = "Yearly statistics for the state", body = Vec<StateFraudStats>),
        (status = 404, description = "Unknown state code")
    )
)]
pub async fn get_state_stats(
    Auth(_user): Auth,
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Vec<StateFraudStats>>, ApiError> {
    Ok(Json(StateStatsRepository::new(&state.db).for_state(&code)?))
}

/// Replace the baseline figures for one state and year.
#[utoipa::path(
    put,
    path = "/api/stats/states/{code}",
    tag = "Statistics",
    security(("bearer_auth" = [])),
    params(("code" = String, Path, description = "Two-letter state code")),
    request_body = StatsBaseline,
    responses(
        (status = 200, description = "Statistics stored", body = StateFraudStats),
        (status = 400, description = "Invalid figures"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Unknown state code")
    )
)]
pub async fn put_state_stats(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(code): Path<String>,
    ApiJson(baseline): ApiJson<StatsBaseline>,
) -> Result<Json<StateFraudStats>, ApiError> {
    let stats = StateStatsRepository::new(&state.db).upsert_baseline(&code, baseline)?;
    tracing::info!(state = %stats.state_code, year = stats.year, user_id = %admin.user_id, "State baseline stored");
    Ok(Json(stats))
}
