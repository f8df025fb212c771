// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Fraud news and advisories.

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};

use super::extract::{ApiJson, ApiQuery};
use super::ListResponse;
use crate::{
    auth::{AdminOnly, Auth},
    error::ApiError,
    state::AppState,
    storage::{NewNewsItem, NewsFilter, NewsItem, NewsRepository, Pagination},
};

#[utoipa::path(
    get,
    path = "/api/news",
    tag = "News",
    security(("bearer_auth" = [])),
    params(NewsFilter, Pagination),
    responses(
        (status = 200, description = "News, most recent first", body = ListResponse<NewsItem>)
    )
)]
pub async fn list_news(
    Auth(_user): Auth,
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<NewsFilter>,
    ApiQuery(pagination): ApiQuery<Pagination>,
) -> Result<Json<ListResponse<NewsItem>>, ApiError> {
    let page = NewsRepository::new(&state.db).list(&filter, pagination)?;
    Ok(Json(page.into()))
}

#[utoipa::path(
    post,
    path = "/api/news",
    tag = "News",
    security(("bearer_auth" = [])),
    request_body = NewNewsItem,
    responses(
        (status = 201, description = "News item published", body = NewsItem),
        (status = 400, description = "Invalid item"),
        (status = 403, description = "Admin only")
    )
)]
pub async fn create_news(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<NewNewsItem>,
) -> Result<(StatusCode, Json<NewsItem>), ApiError> {
    let item = NewsRepository::new(&state.db).create(Some(&admin.user_id), request)?;
    Ok((StatusCode::CREATED, Json(item)))
}
