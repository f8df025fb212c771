// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User endpoints. Everything except `/me` is admin only.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::extract::{ApiJson, ApiQuery};
use super::ListResponse;
use crate::{
    auth::{AdminOnly, Auth, Role},
    error::ApiError,
    state::AppState,
    storage::{NewUser, Pagination, UserFilter, UserPatch, UserRepository, UserResponse},
};

/// Get the current authenticated user's account.
#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "Users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User information", body = UserResponse),
        (status = 401, description = "Unauthorized - invalid or missing token"),
    )
)]
pub async fn get_current_user(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, ApiError> {
    let row = UserRepository::new(&state.db).get(&user.user_id)?;
    Ok(Json(row.into()))
}

#[utoipa::path(
    get,
    path = "/api/users",
    tag = "Users",
    security(("bearer_auth" = [])),
    params(UserFilter, Pagination),
    responses(
        (status = 200, description = "Users", body = ListResponse<UserResponse>),
        (status = 403, description = "Admin only")
    )
)]
pub async fn list_users(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<UserFilter>,
    ApiQuery(pagination): ApiQuery<Pagination>,
) -> Result<Json<ListResponse<UserResponse>>, ApiError> {
    let page = UserRepository::new(&state.db).list(&filter, pagination)?;
    Ok(Json(page.map(UserResponse::from).into()))
}

#[utoipa::path(
    post,
    path = "/api/users",
    tag = "Users",
    security(("bearer_auth" = [])),
    request_body = NewUser,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Invalid user"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Username taken")
    )
)]
pub async fn create_user(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<NewUser>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    // bcrypt is CPU bound
    let db = state.db.clone();
    let user = tokio::task::spawn_blocking(move || UserRepository::new(&db).create(request))
        .await
        .map_err(ApiError::internal)??;
    tracing::info!(
        user_id = %user.id,
        username = %user.username,
        role = %user.role,
        created_by = %admin.user_id,
        "User created"
    );
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[utoipa::path(
    patch,
    path = "/api/users/{id}",
    tag = "Users",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "User ID")),
    request_body = UserPatch,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 400, description = "Invalid update"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "User not found")
    )
)]
pub async fn update_user(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<UserPatch>,
) -> Result<Json<UserResponse>, ApiError> {
    // An admin cannot lock themselves out
    if id == admin.user_id
        && (patch.active == Some(false) || patch.role.is_some_and(|r| r != Role::Admin))
    {
        return Err(ApiError::bad_request(
            "administrators cannot deactivate or demote their own account",
        ));
    }
    let db = state.db.clone();
    let user = tokio::task::spawn_blocking(move || UserRepository::new(&db).update(&id, patch))
        .await
        .map_err(ApiError::internal)??;
    tracing::info!(user_id = %user.id, updated_by = %admin.user_id, "User updated");
    Ok(Json(user.into()))
}
