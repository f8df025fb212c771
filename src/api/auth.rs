// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Login endpoint.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::extract::ApiJson;
use crate::{
    auth::{issue_token, password::{verify_password, DUMMY_HASH}, AuthError},
    state::AppState,
    storage::{UserRepository, UserResponse},
};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    /// Always `Bearer`.
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserResponse,
}

/// Exchange credentials for an access token.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = LoginResponse),
        (status = 401, description = "Invalid credentials or disabled account")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthError> {
    let repo = UserRepository::new(&state.db);
    let user = repo
        .find_by_username(&request.username)
        .map_err(|e| AuthError::InternalError(e.to_string()))?;

    // bcrypt is CPU bound. Unknown usernames are checked against a dummy
    // hash so they take as long as a wrong password.
    let hash = match &user {
        Some(user) => user.password_hash.clone(),
        None => DUMMY_HASH.clone(),
    };
    let password = request.password;
    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AuthError::InternalError(e.to_string()))?;
    let user = match user {
        Some(user) if valid => user,
        Some(user) => {
            tracing::info!(username = %user.username, "Login failed: bad password");
            return Err(AuthError::InvalidCredentials);
        }
        None => {
            tracing::info!(username = %request.username, "Login failed: unknown user");
            return Err(AuthError::InvalidCredentials);
        }
    };
    if !user.active {
        tracing::info!(username = %user.username, "Login refused: account disabled");
        return Err(AuthError::AccountDisabled);
    }

    let now = Utc::now();
    let issued = issue_token(&state.auth_config, &user, now)?;
    if let Err(e) = repo.record_login(&user.id, now) {
        tracing::warn!(user_id = %user.id, error = %e, "Failed to record login time");
    }
    tracing::info!(user_id = %user.id, role = %user.role, "User logged in");

    let mut user = UserResponse::from(user);
    user.last_login_at = Some(now);
    Ok(Json(LoginResponse {
        token: issued.token,
        token_type: "Bearer".to_string(),
        expires_at: issued.expires_at,
        user,
    }))
}
