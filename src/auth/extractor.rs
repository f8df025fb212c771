// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for authenticated users.
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is AuthenticatedUser
//! }
//! ```
//!
//! | Extractor | Admits |
//! |-----------|--------|
//! | [`Auth`] | any active user |
//! | [`Writer`] | admin, investigator, analyst |
//! | [`AdminOnly`] | admin |

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use super::token::verify_token;
use super::{AuthError, AuthenticatedUser};
use crate::state::AppState;
use crate::storage::{StorageError, UserRepository};

/// Extractor for authenticated users.
///
/// The token subject must still be an active user; role and department are
/// taken from the user row, not from the token.
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>().cloned() {
            return Ok(Auth(user));
        }

        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthHeader)?
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidAuthHeader)?;

        let claims = verify_token(&state.auth_config, token)?;

        let user = match UserRepository::new(&state.db).get(&claims.sub) {
            Ok(user) => user,
            Err(StorageError::NotFound(_)) => return Err(AuthError::AccountDisabled),
            Err(e) => return Err(AuthError::InternalError(e.to_string())),
        };
        if !user.active {
            return Err(AuthError::AccountDisabled);
        }

        let authenticated = AuthenticatedUser {
            user_id: user.id,
            username: user.username,
            role: user.role,
            department: user.department,
            issuer: claims.iss,
            expires_at: claims.exp,
        };
        // Later extractors on the same request reuse this
        parts.extensions.insert(authenticated.clone());
        Ok(Auth(authenticated))
    }
}

/// Extractor that requires write access to investigative data.
pub struct Writer(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Writer {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;

        if !user.can_write() {
            return Err(AuthError::InsufficientPermissions);
        }

        Ok(Writer(user))
    }
}

/// Extractor that requires admin role.
pub struct AdminOnly(pub AuthenticatedUser);

impl FromRequestParts<AppState> for AdminOnly {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;

        if !user.is_admin() {
            return Err(AuthError::InsufficientPermissions);
        }

        Ok(AdminOnly(user))
    }
}
