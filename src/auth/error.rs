// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Authentication error type.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Authorization header is required")]
    MissingAuthHeader,
    #[error("Invalid authorization header format (expected 'Bearer <token>')")]
    InvalidAuthHeader,
    #[error("Token is malformed")]
    MalformedToken,
    #[error("Token signature is invalid")]
    InvalidSignature,
    #[error("Token has expired")]
    TokenExpired,
    #[error("Token issuer is invalid")]
    InvalidIssuer,
    #[error("Invalid username or password")]
    InvalidCredentials,
    /// Token subject no longer maps to an active user
    #[error("User account is disabled or no longer exists")]
    AccountDisabled,
    #[error("Insufficient permissions for this operation")]
    InsufficientPermissions,
    #[error("Internal authentication error: {0}")]
    InternalError(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader => "missing_auth_header",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::MalformedToken => "malformed_token",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::InvalidIssuer => "invalid_issuer",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::AccountDisabled => "account_disabled",
            AuthError::InsufficientPermissions => "insufficient_permissions",
            AuthError::InternalError(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AuthError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let AuthError::InternalError(detail) = &self {
            tracing::error!(error = %detail, "Authentication failed internally");
        }
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
