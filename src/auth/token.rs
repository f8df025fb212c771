// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HS256 access tokens.
//!
//! ## Modes
//!
//! - **Production** (`JWT_SECRET` set): tokens are signed with the secret and
//!   verified for signature, issuer and expiry with 60 s of clock skew.
//! - **Development** (no secret): tokens are signed with a fixed key and
//!   decoded without signature verification. Expiry is still enforced.

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use super::{AuthError, PortalClaims};
use crate::state::AuthConfig;
use crate::storage::User;

/// Clock skew tolerance (60 seconds).
pub const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Signing key used when no secret is configured.
const DEVELOPMENT_KEY: &[u8] = b"cryptocase-development-signing-key";

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

fn signing_key(config: &AuthConfig) -> &[u8] {
    config
        .secret
        .as_deref()
        .map(str::as_bytes)
        .unwrap_or(DEVELOPMENT_KEY)
}

/// Sign a token for `user`, valid from `now` for the configured TTL.
pub fn issue_token(config: &AuthConfig, user: &User, now: DateTime<Utc>) -> Result<IssuedToken, AuthError> {
    let ttl = chrono::Duration::from_std(config.token_ttl)
        .map_err(|e| AuthError::InternalError(format!("token ttl out of range: {e}")))?;
    let expires_at = now + ttl;
    let claims = PortalClaims {
        sub: user.id.clone(),
        username: user.username.clone(),
        role: user.role,
        department: user.department,
        iss: config.issuer.clone(),
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key(config)),
    )
    .map_err(|e| AuthError::InternalError(format!("failed to sign token: {e}")))?;

    Ok(IssuedToken { token, expires_at })
}

/// Decode and check a bearer token.
pub fn verify_token(config: &AuthConfig, token: &str) -> Result<PortalClaims, AuthError> {
    match config.secret.as_deref() {
        Some(secret) => verify_production(token, secret, &config.issuer),
        None => verify_development(token),
    }
}

fn verify_production(token: &str, secret: &str, issuer: &str) -> Result<PortalClaims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = CLOCK_SKEW_LEEWAY;
    validation.validate_aud = false;
    validation.set_issuer(&[issuer]);
    validation.set_required_spec_claims(&["exp", "sub", "iss"]);

    let data = decode::<PortalClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
            _ => AuthError::MalformedToken,
        })?;
    Ok(data.claims)
}

/// WARNING: no signature check. Development only.
fn verify_development(token: &str) -> Result<PortalClaims, AuthError> {
    let data = jsonwebtoken::dangerous::insecure_decode::<PortalClaims>(token)
        .map_err(|_| AuthError::MalformedToken)?;
    let claims = data.claims;

    let now = Utc::now().timestamp();
    if claims.exp > 0 && claims.exp < now - CLOCK_SKEW_LEEWAY as i64 {
        return Err(AuthError::TokenExpired);
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::models::Department;
    use std::time::Duration;

    fn user() -> User {
        let now = Utc::now();
        User {
            id: "user-1".into(),
            username: "inspector".into(),
            full_name: "Inspector Rao".into(),
            badge_number: None,
            department: Department::Cbi,
            role: Role::Investigator,
            password_hash: String::new(),
            active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn production(secret: &str) -> AuthConfig {
        AuthConfig {
            secret: Some(secret.into()),
            issuer: "test-portal".into(),
            token_ttl: Duration::from_secs(3600),
        }
    }

    #[test]
    fn production_round_trip() {
        let config = production("top-secret");
        let issued = issue_token(&config, &user(), Utc::now()).unwrap();
        let claims = verify_token(&config, &issued.token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.role, Role::Investigator);
        assert_eq!(claims.iss, "test-portal");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let issued = issue_token(&production("a"), &user(), Utc::now()).unwrap();
        assert!(matches!(
            verify_token(&production("b"), &issued.token),
            Err(AuthError::InvalidSignature)
        ));
    }

    #[test]
    fn wrong_issuer_is_rejected() {
        let issued = issue_token(&production("k"), &user(), Utc::now()).unwrap();
        let mut other = production("k");
        other.issuer = "someone-else".into();
        assert!(matches!(verify_token(&other, &issued.token), Err(AuthError::InvalidIssuer)));
    }

    #[test]
    fn expired_tokens_fail_in_both_modes() {
        let past = Utc::now() - chrono::Duration::hours(3);
        let config = production("k");
        let issued = issue_token(&config, &user(), past).unwrap();
        assert!(matches!(verify_token(&config, &issued.token), Err(AuthError::TokenExpired)));

        let dev = AuthConfig::development();
        let mut short = dev.clone();
        short.token_ttl = Duration::from_secs(60);
        let issued = issue_token(&short, &user(), past).unwrap();
        assert!(matches!(verify_token(&dev, &issued.token), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn development_mode_skips_signature() {
        let issued = issue_token(&production("whatever"), &user(), Utc::now()).unwrap();
        let claims = verify_token(&AuthConfig::development(), &issued.token).unwrap();
        assert_eq!(claims.username, "inspector");
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            verify_token(&AuthConfig::development(), "not.a.jwt"),
            Err(AuthError::MalformedToken)
        ));
        assert!(matches!(
            verify_token(&production("k"), "not.a.jwt"),
            Err(AuthError::MalformedToken)
        ));
    }
}
