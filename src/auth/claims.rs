// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT claims and authenticated user representation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::roles::Role;
use crate::models::Department;

/// Claims carried by portal access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Login name at issuance
    #[serde(default)]
    pub username: String,
    /// Role at issuance
    pub role: Role,
    /// Department at issuance
    pub department: Department,
    /// Issuer
    #[serde(default)]
    pub iss: String,
    /// Issued at timestamp
    #[serde(default)]
    pub iat: i64,
    /// Expiration timestamp
    #[serde(default)]
    pub exp: i64,
}

/// Authenticated user extracted from a verified token.
///
/// Role and department are refreshed from the user table on every request,
/// so a role change or deactivation takes effect without re-login.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub username: String,
    pub role: Role,
    pub department: Department,
    /// Token issuer
    #[serde(skip)]
    pub issuer: String,
    /// Token expiry (unix seconds)
    pub expires_at: i64,
}

impl AuthenticatedUser {
    /// Check if user has a specific role (or higher privilege).
    pub fn has_role(&self, role: Role) -> bool {
        self.role.has_privilege(role)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn can_write(&self) -> bool {
        self.role.can_write()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: "u1".into(),
            username: "officer".into(),
            role,
            department: Department::StatePolice,
            issuer: "test".into(),
            expires_at: 0,
        }
    }

    #[test]
    fn role_helpers() {
        assert!(user(Role::Admin).is_admin());
        assert!(!user(Role::Analyst).is_admin());
        assert!(user(Role::Analyst).can_write());
        assert!(!user(Role::Auditor).can_write());
        assert!(user(Role::Investigator).has_role(Role::Auditor));
    }

    #[test]
    fn claims_deserialize_with_defaults() {
        let claims: PortalClaims = serde_json::from_str(
            r#"{"sub":"u1","role":"analyst","department":"fiu_ind","exp":10}"#,
        )
        .unwrap();
        assert_eq!(claims.role, Role::Analyst);
        assert_eq!(claims.department, Department::FiuInd);
        assert!(claims.username.is_empty());
        assert_eq!(claims.iat, 0);
    }
}
