// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Portal roles for authorization.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Portal roles.
///
/// ## Role Hierarchy
///
/// - `Admin` - Full access, including user and node management
/// - `Investigator` - Opens and works cases, files STRs
/// - `Analyst` - Traces transactions and records patterns
/// - `Auditor` - Read-only access to cases and the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Investigator,
    Analyst,
    Auditor,
}

impl Role {
    /// Check if this role has at least the privileges of the required role.
    pub fn has_privilege(&self, required: Role) -> bool {
        match (self, required) {
            (Role::Admin, _) => true,
            // Investigators and analysts share write access to case data
            (Role::Investigator | Role::Analyst, Role::Investigator | Role::Analyst) => true,
            // Anyone may read what auditors read
            (_, Role::Auditor) => true,
            _ => false,
        }
    }

    /// Whether the role may create or modify investigative records.
    pub fn can_write(&self) -> bool {
        !matches!(self, Role::Auditor)
    }

    /// Parse role from string (case-insensitive).
    pub fn from_str(s: &str) -> Option<Role> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "investigator" => Some(Role::Investigator),
            "analyst" => Some(Role::Analyst),
            "auditor" => Some(Role::Auditor),
            _ => None,
        }
    }
}

impl Default for Role {
    /// Least privilege.
    fn default() -> Self {
        Role::Auditor
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Investigator => write!(f, "investigator"),
            Role::Analyst => write!(f, "analyst"),
            Role::Auditor => write!(f, "auditor"),
        }
    }
}
