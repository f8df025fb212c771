// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Portal user accounts.
//!
//! Usernames are unique case-insensitively through the `usernames` index.
//! Password hashes are stored with the row but never leave this module in an
//! API response (see [`UserResponse`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::super::database::{
    claim_unique, lookup_unique, put_json, require_json, Database, Page, Pagination, Record,
    StorageError, StorageResult, USERNAMES, USERS,
};
use crate::auth::password::{check_password_strength, hash_password};
use crate::auth::Role;
use crate::models::{limit_text, require_text, Department};

/// Stored user row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub badge_number: Option<String>,
    pub department: Department,
    pub role: Role,
    pub password_hash: String,
    pub active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for User {
    fn id(&self) -> &str {
        &self.id
    }
}

/// User as returned to API clients.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge_number: Option<String>,
    pub department: Department,
    pub role: Role,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            full_name: user.full_name,
            badge_number: user.badge_number,
            department: user.department,
            role: user.role,
            active: user.active,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub full_name: String,
    #[serde(default)]
    pub badge_number: Option<String>,
    pub department: Department,
    pub role: Role,
}

/// Partial update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UserPatch {
    pub full_name: Option<String>,
    pub badge_number: Option<String>,
    pub department: Option<Department>,
    pub role: Option<Role>,
    pub active: Option<bool>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub department: Option<Department>,
    pub active: Option<bool>,
}

fn username_key(username: &str) -> String {
    username.trim().to_lowercase()
}

fn validate_username(username: &str) -> Result<(), String> {
    let name = username.trim();
    if name.len() < 3 || name.len() > 64 {
        return Err("username must be 3-64 characters".to_string());
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err("username may only contain letters, digits, '.', '_' and '-'".to_string());
    }
    Ok(())
}

impl NewUser {
    fn validate(&self) -> Result<(), String> {
        validate_username(&self.username)?;
        check_password_strength(&self.password)?;
        require_text("full_name", &self.full_name, 200)?;
        limit_text("badge_number", self.badge_number.as_deref(), 50)
    }
}

impl UserPatch {
    fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.full_name {
            require_text("full_name", name, 200)?;
        }
        limit_text("badge_number", self.badge_number.as_deref(), 50)?;
        if let Some(password) = &self.password {
            check_password_strength(password)?;
        }
        Ok(())
    }
}

pub struct UserRepository<'a> {
    db: &'a Database,
}

impl<'a> UserRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn get(&self, id: &str) -> StorageResult<User> {
        self.db
            .fetch(USERS, id)?
            .ok_or_else(|| StorageError::NotFound(format!("user {id}")))
    }

    /// Case-insensitive lookup.
    pub fn find_by_username(&self, username: &str) -> StorageResult<Option<User>> {
        let key = username_key(username);
        let id = self.db.read(|txn| {
            let index = txn.open_table(USERNAMES)?;
            lookup_unique(&index, &key)
        })?;
        match id {
            Some(id) => self.db.fetch(USERS, &id),
            None => Ok(None),
        }
    }

    /// Sorted by username.
    pub fn list(&self, filter: &UserFilter, pagination: Pagination) -> StorageResult<Page<User>> {
        let mut rows: Vec<User> = self.db.fetch_all(USERS)?;
        rows.retain(|u| {
            filter.role.is_none_or(|r| u.role == r)
                && filter.department.is_none_or(|d| u.department == d)
                && filter.active.is_none_or(|a| u.active == a)
        });
        rows.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(Page::from_vec(rows, pagination))
    }

    pub fn count(&self) -> StorageResult<usize> {
        Ok(self.db.fetch_all::<User>(USERS)?.len())
    }

    pub fn create(&self, new: NewUser) -> StorageResult<User> {
        new.validate().map_err(StorageError::Validation)?;
        let password_hash =
            hash_password(&new.password).map_err(|e| StorageError::Internal(e.to_string()))?;
        let now = Utc::now();
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            username: new.username.trim().to_string(),
            full_name: new.full_name.trim().to_string(),
            badge_number: new.badge_number,
            department: new.department,
            role: new.role,
            password_hash,
            active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };

        self.db.write(|txn| {
            claim_unique(txn, USERNAMES, &username_key(&user.username), &user.id, "username")?;
            put_json(txn, USERS, &user)?;
            Ok(())
        })?;
        Ok(user)
    }

    pub fn update(&self, id: &str, patch: UserPatch) -> StorageResult<User> {
        patch.validate().map_err(StorageError::Validation)?;
        let password_hash = match &patch.password {
            Some(password) => {
                Some(hash_password(password).map_err(|e| StorageError::Internal(e.to_string()))?)
            }
            None => None,
        };

        self.db.write(|txn| {
            let mut user: User = require_json(txn, USERS, id, "user")?;
            if let Some(full_name) = patch.full_name {
                user.full_name = full_name.trim().to_string();
            }
            if let Some(badge) = patch.badge_number {
                user.badge_number = Some(badge);
            }
            if let Some(department) = patch.department {
                user.department = department;
            }
            if let Some(role) = patch.role {
                user.role = role;
            }
            if let Some(active) = patch.active {
                user.active = active;
            }
            if let Some(hash) = password_hash {
                user.password_hash = hash;
            }
            user.updated_at = Utc::now();
            put_json(txn, USERS, &user)?;
            Ok(user)
        })
    }

    pub fn record_login(&self, id: &str, at: DateTime<Utc>) -> StorageResult<()> {
        self.db.write(|txn| {
            let mut user: User = require_json(txn, USERS, id, "user")?;
            user.last_login_at = Some(at);
            put_json(txn, USERS, &user)
        })
    }
}
