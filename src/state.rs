// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::config::{ServerConfig, DEFAULT_ISSUER, DEFAULT_TOKEN_TTL_SECS};
use crate::events::{EventBus, DEFAULT_CHANNEL_CAPACITY};
use crate::storage::Database;

/// Token settings.
///
/// With no `secret` the server runs in development mode: tokens are signed
/// with a fixed key and their signatures are not checked.
#[derive(Clone)]
pub struct AuthConfig {
    pub secret: Option<String>,
    pub issuer: String,
    pub token_ttl: Duration,
}

impl AuthConfig {
    pub fn development() -> Self {
        Self {
            secret: None,
            issuer: DEFAULT_ISSUER.to_string(),
            token_ttl: Duration::from_secs(DEFAULT_TOKEN_TTL_SECS),
        }
    }

    pub fn is_production(&self) -> bool {
        self.secret.is_some()
    }
}

impl From<&ServerConfig> for AuthConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            secret: config.jwt_secret.clone(),
            issuer: config.jwt_issuer.clone(),
            token_ttl: config.token_ttl,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub auth_config: AuthConfig,
    pub events: EventBus,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: Arc<Database>, auth_config: AuthConfig) -> Self {
        Self {
            db,
            auth_config,
            events: EventBus::new(DEFAULT_CHANNEL_CAPACITY),
            started_at: Utc::now(),
        }
    }

    /// Throwaway state for tests.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        let db = Database::in_memory().expect("in-memory database");
        Self::new(Arc::new(db), AuthConfig::development())
    }
}
