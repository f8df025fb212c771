// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Directory holding `portal.redb` | `./data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `JWT_SECRET` | HS256 signing secret (unset = development auth) | unset |
//! | `JWT_ISSUER` | Issuer claim written and validated | `cryptocase-portal` |
//! | `TOKEN_TTL_SECS` | Lifetime of issued tokens | `28800` |
//! | `LEDGER_CONFIRMATION_DELAY_SECS` | Delay before an audit row is confirmed | `3` |
//! | `LEDGER_POLL_INTERVAL_MS` | Confirmation worker sweep interval | `500` |
//! | `NODE_HEARTBEAT_INTERVAL_SECS` | Node heartbeat interval | `10` |
//! | `SEED_ADMIN_USERNAME` / `SEED_ADMIN_PASSWORD` | Bootstrap admin account | unset |
//! | `STATIC_DIR` | SPA build served for non-API paths | unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";
pub const JWT_ISSUER_ENV: &str = "JWT_ISSUER";
pub const TOKEN_TTL_ENV: &str = "TOKEN_TTL_SECS";
pub const CONFIRMATION_DELAY_ENV: &str = "LEDGER_CONFIRMATION_DELAY_SECS";
pub const POLL_INTERVAL_ENV: &str = "LEDGER_POLL_INTERVAL_MS";
pub const HEARTBEAT_INTERVAL_ENV: &str = "NODE_HEARTBEAT_INTERVAL_SECS";
pub const SEED_ADMIN_USERNAME_ENV: &str = "SEED_ADMIN_USERNAME";
pub const SEED_ADMIN_PASSWORD_ENV: &str = "SEED_ADMIN_PASSWORD";
pub const STATIC_DIR_ENV: &str = "STATIC_DIR";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Database file name inside `DATA_DIR`.
pub const DATABASE_FILE: &str = "portal.redb";

pub const DEFAULT_ISSUER: &str = "cryptocase-portal";
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 8 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    /// Read `LOG_FORMAT` alone, so tracing can start before the rest of
    /// the configuration is parsed.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup(LOG_FORMAT_ENV) {
            Some(value) if value.trim().eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Bootstrap administrator created at startup if absent.
#[derive(Clone)]
pub struct SeedAdmin {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for SeedAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeedAdmin")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone)]
pub struct ServerConfig {
    pub data_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub jwt_secret: Option<String>,
    pub jwt_issuer: String,
    pub token_ttl: Duration,
    pub confirmation_delay: Duration,
    pub poll_interval: Duration,
    pub heartbeat_interval: Duration,
    pub seed_admin: Option<SeedAdmin>,
    pub static_dir: Option<PathBuf>,
    pub log_format: LogFormat,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("data_dir", &self.data_dir)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("jwt_issuer", &self.jwt_issuer)
            .field("token_ttl", &self.token_ttl)
            .field("confirmation_delay", &self.confirmation_delay)
            .field("poll_interval", &self.poll_interval)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("seed_admin", &self.seed_admin)
            .field("static_dir", &self.static_dir)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: None,
            jwt_issuer: DEFAULT_ISSUER.to_string(),
            token_ttl: Duration::from_secs(DEFAULT_TOKEN_TTL_SECS),
            confirmation_delay: Duration::from_secs(3),
            poll_interval: Duration::from_millis(500),
            heartbeat_interval: Duration::from_secs(10),
            seed_admin: None,
            static_dir: None,
            log_format: LogFormat::Pretty,
        }
    }
}

impl ServerConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let text = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let seed_admin = match (text(SEED_ADMIN_USERNAME_ENV), lookup(SEED_ADMIN_PASSWORD_ENV)) {
            (Some(username), Some(password)) if !password.is_empty() => Some(SeedAdmin { username, password }),
            (Some(_), _) => {
                tracing::warn!("{SEED_ADMIN_USERNAME_ENV} set without {SEED_ADMIN_PASSWORD_ENV}; no admin seeded");
                None
            }
            _ => None,
        };

        Self {
            data_dir: text(DATA_DIR_ENV).map(PathBuf::from).unwrap_or(defaults.data_dir),
            host: text(HOST_ENV).unwrap_or(defaults.host),
            port: parse_or(&lookup, PORT_ENV, defaults.port),
            jwt_secret: lookup(JWT_SECRET_ENV).filter(|s| !s.is_empty()),
            jwt_issuer: text(JWT_ISSUER_ENV).unwrap_or(defaults.jwt_issuer),
            token_ttl: Duration::from_secs(parse_or(&lookup, TOKEN_TTL_ENV, DEFAULT_TOKEN_TTL_SECS)),
            confirmation_delay: Duration::from_secs(parse_or(&lookup, CONFIRMATION_DELAY_ENV, 3)),
            poll_interval: Duration::from_millis(positive_or(&lookup, POLL_INTERVAL_ENV, 500)),
            heartbeat_interval: Duration::from_secs(positive_or(&lookup, HEARTBEAT_INTERVAL_ENV, 10)),
            seed_admin,
            static_dir: text(STATIC_DIR_ENV).map(PathBuf::from),
            log_format: LogFormat::from_lookup(&lookup),
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parse a numeric variable, falling back to `default` with a warning.
fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(variable = key, value = %raw, default = %default, "Invalid value, using default");
                default
            }
        },
    }
}

/// Like [`parse_or`], but zero is also rejected. Used for loop intervals.
fn positive_or<F>(lookup: &F, key: &str, default: u64) -> u64
where
    F: Fn(&str) -> Option<String>,
{
    match parse_or(lookup, key, default) {
        0 => {
            tracing::warn!(variable = key, default, "Interval must be positive, using default");
            default
        }
        value => value,
    }
}
