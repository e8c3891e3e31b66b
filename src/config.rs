// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names, default values and the
//! typed [`Config`] loaded once at startup. A missing secret or malformed
//! TTL is fatal at load time, never per request.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `COOKIE_NAME` | Session cookie name | `sida` |
//! | `SESSION_SECRET` | HMAC key for session tokens (`JWT_SECRET` accepted) | Required |
//! | `SESSION_TTL_SECONDS` | Token lifetime and cookie `Max-Age` | `1209600` (14 days) |
//! | `COOKIE_DOMAIN` | Fixed cookie domain instead of derived variants | Unset |
//! | `DATABASE_PATH` | redb database file | `./data/admin-console.redb` |
//! | `LOGO_BASE_URL` | Object-storage base URL for tenant logos | Unset |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files; serve HTTPS when both set | Unset |
//! | `SEED_ADMIN_EMAIL` | Create an active admin with this email at startup | Unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;

use url::Url;

pub const COOKIE_NAME_ENV: &str = "COOKIE_NAME";
pub const DEFAULT_COOKIE_NAME: &str = "sida";

pub const SESSION_SECRET_ENV: &str = "SESSION_SECRET";
/// Older deployments name the secret `JWT_SECRET`.
pub const LEGACY_SECRET_ENV: &str = "JWT_SECRET";

pub const SESSION_TTL_ENV: &str = "SESSION_TTL_SECONDS";
pub const DEFAULT_SESSION_TTL_SECONDS: i64 = 14 * 24 * 60 * 60;

pub const COOKIE_DOMAIN_ENV: &str = "COOKIE_DOMAIN";

pub const DATABASE_PATH_ENV: &str = "DATABASE_PATH";
pub const DEFAULT_DATABASE_PATH: &str = "./data/admin-console.redb";

pub const LOGO_BASE_URL_ENV: &str = "LOGO_BASE_URL";

pub const HOST_ENV: &str = "HOST";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const PORT_ENV: &str = "PORT";
pub const DEFAULT_PORT: u16 = 8080;

pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";

pub const SEED_ADMIN_EMAIL_ENV: &str = "SEED_ADMIN_EMAIL";

pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// Configuration that cannot be used to start the service.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("session secret is not configured (set {SESSION_SECRET_ENV})")]
    MissingSecret,

    #[error("invalid {SESSION_TTL_ENV} {0:?}: expected a positive number of seconds")]
    InvalidTtl(String),

    #[error("invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

/// Certificate and key for HTTPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Runtime configuration.
#[derive(Clone)]
pub struct Config {
    pub cookie_name: String,
    pub session_secret: String,
    pub session_ttl_seconds: i64,
    pub cookie_domain: Option<String>,
    pub database_path: PathBuf,
    pub logo_base_url: Option<Url>,
    pub host: String,
    pub port: u16,
    pub tls: Option<TlsPaths>,
    pub seed_admin_email: Option<String>,
    pub log_format: LogFormat,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("cookie_name", &self.cookie_name)
            .field("session_secret", &"<redacted>")
            .field("session_ttl_seconds", &self.session_ttl_seconds)
            .field("cookie_domain", &self.cookie_domain)
            .field("database_path", &self.database_path)
            .field("logo_base_url", &self.logo_base_url)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("seed_admin_email", &self.seed_admin_email)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let session_secret = get(SESSION_SECRET_ENV)
            .or_else(|| get(LEGACY_SECRET_ENV))
            .ok_or(ConfigError::MissingSecret)?;

        let session_ttl_seconds = match get(SESSION_TTL_ENV) {
            Some(raw) => match raw.parse::<i64>() {
                Ok(ttl) if ttl > 0 => ttl,
                _ => return Err(ConfigError::InvalidTtl(raw)),
            },
            None => DEFAULT_SESSION_TTL_SECONDS,
        };

        let logo_base_url = get(LOGO_BASE_URL_ENV)
            .map(|raw| {
                Url::parse(&raw).map_err(|_| ConfigError::InvalidValue {
                    name: LOGO_BASE_URL_ENV,
                    value: raw,
                })
            })
            .transpose()?;

        let port = match get(PORT_ENV) {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                name: PORT_ENV,
                value: raw,
            })?,
            None => DEFAULT_PORT,
        };

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            (Some(cert), None) => {
                return Err(ConfigError::InvalidValue {
                    name: TLS_KEY_PATH_ENV,
                    value: format!("missing while {TLS_CERT_PATH_ENV}={cert}"),
                })
            }
            (None, Some(key)) => {
                return Err(ConfigError::InvalidValue {
                    name: TLS_CERT_PATH_ENV,
                    value: format!("missing while {TLS_KEY_PATH_ENV}={key}"),
                })
            }
        };

        let log_format = match get(LOG_FORMAT_ENV).as_deref() {
            Some(format) if format.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            cookie_name: get(COOKIE_NAME_ENV).unwrap_or_else(|| DEFAULT_COOKIE_NAME.to_string()),
            session_secret,
            session_ttl_seconds,
            cookie_domain: get(COOKIE_DOMAIN_ENV),
            database_path: get(DATABASE_PATH_ENV)
                .unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string())
                .into(),
            logo_base_url,
            host: get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            tls,
            seed_admin_email: get(SEED_ADMIN_EMAIL_ENV),
            log_format,
        })
    }

    /// Socket address to bind.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse().map_err(|_| ConfigError::InvalidValue {
            name: HOST_ENV,
            value: raw,
        })
    }
}
