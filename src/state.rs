// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use url::Url;

use crate::auth::{CookiePolicy, TokenEngine};
use crate::config::{Config, ConfigError};
use crate::rate_limit::{InMemoryRateLimiter, RateLimiter};
use crate::storage::AdminDatabase;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<AdminDatabase>,
    pub tokens: TokenEngine,
    pub cookies: Arc<CookiePolicy>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    /// Base for deterministic tenant logo URLs
    pub logo_base_url: Option<Url>,
}

impl AppState {
    pub fn new(db: AdminDatabase, tokens: TokenEngine, cookies: CookiePolicy) -> Self {
        Self {
            db: Arc::new(db),
            tokens,
            cookies: Arc::new(cookies),
            rate_limiter: Arc::new(InMemoryRateLimiter::default()),
            logo_base_url: None,
        }
    }

    /// Wire state from configuration and an opened database.
    pub fn from_config(config: &Config, db: AdminDatabase) -> Result<Self, ConfigError> {
        let tokens = TokenEngine::new(config.session_secret.as_bytes())?;
        let mut cookies = CookiePolicy::new(&config.cookie_name, config.session_ttl_seconds);
        if let Some(domain) = &config.cookie_domain {
            cookies = cookies.with_fixed_domain(domain);
        }

        let mut state = Self::new(db, tokens, cookies);
        if let Some(base) = &config.logo_base_url {
            state = state.with_logo_base_url(base.clone());
        }
        Ok(state)
    }

    pub fn with_rate_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.rate_limiter = limiter;
        self
    }

    pub fn with_logo_base_url(mut self, base: Url) -> Self {
        self.logo_base_url = Some(base);
        self
    }
}

#[cfg(test)]
pub(crate) const TEST_NOW: i64 = 1_700_000_000;

/// State over a throwaway database with a fixed clock at `TEST_NOW`.
#[cfg(test)]
pub(crate) fn test_state() -> (AppState, tempfile::TempDir) {
    use crate::auth::FixedClock;

    let dir = tempfile::TempDir::new().unwrap();
    let db = AdminDatabase::open(&dir.path().join("admin.redb")).unwrap();
    let tokens = TokenEngine::new("test-session-secret")
        .unwrap()
        .with_clock(Arc::new(FixedClock::new(TEST_NOW)));
    let cookies = CookiePolicy::new("sida", 3600);
    (AppState::new(db, tokens, cookies), dir)
}
