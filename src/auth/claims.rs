// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session claims and the authenticated principal.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::roles::Role;

/// Claims issued at login.
///
/// The token engine adds `issued_at` and `expires_at` when signing; any
/// same-named keys supplied here are overwritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Opaque user identifier
    pub subject_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: Role,
    /// 1 when the account is enabled
    pub is_active: i64,
    /// Random per-login identifier, used to correlate audit entries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Authenticated subject reconstructed from a verified session token.
///
/// A principal is never mutated. Logging in again issues a new token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub subject_id: String,
    #[serde(default)]
    pub email: Option<String>,
    pub role: Role,
    pub is_active: i64,
    #[serde(default)]
    pub session_id: Option<String>,
    /// Unix seconds
    #[serde(default)]
    pub issued_at: Option<i64>,
    /// Unix seconds
    #[serde(default)]
    pub expires_at: Option<i64>,
    /// Any additional claims carried by the token.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Principal {
    /// Role and account-status predicate shared by every protected endpoint.
    pub fn is_active_admin(&self) -> bool {
        self.role.is_admin() && self.is_active == 1
    }

    /// True once `now` is past `expires_at`. Tokens without an expiry never expire.
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|exp| now > exp)
    }
}
