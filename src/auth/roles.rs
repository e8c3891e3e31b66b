// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Console roles for authorization.

use serde::{Deserialize, Serialize};

/// Role carried in user records and session tokens.
///
/// Only `Admin` may use the console. Any other role string is preserved
/// verbatim as `Other` so that a token or user row with an unknown role
/// still parses and is then refused by the authorization gate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    /// Full console access
    Admin,
    /// Any non-admin role
    Other(String),
}

impl Role {
    /// Only the exact string `admin` is the admin role.
    pub fn parse(s: &str) -> Role {
        match s {
            "admin" => Role::Admin,
            other => Role::Other(other.to_string()),
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "admin",
            Role::Other(name) => name,
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Role::parse(&value)
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
