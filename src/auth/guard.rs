// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session guard: cookie → token → principal → admin gate.
//!
//! Protected handlers take the `AdminSession` extractor instead of reading
//! cookies or tokens themselves:
//!
//! ```rust,ignore
//! async fn list_themes(
//!     AdminSession(admin): AdminSession,
//!     State(state): State<AppState>,
//! ) -> Result<Json<Vec<ThemeRecord>>, ApiError> {
//!     // admin is an active admin Principal
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};

use super::cookies::extract_request_cookie;
use super::token::TokenEngine;
use super::{AuthError, Principal};
use crate::state::AppState;

/// Resolve the session cookie on a request into a verified principal.
pub fn authenticate(headers: &HeaderMap, cookie_name: &str, engine: &TokenEngine) -> Option<Principal> {
    let token = extract_request_cookie(headers, cookie_name)?;
    engine.verify(&token)
}

/// The single authorization gate: an active principal with the admin role.
pub fn require_admin(principal: Option<Principal>) -> Result<Principal, AuthError> {
    match principal {
        Some(principal) if principal.is_active_admin() => Ok(principal),
        Some(principal) => {
            tracing::debug!(subject_id = %principal.subject_id, "session lacks admin role or is inactive");
            Err(AuthError::Unauthorized)
        }
        None => Err(AuthError::Unauthorized),
    }
}

/// Extractor that requires an active admin session.
pub struct AdminSession(pub Principal);

impl FromRequestParts<AppState> for AdminSession {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let principal = authenticate(&parts.headers, state.cookies.name(), &state.tokens);
        require_admin(principal).map(AdminSession)
    }
}

/// Optional session extractor.
///
/// Returns `None` instead of rejecting when there is no admin session.
pub struct OptionalAdminSession(pub Option<Principal>);

impl FromRequestParts<AppState> for OptionalAdminSession {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match AdminSession::from_request_parts(parts, state).await {
            Ok(AdminSession(principal)) => Ok(OptionalAdminSession(Some(principal))),
            Err(_) => Ok(OptionalAdminSession(None)),
        }
    }
}
