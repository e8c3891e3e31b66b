// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    auth::AdminSession,
    error::{ApiError, ErrorBody},
    state::AppState,
    storage::{ActorKind, AuditPage, AuditQuery, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE},
};

/// Query string for the audit listing. Values are parsed leniently so a
/// malformed `limit` or `cursor` falls back to the default.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditParams {
    /// `admin` (default) or `user`
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Case-insensitive search text
    pub q: Option<String>,
    /// Page size, 1 to 100 (default 50)
    pub limit: Option<String>,
    /// Id of the last entry of the previous page
    pub cursor: Option<String>,
}

impl AuditParams {
    fn to_query(&self) -> AuditQuery {
        let limit = self
            .limit
            .as_deref()
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .map_or(DEFAULT_PAGE_SIZE, |n| n.clamp(1, MAX_PAGE_SIZE as i64) as usize);
        let cursor = self
            .cursor
            .as_deref()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|&c| c > 0);

        AuditQuery {
            actor_kind: self.kind.as_deref().map(ActorKind::parse).unwrap_or_default(),
            search: self.q.clone(),
            limit,
            cursor,
        }
    }
}

/// Audit trail, newest first.
#[utoipa::path(
    get,
    path = "/api/admin/audit",
    tag = "Audit",
    security(("session_cookie" = [])),
    params(AuditParams),
    responses(
        (status = 200, description = "One page of entries", body = AuditPage),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn list_audit(
    AdminSession(_admin): AdminSession,
    State(state): State<AppState>,
    Query(params): Query<AuditParams>,
) -> Result<Json<AuditPage>, ApiError> {
    let page = state.db.audit().query(&params.to_query())?;
    Ok(Json(page))
}
