// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Notification recipient checks.
//!
//! No mail provider is wired in: a test send validates the recipients,
//! confirms the slug and records the attempt in the audit trail.

use axum::{body::Bytes, extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use super::{json_object, string_field};
use crate::{
    audit_log,
    auth::AdminSession,
    error::{ApiError, ErrorBody},
    models::{Recipients, ValidationError},
    state::AppState,
    storage::AuditAction,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct TestSendRequest {
    pub slug: String,
    pub email_recipients: Recipients,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RecipientCounts {
    pub to: usize,
    pub cc: usize,
    pub bcc: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TestSendResponse {
    pub ok: bool,
    pub slug: String,
    pub counts: RecipientCounts,
    pub note: String,
}

/// Validate recipients for a slug and record a test send.
#[utoipa::path(
    post,
    path = "/api/admin/test-send",
    tag = "Notifications",
    security(("session_cookie" = [])),
    request_body = TestSendRequest,
    responses(
        (status = 200, description = "Test send recorded", body = TestSendResponse),
        (status = 400, description = "Missing slug or invalid recipients", body = ErrorBody),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 404, description = "Unknown slug", body = ErrorBody)
    )
)]
pub async fn test_send(
    AdminSession(admin): AdminSession,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<TestSendResponse>, ApiError> {
    let body = json_object(&body);
    let slug = string_field(&body, "slug");
    if slug.is_empty() {
        return Err(ValidationError::MissingField("slug").into());
    }

    let recipients = Recipients::from_value(body.get("email_recipients"));
    recipients.validate(true)?;

    if !state.db.themes().exists(&slug)? {
        return Err(ApiError::not_found("Unknown slug"));
    }

    audit_log!(
        state.db,
        AuditAction::TestSend,
        admin,
        slug.clone(),
        json!({ "recipients": recipients })
    );
    tracing::info!(%slug, to = recipients.to.len(), "test send recorded");

    Ok(Json(TestSendResponse {
        ok: true,
        counts: RecipientCounts {
            to: recipients.to.len(),
            cc: recipients.cc.len(),
            bcc: recipients.bcc.len(),
        },
        slug,
        note: "Test send recorded (no email sent).".to_string(),
    }))
}
