// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Login, logout and session inspection.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use super::{json_object, request_host, string_field};
use crate::{
    audit_log,
    auth::{
        cookies::{append_set_cookies, extract_request_cookie},
        AdminSession, AuthError, OptionalAdminSession, SessionClaims,
    },
    error::{ApiError, ErrorBody},
    models::ValidationError,
    state::AppState,
    storage::{normalize_email, AuditAction},
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// Email of an active admin account
    pub email: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub subject_id: String,
    pub email: Option<String>,
    pub role: String,
    pub is_active: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PingResponse {
    pub ok: bool,
    /// Whether the session cookie was sent at all
    pub has_cookie: bool,
    /// Whether it carries a valid admin session
    pub authenticated: bool,
}

fn with_cookies(body: impl IntoResponse, directives: &[String]) -> Result<Response, ApiError> {
    let mut response = body.into_response();
    append_set_cookies(response.headers_mut(), directives).map_err(|e| ApiError::internal(&e))?;
    Ok(response)
}

/// Start an admin session.
///
/// On success the session cookie is set under every domain variant of the
/// requested host. Unknown, non-admin and disabled accounts all get the same
/// 401 and no cookie.
#[utoipa::path(
    post,
    path = "/api/admin/login",
    tag = "Session",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session cookie set", body = OkResponse),
        (status = 400, description = "Email missing", body = ErrorBody),
        (status = 401, description = "Not an active admin", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    body: Bytes,
) -> Result<Response, ApiError> {
    let body = json_object(&body);
    let email = normalize_email(&string_field(&body, "email"));
    if email.is_empty() {
        return Err(ValidationError::MissingField("Email").into());
    }

    let user = match state.db.users().find_by_email(&email)? {
        Some(user) if user.role.is_admin() && user.is_active == 1 => user,
        _ => {
            tracing::info!("login refused");
            return Err(AuthError::Unauthorized.into());
        }
    };

    let claims = SessionClaims {
        subject_id: user.id.clone(),
        email: Some(user.email.clone()),
        role: user.role.clone(),
        is_active: user.is_active,
        session_id: Some(uuid::Uuid::new_v4().to_string()),
    };
    let token = state
        .tokens
        .sign(&claims, state.cookies.ttl_seconds())
        .map_err(|e| ApiError::internal(&e))?;

    let host = request_host(&headers, &uri);
    let directives = state.cookies.session_cookies(&token, &host);

    audit_log!(
        state.db,
        AuditAction::Login,
        claims,
        user.email.clone(),
        json!({ "session_id": claims.session_id })
    );
    tracing::info!(user_id = %user.id, %host, variants = directives.len(), "admin logged in");

    with_cookies(Json(OkResponse { ok: true }), &directives)
}

/// End the session on this browser.
///
/// Always succeeds; expiry cookies are sent for every domain variant.
#[utoipa::path(
    post,
    path = "/api/admin/logout",
    tag = "Session",
    responses(
        (status = 200, description = "Session cookies cleared", body = OkResponse)
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Response, ApiError> {
    let host = request_host(&headers, &uri);
    with_cookies(Json(OkResponse { ok: true }), &state.cookies.expiry_cookies(&host))
}

/// Identity of the current admin session.
#[utoipa::path(
    get,
    path = "/api/admin/me",
    tag = "Session",
    security(("session_cookie" = [])),
    responses(
        (status = 200, description = "Current admin", body = MeResponse),
        (status = 401, description = "Unauthorized", body = ErrorBody)
    )
)]
pub async fn me(AdminSession(admin): AdminSession) -> Json<MeResponse> {
    Json(MeResponse {
        subject_id: admin.subject_id,
        email: admin.email,
        role: admin.role.to_string(),
        is_active: admin.is_active,
    })
}

/// Connectivity check that also reports whether a session cookie arrived.
#[utoipa::path(
    get,
    path = "/api/admin/ping",
    tag = "Session",
    responses(
        (status = 200, description = "Service reachable", body = PingResponse)
    )
)]
pub async fn ping(
    State(state): State<AppState>,
    OptionalAdminSession(session): OptionalAdminSession,
    headers: HeaderMap,
) -> Json<PingResponse> {
    Json(PingResponse {
        ok: true,
        has_cookie: extract_request_cookie(&headers, state.cookies.name()).is_some(),
        authenticated: session.is_some(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::router;
    use crate::api::test_support::{admin_cookie, json_body, send};
    use crate::auth::Role;
    use crate::state::test_state;
    use crate::storage::{ActorKind, AuditQuery, UserRecord};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };

    fn login_request(host: &str, body: &str) -> Request<Body> {
        Request::post("/api/admin/login")
            .header(header::HOST, host)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn set_cookies(response: &Response) -> Vec<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn login_sets_three_cookies_for_subdomain_host() {
        let (state, _dir) = test_state();
        state.db.users().ensure_admin("ops@example.com").unwrap();
        let app = router(state.clone());

        let response = send(&app, login_request("admin.example.com", r#"{"email":" OPS@Example.com "}"#)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let cookies = set_cookies(&response);
        assert_eq!(cookies.len(), 3);
        assert!(cookies[0].starts_with("sida="));
        assert!(!cookies[0].contains("Domain="));
        assert!(cookies[1].contains("Domain=.admin.example.com"));
        assert!(cookies[2].contains("Domain=.example.com"));
        for cookie in &cookies {
            assert!(cookie.contains("HttpOnly; Secure; SameSite=Strict; Max-Age=3600"));
        }
        assert_eq!(json_body(response).await, json!({"ok": true}));

        let page = state
            .db
            .audit()
            .query(&AuditQuery {
                actor_kind: ActorKind::Admin,
                limit: 10,
                ..AuditQuery::default()
            })
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].action, "auth.login");
    }

    #[tokio::test]
    async fn login_cookie_authenticates_me() {
        let (state, _dir) = test_state();
        state.db.users().ensure_admin("ops@example.com").unwrap();
        let app = router(state);

        let response = send(&app, login_request("localhost", r#"{"email":"ops@example.com"}"#)).await;
        let cookies = set_cookies(&response);
        assert_eq!(cookies.len(), 2);
        let pair = cookies[0].split(';').next().unwrap().to_string();

        let me = send(
            &app,
            Request::get("/api/admin/me")
                .header(header::COOKIE, pair)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(me.status(), StatusCode::OK);
        let body = json_body(me).await;
        assert_eq!(body["email"], "ops@example.com");
        assert_eq!(body["role"], "admin");
        assert_eq!(body["is_active"], 1);
    }

    #[tokio::test]
    async fn login_requires_email() {
        let (state, _dir) = test_state();
        let app = router(state);
        for body in ["{}", r#"{"email":"   "}"#, "not json"] {
            let response = send(&app, login_request("localhost", body)).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
        }
    }

    #[tokio::test]
    async fn login_refuses_unknown_inactive_and_non_admin() {
        let (state, _dir) = test_state();
        let mut inactive = UserRecord::new("off@example.com", Role::Admin);
        inactive.is_active = 0;
        state.db.users().upsert(&inactive).unwrap();
        state.db.users().upsert(&UserRecord::new("driver@example.com", Role::parse("user"))).unwrap();
        let app = router(state);

        for email in ["nobody@example.com", "off@example.com", "driver@example.com"] {
            let response = send(&app, login_request("localhost", &format!(r#"{{"email":"{email}"}}"#))).await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{email}");
            assert!(set_cookies(&response).is_empty());
            let body = json_body(response).await;
            assert_eq!(body["error_code"], "unauthorized");
        }
    }

    #[tokio::test]
    async fn logout_always_clears_cookies() {
        let (state, _dir) = test_state();
        let app = router(state);
        let response = send(
            &app,
            Request::post("/api/admin/logout")
                .header(header::HOST, "admin.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(header::CONTENT_SECURITY_POLICY));
        let cookies = set_cookies(&response);
        assert_eq!(cookies.len(), 3);
        for cookie in &cookies {
            assert!(cookie.starts_with("sida=;"));
            assert!(cookie.contains("Max-Age=0"));
            assert!(cookie.contains("Expires=Thu, 01 Jan 1970 00:00:00 GMT"));
        }
    }

    #[tokio::test]
    async fn me_requires_session() {
        let (state, _dir) = test_state();
        let app = router(state);
        let response = send(&app, Request::get("/api/admin/me").body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            json_body(response).await,
            json!({"error": "Unauthorized", "error_code": "unauthorized"})
        );
    }

    #[tokio::test]
    async fn ping_reports_cookie_presence() {
        let (state, _dir) = test_state();
        let (_, cookie) = admin_cookie(&state);
        let app = router(state);

        let bare = json_body(send(&app, Request::get("/api/admin/ping").body(Body::empty()).unwrap()).await).await;
        assert_eq!(bare, json!({"ok": true, "has_cookie": false, "authenticated": false}));

        let with_cookie = json_body(
            send(
                &app,
                Request::get("/api/admin/ping")
                    .header(header::COOKIE, cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await,
        )
        .await;
        assert_eq!(with_cookie, json!({"ok": true, "has_cookie": true, "authenticated": true}));
    }
}
