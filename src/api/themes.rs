// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use super::json_object;
use crate::{
    audit_log,
    auth::AdminSession,
    error::{ApiError, ErrorBody},
    models::{PublicTheme, ThemeRecord, ThemeUpdate, ValidationError},
    state::AppState,
    storage::AuditAction,
};

/// Edge caches may serve a public theme for 5 minutes and revalidate for a day.
pub const PUBLIC_THEME_CACHE_CONTROL: &str = "s-maxage=300, stale-while-revalidate=86400";

fn to_payload<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::internal(&e))
}

/// List every theme, slug ascending.
#[utoipa::path(
    get,
    path = "/api/admin/themes",
    tag = "Themes",
    security(("session_cookie" = [])),
    responses(
        (status = 200, description = "All themes", body = Vec<ThemeRecord>),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn list_themes(
    AdminSession(_admin): AdminSession,
    State(state): State<AppState>,
) -> Result<Json<Vec<ThemeRecord>>, ApiError> {
    Ok(Json(state.db.themes().list()?))
}

/// Create or replace a theme.
///
/// The slug is lowercased and must start with a letter or digit; flags are
/// stored as 0 or 1.
#[utoipa::path(
    post,
    path = "/api/admin/themes",
    tag = "Themes",
    security(("session_cookie" = [])),
    request_body = ThemeRecord,
    responses(
        (status = 204, description = "Theme stored"),
        (status = 400, description = "Missing or invalid slug", body = ErrorBody),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn upsert_theme(
    AdminSession(admin): AdminSession,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let record = ThemeRecord::from_upsert_body(&json_object(&body))?;
    let stored = state.db.themes().upsert(&record)?;

    audit_log!(
        state.db,
        AuditAction::ThemeUpsert,
        admin,
        stored.slug.clone(),
        to_payload(&record)?
    );
    tracing::info!(slug = %stored.slug, "theme upserted");

    Ok(StatusCode::NO_CONTENT)
}

/// Fetch one theme.
#[utoipa::path(
    get,
    path = "/api/admin/themes/{slug}",
    tag = "Themes",
    security(("session_cookie" = [])),
    params(("slug" = String, Path, description = "Tenant slug")),
    responses(
        (status = 200, description = "Theme", body = ThemeRecord),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 404, description = "Unknown slug", body = ErrorBody)
    )
)]
pub async fn get_theme(
    AdminSession(_admin): AdminSession,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ThemeRecord>, ApiError> {
    let slug = slug.trim().to_lowercase();
    state
        .db
        .themes()
        .get(&slug)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Not found"))
}

/// Update selected fields of an existing theme.
///
/// Null values are ignored. Legacy field names (`name`, `logo_path`,
/// `primary_color`, `secondary_color`) are accepted.
#[utoipa::path(
    put,
    path = "/api/admin/themes/{slug}",
    tag = "Themes",
    security(("session_cookie" = [])),
    params(("slug" = String, Path, description = "Tenant slug")),
    request_body = ThemeUpdate,
    responses(
        (status = 204, description = "Theme updated"),
        (status = 400, description = "No updatable fields", body = ErrorBody),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 404, description = "Unknown slug", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn update_theme(
    AdminSession(admin): AdminSession,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let slug = slug.trim().to_lowercase();
    if slug.is_empty() {
        return Err(ValidationError::MissingField("Slug").into());
    }

    let update = ThemeUpdate::from_body(&json_object(&body));
    if update.is_empty() {
        return Err(ValidationError::NoUpdatableFields.into());
    }

    if state.db.themes().update(&slug, &update)?.is_none() {
        return Err(ApiError::not_found("Not found"));
    }

    audit_log!(
        state.db,
        AuditAction::ThemeUpdate,
        admin,
        slug.clone(),
        to_payload(&update)?
    );
    tracing::info!(%slug, "theme updated");

    Ok(StatusCode::NO_CONTENT)
}

/// Public branding for a tenant front-end.
#[utoipa::path(
    get,
    path = "/api/themes/{slug}",
    tag = "Themes",
    params(("slug" = String, Path, description = "Tenant slug (case-insensitive)")),
    responses(
        (status = 200, description = "Branding payload", body = PublicTheme),
        (status = 404, description = "Unknown slug", body = ErrorBody)
    )
)]
pub async fn public_theme(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Response, ApiError> {
    let slug = slug.trim().to_lowercase();
    let theme = state
        .db
        .themes()
        .get(&slug)?
        .ok_or_else(|| ApiError::not_found("Not found"))?;

    let mut response = Json(PublicTheme::from(theme)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(PUBLIC_THEME_CACHE_CONTROL),
    );
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::router;
    use crate::api::test_support::{admin_cookie, json_body, send};
    use crate::state::test_state;
    use crate::storage::{ActorKind, AuditQuery};
    use axum::{body::Body, http::Request};
    use serde_json::json;

    fn request(method: &str, uri: &str, cookie: Option<&str>, body: Option<serde_json::Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    #[tokio::test]
    async fn protected_endpoints_reject_without_session() {
        let (state, _dir) = test_state();
        let app = router(state);
        for (method, uri) in [
            ("GET", "/api/admin/themes"),
            ("POST", "/api/admin/themes"),
            ("GET", "/api/admin/themes/acme"),
            ("PUT", "/api/admin/themes/acme"),
            ("GET", "/api/admin/audit"),
            ("POST", "/api/admin/test-send"),
            ("GET", "/api/v1/slugs/acme/settings"),
            ("PATCH", "/api/v1/slugs/acme/settings"),
            ("GET", "/api/v1/slugs/acme/meta"),
        ] {
            let response = send(&app, request(method, uri, None, Some(json!({"slug": "acme"})))).await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
        }
    }

    #[tokio::test]
    async fn upsert_list_get_and_update() {
        let (state, _dir) = test_state();
        let (_, cookie) = admin_cookie(&state);
        let app = router(state.clone());

        let created = send(
            &app,
            request(
                "POST",
                "/api/admin/themes",
                Some(&cookie),
                Some(json!({"slug": " Acme ", "brand_name": "Acme", "gps_check": true})),
            ),
        )
        .await;
        assert_eq!(created.status(), StatusCode::NO_CONTENT);

        let list = json_body(send(&app, request("GET", "/api/admin/themes", Some(&cookie), None)).await).await;
        assert_eq!(list.as_array().unwrap().len(), 1);
        assert_eq!(list[0]["slug"], "acme");
        assert_eq!(list[0]["gps_check"], 1);
        assert_eq!(list[0]["multi_file"], 0);

        let updated = send(
            &app,
            request(
                "PUT",
                "/api/admin/themes/acme",
                Some(&cookie),
                Some(json!({"primary_color": "#101010", "brand_name": null})),
            ),
        )
        .await;
        assert_eq!(updated.status(), StatusCode::NO_CONTENT);

        let theme = json_body(send(&app, request("GET", "/api/admin/themes/acme", Some(&cookie), None)).await).await;
        assert_eq!(theme["color_primary"], "#101010");
        assert_eq!(theme["brand_name"], "Acme");

        let upper = send(&app, request("GET", "/api/admin/themes/ACME", Some(&cookie), None)).await;
        assert_eq!(upper.status(), StatusCode::OK);
        assert_eq!(json_body(upper).await["slug"], "acme");

        let audit = state
            .db
            .audit()
            .query(&AuditQuery {
                actor_kind: ActorKind::Admin,
                limit: 10,
                ..AuditQuery::default()
            })
            .unwrap();
        let actions: Vec<_> = audit.items.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["theme.update", "theme.upsert"]);
    }

    #[tokio::test]
    async fn upsert_rejects_bad_slug() {
        let (state, _dir) = test_state();
        let (_, cookie) = admin_cookie(&state);
        let app = router(state);

        let response = send(&app, request("POST", "/api/admin/themes", Some(&cookie), Some(json!({"slug": "-bad"})))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error_code"], "invalid_slug");

        let response = send(&app, request("POST", "/api/admin/themes", Some(&cookie), Some(json!({})))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn update_errors() {
        let (state, _dir) = test_state();
        let (_, cookie) = admin_cookie(&state);
        let app = router(state);

        let missing = send(
            &app,
            request("PUT", "/api/admin/themes/ghost", Some(&cookie), Some(json!({"status": "live"}))),
        )
        .await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let empty = send(
            &app,
            request("PUT", "/api/admin/themes/ghost", Some(&cookie), Some(json!({"slug": "x"}))),
        )
        .await;
        assert_eq!(empty.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(empty).await["error_code"], "no_updatable_fields");

        let unknown = send(&app, request("GET", "/api/admin/themes/ghost", Some(&cookie), None)).await;
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn public_theme_is_cacheable_and_unauthenticated() {
        let (state, _dir) = test_state();
        state
            .db
            .themes()
            .upsert(&ThemeRecord {
                slug: "acme".into(),
                brand_name: Some("Acme".into()),
                color_primary: Some("#ff0000".into()),
                multi_file: Some(1),
                ..ThemeRecord::default()
            })
            .unwrap();
        let app = router(state);

        let response = send(&app, request("GET", "/api/themes/ACME", None, None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            PUBLIC_THEME_CACHE_CONTROL
        );
        let body = json_body(response).await;
        assert_eq!(body["brandName"], "Acme");
        assert_eq!(body["colors"]["primary"], "#ff0000");
        assert_eq!(body["flags"]["multi_file"], true);

        let missing = send(&app, request("GET", "/api/themes/ghost", None, None)).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }
}
