// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-slug notification recipients and branding.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;
use utoipa::{IntoParams, ToSchema};

use super::{client_ip, json_object};
use crate::{
    audit_log,
    auth::AdminSession,
    error::{ApiError, ErrorBody},
    models::{Branding, Recipients, SlugSettings, ThemeRecord, ValidationError},
    state::AppState,
    storage::AuditAction,
};

/// Body of a settings patch. Sections that are absent stay untouched.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SettingsPatch {
    pub email_recipients: Option<Recipients>,
    pub branding: Option<Branding>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UpdatedResponse {
    pub updated: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MetaResponse {
    pub theme: ThemeRecord,
    /// Null until settings are first read or written
    pub settings: Option<SlugSettings>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SettingsParams {
    /// `1` recomputes the logo URL even when one is stored
    #[serde(rename = "refreshLogo")]
    pub refresh_logo: Option<String>,
}

fn slug_param(slug: &str) -> Result<String, ApiError> {
    let slug = slug.trim();
    if slug.is_empty() {
        return Err(ValidationError::MissingField("slug").into());
    }
    Ok(slug.to_string())
}

/// `{base}/logos/{slug}.svg`, or None when the base cannot carry a path.
fn logo_url_for(base: &Url, slug: &str) -> Option<String> {
    let mut url = base.clone();
    url.path_segments_mut()
        .ok()?
        .pop_if_empty()
        .extend(["logos", format!("{slug}.svg").as_str()]);
    Some(url.to_string())
}

/// Recipients for a new settings row: the theme's legacy contact address, if any.
fn seed_recipients(state: &AppState, slug: &str) -> Result<Recipients, ApiError> {
    let legacy = state
        .db
        .themes()
        .get(slug)?
        .and_then(|theme| theme.email)
        .map(|email| email.trim().to_string())
        .filter(|email| !email.is_empty());
    Ok(Recipients {
        to: legacy.into_iter().collect(),
        ..Recipients::default()
    })
}

/// Settings for a slug, created on first read.
///
/// A new row takes its `to` list from the theme's legacy `email` column.
#[utoipa::path(
    get,
    path = "/api/v1/slugs/{slug}/settings",
    tag = "Settings",
    security(("session_cookie" = [])),
    params(("slug" = String, Path, description = "Tenant slug"), SettingsParams),
    responses(
        (status = 200, description = "Current settings", body = SlugSettings),
        (status = 400, description = "Empty slug", body = ErrorBody),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn get_settings(
    AdminSession(_admin): AdminSession,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(params): Query<SettingsParams>,
) -> Result<Json<SlugSettings>, ApiError> {
    let slug = slug_param(&slug)?;
    let mut settings = match state.db.settings().get(&slug)? {
        Some(settings) => settings,
        None => {
            let seed = seed_recipients(&state, &slug)?;
            state.db.settings().get_or_init(&slug, seed)?
        }
    };

    let refresh = params.refresh_logo.as_deref() == Some("1");
    let missing = settings
        .branding
        .logo_url
        .as_deref()
        .is_none_or(str::is_empty);
    if refresh || missing {
        if let Some(logo_url) = state
            .logo_base_url
            .as_ref()
            .and_then(|base| logo_url_for(base, &slug))
        {
            if settings.branding.logo_url.as_deref() != Some(logo_url.as_str()) {
                settings.branding.logo_url = Some(logo_url);
                settings.updated_at = chrono::Utc::now();
                state.db.settings().put(&slug, &settings)?;
                tracing::debug!(%slug, "logo url filled");
            }
        }
    }

    Ok(Json(settings))
}

/// Replace recipients and/or branding for a slug.
///
/// Limited to 20 requests per 10 seconds per client address.
#[utoipa::path(
    patch,
    path = "/api/v1/slugs/{slug}/settings",
    tag = "Settings",
    security(("session_cookie" = [])),
    params(("slug" = String, Path, description = "Tenant slug")),
    request_body = SettingsPatch,
    responses(
        (status = 200, description = "Settings stored", body = UpdatedResponse),
        (status = 400, description = "Invalid recipients", body = ErrorBody),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 429, description = "Too many requests", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn patch_settings(
    AdminSession(admin): AdminSession,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<UpdatedResponse>, ApiError> {
    let ip = client_ip(&headers);
    if !state
        .rate_limiter
        .check_and_increment(&format!("{ip}:patch-settings"))
    {
        tracing::warn!(%ip, "settings patch rate limited");
        return Err(ApiError::too_many_requests());
    }

    let slug = slug_param(&slug)?;
    let body = json_object(&body);

    let recipients = match body.get("email_recipients") {
        Some(value) => {
            let recipients = Recipients::from_value(Some(value));
            recipients.validate(false)?;
            Some(recipients)
        }
        None => None,
    };
    let branding = body
        .get("branding")
        .map(|value| Branding::from_value(Some(value)));

    let payload = json!({ "recipients": recipients, "branding": branding });
    state.db.settings().apply_patch(&slug, recipients, branding)?;

    audit_log!(state.db, AuditAction::SettingsUpdate, admin, slug.clone(), payload);
    tracing::info!(%slug, "slug settings updated");

    Ok(Json(UpdatedResponse { updated: true }))
}

/// Theme and settings for a slug in one call.
#[utoipa::path(
    get,
    path = "/api/v1/slugs/{slug}/meta",
    tag = "Settings",
    security(("session_cookie" = [])),
    params(("slug" = String, Path, description = "Tenant slug")),
    responses(
        (status = 200, description = "Theme and settings", body = MetaResponse),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 404, description = "Unknown slug", body = ErrorBody)
    )
)]
pub async fn get_meta(
    AdminSession(_admin): AdminSession,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<MetaResponse>, ApiError> {
    let slug = slug_param(&slug)?;
    let theme = state.db.themes().require(&slug)?;
    let settings = state.db.settings().get(&slug)?;
    Ok(Json(MetaResponse { theme, settings }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::router;
    use crate::api::test_support::{admin_cookie, json_body, send};
    use crate::state::test_state;
    use crate::storage::{ActorKind, AuditQuery};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use serde_json::Value;

    fn get(uri: &str, cookie: &str) -> Request<Body> {
        Request::get(uri)
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap()
    }

    fn patch(uri: &str, cookie: &str, body: Value) -> Request<Body> {
        Request::patch(uri)
            .header(header::COOKIE, cookie)
            .header(header::CONTENT_TYPE, "application/json")
            .header("cf-connecting-ip", "198.51.100.7")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[test]
    fn logo_url_is_built_under_base_path() {
        let base = Url::parse("https://cdn.example.com/assets/").unwrap();
        assert_eq!(
            logo_url_for(&base, "acme").as_deref(),
            Some("https://cdn.example.com/assets/logos/acme.svg")
        );
        let bare = Url::parse("https://cdn.example.com").unwrap();
        assert_eq!(
            logo_url_for(&bare, "acme").as_deref(),
            Some("https://cdn.example.com/logos/acme.svg")
        );
        assert_eq!(logo_url_for(&Url::parse("mailto:x@example.com").unwrap(), "acme"), None);
    }

    #[tokio::test]
    async fn get_initializes_empty_settings() {
        let (state, _dir) = test_state();
        let (_, cookie) = admin_cookie(&state);
        let app = router(state.clone());

        let response = send(&app, get("/api/v1/slugs/acme/settings", &cookie)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["email_recipients"], json!({"to": [], "cc": [], "bcc": []}));
        assert!(body["branding"]["logo_url"].is_null());
        assert!(state.db.settings().get("acme").unwrap().is_some());
    }

    #[tokio::test]
    async fn first_read_seeds_recipients_from_legacy_theme_email() {
        let (state, _dir) = test_state();
        let (_, cookie) = admin_cookie(&state);
        state
            .db
            .themes()
            .put_raw(
                "acme",
                json!({"slug": "acme", "name": "Acme", "email": " dispatch@acme.test "})
                    .as_object()
                    .unwrap(),
            )
            .unwrap();
        let app = router(state.clone());

        let body = json_body(send(&app, get("/api/v1/slugs/acme/settings", &cookie)).await).await;
        assert_eq!(body["email_recipients"]["to"], json!(["dispatch@acme.test"]));

        state
            .db
            .settings()
            .apply_patch("acme", Some(Recipients::default()), None)
            .unwrap();
        let body = json_body(send(&app, get("/api/v1/slugs/acme/settings", &cookie)).await).await;
        assert_eq!(body["email_recipients"]["to"], json!([]));
    }

    #[tokio::test]
    async fn get_fills_logo_from_base_url() {
        let (state, _dir) = test_state();
        let state = state.with_logo_base_url(Url::parse("https://cdn.example.com/").unwrap());
        let (_, cookie) = admin_cookie(&state);
        state
            .db
            .settings()
            .apply_patch(
                "acme",
                None,
                Some(Branding {
                    logo_url: Some("https://old.example.com/a.png".into()),
                }),
            )
            .unwrap();
        let app = router(state);

        let kept = json_body(send(&app, get("/api/v1/slugs/acme/settings", &cookie)).await).await;
        assert_eq!(kept["branding"]["logo_url"], "https://old.example.com/a.png");

        let refreshed = json_body(
            send(&app, get("/api/v1/slugs/acme/settings?refreshLogo=1", &cookie)).await,
        )
        .await;
        assert_eq!(refreshed["branding"]["logo_url"], "https://cdn.example.com/logos/acme.svg");

        let fresh = json_body(send(&app, get("/api/v1/slugs/beta/settings", &cookie)).await).await;
        assert_eq!(fresh["branding"]["logo_url"], "https://cdn.example.com/logos/beta.svg");
    }

    #[tokio::test]
    async fn patch_replaces_only_given_sections() {
        let (state, _dir) = test_state();
        let (_, cookie) = admin_cookie(&state);
        let app = router(state.clone());

        let response = send(
            &app,
            patch(
                "/api/v1/slugs/acme/settings",
                &cookie,
                json!({"email_recipients": {"to": ["a@example.com"], "bcc": ["b@example.com"]}}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({"updated": true}));

        send(
            &app,
            patch(
                "/api/v1/slugs/acme/settings",
                &cookie,
                json!({"branding": {"logo_url": " https://cdn.example.com/x.svg "}}),
            ),
        )
        .await;

        let stored = state.db.settings().get("acme").unwrap().unwrap();
        assert_eq!(stored.email_recipients.to, vec!["a@example.com"]);
        assert_eq!(stored.email_recipients.bcc, vec!["b@example.com"]);
        assert_eq!(stored.branding.logo_url.as_deref(), Some("https://cdn.example.com/x.svg"));

        let page = state
            .db
            .audit()
            .query(&AuditQuery {
                actor_kind: ActorKind::Admin,
                limit: 10,
                ..AuditQuery::default()
            })
            .unwrap();
        assert_eq!(page.items.len(), 2);
        assert!(page.items.iter().all(|e| e.action == "slug_settings.update"));
    }

    #[tokio::test]
    async fn patch_rejects_invalid_recipients() {
        let (state, _dir) = test_state();
        let (_, cookie) = admin_cookie(&state);
        let app = router(state.clone());

        let response = send(
            &app,
            patch(
                "/api/v1/slugs/acme/settings",
                &cookie,
                json!({"email_recipients": {"cc": ["not-an-email"]}}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error_code"], "invalid_email");
        assert!(state.db.settings().get("acme").unwrap().is_none());
    }

    #[tokio::test]
    async fn patch_is_rate_limited_per_client() {
        let (state, _dir) = test_state();
        let (_, cookie) = admin_cookie(&state);
        let app = router(state);

        for i in 0..20 {
            let response = send(&app, patch("/api/v1/slugs/acme/settings", &cookie, json!({}))).await;
            assert_eq!(response.status(), StatusCode::OK, "request {i}");
        }
        let limited = send(&app, patch("/api/v1/slugs/acme/settings", &cookie, json!({}))).await;
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(json_body(limited).await["error_code"], "rate_limited");

        let other = Request::patch("/api/v1/slugs/acme/settings")
            .header(header::COOKIE, &cookie)
            .header("cf-connecting-ip", "203.0.113.1")
            .body(Body::from("{}"))
            .unwrap();
        assert_eq!(send(&app, other).await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn meta_requires_theme() {
        let (state, _dir) = test_state();
        let (_, cookie) = admin_cookie(&state);
        let app = router(state.clone());

        let missing = send(&app, get("/api/v1/slugs/acme/meta", &cookie)).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        state
            .db
            .themes()
            .upsert(&ThemeRecord {
                slug: "acme".into(),
                brand_name: Some("Acme".into()),
                ..ThemeRecord::default()
            })
            .unwrap();
        let found = send(&app, get("/api/v1/slugs/acme/meta", &cookie)).await;
        assert_eq!(found.status(), StatusCode::OK);
        let body = json_body(found).await;
        assert_eq!(body["theme"]["brand_name"], "Acme");
        assert!(body["settings"].is_null());
    }
}
