// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    body::Bytes,
    http::{header, HeaderMap, HeaderName, HeaderValue, Uri},
    routing::{get, post},
    Router,
};
use serde_json::{Map, Value};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::cookies::normalize_host,
    config::DEFAULT_COOKIE_NAME,
    error::ErrorBody,
    models::{
        Branding, PublicColors, PublicFlags, PublicHeader, PublicTheme, Recipients, SlugSettings,
        ThemeRecord, ThemeUpdate,
    },
    state::AppState,
    storage::{AuditEntry, AuditPage},
};

pub mod audit;
pub mod health;
pub mod notifications;
pub mod session;
pub mod settings;
pub mod themes;

/// Applied to every console and settings response.
pub const CONTENT_SECURITY_POLICY: &str =
    "default-src 'none'; frame-ancestors 'none'; base-uri 'none';";

const CF_CONNECTING_IP: HeaderName = HeaderName::from_static("cf-connecting-ip");
const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

pub fn router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/login", post(session::login))
        .route("/logout", post(session::logout))
        .route("/me", get(session::me))
        .route("/ping", get(session::ping))
        .route("/themes", get(themes::list_themes).post(themes::upsert_theme))
        .route(
            "/themes/{slug}",
            get(themes::get_theme).put(themes::update_theme),
        )
        .route("/audit", get(audit::list_audit))
        .route("/test-send", post(notifications::test_send));

    let slug_routes = Router::new()
        .route(
            "/{slug}/settings",
            get(settings::get_settings).patch(settings::patch_settings),
        )
        .route("/{slug}/meta", get(settings::get_meta));

    let console = Router::new()
        .nest("/api/admin", admin_routes)
        .nest("/api/v1/slugs", slug_routes)
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(CONTENT_SECURITY_POLICY),
        ));

    Router::new()
        .merge(console)
        .route("/api/themes/{slug}", get(themes::public_theme))
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

// =============================================================================
// Request helpers
// =============================================================================

/// Parse a request body as a JSON object. Anything else reads as `{}`.
pub(crate) fn json_object(body: &Bytes) -> Map<String, Value> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// Text value of `key` when it is a JSON string, trimmed.
pub(crate) fn string_field(body: &Map<String, Value>, key: &str) -> String {
    body.get(key)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// Host the client addressed, normalized for cookie domains.
pub(crate) fn request_host(headers: &HeaderMap, uri: &Uri) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| uri.host())
        .unwrap_or_default();
    normalize_host(host)
}

/// Best-effort client address for rate limiting.
pub(crate) fn client_ip(headers: &HeaderMap) -> String {
    let header_text = |name: &HeaderName| headers.get(name).and_then(|v| v.to_str().ok());
    header_text(&CF_CONNECTING_IP)
        .map(str::trim)
        .or_else(|| {
            header_text(&X_FORWARDED_FOR)
                .and_then(|list| list.split(',').next())
                .map(str::trim)
        })
        .filter(|ip| !ip.is_empty())
        .unwrap_or("ip")
        .to_string()
}

// =============================================================================
// OpenAPI
// =============================================================================

struct SessionCookieAddon;

impl Modify for SessionCookieAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "session_cookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(DEFAULT_COOKIE_NAME))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        session::login,
        session::logout,
        session::me,
        session::ping,
        themes::list_themes,
        themes::upsert_theme,
        themes::get_theme,
        themes::update_theme,
        themes::public_theme,
        audit::list_audit,
        notifications::test_send,
        settings::get_settings,
        settings::patch_settings,
        settings::get_meta,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            ErrorBody,
            ThemeRecord,
            ThemeUpdate,
            PublicTheme,
            PublicColors,
            PublicHeader,
            PublicFlags,
            Recipients,
            Branding,
            SlugSettings,
            AuditEntry,
            AuditPage,
            session::LoginRequest,
            session::OkResponse,
            session::MeResponse,
            session::PingResponse,
            notifications::TestSendRequest,
            notifications::TestSendResponse,
            notifications::RecipientCounts,
            settings::SettingsPatch,
            settings::UpdatedResponse,
            settings::MetaResponse,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    modifiers(&SessionCookieAddon),
    tags(
        (name = "Session", description = "Admin login, logout and session checks"),
        (name = "Themes", description = "Tenant branding records"),
        (name = "Audit", description = "Audit trail of console mutations"),
        (name = "Notifications", description = "Notification recipient checks"),
        (name = "Settings", description = "Per-slug recipients and branding"),
        (name = "Health", description = "Service health")
    )
)]
pub struct ApiDoc;
