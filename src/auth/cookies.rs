// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session cookie transport.
//!
//! ## Domain variants
//!
//! The edge does not always agree with the browser about which registrable
//! domain a request belongs to, so a session is written (and cleared) under
//! every plausible scope at once:
//!
//! | Variant | `Domain` attribute |
//! |---------|--------------------|
//! | host-only | absent |
//! | host | `.<host>` |
//! | apex | `.<last two labels>` (hosts with 3+ labels only) |
//!
//! The apex guess is a heuristic, not a public-suffix-list lookup:
//! `admin.example.co.uk` yields `.co.uk`, which browsers refuse and ignore.

use std::borrow::Cow;
use std::net::IpAddr;

use axum::http::{
    header::{InvalidHeaderValue, COOKIE, SET_COOKIE},
    HeaderMap, HeaderValue,
};

/// Attributes shared by every session cookie variant.
pub const SESSION_COOKIE_ATTRIBUTES: &str = "Path=/; HttpOnly; Secure; SameSite=Strict";

const EPOCH_EXPIRES: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

/// Scope of a single `Set-Cookie` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieDomain {
    /// No `Domain` attribute
    HostOnly,
    /// `Domain=.<domain>`
    Domain(String),
}

impl CookieDomain {
    fn attribute(&self) -> Option<String> {
        match self {
            CookieDomain::HostOnly => None,
            CookieDomain::Domain(domain) => Some(format!("Domain=.{domain}")),
        }
    }
}

// =============================================================================
// Request side
// =============================================================================

/// Find `name` in a `Cookie` header value and percent-decode its value.
///
/// Empty segments, segments without `=`, and whitespace around `;` are
/// tolerated. The first matching name wins.
pub fn extract_cookie(header: &str, name: &str) -> Option<String> {
    for part in header.split(';') {
        let part = part.trim();
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        if key.trim() == name {
            return urlencoding::decode(value.trim()).ok().map(Cow::into_owned);
        }
    }
    None
}

/// Find `name` across every `Cookie` header of a request.
pub fn extract_request_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|header| extract_cookie(header, name))
}

// =============================================================================
// Response side
// =============================================================================

/// Lowercase a `Host` value and strip any port and trailing dot.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim().to_ascii_lowercase();
    let host = if let Some(rest) = host.strip_prefix('[') {
        // IPv6 literal, keep the brackets off for IP detection
        rest.split(']').next().unwrap_or_default().to_string()
    } else {
        host.split(':').next().unwrap_or_default().to_string()
    };
    host.trim_end_matches('.').to_string()
}

/// Domain variants for a request host.
///
/// Empty hosts only get the host-only variant. IP literals never get an
/// apex variant.
pub fn domain_variants(host: &str) -> Vec<CookieDomain> {
    let host = normalize_host(host);
    let mut variants = vec![CookieDomain::HostOnly];
    if host.is_empty() {
        return variants;
    }

    variants.push(CookieDomain::Domain(host.clone()));
    if host.parse::<IpAddr>().is_ok() {
        return variants;
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() >= 3 {
        let apex = labels[labels.len() - 2..].join(".");
        variants.push(CookieDomain::Domain(apex));
    }
    variants
}

fn session_directives(name: &str, value: &str, domains: &[CookieDomain], ttl_seconds: i64) -> Vec<String> {
    let value = urlencoding::encode(value);
    domains
        .iter()
        .map(|domain| match domain.attribute() {
            Some(attr) => format!(
                "{name}={value}; {attr}; {SESSION_COOKIE_ATTRIBUTES}; Max-Age={ttl_seconds}"
            ),
            None => format!("{name}={value}; {SESSION_COOKIE_ATTRIBUTES}; Max-Age={ttl_seconds}"),
        })
        .collect()
}

fn expiry_directives(name: &str, domains: &[CookieDomain]) -> Vec<String> {
    domains
        .iter()
        .map(|domain| match domain.attribute() {
            Some(attr) => format!(
                "{name}=; {attr}; {SESSION_COOKIE_ATTRIBUTES}; Max-Age=0; Expires={EPOCH_EXPIRES}"
            ),
            None => format!("{name}=; {SESSION_COOKIE_ATTRIBUTES}; Max-Age=0; Expires={EPOCH_EXPIRES}"),
        })
        .collect()
}

/// `Set-Cookie` values carrying a session under every domain variant of `host`.
pub fn build_session_cookies(name: &str, value: &str, host: &str, ttl_seconds: i64) -> Vec<String> {
    session_directives(name, value, &domain_variants(host), ttl_seconds)
}

/// `Set-Cookie` values clearing the session under every domain variant of `host`.
pub fn build_expiry_cookies(name: &str, host: &str) -> Vec<String> {
    expiry_directives(name, &domain_variants(host))
}

/// Append each directive as its own `Set-Cookie` header.
pub fn append_set_cookies(headers: &mut HeaderMap, directives: &[String]) -> Result<(), InvalidHeaderValue> {
    for directive in directives {
        headers.append(SET_COOKIE, HeaderValue::from_str(directive)?);
    }
    Ok(())
}

// =============================================================================
// CookiePolicy
// =============================================================================

/// Configured session cookie settings.
///
/// With a fixed domain the derived variants are replaced by host-only plus
/// `Domain=.<fixed>`.
#[derive(Debug, Clone)]
pub struct CookiePolicy {
    name: String,
    ttl_seconds: i64,
    fixed_domain: Option<String>,
}

impl CookiePolicy {
    pub fn new(name: impl Into<String>, ttl_seconds: i64) -> Self {
        Self {
            name: name.into(),
            ttl_seconds,
            fixed_domain: None,
        }
    }

    pub fn with_fixed_domain(mut self, domain: impl Into<String>) -> Self {
        let domain = domain.into();
        let domain = domain.trim().trim_start_matches('.').to_ascii_lowercase();
        self.fixed_domain = (!domain.is_empty()).then_some(domain);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    fn domains(&self, host: &str) -> Vec<CookieDomain> {
        match &self.fixed_domain {
            Some(domain) => vec![CookieDomain::HostOnly, CookieDomain::Domain(domain.clone())],
            None => domain_variants(host),
        }
    }

    pub fn session_cookies(&self, token: &str, host: &str) -> Vec<String> {
        session_directives(&self.name, token, &self.domains(host), self.ttl_seconds)
    }

    pub fn expiry_cookies(&self, host: &str) -> Vec<String> {
        expiry_directives(&self.name, &self.domains(host))
    }
}
