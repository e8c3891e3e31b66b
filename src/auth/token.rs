// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HMAC-SHA256 session tokens.
//!
//! ## Format
//!
//! ```text
//! b64url(header) "." b64url(payload) "." b64url(HMAC-SHA256(secret, b64url(header) "." b64url(payload)))
//! ```
//!
//! - `header` is always `{"alg":"HMAC-SHA256","typ":"session"}`
//! - `payload` is the claims object plus `issued_at` / `expires_at`
//!
//! ## Verification
//!
//! The MAC is recomputed over the first two segments exactly as transmitted
//! and checked with the constant-time `verify_slice` primitive. Every failure
//! (bad structure, bad base64, bad MAC, non-object payload, expiry) collapses
//! to `None` so callers cannot tell rejection reasons apart.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;

use super::claims::Principal;
use super::codec::{decode_url_safe_base64, encode_url_safe_base64};
use crate::config::ConfigError;

type HmacSha256 = Hmac<Sha256>;

/// `alg` value written into every token header.
pub const TOKEN_ALGORITHM: &str = "HMAC-SHA256";
/// `typ` value written into every token header.
pub const TOKEN_TYPE: &str = "session";

const ISSUED_AT_CLAIM: &str = "issued_at";
const EXPIRES_AT_CLAIM: &str = "expires_at";

// =============================================================================
// Clock
// =============================================================================

/// Source of "now" in Unix seconds.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now_unix(&self) -> i64;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Manually driven clock for tests and simulations.
#[derive(Debug, Default)]
pub struct FixedClock(AtomicI64);

impl FixedClock {
    pub fn new(now: i64) -> Self {
        Self(AtomicI64::new(now))
    }

    pub fn set(&self, now: i64) {
        self.0.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: i64) {
        self.0.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_unix(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Failure to mint a token.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("session claims must serialize to a JSON object")]
    ClaimsNotObject,

    #[error("failed to serialize token segment: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid HMAC key")]
    InvalidKey,
}

/// Why a token was refused. Only ever logged, never returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    Malformed,
    Decode,
    SignatureInvalid,
    Expired,
}

impl Rejection {
    fn as_str(self) -> &'static str {
        match self {
            Rejection::Malformed => "malformed",
            Rejection::Decode => "decode_error",
            Rejection::SignatureInvalid => "signature_invalid",
            Rejection::Expired => "expired",
        }
    }
}

// =============================================================================
// MAC inputs
// =============================================================================

/// The bytes covered by the MAC: `<header>.<payload>` as transmitted.
#[derive(Clone, Copy)]
struct SigningInput<'a>(&'a str);

/// A decoded MAC tag taken from the third token segment.
struct Tag(Vec<u8>);

#[derive(Serialize, Deserialize)]
struct TokenHeader {
    alg: String,
    typ: String,
}

// =============================================================================
// TokenEngine
// =============================================================================

/// Signs and verifies session tokens with a shared secret.
#[derive(Clone)]
pub struct TokenEngine {
    secret: Arc<[u8]>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for TokenEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenEngine")
            .field("secret", &"<redacted>")
            .field("clock", &self.clock)
            .finish()
    }
}

impl TokenEngine {
    /// Create an engine using the system clock.
    ///
    /// An empty secret is a configuration error.
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, ConfigError> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        Ok(Self {
            secret: Arc::from(secret),
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Current time according to the engine's clock.
    pub fn now(&self) -> i64 {
        self.clock.now_unix()
    }

    /// Sign `claims` into a token valid for `ttl_seconds`.
    pub fn sign<C: Serialize>(&self, claims: &C, ttl_seconds: i64) -> Result<String, TokenError> {
        let Value::Object(mut payload) = serde_json::to_value(claims)? else {
            return Err(TokenError::ClaimsNotObject);
        };

        let issued_at = self.now();
        let expires_at = issued_at.saturating_add(ttl_seconds);
        payload.insert(ISSUED_AT_CLAIM.to_string(), Value::from(issued_at));
        payload.insert(EXPIRES_AT_CLAIM.to_string(), Value::from(expires_at));

        let header = TokenHeader {
            alg: TOKEN_ALGORITHM.to_string(),
            typ: TOKEN_TYPE.to_string(),
        };
        let header_b64 = encode_url_safe_base64(&serde_json::to_vec(&header)?);
        let payload_b64 = encode_url_safe_base64(&serde_json::to_vec(&payload)?);

        let signing_input = format!("{header_b64}.{payload_b64}");
        let tag = self
            .compute_tag(SigningInput(&signing_input))
            .ok_or(TokenError::InvalidKey)?;

        Ok(format!("{signing_input}.{}", encode_url_safe_base64(&tag)))
    }

    /// Verify a token and return its principal.
    ///
    /// Never panics; every failure yields `None`.
    pub fn verify(&self, token: &str) -> Option<Principal> {
        match self.check(token) {
            Ok(principal) => Some(principal),
            Err(reason) => {
                tracing::debug!(reason = reason.as_str(), "session token rejected");
                None
            }
        }
    }

    fn check(&self, token: &str) -> Result<Principal, Rejection> {
        let mut segments = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(Rejection::Malformed);
        };
        if header.is_empty() || payload.is_empty() || signature.is_empty() {
            return Err(Rejection::Malformed);
        }

        // Exactly the transmitted "<header>.<payload>" prefix.
        let signing_input = SigningInput(&token[..header.len() + 1 + payload.len()]);
        let tag = Tag(decode_url_safe_base64(signature).map_err(|_| Rejection::Decode)?);
        if !self.verify_tag(signing_input, &tag) {
            return Err(Rejection::SignatureInvalid);
        }

        let header_bytes = decode_url_safe_base64(header).map_err(|_| Rejection::Decode)?;
        let header: TokenHeader =
            serde_json::from_slice(&header_bytes).map_err(|_| Rejection::Malformed)?;
        if header.alg != TOKEN_ALGORITHM {
            return Err(Rejection::Malformed);
        }

        let payload_bytes = decode_url_safe_base64(payload).map_err(|_| Rejection::Decode)?;
        let Value::Object(claims) =
            serde_json::from_slice::<Value>(&payload_bytes).map_err(|_| Rejection::Malformed)?
        else {
            return Err(Rejection::Malformed);
        };

        let principal: Principal =
            serde_json::from_value(Value::Object(claims)).map_err(|_| Rejection::Malformed)?;
        if principal.is_expired_at(self.now()) {
            return Err(Rejection::Expired);
        }
        Ok(principal)
    }

    fn mac(&self) -> Option<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret).ok()
    }

    fn compute_tag(&self, input: SigningInput<'_>) -> Option<Vec<u8>> {
        let mut mac = self.mac()?;
        mac.update(input.0.as_bytes());
        Some(mac.finalize().into_bytes().to_vec())
    }

    fn verify_tag(&self, input: SigningInput<'_>, tag: &Tag) -> bool {
        let Some(mut mac) = self.mac() else {
            return false;
        };
        mac.update(input.0.as_bytes());
        mac.verify_slice(&tag.0).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Role, SessionClaims};
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use serde_json::json;

    const NOW: i64 = 1_700_000_000;

    fn engine_at(secret: &str, now: i64) -> (TokenEngine, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(now));
        let engine = TokenEngine::new(secret).unwrap().with_clock(clock.clone());
        (engine, clock)
    }

    fn admin_claims() -> SessionClaims {
        SessionClaims {
            subject_id: "usr_42".to_string(),
            email: Some("ops@example.com".to_string()),
            role: Role::Admin,
            is_active: 1,
            session_id: Some("sess_1".to_string()),
        }
    }

    /// Replace the character at `index` with a different base64url character.
    fn flip_char(segment: &str, index: usize) -> String {
        let mut chars: Vec<char> = segment.chars().collect();
        chars[index] = if chars[index] == 'A' { 'B' } else { 'A' };
        chars.into_iter().collect()
    }

    #[test]
    fn empty_secret_is_config_error() {
        assert!(matches!(TokenEngine::new(""), Err(ConfigError::MissingSecret)));
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let (engine, _) = engine_at("s3cret", NOW);
        let claims = admin_claims();

        let token = engine.sign(&claims, 3600).unwrap();
        let principal = engine.verify(&token).expect("fresh token verifies");

        assert_eq!(principal.subject_id, claims.subject_id);
        assert_eq!(principal.email, claims.email);
        assert_eq!(principal.role, Role::Admin);
        assert_eq!(principal.is_active, 1);
        assert_eq!(principal.session_id, claims.session_id);
        assert_eq!(principal.issued_at, Some(NOW));
        assert_eq!(principal.expires_at, Some(NOW + 3600));
        assert!(principal.extra.is_empty());
    }

    #[test]
    fn header_is_fixed() {
        let (engine, _) = engine_at("s3cret", NOW);
        let token = engine.sign(&admin_claims(), 60).unwrap();
        let header = token.split('.').next().unwrap();
        let decoded: Value = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(header).unwrap()).unwrap();
        assert_eq!(decoded, json!({"alg": "HMAC-SHA256", "typ": "session"}));
    }

    #[test]
    fn computed_timestamps_override_claims() {
        let (engine, _) = engine_at("s3cret", NOW);
        let claims = json!({
            "subject_id": "usr_1",
            "role": "admin",
            "is_active": 1,
            "issued_at": 1,
            "expires_at": i64::MAX,
        });

        let token = engine.sign(&claims, 10).unwrap();
        let principal = engine.verify(&token).unwrap();
        assert_eq!(principal.issued_at, Some(NOW));
        assert_eq!(principal.expires_at, Some(NOW + 10));
    }

    #[test]
    fn non_object_claims_are_refused() {
        let (engine, _) = engine_at("s3cret", NOW);
        assert!(matches!(
            engine.sign(&json!(["not", "an", "object"]), 10),
            Err(TokenError::ClaimsNotObject)
        ));
    }

    #[test]
    fn expiry_boundary() {
        let (engine, clock) = engine_at("s3cret", NOW);
        let token = engine.sign(&admin_claims(), 1).unwrap();

        assert!(engine.verify(&token).is_some());
        clock.advance(1);
        assert!(engine.verify(&token).is_some(), "valid through expires_at");
        clock.set(NOW + 2);
        assert!(engine.verify(&token).is_none());
        assert_eq!(engine.check(&token).unwrap_err(), Rejection::Expired);
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let (engine, _) = engine_at("s3cret", NOW);
        let token = engine.sign(&admin_claims(), 3600).unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        for index in 0..parts[1].len() {
            let tampered = format!("{}.{}.{}", parts[0], flip_char(parts[1], index), parts[2]);
            assert!(engine.verify(&tampered).is_none(), "payload char {index}");
        }
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let (engine, _) = engine_at("s3cret", NOW);
        let token = engine.sign(&admin_claims(), 3600).unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        for index in 0..parts[2].len() {
            let tampered = format!("{}.{}.{}", parts[0], parts[1], flip_char(parts[2], index));
            assert!(engine.verify(&tampered).is_none(), "signature char {index}");
        }
    }

    #[test]
    fn escalated_claims_with_original_signature_fail() {
        let (engine, _) = engine_at("s3cret", NOW);
        let mut claims = admin_claims();
        claims.role = Role::Other("user".to_string());
        let token = engine.sign(&claims, 3600).unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        let forged_payload = URL_SAFE_NO_PAD.encode(
            json!({"subject_id": "usr_42", "role": "admin", "is_active": 1, "expires_at": NOW + 3600})
                .to_string(),
        );
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);
        assert_eq!(engine.check(&forged).unwrap_err(), Rejection::SignatureInvalid);
    }

    #[test]
    fn wrong_key_is_rejected() {
        let (signer, _) = engine_at("key-one", NOW);
        let (verifier, _) = engine_at("key-two", NOW);
        let token = signer.sign(&admin_claims(), 3600).unwrap();
        assert!(verifier.verify(&token).is_none());
    }

    #[test]
    fn malformed_tokens_never_panic() {
        let (engine, _) = engine_at("s3cret", NOW);
        let valid = engine.sign(&admin_claims(), 3600).unwrap();
        let parts: Vec<&str> = valid.split('.').collect();

        let cases = [
            String::new(),
            "a.b".to_string(),
            "a.b.c.d".to_string(),
            "..".to_string(),
            "a..c".to_string(),
            "!!!.@@@.###".to_string(),
            format!("{}.{}.%%%", parts[0], parts[1]),
            format!("{}.{}.{}.", parts[0], parts[1], parts[2]),
            "\u{1F600}.\u{1F600}.\u{1F600}".to_string(),
        ];
        for case in cases {
            assert!(engine.verify(&case).is_none(), "{case:?}");
        }
    }

    #[test]
    fn signed_non_object_payload_is_rejected() {
        let (engine, _) = engine_at("s3cret", NOW);
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HMAC-SHA256","typ":"session"}"#);
        let payload = URL_SAFE_NO_PAD.encode("[1,2,3]");
        let input = format!("{header}.{payload}");
        let tag = engine.compute_tag(SigningInput(&input)).unwrap();
        let token = format!("{input}.{}", URL_SAFE_NO_PAD.encode(tag));

        assert_eq!(engine.check(&token).unwrap_err(), Rejection::Malformed);
    }

    #[test]
    fn debug_output_redacts_secret() {
        let (engine, _) = engine_at("super-secret-value", NOW);
        let rendered = format!("{engine:?}");
        assert!(!rendered.contains("super-secret-value"));
    }
}
