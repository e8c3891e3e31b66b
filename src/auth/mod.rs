// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Stateless cookie sessions for the admin console.
//!
//! ## Auth Flow
//!
//! 1. `POST /api/admin/login` looks the email up in the user table
//! 2. An active admin gets an HMAC-SHA256 session token, delivered as
//!    `Set-Cookie` under every plausible domain variant
//! 3. Each protected request:
//!    - reads the session cookie (`COOKIE_NAME`, default `sida`)
//!    - verifies the token signature and expiry
//!    - requires `role == "admin"` and `is_active == 1`
//!
//! ## Security
//!
//! - Verification failures are indistinguishable to the caller
//! - MAC comparison is constant time
//! - Cookies are `HttpOnly; Secure; SameSite=Strict`
//! - There is no server-side revocation; tokens live until `expires_at`

pub mod claims;
pub mod codec;
pub mod cookies;
pub mod error;
pub mod guard;
pub mod roles;
pub mod token;

pub use claims::{Principal, SessionClaims};
pub use cookies::CookiePolicy;
pub use error::AuthError;
pub use guard::{authenticate, require_admin, AdminSession, OptionalAdminSession};
pub use roles::Role;
pub use token::{Clock, FixedClock, SystemClock, TokenEngine, TokenError};
