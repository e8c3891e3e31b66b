// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Brand Admin Console - Multi-tenant Theme Administration Service
//!
//! Admins sign in by email and receive an HMAC-signed session cookie that
//! gates CRUD over per-tenant branding records, the audit trail and
//! per-tenant notification settings.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Session tokens, cookies and the admin guard
//! - `storage` - Embedded redb store and repositories
//! - `rate_limit` - In-memory request limiter

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod rate_limit;
pub mod shutdown;
pub mod state;
pub mod storage;
