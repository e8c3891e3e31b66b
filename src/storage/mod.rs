// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistent state lives in a single embedded redb database. Each entity
//! has a repository borrowing the shared [`AdminDatabase`]:
//!
//! ```text
//! AdminDatabase
//!   users()     -> UserRepository      (users, user_email_index)
//!   themes()    -> ThemeRepository     (slug_details)
//!   settings()  -> SettingsRepository  (slug_settings)
//!   audit()     -> AuditRepository     (audit_log, meta)
//! ```
//!
//! Writes run inside one redb write transaction each, so every repository
//! call is atomic.

pub mod audit;
pub mod database;
pub mod repository;

pub use audit::{
    ActorKind, AuditAction, AuditEntry, AuditEvent, AuditPage, AuditQuery, AuditRepository,
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
pub use database::{AdminDatabase, StorageError, StorageResult};
pub use repository::{
    normalize_email, SettingsRepository, ThemeRepository, UserRecord, UserRepository,
};
