// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded admin database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `users`: user id → serialized UserRecord
//! - `user_email_index`: normalized email → user id
//! - `slug_details`: slug → theme row (JSON object, read through `ThemeRecord::normalize`)
//! - `audit_log`: monotonic id → serialized audit row
//! - `slug_settings`: slug → serialized SlugSettings
//! - `meta`: key → counter (e.g. `audit_seq`)

use std::path::Path;

use redb::{Database, ReadableDatabase, TableDefinition};

use super::audit::AuditRepository;
use super::repository::{SettingsRepository, ThemeRepository, UserRepository};

// =============================================================================
// Table Definitions
// =============================================================================

pub(crate) const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

pub(crate) const USER_EMAIL_INDEX: TableDefinition<&str, &str> =
    TableDefinition::new("user_email_index");

pub(crate) const SLUG_DETAILS: TableDefinition<&str, &[u8]> = TableDefinition::new("slug_details");

pub(crate) const AUDIT_LOG: TableDefinition<u64, &[u8]> = TableDefinition::new("audit_log");

pub(crate) const SLUG_SETTINGS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("slug_settings");

pub(crate) const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

/// `meta` key holding the last issued audit id.
pub(crate) const AUDIT_SEQ_KEY: &str = "audit_seq";

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// AdminDatabase
// =============================================================================

/// Embedded ACID store for users, themes, settings and the audit trail.
pub struct AdminDatabase {
    db: Database,
}

impl AdminDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!(path = %parent.display(), error = %e, "could not create database directory");
            }
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(USER_EMAIL_INDEX)?;
            let _ = write_txn.open_table(SLUG_DETAILS)?;
            let _ = write_txn.open_table(AUDIT_LOG)?;
            let _ = write_txn.open_table(SLUG_SETTINGS)?;
            let _ = write_txn.open_table(META)?;
        }
        write_txn.commit()?;

        tracing::info!(path = %path.display(), "admin database opened");
        Ok(Self { db })
    }

    pub(crate) fn raw(&self) -> &Database {
        &self.db
    }

    pub fn users(&self) -> UserRepository<'_> {
        UserRepository::new(self)
    }

    pub fn themes(&self) -> ThemeRepository<'_> {
        ThemeRepository::new(self)
    }

    pub fn settings(&self) -> SettingsRepository<'_> {
        SettingsRepository::new(self)
    }

    pub fn audit(&self) -> AuditRepository<'_> {
        AuditRepository::new(self)
    }

    /// Cheap liveness probe: open a read transaction and touch one table.
    pub fn check(&self) -> StorageResult<()> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(META)?;
        let _ = table.get(AUDIT_SEQ_KEY)?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_database() -> (tempfile::TempDir, AdminDatabase) {
    let dir = tempfile::TempDir::new().unwrap();
    let db = AdminDatabase::open(&dir.path().join("admin.redb")).unwrap();
    (dir, db)
}
