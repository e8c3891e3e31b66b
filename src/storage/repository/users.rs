// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User repository.
//!
//! Users are keyed by id in `users`; `user_email_index` maps the normalized
//! email to the id so login lookups are case-insensitive.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::auth::Role;
use crate::storage::database::{AdminDatabase, USERS, USER_EMAIL_INDEX};
use crate::storage::StorageResult;

/// Canonical email form used for lookups: NFKC, trimmed, lowercased.
pub fn normalize_email(email: &str) -> String {
    email.nfkc().collect::<String>().trim().to_lowercase()
}

/// A console account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub role: Role,
    /// 1 when the account is enabled
    pub is_active: i64,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn new(email: &str, role: Role) -> Self {
        Self {
            id: format!("usr_{}", uuid::Uuid::new_v4().simple()),
            email: normalize_email(email),
            name: None,
            role,
            is_active: 1,
            created_at: Utc::now(),
        }
    }
}

pub struct UserRepository<'a> {
    db: &'a AdminDatabase,
}

impl<'a> UserRepository<'a> {
    pub fn new(db: &'a AdminDatabase) -> Self {
        Self { db }
    }

    pub fn get(&self, user_id: &str) -> StorageResult<Option<UserRecord>> {
        let read_txn = self.db.raw().begin_read()?;
        let table = read_txn.open_table(USERS)?;
        match table.get(user_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Look up a user by email, ignoring case and surrounding whitespace.
    pub fn find_by_email(&self, email: &str) -> StorageResult<Option<UserRecord>> {
        let key = normalize_email(email);
        let read_txn = self.db.raw().begin_read()?;
        let index = read_txn.open_table(USER_EMAIL_INDEX)?;
        let Some(user_id) = index.get(key.as_str())?.map(|v| v.value().to_string()) else {
            return Ok(None);
        };
        let users = read_txn.open_table(USERS)?;
        match users.get(user_id.as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Insert or replace a user and keep the email index in step.
    pub fn upsert(&self, user: &UserRecord) -> StorageResult<()> {
        let json = serde_json::to_vec(user)?;
        let email_key = normalize_email(&user.email);

        let write_txn = self.db.raw().begin_write()?;
        {
            let mut users = write_txn.open_table(USERS)?;
            let previous: Option<UserRecord> = match users.get(user.id.as_str())? {
                Some(value) => Some(serde_json::from_slice(value.value())?),
                None => None,
            };
            users.insert(user.id.as_str(), json.as_slice())?;

            let mut index = write_txn.open_table(USER_EMAIL_INDEX)?;
            if let Some(previous) = previous {
                let old_key = normalize_email(&previous.email);
                if old_key != email_key {
                    index.remove(old_key.as_str())?;
                }
            }
            index.insert(email_key.as_str(), user.id.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Make sure an active admin exists for `email`, promoting an existing
    /// account if needed.
    pub fn ensure_admin(&self, email: &str) -> StorageResult<UserRecord> {
        let user = match self.find_by_email(email)? {
            Some(mut user) => {
                if user.role.is_admin() && user.is_active == 1 {
                    return Ok(user);
                }
                user.role = Role::Admin;
                user.is_active = 1;
                user
            }
            None => UserRecord::new(email, Role::Admin),
        };
        self.upsert(&user)?;
        tracing::info!(user_id = %user.id, "seeded admin account");
        Ok(user)
    }
}
