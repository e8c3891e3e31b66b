// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit logging for console mutations.
//!
//! Every login, theme write, settings change and test send is appended to
//! `audit_log` under a monotonic id. Reads join the actor's current email
//! and role from `users`.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::database::{AdminDatabase, AUDIT_LOG, AUDIT_SEQ_KEY, META, USERS};
use super::repository::UserRecord;
use super::StorageResult;

/// Largest page the query API returns.
pub const MAX_PAGE_SIZE: usize = 100;
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Types of auditable actions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub enum AuditAction {
    #[serde(rename = "auth.login")]
    Login,
    #[serde(rename = "theme.upsert")]
    ThemeUpsert,
    #[serde(rename = "theme.update")]
    ThemeUpdate,
    #[serde(rename = "email.test_send")]
    TestSend,
    #[serde(rename = "slug_settings.update")]
    SettingsUpdate,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Login => "auth.login",
            AuditAction::ThemeUpsert => "theme.upsert",
            AuditAction::ThemeUpdate => "theme.update",
            AuditAction::TestSend => "email.test_send",
            AuditAction::SettingsUpdate => "slug_settings.update",
        }
    }
}

/// An event about to be recorded.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub action: AuditAction,
    pub actor_user_id: Option<String>,
    pub target: Option<String>,
    pub payload: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(action: AuditAction) -> Self {
        Self {
            action,
            actor_user_id: None,
            target: None,
            payload: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_actor(mut self, user_id: impl Into<String>) -> Self {
        self.actor_user_id = Some(user_id.into());
        self
    }

    /// Set the affected resource (usually a slug).
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// Row layout in `audit_log`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredAuditRow {
    id: u64,
    actor_user_id: Option<String>,
    action: String,
    target: Option<String>,
    payload: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
}

/// An audit entry as returned by queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AuditEntry {
    pub id: u64,
    pub actor_user_id: Option<String>,
    /// Current email of the actor, if the account still exists.
    pub actor_email: Option<String>,
    pub action: String,
    pub target: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub payload: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Whose actions a query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActorKind {
    /// Actors whose account has the admin role.
    #[default]
    Admin,
    /// Everyone else, including actors without an account.
    User,
}

impl ActorKind {
    /// `"user"` (any case) selects non-admins; anything else selects admins.
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("user") {
            ActorKind::User
        } else {
            ActorKind::Admin
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub actor_kind: ActorKind,
    /// Case-insensitive substring over action, target, payload and actor email.
    pub search: Option<String>,
    pub limit: usize,
    /// Return only entries with `id < cursor`.
    pub cursor: Option<u64>,
}

/// One page of audit entries, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AuditPage {
    pub items: Vec<AuditEntry>,
    /// Pass as `cursor` to fetch the next page. `None` on the last page.
    pub next_cursor: Option<u64>,
}

/// Repository for audit entries.
pub struct AuditRepository<'a> {
    db: &'a AdminDatabase,
}

impl<'a> AuditRepository<'a> {
    pub fn new(db: &'a AdminDatabase) -> Self {
        Self { db }
    }

    /// Append an event and return the stored entry.
    pub fn log(&self, event: &AuditEvent) -> StorageResult<AuditEntry> {
        let write_txn = self.db.raw().begin_write()?;
        let row = {
            let mut meta = write_txn.open_table(META)?;
            let id = meta.get(AUDIT_SEQ_KEY)?.map_or(0, |v| v.value()) + 1;
            meta.insert(AUDIT_SEQ_KEY, id)?;

            let row = StoredAuditRow {
                id,
                actor_user_id: event.actor_user_id.clone(),
                action: event.action.as_str().to_string(),
                target: event.target.clone(),
                payload: event.payload.clone(),
                created_at: event.created_at,
            };
            let bytes = serde_json::to_vec(&row)?;
            let mut log = write_txn.open_table(AUDIT_LOG)?;
            log.insert(id, bytes.as_slice())?;
            row
        };
        write_txn.commit()?;

        tracing::debug!(id = row.id, action = %row.action, target = ?row.target, "audit entry recorded");
        let actor_email = match &row.actor_user_id {
            Some(user_id) => self.db.users().get(user_id)?.map(|u| u.email),
            None => None,
        };
        Ok(AuditEntry {
            id: row.id,
            actor_user_id: row.actor_user_id,
            actor_email,
            action: row.action,
            target: row.target,
            payload: row.payload,
            created_at: row.created_at,
        })
    }

    /// Page through entries newest first.
    ///
    /// `next_cursor` is the id of the last item returned, so the following
    /// page starts right after it without skipping a row.
    pub fn query(&self, query: &AuditQuery) -> StorageResult<AuditPage> {
        let limit = query.limit.clamp(1, MAX_PAGE_SIZE);
        let needle = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let read_txn = self.db.raw().begin_read()?;
        let log = read_txn.open_table(AUDIT_LOG)?;
        let users = read_txn.open_table(USERS)?;

        let upper = match query.cursor {
            Some(cursor) if cursor > 0 => cursor,
            _ => u64::MAX,
        };

        let mut items = Vec::with_capacity(limit + 1);
        for entry in log.range(..upper)?.rev() {
            let (_, value) = entry?;
            let row: StoredAuditRow = serde_json::from_slice(value.value())?;

            let actor: Option<UserRecord> = match &row.actor_user_id {
                Some(user_id) => match users.get(user_id.as_str())? {
                    Some(user) => Some(serde_json::from_slice(user.value())?),
                    None => None,
                },
                None => None,
            };

            let actor_is_admin = actor.as_ref().is_some_and(|u| u.role.is_admin());
            let wanted = match query.actor_kind {
                ActorKind::Admin => actor_is_admin,
                ActorKind::User => !actor_is_admin,
            };
            if !wanted {
                continue;
            }

            let actor_email = actor.map(|u| u.email);
            if let Some(needle) = &needle {
                let payload = row.payload.as_ref().map(|p| p.to_string()).unwrap_or_default();
                let haystacks = [
                    Some(row.action.as_str()),
                    row.target.as_deref(),
                    Some(payload.as_str()),
                    actor_email.as_deref(),
                ];
                let hit = haystacks
                    .into_iter()
                    .flatten()
                    .any(|h| h.to_lowercase().contains(needle.as_str()));
                if !hit {
                    continue;
                }
            }

            items.push(AuditEntry {
                id: row.id,
                actor_user_id: row.actor_user_id,
                actor_email,
                action: row.action,
                target: row.target,
                payload: row.payload,
                created_at: row.created_at,
            });
            if items.len() > limit {
                break;
            }
        }

        let next_cursor = if items.len() > limit {
            items.truncate(limit);
            items.last().map(|entry| entry.id)
        } else {
            None
        };

        Ok(AuditPage { items, next_cursor })
    }
}

/// Record an audit event without failing the request.
///
/// Storage errors are logged at `warn` and otherwise ignored.
#[macro_export]
macro_rules! audit_log {
    ($db:expr, $action:expr, $actor:expr, $target:expr) => {{
        let event = $crate::storage::AuditEvent::new($action)
            .with_actor(&$actor.subject_id)
            .with_target($target);
        if let Err(e) = $db.audit().log(&event) {
            tracing::warn!(error = %e, action = $action.as_str(), "failed to record audit entry");
        }
    }};
    ($db:expr, $action:expr, $actor:expr, $target:expr, $payload:expr) => {{
        let event = $crate::storage::AuditEvent::new($action)
            .with_actor(&$actor.subject_id)
            .with_target($target)
            .with_payload($payload);
        if let Err(e) = $db.audit().log(&event) {
            tracing::warn!(error = %e, action = $action.as_str(), "failed to record audit entry");
        }
    }};
}
