// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Theme (slug details) repository.
//!
//! Rows are kept as JSON objects. Older rows may still use legacy column
//! names, so every read goes through [`ThemeRecord::normalize`].

use chrono::Utc;
use redb::{ReadableDatabase, ReadableTable};
use serde_json::{Map, Value};

use crate::models::{ThemeRecord, ThemeUpdate};
use crate::storage::database::{AdminDatabase, SLUG_DETAILS};
use crate::storage::{StorageError, StorageResult};

fn decode_row(slug: &str, bytes: &[u8]) -> StorageResult<Option<ThemeRecord>> {
    let row: Map<String, Value> = serde_json::from_slice(bytes)?;
    let theme = ThemeRecord::normalize(&row);
    if theme.is_none() {
        tracing::warn!(slug, "theme row without a slug column");
    }
    Ok(theme)
}

fn encode_row(theme: &ThemeRecord) -> StorageResult<Vec<u8>> {
    Ok(serde_json::to_vec(theme)?)
}

pub struct ThemeRepository<'a> {
    db: &'a AdminDatabase,
}

impl<'a> ThemeRepository<'a> {
    pub fn new(db: &'a AdminDatabase) -> Self {
        Self { db }
    }

    /// All themes, slug ascending.
    pub fn list(&self) -> StorageResult<Vec<ThemeRecord>> {
        let read_txn = self.db.raw().begin_read()?;
        let table = read_txn.open_table(SLUG_DETAILS)?;

        let mut themes = Vec::new();
        for entry in table.iter()? {
            let (key, value) = entry?;
            match decode_row(key.value(), value.value()) {
                Ok(Some(theme)) => themes.push(theme),
                Ok(None) => {}
                Err(e) => tracing::warn!(slug = key.value(), error = %e, "skipping unreadable theme row"),
            }
        }
        themes.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(themes)
    }

    pub fn get(&self, slug: &str) -> StorageResult<Option<ThemeRecord>> {
        let read_txn = self.db.raw().begin_read()?;
        let table = read_txn.open_table(SLUG_DETAILS)?;
        match table.get(slug)? {
            Some(value) => decode_row(slug, value.value()),
            None => Ok(None),
        }
    }

    pub fn exists(&self, slug: &str) -> StorageResult<bool> {
        let read_txn = self.db.raw().begin_read()?;
        let table = read_txn.open_table(SLUG_DETAILS)?;
        Ok(table.get(slug)?.is_some())
    }

    /// Create or fully replace the theme for `theme.slug`.
    pub fn upsert(&self, theme: &ThemeRecord) -> StorageResult<ThemeRecord> {
        let mut stored = theme.clone();
        stored.updated_at = Some(Utc::now().to_rfc3339());
        let bytes = encode_row(&stored)?;

        let write_txn = self.db.raw().begin_write()?;
        {
            let mut table = write_txn.open_table(SLUG_DETAILS)?;
            table.insert(stored.slug.as_str(), bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(stored)
    }

    /// Apply a partial update. Returns `None` when the slug does not exist.
    pub fn update(&self, slug: &str, update: &ThemeUpdate) -> StorageResult<Option<ThemeRecord>> {
        let write_txn = self.db.raw().begin_write()?;
        let updated = {
            let mut table = write_txn.open_table(SLUG_DETAILS)?;
            let current = match table.get(slug)? {
                Some(value) => decode_row(slug, value.value())?,
                None => None,
            };
            let Some(mut theme) = current else {
                return Ok(None);
            };

            update.apply(&mut theme);
            theme.updated_at = Some(Utc::now().to_rfc3339());
            let bytes = encode_row(&theme)?;
            table.insert(slug, bytes.as_slice())?;
            theme
        };
        write_txn.commit()?;
        Ok(Some(updated))
    }

    /// Like [`get`](Self::get) but treats absence as an error.
    pub fn require(&self, slug: &str) -> StorageResult<ThemeRecord> {
        self.get(slug)?
            .ok_or_else(|| StorageError::NotFound(format!("Theme {slug}")))
    }

    /// Store a raw row as-is, e.g. one that predates the canonical columns.
    #[cfg(test)]
    pub(crate) fn put_raw(&self, slug: &str, row: &Map<String, Value>) -> StorageResult<()> {
        let bytes = serde_json::to_vec(row)?;
        let write_txn = self.db.raw().begin_write()?;
        {
            let mut table = write_txn.open_table(SLUG_DETAILS)?;
            table.insert(slug, bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::test_database;
    use serde_json::json;

    fn theme(slug: &str) -> ThemeRecord {
        ThemeRecord {
            slug: slug.to_string(),
            brand_name: Some(format!("{slug} brand")),
            issue_report: Some(1),
            ..ThemeRecord::default()
        }
    }

    #[test]
    fn upsert_then_get() {
        let (_dir, db) = test_database();
        let repo = db.themes();
        let stored = repo.upsert(&theme("acme")).unwrap();
        assert!(stored.updated_at.is_some());

        let loaded = repo.get("acme").unwrap().unwrap();
        assert_eq!(loaded, stored);
        assert!(repo.exists("acme").unwrap());
        assert!(!repo.exists("globex").unwrap());
        assert!(repo.get("globex").unwrap().is_none());
    }

    #[test]
    fn upsert_replaces_existing_row() {
        let (_dir, db) = test_database();
        let repo = db.themes();
        repo.upsert(&theme("acme")).unwrap();

        let mut replacement = theme("acme");
        replacement.brand_name = None;
        replacement.status = Some("live".into());
        repo.upsert(&replacement).unwrap();

        let loaded = repo.get("acme").unwrap().unwrap();
        assert_eq!(loaded.brand_name, None);
        assert_eq!(loaded.status.as_deref(), Some("live"));
    }

    #[test]
    fn list_is_sorted_by_slug() {
        let (_dir, db) = test_database();
        let repo = db.themes();
        for slug in ["zeta", "acme", "m-1"] {
            repo.upsert(&theme(slug)).unwrap();
        }
        let slugs: Vec<_> = repo.list().unwrap().into_iter().map(|t| t.slug).collect();
        assert_eq!(slugs, vec!["acme", "m-1", "zeta"]);
    }

    #[test]
    fn legacy_rows_are_normalized_on_read() {
        let (_dir, db) = test_database();
        let repo = db.themes();
        let row = json!({"slug_id": "legacy", "name": "Legacy Co", "logo_path": "/l.svg", "gps_check": 1});
        repo.put_raw("legacy", row.as_object().unwrap()).unwrap();

        let loaded = repo.get("legacy").unwrap().unwrap();
        assert_eq!(loaded.slug, "legacy");
        assert_eq!(loaded.brand_name.as_deref(), Some("Legacy Co"));
        assert_eq!(loaded.logo.as_deref(), Some("/l.svg"));
        assert_eq!(loaded.gps_check, Some(1));
        assert_eq!(repo.list().unwrap().len(), 1);
    }

    #[test]
    fn partial_update_touches_only_given_fields() {
        let (_dir, db) = test_database();
        let repo = db.themes();
        repo.upsert(&theme("acme")).unwrap();

        let update = ThemeUpdate {
            color_primary: Some("#123456".into()),
            issue_report: Some(0),
            ..ThemeUpdate::default()
        };
        let updated = repo.update("acme", &update).unwrap().unwrap();
        assert_eq!(updated.color_primary.as_deref(), Some("#123456"));
        assert_eq!(updated.issue_report, Some(0));
        assert_eq!(updated.brand_name.as_deref(), Some("acme brand"));
    }

    #[test]
    fn update_of_unknown_slug_returns_none() {
        let (_dir, db) = test_database();
        let update = ThemeUpdate {
            status: Some("live".into()),
            ..ThemeUpdate::default()
        };
        assert!(db.themes().update("missing", &update).unwrap().is_none());
        assert!(matches!(db.themes().require("missing"), Err(StorageError::NotFound(_))));
    }
}
