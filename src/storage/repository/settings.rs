// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-slug settings repository (notification recipients and branding).

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable, Table};
use serde_json::Value;

use crate::models::{Branding, Recipients, SlugSettings};
use crate::storage::database::{AdminDatabase, SLUG_SETTINGS};
use crate::storage::StorageResult;

/// Parse a stored row without failing on partial or older shapes.
fn decode(bytes: &[u8]) -> StorageResult<SlugSettings> {
    let row: Value = serde_json::from_slice(bytes)?;
    let updated_at = row
        .get("updated_at")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map_or_else(Utc::now, |dt| dt.with_timezone(&Utc));
    Ok(SlugSettings {
        email_recipients: Recipients::from_value(row.get("email_recipients")),
        branding: Branding::from_value(row.get("branding")),
        updated_at,
    })
}

fn read(table: &Table<'_, &'static str, &'static [u8]>, slug: &str) -> StorageResult<Option<SlugSettings>> {
    match table.get(slug)? {
        Some(value) => Ok(Some(decode(value.value())?)),
        None => Ok(None),
    }
}

pub struct SettingsRepository<'a> {
    db: &'a AdminDatabase,
}

impl<'a> SettingsRepository<'a> {
    pub fn new(db: &'a AdminDatabase) -> Self {
        Self { db }
    }

    pub fn get(&self, slug: &str) -> StorageResult<Option<SlugSettings>> {
        let read_txn = self.db.raw().begin_read()?;
        let table = read_txn.open_table(SLUG_SETTINGS)?;
        match table.get(slug)? {
            Some(value) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    /// Load settings, inserting a row with `seed` recipients first if none exists.
    pub fn get_or_init(&self, slug: &str, seed: Recipients) -> StorageResult<SlugSettings> {
        if let Some(settings) = self.get(slug)? {
            return Ok(settings);
        }

        let write_txn = self.db.raw().begin_write()?;
        let settings = {
            let mut table = write_txn.open_table(SLUG_SETTINGS)?;
            // Another writer may have created it since the read above.
            match read(&table, slug)? {
                Some(existing) => existing,
                None => {
                    let fresh = SlugSettings::with_recipients(seed);
                    let bytes = serde_json::to_vec(&fresh)?;
                    table.insert(slug, bytes.as_slice())?;
                    tracing::debug!(slug, "initialized slug settings");
                    fresh
                }
            }
        };
        write_txn.commit()?;
        Ok(settings)
    }

    pub fn put(&self, slug: &str, settings: &SlugSettings) -> StorageResult<()> {
        let bytes = serde_json::to_vec(settings)?;
        let write_txn = self.db.raw().begin_write()?;
        {
            let mut table = write_txn.open_table(SLUG_SETTINGS)?;
            table.insert(slug, bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Replace the provided sections, creating the row when missing.
    ///
    /// `updated_at` only moves when something was written.
    pub fn apply_patch(
        &self,
        slug: &str,
        recipients: Option<Recipients>,
        branding: Option<Branding>,
    ) -> StorageResult<SlugSettings> {
        let write_txn = self.db.raw().begin_write()?;
        let settings = {
            let mut table = write_txn.open_table(SLUG_SETTINGS)?;
            let current = read(&table, slug)?;
            let changed = current.is_none() || recipients.is_some() || branding.is_some();

            let mut settings = current.unwrap_or_else(SlugSettings::empty);
            if let Some(recipients) = recipients {
                settings.email_recipients = recipients;
            }
            if let Some(branding) = branding {
                settings.branding = branding;
            }
            if changed {
                settings.updated_at = Utc::now();
                let bytes = serde_json::to_vec(&settings)?;
                table.insert(slug, bytes.as_slice())?;
            }
            settings
        };
        write_txn.commit()?;
        Ok(settings)
    }
}
