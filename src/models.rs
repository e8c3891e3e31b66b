// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// Maximum addresses in each of `to`, `cc` and `bcc`.
pub const MAX_RECIPIENTS_PER_LIST: usize = 25;

static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9\-_]*$").expect("static slug pattern"));

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static email pattern"));

/// Request data the server refuses, with a stable classification code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Invalid slug. Use lowercase letters, numbers, dashes or underscores.")]
    InvalidSlug,

    #[error("{list} exceeds {MAX_RECIPIENTS_PER_LIST} addresses")]
    TooManyRecipients { list: &'static str },

    #[error("Invalid email in {list}: {email}")]
    InvalidEmail { list: &'static str, email: String },

    #[error("At least one TO recipient is required")]
    MissingRecipient,

    #[error("No valid fields to update")]
    NoUpdatableFields,
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::MissingField(_) => "missing_field",
            ValidationError::InvalidSlug => "invalid_slug",
            ValidationError::TooManyRecipients { .. } => "too_many_recipients",
            ValidationError::InvalidEmail { .. } => "invalid_email",
            ValidationError::MissingRecipient => "missing_recipient",
            ValidationError::NoUpdatableFields => "no_updatable_fields",
        }
    }
}

// =============================================================================
// Loose JSON coercion
// =============================================================================

/// Scalar value as text. Null and structured values have no text form.
fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// First present, non-null key wins.
fn first_text(row: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| row.get(*key))
        .find(|value| !value.is_null())
        .and_then(text_of)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => s.trim().parse::<f64>().is_ok_and(|f| f != 0.0),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Flag as stored: `None` when absent or null, otherwise 0 or 1.
pub fn flag_or_none(value: Option<&Value>) -> Option<u8> {
    match value {
        None | Some(Value::Null) => None,
        Some(value) => Some(u8::from(truthy(value))),
    }
}

/// Flag for writing: absent and null become 0.
pub fn flag01(value: Option<&Value>) -> u8 {
    value.map_or(0, |value| u8::from(truthy(value)))
}

// =============================================================================
// Themes
// =============================================================================

/// Canonical branding record for one tenant slug.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub struct ThemeRecord {
    pub slug: String,
    pub brand_name: Option<String>,
    pub logo: Option<String>,
    pub status: Option<String>,
    pub color_primary: Option<String>,
    pub color_accent: Option<String>,
    pub color_text: Option<String>,
    pub color_muted: Option<String>,
    pub color_border: Option<String>,
    pub color_button_text: Option<String>,
    pub header_bg: Option<String>,
    pub notes_internal: Option<String>,
    /// Legacy single contact address, used to seed notification recipients
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// RFC 3339 timestamp of the last write
    pub updated_at: Option<String>,
    pub issue_report: Option<u8>,
    pub driver_copy: Option<u8>,
    pub gps_check: Option<u8>,
    pub mail_notification: Option<u8>,
    pub multi_file: Option<u8>,
}

impl ThemeRecord {
    /// Map any stored row shape onto the canonical record.
    ///
    /// Older rows use `id`/`slug_id`, `name`/`display_name`, `logo_path`,
    /// `primary_color` and `secondary_color`. Rows without any slug key are
    /// unusable and yield `None`.
    pub fn normalize(row: &Map<String, Value>) -> Option<ThemeRecord> {
        let slug = first_text(row, &["slug", "id", "slug_id"])?;
        Some(ThemeRecord {
            slug,
            brand_name: first_text(row, &["brand_name", "name", "display_name"]),
            logo: first_text(row, &["logo", "logo_path"]),
            status: first_text(row, &["status"]),
            color_primary: first_text(row, &["color_primary", "primary_color"]),
            color_accent: first_text(row, &["color_accent", "secondary_color"]),
            color_text: first_text(row, &["color_text"]),
            color_muted: first_text(row, &["color_muted"]),
            color_border: first_text(row, &["color_border"]),
            color_button_text: first_text(row, &["color_button_text"]),
            header_bg: first_text(row, &["header_bg"]),
            notes_internal: first_text(row, &["notes_internal"]),
            email: first_text(row, &["email"]),
            updated_at: first_text(row, &["updated_at"]),
            issue_report: flag_or_none(row.get("issue_report")),
            driver_copy: flag_or_none(row.get("driver_copy")),
            gps_check: flag_or_none(row.get("gps_check")),
            mail_notification: flag_or_none(row.get("mail_notification")),
            multi_file: flag_or_none(row.get("multi_file")),
        })
    }

    /// Build a full record from an upsert body.
    ///
    /// The slug is trimmed and lowercased before validation. Missing flags
    /// are written as 0.
    pub fn from_upsert_body(body: &Map<String, Value>) -> Result<ThemeRecord, ValidationError> {
        let slug = first_text(body, &["slug"])
            .map(|s| s.trim().to_lowercase())
            .unwrap_or_default();
        if slug.is_empty() {
            return Err(ValidationError::MissingField("Slug"));
        }
        if !SLUG_RE.is_match(&slug) {
            return Err(ValidationError::InvalidSlug);
        }

        Ok(ThemeRecord {
            slug,
            brand_name: first_text(body, &["brand_name"]),
            logo: first_text(body, &["logo"]),
            status: first_text(body, &["status"]),
            color_primary: first_text(body, &["color_primary"]),
            color_accent: first_text(body, &["color_accent"]),
            color_text: first_text(body, &["color_text"]),
            color_muted: first_text(body, &["color_muted"]),
            color_border: first_text(body, &["color_border"]),
            color_button_text: first_text(body, &["color_button_text"]),
            header_bg: first_text(body, &["header_bg"]),
            notes_internal: first_text(body, &["notes_internal"]),
            email: first_text(body, &["email"]),
            updated_at: None,
            issue_report: Some(flag01(body.get("issue_report"))),
            driver_copy: Some(flag01(body.get("driver_copy"))),
            gps_check: Some(flag01(body.get("gps_check"))),
            mail_notification: Some(flag01(body.get("mail_notification"))),
            multi_file: Some(flag01(body.get("multi_file"))),
        })
    }
}

/// Partial theme update. Only present, non-null fields are written.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, ToSchema)]
pub struct ThemeUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_primary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_accent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_muted: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_border: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_button_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_bg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes_internal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_report: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_copy: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps_check: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mail_notification: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multi_file: Option<u8>,
}

impl ThemeUpdate {
    /// Pick the updatable columns out of a request body. Legacy names
    /// (`name`, `logo_path`, `primary_color`, `secondary_color`) are accepted.
    pub fn from_body(body: &Map<String, Value>) -> ThemeUpdate {
        ThemeUpdate {
            brand_name: first_text(body, &["brand_name", "name"]),
            logo: first_text(body, &["logo", "logo_path"]),
            status: first_text(body, &["status"]),
            color_primary: first_text(body, &["color_primary", "primary_color"]),
            color_accent: first_text(body, &["color_accent", "secondary_color"]),
            color_text: first_text(body, &["color_text"]),
            color_muted: first_text(body, &["color_muted"]),
            color_border: first_text(body, &["color_border"]),
            color_button_text: first_text(body, &["color_button_text"]),
            header_bg: first_text(body, &["header_bg"]),
            notes_internal: first_text(body, &["notes_internal"]),
            issue_report: flag_or_none(body.get("issue_report")),
            driver_copy: flag_or_none(body.get("driver_copy")),
            gps_check: flag_or_none(body.get("gps_check")),
            mail_notification: flag_or_none(body.get("mail_notification")),
            multi_file: flag_or_none(body.get("multi_file")),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == ThemeUpdate::default()
    }

    /// Overlay the present fields onto `record`.
    pub fn apply(&self, record: &mut ThemeRecord) {
        fn set<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
            if value.is_some() {
                slot.clone_from(value);
            }
        }

        set(&mut record.brand_name, &self.brand_name);
        set(&mut record.logo, &self.logo);
        set(&mut record.status, &self.status);
        set(&mut record.color_primary, &self.color_primary);
        set(&mut record.color_accent, &self.color_accent);
        set(&mut record.color_text, &self.color_text);
        set(&mut record.color_muted, &self.color_muted);
        set(&mut record.color_border, &self.color_border);
        set(&mut record.color_button_text, &self.color_button_text);
        set(&mut record.header_bg, &self.header_bg);
        set(&mut record.notes_internal, &self.notes_internal);
        set(&mut record.issue_report, &self.issue_report);
        set(&mut record.driver_copy, &self.driver_copy);
        set(&mut record.gps_check, &self.gps_check);
        set(&mut record.mail_notification, &self.mail_notification);
        set(&mut record.multi_file, &self.multi_file);
    }
}

/// Branding payload served to tenant front-ends without authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicTheme {
    pub brand_name: Option<String>,
    pub logo: Option<String>,
    pub colors: PublicColors,
    pub header: PublicHeader,
    pub status: Option<String>,
    pub flags: PublicFlags,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicColors {
    pub primary: Option<String>,
    pub accent: Option<String>,
    pub text: Option<String>,
    pub muted: Option<String>,
    pub border: Option<String>,
    pub button_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PublicHeader {
    pub bg: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PublicFlags {
    pub gps_check: bool,
    pub driver_copy: bool,
    pub issue_report: bool,
    pub mail_notification: bool,
    pub multi_file: bool,
}

impl From<ThemeRecord> for PublicTheme {
    fn from(theme: ThemeRecord) -> Self {
        let on = |flag: Option<u8>| flag.unwrap_or(0) != 0;
        PublicTheme {
            brand_name: theme.brand_name,
            logo: theme.logo,
            colors: PublicColors {
                primary: theme.color_primary,
                accent: theme.color_accent,
                text: theme.color_text,
                muted: theme.color_muted,
                border: theme.color_border,
                button_text: theme.color_button_text,
            },
            header: PublicHeader { bg: theme.header_bg },
            status: theme.status,
            flags: PublicFlags {
                gps_check: on(theme.gps_check),
                driver_copy: on(theme.driver_copy),
                issue_report: on(theme.issue_report),
                mail_notification: on(theme.mail_notification),
                multi_file: on(theme.multi_file),
            },
        }
    }
}

// =============================================================================
// Per-slug settings
// =============================================================================

/// Notification recipients for one slug.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub struct Recipients {
    #[serde(default)]
    pub to: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
}

impl Recipients {
    /// Read recipient lists leniently: non-array lists become empty, entries
    /// are trimmed and blanks dropped.
    pub fn from_value(value: Option<&Value>) -> Recipients {
        let list = |key: &str| -> Vec<String> {
            match value.and_then(|v| v.get(key)) {
                Some(Value::Array(items)) => items
                    .iter()
                    .filter(|item| !matches!(item, Value::Bool(false)))
                    .filter(|item| item.as_f64() != Some(0.0))
                    .filter_map(text_of)
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                _ => Vec::new(),
            }
        };
        Recipients {
            to: list("to"),
            cc: list("cc"),
            bcc: list("bcc"),
        }
    }

    /// Enforce list sizes and address shape. `require_to` additionally
    /// demands at least one primary recipient.
    pub fn validate(&self, require_to: bool) -> Result<(), ValidationError> {
        for (label, key, list) in [("TO", "to", &self.to), ("CC", "cc", &self.cc), ("BCC", "bcc", &self.bcc)] {
            if list.len() > MAX_RECIPIENTS_PER_LIST {
                return Err(ValidationError::TooManyRecipients { list: label });
            }
            if let Some(bad) = list.iter().find(|email| !EMAIL_RE.is_match(email)) {
                return Err(ValidationError::InvalidEmail {
                    list: key,
                    email: bad.clone(),
                });
            }
        }
        if require_to && self.to.is_empty() {
            return Err(ValidationError::MissingRecipient);
        }
        Ok(())
    }
}

/// Branding overrides for one slug.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub struct Branding {
    #[serde(default)]
    pub logo_url: Option<String>,
}

impl Branding {
    /// Only a string `logo_url` is kept (trimmed); anything else clears it.
    pub fn from_value(value: Option<&Value>) -> Branding {
        let logo_url = match value.and_then(|v| v.get("logo_url")) {
            Some(Value::String(s)) => Some(s.trim().to_string()),
            _ => None,
        };
        Branding { logo_url }
    }
}

/// Stored settings for one slug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SlugSettings {
    pub email_recipients: Recipients,
    pub branding: Branding,
    pub updated_at: DateTime<Utc>,
}

impl SlugSettings {
    pub fn empty() -> SlugSettings {
        SlugSettings::with_recipients(Recipients::default())
    }

    pub fn with_recipients(email_recipients: Recipients) -> SlugSettings {
        SlugSettings {
            email_recipients,
            branding: Branding::default(),
            updated_at: Utc::now(),
        }
    }
}
