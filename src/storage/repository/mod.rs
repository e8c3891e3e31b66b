// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to the admin database.

pub mod settings;
pub mod themes;
pub mod users;

pub use settings::SettingsRepository;
pub use themes::ThemeRepository;
pub use users::{normalize_email, UserRecord, UserRepository};
