//! # Domain Model
//!
//! This module defines the data carried through every layer: [`Record`], [`Feature`],
//! [`SyncMode`], [`FileInfo`] and [`PickedRemote`].
//!
//! ## Records
//!
//! A record is one list entry. It is an opaque bag of six strings:
//!
//! ```text
//! id, name, quantity, store, price, addedBy
//! ```
//!
//! - `id` is the sole identity key. It is assigned once (UUID v4) and never regenerated.
//! - `name` is required and must be non-empty after trimming.
//! - `quantity` is free-form and defaults to `"1"`.
//! - `price` is free-form at write time. It is only interpreted when aggregating, where
//!   both `3.50` and `3,50` are accepted (see [`parse_price`]).
//!
//! There is no partial update path. An edit is a remove followed by an add.
//!
//! ## Features
//!
//! A feature is a named logical list. Each feature owns its own file, its own storage
//! location mapping, its own sync mode and (optionally) a remote mirror handle.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{CartError, Result};

pub const DEFAULT_QUANTITY: &str = "1";

/// Name of a logical list (e.g. `shopping_list`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Feature(String);

impl Feature {
    pub const SHOPPING_LIST: &'static str = "shopping_list";

    /// Wraps a trusted name as is. Use [`Feature::parse`] for user input.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Validates a user-supplied name. The name becomes a file name and a settings key, so
    /// it must be non-blank and must not contain path separators or `..`.
    pub fn parse(name: &str) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CartError::InvalidFeature("name is empty".to_string()));
        }
        if name.contains(['/', '\\']) || name.contains("..") || name.chars().any(char::is_control)
        {
            return Err(CartError::InvalidFeature(format!(
                "{name:?} must be a plain name"
            )));
        }
        Ok(Self(name.to_string()))
    }

    pub fn shopping_list() -> Self {
        Self::new(Self::SHOPPING_LIST)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name used for this feature's CSV file.
    pub fn file_name(&self) -> String {
        format!("{}.csv", self.0)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Feature {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub name: String,
    pub quantity: String,
    pub store: String,
    pub price: String,
    pub added_by: String,
}

impl Record {
    /// Creates a record with a fresh id and the default quantity.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            quantity: DEFAULT_QUANTITY.to_string(),
            store: String::new(),
            price: String::new(),
            added_by: String::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the quantity. A blank quantity falls back to the default.
    pub fn quantity(mut self, quantity: impl Into<String>) -> Self {
        let quantity = quantity.into();
        self.quantity = if quantity.trim().is_empty() {
            DEFAULT_QUANTITY.to_string()
        } else {
            quantity
        };
        self
    }

    pub fn store(mut self, store: impl Into<String>) -> Self {
        self.store = store.into();
        self
    }

    pub fn price(mut self, price: impl Into<String>) -> Self {
        self.price = price.into();
        self
    }

    pub fn added_by(mut self, added_by: impl Into<String>) -> Self {
        self.added_by = added_by.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(CartError::InvalidRecord("id must not be empty".to_string()));
        }
        if self.name.trim().is_empty() {
            return Err(CartError::InvalidRecord(
                "name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn parsed_price(&self) -> Option<f64> {
        parse_price(&self.price)
    }
}

/// Parses a free-form price, accepting either `,` or `.` as decimal separator.
///
/// Returns `None` for blank or unparseable input.
pub fn parse_price(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.replace(',', ".").parse::<f64>().ok()
}

/// Sums all parseable prices. Records without a usable price are skipped.
pub fn total_price(records: &[Record]) -> f64 {
    records.iter().filter_map(Record::parsed_price).sum()
}

/// Whether a feature's file is mirrored to a remote handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    #[default]
    Local,
    Mirrored,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Local => "local",
            SyncMode::Mirrored => "mirrored",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw {
            "mirrored" => SyncMode::Mirrored,
            _ => SyncMode::Local,
        }
    }
}

/// Summary of a feature's backing file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub exists: bool,
    pub size_bytes: u64,
    pub item_count: usize,
    pub path: String,
}

/// What the remote file picker hands back on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickedRemote {
    pub uri: String,
    pub display_name: String,
}

impl PickedRemote {
    pub fn new(uri: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            display_name: display_name.into(),
        }
    }
}
