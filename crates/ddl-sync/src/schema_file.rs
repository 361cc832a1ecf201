//! JSON schema files.
//!
//! ```json
//! {
//!   "collections": [
//!     {
//!       "name": "users",
//!       "columns": [
//!         { "name": "id", "type": "serial" },
//!         { "name": "email", "type": "text", "required": true, "unique": true },
//!         { "name": "first", "type": "text", "index": "full_name" },
//!         { "name": "last", "type": "text", "index": ["full_name", true] }
//!       ]
//!     }
//!   ]
//! }
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::literal::Literal;
use crate::schema::{CollectionDescriptor, ColumnDescriptor, ColumnType, IndexMembership};

/// A schema file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaFile {
    /// Collections, in synchronization order.
    pub collections: Vec<CollectionSpec>,
}

/// One collection in a schema file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSpec {
    /// Table name.
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnSpec>,
}

/// One column in a schema file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSpec {
    /// Column name.
    pub name: String,
    /// Abstract type name; unknown names refer to custom types.
    #[serde(rename = "type")]
    pub column_type: String,
    /// Floating point numbers.
    #[serde(default)]
    pub rational: bool,
    /// Byte width of numbers, character length of text.
    #[serde(default)]
    pub size: Option<u32>,
    /// Large text or binary storage.
    #[serde(default)]
    pub big: bool,
    /// Dates carry a time of day.
    #[serde(default)]
    pub time: bool,
    /// NOT NULL.
    #[serde(default)]
    pub required: bool,
    /// Part of the primary key.
    #[serde(default)]
    pub primary: bool,
    /// Alias for `primary`.
    #[serde(default)]
    pub key: bool,
    /// Auto-incrementing; implies `primary` and `required`.
    #[serde(default)]
    pub serial: bool,
    /// Default value; `null` means no default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
    /// Enum labels.
    #[serde(default)]
    pub values: Vec<String>,
    /// Unique index memberships.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique: Option<IndexSpec>,
    /// Plain index memberships.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<IndexSpec>,
}

/// An index annotation: `true`, a name, or a list of either.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndexSpec {
    /// `true` for an index of its own.
    Flag(bool),
    /// Membership in a named index.
    Name(String),
    /// Several memberships.
    List(Vec<IndexSpec>),
}

impl IndexSpec {
    fn memberships(&self) -> Vec<IndexMembership> {
        match self {
            Self::Flag(true) => vec![IndexMembership::Anonymous],
            Self::Flag(false) => Vec::new(),
            Self::Name(name) => vec![IndexMembership::Named(name.clone())],
            Self::List(items) => items.iter().flat_map(Self::memberships).collect(),
        }
    }
}

impl SchemaFile {
    /// Reads and parses a schema file.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file cannot be read, or a serialization
    /// error if it is not a valid schema document.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parses a schema document.
    ///
    /// # Errors
    ///
    /// Returns a serialization error for malformed JSON.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Converts the file into collection descriptors.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidSchema`] for empty or duplicate names.
    pub fn into_collections(self) -> Result<Vec<CollectionDescriptor>> {
        let mut seen = HashSet::new();
        let mut collections = Vec::with_capacity(self.collections.len());

        for spec in self.collections {
            if spec.name.is_empty() {
                return Err(SyncError::InvalidSchema(
                    "collection without a name".to_string(),
                ));
            }
            if !seen.insert(spec.name.clone()) {
                return Err(SyncError::InvalidSchema(format!(
                    "collection '{}' is declared twice",
                    spec.name
                )));
            }
            collections.push(spec.into_descriptor()?);
        }

        Ok(collections)
    }
}

impl CollectionSpec {
    fn into_descriptor(self) -> Result<CollectionDescriptor> {
        let mut collection = CollectionDescriptor::new(&self.name);
        for column in self.columns {
            if column.name.is_empty() {
                return Err(SyncError::InvalidSchema(format!(
                    "column without a name in '{}'",
                    self.name
                )));
            }
            if collection.columns.contains(&column.name) {
                return Err(SyncError::InvalidSchema(format!(
                    "column '{}.{}' is declared twice",
                    self.name, column.name
                )));
            }
            let name = column.name.clone();
            collection = collection.column(name, column.into_descriptor());
        }
        Ok(collection)
    }
}

impl ColumnSpec {
    fn into_descriptor(self) -> ColumnDescriptor {
        let column_type = self
            .column_type
            .parse::<ColumnType>()
            .unwrap_or_else(|never| match never {});

        let mut column = ColumnDescriptor::new(column_type);
        column.rational = self.rational;
        column.size = self.size;
        column.big = self.big;
        column.time = self.time;
        column.required = self.required;
        column.primary = self.primary || self.key;
        column.values = self.values;
        column.default_value = self
            .default_value
            .filter(|value| !value.is_null())
            .map(Literal::from);
        column.unique = self
            .unique
            .as_ref()
            .map(IndexSpec::memberships)
            .unwrap_or_default();
        column.index = self
            .index
            .as_ref()
            .map(IndexSpec::memberships)
            .unwrap_or_default();

        if self.serial {
            column.auto_increment()
        } else {
            column
        }
    }
}
