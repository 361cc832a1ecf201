//! Column differ.
//!
//! Compares a declared collection against its introspected columns and
//! decides which columns to add, modify and drop. Adds and modifications come
//! out in declaration order, drops last.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::dialect::{Dialect, MappedType, PreStep};
use crate::error::{Result, SyncError};
use crate::schema::{CollectionDescriptor, ColumnDescriptor, ColumnType, Columns, CustomType};

/// Registered custom types, by name.
pub type CustomTypes = BTreeMap<String, Arc<dyn CustomType>>;

// ================================================================
// Public types
// ================================================================

/// A column operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnChange {
    /// Column missing from the database.
    Add {
        /// Column name.
        column: String,
        /// Rendered definition.
        definition: MappedType,
        /// Declared predecessor, `None` for the first column.
        after: Option<String>,
    },
    /// Column present with a different shape.
    Modify {
        /// Column name.
        column: String,
        /// Rendered target definition.
        definition: MappedType,
    },
    /// Column present in the database but no longer declared.
    Drop {
        /// Column name.
        column: String,
    },
}

impl ColumnChange {
    /// The column this change targets.
    #[must_use]
    pub fn column(&self) -> &str {
        match self {
            Self::Add { column, .. } | Self::Modify { column, .. } | Self::Drop { column } => {
                column
            }
        }
    }

    /// Work that must happen before this change.
    #[must_use]
    pub const fn pre_step(&self) -> Option<&PreStep> {
        match self {
            Self::Add { definition, .. } | Self::Modify { definition, .. } => {
                definition.pre_step.as_ref()
            }
            Self::Drop { .. } => None,
        }
    }
}

// ================================================================
// Type resolution
// ================================================================

/// Renders a declared column, consulting custom types first.
///
/// # Errors
///
/// Returns [`SyncError::UnmappableType`] when neither the dialect nor a
/// registered custom type can render the column.
pub fn map_column(
    dialect: &dyn Dialect,
    types: &CustomTypes,
    collection: &str,
    name: &str,
    column: &ColumnDescriptor,
) -> Result<MappedType> {
    let mapped = match &column.column_type {
        ColumnType::Custom(type_name) => types
            .get(type_name)
            .map(|custom| MappedType::new(custom.datastore_type(column, dialect.kind()))),
        _ => dialect.map_type(collection, name, column),
    };
    mapped.ok_or_else(|| SyncError::UnmappableType {
        collection: collection.to_string(),
        column: name.to_string(),
        column_type: column.column_type.to_string(),
    })
}

/// The abstract type a declared column is compared as.
fn comparable_type(types: &CustomTypes, column: &ColumnDescriptor) -> ColumnType {
    match &column.column_type {
        ColumnType::Custom(name) => types
            .get(name)
            .map_or_else(|| column.column_type.clone(), |custom| custom.stored_as()),
        other => other.clone(),
    }
}

fn symmetric_difference_is_empty(left: &[String], right: &[String]) -> bool {
    left.iter().all(|value| right.contains(value)) && right.iter().all(|value| left.contains(value))
}

// ================================================================
// Differ
// ================================================================

/// Returns true if a live column must be modified to match its declaration.
#[must_use]
pub fn needs_sync(
    dialect: &dyn Dialect,
    types: &CustomTypes,
    desired: &ColumnDescriptor,
    live: &ColumnDescriptor,
) -> bool {
    let desired_type = comparable_type(types, desired);
    if desired_type != live.column_type && dialect.supports_type(&desired_type) != live.column_type
    {
        return true;
    }

    // Serial columns keep the shape they were created with.
    if desired_type == ColumnType::Serial {
        return false;
    }

    if desired.required != live.required && !desired.primary {
        return true;
    }

    if let Some(default) = &desired.default_value {
        if !default.matches_live(live.default_value.as_ref(), desired, dialect) {
            return true;
        }
    }

    if desired_type == ColumnType::Number {
        if let Some(live_size) = live.size {
            if desired.size.unwrap_or(4) != live_size {
                return true;
            }
        }
        if desired.rational != live.rational {
            return true;
        }
    }

    if desired_type == ColumnType::Enum
        && live.column_type == ColumnType::Enum
        && !symmetric_difference_is_empty(&desired.values, &live.values)
    {
        return true;
    }

    false
}

/// Computes the column operations that converge `live` onto `collection`.
///
/// Every declared column is rendered up front, so an unmappable column fails
/// before any operation is returned.
///
/// # Errors
///
/// Returns [`SyncError::UnmappableType`] for a column the dialect cannot render.
pub fn diff_columns(
    dialect: &dyn Dialect,
    types: &CustomTypes,
    collection: &CollectionDescriptor,
    live: &Columns,
) -> Result<Vec<ColumnChange>> {
    let mut changes = Vec::new();
    let mut previous: Option<&str> = None;

    for (name, desired) in collection.columns.iter() {
        let definition = map_column(dialect, types, &collection.name, name, desired)?;
        match live.get(name) {
            None => changes.push(ColumnChange::Add {
                column: name.to_string(),
                definition,
                after: previous.map(str::to_string),
            }),
            Some(current) if needs_sync(dialect, types, desired, current) => {
                changes.push(ColumnChange::Modify {
                    column: name.to_string(),
                    definition,
                });
            }
            Some(_) => {}
        }
        previous = Some(name);
    }

    for name in live.names() {
        if !collection.columns.contains(name) {
            changes.push(ColumnChange::Drop {
                column: name.to_string(),
            });
        }
    }

    Ok(changes)
}
