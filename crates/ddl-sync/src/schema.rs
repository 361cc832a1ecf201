//! Schema representation types.
//!
//! The same descriptor types describe both sides of a synchronization: the
//! collections an application declares and the columns introspection reads
//! back from a live database.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;

use crate::dialect::DialectKind;
use crate::error::{Result, SyncError};
use crate::literal::{Generator, Literal};

/// Abstract column types understood by every dialect.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// Integer or floating point number.
    Number,
    /// Character data.
    Text,
    /// True/false flag.
    Boolean,
    /// Calendar date, optionally with time of day.
    Date,
    /// Raw bytes.
    Binary,
    /// One of a fixed set of string labels.
    Enum,
    /// Auto-incrementing integer key.
    Serial,
    /// Geometric point.
    Point,
    /// UUID.
    Uuid,
    /// JSON document.
    Json,
    /// Opaque serialized object, stored as bytes.
    Object,
    /// Type registered at runtime through [`CustomType`].
    Custom(String),
}

impl ColumnType {
    /// Returns the lower-case name of this type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Number => "number",
            Self::Text => "text",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Binary => "binary",
            Self::Enum => "enum",
            Self::Serial => "serial",
            Self::Point => "point",
            Self::Uuid => "uuid",
            Self::Json => "json",
            Self::Object => "object",
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "number" => Self::Number,
            "text" => Self::Text,
            "boolean" => Self::Boolean,
            "date" => Self::Date,
            "binary" => Self::Binary,
            "enum" => Self::Enum,
            "serial" => Self::Serial,
            "point" => Self::Point,
            "uuid" => Self::Uuid,
            "json" => Self::Json,
            "object" => Self::Object,
            other => Self::Custom(other.to_string()),
        })
    }
}

/// Membership of a column in a declared index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexMembership {
    /// The column gets an index of its own, named `<column>_unique` or
    /// `<column>_index`.
    Anonymous,
    /// The column joins the named index, in declaration order.
    Named(String),
}

/// Description of a single column.
///
/// Declared descriptors are built with the constructor functions and the
/// `#[must_use]` modifiers below; introspected descriptors are filled in by
/// the dialect adapters.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    /// Abstract type.
    pub column_type: ColumnType,
    /// Floating point rather than integer (numbers only).
    pub rational: bool,
    /// Size in bytes for numbers, length for text.
    pub size: Option<u32>,
    /// Large variant (LONGTEXT, LONGBLOB).
    pub big: bool,
    /// Dates carry a time of day.
    pub time: bool,
    /// NOT NULL.
    pub required: bool,
    /// Part of the primary key.
    pub primary: bool,
    /// Default value.
    pub default_value: Option<Literal>,
    /// Enum labels, in order.
    pub values: Vec<String>,
    /// Unique indexes this column belongs to.
    pub unique: Vec<IndexMembership>,
    /// Non-unique indexes this column belongs to.
    pub index: Vec<IndexMembership>,
}

impl ColumnDescriptor {
    /// Creates a descriptor of the given type with every modifier unset.
    #[must_use]
    pub fn new(column_type: ColumnType) -> Self {
        Self {
            column_type,
            rational: false,
            size: None,
            big: false,
            time: false,
            required: false,
            primary: false,
            default_value: None,
            values: Vec::new(),
            unique: Vec::new(),
            index: Vec::new(),
        }
    }

    /// A number column.
    #[must_use]
    pub fn number() -> Self {
        Self::new(ColumnType::Number)
    }

    /// A text column.
    #[must_use]
    pub fn text() -> Self {
        Self::new(ColumnType::Text)
    }

    /// A boolean column.
    #[must_use]
    pub fn boolean() -> Self {
        Self::new(ColumnType::Boolean)
    }

    /// A date column.
    #[must_use]
    pub fn date() -> Self {
        Self::new(ColumnType::Date)
    }

    /// A binary column.
    #[must_use]
    pub fn binary() -> Self {
        Self::new(ColumnType::Binary)
    }

    /// An enum column with the given labels.
    #[must_use]
    pub fn enumeration<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut column = Self::new(ColumnType::Enum);
        column.values = values.into_iter().map(Into::into).collect();
        column
    }

    /// An auto-incrementing key column. Implies primary and required.
    #[must_use]
    pub fn serial() -> Self {
        Self::new(ColumnType::Serial).normalized()
    }

    /// A point column.
    #[must_use]
    pub fn point() -> Self {
        Self::new(ColumnType::Point)
    }

    /// A UUID column.
    #[must_use]
    pub fn uuid() -> Self {
        Self::new(ColumnType::Uuid)
    }

    /// A JSON column.
    #[must_use]
    pub fn json() -> Self {
        Self::new(ColumnType::Json)
    }

    /// A serialized object column.
    #[must_use]
    pub fn object() -> Self {
        Self::new(ColumnType::Object)
    }

    /// A column of a type registered with
    /// [`Synchronizer::define_type`](crate::sync::Synchronizer::define_type).
    #[must_use]
    pub fn custom(name: impl Into<String>) -> Self {
        Self::new(ColumnType::Custom(name.into()))
    }

    /// Marks a number as floating point.
    #[must_use]
    pub fn rational(mut self) -> Self {
        self.rational = true;
        self
    }

    /// Sets the size.
    #[must_use]
    pub fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    /// Selects the large variant.
    #[must_use]
    pub fn big(mut self) -> Self {
        self.big = true;
        self
    }

    /// Stores a time of day with dates.
    #[must_use]
    pub fn time(mut self) -> Self {
        self.time = true;
        self
    }

    /// Marks the column NOT NULL.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Adds the column to the primary key.
    #[must_use]
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Alias of [`primary`](Self::primary).
    #[must_use]
    pub fn key(self) -> Self {
        self.primary()
    }

    /// Turns the column into an auto-incrementing key.
    #[must_use]
    pub fn auto_increment(mut self) -> Self {
        self.column_type = ColumnType::Serial;
        self.normalized()
    }

    /// Sets the default value.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<Literal>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Sets a default rendered by the dialect at DDL time.
    #[must_use]
    pub fn default_with<F>(self, render: F) -> Self
    where
        F: Fn(&dyn crate::dialect::Dialect) -> String + Send + Sync + 'static,
    {
        self.default_value(Literal::Generated(Generator::new(render)))
    }

    /// Gives the column a unique index of its own.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique.push(IndexMembership::Anonymous);
        self
    }

    /// Adds the column to the named unique index.
    #[must_use]
    pub fn unique_in(mut self, name: impl Into<String>) -> Self {
        self.unique.push(IndexMembership::Named(name.into()));
        self
    }

    /// Gives the column a non-unique index of its own.
    #[must_use]
    pub fn index(mut self) -> Self {
        self.index.push(IndexMembership::Anonymous);
        self
    }

    /// Adds the column to the named non-unique index.
    #[must_use]
    pub fn index_in(mut self, name: impl Into<String>) -> Self {
        self.index.push(IndexMembership::Named(name.into()));
        self
    }

    /// Applies the implications of the serial type.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if matches!(self.column_type, ColumnType::Serial) {
            self.primary = true;
            self.required = true;
        }
        self
    }
}

/// Insertion-ordered column map.
#[derive(Debug, Clone, Default)]
pub struct Columns(IndexMap<String, ColumnDescriptor>);

impl Columns {
    /// Creates an empty column map.
    #[must_use]
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// Inserts a column, replacing an existing one of the same name in place.
    pub fn insert(&mut self, name: impl Into<String>, column: ColumnDescriptor) {
        self.0.insert(name.into(), column);
    }

    /// Looks a column up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.0.get(name)
    }

    /// Returns true if a column with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Iterates over columns in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnDescriptor)> {
        self.0.iter().map(|(name, column)| (name.as_str(), column))
    }

    /// Iterates over column names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Equal when the same columns appear in the same order.
impl PartialEq for Columns {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<N: Into<String>> FromIterator<(N, ColumnDescriptor)> for Columns {
    fn from_iter<T: IntoIterator<Item = (N, ColumnDescriptor)>>(iter: T) -> Self {
        let mut columns = Self::new();
        for (name, column) in iter {
            columns.insert(name, column);
        }
        columns
    }
}

/// A declared collection (table).
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionDescriptor {
    /// Table name.
    pub name: String,
    /// Columns in declaration order.
    pub columns: Columns,
}

impl CollectionDescriptor {
    /// Creates a collection without columns.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Columns::new(),
        }
    }

    /// Adds a column.
    #[must_use]
    pub fn column(mut self, name: impl Into<String>, column: ColumnDescriptor) -> Self {
        self.columns.insert(name, column.normalized());
        self
    }

    /// Names of the primary key columns, in declaration order.
    #[must_use]
    pub fn primary_key(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|(_, column)| column.primary)
            .map(|(name, _)| name.to_string())
            .collect()
    }

    /// Checks the declared columns against the descriptor rules.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidDescriptor`] for an enum without labels.
    pub fn validate(&self) -> Result<()> {
        for (name, column) in self.columns.iter() {
            if column.column_type == ColumnType::Enum && column.values.is_empty() {
                return Err(SyncError::InvalidDescriptor {
                    collection: self.name.clone(),
                    column: name.to_string(),
                    reason: "enum columns need at least one value".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// A desired index, derived from column annotations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescriptor {
    /// Index name, after the dialect's naming transform.
    pub name: String,
    /// Collection the index belongs to.
    pub collection: String,
    /// Member columns, in order.
    pub columns: Vec<String>,
    /// UNIQUE index.
    pub unique: bool,
}

/// An index as read back from the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveIndex {
    /// Member columns, in key order.
    pub columns: Vec<String>,
    /// UNIQUE index.
    pub unique: bool,
}

/// Live indexes keyed by name. Primary key indexes are never included.
pub type LiveIndexes = BTreeMap<String, LiveIndex>;

/// A column type defined by the application.
///
/// Custom types render their own column fragment and declare which abstract
/// type the database reports for them on introspection.
pub trait CustomType: Send + Sync {
    /// Column fragment placed after the column name, e.g. `DECIMAL(10,2) NOT NULL`.
    fn datastore_type(&self, column: &ColumnDescriptor, dialect: DialectKind) -> String;

    /// Abstract type introspection reports for columns of this type.
    fn stored_as(&self) -> ColumnType;
}
