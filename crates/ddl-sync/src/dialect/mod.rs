//! Dialect adapters.
//!
//! A dialect knows three things about its database: how to read the live
//! schema back (introspection), how to spell abstract column types and
//! literals, and how to run each DDL operation. The synchronizer only ever
//! talks to a `Box<dyn Dialect>` selected through [`DialectKind`].

pub mod mysql;
pub mod postgres;
pub mod sqlite;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;

use crate::ddl;
use crate::driver::Driver;
use crate::error::{Result, SyncError};
use crate::literal::{Literal, TimeZone};
use crate::schema::{
    CollectionDescriptor, ColumnDescriptor, ColumnType, Columns, IndexDescriptor, LiveIndexes,
};

pub use mysql::MysqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

/// The supported databases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialectKind {
    /// MySQL and MariaDB.
    Mysql,
    /// PostgreSQL.
    Postgres,
    /// SQLite 3.
    Sqlite,
}

impl DialectKind {
    /// Canonical lower-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mysql => "mysql",
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
        }
    }

    /// Builds the adapter for this database.
    #[must_use]
    pub fn dialect(self, time_zone: TimeZone) -> Box<dyn Dialect> {
        match self {
            Self::Mysql => Box::new(MysqlDialect::new(time_zone)),
            Self::Postgres => Box::new(PostgresDialect::new(time_zone)),
            Self::Sqlite => Box::new(SqliteDialect::new(time_zone)),
        }
    }

    /// Infers the dialect from a database URL scheme.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::UnsupportedDialect`] for unknown schemes.
    pub fn from_url(url: &str) -> Result<Self> {
        let scheme = url.split_once(':').map_or(url, |(scheme, _)| scheme);
        scheme.parse()
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DialectKind {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Self::Mysql),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            _ => Err(SyncError::UnsupportedDialect(s.to_string())),
        }
    }
}

/// Work a dialect must do before a column definition can be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreStep {
    /// A named enum type with exactly these labels must exist.
    EnumType {
        /// Type name.
        name: String,
        /// Labels, in order.
        values: Vec<String>,
    },
}

/// Where a new column goes, for dialects that can place columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnPosition {
    /// Before every other column.
    First,
    /// Right after the named column.
    After(String),
}

/// A column type rendered for one dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedType {
    /// Native type, e.g. `VARCHAR(255)`.
    pub native: String,
    /// Emit NOT NULL.
    pub not_null: bool,
    /// Constraints following NOT NULL, e.g. `AUTO_INCREMENT`.
    pub constraints: Vec<String>,
    /// Escaped default value.
    pub default: Option<String>,
    /// Work needed before this definition is used.
    pub pre_step: Option<PreStep>,
}

impl MappedType {
    /// A bare native type.
    #[must_use]
    pub fn new(native: impl Into<String>) -> Self {
        Self {
            native: native.into(),
            not_null: false,
            constraints: Vec::new(),
            default: None,
            pre_step: None,
        }
    }

    /// Sets NOT NULL.
    #[must_use]
    pub const fn not_null(mut self, not_null: bool) -> Self {
        self.not_null = not_null;
        self
    }

    /// Appends a constraint keyword.
    #[must_use]
    pub fn constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraints.push(constraint.into());
        self
    }

    /// Sets the escaped default.
    #[must_use]
    pub fn default(mut self, default: Option<String>) -> Self {
        self.default = default;
        self
    }

    /// Attaches a pre-step.
    #[must_use]
    pub fn pre_step(mut self, step: PreStep) -> Self {
        self.pre_step = Some(step);
        self
    }

    /// Column fragment that follows the column name.
    #[must_use]
    pub fn sql(&self) -> String {
        let mut sql = self.native.clone();
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        for constraint in &self.constraints {
            sql.push(' ');
            sql.push_str(constraint);
        }
        if let Some(default) = &self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        sql
    }
}

/// A database-specific adapter.
#[async_trait]
pub trait Dialect: Send + Sync {
    /// Which database this adapter speaks to.
    fn kind(&self) -> DialectKind;

    /// Quotes an identifier. Several parts are joined with `.`.
    fn escape_identifier(&self, parts: &[&str]) -> String;

    /// Renders a literal. `time_zone` overrides the adapter's configured zone.
    fn escape_literal(&self, value: &Literal, time_zone: Option<&TimeZone>) -> String;

    /// Renders a declared column, or `None` when the type cannot be expressed.
    fn map_type(
        &self,
        collection: &str,
        column_name: &str,
        column: &ColumnDescriptor,
    ) -> Option<MappedType>;

    /// The type introspection reports for a declared type.
    fn supports_type(&self, column_type: &ColumnType) -> ColumnType {
        column_type.clone()
    }

    /// Text introspection reports for a declared constant default, when the
    /// database keeps it in a canonical form of its own. `None` leaves the
    /// comparison to [`Literal::matches_live`].
    fn catalog_default(&self, _column: &ColumnDescriptor, _value: &Literal) -> Option<String> {
        None
    }

    /// Primary key columns to emit as a table-level constraint.
    fn check_primary(&self, _collection: &CollectionDescriptor, primary: Vec<String>) -> Vec<String> {
        primary
    }

    /// Physical name of a declared index.
    fn index_name(&self, _collection: &str, name: &str) -> String {
        name.to_string()
    }

    /// Current timestamp expression.
    fn now(&self) -> &'static str {
        "CURRENT_TIMESTAMP"
    }

    /// Whether columns can be dropped.
    fn supports_drop_column(&self) -> bool {
        true
    }

    /// Whether column definitions can be changed in place.
    fn supports_modify_column(&self) -> bool {
        true
    }

    /// Whether new columns can be placed with `FIRST`/`AFTER`.
    fn supports_column_position(&self) -> bool {
        false
    }

    /// Returns true if the collection exists.
    async fn has_collection(&self, db: &dyn Driver, name: &str) -> Result<bool>;

    /// Reads the live columns of a collection.
    async fn introspect_columns(&self, db: &dyn Driver, collection: &str) -> Result<Columns>;

    /// Reads the live secondary indexes of a collection.
    async fn introspect_indexes(&self, db: &dyn Driver, collection: &str) -> Result<LiveIndexes>;

    /// Executes a pre-step.
    async fn run_pre_step(&self, _db: &dyn Driver, _step: &PreStep) -> Result<()> {
        Ok(())
    }

    /// Creates a collection from rendered column definitions.
    async fn create_collection(
        &self,
        db: &dyn Driver,
        name: &str,
        columns: &[String],
        primary: &[String],
    ) -> Result<()> {
        execute(db, &ddl::create_table(self, name, columns, primary)).await
    }

    /// Drops a collection.
    async fn drop_collection(&self, db: &dyn Driver, name: &str) -> Result<()> {
        execute(db, &ddl::drop_table(self, name)).await
    }

    /// Adds a column.
    async fn add_column(
        &self,
        db: &dyn Driver,
        collection: &str,
        name: &str,
        definition: &MappedType,
        position: Option<&ColumnPosition>,
    ) -> Result<()> {
        let column = ddl::column_definition(self, name, definition);
        execute(db, &ddl::add_column(self, collection, &column, position)).await
    }

    /// Changes a column definition in place.
    async fn modify_column(
        &self,
        db: &dyn Driver,
        collection: &str,
        name: &str,
        definition: &MappedType,
    ) -> Result<()> {
        let column = ddl::column_definition(self, name, definition);
        execute(db, &ddl::modify_column(self, collection, &column)).await
    }

    /// Drops a column.
    async fn drop_column(&self, db: &dyn Driver, collection: &str, name: &str) -> Result<()> {
        execute(db, &ddl::drop_column(self, collection, name)).await
    }

    /// Creates an index.
    async fn add_index(&self, db: &dyn Driver, index: &IndexDescriptor) -> Result<()> {
        execute(
            db,
            &ddl::create_index(self, &index.name, &index.collection, &index.columns, index.unique),
        )
        .await
    }

    /// Drops an index.
    async fn drop_index(&self, db: &dyn Driver, _collection: &str, name: &str) -> Result<()> {
        execute(db, &ddl::drop_index(self, name, None, false)).await
    }
}

/// Runs a statement without parameters.
pub(crate) async fn execute(db: &dyn Driver, sql: &str) -> Result<()> {
    db.execute(sql, &[]).await?;
    Ok(())
}

/// Renders a declared default with the adapter's escaping.
pub(crate) fn default_of<D: Dialect + ?Sized>(dialect: &D, column: &ColumnDescriptor) -> Option<String> {
    column
        .default_value
        .as_ref()
        .map(|value| dialect.escape_literal(value, None))
}

/// Splits `name(args)` into the name and the text between the outer parentheses.
pub(crate) fn split_arguments(native: &str) -> (&str, Option<&str>) {
    match (native.find('('), native.rfind(')')) {
        (Some(open), Some(close)) if close > open => {
            (native[..open].trim(), Some(&native[open + 1..close]))
        }
        _ => (native.trim(), None),
    }
}

/// Parses a quoted, comma-separated label list such as `'a','b'`.
pub(crate) fn parse_quoted_list(list: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut chars = list.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\'' {
            continue;
        }
        let mut value = String::new();
        while let Some(c) = chars.next() {
            match c {
                '\'' if chars.peek() == Some(&'\'') => {
                    chars.next();
                    value.push('\'');
                }
                '\'' => break,
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        value.push(escaped);
                    }
                }
                _ => value.push(c),
            }
        }
        values.push(value);
    }
    values
}

/// Strips one pair of surrounding single quotes, undoubling inner quotes.
pub(crate) fn unquote(value: &str) -> String {
    value
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
        .map_or_else(|| value.to_string(), |inner| inner.replace("''", "'"))
}
