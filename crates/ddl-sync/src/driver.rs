//! Database transport.
//!
//! The synchronizer only needs two things from a connection: run a statement,
//! and run a query returning rows. [`Driver`] is that seam. It is implemented
//! for the sqlx pools of every supported backend, and [`DryRun`] wraps any
//! driver to record DDL instead of executing it.

use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::mysql::{MySql, MySqlPool, MySqlRow};
use sqlx::postgres::{PgPool, PgRow, Postgres};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqlitePool, SqliteRow};
use sqlx::{Column as _, Database, Row as _, TypeInfo as _, ValueRef as _};
use tracing::debug;

use crate::error::Result;

/// A bound parameter or a decoded cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Floating point.
    Float(f64),
    /// Text.
    Text(String),
    /// Bytes.
    Bytes(Vec<u8>),
}

impl Value {
    /// Returns the value as text. Numbers and booleans are formatted, bytes
    /// are decoded lossily, NULL is `None`.
    #[must_use]
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Bool(flag) => Some(flag.to_string()),
            Self::Int(number) => Some(number.to_string()),
            Self::Float(number) => Some(number.to_string()),
            Self::Text(text) => Some(text.clone()),
            Self::Bytes(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        }
    }

    /// Returns the value as an integer, parsing text when needed.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Bool(flag) => Some(i64::from(*flag)),
            Self::Int(number) => Some(*number),
            Self::Text(_) | Self::Bytes(_) => self.as_text()?.trim().parse().ok(),
            Self::Null | Self::Float(_) => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// A result row with named cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Creates an empty row.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            columns: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Appends a cell.
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(column, value.into());
        self
    }

    /// Appends a cell in place.
    pub fn push(&mut self, column: impl Into<String>, value: Value) {
        self.columns.push(column.into());
        self.values.push(value);
    }

    /// Looks a cell up by column name, ignoring ASCII case.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|name| name.eq_ignore_ascii_case(column))
            .and_then(|index| self.values.get(index))
    }

    /// Cell as text; `None` when missing or NULL.
    #[must_use]
    pub fn text(&self, column: &str) -> Option<String> {
        self.get(column).and_then(Value::as_text)
    }

    /// Cell as integer; `None` when missing, NULL or not numeric.
    #[must_use]
    pub fn int(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(Value::as_int)
    }

    /// Cell as flag: non-zero integers, `true`, `t`, `yes` and `y` are true.
    #[must_use]
    pub fn flag(&self, column: &str) -> bool {
        match self.get(column) {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::Int(number)) => *number != 0,
            Some(value) => value.as_text().is_some_and(|text| {
                matches!(
                    text.trim().to_ascii_lowercase().as_str(),
                    "1" | "true" | "t" | "yes" | "y"
                )
            }),
            None => false,
        }
    }
}

/// Transport used by dialect adapters.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Executes a statement and returns the number of affected rows.
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Runs a query and returns its rows.
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;
}

fn bind_params<'q, DB>(
    mut query: Query<'q, DB, <DB as Database>::Arguments<'q>>,
    params: &'q [Value],
) -> Query<'q, DB, <DB as Database>::Arguments<'q>>
where
    DB: Database,
    bool: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
    i64: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
    f64: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
    &'q str: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
    &'q [u8]: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
    Option<&'q str>: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
{
    for param in params {
        query = match param {
            Value::Null => query.bind(None::<&str>),
            Value::Bool(flag) => query.bind(*flag),
            Value::Int(number) => query.bind(*number),
            Value::Float(number) => query.bind(*number),
            Value::Text(text) => query.bind(text.as_str()),
            Value::Bytes(bytes) => query.bind(bytes.as_slice()),
        };
    }
    query
}

fn decode_sqlite(row: &SqliteRow) -> std::result::Result<Row, sqlx::Error> {
    let mut decoded = Row::new();
    for (index, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(index)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let type_name = raw.type_info().name().to_ascii_uppercase();
            match type_name.as_str() {
                "INTEGER" | "INT" | "BIGINT" => Value::Int(row.try_get(index)?),
                "BOOLEAN" => Value::Bool(row.try_get(index)?),
                "REAL" | "FLOAT" | "DOUBLE" => Value::Float(row.try_get(index)?),
                "BLOB" => Value::Bytes(row.try_get(index)?),
                "NUMERIC" => row
                    .try_get::<i64, _>(index)
                    .map(Value::Int)
                    .or_else(|_| row.try_get::<f64, _>(index).map(Value::Float))?,
                _ => Value::Text(row.try_get(index)?),
            }
        };
        decoded.push(column.name(), value);
    }
    Ok(decoded)
}

fn decode_mysql(row: &MySqlRow) -> std::result::Result<Row, sqlx::Error> {
    let mut decoded = Row::new();
    for (index, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(index)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let type_name = raw.type_info().name().to_ascii_uppercase();
            match type_name.as_str() {
                "BOOLEAN" => Value::Bool(row.try_get(index)?),
                "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
                    Value::Int(row.try_get(index)?)
                }
                name if name.ends_with("UNSIGNED") => {
                    let number: u64 = row.try_get(index)?;
                    i64::try_from(number).map_or_else(
                        |_| Value::Text(number.to_string()),
                        Value::Int,
                    )
                }
                "FLOAT" => Value::Float(f64::from(row.try_get::<f32, _>(index)?)),
                "DOUBLE" => Value::Float(row.try_get(index)?),
                "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" => {
                    Value::Bytes(row.try_get(index)?)
                }
                _ => row
                    .try_get::<String, _>(index)
                    .map(Value::Text)
                    .or_else(|_| row.try_get::<Vec<u8>, _>(index).map(Value::Bytes))?,
            }
        };
        decoded.push(column.name(), value);
    }
    Ok(decoded)
}

fn decode_postgres(row: &PgRow) -> std::result::Result<Row, sqlx::Error> {
    let mut decoded = Row::new();
    for (index, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(index)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let type_name = raw.type_info().name().to_ascii_uppercase();
            match type_name.as_str() {
                "BOOL" => Value::Bool(row.try_get(index)?),
                "INT2" => Value::Int(i64::from(row.try_get::<i16, _>(index)?)),
                "INT4" => Value::Int(i64::from(row.try_get::<i32, _>(index)?)),
                "INT8" => Value::Int(row.try_get(index)?),
                "FLOAT4" => Value::Float(f64::from(row.try_get::<f32, _>(index)?)),
                "FLOAT8" => Value::Float(row.try_get(index)?),
                "BYTEA" => Value::Bytes(row.try_get(index)?),
                _ => Value::Text(row.try_get(index)?),
            }
        };
        decoded.push(column.name(), value);
    }
    Ok(decoded)
}

#[async_trait]
impl Driver for SqlitePool {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        debug!(sql = %sql, "Executing SQL");
        let result = if params.is_empty() {
            sqlx::raw_sql(sql).execute(self).await?
        } else {
            bind_params::<Sqlite>(sqlx::query(sql), params)
                .execute(self)
                .await?
        };
        Ok(result.rows_affected())
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let rows = bind_params::<Sqlite>(sqlx::query(sql), params)
            .fetch_all(self)
            .await?;
        Ok(rows.iter().map(decode_sqlite).collect::<std::result::Result<_, _>>()?)
    }
}

#[async_trait]
impl Driver for MySqlPool {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        debug!(sql = %sql, "Executing SQL");
        let result = if params.is_empty() {
            sqlx::raw_sql(sql).execute(self).await?
        } else {
            bind_params::<MySql>(sqlx::query(sql), params)
                .execute(self)
                .await?
        };
        Ok(result.rows_affected())
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let rows = bind_params::<MySql>(sqlx::query(sql), params)
            .fetch_all(self)
            .await?;
        Ok(rows.iter().map(decode_mysql).collect::<std::result::Result<_, _>>()?)
    }
}

#[async_trait]
impl Driver for PgPool {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        debug!(sql = %sql, "Executing SQL");
        let result = if params.is_empty() {
            sqlx::raw_sql(sql).execute(self).await?
        } else {
            bind_params::<Postgres>(sqlx::query(sql), params)
                .execute(self)
                .await?
        };
        Ok(result.rows_affected())
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let rows = bind_params::<Postgres>(sqlx::query(sql), params)
            .fetch_all(self)
            .await?;
        Ok(rows.iter().map(decode_postgres).collect::<std::result::Result<_, _>>()?)
    }
}

/// Forwards queries to the wrapped driver and records statements instead of
/// executing them.
#[derive(Debug)]
pub struct DryRun<D> {
    inner: D,
    statements: Mutex<Vec<String>>,
}

impl<D> DryRun<D> {
    /// Wraps a driver.
    pub const fn new(inner: D) -> Self {
        Self {
            inner,
            statements: Mutex::new(Vec::new()),
        }
    }

    /// Statements recorded so far, in execution order.
    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        self.statements
            .lock()
            .map(|statements| statements.clone())
            .unwrap_or_default()
    }

    /// Returns the wrapped driver.
    pub fn into_inner(self) -> D {
        self.inner
    }
}

#[async_trait]
impl<D: Driver> Driver for DryRun<D> {
    async fn execute(&self, sql: &str, _params: &[Value]) -> Result<u64> {
        debug!(sql = %sql, "Recording SQL (dry run)");
        if let Ok(mut statements) = self.statements.lock() {
            statements.push(sql.to_string());
        }
        Ok(0)
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.inner.query(sql, params).await
    }
}
