//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use ddl_sync::driver::{Driver, Row, Value};
use ddl_sync::error::Result;

struct Response {
    fragment: String,
    param: Option<String>,
    rows: Vec<Row>,
}

/// A driver that answers catalog queries from a script and records every
/// executed statement.
///
/// A query is answered by the first response whose fragment occurs in the SQL
/// and whose parameter, if given, equals the first bound parameter. Queries
/// without a matching response return no rows.
#[derive(Default)]
pub struct ScriptedDriver {
    responses: Vec<Response>,
    executed: Mutex<Vec<String>>,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers queries containing `fragment`.
    pub fn respond(mut self, fragment: &str, rows: Vec<Row>) -> Self {
        self.responses.push(Response {
            fragment: fragment.to_string(),
            param: None,
            rows,
        });
        self
    }

    /// Answers queries containing `fragment` whose first parameter is `param`.
    pub fn respond_to(mut self, fragment: &str, param: &str, rows: Vec<Row>) -> Self {
        self.responses.push(Response {
            fragment: fragment.to_string(),
            param: Some(param.to_string()),
            rows,
        });
        self
    }

    /// Statements executed so far.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Driver for ScriptedDriver {
    async fn execute(&self, sql: &str, _params: &[Value]) -> Result<u64> {
        self.executed.lock().unwrap().push(sql.to_string());
        Ok(0)
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let first = params.first().and_then(Value::as_text);
        let rows = self
            .responses
            .iter()
            .find(|response| {
                sql.contains(&response.fragment)
                    && response
                        .param
                        .as_ref()
                        .map_or(true, |param| first.as_deref() == Some(param.as_str()))
            })
            .map(|response| response.rows.clone())
            .unwrap_or_default();
        Ok(rows)
    }
}

/// A row from `information_schema.COLUMNS` as the MySQL dialect reads it.
pub fn mysql_column(name: &str, column_type: &str, nullable: bool, key: &str, extra: &str) -> Row {
    mysql_row(name, column_type, nullable, key, extra, Value::Null)
}

/// A nullable MySQL column with a default, spelled as `COLUMN_DEFAULT` reports it.
pub fn mysql_defaulted(name: &str, column_type: &str, default: &str) -> Row {
    mysql_row(name, column_type, true, "", "", Value::from(default))
}

fn mysql_row(
    name: &str,
    column_type: &str,
    nullable: bool,
    key: &str,
    extra: &str,
    default: Value,
) -> Row {
    Row::new()
        .with("column_name", name)
        .with("column_type", column_type)
        .with("is_nullable", if nullable { "YES" } else { "NO" })
        .with("column_default", default)
        .with("column_key", key)
        .with("extra", extra)
}

/// A row from `information_schema.columns` as the PostgreSQL dialect reads it.
pub fn postgres_column(name: &str, data_type: &str, udt_name: &str, nullable: bool) -> Row {
    postgres_row(name, data_type, udt_name, nullable, Value::Null)
}

/// A nullable PostgreSQL column whose catalog default is `default`, e.g.
/// `'2024-01-02'::date`.
pub fn postgres_defaulted(name: &str, data_type: &str, udt_name: &str, default: &str) -> Row {
    postgres_row(name, data_type, udt_name, true, Value::from(default))
}

fn postgres_row(name: &str, data_type: &str, udt_name: &str, nullable: bool, default: Value) -> Row {
    Row::new()
        .with("column_name", name)
        .with("data_type", data_type)
        .with("udt_name", udt_name)
        .with("is_nullable", if nullable { "YES" } else { "NO" })
        .with("column_default", default)
        .with("max_length", Value::Null)
        .with("is_identity", "NO")
}
