//! SQLite dialect.
//!
//! SQLite has no enum or boolean types, and its ALTER TABLE cannot drop or
//! redefine columns. Those operations are reported as unsupported and the
//! synchronizer skips them; the adapter methods themselves are no-ops.

use async_trait::async_trait;
use tracing::debug;

use super::{default_of, execute, split_arguments, unquote, Dialect, DialectKind, MappedType};
use crate::ddl;
use crate::driver::{Driver, Row, Value};
use crate::error::{Result, SyncError};
use crate::literal::{format_iso8601, hex, non_finite_label, Literal, TimeZone};
use crate::schema::{
    CollectionDescriptor, ColumnDescriptor, ColumnType, Columns, LiveIndex, LiveIndexes,
};

const TABLE_EXISTS: &str = "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?";

const TABLE_SQL: &str = "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?";

/// SQLite adapter.
#[derive(Debug, Clone, Default)]
pub struct SqliteDialect {
    time_zone: TimeZone,
}

impl SqliteDialect {
    /// Creates the adapter. Timestamps are rendered in `time_zone`.
    #[must_use]
    pub const fn new(time_zone: TimeZone) -> Self {
        Self { time_zone }
    }

    fn escape_string(value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }
}

/// Maps a declared column type from `PRAGMA table_info`.
pub fn parse_native_type(native: &str) -> Option<ColumnDescriptor> {
    let upper = native.trim().to_ascii_uppercase();
    let (name, _) = split_arguments(&upper);
    let column = match name {
        "INTEGER" | "INT" | "BIGINT" | "SMALLINT" | "TINYINT" => ColumnDescriptor::number(),
        "REAL" | "FLOAT" | "DOUBLE" => ColumnDescriptor::number().rational(),
        "BOOLEAN" => ColumnDescriptor::boolean(),
        "DATETIME" | "TIMESTAMP" => ColumnDescriptor::date().time(),
        "DATE" => ColumnDescriptor::date(),
        "BLOB" => ColumnDescriptor::binary().big(),
        "TEXT" | "VARCHAR" | "CHAR" | "CLOB" => ColumnDescriptor::text(),
        "POINT" => ColumnDescriptor::point(),
        _ => return None,
    };
    Some(column)
}

fn parse_column(
    collection: &str,
    row: &Row,
    autoincrement: bool,
) -> Result<(String, ColumnDescriptor)> {
    let name = row.text("name").unwrap_or_default();
    let native = row.text("type").unwrap_or_default();
    let mut column = parse_native_type(&native).ok_or_else(|| SyncError::UnknownColumnType {
        collection: collection.to_string(),
        column: name.clone(),
        native: native.clone(),
    })?;

    column.required = row.flag("notnull");
    column.primary = row.int("pk").is_some_and(|pk| pk > 0);
    if autoincrement && column.primary && column.column_type == ColumnType::Number && !column.rational
    {
        column.column_type = ColumnType::Serial;
    }
    column.default_value = row
        .text("dflt_value")
        .filter(|default| !default.eq_ignore_ascii_case("NULL"))
        .map(|default| Literal::Text(unquote(&default)));

    Ok((name, column))
}

fn is_internal_index(row: &Row) -> bool {
    let automatic = row
        .text("name")
        .is_some_and(|name| name.starts_with("sqlite_autoindex"));
    automatic || row.text("origin").is_some_and(|origin| origin == "pk")
}

#[async_trait]
impl Dialect for SqliteDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Sqlite
    }

    fn escape_identifier(&self, parts: &[&str]) -> String {
        parts
            .iter()
            .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
            .collect::<Vec<_>>()
            .join(".")
    }

    fn escape_literal(&self, value: &Literal, time_zone: Option<&TimeZone>) -> String {
        match value {
            Literal::Null => "NULL".to_string(),
            Literal::Bool(flag) => String::from(if *flag { "1" } else { "0" }),
            Literal::Int(number) => number.to_string(),
            Literal::Float(number) if number.is_finite() => number.to_string(),
            Literal::Float(number) => Self::escape_string(non_finite_label(*number)),
            Literal::Text(text) => Self::escape_string(text),
            Literal::Bytes(bytes) => format!("X'{}'", hex(bytes)),
            Literal::Timestamp(instant) => Self::escape_string(&format_iso8601(
                instant,
                time_zone.unwrap_or(&self.time_zone),
            )),
            Literal::List(items) => {
                let items = match items.as_slice() {
                    [Literal::List(inner)] => inner,
                    _ => items,
                };
                let rendered: Vec<String> = items
                    .iter()
                    .map(|item| self.escape_literal(item, time_zone))
                    .collect();
                format!("({})", rendered.join(", "))
            }
            Literal::Generated(generator) => generator.render(self),
        }
    }

    fn map_type(
        &self,
        _collection: &str,
        _column_name: &str,
        column: &ColumnDescriptor,
    ) -> Option<MappedType> {
        let native = match &column.column_type {
            ColumnType::Serial => {
                return Some(
                    MappedType::new("INTEGER")
                        .constraint("PRIMARY KEY")
                        .constraint("AUTOINCREMENT"),
                );
            }
            ColumnType::Number if column.rational => "REAL",
            ColumnType::Number | ColumnType::Boolean | ColumnType::Enum => "INTEGER",
            ColumnType::Text | ColumnType::Uuid | ColumnType::Json => "TEXT",
            ColumnType::Date => "DATETIME",
            ColumnType::Binary | ColumnType::Object => "BLOB",
            ColumnType::Point => "POINT",
            ColumnType::Custom(_) => return None,
        };

        Some(
            MappedType::new(native)
                .not_null(column.required || column.primary)
                .default(default_of(self, column)),
        )
    }

    fn supports_type(&self, column_type: &ColumnType) -> ColumnType {
        match column_type {
            ColumnType::Boolean | ColumnType::Enum => ColumnType::Number,
            ColumnType::Uuid | ColumnType::Json => ColumnType::Text,
            ColumnType::Object => ColumnType::Binary,
            other => other.clone(),
        }
    }

    /// A lone serial column carries its own PRIMARY KEY clause.
    fn check_primary(&self, collection: &CollectionDescriptor, primary: Vec<String>) -> Vec<String> {
        if let [only] = primary.as_slice() {
            let serial = collection
                .columns
                .get(only)
                .is_some_and(|column| column.column_type == ColumnType::Serial);
            if serial {
                return Vec::new();
            }
        }
        primary
    }

    fn supports_drop_column(&self) -> bool {
        false
    }

    fn supports_modify_column(&self) -> bool {
        false
    }

    async fn has_collection(&self, db: &dyn Driver, name: &str) -> Result<bool> {
        let rows = db.query(TABLE_EXISTS, &[Value::from(name)]).await?;
        Ok(!rows.is_empty())
    }

    async fn introspect_columns(&self, db: &dyn Driver, collection: &str) -> Result<Columns> {
        let autoincrement = db
            .query(TABLE_SQL, &[Value::from(collection)])
            .await?
            .first()
            .and_then(|row| row.text("sql"))
            .is_some_and(|sql| sql.to_ascii_uppercase().contains("AUTOINCREMENT"));

        let pragma = format!("PRAGMA table_info({})", self.escape_identifier(&[collection]));
        let mut columns = Columns::new();
        for row in &db.query(&pragma, &[]).await? {
            let (name, column) = parse_column(collection, row, autoincrement)?;
            columns.insert(name, column);
        }
        Ok(columns)
    }

    async fn introspect_indexes(&self, db: &dyn Driver, collection: &str) -> Result<LiveIndexes> {
        let pragma = format!("PRAGMA index_list({})", self.escape_identifier(&[collection]));
        let mut indexes = LiveIndexes::new();
        for row in &db.query(&pragma, &[]).await? {
            if is_internal_index(row) {
                continue;
            }
            let Some(name) = row.text("name") else {
                continue;
            };

            let info = format!("PRAGMA index_info({})", self.escape_identifier(&[&name]));
            let mut members: Vec<(i64, String)> = db
                .query(&info, &[])
                .await?
                .iter()
                .filter_map(|member| Some((member.int("seqno")?, member.text("name")?)))
                .collect();
            members.sort_by_key(|(seqno, _)| *seqno);

            indexes.insert(
                name,
                LiveIndex {
                    columns: members.into_iter().map(|(_, column)| column).collect(),
                    unique: row.flag("unique"),
                },
            );
        }
        Ok(indexes)
    }

    async fn modify_column(
        &self,
        _db: &dyn Driver,
        collection: &str,
        name: &str,
        _definition: &MappedType,
    ) -> Result<()> {
        debug!(collection = %collection, column = %name, "Column modification not supported in SQLite");
        Ok(())
    }

    async fn drop_column(&self, _db: &dyn Driver, collection: &str, name: &str) -> Result<()> {
        debug!(collection = %collection, column = %name, "Column drop not supported in SQLite");
        Ok(())
    }

    async fn drop_index(&self, db: &dyn Driver, _collection: &str, name: &str) -> Result<()> {
        execute(db, &ddl::drop_index(self, name, None, true)).await
    }
}
