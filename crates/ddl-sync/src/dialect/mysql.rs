//! MySQL dialect.
//!
//! Introspection reads `information_schema` for the current database. The
//! `COLUMN_TYPE` column carries the same type string as `SHOW COLUMNS`
//! (`int unsigned`, `varchar(255)`, `enum('a','b')`), which is parsed back
//! into abstract descriptors.

use async_trait::async_trait;

use super::{
    default_of, execute, parse_quoted_list, split_arguments, unquote, Dialect, DialectKind,
    MappedType,
};
use crate::ddl;
use crate::driver::{Driver, Row, Value};
use crate::error::{Result, SyncError};
use crate::literal::{
    format_date, format_datetime, hex, non_finite_label, render_list, Literal, TimeZone,
};
use crate::schema::{ColumnDescriptor, ColumnType, Columns, LiveIndex, LiveIndexes};

const TABLE_EXISTS: &str = "SELECT CAST(TABLE_NAME AS CHAR(255)) AS table_name \
     FROM information_schema.TABLES \
     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?";

const COLUMNS: &str = "SELECT CAST(COLUMN_NAME AS CHAR(255)) AS column_name, \
     CAST(COLUMN_TYPE AS CHAR(4096)) AS column_type, \
     CAST(IS_NULLABLE AS CHAR(3)) AS is_nullable, \
     CAST(COLUMN_DEFAULT AS CHAR(4096)) AS column_default, \
     CAST(COLUMN_KEY AS CHAR(3)) AS column_key, \
     CAST(EXTRA AS CHAR(255)) AS extra \
     FROM information_schema.COLUMNS \
     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
     ORDER BY ORDINAL_POSITION";

const INDEXES: &str = "SELECT CAST(INDEX_NAME AS CHAR(255)) AS index_name, \
     CAST(COLUMN_NAME AS CHAR(255)) AS column_name, \
     CAST(NON_UNIQUE AS SIGNED) AS non_unique \
     FROM information_schema.STATISTICS \
     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
     ORDER BY INDEX_NAME, SEQ_IN_INDEX";

/// MySQL/MariaDB adapter.
#[derive(Debug, Clone, Default)]
pub struct MysqlDialect {
    time_zone: TimeZone,
}

impl MysqlDialect {
    /// Creates the adapter. Timestamps are rendered in `time_zone`.
    #[must_use]
    pub const fn new(time_zone: TimeZone) -> Self {
        Self { time_zone }
    }

    fn escape_string(value: &str) -> String {
        let mut escaped = String::with_capacity(value.len() + 2);
        escaped.push('\'');
        for c in value.chars() {
            match c {
                '\0' => escaped.push_str("\\0"),
                '\n' => escaped.push_str("\\n"),
                '\r' => escaped.push_str("\\r"),
                '\u{8}' => escaped.push_str("\\b"),
                '\t' => escaped.push_str("\\t"),
                '\u{1a}' => escaped.push_str("\\Z"),
                '\\' => escaped.push_str("\\\\"),
                '\'' => escaped.push_str("\\'"),
                '"' => escaped.push_str("\\\""),
                _ => escaped.push(c),
            }
        }
        escaped.push('\'');
        escaped
    }

    fn number_type(column: &ColumnDescriptor) -> Option<&'static str> {
        match (column.rational, column.size.unwrap_or(4)) {
            (true, 4) => Some("FLOAT"),
            (true, 8) => Some("DOUBLE"),
            (false, 2) => Some("SMALLINT"),
            (false, 4) => Some("INTEGER"),
            (false, 8) => Some("BIGINT"),
            _ => None,
        }
    }
}

/// Parses a `COLUMN_TYPE` string. Returns `None` for types with no abstract
/// counterpart.
pub fn parse_native_type(native: &str) -> Option<ColumnDescriptor> {
    let trimmed = native.trim();
    if trimmed.to_ascii_lowercase().starts_with("enum(") {
        let (_, values) = split_arguments(trimmed);
        return Some(ColumnDescriptor::enumeration(parse_quoted_list(
            values.unwrap_or_default(),
        )));
    }

    let lower = trimmed.to_ascii_lowercase();
    let base = lower.split_whitespace().next()?;
    let (name, arguments) = split_arguments(base);
    let size = arguments
        .and_then(|arguments| arguments.split(',').next())
        .and_then(|size| size.trim().parse::<u32>().ok());

    let column = match name {
        "tinyint" if size == Some(1) => ColumnDescriptor::boolean(),
        "tinyint" => ColumnDescriptor::number().size(1),
        "smallint" => ColumnDescriptor::number().size(2),
        "mediumint" => ColumnDescriptor::number().size(3),
        "int" | "integer" => ColumnDescriptor::number().size(4),
        "bigint" => ColumnDescriptor::number().size(8),
        "float" => ColumnDescriptor::number().rational().size(4),
        "double" | "real" => ColumnDescriptor::number().rational().size(8),
        "char" if size == Some(36) => ColumnDescriptor::uuid(),
        "varchar" | "char" => {
            let column = ColumnDescriptor::text();
            match size {
                Some(size) => column.size(size),
                None => column,
            }
        }
        "tinytext" | "text" | "mediumtext" => ColumnDescriptor::text(),
        "longtext" => ColumnDescriptor::text().big(),
        "date" => ColumnDescriptor::date(),
        "datetime" | "timestamp" => ColumnDescriptor::date().time(),
        "tinyblob" | "blob" | "mediumblob" | "binary" | "varbinary" => ColumnDescriptor::binary(),
        "longblob" => ColumnDescriptor::binary().big(),
        "point" => ColumnDescriptor::point(),
        "json" => ColumnDescriptor::json(),
        _ => return None,
    };
    Some(column)
}

fn parse_column(collection: &str, row: &Row) -> Result<(String, ColumnDescriptor)> {
    let name = row.text("column_name").unwrap_or_default();
    let native = row.text("column_type").unwrap_or_default();
    let mut column = parse_native_type(&native).ok_or_else(|| SyncError::UnknownColumnType {
        collection: collection.to_string(),
        column: name.clone(),
        native: native.clone(),
    })?;

    column.required = row
        .text("is_nullable")
        .is_some_and(|nullable| nullable.eq_ignore_ascii_case("NO"));
    column.primary = row.text("column_key").is_some_and(|key| key == "PRI");
    if row
        .text("extra")
        .is_some_and(|extra| extra.to_ascii_lowercase().contains("auto_increment"))
    {
        column.column_type = ColumnType::Serial;
    }
    column.default_value = row
        .text("column_default")
        .filter(|default| !default.eq_ignore_ascii_case("NULL"))
        .map(|default| Literal::Text(unquote(&default)));

    Ok((name, column))
}

fn collect_indexes(rows: &[Row]) -> LiveIndexes {
    let mut indexes = LiveIndexes::new();
    for row in rows {
        let (Some(name), Some(column)) = (row.text("index_name"), row.text("column_name")) else {
            continue;
        };
        if name == "PRIMARY" {
            continue;
        }
        let unique = row.int("non_unique") == Some(0);
        indexes
            .entry(name)
            .or_insert_with(|| LiveIndex {
                columns: Vec::new(),
                unique,
            })
            .columns
            .push(column);
    }
    indexes
}

#[async_trait]
impl Dialect for MysqlDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Mysql
    }

    fn escape_identifier(&self, parts: &[&str]) -> String {
        parts
            .iter()
            .map(|part| format!("`{}`", part.replace('`', "``")))
            .collect::<Vec<_>>()
            .join(".")
    }

    fn escape_literal(&self, value: &Literal, time_zone: Option<&TimeZone>) -> String {
        match value {
            Literal::Null => "NULL".to_string(),
            Literal::Bool(flag) => flag.to_string(),
            Literal::Int(number) => number.to_string(),
            Literal::Float(number) if number.is_finite() => number.to_string(),
            Literal::Float(number) => Self::escape_string(non_finite_label(*number)),
            Literal::Text(text) => Self::escape_string(text),
            Literal::Bytes(bytes) => format!("X'{}'", hex(bytes)),
            Literal::Timestamp(instant) => Self::escape_string(&format_datetime(
                instant,
                time_zone.unwrap_or(&self.time_zone),
            )),
            Literal::List(items) => {
                render_list(items, |item| self.escape_literal(item, time_zone))
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
            ColumnType::Text if column.big => "LONGTEXT".to_string(),
            ColumnType::Text => format!("VARCHAR({})", column.size.unwrap_or(255).clamp(1, 65535)),
            ColumnType::Number => Self::number_type(column)?.to_string(),
            ColumnType::Serial => {
                return Some(
                    MappedType::new("INT")
                        .not_null(true)
                        .constraint("AUTO_INCREMENT")
                        .default(default_of(self, column)),
                );
            }
            ColumnType::Boolean => "TINYINT(1)".to_string(),
            ColumnType::Date if column.time => "DATETIME".to_string(),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::Binary | ColumnType::Object if column.big => "LONGBLOB".to_string(),
            ColumnType::Binary | ColumnType::Object => "BLOB".to_string(),
            ColumnType::Enum => {
                let values: Vec<String> = column
                    .values
                    .iter()
                    .map(|value| Self::escape_string(value))
                    .collect();
                format!("ENUM({})", values.join(","))
            }
            ColumnType::Point => "POINT".to_string(),
            ColumnType::Uuid => "CHAR(36)".to_string(),
            ColumnType::Json => "JSON".to_string(),
            ColumnType::Custom(_) => return None,
        };

        Some(
            MappedType::new(native)
                .not_null(column.required)
                .default(default_of(self, column)),
        )
    }

    fn supports_type(&self, column_type: &ColumnType) -> ColumnType {
        match column_type {
            ColumnType::Object => ColumnType::Binary,
            other => other.clone(),
        }
    }

    fn catalog_default(&self, column: &ColumnDescriptor, value: &Literal) -> Option<String> {
        match value {
            Literal::Timestamp(instant)
                if column.column_type == ColumnType::Date && !column.time =>
            {
                Some(format_date(instant, &self.time_zone))
            }
            _ => None,
        }
    }

    fn supports_column_position(&self) -> bool {
        true
    }

    async fn has_collection(&self, db: &dyn Driver, name: &str) -> Result<bool> {
        let rows = db.query(TABLE_EXISTS, &[Value::from(name)]).await?;
        Ok(!rows.is_empty())
    }

    async fn introspect_columns(&self, db: &dyn Driver, collection: &str) -> Result<Columns> {
        let rows = db.query(COLUMNS, &[Value::from(collection)]).await?;
        let mut columns = Columns::new();
        for row in &rows {
            let (name, column) = parse_column(collection, row)?;
            columns.insert(name, column);
        }
        Ok(columns)
    }

    async fn introspect_indexes(&self, db: &dyn Driver, collection: &str) -> Result<LiveIndexes> {
        let rows = db.query(INDEXES, &[Value::from(collection)]).await?;
        Ok(collect_indexes(&rows))
    }

    async fn drop_index(&self, db: &dyn Driver, collection: &str, name: &str) -> Result<()> {
        execute(db, &ddl::drop_index(self, name, Some(collection), false)).await
    }
}
