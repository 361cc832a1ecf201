//! PostgreSQL dialect.
//!
//! Enums are named types (`<collection>_enum_<column>`) created by a pre-step
//! before any column uses them. Index names are prefixed with the collection
//! name because PostgreSQL index names share the schema namespace.

use async_trait::async_trait;

use super::{default_of, execute, unquote, Dialect, DialectKind, MappedType, PreStep};
use crate::driver::{Driver, Row, Value};
use crate::error::{Result, SyncError};
use crate::literal::{format_date, format_iso8601, hex, non_finite_label, Literal, TimeZone};
use crate::schema::{ColumnDescriptor, ColumnType, Columns, LiveIndex, LiveIndexes};

const TABLE_EXISTS: &str = "SELECT table_name::text AS table_name \
     FROM information_schema.tables \
     WHERE table_schema = current_schema() AND table_name = $1";

const COLUMNS: &str = "SELECT column_name::text AS column_name, \
     data_type::text AS data_type, \
     udt_name::text AS udt_name, \
     is_nullable::text AS is_nullable, \
     column_default::text AS column_default, \
     character_maximum_length::int8 AS max_length, \
     is_identity::text AS is_identity \
     FROM information_schema.columns \
     WHERE table_schema = current_schema() AND table_name = $1 \
     ORDER BY ordinal_position";

const PRIMARY_KEY: &str = "SELECT a.attname::text AS column_name \
     FROM pg_index i \
     JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey) \
     WHERE i.indrelid = to_regclass(quote_ident($1)) AND i.indisprimary";

const ENUM_LABELS: &str = "SELECT e.enumlabel::text AS label \
     FROM pg_type t \
     JOIN pg_enum e ON e.enumtypid = t.oid \
     WHERE t.typname = $1 AND t.typnamespace = current_schema()::regnamespace \
     ORDER BY e.enumsortorder";

const ENUM_COLUMNS: &str = "SELECT c.relname::text AS table_name, \
     a.attname::text AS column_name \
     FROM pg_attribute a \
     JOIN pg_class c ON c.oid = a.attrelid \
     JOIN pg_type t ON t.oid = a.atttypid \
     WHERE t.typname = $1 AND t.typnamespace = current_schema()::regnamespace \
     AND a.attnum > 0 AND NOT a.attisdropped";

const INDEXES: &str = "SELECT i.relname::text AS index_name, \
     a.attname::text AS column_name, \
     ix.indisunique AS is_unique \
     FROM pg_class t \
     JOIN pg_index ix ON t.oid = ix.indrelid \
     JOIN pg_class i ON i.oid = ix.indexrelid \
     JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey) \
     WHERE t.relkind = 'r' AND t.relname = $1 AND NOT ix.indisprimary \
     AND t.relnamespace = current_schema()::regnamespace \
     ORDER BY i.relname, array_position(ix.indkey::int2[], a.attnum)";

/// PostgreSQL adapter.
#[derive(Debug, Clone, Default)]
pub struct PostgresDialect {
    time_zone: TimeZone,
}

impl PostgresDialect {
    /// Creates the adapter. Timestamps are rendered in `time_zone`.
    #[must_use]
    pub const fn new(time_zone: TimeZone) -> Self {
        Self { time_zone }
    }

    /// Name of the enum type backing a column.
    #[must_use]
    pub fn enum_type_name(collection: &str, column: &str) -> String {
        format!("{collection}_enum_{}", column.to_lowercase())
    }

    fn escape_string(value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    fn number_type(column: &ColumnDescriptor) -> Option<&'static str> {
        match (column.rational, column.size.unwrap_or(4)) {
            (true, 4) => Some("REAL"),
            (true, 8) => Some("DOUBLE PRECISION"),
            (false, 2) => Some("SMALLINT"),
            (false, 4) => Some("INTEGER"),
            (false, 8) => Some("BIGINT"),
            _ => None,
        }
    }

    async fn enum_labels(db: &dyn Driver, name: &str) -> Result<Vec<String>> {
        let rows = db.query(ENUM_LABELS, &[Value::from(name)]).await?;
        Ok(rows.iter().filter_map(|row| row.text("label")).collect())
    }

    async fn enum_in_use(db: &dyn Driver, name: &str) -> Result<bool> {
        let rows = db.query(ENUM_COLUMNS, &[Value::from(name)]).await?;
        Ok(!rows.is_empty())
    }

    fn create_enum_sql(&self, name: &str, values: &[String]) -> String {
        let labels: Vec<String> = values.iter().map(|value| Self::escape_string(value)).collect();
        format!(
            "CREATE TYPE {} AS ENUM ({})",
            self.escape_identifier(&[name]),
            labels.join(", ")
        )
    }
}

fn retired_enum_name(name: &str) -> String {
    format!("{name}__old")
}

/// Timestamp text as PostgreSQL prints a stored `timestamp` or `date` constant.
fn catalog_timestamp(local: &str) -> String {
    local.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn same_labels(left: &[String], right: &[String]) -> bool {
    left.iter().all(|value| right.contains(value)) && right.iter().all(|value| left.contains(value))
}

/// Maps an `information_schema.columns.data_type` value. User-defined types
/// come back as enums without labels; the caller loads the labels.
pub fn parse_native_type(data_type: &str, max_length: Option<i64>) -> Option<ColumnDescriptor> {
    let column = match data_type.to_ascii_lowercase().as_str() {
        "smallint" => ColumnDescriptor::number().size(2),
        "integer" => ColumnDescriptor::number().size(4),
        "bigint" => ColumnDescriptor::number().size(8),
        "real" => ColumnDescriptor::number().rational().size(4),
        "double precision" => ColumnDescriptor::number().rational().size(8),
        "boolean" => ColumnDescriptor::boolean(),
        "date" => ColumnDescriptor::date(),
        "timestamp without time zone" | "timestamp with time zone" => {
            ColumnDescriptor::date().time()
        }
        "bytea" => ColumnDescriptor::binary(),
        "character varying" | "character" => {
            let column = ColumnDescriptor::text();
            match max_length.and_then(|length| u32::try_from(length).ok()) {
                Some(length) => column.size(length),
                None => column,
            }
        }
        "text" => ColumnDescriptor::text(),
        "uuid" => ColumnDescriptor::uuid(),
        "json" | "jsonb" => ColumnDescriptor::json(),
        "point" => ColumnDescriptor::point(),
        "user-defined" => ColumnDescriptor::new(ColumnType::Enum),
        _ => return None,
    };
    Some(column)
}

/// Reduces a catalog default such as `'John'::text` to its value.
/// `NULL` defaults and sequence defaults yield `None`.
pub fn normalize_default(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("null")
        || raw.to_ascii_uppercase().starts_with("NULL::")
        || raw.starts_with("nextval(")
    {
        return None;
    }
    if raw.starts_with('\'') {
        if let Some(end) = raw.rfind("'::") {
            return Some(unquote(&raw[..=end]));
        }
    }
    Some(raw.to_string())
}

fn parse_column(collection: &str, row: &Row) -> Result<(String, ColumnDescriptor)> {
    let name = row.text("column_name").unwrap_or_default();
    let data_type = row.text("data_type").unwrap_or_default();
    let mut column = parse_native_type(&data_type, row.int("max_length")).ok_or_else(|| {
        SyncError::UnknownColumnType {
            collection: collection.to_string(),
            column: name.clone(),
            native: data_type.clone(),
        }
    })?;

    column.required = row
        .text("is_nullable")
        .is_some_and(|nullable| nullable.eq_ignore_ascii_case("NO"));

    let raw_default = row.text("column_default");
    let sequence = raw_default
        .as_deref()
        .is_some_and(|default| default.starts_with("nextval("));
    let identity = row
        .text("is_identity")
        .is_some_and(|identity| identity.eq_ignore_ascii_case("YES"));
    if (sequence || identity) && column.column_type == ColumnType::Number && !column.rational {
        column.column_type = ColumnType::Serial;
    }
    column.default_value = raw_default
        .as_deref()
        .and_then(normalize_default)
        .map(Literal::Text);

    Ok((name, column))
}

fn collect_indexes(rows: &[Row]) -> LiveIndexes {
    let mut indexes = LiveIndexes::new();
    for row in rows {
        let (Some(name), Some(column)) = (row.text("index_name"), row.text("column_name")) else {
            continue;
        };
        let unique = row.flag("is_unique");
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
impl Dialect for PostgresDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Postgres
    }

    fn escape_identifier(&self, parts: &[&str]) -> String {
        parts
            .iter()
            .flat_map(|part| part.split('.'))
            .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
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
            Literal::Bytes(bytes) => format!("'\\x{}'", hex(bytes)),
            Literal::Timestamp(instant) => Self::escape_string(&format_iso8601(
                instant,
                time_zone.unwrap_or(&self.time_zone),
            )),
            Literal::List(items) => {
                // A single nested list is a value group: ((a, b)) renders as (a, b).
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
        collection: &str,
        column_name: &str,
        column: &ColumnDescriptor,
    ) -> Option<MappedType> {
        let mut pre_step = None;
        let native = match &column.column_type {
            ColumnType::Serial => return Some(MappedType::new("SERIAL")),
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::Number => Self::number_type(column)?.to_string(),
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::Date if column.time => "TIMESTAMP WITHOUT TIME ZONE".to_string(),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::Binary | ColumnType::Object => "BYTEA".to_string(),
            ColumnType::Enum => {
                let name = Self::enum_type_name(collection, column_name);
                let native = self.escape_identifier(&[&name]);
                pre_step = Some(PreStep::EnumType {
                    name,
                    values: column.values.clone(),
                });
                native
            }
            ColumnType::Point => "POINT".to_string(),
            ColumnType::Uuid => "UUID".to_string(),
            ColumnType::Json => "JSONB".to_string(),
            ColumnType::Custom(_) => return None,
        };

        let mapped = MappedType::new(native)
            .not_null(column.required)
            .default(default_of(self, column));
        Some(match pre_step {
            Some(step) => mapped.pre_step(step),
            None => mapped,
        })
    }

    fn supports_type(&self, column_type: &ColumnType) -> ColumnType {
        match column_type {
            ColumnType::Object => ColumnType::Binary,
            other => other.clone(),
        }
    }

    fn catalog_default(&self, column: &ColumnDescriptor, value: &Literal) -> Option<String> {
        match value {
            Literal::Bytes(bytes) => Some(format!("\\x{}", hex(bytes))),
            Literal::Timestamp(instant) if column.column_type == ColumnType::Date => {
                Some(if column.time {
                    catalog_timestamp(
                        &self
                            .time_zone
                            .localize(instant)
                            .format("%Y-%m-%d %H:%M:%S%.3f")
                            .to_string(),
                    )
                } else {
                    format_date(instant, &self.time_zone)
                })
            }
            _ => None,
        }
    }

    fn index_name(&self, collection: &str, name: &str) -> String {
        format!("{collection}_{name}")
    }

    async fn has_collection(&self, db: &dyn Driver, name: &str) -> Result<bool> {
        let rows = db.query(TABLE_EXISTS, &[Value::from(name)]).await?;
        Ok(!rows.is_empty())
    }

    async fn introspect_columns(&self, db: &dyn Driver, collection: &str) -> Result<Columns> {
        let rows = db.query(COLUMNS, &[Value::from(collection)]).await?;
        let primary: Vec<String> = db
            .query(PRIMARY_KEY, &[Value::from(collection)])
            .await?
            .iter()
            .filter_map(|row| row.text("column_name"))
            .collect();

        let mut columns = Columns::new();
        for row in &rows {
            let (name, mut column) = parse_column(collection, row)?;
            if column.column_type == ColumnType::Enum {
                let udt_name = row.text("udt_name").unwrap_or_default();
                column.values = Self::enum_labels(db, &udt_name).await?;
                if column.values.is_empty() {
                    return Err(SyncError::UnknownColumnType {
                        collection: collection.to_string(),
                        column: name,
                        native: udt_name,
                    });
                }
            }
            column.primary = primary.contains(&name);
            columns.insert(name, column);
        }
        Ok(columns)
    }

    async fn introspect_indexes(&self, db: &dyn Driver, collection: &str) -> Result<LiveIndexes> {
        let rows = db.query(INDEXES, &[Value::from(collection)]).await?;
        Ok(collect_indexes(&rows))
    }

    async fn run_pre_step(&self, db: &dyn Driver, step: &PreStep) -> Result<()> {
        let PreStep::EnumType { name, values } = step;
        let existing = Self::enum_labels(db, name).await?;
        if existing.is_empty() {
            return execute(db, &self.create_enum_sql(name, values)).await;
        }
        if same_labels(&existing, values) {
            return Ok(());
        }
        if !Self::enum_in_use(db, name).await? {
            execute(db, &format!("DROP TYPE {}", self.escape_identifier(&[name]))).await?;
            return execute(db, &self.create_enum_sql(name, values)).await;
        }

        // The old type stays until the column has been cast to the new one.
        let retired = retired_enum_name(name);
        execute(
            db,
            &format!("DROP TYPE IF EXISTS {}", self.escape_identifier(&[&retired])),
        )
        .await?;
        execute(
            db,
            &format!(
                "ALTER TYPE {} RENAME TO {}",
                self.escape_identifier(&[name]),
                self.escape_identifier(&[&retired])
            ),
        )
        .await?;
        execute(db, &self.create_enum_sql(name, values)).await
    }

    async fn modify_column(
        &self,
        db: &dyn Driver,
        collection: &str,
        name: &str,
        definition: &MappedType,
    ) -> Result<()> {
        let table = self.escape_identifier(&[collection]);
        let column = self.escape_identifier(&[name]);
        let alter = format!("ALTER TABLE {table} ALTER COLUMN {column}");
        let serial = definition.native == "SERIAL";
        let native = if serial { "INTEGER" } else { definition.native.as_str() };
        let using = match definition.pre_step {
            Some(PreStep::EnumType { .. }) => format!("{column}::text::{native}"),
            None => format!("{column}::{native}"),
        };

        execute(db, &format!("{alter} DROP DEFAULT")).await?;
        execute(db, &format!("{alter} TYPE {native} USING {using}")).await?;
        if serial || definition.not_null {
            execute(db, &format!("{alter} SET NOT NULL")).await?;
        } else {
            execute(db, &format!("{alter} DROP NOT NULL")).await?;
        }
        if serial {
            execute(db, &format!("{alter} ADD GENERATED BY DEFAULT AS IDENTITY")).await?;
        }
        if let Some(default) = &definition.default {
            execute(db, &format!("{alter} SET DEFAULT {default}")).await?;
        }
        if let Some(PreStep::EnumType { name, .. }) = &definition.pre_step {
            let retired = retired_enum_name(name);
            execute(
                db,
                &format!("DROP TYPE IF EXISTS {}", self.escape_identifier(&[&retired])),
            )
            .await?;
        }
        Ok(())
    }
}
