//! DDL statement templates.
//!
//! Each builder produces one statement. Identifiers are quoted with the
//! dialect's own escaping; column fragments arrive already rendered.

use crate::dialect::{ColumnPosition, Dialect, MappedType};

/// `<name> <definition>` as used inside CREATE TABLE and ALTER TABLE.
pub fn column_definition<D: Dialect + ?Sized>(
    dialect: &D,
    name: &str,
    definition: &MappedType,
) -> String {
    format!("{} {}", dialect.escape_identifier(&[name]), definition.sql())
}

/// `CREATE TABLE t (col, ..., PRIMARY KEY (...))`.
///
/// The PRIMARY KEY clause is omitted when `primary` is empty.
pub fn create_table<D: Dialect + ?Sized>(
    dialect: &D,
    name: &str,
    columns: &[String],
    primary: &[String],
) -> String {
    let mut sql = String::from("CREATE TABLE ");
    sql.push_str(&dialect.escape_identifier(&[name]));
    sql.push_str(" (");
    sql.push_str(&columns.join(", "));

    if !primary.is_empty() {
        let quoted: Vec<String> = primary
            .iter()
            .map(|column| dialect.escape_identifier(&[column]))
            .collect();
        sql.push_str(", PRIMARY KEY (");
        sql.push_str(&quoted.join(", "));
        sql.push(')');
    }

    sql.push(')');
    sql
}

/// `DROP TABLE t`.
pub fn drop_table<D: Dialect + ?Sized>(dialect: &D, name: &str) -> String {
    format!("DROP TABLE {}", dialect.escape_identifier(&[name]))
}

/// `ALTER TABLE t ADD COLUMN <column> [FIRST | AFTER x]`.
pub fn add_column<D: Dialect + ?Sized>(
    dialect: &D,
    table: &str,
    column: &str,
    position: Option<&ColumnPosition>,
) -> String {
    let mut sql = format!(
        "ALTER TABLE {} ADD COLUMN {column}",
        dialect.escape_identifier(&[table])
    );
    match position {
        Some(ColumnPosition::First) => sql.push_str(" FIRST"),
        Some(ColumnPosition::After(previous)) => {
            sql.push_str(" AFTER ");
            sql.push_str(&dialect.escape_identifier(&[previous]));
        }
        None => {}
    }
    sql
}

/// `ALTER TABLE t MODIFY COLUMN <column>`.
pub fn modify_column<D: Dialect + ?Sized>(dialect: &D, table: &str, column: &str) -> String {
    format!(
        "ALTER TABLE {} MODIFY COLUMN {column}",
        dialect.escape_identifier(&[table])
    )
}

/// `ALTER TABLE t DROP COLUMN c`.
pub fn drop_column<D: Dialect + ?Sized>(dialect: &D, table: &str, name: &str) -> String {
    format!(
        "ALTER TABLE {} DROP COLUMN {}",
        dialect.escape_identifier(&[table]),
        dialect.escape_identifier(&[name])
    )
}

/// `CREATE [UNIQUE] INDEX i ON t (c1, c2)`.
pub fn create_index<D: Dialect + ?Sized>(
    dialect: &D,
    name: &str,
    table: &str,
    columns: &[String],
    unique: bool,
) -> String {
    let mut sql = String::from("CREATE ");
    if unique {
        sql.push_str("UNIQUE ");
    }
    sql.push_str("INDEX ");
    sql.push_str(&dialect.escape_identifier(&[name]));
    sql.push_str(" ON ");
    sql.push_str(&dialect.escape_identifier(&[table]));
    sql.push_str(" (");

    let quoted: Vec<String> = columns
        .iter()
        .map(|column| dialect.escape_identifier(&[column]))
        .collect();
    sql.push_str(&quoted.join(", "));
    sql.push(')');
    sql
}

/// `DROP INDEX [IF EXISTS] i [ON t]`.
pub fn drop_index<D: Dialect + ?Sized>(
    dialect: &D,
    name: &str,
    table: Option<&str>,
    if_exists: bool,
) -> String {
    let mut sql = String::from("DROP INDEX ");
    if if_exists {
        sql.push_str("IF EXISTS ");
    }
    sql.push_str(&dialect.escape_identifier(&[name]));
    if let Some(table) = table {
        sql.push_str(" ON ");
        sql.push_str(&dialect.escape_identifier(&[table]));
    }
    sql
}
