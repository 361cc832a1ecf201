//! Declarative schema synchronization for SQL databases.
//!
//! `ddl-sync` compares collections declared in code against the live
//! structure of a MySQL, PostgreSQL or SQLite database and executes the DDL
//! needed to converge the two:
//! - Missing tables are created, columns are added, modified and dropped
//! - Indexes are derived from column annotations and kept in step
//! - A second run against an unchanged database applies zero changes
//!
//! # Architecture
//!
//! - **Schema** - Abstract column vocabulary shared by every dialect
//! - **Dialect** - Type mapping, escaping, introspection and DDL per database
//! - **DDL** - Statement templates parameterized by a dialect's escaping
//! - **Diff** - Column add/modify/drop decisions
//! - **Indexes** - Index derivation and diffing
//! - **Sync** - Sequential, fail-fast orchestration with a change count
//! - **Driver** - The connection seam, implemented for sqlx pools
//!
//! # Example
//!
//! ```rust,ignore
//! use ddl_sync::prelude::*;
//! use sqlx::sqlite::SqlitePoolOptions;
//!
//! let pool = SqlitePoolOptions::new()
//!     .max_connections(1)
//!     .connect("sqlite::memory:")
//!     .await?;
//!
//! let mut sync = Synchronizer::new(DialectKind::Sqlite, pool);
//! sync.define_collection(
//!     "users",
//!     [
//!         ("id", ColumnDescriptor::serial()),
//!         ("name", ColumnDescriptor::text().required().default_value("John")),
//!         ("age", ColumnDescriptor::number().rational()),
//!         ("email", ColumnDescriptor::text().unique()),
//!     ],
//! );
//!
//! let report = sync.sync().await?;
//! assert!(report.changes_applied > 0);
//! assert_eq!(sync.sync().await?.changes_applied, 0);
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Converge a database onto a schema file
//! ddl-sync --database sqlite:app.db sync --schema schema.json
//!
//! # Print the statements without running them
//! ddl-sync --database postgres://localhost/app sync --schema schema.json --dry-run
//!
//! # Drop a table
//! ddl-sync --database mysql://localhost/app drop --table users
//! ```

pub mod config;
pub mod ddl;
pub mod dialect;
pub mod diff;
pub mod driver;
pub mod error;
pub mod indexes;
pub mod literal;
pub mod schema;
pub mod schema_file;
pub mod sync;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::{resolve_dialect, SyncOptions};
    pub use crate::dialect::{
        ColumnPosition, Dialect, DialectKind, MappedType, MysqlDialect, PostgresDialect, PreStep,
        SqliteDialect,
    };
    pub use crate::diff::{diff_columns, needs_sync, ColumnChange};
    pub use crate::driver::{Driver, DryRun, Row, Value};
    pub use crate::error::{Result, SyncError};
    pub use crate::indexes::{desired_indexes, diff_indexes, IndexChange};
    pub use crate::literal::{Literal, TimeZone};
    pub use crate::schema::{
        CollectionDescriptor, ColumnDescriptor, ColumnType, Columns, CustomType, IndexDescriptor,
        IndexMembership, LiveIndex, LiveIndexes,
    };
    pub use crate::schema_file::SchemaFile;
    pub use crate::sync::{SyncReport, Synchronizer};
}
