//! Sync orchestrator.
//!
//! Collections are synchronized one after another in registration order and
//! every operation is awaited before the next one starts. The first error
//! ends the run; operations already applied stay applied.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::SyncOptions;
use crate::ddl;
use crate::dialect::{ColumnPosition, Dialect, DialectKind};
use crate::diff::{self, ColumnChange, CustomTypes};
use crate::driver::Driver;
use crate::error::Result;
use crate::indexes::{self, IndexChange};
use crate::schema::{CollectionDescriptor, ColumnDescriptor, CustomType};

/// Outcome of a successful run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Number of DDL operations executed.
    pub changes_applied: usize,
}

/// Converges a database onto a set of declared collections.
pub struct Synchronizer<D: Driver> {
    driver: D,
    dialect: Box<dyn Dialect>,
    collections: Vec<CollectionDescriptor>,
    types: CustomTypes,
}

impl<D: Driver> Synchronizer<D> {
    /// Creates a synchronizer with default options.
    pub fn new(kind: DialectKind, driver: D) -> Self {
        Self::with_options(kind, driver, SyncOptions::default())
    }

    /// Creates a synchronizer.
    pub fn with_options(kind: DialectKind, driver: D, options: SyncOptions) -> Self {
        Self {
            driver,
            dialect: kind.dialect(options.time_zone),
            collections: Vec::new(),
            types: CustomTypes::new(),
        }
    }

    /// Registers a collection from `(name, descriptor)` pairs.
    ///
    /// Registering a name twice replaces the earlier declaration but keeps
    /// its position in the run.
    pub fn define_collection<I, N>(&mut self, name: impl Into<String>, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = (N, ColumnDescriptor)>,
        N: Into<String>,
    {
        let collection = columns
            .into_iter()
            .fold(CollectionDescriptor::new(name), |collection, (column, descriptor)| {
                collection.column(column, descriptor)
            });
        self.define(collection)
    }

    /// Registers a prebuilt collection.
    pub fn define(&mut self, mut collection: CollectionDescriptor) -> &mut Self {
        collection.columns = collection
            .columns
            .iter()
            .map(|(name, column)| (name, column.clone().normalized()))
            .collect();

        match self
            .collections
            .iter_mut()
            .find(|existing| existing.name == collection.name)
        {
            Some(existing) => *existing = collection,
            None => self.collections.push(collection),
        }
        self
    }

    /// Registers a custom column type.
    pub fn define_type(&mut self, name: impl Into<String>, custom: impl CustomType + 'static) -> &mut Self {
        self.types.insert(name.into(), Arc::new(custom));
        self
    }

    /// Registered collections, in run order.
    #[must_use]
    pub fn collections(&self) -> &[CollectionDescriptor] {
        &self.collections
    }

    /// The active dialect.
    #[must_use]
    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// The driver statements are issued through.
    #[must_use]
    pub const fn driver(&self) -> &D {
        &self.driver
    }

    /// Consumes the synchronizer, returning its driver.
    pub fn into_driver(self) -> D {
        self.driver
    }

    /// Runs one reconciliation pass over every registered collection.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by validation, type mapping,
    /// introspection or the driver. Later collections are not started.
    pub async fn sync(&self) -> Result<SyncReport> {
        info!(
            dialect = %self.dialect.kind(),
            collections = self.collections.len(),
            "Synchronizing schema"
        );

        let mut report = SyncReport::default();
        for collection in &self.collections {
            report.changes_applied += self.sync_collection(collection).await?;
        }

        info!(changes = report.changes_applied, "Synchronization complete");
        Ok(report)
    }

    /// Drops a collection. Returns false if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns the driver error if a statement fails.
    pub async fn drop_collection(&self, name: &str) -> Result<bool> {
        if !self.dialect.has_collection(&self.driver, name).await? {
            debug!(collection = %name, "Collection does not exist, nothing to drop");
            return Ok(false);
        }

        info!(collection = %name, "Dropping collection");
        self.dialect.drop_collection(&self.driver, name).await?;
        Ok(true)
    }

    // ---- per collection ----

    async fn sync_collection(&self, collection: &CollectionDescriptor) -> Result<usize> {
        collection.validate()?;

        if self
            .dialect
            .has_collection(&self.driver, &collection.name)
            .await?
        {
            let columns = self.sync_columns(collection).await?;
            Ok(columns + self.sync_indexes(collection).await?)
        } else {
            let created = self.create_collection(collection).await?;
            Ok(created + self.sync_indexes(collection).await?)
        }
    }

    async fn create_collection(&self, collection: &CollectionDescriptor) -> Result<usize> {
        let dialect = self.dialect.as_ref();

        let mut definitions = Vec::with_capacity(collection.columns.len());
        let mut pre_steps = Vec::new();
        for (name, column) in collection.columns.iter() {
            let mapped = diff::map_column(dialect, &self.types, &collection.name, name, column)?;
            if let Some(step) = &mapped.pre_step {
                pre_steps.push(step.clone());
            }
            definitions.push(ddl::column_definition(dialect, name, &mapped));
        }

        for step in &pre_steps {
            dialect.run_pre_step(&self.driver, step).await?;
        }

        let primary = dialect.check_primary(collection, collection.primary_key());
        info!(
            collection = %collection.name,
            columns = definitions.len(),
            "Creating collection"
        );
        dialect
            .create_collection(&self.driver, &collection.name, &definitions, &primary)
            .await?;
        Ok(1)
    }

    async fn sync_columns(&self, collection: &CollectionDescriptor) -> Result<usize> {
        info!(collection = %collection.name, "Synchronizing collection");

        let live = self
            .dialect
            .introspect_columns(&self.driver, &collection.name)
            .await?;
        let changes = diff::diff_columns(self.dialect.as_ref(), &self.types, collection, &live)?;

        let mut applied = 0;
        for change in &changes {
            applied += self.apply_column_change(&collection.name, change).await?;
        }
        Ok(applied)
    }

    async fn apply_column_change(&self, collection: &str, change: &ColumnChange) -> Result<usize> {
        let dialect = self.dialect.as_ref();

        match change {
            ColumnChange::Add {
                column,
                definition,
                after,
            } => {
                if let Some(step) = change.pre_step() {
                    dialect.run_pre_step(&self.driver, step).await?;
                }
                let position = dialect.supports_column_position().then(|| {
                    after
                        .clone()
                        .map_or(ColumnPosition::First, ColumnPosition::After)
                });
                debug!(collection = %collection, column = %column, "Adding column");
                dialect
                    .add_column(&self.driver, collection, column, definition, position.as_ref())
                    .await?;
            }
            ColumnChange::Modify { column, definition } => {
                if !dialect.supports_modify_column() {
                    warn!(
                        collection = %collection,
                        column = %column,
                        dialect = %dialect.kind(),
                        "Skipping column modification (unsupported by dialect)"
                    );
                    return Ok(0);
                }
                if let Some(step) = change.pre_step() {
                    dialect.run_pre_step(&self.driver, step).await?;
                }
                debug!(collection = %collection, column = %column, "Modifying column");
                dialect
                    .modify_column(&self.driver, collection, column, definition)
                    .await?;
            }
            ColumnChange::Drop { column } => {
                if !dialect.supports_drop_column() {
                    warn!(
                        collection = %collection,
                        column = %column,
                        dialect = %dialect.kind(),
                        "Skipping column drop (unsupported by dialect)"
                    );
                    return Ok(0);
                }
                debug!(collection = %collection, column = %column, "Dropping column");
                dialect.drop_column(&self.driver, collection, column).await?;
            }
        }
        Ok(1)
    }

    async fn sync_indexes(&self, collection: &CollectionDescriptor) -> Result<usize> {
        let dialect = self.dialect.as_ref();
        let desired = indexes::desired_indexes(collection, dialect);
        let live = dialect
            .introspect_indexes(&self.driver, &collection.name)
            .await?;

        let changes = indexes::diff_indexes(&desired, live);
        for change in &changes {
            match change {
                IndexChange::Add(index) => {
                    debug!(
                        collection = %collection.name,
                        index = %index.name,
                        unique = index.unique,
                        "Adding index"
                    );
                    dialect.add_index(&self.driver, index).await?;
                }
                IndexChange::Drop { name } => {
                    if desired.iter().any(|index| index.name == *name) {
                        debug!(collection = %collection.name, index = %name, "Replacing index");
                    } else {
                        debug!(collection = %collection.name, index = %name, "Removing index");
                    }
                    dialect.drop_index(&self.driver, &collection.name, name).await?;
                }
            }
        }
        Ok(changes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::DryRun;
    use crate::schema::ColumnType;
    use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    struct Slug;

    impl CustomType for Slug {
        fn datastore_type(&self, _column: &ColumnDescriptor, _dialect: DialectKind) -> String {
            "VARCHAR(64)".to_string()
        }

        fn stored_as(&self) -> ColumnType {
            ColumnType::Text
        }
    }

    #[tokio::test]
    async fn test_redefining_replaces_in_place() {
        let mut sync = Synchronizer::new(DialectKind::Sqlite, memory_pool().await);
        sync.define_collection("a", [("x", ColumnDescriptor::text())])
            .define_collection("b", [("y", ColumnDescriptor::text())])
            .define_collection("a", [("z", ColumnDescriptor::number())]);

        let names: Vec<&str> = sync.collections().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(sync.collections()[0].columns.contains("z"));
        assert!(!sync.collections()[0].columns.contains("x"));
    }

    #[tokio::test]
    async fn test_define_normalizes_serial() {
        let mut sync = Synchronizer::new(DialectKind::Sqlite, memory_pool().await);
        let mut collection = CollectionDescriptor::new("t");
        collection
            .columns
            .insert("id", ColumnDescriptor::new(ColumnType::Serial));
        sync.define(collection);

        let id = sync.collections()[0].columns.get("id").unwrap();
        assert!(id.primary && id.required);
    }

    #[tokio::test]
    async fn test_custom_type_used_on_create() {
        let driver = DryRun::new(memory_pool().await);
        let mut sync = Synchronizer::with_options(
            DialectKind::Sqlite,
            driver,
            SyncOptions::new().time_zone(crate::literal::TimeZone::utc()),
        );
        sync.define_type("slug", Slug)
            .define_collection("pages", [("slug", ColumnDescriptor::custom("slug"))]);

        let report = sync.sync().await.unwrap();
        assert_eq!(report.changes_applied, 1);
        assert_eq!(
            sync.driver().statements(),
            vec!["CREATE TABLE \"pages\" (\"slug\" VARCHAR(64))".to_string()]
        );
    }

    #[tokio::test]
    async fn test_drop_missing_collection_is_noop() {
        let sync = Synchronizer::new(DialectKind::Sqlite, memory_pool().await);
        assert!(!sync.drop_collection("nothing").await.unwrap());
    }
}
