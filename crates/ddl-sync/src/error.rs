//! Error types for schema synchronization.

/// Errors that can occur while synchronizing a schema.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Introspection found a native column type no dialect mapping recognizes.
    #[error("Unknown column type '{native}' for column '{collection}.{column}'")]
    UnknownColumnType {
        /// Collection being introspected.
        collection: String,
        /// Column carrying the type.
        column: String,
        /// Native type string as reported by the database.
        native: String,
    },

    /// A declared column cannot be rendered by the active dialect.
    #[error("Unknown type '{column_type}' for property '{collection}.{column}'")]
    UnmappableType {
        /// Collection the column belongs to.
        collection: String,
        /// Column name.
        column: String,
        /// Abstract type that failed to map.
        column_type: String,
    },

    /// A declared column violates the descriptor rules.
    #[error("Invalid descriptor for '{collection}.{column}': {reason}")]
    InvalidDescriptor {
        /// Collection the column belongs to.
        collection: String,
        /// Column name.
        column: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Database error, passed through unchanged.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Dialect name or URL scheme not recognized.
    #[error("Unsupported dialect: {0}")]
    UnsupportedDialect(String),

    /// Time zone string could not be parsed.
    #[error("Invalid time zone: {0}")]
    InvalidTimeZone(String),

    /// Schema file content is not valid.
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// IO error (reading schema files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for synchronization operations.
pub type Result<T> = std::result::Result<T, SyncError>;
