//! Error types for appseek.
//!
//! Uses thiserror for ergonomic error handling with proper
//! error chain propagation. Cancellation is modelled as its own
//! variant so callers can tell a superseded request from a failure.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error surfaced by the binary and the command layer.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Launch error: {0}")]
    Launch(#[from] LaunchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Storage errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),

    #[error("Application not found: {id}")]
    NotFound { id: i64 },

    #[error("Storage unavailable: {0}")]
    Storage(String),
}

/// Query-time errors.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Snapshot load failed: {0}")]
    Database(#[from] DbError),

    #[error("Search cancelled")]
    Cancelled,
}

/// Indexing pipeline errors.
///
/// Source failures never show up here: they are absorbed per source.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Batch upsert failed: {0}")]
    Database(#[from] DbError),

    #[error("Indexing cancelled")]
    Cancelled,

    #[error("Indexer is already running")]
    AlreadyRunning,

    #[error("Indexing task failed: {0}")]
    Task(String),
}

/// Errors raised by a discovery source while enumerating.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error under {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Walk error: {0}")]
    Walk(String),

    #[error("Discovery failed: {0}")]
    Discovery(String),
}

/// Launch collaborator errors.
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Failed to start {executable}: {source}")]
    Spawn {
        executable: String,
        #[source]
        source: std::io::Error,
    },

    #[error("No application matches '{query}'")]
    NoMatch { query: String },
}

/// Result type alias for top-level operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Result type alias for database operations.
pub type DbResult<T> = std::result::Result<T, DbError>;

/// Result type alias for search operations.
pub type SearchResult<T> = std::result::Result<T, SearchError>;

/// Result type alias for index operations.
pub type IndexResult<T> = std::result::Result<T, IndexError>;

/// Result type alias for source enumeration.
pub type SourceResult<T> = std::result::Result<T, SourceError>;

// Error code implementations for machine-readable error responses
impl ServerError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Database(e) => e.code(),
            Self::Search(e) => e.code(),
            Self::Index(e) => e.code(),
            Self::Launch(e) => e.code(),
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }
}

impl DbError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "SQLITE_ERROR",
            Self::Pool(_) => "POOL_ERROR",
            Self::Migration(_) => "MIGRATION_ERROR",
            Self::NotFound { .. } => "APP_NOT_FOUND",
            Self::Storage(_) => "STORAGE_UNAVAILABLE",
        }
    }
}

impl SearchError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Database(e) => e.code(),
            Self::Cancelled => "CANCELLED",
        }
    }

    /// True when the search was superseded rather than failed.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl IndexError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Database(e) => e.code(),
            Self::Cancelled => "CANCELLED",
            Self::AlreadyRunning => "INDEXER_RUNNING",
            Self::Task(_) => "INDEX_TASK_ERROR",
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl SourceError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io { .. } => "SOURCE_IO_ERROR",
            Self::Walk(_) => "SOURCE_WALK_ERROR",
            Self::Discovery(_) => "SOURCE_ERROR",
        }
    }
}

impl LaunchError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Spawn { .. } => "LAUNCH_FAILED",
            Self::NoMatch { .. } => "NO_MATCH",
        }
    }
}
