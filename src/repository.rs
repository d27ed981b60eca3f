//! Storage contract for indexed applications.
//!
//! Two implementations sit behind this trait: [`crate::db::Database`]
//! talks to SQLite, and [`crate::services::CachingRepository`] wraps any
//! other implementation with in-memory snapshots.

use crate::error::DbResult;
use crate::types::{ApplicationRecord, IndexedEntry};
use std::sync::Arc;

/// Immutable, point-in-time list shared between readers.
pub type Snapshot<T> = Arc<[T]>;

/// Read/write access to the application index.
///
/// Implementations must be safe to call from many threads at once and
/// must make `upsert_batch` all-or-nothing for readers.
pub trait AppRepository: Send + Sync {
    /// All indexed applications.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the underlying store cannot be read.
    fn get_all(&self) -> DbResult<Snapshot<ApplicationRecord>>;

    /// All indexed applications with their search tokens.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the underlying store cannot be read.
    fn get_all_with_tokens(&self) -> DbResult<Snapshot<IndexedEntry>>;

    /// Inserts or updates every entry and replaces its token set, as one unit.
    ///
    /// Returns the number of applications written.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the write fails; nothing from the batch is
    /// visible in that case.
    fn upsert_batch(&self, entries: &[IndexedEntry]) -> DbResult<usize>;
}

impl<T: AppRepository + ?Sized> AppRepository for Arc<T> {
    fn get_all(&self) -> DbResult<Snapshot<ApplicationRecord>> {
        (**self).get_all()
    }

    fn get_all_with_tokens(&self) -> DbResult<Snapshot<IndexedEntry>> {
        (**self).get_all_with_tokens()
    }

    fn upsert_batch(&self, entries: &[IndexedEntry]) -> DbResult<usize> {
        (**self).upsert_batch(entries)
    }
}
