//! Application discovery sources.
//!
//! A source enumerates raw [`ApplicationRecord`]s as a lazy stream. Every
//! call to [`DiscoverySource::discover`] starts a fresh enumeration, so
//! the same source can be scanned on every index run.

mod filesystem;
mod static_source;

pub use filesystem::{FilesystemScanConfig, FilesystemSource};
pub use static_source::StaticSource;

use crate::error::SourceResult;
use crate::types::{AppSource, ApplicationRecord};
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

/// Stream of discovered records. An `Err` item fails the whole source.
pub type SourceStream = BoxStream<'static, SourceResult<ApplicationRecord>>;

/// One origin of application records.
pub trait DiscoverySource: Send + Sync {
    /// Origin tag; decides scan priority.
    fn kind(&self) -> AppSource;

    /// Label used in logs.
    fn name(&self) -> &str {
        self.kind().as_str()
    }

    /// Starts a new enumeration.
    ///
    /// Implementations should stop producing once `cancel` fires; the
    /// indexer also stops polling the stream at that point.
    fn discover(&self, cancel: CancellationToken) -> SourceStream;
}
