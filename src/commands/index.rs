//! The `index` command.

use crate::services::{BackgroundIndexer, IndexReport, Indexer};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// Output for the index command.
#[derive(Debug, Serialize)]
pub struct IndexOutput {
    pub report: IndexReport,
    /// Human-readable summary
    pub message: String,
}

impl From<IndexReport> for IndexOutput {
    fn from(report: IndexReport) -> Self {
        let message = if report.committed {
            format!(
                "Indexed {} applications ({} duplicates, {} failed sources) in {}ms",
                report.indexed, report.duplicates, report.failed_sources, report.elapsed_ms
            )
        } else {
            format!(
                "Nothing discovered ({} failed sources); existing index kept",
                report.failed_sources
            )
        };
        Self { report, message }
    }
}

/// Executes a single index run.
///
/// # Errors
///
/// Returns `ServerError::Index` if the run is cancelled or the batch
/// upsert fails.
pub async fn execute_index(
    indexer: &Indexer,
    cancel: &CancellationToken,
) -> crate::error::Result<IndexOutput> {
    let report = indexer.run(cancel).await?;
    Ok(IndexOutput::from(report))
}

/// Keeps the background indexer running until `shutdown` fires, then
/// stops it and returns the last report.
///
/// # Errors
///
/// Returns `ServerError::Index` if the indexer cannot be started or
/// fails while stopping.
pub async fn execute_watch(
    background: &BackgroundIndexer,
    shutdown: &CancellationToken,
) -> crate::error::Result<Option<IndexOutput>> {
    // The task gets its own root token so shutdown goes through stop_indexing
    let root = CancellationToken::new();
    background.start_indexing(&root)?;
    tracing::info!("Watching for application changes (Ctrl-C to stop)");

    shutdown.cancelled().await;
    background.stop_indexing(&CancellationToken::new()).await?;

    Ok(background.last_report().map(IndexOutput::from))
}
