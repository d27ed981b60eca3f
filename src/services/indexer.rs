//! Application indexing pipeline.
//!
//! One run scans every source in priority order, drops records whose
//! dedup key was already produced by an earlier source, tokenizes the
//! survivors and commits them as a single batch. A source that fails
//! contributes nothing; the run carries on with the next one.
//!
//! [`BackgroundIndexer`] owns the long-lived task and its
//! Idle → Running → Stopping → Idle lifecycle.

use crate::error::{IndexError, IndexResult, SourceError};
use crate::repository::AppRepository;
use crate::services::tokenizer::tokenize_app;
use crate::sources::DiscoverySource;
use crate::types::{ApplicationRecord, DedupKey, IndexedEntry};
use ahash::AHashSet;
use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;

/// Progress callback type, invoked once per finished source.
pub type ProgressCallback = Box<dyn Fn(IndexProgress) + Send + Sync>;

/// Indexing progress information.
#[derive(Debug, Clone, Serialize)]
pub struct IndexProgress {
    pub source: String,
    pub sources_done: usize,
    pub sources_total: usize,
    /// Records the source produced (0 if it failed)
    pub records: usize,
    pub failed: bool,
}

/// Configuration for indexing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Re-run the index this often; `None` runs once
    pub reindex_interval_secs: Option<u64>,
    /// How long `stop_indexing` waits before aborting the task
    pub stop_timeout_ms: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            reindex_interval_secs: None,
            stop_timeout_ms: 5000,
        }
    }
}

impl IndexConfig {
    #[must_use]
    pub fn reindex_interval(&self) -> Option<Duration> {
        self.reindex_interval_secs.map(Duration::from_secs)
    }

    #[must_use]
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

/// Outcome of one index run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    /// Records yielded by sources that completed
    pub discovered: usize,
    /// Entries written to storage
    pub indexed: usize,
    /// Records dropped because an earlier source had the same key
    pub duplicates: usize,
    pub failed_sources: usize,
    /// False when the batch was empty and storage was left alone
    pub committed: bool,
    pub elapsed_ms: u64,
}

/// Why draining a source stopped early.
enum DrainError {
    Cancelled,
    Source(SourceError),
}

/// Runs index passes over a fixed set of sources.
pub struct Indexer {
    repo: Arc<dyn AppRepository>,
    /// Sorted by source priority.
    sources: Vec<Arc<dyn DiscoverySource>>,
    progress: Option<ProgressCallback>,
}

impl Indexer {
    /// Creates an indexer. Sources are scanned in [`AppSource`] priority
    /// order regardless of the order given here; sources of the same kind
    /// keep their relative order.
    ///
    /// [`AppSource`]: crate::types::AppSource
    pub fn new(repo: Arc<dyn AppRepository>, mut sources: Vec<Arc<dyn DiscoverySource>>) -> Self {
        sources.sort_by_key(|s| s.kind().priority());
        Self {
            repo,
            sources,
            progress: None,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    #[must_use]
    pub fn sources(&self) -> &[Arc<dyn DiscoverySource>] {
        &self.sources
    }

    /// Performs one full index run.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::Cancelled` if `cancel` fires before the batch
    /// is handed to storage; nothing is written in that case.
    /// Returns `IndexError::Database` if the batch upsert fails; the
    /// previously committed index stays intact.
    /// Returns `IndexError::Task` if the blocking upsert task panics.
    pub async fn run(&self, cancel: &CancellationToken) -> IndexResult<IndexReport> {
        let start = Instant::now();
        let mut report = IndexReport::default();
        let mut seen: AHashSet<DedupKey> = AHashSet::new();
        let mut batch: Vec<IndexedEntry> = Vec::new();
        let total = self.sources.len();

        for (i, source) in self.sources.iter().enumerate() {
            let outcome = drain(source.as_ref(), cancel).await;
            let records = match outcome {
                Ok(records) => records,
                Err(DrainError::Cancelled) => {
                    tracing::info!("Indexing cancelled during source '{}'", source.name());
                    return Err(IndexError::Cancelled);
                }
                Err(DrainError::Source(e)) => {
                    tracing::warn!("Source '{}' failed, skipping: {e}", source.name());
                    report.failed_sources += 1;
                    self.report_progress(source.name(), i + 1, total, 0, true);
                    continue;
                }
            };

            let produced = records.len();
            report.discovered += produced;
            for record in records {
                if !seen.insert(record.dedup_key()) {
                    report.duplicates += 1;
                    continue;
                }
                batch.push(prepare(record));
            }
            self.report_progress(source.name(), i + 1, total, produced, false);
        }

        if batch.is_empty() {
            // Leave a previously good index alone
            tracing::info!(
                "No applications discovered ({} failed sources); storage untouched",
                report.failed_sources
            );
            report.elapsed_ms = elapsed_ms(start);
            return Ok(report);
        }

        if cancel.is_cancelled() {
            tracing::info!("Indexing cancelled before commit");
            return Err(IndexError::Cancelled);
        }

        let repo = Arc::clone(&self.repo);
        let written = tokio::task::spawn_blocking(move || repo.upsert_batch(&batch))
            .await
            .map_err(|e| IndexError::Task(e.to_string()))?
            .map_err(|e| {
                tracing::error!("Batch upsert failed: {e}");
                IndexError::from(e)
            })?;

        report.indexed = written;
        report.committed = true;
        report.elapsed_ms = elapsed_ms(start);
        tracing::info!(
            "Indexed {} applications ({} duplicates dropped, {} failed sources) in {}ms",
            report.indexed,
            report.duplicates,
            report.failed_sources,
            report.elapsed_ms
        );
        Ok(report)
    }

    fn report_progress(&self, source: &str, done: usize, total: usize, records: usize, failed: bool) {
        if let Some(ref callback) = self.progress {
            callback(IndexProgress {
                source: source.to_string(),
                sources_done: done,
                sources_total: total,
                records,
                failed,
            });
        }
    }
}

/// Collects one source's records. Nothing is kept if the source fails.
async fn drain(
    source: &dyn DiscoverySource,
    cancel: &CancellationToken,
) -> Result<Vec<ApplicationRecord>, DrainError> {
    if cancel.is_cancelled() {
        return Err(DrainError::Cancelled);
    }

    let mut stream = source.discover(cancel.clone());
    let mut records = Vec::new();
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(DrainError::Cancelled),
            item = stream.next() => match item {
                Some(Ok(record)) => records.push(record),
                Some(Err(e)) => return Err(DrainError::Source(e)),
                None => return Ok(records),
            },
        }
    }
}

/// Stamps and tokenizes a record that made it into the batch.
fn prepare(mut record: ApplicationRecord) -> IndexedEntry {
    record.last_indexed = Some(Utc::now());
    let tokens = tokenize_app(&record);
    IndexedEntry::new(record, tokens)
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Lifecycle of the background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexerState {
    Idle,
    Running,
    Stopping,
}

/// Completion of the spawned task, awaitable from several places at once.
///
/// `Err` carries the panic message; an aborted task counts as finished.
type TaskOutcome = Shared<BoxFuture<'static, Result<(), String>>>;

struct Task {
    outcome: TaskOutcome,
    abort: AbortHandle,
}

impl Task {
    fn spawn(future: impl Future<Output = ()> + Send + 'static) -> Self {
        let handle = tokio::spawn(future);
        let abort = handle.abort_handle();
        let outcome = async move {
            match handle.await {
                Err(e) if e.is_panic() => Err(e.to_string()),
                _ => Ok(()),
            }
        }
        .boxed()
        .shared();
        Self { outcome, abort }
    }

    fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

struct Lifecycle {
    state: IndexerState,
    cancel: Option<CancellationToken>,
    task: Option<Task>,
}

/// Owns the background indexing task.
///
/// Thread-safe (Send + Sync). The lifecycle mutex is never held across
/// an await point.
pub struct BackgroundIndexer {
    indexer: Arc<Indexer>,
    config: IndexConfig,
    lifecycle: Mutex<Lifecycle>,
    last_report: Arc<RwLock<Option<IndexReport>>>,
    completed_runs: Arc<AtomicU64>,
}

impl BackgroundIndexer {
    pub fn new(indexer: Arc<Indexer>, config: IndexConfig) -> Self {
        Self {
            indexer,
            config,
            lifecycle: Mutex::new(Lifecycle {
                state: IndexerState::Idle,
                cancel: None,
                task: None,
            }),
            last_report: Arc::new(RwLock::new(None)),
            completed_runs: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Current state. A task that finished on its own reads as Idle.
    #[must_use]
    pub fn state(&self) -> IndexerState {
        let lifecycle = self.lifecycle.lock().unwrap_or_else(|e| e.into_inner());
        match lifecycle.state {
            IndexerState::Running if lifecycle.task.as_ref().is_some_and(Task::is_finished) => {
                IndexerState::Idle
            }
            state => state,
        }
    }

    /// Report of the most recent successful run.
    #[must_use]
    pub fn last_report(&self) -> Option<IndexReport> {
        self.last_report
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of runs that reached the end (committed or empty).
    #[must_use]
    pub fn completed_runs(&self) -> u64 {
        self.completed_runs.load(Ordering::Relaxed)
    }

    /// Spawns the indexing task.
    ///
    /// The task's token is a child of `cancel`, so cancelling the caller's
    /// token also stops indexing. With a re-index interval configured the
    /// task keeps running until stopped.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::AlreadyRunning` if a task is live or stopping.
    pub fn start_indexing(&self, cancel: &CancellationToken) -> IndexResult<()> {
        let mut lifecycle = self.lifecycle.lock().unwrap_or_else(|e| e.into_inner());
        match lifecycle.state {
            IndexerState::Stopping => return Err(IndexError::AlreadyRunning),
            IndexerState::Running if !lifecycle.task.as_ref().is_some_and(Task::is_finished) => {
                return Err(IndexError::AlreadyRunning);
            }
            _ => {}
        }

        let token = cancel.child_token();
        let task = Task::spawn(run_loop(
            Arc::clone(&self.indexer),
            token.clone(),
            self.config.reindex_interval(),
            Arc::clone(&self.last_report),
            Arc::clone(&self.completed_runs),
        ));

        lifecycle.state = IndexerState::Running;
        lifecycle.cancel = Some(token);
        lifecycle.task = Some(task);
        tracing::debug!("Background indexer started");
        Ok(())
    }

    /// Cancels the running task and waits for it to unwind.
    ///
    /// Waits at most `stop_timeout`; a task that has not finished by then
    /// is aborted. Stopping an idle indexer is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::Cancelled` if `cancel` fires while waiting
    /// (the task is aborted first).
    /// Returns `IndexError::Task` if the task panicked.
    pub async fn stop_indexing(&self, cancel: &CancellationToken) -> IndexResult<()> {
        let (token, task) = {
            let mut lifecycle = self.lifecycle.lock().unwrap_or_else(|e| e.into_inner());
            if lifecycle.state != IndexerState::Running {
                return Ok(());
            }
            lifecycle.state = IndexerState::Stopping;
            (lifecycle.cancel.take(), lifecycle.task.take())
        };

        if let Some(token) = token {
            token.cancel();
        }

        let result = match task {
            Some(task) => self.await_stop(task, cancel).await,
            None => Ok(()),
        };

        let mut lifecycle = self.lifecycle.lock().unwrap_or_else(|e| e.into_inner());
        lifecycle.state = IndexerState::Idle;
        drop(lifecycle);
        tracing::debug!("Background indexer stopped");
        result
    }

    /// Waits for the current task to finish on its own.
    ///
    /// Returns the last report. Used by one-shot callers (the CLI) that
    /// start a single run and need its outcome. The task stays visible
    /// to a concurrent `stop_indexing`, which still cancels and waits.
    pub async fn join(&self) -> Option<IndexReport> {
        let outcome = {
            let lifecycle = self.lifecycle.lock().unwrap_or_else(|e| e.into_inner());
            lifecycle.task.as_ref().map(|task| task.outcome.clone())
        };

        if let Some(outcome) = outcome {
            if let Err(e) = outcome.await {
                tracing::error!("Indexing task panicked: {e}");
            }

            let mut lifecycle = self.lifecycle.lock().unwrap_or_else(|e| e.into_inner());
            // A stop in progress, or a task started since, owns the state
            if lifecycle.state == IndexerState::Running
                && lifecycle.task.as_ref().is_some_and(Task::is_finished)
            {
                lifecycle.state = IndexerState::Idle;
                lifecycle.cancel = None;
                lifecycle.task = None;
            }
        }
        self.last_report()
    }

    async fn await_stop(&self, task: Task, cancel: &CancellationToken) -> IndexResult<()> {
        let timeout = self.config.stop_timeout();
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            joined = tokio::time::timeout(timeout, task.outcome.clone()) => Some(joined),
        };

        match outcome {
            None => {
                task.abort.abort();
                Err(IndexError::Cancelled)
            }
            Some(Err(_elapsed)) => {
                tracing::warn!("Indexer did not stop within {timeout:?}; aborting");
                task.abort.abort();
                Ok(())
            }
            Some(Ok(Err(panic))) => Err(IndexError::Task(panic)),
            // Finished, or the expected cancellation
            Some(Ok(Ok(()))) => Ok(()),
        }
    }
}

async fn run_loop(
    indexer: Arc<Indexer>,
    cancel: CancellationToken,
    interval: Option<Duration>,
    last_report: Arc<RwLock<Option<IndexReport>>>,
    completed_runs: Arc<AtomicU64>,
) {
    loop {
        match indexer.run(&cancel).await {
            Ok(report) => {
                *last_report.write().unwrap_or_else(|e| e.into_inner()) = Some(report);
                completed_runs.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) if e.is_cancelled() => return,
            // Logged where it happened; the next interval retries
            Err(_) => {}
        }

        let Some(interval) = interval else {
            return;
        };
        tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            () = tokio::time::sleep(interval) => {}
        }
    }
}

// Compile-time assertions for thread safety.
#[cfg(test)]
const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Indexer>();
    assert_send_sync::<BackgroundIndexer>();
};
