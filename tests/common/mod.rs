//! Common test utilities for appseek integration tests.
//!
//! Provides `TestEnv` for setting up isolated test environments with
//! database, cache, search service and indexer all wired together.

#![allow(dead_code)] // Test utilities may not all be used in every test file

use appseek::db::Database;
use appseek::error::{DbError, DbResult};
use appseek::services::{
    CachingRepository, IndexReport, Indexer, SearchConfig, SearchHit, SearchService,
};
use appseek::sources::{DiscoverySource, StaticSource};
use appseek::{AppRepository, AppSource, ApplicationRecord, IndexedEntry, Snapshot};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// A complete test environment with all services wired together.
pub struct TestEnv {
    pub dir: TempDir,
    pub db: Arc<Database>,
    pub cache: Arc<CachingRepository>,
    pub search: SearchService,
}

impl TestEnv {
    /// Creates a new empty test environment.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let db = Arc::new(Database::in_memory().expect("Failed to create in-memory database"));
        let cache = Arc::new(CachingRepository::new(Arc::clone(&db) as Arc<dyn AppRepository>));
        let search = SearchService::new(
            Arc::clone(&cache) as Arc<dyn AppRepository>,
            SearchConfig::default(),
        );

        Self {
            dir,
            db,
            cache,
            search,
        }
    }

    /// Creates an indexer writing through this environment's cache.
    pub fn indexer(&self, sources: Vec<Arc<dyn DiscoverySource>>) -> Indexer {
        Indexer::new(Arc::clone(&self.cache) as Arc<dyn AppRepository>, sources)
    }

    /// Runs one index pass over `sources`.
    pub async fn index(&self, sources: Vec<Arc<dyn DiscoverySource>>) -> IndexReport {
        self.indexer(sources)
            .run(&CancellationToken::new())
            .await
            .expect("Index run failed")
    }

    /// Searches with a fresh, never-cancelled token.
    pub fn query(&self, query: &str) -> Vec<SearchHit> {
        self.search
            .search(query, &CancellationToken::new())
            .expect("Search failed")
    }

    /// Creates an empty executable file under the test directory.
    pub fn write_executable(&self, relative: &str) -> PathBuf {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        fs::write(&path, b"#!/bin/sh\n").expect("Failed to write executable");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
                .expect("Failed to set permissions");
        }
        path
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

pub fn app(name: &str, exe: &str, source: AppSource) -> ApplicationRecord {
    ApplicationRecord::new(name, exe, source)
}

pub fn static_source(kind: AppSource, apps: Vec<ApplicationRecord>) -> Arc<dyn DiscoverySource> {
    Arc::new(StaticSource::new(kind, apps))
}

pub fn failing_source(kind: AppSource, message: &str) -> Arc<dyn DiscoverySource> {
    Arc::new(StaticSource::failing(kind, message))
}

/// Shortcut source with a small desktop catalog.
pub fn desktop_catalog() -> Arc<dyn DiscoverySource> {
    static_source(
        AppSource::Shortcut,
        vec![
            app("Notepad", "C:\\Windows\\notepad.exe", AppSource::Shortcut),
            app("Keynote", "C:\\Apps\\Keynote\\keynote.exe", AppSource::Shortcut),
            app("Visual Studio Code", "C:\\Apps\\VSCode\\Code.exe", AppSource::Shortcut),
            app("Calculator", "C:\\Windows\\calc.exe", AppSource::Shortcut),
            app("Paint", "C:\\Windows\\mspaint.exe", AppSource::Shortcut),
        ],
    )
}

pub fn names(hits: &[SearchHit]) -> Vec<&str> {
    hits.iter().map(|h| h.app.name.as_str()).collect()
}

/// Repository wrapper that counts reads and can be told to fail.
pub struct FlakyRepository {
    pub inner: Database,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
    pub reads: AtomicU64,
}

impl FlakyRepository {
    pub fn new() -> Self {
        Self {
            inner: Database::in_memory().expect("Failed to create in-memory database"),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            reads: AtomicU64::new(0),
        }
    }

    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }
}

impl AppRepository for FlakyRepository {
    fn get_all(&self) -> DbResult<Snapshot<ApplicationRecord>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(DbError::Storage("disk unavailable".into()));
        }
        self.inner.get_all()
    }

    fn get_all_with_tokens(&self) -> DbResult<Snapshot<IndexedEntry>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(DbError::Storage("disk unavailable".into()));
        }
        self.inner.get_all_with_tokens()
    }

    fn upsert_batch(&self, entries: &[IndexedEntry]) -> DbResult<usize> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DbError::Storage("disk full".into()));
        }
        self.inner.upsert_batch(entries)
    }
}
