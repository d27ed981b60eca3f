//! appseek: local application launcher search engine.
//!
//! This library provides:
//! - Multi-source application discovery with priority-ordered dedup
//! - A SQLite-backed index with per-application search tokens
//! - Read-through snapshot caching with write invalidation
//! - Tiered fuzzy scoring (exact, prefix, substring, subsequence)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                 CLI (clap)                  │
//! │    search, index, stats, recent, launch     │
//! └───────────┬─────────────────────┬───────────┘
//!             │                     │
//! ┌───────────▼──────────┐ ┌────────▼───────────┐
//! │    Search Service    │ │ Background Indexer │
//! │ token-prefix / scan  │ │  sources → batch   │
//! └───────────┬──────────┘ └────────┬───────────┘
//!             │                     │
//! ┌───────────▼─────────────────────▼───────────┐
//! │            Caching Repository               │
//! │     (RwLock snapshots, write-invalidate)    │
//! └─────────────────────┬───────────────────────┘
//!                       │
//!        ┌──────────────▼───────────────┐
//!        │       SQLite Database        │
//!        │    (r2d2 connection pool)    │
//!        └──────────────────────────────┘
//! ```

#[doc(hidden)]
pub mod bench_utils;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod fmt;
pub mod launcher;
pub mod repository;
pub mod services;
pub mod sources;
pub mod types;

pub use config::LauncherConfig;
pub use error::{Result, ServerError};
pub use repository::{AppRepository, Snapshot};
pub use types::{AppId, AppSource, ApplicationRecord, IndexedEntry, MatchKind};

use std::path::PathBuf;

/// Default database location: `<data dir>/appseek/index.db`.
///
/// Falls back to the current directory when the platform has no data
/// directory.
#[must_use]
pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("appseek")
        .join("index.db")
}

/// Default configuration file: `<config dir>/appseek/config.toml`.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("appseek").join("config.toml"))
}
