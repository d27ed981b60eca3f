//! The `stats`, `recent` and pin commands.

use super::launch::best_match;
use crate::db::{Database, Pin, RecentLaunch};
use crate::error::LaunchError;
use crate::services::{CacheStats, CachingRepository, SearchService};
use crate::types::{AppId, AppSource, ApplicationRecord};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// Output for the stats command.
#[derive(Debug, Serialize)]
pub struct StatsOutput {
    pub total_apps: u64,
    pub total_tokens: u64,
    /// Counts per discovery source, in priority order
    pub by_source: Vec<SourceCount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheStats>,
}

#[derive(Debug, Serialize)]
pub struct SourceCount {
    pub source: AppSource,
    pub count: u64,
}

/// Executes the stats command.
///
/// # Errors
///
/// Returns `ServerError::Database` if the counts cannot be read.
pub fn execute_stats(
    db: &Database,
    cache: Option<&CachingRepository>,
) -> crate::error::Result<StatsOutput> {
    let by_source = db
        .counts_by_source()?
        .into_iter()
        .map(|(source, count)| SourceCount { source, count })
        .collect();

    Ok(StatsOutput {
        total_apps: db.app_count()?,
        total_tokens: db.token_count()?,
        by_source,
        cache: cache.map(CachingRepository::stats),
    })
}

/// Output for the recent command.
#[derive(Debug, Serialize)]
pub struct RecentOutput {
    pub launches: Vec<RecentLaunch>,
}

/// Executes the recent command.
///
/// # Errors
///
/// Returns `ServerError::Database` if the history cannot be read.
pub fn execute_recent(db: &Database, limit: usize) -> crate::error::Result<RecentOutput> {
    Ok(RecentOutput {
        launches: db.recent_launches(limit)?,
    })
}

/// Output for the pin and unpin commands.
#[derive(Debug, Serialize)]
pub struct PinOutput {
    pub name: String,
    pub executable: String,
    pub pinned: bool,
    /// False when the app was already in the requested state
    pub changed: bool,
}

fn pin_target(
    search: &SearchService,
    query: &str,
    cancel: &CancellationToken,
) -> crate::error::Result<(AppId, ApplicationRecord)> {
    let app = best_match(search, query, cancel)?.app;
    // Hits come from storage, so this only fails for unstored records
    let id = app.id.ok_or_else(|| LaunchError::NoMatch {
        query: query.trim().to_string(),
    })?;
    Ok((id, app))
}

/// Pins the best match for `query`.
///
/// # Errors
///
/// Returns `ServerError::Launch` with `LaunchError::NoMatch` if nothing
/// matches, or `ServerError::Database` if the pin cannot be stored.
pub fn execute_pin(
    search: &SearchService,
    db: &Database,
    query: &str,
    cancel: &CancellationToken,
) -> crate::error::Result<PinOutput> {
    let (id, app) = pin_target(search, query, cancel)?;
    let changed = db.add_pin(id)?;
    Ok(PinOutput {
        name: app.name,
        executable: app.executable,
        pinned: true,
        changed,
    })
}

/// Unpins the best match for `query`.
///
/// # Errors
///
/// Same as [`execute_pin`].
pub fn execute_unpin(
    search: &SearchService,
    db: &Database,
    query: &str,
    cancel: &CancellationToken,
) -> crate::error::Result<PinOutput> {
    let (id, app) = pin_target(search, query, cancel)?;
    let changed = db.remove_pin(id)?;
    Ok(PinOutput {
        name: app.name,
        executable: app.executable,
        pinned: false,
        changed,
    })
}

/// Output for the pins command.
#[derive(Debug, Serialize)]
pub struct PinsOutput {
    pub pins: Vec<Pin>,
}

/// Lists pinned applications.
///
/// # Errors
///
/// Returns `ServerError::Database` if the pins cannot be read.
pub fn execute_pins(db: &Database) -> crate::error::Result<PinsOutput> {
    Ok(PinsOutput { pins: db.pins()? })
}
