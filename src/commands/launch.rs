//! The `launch` command: search, then start the best hit.

use crate::error::LaunchError;
use crate::launcher::LaunchService;
use crate::services::{SearchHit, SearchService};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// Output for the launch command.
#[derive(Debug, Serialize)]
pub struct LaunchOutput {
    pub name: String,
    pub executable: String,
    pub score: i32,
}

/// Executes the launch command.
///
/// # Errors
///
/// Returns `ServerError::Launch` with `LaunchError::NoMatch` if nothing
/// matches, or `LaunchError::Spawn` if the process cannot be started.
/// Returns `ServerError::Search` if the search itself fails.
pub fn execute_launch(
    search: &SearchService,
    launches: &LaunchService,
    query: &str,
    cancel: &CancellationToken,
) -> crate::error::Result<LaunchOutput> {
    let best = best_match(search, query, cancel)?;

    launches.launch(&best.app, Some(query.trim()))?;

    Ok(LaunchOutput {
        name: best.app.name,
        executable: best.app.executable,
        score: best.score,
    })
}

/// Top search hit for `query`.
///
/// # Errors
///
/// Returns `LaunchError::NoMatch` if nothing matches.
pub(crate) fn best_match(
    search: &SearchService,
    query: &str,
    cancel: &CancellationToken,
) -> crate::error::Result<SearchHit> {
    let best = search
        .search(query, cancel)?
        .into_iter()
        .next()
        .ok_or_else(|| LaunchError::NoMatch {
            query: query.trim().to_string(),
        })?;
    Ok(best)
}
