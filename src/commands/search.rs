//! The `search` command.

use crate::services::{SearchHit, SearchService, Strategy};
use crate::types::AppSource;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Input for the search command.
#[derive(Debug, Deserialize)]
pub struct SearchInput {
    /// Query text; surrounding whitespace is ignored
    pub query: String,
}

/// Output for the search command.
#[derive(Debug, Serialize)]
pub struct SearchOutput {
    /// Query that was executed (trimmed)
    pub query: String,
    /// `token_prefix` or `full_scan`
    pub strategy: &'static str,
    /// Number of results returned
    pub total_returned: usize,
    pub results: Vec<SearchResultItem>,
}

/// A single search result.
#[derive(Debug, Serialize)]
pub struct SearchResultItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    pub executable: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
    pub source: AppSource,
    /// Match kind: exact, prefix, substring or fuzzy
    pub kind: &'static str,
    pub score: i32,
}

impl From<SearchHit> for SearchResultItem {
    fn from(hit: SearchHit) -> Self {
        Self {
            id: hit.app.id.map(|id| id.as_i64()),
            name: hit.app.name,
            executable: hit.app.executable,
            arguments: hit.app.arguments,
            source: hit.app.source,
            kind: hit.kind.as_str(),
            score: hit.score,
        }
    }
}

/// Executes the search command.
///
/// # Errors
///
/// Returns `ServerError::Search` if the snapshot cannot be loaded or the
/// search is cancelled.
pub fn execute_search(
    service: &SearchService,
    input: SearchInput,
    cancel: &CancellationToken,
) -> crate::error::Result<SearchOutput> {
    let query = input.query.trim().to_string();
    let strategy = match Strategy::for_query(&query, service.config().token_prefix_threshold) {
        Strategy::TokenPrefix => "token_prefix",
        Strategy::FullScan => "full_scan",
    };

    let results: Vec<SearchResultItem> = service
        .search(&query, cancel)?
        .into_iter()
        .map(SearchResultItem::from)
        .collect();

    Ok(SearchOutput {
        query,
        strategy,
        total_returned: results.len(),
        results,
    })
}
