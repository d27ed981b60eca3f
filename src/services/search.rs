//! Query orchestration over the cached application snapshots.
//!
//! Short queries are pre-filtered by token prefix, longer ones score
//! every candidate. Results are ordered by a total order so identical
//! inputs always produce identical output.

use crate::error::SearchError;
use crate::repository::AppRepository;
use crate::services::scorer::{self, MatchScore};
use crate::types::{ApplicationRecord, MatchKind};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A scored application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub app: ApplicationRecord,
    pub score: i32,
    pub kind: MatchKind,
}

/// Configuration for search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Maximum results to return
    pub max_results: usize,
    /// Queries up to this many chars use the token-prefix strategy
    pub token_prefix_threshold: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: 20,
            token_prefix_threshold: 3,
        }
    }
}

/// Which candidate set a query was evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Token snapshot, filtered by token prefix.
    TokenPrefix,
    /// Plain snapshot, every record scored.
    FullScan,
}

impl Strategy {
    /// Picks the strategy for an already trimmed query.
    #[must_use]
    pub fn for_query(trimmed: &str, threshold: usize) -> Self {
        if trimmed.chars().count() <= threshold {
            Self::TokenPrefix
        } else {
            Self::FullScan
        }
    }
}

struct Candidate<'a> {
    app: &'a ApplicationRecord,
    score: MatchScore,
    name_len: usize,
}

/// Search orchestrator.
///
/// Thread-safe (Send + Sync): holds only a shared repository handle and
/// immutable configuration. Any number of searches may run at once.
pub struct SearchService {
    repo: Arc<dyn AppRepository>,
    config: SearchConfig,
}

impl SearchService {
    pub fn new(repo: Arc<dyn AppRepository>, config: SearchConfig) -> Self {
        Self { repo, config }
    }

    #[must_use]
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Runs a query and returns at most `max_results` hits, best first.
    ///
    /// Blank queries return an empty list without touching storage.
    /// Cancellation is checked before every candidate; a cancelled search
    /// returns [`SearchError::Cancelled`] and never partial results.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Database` if the snapshot cannot be loaded.
    /// Returns `SearchError::Cancelled` if `cancel` fires mid-search.
    pub fn search(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }

        let strategy = Strategy::for_query(trimmed, self.config.token_prefix_threshold);
        let results = match strategy {
            Strategy::TokenPrefix => {
                let entries = self.repo.get_all_with_tokens()?;
                let prefix = trimmed.to_lowercase();
                let mut candidates = Vec::new();
                for entry in entries.iter() {
                    if cancel.is_cancelled() {
                        return Err(SearchError::Cancelled);
                    }
                    if entry.has_token_prefix(&prefix) {
                        push_candidate(&mut candidates, trimmed, &entry.app);
                    }
                }
                self.rank(candidates)
            }
            Strategy::FullScan => {
                let apps = self.repo.get_all()?;
                let mut candidates = Vec::new();
                for app in apps.iter() {
                    if cancel.is_cancelled() {
                        return Err(SearchError::Cancelled);
                    }
                    push_candidate(&mut candidates, trimmed, app);
                }
                self.rank(candidates)
            }
        };

        tracing::debug!(
            "Search '{}' ({:?}) returned {} results",
            trimmed,
            strategy,
            results.len()
        );
        Ok(results)
    }

    /// Orders candidates and keeps the top `max_results`.
    fn rank(&self, mut candidates: Vec<Candidate<'_>>) -> Vec<SearchResult> {
        let limit = self.config.max_results;
        if limit == 0 {
            return Vec::new();
        }
        if candidates.len() > limit {
            candidates.select_nth_unstable_by(limit, compare_candidates);
            candidates.truncate(limit);
        }
        candidates.sort_unstable_by(compare_candidates);

        // Only the survivors are cloned
        candidates
            .into_iter()
            .map(|c| SearchResult {
                app: c.app.clone(),
                score: c.score.score,
                kind: c.score.kind,
            })
            .collect()
    }
}

fn push_candidate<'a>(candidates: &mut Vec<Candidate<'a>>, query: &str, app: &'a ApplicationRecord) {
    let score = scorer::score(query, &app.name);
    if score.is_match() {
        candidates.push(Candidate {
            app,
            score,
            name_len: app.name.chars().count(),
        });
    }
}

/// Score descending, then name length, name, executable (both
/// case-insensitive). Arguments and ID make the order total.
fn compare_candidates(a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
    b.score
        .score
        .cmp(&a.score.score)
        .then_with(|| a.name_len.cmp(&b.name_len))
        .then_with(|| cmp_folded(&a.app.name, &b.app.name))
        .then_with(|| cmp_folded(&a.app.executable, &b.app.executable))
        .then_with(|| a.app.arguments.cmp(&b.app.arguments))
        .then_with(|| a.app.id.cmp(&b.app.id))
}

fn cmp_folded(a: &str, b: &str) -> Ordering {
    a.chars().map(scorer::fold).cmp(b.chars().map(scorer::fold))
}

// Compile-time assertions for thread safety.
#[cfg(test)]
const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<SearchService>();
};
