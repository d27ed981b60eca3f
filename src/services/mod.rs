//! Core services: tokenizing, scoring, caching, search and indexing.

mod cache;
pub mod indexer;
pub mod scorer;
mod search;
pub mod tokenizer;

pub use cache::{CacheStats, CachingRepository};
pub use indexer::{
    BackgroundIndexer, IndexConfig, IndexProgress, IndexReport, Indexer, IndexerState, ProgressCallback,
};
pub use scorer::{score, MatchScore};
pub use search::{SearchConfig, SearchResult as SearchHit, SearchService, Strategy};
pub use tokenizer::{tokenize, tokenize_app};
