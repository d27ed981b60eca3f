//! CLI command implementations.
//!
//! Each command takes already-constructed services and returns a
//! serializable output; the binary decides between JSON and terminal
//! formatting.

mod index;
mod launch;
mod library;
mod search;

// index
pub use index::{execute_index, execute_watch, IndexOutput};

// launch
pub use launch::{execute_launch, LaunchOutput};

// library
pub use library::{
    execute_pin, execute_pins, execute_recent, execute_stats, execute_unpin, PinOutput, PinsOutput,
    RecentOutput, SourceCount, StatsOutput,
};

// search
pub use search::{execute_search, SearchInput, SearchOutput, SearchResultItem};
