//! Synthetic application catalogs for benchmarks and tests.
//!
//! Catalogs are deterministic: the same `count` always produces the same
//! names and paths, so benchmark runs are comparable.

use crate::db::Database;
use crate::error::DbResult;
use crate::repository::AppRepository;
use crate::services::tokenize_app;
use crate::types::{AppSource, ApplicationRecord, IndexedEntry};

const VENDORS: &[&str] = &[
    "Adobe", "Microsoft", "Mozilla", "JetBrains", "Valve", "Blender", "Gnome", "Oracle", "Zoom",
    "Slack", "Discord", "Spotify", "Docker", "GitHub", "Postman", "Notion",
];

const PRODUCTS: &[&str] = &[
    "Studio", "Editor", "Player", "Browser", "Terminal", "Viewer", "Manager", "Designer", "Console",
    "Notes", "Mail", "Calendar", "Desktop", "Launcher", "Explorer", "Monitor", "Recorder",
];

/// Generates `count` applications with unique dedup keys.
///
/// Sources rotate through every [`AppSource`] so priority code paths are
/// exercised too. Packaged names carry the index to keep keys unique.
pub fn synthetic_apps(count: usize) -> Vec<ApplicationRecord> {
    (0..count)
        .map(|i| {
            let vendor = VENDORS[i % VENDORS.len()];
            let product = PRODUCTS[(i / VENDORS.len()) % PRODUCTS.len()];
            let source = AppSource::ALL[i % AppSource::ALL.len()];
            let name = format!("{vendor} {product} {i}");
            let exe = format!(
                "/opt/{}/{}-{i}",
                vendor.to_lowercase(),
                product.to_lowercase()
            );
            ApplicationRecord::new(name, exe, source)
        })
        .collect()
}

/// Synthetic applications with their tokens.
pub fn synthetic_entries(count: usize) -> Vec<IndexedEntry> {
    synthetic_apps(count)
        .into_iter()
        .map(|app| {
            let tokens = tokenize_app(&app);
            IndexedEntry::new(app, tokens)
        })
        .collect()
}

/// In-memory database preloaded with `count` synthetic applications.
///
/// # Errors
///
/// Returns `DbError` if the database cannot be created or written.
pub fn populated_database(count: usize) -> DbResult<Database> {
    let db = Database::in_memory()?;
    db.upsert_batch(&synthetic_entries(count))?;
    Ok(db)
}
