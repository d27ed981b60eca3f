//! SQLite-backed application store with connection pooling.

mod pragmas;
mod schema;

pub use pragmas::{apply_pragmas, PragmaCustomizer};
pub use schema::{init_schema, SCHEMA_VERSION};

use crate::error::{DbError, DbResult};
use crate::repository::{AppRepository, Snapshot};
use crate::types::{AppId, AppSource, ApplicationRecord, IndexedEntry};
use ahash::AHashMap;
use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OptionalExtension, Row, TransactionBehavior};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;

const APP_COLUMNS: &str = "app_id, name, executable, arguments, working_directory, icon, \
                           source, package_family, last_indexed";

/// One entry of the launch history.
#[derive(Debug, Clone, Serialize)]
pub struct RecentLaunch {
    pub app: ApplicationRecord,
    pub launched_at: DateTime<Utc>,
    /// Query text that led to the launch, if any.
    pub query: Option<String>,
}

/// A pinned application.
#[derive(Debug, Clone, Serialize)]
pub struct Pin {
    pub app: ApplicationRecord,
    /// Display order, ascending.
    pub position: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

/// Database handle with connection pooling.
///
/// Uses r2d2 because `rusqlite::Connection` is NOT Sync.
/// The pool manages thread-safe access to `SQLite` connections.
///
/// Thread-safe (Send + Sync) via r2d2's internal synchronization.
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Opens or creates a database at the given path.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Pool` if connection pool creation fails.
    /// Returns `DbError::Sqlite` if schema initialization fails.
    pub fn open(path: &Path) -> DbResult<Self> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(4)
            .min_idle(Some(1))
            .connection_customizer(Box::new(PragmaCustomizer))
            .build(manager)?;

        {
            let conn = pool.get()?;
            init_schema(&conn)?;
        }

        Ok(Self { pool })
    }

    /// Creates an in-memory database (for testing).
    ///
    /// The pool holds a single connection: every in-memory connection
    /// would otherwise be its own empty database.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Pool` if connection pool creation fails.
    /// Returns `DbError::Sqlite` if schema initialization fails.
    pub fn in_memory() -> DbResult<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .connection_customizer(Box::new(PragmaCustomizer))
            .build(manager)?;

        {
            let conn = pool.get()?;
            init_schema(&conn)?;
        }

        Ok(Self { pool })
    }

    /// Gets a connection from the pool.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Pool` if no connection is available within the timeout.
    pub fn conn(&self) -> DbResult<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(DbError::from)
    }

    /// Gets one application by ID.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Pool` if no connection is available.
    /// Returns `DbError::Sqlite` if the query fails (other than no rows).
    pub fn get_app(&self, id: AppId) -> DbResult<Option<ApplicationRecord>> {
        let conn = self.conn()?;
        let result = conn.query_row(
            &format!("SELECT {APP_COLUMNS} FROM apps WHERE app_id = ?1"),
            rusqlite::params![id.as_i64()],
            row_to_app,
        );

        match result {
            Ok(app) => Ok(Some(app)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DbError::Sqlite(e)),
        }
    }

    /// Number of indexed applications.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Pool` if no connection is available.
    /// Returns `DbError::Sqlite` if the query fails.
    pub fn app_count(&self) -> DbResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM apps", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Number of stored search tokens across all applications.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Pool` if no connection is available.
    /// Returns `DbError::Sqlite` if the query fails.
    pub fn token_count(&self) -> DbResult<u64> {
        let conn = self.conn()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM app_tokens", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Application counts grouped by discovery source, in priority order.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Pool` if no connection is available.
    /// Returns `DbError::Sqlite` if the query fails.
    pub fn counts_by_source(&self) -> DbResult<Vec<(AppSource, u64)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached("SELECT source, COUNT(*) FROM apps GROUP BY source")?;
        let mut counts = stmt
            .query_map([], |row| {
                let source = parse_source(row, 0)?;
                let count: i64 = row.get(1)?;
                Ok((source, count as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        counts.sort_by_key(|(source, _)| source.priority());
        Ok(counts)
    }

    /// Records that an application was launched.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Pool` if no connection is available.
    /// Returns `DbError::Sqlite` if the insert fails (for example an unknown app ID).
    pub fn record_launch(&self, id: AppId, query: Option<&str>) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO recent_launches (app_id, launched_at, query) VALUES (?1, ?2, ?3)",
            rusqlite::params![id.as_i64(), Utc::now(), query],
        )?;
        Ok(())
    }

    /// Most recent launches, newest first.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Pool` if no connection is available.
    /// Returns `DbError::Sqlite` if the query fails.
    pub fn recent_launches(&self, limit: usize) -> DbResult<Vec<RecentLaunch>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            r"
            SELECT a.app_id, a.name, a.executable, a.arguments, a.working_directory, a.icon,
                   a.source, a.package_family, a.last_indexed, r.launched_at, r.query
            FROM recent_launches r
            JOIN apps a ON a.app_id = r.app_id
            ORDER BY r.launched_at DESC, r.launch_id DESC
            LIMIT ?1
            ",
        )?;

        let launches = stmt
            .query_map(rusqlite::params![limit as i64], |row| {
                Ok(RecentLaunch {
                    app: row_to_app(row)?,
                    launched_at: row.get(9)?,
                    query: row.get(10)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(launches)
    }

    /// Pins an application at the end of the pin list.
    ///
    /// Returns false if it was already pinned (its position is kept).
    ///
    /// # Errors
    ///
    /// Returns `DbError::NotFound` if no application has this ID.
    /// Returns `DbError::Sqlite` if the write fails.
    pub fn add_pin(&self, id: AppId) -> DbResult<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let exists = tx
            .query_row(
                "SELECT 1 FROM apps WHERE app_id = ?1",
                rusqlite::params![id.as_i64()],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if !exists {
            return Err(DbError::NotFound { id: id.as_i64() });
        }

        let inserted = tx.execute(
            r"
            INSERT OR IGNORE INTO pins (app_id, pin_order)
            VALUES (?1, (SELECT COALESCE(MAX(pin_order), -1) + 1 FROM pins))
            ",
            rusqlite::params![id.as_i64()],
        )?;
        tx.commit()?;
        Ok(inserted > 0)
    }

    /// Unpins an application. Returns false if it was not pinned.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Pool` if no connection is available.
    /// Returns `DbError::Sqlite` if the delete fails.
    pub fn remove_pin(&self, id: AppId) -> DbResult<bool> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM pins WHERE app_id = ?1",
            rusqlite::params![id.as_i64()],
        )?;
        Ok(removed > 0)
    }

    /// # Errors
    ///
    /// Returns `DbError::Pool` if no connection is available.
    /// Returns `DbError::Sqlite` if the query fails.
    pub fn is_pinned(&self, id: AppId) -> DbResult<bool> {
        let conn = self.conn()?;
        let pinned = conn
            .query_row(
                "SELECT 1 FROM pins WHERE app_id = ?1",
                rusqlite::params![id.as_i64()],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        Ok(pinned)
    }

    /// All pinned applications in display order.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Pool` if no connection is available.
    /// Returns `DbError::Sqlite` if the query fails.
    pub fn pins(&self) -> DbResult<Vec<Pin>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            r"
            SELECT a.app_id, a.name, a.executable, a.arguments, a.working_directory, a.icon,
                   a.source, a.package_family, a.last_indexed, p.pin_order, p.group_name
            FROM pins p
            JOIN apps a ON a.app_id = p.app_id
            ORDER BY p.pin_order, p.app_id
            ",
        )?;

        let pins = stmt
            .query_map([], |row| {
                Ok(Pin {
                    app: row_to_app(row)?,
                    position: row.get(9)?,
                    group: row.get(10)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pins)
    }
}

impl AppRepository for Database {
    fn get_all(&self) -> DbResult<Snapshot<ApplicationRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(&format!("SELECT {APP_COLUMNS} FROM apps"))?;
        let apps = stmt
            .query_map([], row_to_app)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(apps.into())
    }

    fn get_all_with_tokens(&self) -> DbResult<Snapshot<IndexedEntry>> {
        let mut conn = self.conn()?;
        // Apps and tokens come from the same read transaction so a
        // concurrent upsert can never produce a torn pairing.
        let tx = conn.transaction()?;

        let apps = {
            let mut stmt = tx.prepare_cached(&format!("SELECT {APP_COLUMNS} FROM apps"))?;
            let apps = stmt
                .query_map([], row_to_app)?
                .collect::<Result<Vec<_>, _>>()?;
            apps
        };

        let mut tokens: AHashMap<i64, BTreeSet<String>> = AHashMap::with_capacity(apps.len());
        {
            let mut stmt = tx.prepare_cached("SELECT app_id, token FROM app_tokens")?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                tokens
                    .entry(row.get::<_, i64>(0)?)
                    .or_default()
                    .insert(row.get(1)?);
            }
        }

        tx.commit()?;

        let entries: Vec<IndexedEntry> = apps
            .into_iter()
            .map(|app| {
                let app_tokens = app
                    .id
                    .and_then(|id| tokens.remove(&id.as_i64()))
                    .unwrap_or_default();
                IndexedEntry::new(app, app_tokens)
            })
            .collect();

        Ok(entries.into())
    }

    fn upsert_batch(&self, entries: &[IndexedEntry]) -> DbResult<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn()?;
        // IMMEDIATE takes the write lock up front; dropping `tx` on an
        // error path rolls the whole batch back.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        {
            let mut upsert_stmt = tx.prepare_cached(
                r#"
                INSERT INTO apps (dedup_key, name, executable, arguments, working_directory,
                                  icon, source, package_family, last_indexed)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ON CONFLICT(dedup_key) DO UPDATE SET
                    name = excluded.name,
                    executable = excluded.executable,
                    arguments = excluded.arguments,
                    working_directory = excluded.working_directory,
                    icon = excluded.icon,
                    source = excluded.source,
                    package_family = excluded.package_family,
                    last_indexed = excluded.last_indexed
                "#,
            )?;
            // last_insert_rowid() is unreliable with ON CONFLICT DO UPDATE
            let mut select_stmt = tx.prepare_cached("SELECT app_id FROM apps WHERE dedup_key = ?1")?;
            let mut clear_tokens_stmt = tx.prepare_cached("DELETE FROM app_tokens WHERE app_id = ?1")?;
            let mut insert_token_stmt =
                tx.prepare_cached("INSERT OR IGNORE INTO app_tokens (app_id, token) VALUES (?1, ?2)")?;

            for entry in entries {
                let app = &entry.app;
                let key = app.dedup_key().storage_key();
                let last_indexed = app.last_indexed.unwrap_or_else(Utc::now);

                upsert_stmt.execute(rusqlite::params![
                    &key,
                    &app.name,
                    &app.executable,
                    &app.arguments,
                    &app.working_directory,
                    &app.icon,
                    app.source.as_str(),
                    &app.package_family,
                    last_indexed,
                ])?;

                let app_id: i64 = select_stmt.query_row(rusqlite::params![&key], |row| row.get(0))?;

                clear_tokens_stmt.execute(rusqlite::params![app_id])?;
                for token in &entry.tokens {
                    insert_token_stmt.execute(rusqlite::params![app_id, token])?;
                }
            }
        }

        tx.commit()?;
        tracing::debug!("Upserted {} applications", entries.len());
        Ok(entries.len())
    }
}

fn parse_source(row: &Row<'_>, idx: usize) -> rusqlite::Result<AppSource> {
    let raw: String = row.get(idx)?;
    raw.parse::<AppSource>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
    })
}

/// Maps a row selected with [`APP_COLUMNS`] (in that order) to a record.
fn row_to_app(row: &Row<'_>) -> rusqlite::Result<ApplicationRecord> {
    Ok(ApplicationRecord {
        id: Some(AppId::new(row.get(0)?)),
        name: row.get(1)?,
        executable: row.get(2)?,
        arguments: row.get(3)?,
        working_directory: row.get(4)?,
        icon: row.get(5)?,
        source: parse_source(row, 6)?,
        package_family: row.get(7)?,
        last_indexed: Some(row.get(8)?),
    })
}

// Compile-time assertion for thread safety.
#[cfg(test)]
const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Database>();
};

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, exe: &str, source: AppSource, tokens: &[&str]) -> IndexedEntry {
        IndexedEntry::new(
            ApplicationRecord::new(name, exe, source),
            tokens.iter().map(|t| (*t).to_string()).collect(),
        )
    }

    #[test]
    fn test_in_memory_database() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.app_count().unwrap(), 0);
        assert!(db.get_all().unwrap().is_empty());
    }

    #[test]
    fn test_upsert_and_get_all() {
        let db = Database::in_memory().unwrap();
        let written = db
            .upsert_batch(&[
                entry("Notepad", "C:\\Windows\\notepad.exe", AppSource::Shortcut, &["notepad"]),
                entry("Paint", "C:\\Windows\\mspaint.exe", AppSource::Registry, &["paint", "mspaint"]),
            ])
            .unwrap();
        assert_eq!(written, 2);

        let apps = db.get_all().unwrap();
        assert_eq!(apps.len(), 2);
        assert!(apps.iter().all(|a| a.id.is_some() && a.last_indexed.is_some()));

        let entries = db.get_all_with_tokens().unwrap();
        let paint = entries.iter().find(|e| e.app.name == "Paint").unwrap();
        assert_eq!(paint.tokens.len(), 2);
        assert!(paint.tokens.contains("mspaint"));
    }

    #[test]
    fn test_upsert_updates_in_place_and_replaces_tokens() {
        let db = Database::in_memory().unwrap();
        db.upsert_batch(&[entry("Old Name", "/usr/bin/app", AppSource::Filesystem, &["old", "name"])])
            .unwrap();
        let first_id = db.get_all().unwrap()[0].id;

        db.upsert_batch(&[entry("New Title", "/usr/bin/app", AppSource::Filesystem, &["new", "title"])])
            .unwrap();

        let entries = db.get_all_with_tokens().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].app.id, first_id);
        assert_eq!(entries[0].app.name, "New Title");
        let tokens: Vec<_> = entries[0].tokens.iter().cloned().collect();
        assert_eq!(tokens, vec!["new".to_string(), "title".to_string()]);
    }

    #[test]
    fn test_arguments_are_part_of_identity() {
        let db = Database::in_memory().unwrap();
        let base = ApplicationRecord::new("Browser", "/opt/browser", AppSource::Shortcut);
        db.upsert_batch(&[
            IndexedEntry::new(base.clone(), BTreeSet::new()),
            IndexedEntry::new(base.with_arguments("--incognito"), BTreeSet::new()),
        ])
        .unwrap();
        assert_eq!(db.app_count().unwrap(), 2);
    }

    #[test]
    fn test_packaged_apps_merge_on_name() {
        let db = Database::in_memory().unwrap();
        db.upsert_batch(&[entry("Calculator", "Calc_1!App", AppSource::Packaged, &["calculator"])])
            .unwrap();
        db.upsert_batch(&[entry("Calculator", "Calc_2!App", AppSource::Packaged, &["calculator"])])
            .unwrap();

        let apps = db.get_all().unwrap();
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].executable, "Calc_2!App");
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.upsert_batch(&[]).unwrap(), 0);
        assert_eq!(db.app_count().unwrap(), 0);
    }

    #[test]
    fn test_counts_by_source() {
        let db = Database::in_memory().unwrap();
        db.upsert_batch(&[
            entry("A", "/a", AppSource::Filesystem, &["a"]),
            entry("B", "/b", AppSource::Shortcut, &["b"]),
            entry("C", "/c", AppSource::Shortcut, &["c"]),
        ])
        .unwrap();

        let counts = db.counts_by_source().unwrap();
        assert_eq!(
            counts,
            vec![(AppSource::Shortcut, 2), (AppSource::Filesystem, 1)]
        );
        assert_eq!(db.token_count().unwrap(), 3);
    }

    #[test]
    fn test_recent_launches_newest_first() {
        let db = Database::in_memory().unwrap();
        db.upsert_batch(&[
            entry("First", "/first", AppSource::Shortcut, &["first"]),
            entry("Second", "/second", AppSource::Shortcut, &["second"]),
        ])
        .unwrap();
        let apps = db.get_all().unwrap();
        let first = apps.iter().find(|a| a.name == "First").unwrap().id.unwrap();
        let second = apps.iter().find(|a| a.name == "Second").unwrap().id.unwrap();

        db.record_launch(first, Some("fir")).unwrap();
        db.record_launch(second, None).unwrap();

        let recent = db.recent_launches(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].app.name, "Second");
        assert_eq!(recent[1].query.as_deref(), Some("fir"));

        assert_eq!(db.recent_launches(1).unwrap().len(), 1);
    }

    #[test]
    fn test_record_launch_unknown_app_fails() {
        let db = Database::in_memory().unwrap();
        assert!(db.record_launch(AppId::new(404), None).is_err());
    }

    #[test]
    fn test_get_app() {
        let db = Database::in_memory().unwrap();
        db.upsert_batch(&[entry("Terminal", "/usr/bin/term", AppSource::Filesystem, &["terminal"])])
            .unwrap();
        let id = db.get_all().unwrap()[0].id.unwrap();

        assert_eq!(db.get_app(id).unwrap().unwrap().name, "Terminal");
        assert!(db.get_app(AppId::new(999)).unwrap().is_none());
    }

    #[test]
    fn test_open_on_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("index.db");
        {
            let db = Database::open(&path).unwrap();
            db.upsert_batch(&[entry("Editor", "/usr/bin/editor", AppSource::Filesystem, &["editor"])])
                .unwrap();
        }
        let reopened = Database::open(&path).unwrap();
        assert_eq!(reopened.app_count().unwrap(), 1);
    }

    fn indexed_ids(db: &Database, names: &[&str]) -> Vec<AppId> {
        let entries: Vec<_> = names
            .iter()
            .map(|n| entry(n, &format!("/opt/{n}"), AppSource::Filesystem, &[]))
            .collect();
        db.upsert_batch(&entries).unwrap();
        let apps = db.get_all().unwrap();
        names
            .iter()
            .map(|n| apps.iter().find(|a| a.name == *n).unwrap().id.unwrap())
            .collect()
    }

    #[test]
    fn test_pins_keep_insertion_order() {
        let db = Database::in_memory().unwrap();
        let ids = indexed_ids(&db, &["Editor", "Browser", "Terminal"]);

        assert!(db.add_pin(ids[2]).unwrap());
        assert!(db.add_pin(ids[0]).unwrap());
        // Re-pinning keeps the original slot
        assert!(!db.add_pin(ids[2]).unwrap());

        let pins = db.pins().unwrap();
        let names: Vec<_> = pins.iter().map(|p| p.app.name.as_str()).collect();
        assert_eq!(names, vec!["Terminal", "Editor"]);
        assert_eq!(pins[0].position, 0);
        assert_eq!(pins[1].position, 1);
        assert!(db.is_pinned(ids[0]).unwrap());
        assert!(!db.is_pinned(ids[1]).unwrap());
    }

    #[test]
    fn test_remove_pin() {
        let db = Database::in_memory().unwrap();
        let ids = indexed_ids(&db, &["Editor", "Browser"]);
        db.add_pin(ids[0]).unwrap();
        db.add_pin(ids[1]).unwrap();

        assert!(db.remove_pin(ids[0]).unwrap());
        assert!(!db.remove_pin(ids[0]).unwrap());
        assert!(!db.is_pinned(ids[0]).unwrap());

        // New pins go after the highest remaining position
        db.add_pin(ids[0]).unwrap();
        let names: Vec<_> = db.pins().unwrap().into_iter().map(|p| p.app.name).collect();
        assert_eq!(names, vec!["Browser", "Editor"]);
    }

    #[test]
    fn test_pin_unknown_app_is_not_found() {
        let db = Database::in_memory().unwrap();
        let err = db.add_pin(AppId::new(999)).unwrap_err();
        assert!(matches!(err, DbError::NotFound { id: 999 }));
        assert_eq!(err.code(), "APP_NOT_FOUND");
        assert!(db.pins().unwrap().is_empty());
    }

    #[test]
    fn test_pins_survive_reindex() {
        let db = Database::in_memory().unwrap();
        let ids = indexed_ids(&db, &["Editor"]);
        db.add_pin(ids[0]).unwrap();

        indexed_ids(&db, &["Editor"]);
        assert!(db.is_pinned(ids[0]).unwrap());
    }
}
