//! Database schema definitions.

use crate::error::{DbError, DbResult};
use rusqlite::{Connection, OptionalExtension};

/// Current schema version for migrations.
pub const SCHEMA_VERSION: u32 = 2;

/// Initializes the database schema.
///
/// # Errors
///
/// Returns `DbError::Sqlite` if schema creation fails.
/// Returns `DbError::Migration` if the file was written by a newer schema.
pub fn init_schema(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        r#"
        -- One row per dedup key
        CREATE TABLE IF NOT EXISTS apps (
            app_id INTEGER PRIMARY KEY AUTOINCREMENT,
            dedup_key TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            executable TEXT NOT NULL,
            arguments TEXT,
            working_directory TEXT,
            icon TEXT,
            source TEXT NOT NULL,
            package_family TEXT,
            last_indexed TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_apps_source ON apps(source);

        -- Search tokens, replaced wholesale on every upsert of the app
        CREATE TABLE IF NOT EXISTS app_tokens (
            app_id INTEGER NOT NULL REFERENCES apps(app_id) ON DELETE CASCADE,
            token TEXT NOT NULL,
            PRIMARY KEY (app_id, token)
        ) WITHOUT ROWID;

        CREATE INDEX IF NOT EXISTS idx_app_tokens_token ON app_tokens(token);

        -- Launch history
        CREATE TABLE IF NOT EXISTS recent_launches (
            launch_id INTEGER PRIMARY KEY AUTOINCREMENT,
            app_id INTEGER NOT NULL REFERENCES apps(app_id) ON DELETE CASCADE,
            launched_at TEXT NOT NULL,
            query TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_recent_launches_at ON recent_launches(launched_at);

        -- Pinned apps, shown in pin_order
        CREATE TABLE IF NOT EXISTS pins (
            app_id INTEGER PRIMARY KEY REFERENCES apps(app_id) ON DELETE CASCADE,
            pin_order INTEGER NOT NULL,
            group_name TEXT
        );

        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        ) WITHOUT ROWID;
        "#,
    )?;

    let stored: Option<String> = conn
        .query_row(
            "SELECT value FROM schema_info WHERE key = 'version'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(stored) = stored {
        let version: u32 = stored
            .parse()
            .map_err(|_| DbError::Migration(format!("unreadable schema version '{stored}'")))?;
        if version > SCHEMA_VERSION {
            return Err(DbError::Migration(format!(
                "database schema v{version} is newer than supported v{SCHEMA_VERSION}"
            )));
        }
    }

    conn.execute(
        "INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?1)",
        rusqlite::params![SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::pragmas::apply_pragmas;

    #[test]
    fn test_schema_creation() {
        let conn = Connection::open_in_memory().unwrap();
        apply_pragmas(&conn).unwrap();
        init_schema(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(Result::ok)
            .collect();

        assert!(tables.contains(&"apps".to_string()));
        assert!(tables.contains(&"app_tokens".to_string()));
        assert!(tables.contains(&"recent_launches".to_string()));
        assert!(tables.contains(&"pins".to_string()));
    }

    #[test]
    fn test_newer_schema_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn.execute(
            "UPDATE schema_info SET value = '99' WHERE key = 'version'",
            [],
        )
        .unwrap();

        let err = init_schema(&conn).unwrap_err();
        assert!(matches!(err, DbError::Migration(_)));
        assert_eq!(err.code(), "MIGRATION_ERROR");
    }

    #[test]
    fn test_older_schema_is_upgraded() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn.execute("DROP TABLE pins", []).unwrap();
        conn.execute(
            "UPDATE schema_info SET value = '1' WHERE key = 'version'",
            [],
        )
        .unwrap();

        init_schema(&conn).unwrap();
        let pins: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'pins'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(pins, 1);
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        let version: String = conn
            .query_row(
                "SELECT value FROM schema_info WHERE key = 'version'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION.to_string());
    }
}
