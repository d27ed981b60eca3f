//! `SQLite` PRAGMA configuration.

use crate::error::DbResult;
use rusqlite::Connection;

/// Executes a single SQL statement that may return rows (PRAGMAs).
fn exec_stmt(conn: &Connection, sql: &str) -> rusqlite::Result<()> {
    conn.prepare(sql)?.query([])?.next()?;
    Ok(())
}

/// Applies PRAGMA settings (raw rusqlite version).
///
/// Used by [`PragmaCustomizer`] to apply pragmas on every pool connection.
/// Returns raw `rusqlite::Result` for compatibility with r2d2's error types.
pub fn apply_pragmas_raw(conn: &Connection) -> rusqlite::Result<()> {
    // WAL lets searches read while the indexer commits
    exec_stmt(conn, "PRAGMA journal_mode = WAL")?;
    // Synchronous NORMAL is safe with WAL, faster than FULL
    exec_stmt(conn, "PRAGMA synchronous = NORMAL")?;
    // 5 second busy timeout for lock contention
    exec_stmt(conn, "PRAGMA busy_timeout = 5000")?;
    // Token and launch rows cascade with their app
    exec_stmt(conn, "PRAGMA foreign_keys = ON")?;
    exec_stmt(conn, "PRAGMA temp_store = MEMORY")?;

    Ok(())
}

/// Applies PRAGMA settings.
///
/// # Errors
///
/// Returns `DbError::Sqlite` if any PRAGMA statement fails.
pub fn apply_pragmas(conn: &Connection) -> DbResult<()> {
    apply_pragmas_raw(conn)?;
    Ok(())
}

/// Applies pragmas to every connection the pool hands out.
///
/// `foreign_keys` and `busy_timeout` are per-connection settings, so
/// configuring only the first connection is not enough.
#[derive(Debug, Clone, Copy, Default)]
pub struct PragmaCustomizer;

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for PragmaCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        apply_pragmas_raw(conn)
    }
}
