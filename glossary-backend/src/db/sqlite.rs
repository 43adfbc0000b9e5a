//! SQLite connection pool and schema bootstrap.
//!
//! Three tables make up the durable layout: `terms`, `tags` and the
//! `term_tags` join. Column names match data written by earlier versions of
//! the app, so existing `terms.db` files open unchanged.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Type;
use rusqlite::{Connection, Row};

use crate::config;
use crate::error::Result;

pub(crate) type PooledConn = PooledConnection<SqliteConnectionManager>;

/// One writer plus readers in WAL mode
const FILE_POOL_SIZE: u32 = 8;
const MEMORY_POOL_SIZE: u32 = 4;

/// Applied to every pooled connection; both settings are per connection
const CONNECTION_PRAGMAS: &str = "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;";

/// Layouts other tools write with SQLite's `datetime()`
const LEGACY_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

static MEMORY_DB_COUNTER: AtomicUsize = AtomicUsize::new(0);

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS terms (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        text TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        createdAt TEXT NOT NULL,
        updatedAt TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS tags (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    );
    CREATE TABLE IF NOT EXISTS term_tags (
        term_id INTEGER NOT NULL,
        tag_id INTEGER NOT NULL,
        PRIMARY KEY (term_id, tag_id),
        FOREIGN KEY (term_id) REFERENCES terms(id) ON DELETE CASCADE,
        FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_term_tags_tag_id ON term_tags(tag_id);
";

/// Relational store for terms, tags and their links.
///
/// Reads run on any pooled connection concurrently. Each write runs in a
/// single transaction; SQLite serializes writers.
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
    path: Option<PathBuf>,
}

impl Database {
    /// Open (creating if absent) the database file inside `folder`
    pub fn open_folder(folder: &Path) -> Result<Self> {
        std::fs::create_dir_all(folder)?;
        Self::new(&config::database_path(folder))
    }

    /// Open (creating if absent) a database file and make sure the schema exists
    pub fn new(path: &Path) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path)
            .with_init(|conn| conn.execute_batch(CONNECTION_PRAGMAS));
        let pool = Pool::builder().max_size(FILE_POOL_SIZE).build(manager)?;

        let conn = pool.get()?;
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        log::debug!("[DB] Journal mode: {}", mode);
        Self::init(&conn)?;
        drop(conn);

        log::info!("[DB] Opened glossary database at {}", path.display());
        Ok(Self {
            pool,
            path: Some(path.to_path_buf()),
        })
    }

    /// Private in-memory database shared by all connections of this pool
    pub fn open_in_memory() -> Result<Self> {
        let name = format!(
            "file:glossary-{}-{}?mode=memory&cache=shared",
            std::process::id(),
            MEMORY_DB_COUNTER.fetch_add(1, Ordering::Relaxed)
        );
        let manager = SqliteConnectionManager::file(name)
            .with_init(|conn| conn.execute_batch(CONNECTION_PRAGMAS));
        // Idle connections keep the shared in-memory database alive
        let pool = Pool::builder()
            .max_size(MEMORY_POOL_SIZE)
            .min_idle(Some(1))
            .build(manager)?;

        Self::init(&*pool.get()?)?;
        Ok(Self { pool, path: None })
    }

    fn init(conn: &Connection) -> Result<()> {
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// File backing this database, `None` for in-memory databases
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(crate) fn conn(&self) -> Result<PooledConn> {
        Ok(self.pool.get()?)
    }
}

/// Store timestamps as RFC 3339 with millisecond precision, UTC.
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp. RFC 3339 is what this crate writes; the
/// zone-less `datetime()` layouts are read as UTC.
pub(crate) fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp_str(raw.trim())
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_timestamp_str(raw: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    let rfc3339_err = match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => return Ok(dt.with_timezone(&Utc)),
        Err(e) => e,
    };
    LEGACY_TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or(rfc3339_err)
}
