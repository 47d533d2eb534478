//! The database handle

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row};

use crate::error::{DbContext, Result, StoreError};

/// An open equation database plus the user recorded on every write
///
/// The connection sits behind a mutex, so one `Database` can be shared
/// between threads (for example by a compile worker resolving templates).
#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
    user: String,
    path: Option<PathBuf>,
}

impl Database {
    /// Open (or create) a database file and bring its schema up to date
    pub fn open(path: impl AsRef<Path>, user: impl Into<String>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).during("open database")?;
        let db = Self::from_connection(conn, user.into(), Some(path.to_path_buf()))?;
        tracing::info!("Opened equation database at {}", path.display());
        Ok(db)
    }

    /// Open a private in-memory database
    pub fn open_in_memory(user: impl Into<String>) -> Result<Self> {
        let conn = Connection::open_in_memory().during("open database")?;
        Self::from_connection(conn, user.into(), None)
    }

    fn from_connection(conn: Connection, user: String, path: Option<PathBuf>) -> Result<Self> {
        if user.trim().is_empty() {
            return Err(StoreError::Invalid("user name must not be empty".to_string()));
        }

        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .during("enable foreign keys")?;

        let db = Self {
            conn: Mutex::new(conn),
            user,
            path,
        };
        db.init_schema()?;
        Ok(db)
    }

    /// The acting user name
    pub fn user(&self) -> &str {
        &self.user
    }

    /// The database file, `None` for in-memory databases
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Lock the connection, returning an error if the mutex is poisoned
    pub(crate) fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Invalid("SQLite connection poisoned".to_string()))
    }
}

/// Fixed-width RFC 3339 text, so stored timestamps sort chronologically
pub(crate) fn to_sql_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn now_sql() -> String {
    to_sql_time(&Utc::now())
}

pub(crate) fn time_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    parse_time(idx, &text)
}

pub(crate) fn opt_time_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| parse_time(idx, &t)).transpose()
}

fn parse_time(idx: usize, text: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sql_time_is_fixed_width_and_sortable() {
        let early = Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap();
        let late = early + chrono::Duration::microseconds(1);

        assert_eq!(to_sql_time(&early), "2020-01-02T03:04:05.000000Z");
        assert!(to_sql_time(&early) < to_sql_time(&late));
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("equations.db");

        let db = Database::open(&path, "razor").unwrap();

        assert!(path.is_file());
        assert_eq!(db.path(), Some(path.as_path()));
        assert_eq!(db.user(), "razor");
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("equations.db");

        let first = Database::open(&path, "razor").unwrap();
        first.insert_template("again %__REPLACEMENT__TEXT").unwrap();
        let count = first.templates().unwrap().len();
        drop(first);

        let second = Database::open(&path, "razor").unwrap();
        assert_eq!(second.templates().unwrap().len(), count);
    }

    #[test]
    fn test_empty_user_rejected() {
        assert!(matches!(
            Database::open_in_memory("  "),
            Err(StoreError::Invalid(_))
        ));
    }
}
