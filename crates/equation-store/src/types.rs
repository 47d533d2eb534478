//! Type name tables

use rusqlite::params;

use crate::database::Database;
use crate::error::{DbContext, Result, StoreError};
use crate::records::{MathKind, DEFAULT_TYPE};

impl Database {
    /// Type names of a kind, sorted
    pub fn types(&self, kind: MathKind) -> Result<Vec<String>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT type_name FROM {} ORDER BY type_name",
                kind.type_table()
            ))
            .during("list types")?;
        let names = stmt
            .query_map([], |row| row.get(0))
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<String>>>())
            .during("list types")?;
        Ok(names)
    }

    /// Add type names, skipping those that already exist
    ///
    /// Returns how many were added.
    pub fn add_types<S: AsRef<str>>(&self, kind: MathKind, names: &[S]) -> Result<usize> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction().during("begin add types")?;
        let mut added = 0;
        {
            let mut stmt = tx
                .prepare(&format!(
                    "INSERT OR IGNORE INTO {} (type_name) VALUES (?1)",
                    kind.type_table()
                ))
                .during("add types")?;
            for name in names {
                let name = name.as_ref().trim();
                if name.is_empty() {
                    return Err(StoreError::Invalid("type name must not be empty".to_string()));
                }
                added += stmt.execute(params![name]).during("add types")?;
            }
        }
        tx.commit().during("commit add types")?;
        tracing::debug!("Added {} {} names", added, kind.type_table());
        Ok(added)
    }

    /// Delete type names, returning how many existed
    ///
    /// A name still used by some row is refused, as is the default type.
    pub fn delete_types<S: AsRef<str>>(&self, kind: MathKind, names: &[S]) -> Result<usize> {
        if names.iter().any(|n| n.as_ref() == DEFAULT_TYPE) {
            return Err(StoreError::Invalid(format!(
                "the {} type cannot be deleted",
                DEFAULT_TYPE
            )));
        }

        let mut conn = self.lock_conn()?;
        let tx = conn.transaction().during("begin delete types")?;
        let mut deleted = 0;
        {
            let mut stmt = tx
                .prepare(&format!(
                    "DELETE FROM {} WHERE type_name = ?1",
                    kind.type_table()
                ))
                .during("delete types")?;
            for name in names {
                deleted += stmt.execute(params![name.as_ref()]).during("delete types")?;
            }
        }
        tx.commit().during("commit delete types")?;
        Ok(deleted)
    }
}
