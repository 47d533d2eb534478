//! Equation groups

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::database::{now_sql, opt_time_at, time_at, Database};
use crate::error::{DbContext, Result, StoreError};
use crate::naming::next_default_name;
use crate::records::{Group, GroupUpdate, NewGroup, Provenance};

const GROUP_COLUMNS: &str =
    "id, name, notes, created_at, created_by, modified_at, modified_by";

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get(0)?,
        name: row.get(1)?,
        notes: row.get(2)?,
        provenance: Provenance {
            created_at: time_at(row, 3)?,
            created_by: row.get(4)?,
            modified_at: opt_time_at(row, 5)?,
            modified_by: row.get(6)?,
        },
    })
}

fn find_group(conn: &Connection, id: i64) -> Result<Option<Group>> {
    conn.query_row(
        &format!("SELECT {} FROM eqn_group WHERE id = ?1", GROUP_COLUMNS),
        params![id],
        group_from_row,
    )
    .optional()
    .during("load group")
}

impl Database {
    /// Create a group, returning its id
    pub fn insert_group(&self, new: NewGroup) -> Result<i64> {
        let conn = self.lock_conn()?;

        let name = match new.name {
            Some(name) => name,
            None => {
                let mut stmt = conn
                    .prepare("SELECT name FROM eqn_group")
                    .during("list group names")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))
                    .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
                    .during("list group names")?;
                next_default_name("eqn_group", names.iter().map(String::as_str))
            }
        };

        conn.execute(
            "INSERT INTO eqn_group (name, notes, created_at, created_by) VALUES (?1, ?2, ?3, ?4)",
            params![name, new.notes, now_sql(), self.user()],
        )
        .during("insert group")?;

        let id = conn.last_insert_rowid();
        tracing::debug!("Inserted group {} '{}'", id, name);
        Ok(id)
    }

    pub fn group(&self, id: i64) -> Result<Group> {
        let conn = self.lock_conn()?;
        find_group(&conn, id)?.ok_or_else(|| StoreError::not_found("group", id))
    }

    /// All groups ordered by id
    pub fn groups(&self) -> Result<Vec<Group>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn
            .prepare(&format!("SELECT {} FROM eqn_group ORDER BY id", GROUP_COLUMNS))
            .during("list groups")?;
        let groups = stmt
            .query_map([], group_from_row)
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .during("list groups")?;
        Ok(groups)
    }

    /// Change a group's name or notes
    ///
    /// An empty update touches nothing, not even `modified_at`.
    pub fn update_group(&self, id: i64, update: GroupUpdate) -> Result<Group> {
        let conn = self.lock_conn()?;

        if !update.is_empty() {
            let changed = conn
                .execute(
                    "UPDATE eqn_group SET
                        name = COALESCE(?1, name),
                        notes = COALESCE(?2, notes),
                        modified_at = ?3,
                        modified_by = ?4
                     WHERE id = ?5",
                    params![update.name, update.notes, now_sql(), self.user(), id],
                )
                .during("update group")?;
            if changed == 0 {
                return Err(StoreError::not_found("group", id));
            }
        }

        find_group(&conn, id)?.ok_or_else(|| StoreError::not_found("group", id))
    }

    /// Delete a group and its associations (the equations stay)
    pub fn delete_group(&self, id: i64) -> Result<()> {
        let conn = self.lock_conn()?;
        let deleted = conn
            .execute("DELETE FROM eqn_group WHERE id = ?1", params![id])
            .during("delete group")?;
        if deleted == 0 {
            return Err(StoreError::not_found("group", id));
        }
        Ok(())
    }

    pub fn group_count(&self) -> Result<i64> {
        let conn = self.lock_conn()?;
        conn.query_row("SELECT COUNT(*) FROM eqn_group", [], |row| row.get(0))
            .during("count groups")
    }
}
