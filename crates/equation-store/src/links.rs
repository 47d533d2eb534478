//! Ordered parent/child associations
//!
//! Both join tables keep `insertion_order` as a 1-based position within the
//! parent. Every write that renumbers rows runs in a transaction.

use rusqlite::{params, Connection, Row, Transaction};

use crate::database::{now_sql, time_at, Database};
use crate::error::{DbContext, Result, StoreError};
use crate::objects::{insert_object_in, object_exists, object_from_row, object_select, OBJECT_COLUMNS};
use crate::records::{Association, AssociationInput, Child, Direction, Link, MathObject, NewMathObject};

fn association_select(link: Link, alias: &str) -> String {
    let code_file_path = if link.has_code_file_path() {
        format!("{}code_file_path", alias)
    } else {
        "NULL".to_string()
    };
    format!(
        "{a}{parent}, {a}{child}, {a}insertion_order, {a}insertion_date, {a}inserted_by, {cfp}",
        a = alias,
        parent = link.parent_column(),
        child = link.child_column(),
        cfp = code_file_path
    )
}

fn association_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Association> {
    Ok(Association {
        parent_id: row.get(offset)?,
        child_id: row.get(offset + 1)?,
        insertion_order: row.get(offset + 2)?,
        insertion_date: time_at(row, offset + 3)?,
        inserted_by: row.get(offset + 4)?,
        code_file_path: row.get(offset + 5)?,
    })
}

/// Child ids of a parent in their current order
fn child_ids(conn: &Connection, link: Link, parent: i64) -> Result<Vec<i64>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {child} FROM {table} WHERE {parent} = ?1 ORDER BY insertion_order, {child}",
            child = link.child_column(),
            table = link.table(),
            parent = link.parent_column()
        ))
        .during("list child ids")?;
    let ids = stmt
        .query_map(params![parent], |row| row.get(0))
        .and_then(|rows| rows.collect::<rusqlite::Result<Vec<i64>>>())
        .during("list child ids")?;
    Ok(ids)
}

/// Write positions 1..n for `ids` in the given order
fn renumber(tx: &Transaction<'_>, link: Link, parent: i64, ids: &[i64]) -> Result<()> {
    let mut stmt = tx
        .prepare(&format!(
            "UPDATE {} SET insertion_order = ?1 WHERE {} = ?2 AND {} = ?3",
            link.table(),
            link.parent_column(),
            link.child_column()
        ))
        .during("renumber children")?;
    for (position, id) in ids.iter().enumerate() {
        stmt.execute(params![position as i64 + 1, parent, id])
            .during("renumber children")?;
    }
    Ok(())
}

fn ensure_parent(conn: &Connection, link: Link, parent: i64) -> Result<()> {
    if !object_exists(conn, link.parent_table(), parent)? {
        return Err(StoreError::not_found(link.parent_table(), parent));
    }
    Ok(())
}

fn associate_in(
    conn: &Connection,
    user: &str,
    link: Link,
    parent: i64,
    child: i64,
    input: AssociationInput,
) -> Result<Association> {
    if !link.has_code_file_path() && input.code_file_path.is_some() {
        return Err(StoreError::Invalid(format!("{} rows have no code file path", link)));
    }
    ensure_parent(conn, link, parent)?;
    let child_table = link.child_kind().table();
    if !object_exists(conn, child_table, child)? {
        return Err(StoreError::not_found(child_table, child));
    }

    let insertion_order = match input.insertion_order {
        Some(order) => order,
        None => {
            let max: Option<i64> = conn
                .query_row(
                    &format!(
                        "SELECT MAX(insertion_order) FROM {} WHERE {} = ?1",
                        link.table(),
                        link.parent_column()
                    ),
                    params![parent],
                    |row| row.get(0),
                )
                .during("find last position")?;
            max.unwrap_or(0) + 1
        }
    };

    let inserted_by = input.inserted_by.unwrap_or_else(|| user.to_string());
    let insertion_date = now_sql();

    let inserted = if link.has_code_file_path() {
        conn.execute(
            &format!(
                "INSERT INTO {} ({}, {}, insertion_order, insertion_date, inserted_by, code_file_path) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                link.table(),
                link.parent_column(),
                link.child_column()
            ),
            params![parent, child, insertion_order, insertion_date, inserted_by, input.code_file_path],
        )
    } else {
        conn.execute(
            &format!(
                "INSERT INTO {} ({}, {}, insertion_order, insertion_date, inserted_by) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                link.table(),
                link.parent_column(),
                link.child_column()
            ),
            params![parent, child, insertion_order, insertion_date, inserted_by],
        )
    };
    inserted.during("insert association")?;

    tracing::debug!("Associated {} {} with parent {} at {}", link, child, parent, insertion_order);

    conn.query_row(
        &format!(
            "SELECT {} FROM {} WHERE {} = ?1 AND {} = ?2",
            association_select(link, ""),
            link.table(),
            link.parent_column(),
            link.child_column()
        ),
        params![parent, child],
        |row| association_from_row(row, 0),
    )
    .during("load association")
}

impl Database {
    /// Attach an existing child to a parent
    ///
    /// Without an explicit order the child goes after the current last one.
    pub fn associate(
        &self,
        link: Link,
        parent: i64,
        child: i64,
        input: AssociationInput,
    ) -> Result<Association> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction().during("begin associate")?;
        let association = associate_in(&tx, self.user(), link, parent, child, input)?;
        tx.commit().during("commit associate")?;
        Ok(association)
    }

    /// Create a child object and attach it in one transaction
    ///
    /// If the association fails the new row is rolled back too. Returns the
    /// child id.
    pub fn insert_child(
        &self,
        link: Link,
        parent: i64,
        new: NewMathObject,
        input: AssociationInput,
    ) -> Result<i64> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction().during("begin insert child")?;
        let child = insert_object_in(&tx, self.user(), link.child_kind(), new)?;
        associate_in(&tx, self.user(), link, parent, child, input)?;
        tx.commit().during("commit insert child")?;
        Ok(child)
    }

    /// Detach a child; the remaining children close the gap
    pub fn disassociate(&self, link: Link, parent: i64, child: i64) -> Result<()> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction().during("begin disassociate")?;

        let deleted = tx
            .execute(
                &format!(
                    "DELETE FROM {} WHERE {} = ?1 AND {} = ?2",
                    link.table(),
                    link.parent_column(),
                    link.child_column()
                ),
                params![parent, child],
            )
            .during("delete association")?;
        if deleted == 0 {
            return Err(StoreError::not_found(link.table(), child));
        }

        let remaining = child_ids(&tx, link, parent)?;
        renumber(&tx, link, parent, &remaining)?;
        tx.commit().during("commit disassociate")?;
        Ok(())
    }

    /// Children of a parent with their association rows, in order
    pub fn children(&self, link: Link, parent: i64) -> Result<Vec<Child>> {
        let kind = link.child_kind();
        let conn = self.lock_conn()?;
        ensure_parent(&conn, link, parent)?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {object}, {assoc} FROM {child_table} c \
                 JOIN {table} a ON a.{child_col} = c.id \
                 WHERE a.{parent_col} = ?1 \
                 ORDER BY a.insertion_order, c.id",
                object = object_select(kind, "c."),
                assoc = association_select(link, "a."),
                child_table = kind.table(),
                table = link.table(),
                child_col = link.child_column(),
                parent_col = link.parent_column()
            ))
            .during("list children")?;
        let children = stmt
            .query_map(params![parent], |row| {
                Ok(Child {
                    object: object_from_row(kind, row)?,
                    association: association_from_row(row, OBJECT_COLUMNS)?,
                })
            })
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .during("list children")?;
        Ok(children)
    }

    /// Objects that could still be attached to a parent, ordered by id
    pub fn not_in_parent(&self, link: Link, parent: i64) -> Result<Vec<MathObject>> {
        let kind = link.child_kind();
        let conn = self.lock_conn()?;
        ensure_parent(&conn, link, parent)?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {object} FROM {child_table} \
                 WHERE id NOT IN (SELECT {child_col} FROM {table} WHERE {parent_col} = ?1) \
                 ORDER BY id",
                object = object_select(kind, ""),
                child_table = kind.table(),
                child_col = link.child_column(),
                table = link.table(),
                parent_col = link.parent_column()
            ))
            .during("list unattached objects")?;
        let objects = stmt
            .query_map(params![parent], |row| object_from_row(kind, row))
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .during("list unattached objects")?;
        Ok(objects)
    }

    /// Swap a child with its neighbour
    ///
    /// Returns `false` when the child is already first (up) or last (down).
    /// The parent's positions are normalised to 1..n either way.
    pub fn move_child(&self, link: Link, parent: i64, child: i64, direction: Direction) -> Result<bool> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction().during("begin move")?;

        let mut ids = child_ids(&tx, link, parent)?;
        let index = ids
            .iter()
            .position(|&id| id == child)
            .ok_or_else(|| StoreError::not_found(link.table(), child))?;

        let neighbour = match direction {
            Direction::Up => index.checked_sub(1),
            Direction::Down => Some(index + 1).filter(|&i| i < ids.len()),
        };
        let moved = match neighbour {
            Some(other) => {
                ids.swap(index, other);
                true
            }
            None => false,
        };

        renumber(&tx, link, parent, &ids)?;
        tx.commit().during("commit move")?;
        Ok(moved)
    }

    /// Put a parent's children in the given order
    ///
    /// `order` must name every current child exactly once.
    pub fn reorder(&self, link: Link, parent: i64, order: &[i64]) -> Result<()> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction().during("begin reorder")?;

        let mut current = child_ids(&tx, link, parent)?;
        let mut requested = order.to_vec();
        current.sort_unstable();
        requested.sort_unstable();
        if current != requested {
            return Err(StoreError::Invalid(format!(
                "new order must list each child of {} {} exactly once",
                link.parent_table(),
                parent
            )));
        }

        renumber(&tx, link, parent, order)?;
        tx.commit().during("commit reorder")?;
        Ok(())
    }

    pub fn child_count(&self, link: Link, parent: i64) -> Result<i64> {
        let conn = self.lock_conn()?;
        conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE {} = ?1",
                link.table(),
                link.parent_column()
            ),
            params![parent],
            |row| row.get(0),
        )
        .during("count children")
    }
}
