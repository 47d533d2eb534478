//! Equations, variables and units

use latex_engine::{CompiledFragment, FragmentCompiler, FragmentUpdate, TemplateId};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::database::{now_sql, opt_time_at, time_at, to_sql_time, Database};
use crate::error::{DbContext, Result, StoreError};
use crate::naming::next_default_name;
use crate::records::{
    EditedObject, MathKind, MathObject, NewMathObject, ObjectUpdate, Provenance, DEFAULT_TYPE,
};

/// Number of columns produced by [`object_select`]
pub(crate) const OBJECT_COLUMNS: usize = 15;

/// Column list for a math object, each column prefixed with `alias`
pub(crate) fn object_select(kind: MathKind, alias: &str) -> String {
    let unit = if kind.has_unit() {
        format!("{}unit_id", alias)
    } else {
        "NULL".to_string()
    };
    format!(
        "{a}id, {a}name, {a}latex, {a}image, {a}template_id, {a}compiled_at, \
         {a}image_is_dirty, {a}notes, {a}dimensions, {unit}, {a}type_name, \
         {a}created_at, {a}created_by, {a}modified_at, {a}modified_by",
        a = alias,
        unit = unit
    )
}

pub(crate) fn object_from_row(kind: MathKind, row: &Row<'_>) -> rusqlite::Result<MathObject> {
    Ok(MathObject {
        id: row.get(0)?,
        kind,
        name: row.get(1)?,
        latex: row.get(2)?,
        image: row.get(3)?,
        template_id: row.get::<_, Option<i64>>(4)?.map(TemplateId),
        compiled_at: opt_time_at(row, 5)?,
        image_is_dirty: row.get(6)?,
        notes: row.get(7)?,
        dimensions: row.get(8)?,
        unit_id: row.get(9)?,
        type_name: row.get(10)?,
        provenance: Provenance {
            created_at: time_at(row, 11)?,
            created_by: row.get(12)?,
            modified_at: opt_time_at(row, 13)?,
            modified_by: row.get(14)?,
        },
    })
}

pub(crate) fn find_object(conn: &Connection, kind: MathKind, id: i64) -> Result<Option<MathObject>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM {} WHERE id = ?1",
            object_select(kind, ""),
            kind.table()
        ),
        params![id],
        |row| object_from_row(kind, row),
    )
    .optional()
    .during("load math object")
}

pub(crate) fn object_exists(conn: &Connection, table: &str, id: i64) -> Result<bool> {
    conn.query_row(
        &format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1)", table),
        params![id],
        |row| row.get(0),
    )
    .during("check record exists")
}

/// The stored form of a fragment; only clean fragments carry an image
struct FragmentColumns {
    latex: String,
    image: Option<Vec<u8>>,
    template_id: Option<i64>,
    compiled_at: Option<String>,
    dirty: bool,
}

impl From<&CompiledFragment> for FragmentColumns {
    fn from(fragment: &CompiledFragment) -> Self {
        let image = fragment.image().map(<[u8]>::to_vec);
        let compiled_at = image
            .as_ref()
            .and(fragment.compiled_at())
            .map(|t| to_sql_time(&t));

        Self {
            latex: fragment.source().to_string(),
            dirty: image.is_none(),
            template_id: fragment.template_id().map(|t| t.0),
            compiled_at,
            image,
        }
    }
}

/// Insert one math object on an open connection or transaction
pub(crate) fn insert_object_in(
    conn: &Connection,
    user: &str,
    kind: MathKind,
    new: NewMathObject,
) -> Result<i64> {
    if !kind.has_unit() && new.unit_id.is_some() {
        return Err(StoreError::Invalid(format!("{} rows have no unit", kind)));
    }

    let name = match new.name {
        Some(name) => name,
        None => {
            let mut stmt = conn
                .prepare(&format!("SELECT name FROM {}", kind.table()))
                .during("list names")?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
                .during("list names")?;
            next_default_name(kind.table(), names.iter().map(String::as_str))
        }
    };

    let columns = FragmentColumns::from(&new.fragment);
    let type_name = new.type_name.unwrap_or_else(|| DEFAULT_TYPE.to_string());

    conn.execute(
        &format!(
            "INSERT INTO {} (name, latex, image, template_id, compiled_at, image_is_dirty, \
             notes, dimensions, type_name, created_at, created_by) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            kind.table()
        ),
        params![
            name,
            columns.latex,
            columns.image,
            columns.template_id,
            columns.compiled_at,
            columns.dirty,
            new.notes,
            new.dimensions,
            type_name,
            now_sql(),
            user,
        ],
    )
    .during("insert math object")?;
    let id = conn.last_insert_rowid();

    if let Some(unit_id) = new.unit_id {
        conn.execute(
            &format!("UPDATE {} SET unit_id = ?1 WHERE id = ?2", kind.table()),
            params![unit_id, id],
        )
        .during("set unit")?;
    }

    tracing::debug!("Inserted {} {} '{}'", kind, id, name);
    Ok(id)
}

impl Database {
    /// Insert a math object, returning its id
    pub fn insert_object(&self, kind: MathKind, new: NewMathObject) -> Result<i64> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction().during("begin insert")?;
        let id = insert_object_in(&tx, self.user(), kind, new)?;
        tx.commit().during("commit insert")?;
        Ok(id)
    }

    pub fn object(&self, kind: MathKind, id: i64) -> Result<MathObject> {
        let conn = self.lock_conn()?;
        find_object(&conn, kind, id)?.ok_or_else(|| StoreError::not_found(kind.table(), id))
    }

    /// All objects of a kind ordered by id
    pub fn objects(&self, kind: MathKind) -> Result<Vec<MathObject>> {
        self.query_objects(kind, "")
    }

    fn query_objects(&self, kind: MathKind, filter: &str) -> Result<Vec<MathObject>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM {} {} ORDER BY id",
                object_select(kind, ""),
                kind.table(),
                filter
            ))
            .during("list math objects")?;
        let objects = stmt
            .query_map([], |row| object_from_row(kind, row))
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .during("list math objects")?;
        Ok(objects)
    }

    /// Apply column changes to a math object
    ///
    /// Any change also records `modified_at` and `modified_by`. An empty
    /// update touches nothing.
    pub fn update_object(&self, kind: MathKind, id: i64, update: ObjectUpdate) -> Result<MathObject> {
        if !kind.has_unit() && update.unit_id.is_some() {
            return Err(StoreError::Invalid(format!("{} rows have no unit", kind)));
        }

        let conn = self.lock_conn()?;

        if !update.is_empty() {
            let unit_clause = if kind.has_unit() {
                ", unit_id = COALESCE(?13, unit_id)"
            } else {
                ""
            };
            let has_fragment = update.fragment.is_some();
            let columns = update.fragment.as_ref().map(FragmentColumns::from);

            let changed = conn
                .execute(
                    &format!(
                        "UPDATE {} SET
                            name = COALESCE(?1, name),
                            notes = COALESCE(?2, notes),
                            dimensions = COALESCE(?3, dimensions),
                            type_name = COALESCE(?4, type_name),
                            latex = CASE WHEN ?5 THEN ?6 ELSE latex END,
                            image = CASE WHEN ?5 THEN ?7 ELSE image END,
                            template_id = CASE WHEN ?5 THEN ?8 ELSE template_id END,
                            compiled_at = CASE WHEN ?5 THEN ?9 ELSE compiled_at END,
                            image_is_dirty = CASE WHEN ?5 THEN ?10 ELSE image_is_dirty END,
                            modified_at = ?11,
                            modified_by = ?12{}
                         WHERE id = ?14",
                        kind.table(),
                        unit_clause
                    ),
                    params![
                        update.name,
                        update.notes,
                        update.dimensions,
                        update.type_name,
                        has_fragment,
                        columns.as_ref().map(|c| c.latex.as_str()),
                        columns.as_ref().and_then(|c| c.image.as_deref()),
                        columns.as_ref().and_then(|c| c.template_id),
                        columns.as_ref().and_then(|c| c.compiled_at.as_deref()),
                        columns.as_ref().map(|c| c.dirty),
                        now_sql(),
                        self.user(),
                        update.unit_id,
                        id,
                    ],
                )
                .during("update math object")?;

            if changed == 0 {
                return Err(StoreError::not_found(kind.table(), id));
            }
        }

        find_object(&conn, kind, id)?.ok_or_else(|| StoreError::not_found(kind.table(), id))
    }

    /// Apply a fragment edit to a stored object and save the result
    ///
    /// The compile runs without holding the connection, so the compiler may
    /// resolve templates from this same database. The returned resolution
    /// tells whether a requested template version had to be replaced by the
    /// latest one.
    pub fn edit_fragment<C: FragmentCompiler + ?Sized>(
        &self,
        kind: MathKind,
        id: i64,
        edit: FragmentUpdate,
        compiler: &C,
    ) -> Result<EditedObject> {
        let mut fragment = self.object(kind, id)?.fragment()?;
        fragment.update(edit, compiler)?;
        let resolution = fragment.resolution();

        let object = self.update_object(
            kind,
            id,
            ObjectUpdate {
                fragment: Some(fragment),
                ..Default::default()
            },
        )?;
        Ok(EditedObject { object, resolution })
    }

    /// Delete a math object and its associations
    pub fn delete_object(&self, kind: MathKind, id: i64) -> Result<()> {
        let conn = self.lock_conn()?;
        let deleted = conn
            .execute(&format!("DELETE FROM {} WHERE id = ?1", kind.table()), params![id])
            .during("delete math object")?;
        if deleted == 0 {
            return Err(StoreError::not_found(kind.table(), id));
        }
        Ok(())
    }

    pub fn object_count(&self, kind: MathKind) -> Result<i64> {
        let conn = self.lock_conn()?;
        conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", kind.table()),
            [],
            |row| row.get(0),
        )
        .during("count math objects")
    }

    /// Objects whose image must be recompiled
    pub fn dirty_objects(&self, kind: MathKind) -> Result<Vec<MathObject>> {
        self.query_objects(kind, "WHERE image_is_dirty = 1")
    }

    /// Recompile every dirty object of a kind and store the new images
    ///
    /// Objects that fail to compile are logged and stay dirty. Returns the
    /// number of objects refreshed.
    pub fn refresh_dirty<C: FragmentCompiler + ?Sized>(
        &self,
        kind: MathKind,
        compiler: &C,
    ) -> Result<usize> {
        let dirty = self.dirty_objects(kind)?;
        let total = dirty.len();
        let mut refreshed = 0;

        for object in dirty {
            let mut fragment = object.fragment()?;
            if let Err(e) = fragment.refresh(compiler) {
                tracing::warn!("Could not refresh {} {} '{}': {}", kind, object.id, object.name, e);
                continue;
            }
            self.store_fragment(kind, object.id, &fragment)?;
            refreshed += 1;
        }

        tracing::info!("Refreshed {} of {} dirty {} rows", refreshed, total, kind);
        Ok(refreshed)
    }

    /// Overwrite the fragment columns without touching provenance
    fn store_fragment(&self, kind: MathKind, id: i64, fragment: &CompiledFragment) -> Result<()> {
        let columns = FragmentColumns::from(fragment);
        let conn = self.lock_conn()?;
        conn.execute(
            &format!(
                "UPDATE {} SET latex = ?1, image = ?2, template_id = ?3, compiled_at = ?4, \
                 image_is_dirty = ?5 WHERE id = ?6",
                kind.table()
            ),
            params![
                columns.latex,
                columns.image,
                columns.template_id,
                columns.compiled_at,
                columns.dirty,
                id
            ],
        )
        .during("store fragment")?;
        Ok(())
    }
}
