//! Template versions

use std::path::Path;

use latex_engine::{Template, TemplateError, TemplateId, TemplateStore, PLACEHOLDER};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::database::{now_sql, time_at, Database};
use crate::error::{DbContext, Result, StoreError};
use crate::records::MathKind;

const TEMPLATE_COLUMNS: &str = "id, data, created_at, created_by";

fn template_from_row(row: &Row<'_>) -> rusqlite::Result<Template> {
    Ok(Template {
        id: TemplateId(row.get(0)?),
        body: row.get(1)?,
        created_at: time_at(row, 2)?,
        created_by: row.get(3)?,
    })
}

fn find_template(conn: &Connection, id: TemplateId) -> Result<Option<Template>> {
    conn.query_row(
        &format!("SELECT {} FROM template WHERE id = ?1", TEMPLATE_COLUMNS),
        params![id.0],
        template_from_row,
    )
    .optional()
    .during("load template")
}

impl Database {
    /// Store a new template version
    pub fn insert_template(&self, body: &str) -> Result<TemplateId> {
        if !body.contains(PLACEHOLDER) {
            return Err(StoreError::Invalid(format!(
                "template has no placeholder '{}'",
                PLACEHOLDER
            )));
        }

        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO template (data, created_at, created_by) VALUES (?1, ?2, ?3)",
            params![body, now_sql(), self.user()],
        )
        .during("insert template")?;

        let id = TemplateId(conn.last_insert_rowid());
        tracing::info!("Stored template version {}", id);
        Ok(id)
    }

    /// Store the contents of a `.tex` file as a new template version
    pub fn insert_template_from_file(&self, path: impl AsRef<Path>) -> Result<TemplateId> {
        let body = std::fs::read_to_string(path.as_ref())?;
        self.insert_template(&body)
    }

    pub fn template(&self, id: TemplateId) -> Result<Template> {
        let conn = self.lock_conn()?;
        find_template(&conn, id)?.ok_or_else(|| StoreError::not_found("template", id.0))
    }

    /// All template versions, oldest first
    pub fn templates(&self) -> Result<Vec<Template>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM template ORDER BY created_at, id",
                TEMPLATE_COLUMNS
            ))
            .during("list templates")?;
        let templates = stmt
            .query_map([], template_from_row)
            .during("list templates")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .during("list templates")?;
        Ok(templates)
    }

    /// Delete template versions, returning how many existed
    ///
    /// Math objects compiled with a deleted version lose the template
    /// reference and are flagged dirty, so the next refresh uses the latest.
    pub fn delete_templates(&self, ids: &[TemplateId]) -> Result<usize> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction().during("begin template delete")?;

        let mut deleted = 0;
        for id in ids {
            for kind in MathKind::ALL {
                tx.execute(
                    &format!(
                        "UPDATE {} SET image_is_dirty = 1 WHERE template_id = ?1",
                        kind.table()
                    ),
                    params![id.0],
                )
                .during("flag objects of deleted template")?;
            }
            deleted += tx
                .execute("DELETE FROM template WHERE id = ?1", params![id.0])
                .during("delete template")?;
        }

        tx.commit().during("commit template delete")?;
        Ok(deleted)
    }

    fn latest_template(&self) -> Result<Option<Template>> {
        let conn = self.lock_conn()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM template ORDER BY created_at DESC, id DESC LIMIT 1",
                TEMPLATE_COLUMNS
            ),
            [],
            template_from_row,
        )
        .optional()
        .during("load latest template")
    }
}

fn backend(err: StoreError) -> TemplateError {
    TemplateError::Backend(Box::new(err))
}

impl TemplateStore for Database {
    fn available_versions(&self) -> std::result::Result<Vec<TemplateId>, TemplateError> {
        let conn = self.lock_conn().map_err(backend)?;
        let mut stmt = conn
            .prepare("SELECT id FROM template ORDER BY created_at, id")
            .during("list template versions")
            .map_err(backend)?;
        let ids = stmt
            .query_map([], |row| row.get(0).map(TemplateId))
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .during("list template versions")
            .map_err(backend)?;
        Ok(ids)
    }

    fn template(&self, id: TemplateId) -> std::result::Result<Option<Template>, TemplateError> {
        let conn = self.lock_conn().map_err(backend)?;
        find_template(&conn, id).map_err(backend)
    }

    fn latest(&self) -> std::result::Result<Option<Template>, TemplateError> {
        self.latest_template().map_err(backend)
    }
}
