//! Schema creation and seeding

use latex_engine::templates::default_template_body;
use rusqlite::params;

use crate::database::{now_sql, Database};
use crate::error::{DbContext, Result};
use crate::records::MathKind;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS template (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    data            TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    created_by      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_template_created_at ON template(created_at, id);

CREATE TABLE IF NOT EXISTS eqn_group (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    name            TEXT NOT NULL UNIQUE,
    notes           TEXT,
    created_at      TEXT NOT NULL,
    created_by      TEXT NOT NULL,
    modified_at     TEXT,
    modified_by     TEXT
);

CREATE TABLE IF NOT EXISTS equation_type (type_name TEXT PRIMARY KEY);
CREATE TABLE IF NOT EXISTS variable_type (type_name TEXT PRIMARY KEY);
CREATE TABLE IF NOT EXISTS unit_type (type_name TEXT PRIMARY KEY);

CREATE TABLE IF NOT EXISTS unit (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    name            TEXT NOT NULL,
    latex           TEXT NOT NULL,
    image           BLOB,
    template_id     INTEGER REFERENCES template(id) ON DELETE SET NULL,
    compiled_at     TEXT,
    image_is_dirty  INTEGER NOT NULL DEFAULT 1,
    notes           TEXT,
    dimensions      INTEGER NOT NULL DEFAULT 1,
    type_name       TEXT NOT NULL DEFAULT 'Unassigned' REFERENCES unit_type(type_name),
    created_at      TEXT NOT NULL,
    created_by      TEXT NOT NULL,
    modified_at     TEXT,
    modified_by     TEXT
);

CREATE TABLE IF NOT EXISTS equation (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    name            TEXT NOT NULL,
    latex           TEXT NOT NULL,
    image           BLOB,
    template_id     INTEGER REFERENCES template(id) ON DELETE SET NULL,
    compiled_at     TEXT,
    image_is_dirty  INTEGER NOT NULL DEFAULT 1,
    notes           TEXT,
    dimensions      INTEGER NOT NULL DEFAULT 1,
    unit_id         INTEGER REFERENCES unit(id) ON DELETE SET NULL,
    type_name       TEXT NOT NULL DEFAULT 'Unassigned' REFERENCES equation_type(type_name),
    created_at      TEXT NOT NULL,
    created_by      TEXT NOT NULL,
    modified_at     TEXT,
    modified_by     TEXT
);

CREATE TABLE IF NOT EXISTS variable (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    name            TEXT NOT NULL,
    latex           TEXT NOT NULL,
    image           BLOB,
    template_id     INTEGER REFERENCES template(id) ON DELETE SET NULL,
    compiled_at     TEXT,
    image_is_dirty  INTEGER NOT NULL DEFAULT 1,
    notes           TEXT,
    dimensions      INTEGER NOT NULL DEFAULT 1,
    unit_id         INTEGER REFERENCES unit(id) ON DELETE SET NULL,
    type_name       TEXT NOT NULL DEFAULT 'Unassigned' REFERENCES variable_type(type_name),
    created_at      TEXT NOT NULL,
    created_by      TEXT NOT NULL,
    modified_at     TEXT,
    modified_by     TEXT
);

CREATE TABLE IF NOT EXISTS equation_eqn_group (
    equation_id     INTEGER NOT NULL REFERENCES equation(id) ON DELETE CASCADE,
    eqn_group_id    INTEGER NOT NULL REFERENCES eqn_group(id) ON DELETE CASCADE,
    insertion_order INTEGER NOT NULL,
    insertion_date  TEXT NOT NULL,
    inserted_by     TEXT NOT NULL,
    code_file_path  TEXT,
    PRIMARY KEY (equation_id, eqn_group_id)
);

CREATE INDEX IF NOT EXISTS idx_equation_eqn_group_parent
    ON equation_eqn_group(eqn_group_id, insertion_order);

CREATE TABLE IF NOT EXISTS variable_equation (
    variable_id     INTEGER NOT NULL REFERENCES variable(id) ON DELETE CASCADE,
    equation_id     INTEGER NOT NULL REFERENCES equation(id) ON DELETE CASCADE,
    insertion_order INTEGER NOT NULL,
    insertion_date  TEXT NOT NULL,
    inserted_by     TEXT NOT NULL,
    PRIMARY KEY (variable_id, equation_id)
);

CREATE INDEX IF NOT EXISTS idx_variable_equation_parent
    ON variable_equation(equation_id, insertion_order);
"#;

impl Database {
    /// Create missing tables and seed type names and the default template
    ///
    /// Safe to run on every open.
    pub fn init_schema(&self) -> Result<()> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction().during("begin schema transaction")?;

        tx.execute_batch(SCHEMA).during("create schema")?;

        for kind in MathKind::ALL {
            let sql = format!(
                "INSERT OR IGNORE INTO {} (type_name) VALUES (?1)",
                kind.type_table()
            );
            for name in kind.seed_types() {
                tx.execute(&sql, params![name]).during("seed type names")?;
            }
        }

        let templates: i64 = tx
            .query_row("SELECT COUNT(*) FROM template", [], |row| row.get(0))
            .during("count templates")?;
        if templates == 0 {
            tx.execute(
                "INSERT INTO template (data, created_at, created_by) VALUES (?1, ?2, ?3)",
                params![default_template_body(), now_sql(), self.user()],
            )
            .during("seed default template")?;
            tracing::info!("Seeded default LaTeX template");
        }

        tx.commit().during("commit schema")?;
        tracing::debug!("Database schema initialized");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_init_schema_is_idempotent() {
        let db = Database::open_in_memory("razor").unwrap();
        db.init_schema().unwrap();
        db.init_schema().unwrap();

        assert_eq!(db.templates().unwrap().len(), 1);
        assert_eq!(
            db.types(MathKind::Equation).unwrap(),
            vec!["Unassigned".to_string(), "Undesignated".to_string()]
        );
    }

    #[test]
    fn test_seeded_template_is_the_default_body() {
        let db = Database::open_in_memory("razor").unwrap();
        let templates = db.templates().unwrap();

        assert_eq!(templates[0].body, default_template_body());
        assert_eq!(templates[0].created_by, "razor");
    }
}
