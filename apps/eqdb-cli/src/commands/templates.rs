//! `eqdb template ...`

use anyhow::Context;
use latex_engine::TemplateResolver;
use serde_json::json;

use super::Session;
use crate::cli::TemplateCommand;
use crate::output::template_table;

pub fn run(session: &Session, command: TemplateCommand) -> anyhow::Result<()> {
    let db = session.open_database()?;
    let printer = session.printer;

    match command {
        TemplateCommand::List => {
            let templates = db.templates()?;
            printer.emit(&templates, || template_table(&templates))
        }
        TemplateCommand::Show { id } => {
            let template = db.template(id)?;
            printer.emit(&template, || template.body.trim_end().to_string())
        }
        TemplateCommand::Add { body } => {
            let id = db.insert_template(&body)?;
            printer.emit(&json!({ "id": id }), || format!("Stored template version {}", id))
        }
        TemplateCommand::Import { path } => {
            let id = db
                .insert_template_from_file(&path)
                .with_context(|| format!("Failed to import template {}", path.display()))?;
            printer.emit(&json!({ "id": id, "path": path }), || {
                format!("Stored {} as template version {}", path.display(), id)
            })
        }
        TemplateCommand::Delete { ids } => {
            let deleted = db.delete_templates(&ids)?;
            printer.emit(&json!({ "deleted": deleted }), || {
                format!("Deleted {} of {} template versions", deleted, ids.len())
            })
        }
        TemplateCommand::Versions => {
            let versions = TemplateResolver::new(&db).available_versions()?;
            printer.emit(&versions, || {
                versions
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
    }
}
