//! `eqdb types ...`

use serde_json::json;

use super::Session;
use crate::cli::TypesCommand;

pub fn run(session: &Session, command: TypesCommand) -> anyhow::Result<()> {
    let db = session.open_database()?;
    let printer = session.printer;

    match command {
        TypesCommand::List { kind } => {
            let names = db.types(kind)?;
            printer.emit(&names, || names.join("\n"))
        }
        TypesCommand::Add { kind, names } => {
            let added = db.add_types(kind, &names)?;
            printer.emit(&json!({ "added": added }), || {
                format!("Added {} of {} {} names", added, names.len(), kind.type_table())
            })
        }
        TypesCommand::Delete { kind, names } => {
            let deleted = db.delete_types(kind, &names)?;
            printer.emit(&json!({ "deleted": deleted }), || {
                format!("Deleted {} {} names", deleted, kind.type_table())
            })
        }
    }
}
