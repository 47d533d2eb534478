//! `eqdb group ...`

use equation_store::{GroupUpdate, NewGroup};
use serde_json::json;

use super::Session;
use crate::cli::GroupCommand;
use crate::output::group_table;

pub fn run(session: &Session, command: GroupCommand) -> anyhow::Result<()> {
    let db = session.open_database()?;
    let printer = session.printer;

    match command {
        GroupCommand::List => {
            let groups = db.groups()?;
            printer.emit(&groups, || group_table(&groups))
        }
        GroupCommand::Add { name, notes } => {
            let id = db.insert_group(NewGroup { name, notes })?;
            let group = db.group(id)?;
            printer.emit(&group, || format!("Created group {} '{}'", group.id, group.name))
        }
        GroupCommand::Rename { id, name } => {
            let group = db.update_group(
                id,
                GroupUpdate {
                    name: Some(name),
                    ..Default::default()
                },
            )?;
            printer.emit(&group, || format!("Renamed group {} to '{}'", group.id, group.name))
        }
        GroupCommand::Delete { id } => {
            db.delete_group(id)?;
            printer.emit(&json!({ "deleted": id }), || format!("Deleted group {}", id))
        }
    }
}
