//! `eqdb attach|detach|move|reorder|children|available`

use equation_store::{AssociationInput, Direction};
use serde_json::json;

use super::Session;
use crate::cli::{AttachArgs, LinkParent, LinkTarget};
use crate::output::{child_table, object_table};

pub fn attach(session: &Session, args: AttachArgs) -> anyhow::Result<()> {
    let db = session.open_database()?;
    let LinkTarget { link, parent, child } = args.target;

    let association = db.associate(
        link,
        parent,
        child,
        AssociationInput {
            insertion_order: args.order,
            inserted_by: None,
            code_file_path: args.code_file.map(|p| p.display().to_string()),
        },
    )?;

    session.printer.emit(&association, || {
        format!(
            "Attached {} {} to {} {} at position {}",
            link.child_kind(),
            child,
            link.parent_table(),
            parent,
            association.insertion_order
        )
    })
}

pub fn detach(session: &Session, target: LinkTarget) -> anyhow::Result<()> {
    let db = session.open_database()?;
    let LinkTarget { link, parent, child } = target;

    db.disassociate(link, parent, child)?;

    session.printer.emit(&json!({ "detached": child, "parent": parent }), || {
        format!(
            "Detached {} {} from {} {}",
            link.child_kind(),
            child,
            link.parent_table(),
            parent
        )
    })
}

pub fn move_child(session: &Session, target: LinkTarget, direction: Direction) -> anyhow::Result<()> {
    let db = session.open_database()?;
    let LinkTarget { link, parent, child } = target;

    let moved = db.move_child(link, parent, child, direction)?;
    let children = db.children(link, parent)?;

    session.printer.emit(&children, || {
        let mut text = String::new();
        if !moved {
            let edge = match direction {
                Direction::Up => "first",
                Direction::Down => "last",
            };
            text.push_str(&format!("{} {} is already {}\n", link.child_kind(), child, edge));
        }
        text.push_str(&child_table(&children));
        text
    })
}

pub fn reorder(session: &Session, parent: LinkParent, order: &[i64]) -> anyhow::Result<()> {
    let db = session.open_database()?;
    let LinkParent { link, parent } = parent;

    db.reorder(link, parent, order)?;
    let children = db.children(link, parent)?;

    session.printer.emit(&children, || child_table(&children))
}

pub fn children(session: &Session, parent: LinkParent) -> anyhow::Result<()> {
    let db = session.open_database()?;
    let children = db.children(parent.link, parent.parent)?;
    session.printer.emit(&children, || child_table(&children))
}

pub fn available(session: &Session, parent: LinkParent) -> anyhow::Result<()> {
    let db = session.open_database()?;
    let objects = db.not_in_parent(parent.link, parent.parent)?;
    session.printer.emit(&objects, || object_table(&objects))
}
