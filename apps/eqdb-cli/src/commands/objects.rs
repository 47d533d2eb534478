//! `eqdb equation|variable|unit ...` and `eqdb refresh`

use std::fs;

use anyhow::{bail, Context};
use equation_store::{
    AssociationInput, Link, MathKind, NewMathObject, DEFAULT_LATEX,
};
use latex_engine::compiler::png_dimensions;
use latex_engine::{CompiledFragment, FragmentUpdate};
use serde_json::json;

use super::{warn_on_fallback, Session};
use crate::cli::{AddObjectArgs, ObjectCommand};
use crate::output::{object_details, object_table};

pub fn run(session: &Session, kind: MathKind, command: ObjectCommand) -> anyhow::Result<()> {
    let db = session.open_database()?;
    let printer = session.printer;

    match command {
        ObjectCommand::List => {
            let objects = db.objects(kind)?;
            printer.emit(&objects, || object_table(&objects))
        }
        ObjectCommand::Add(args) => {
            let parent = args.parent;
            let new = new_object(session, &db, kind, args)?;
            let id = match parent {
                Some(parent) => {
                    db.insert_child(parent_link(kind)?, parent, new, AssociationInput::default())?
                }
                None => db.insert_object(kind, new)?,
            };
            let object = db.object(kind, id)?;
            printer.emit(&object, || format!("Created {} {} '{}'", kind, object.id, object.name))
        }
        ObjectCommand::Show { id, output } => {
            let object = db.object(kind, id)?;
            if let Some(path) = &output {
                let image = match (&object.image, object.image_is_dirty) {
                    (Some(image), false) => image,
                    _ => bail!("{} {} has no current image; run `eqdb refresh {}`", kind, id, kind),
                };
                fs::write(path, image)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                tracing::info!("Wrote {} bytes to {}", image.len(), path.display());
            }
            printer.emit(&object, || object_details(&object))
        }
        ObjectCommand::SetLatex { id, latex, version } => {
            let compiler = session.compiler(&db);
            let edited = db.edit_fragment(
                kind,
                id,
                FragmentUpdate {
                    latex: Some(latex),
                    template_id: version,
                    ..Default::default()
                },
                &compiler,
            )?;
            warn_on_fallback(edited.resolution, edited.object.template_id);

            let object = &edited.object;
            printer.emit(&edited, || {
                let size = object
                    .image
                    .as_deref()
                    .and_then(|png| png_dimensions(png).ok())
                    .map(|(w, h)| format!(" ({}x{} px)", w, h))
                    .unwrap_or_default();
                format!("Recompiled {} {}{}", kind, object.id, size)
            })
        }
        ObjectCommand::Delete { id } => {
            db.delete_object(kind, id)?;
            printer.emit(&json!({ "deleted": id }), || format!("Deleted {} {}", kind, id))
        }
    }
}

pub fn refresh(session: &Session, kind: MathKind) -> anyhow::Result<()> {
    let db = session.open_database()?;
    let compiler = session.compiler(&db);

    let refreshed = db.refresh_dirty(kind, &compiler)?;
    let remaining = db.dirty_objects(kind)?.len();

    session.printer.emit(
        &json!({ "refreshed": refreshed, "still_dirty": remaining }),
        || {
            if remaining == 0 {
                format!("Refreshed {} {} rows", refreshed, kind)
            } else {
                format!(
                    "Refreshed {} {} rows; {} failed to compile and stay dirty",
                    refreshed, kind, remaining
                )
            }
        },
    )
}

/// The link that makes rows of `kind` children
fn parent_link(kind: MathKind) -> anyhow::Result<Link> {
    match kind {
        MathKind::Equation => Ok(Link::EquationGroup),
        MathKind::Variable => Ok(Link::VariableEquation),
        MathKind::Unit => bail!("units cannot be attached to a parent"),
    }
}

fn new_object(
    session: &Session,
    db: &equation_store::Database,
    kind: MathKind,
    args: AddObjectArgs,
) -> anyhow::Result<NewMathObject> {
    if args.parent.is_some() {
        parent_link(kind)?;
    }

    let latex = args.latex.unwrap_or_else(|| DEFAULT_LATEX.to_string());
    let fragment = if args.compile {
        let fragment = CompiledFragment::compile(latex, args.version, &session.compiler(db))
            .context("Failed to compile the new row")?;
        warn_on_fallback(fragment.resolution(), fragment.template_id());
        fragment
    } else {
        CompiledFragment::pending(latex, args.version)
    };

    Ok(NewMathObject {
        name: args.name,
        fragment,
        notes: args.notes,
        dimensions: args.dimensions.unwrap_or(1),
        unit_id: args.unit,
        type_name: args.type_name,
    })
}
