//! SQLite storage for equations, variables, units and their groupings
//!
//! A [`Database`] owns one connection and the name of the acting user, which
//! is recorded on every write. It also implements
//! [`TemplateStore`](latex_engine::TemplateStore), so a
//! `LatexCompiler<&Database>` compiles against the stored template versions.
//!
//! # Example
//!
//! ```no_run
//! use equation_store::{Database, MathKind, NewMathObject};
//!
//! let db = Database::open("equations.db", "razor")?;
//! let id = db.insert_object(MathKind::Equation, NewMathObject::default())?;
//! println!("{}", db.object(MathKind::Equation, id)?.name);
//! # Ok::<(), equation_store::StoreError>(())
//! ```

mod database;
mod error;
mod groups;
mod links;
mod naming;
mod objects;
mod records;
mod schema;
mod templates;
mod types;

pub use database::Database;
pub use error::{Result, StoreError};
pub use naming::next_default_name;
pub use records::{
    Association, AssociationInput, Child, Direction, EditedObject, Group, GroupUpdate, Link, MathKind,
    MathObject, NewGroup, NewMathObject, ObjectUpdate, Provenance, DEFAULT_LATEX, DEFAULT_TYPE,
};
