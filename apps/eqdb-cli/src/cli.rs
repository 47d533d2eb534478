//! Command line definition

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use equation_store::{Direction, Link, MathKind};
use latex_engine::TemplateId;

/// Command-line arguments for `eqdb`
#[derive(Parser, Debug)]
#[command(name = "eqdb")]
#[command(version, about = "Store LaTeX equations and render them to PNG")]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database file (overrides the configuration)
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile a LaTeX fragment to PNG
    Compile(CompileArgs),

    /// Manage template versions
    #[command(subcommand)]
    Template(TemplateCommand),

    /// Manage equation groups
    #[command(subcommand)]
    Group(GroupCommand),

    /// Manage equations
    #[command(subcommand)]
    Equation(ObjectCommand),

    /// Manage variables
    #[command(subcommand)]
    Variable(ObjectCommand),

    /// Manage units
    #[command(subcommand)]
    Unit(ObjectCommand),

    /// Attach an existing child to a parent
    Attach(AttachArgs),

    /// Detach a child from a parent
    Detach(LinkTarget),

    /// Move a child one position up or down
    Move {
        #[command(flatten)]
        target: LinkTarget,
        /// `up` or `down`
        direction: Direction,
    },

    /// Put a parent's children in the given order
    Reorder {
        #[command(flatten)]
        parent: LinkParent,
        /// Every child id, in the new order
        #[arg(required = true)]
        children: Vec<i64>,
    },

    /// List a parent's children in order
    Children(LinkParent),

    /// List objects that are not yet children of a parent
    Available(LinkParent),

    /// Manage type names
    #[command(subcommand)]
    Types(TypesCommand),

    /// Recompile every object of a kind whose image is out of date
    Refresh {
        /// `equation`, `variable` or `unit`
        kind: MathKind,
    },
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct CompileArgs {
    /// The LaTeX fragment
    #[arg(long, default_value = "m^3")]
    pub pattern: String,

    /// Keep the intermediate .tex/.aux/.log/.pdf files
    #[arg(long)]
    pub keep: bool,

    /// Base name of the intermediate files
    #[arg(long = "temp_fname", alias = "temp-fname", default_value = "eq_db")]
    pub temp_fname: String,

    /// Template version (default: latest)
    #[arg(long)]
    pub version: Option<TemplateId>,

    /// Use this .tex file as the template instead of the database
    #[arg(long = "template_file", alias = "template-file")]
    pub template_file: Option<PathBuf>,

    /// Write the PNG here
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Open the PNG with the platform image viewer
    #[arg(long)]
    pub show: bool,
}

#[derive(Subcommand, Debug)]
pub enum TemplateCommand {
    /// List template versions
    List,
    /// Print one template
    Show { id: TemplateId },
    /// Store a template body given on the command line
    Add { body: String },
    /// Store a template read from a .tex file
    Import { path: PathBuf },
    /// Delete template versions
    Delete {
        #[arg(required = true)]
        ids: Vec<TemplateId>,
    },
    /// Print the available version ids, oldest first
    Versions,
}

#[derive(Subcommand, Debug)]
pub enum GroupCommand {
    /// List groups
    List,
    /// Create a group
    Add {
        /// Name (default: the next free `eqn_group N`)
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Rename a group
    Rename { id: i64, name: String },
    /// Delete a group (its equations stay)
    Delete { id: i64 },
}

#[derive(Subcommand, Debug)]
pub enum ObjectCommand {
    /// List all rows
    List,
    /// Create a row
    Add(AddObjectArgs),
    /// Print one row
    Show {
        id: i64,
        /// Write the stored image here
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Replace the LaTeX source and recompile
    SetLatex {
        id: i64,
        latex: String,
        /// Template version (default: the one the row was compiled with)
        #[arg(long)]
        version: Option<TemplateId>,
    },
    /// Delete a row and its associations
    Delete { id: i64 },
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct AddObjectArgs {
    /// Name (default: the next free `<kind> N`)
    #[arg(long)]
    pub name: Option<String>,

    /// LaTeX source (default: `a^2 + b^2 = c^2`)
    #[arg(long)]
    pub latex: Option<String>,

    #[arg(long)]
    pub notes: Option<String>,

    #[arg(long = "type")]
    pub type_name: Option<String>,

    /// Unit id (equations and variables only)
    #[arg(long)]
    pub unit: Option<i64>,

    #[arg(long)]
    pub dimensions: Option<i64>,

    /// Compile now instead of leaving the image for `refresh`
    #[arg(long)]
    pub compile: bool,

    /// Template version to compile with (default: the latest)
    #[arg(long)]
    pub version: Option<TemplateId>,

    /// Attach the new row to this parent (group for equations, equation
    /// for variables) in the same transaction
    #[arg(long)]
    pub parent: Option<i64>,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct LinkParent {
    /// `group` (equations in a group) or `equation` (variables of an equation)
    pub link: Link,
    pub parent: i64,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct LinkTarget {
    /// `group` (equations in a group) or `equation` (variables of an equation)
    pub link: Link,
    pub parent: i64,
    pub child: i64,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct AttachArgs {
    #[command(flatten)]
    pub target: LinkTarget,

    /// Position (default: after the last child)
    #[arg(long)]
    pub order: Option<i64>,

    /// Source file that implements the equation (groups only)
    #[arg(long = "code-file")]
    pub code_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum TypesCommand {
    /// List type names of a kind
    List { kind: MathKind },
    /// Add type names
    Add {
        kind: MathKind,
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Delete unused type names
    Delete {
        kind: MathKind,
        #[arg(required = true)]
        names: Vec<String>,
    },
}
