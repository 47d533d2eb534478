//! Command implementations
//!
//! Every command opens what it needs through a [`Session`]. Only `compile`
//! is async; it races the render against Ctrl-C so an interrupted compile
//! kills its subprocess and removes its work area.

mod compile;
mod groups;
mod links;
mod objects;
mod templates;
mod types;

use std::path::PathBuf;

use anyhow::Context;
use equation_store::{Database, MathKind};
use latex_engine::{LatexCompiler, Resolution, TemplateId, ToolchainConfig};

use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::output::Printer;

/// Settings shared by every command
#[derive(Debug, Clone)]
pub struct Session {
    pub config: Config,
    /// `--database`, taking precedence over the configuration
    pub database: Option<PathBuf>,
    pub printer: Printer,
}

impl Session {
    pub fn new(config: Config, database: Option<PathBuf>, json: bool) -> Self {
        Self {
            config,
            database,
            printer: Printer::new(json),
        }
    }

    pub fn database_path(&self) -> anyhow::Result<PathBuf> {
        match &self.database {
            Some(path) => Ok(path.clone()),
            None => self.config.database.resolved_path(),
        }
    }

    pub fn user(&self) -> anyhow::Result<String> {
        self.config.database.resolved_user()
    }

    pub fn open_database(&self) -> anyhow::Result<Database> {
        let path = self.database_path()?;
        Database::open(&path, self.user()?)
            .with_context(|| format!("Failed to open database {}", path.display()))
    }

    pub fn toolchain(&self) -> &ToolchainConfig {
        &self.config.latex
    }

    /// A compiler that resolves templates from `db`
    pub fn compiler<'a>(&self, db: &'a Database) -> LatexCompiler<&'a Database> {
        LatexCompiler::new(db, self.toolchain().clone())
    }
}

/// The warning shown when a requested template version was replaced
fn fallback_warning(resolution: Option<Resolution>, used: Option<TemplateId>) -> Option<String> {
    match (resolution, used) {
        (Some(Resolution::FellBackToLatest { requested }), Some(used)) => Some(format!(
            "warning: template version {} not found, used latest version {}",
            requested, used
        )),
        _ => None,
    }
}

pub(crate) fn warn_on_fallback(resolution: Option<Resolution>, used: Option<TemplateId>) {
    if let Some(warning) = fallback_warning(resolution, used) {
        eprintln!("{}", warning);
    }
}

/// Run one parsed command line
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let session = Session::new(config, cli.database, cli.json);
    execute(&session, cli.command).await
}

/// Run a command against an already built session
pub async fn execute(session: &Session, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Compile(args) => compile::run(session, args).await,
        Command::Template(cmd) => templates::run(session, cmd),
        Command::Group(cmd) => groups::run(session, cmd),
        Command::Equation(cmd) => objects::run(session, MathKind::Equation, cmd),
        Command::Variable(cmd) => objects::run(session, MathKind::Variable, cmd),
        Command::Unit(cmd) => objects::run(session, MathKind::Unit, cmd),
        Command::Attach(args) => links::attach(session, args),
        Command::Detach(target) => links::detach(session, target),
        Command::Move { target, direction } => links::move_child(session, target, direction),
        Command::Reorder { parent, children } => links::reorder(session, parent, &children),
        Command::Children(parent) => links::children(session, parent),
        Command::Available(parent) => links::available(session, parent),
        Command::Types(cmd) => types::run(session, cmd),
        Command::Refresh { kind } => objects::refresh(session, kind),
    }
}
