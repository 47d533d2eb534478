//! Configuration file for the `eqdb` command
//!
//! The file is TOML with two optional sections:
//!
//! ```toml
//! [database]
//! path = "/home/razor/equations.db"
//! user = "razor"
//!
//! [latex]
//! working_dir = "/tmp/eqdb"
//! tex_compiler = "xelatex"
//! converter = { program = "magick", args = ["convert"] }
//! density = 300
//! timeout_ms = 30000
//! ```
//!
//! Missing sections and keys take their defaults. Command line flags
//! override whatever the file says.

use anyhow::Context;
use latex_engine::ToolchainConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure loaded from TOML files
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    /// TeX toolchain settings
    #[serde(default)]
    pub latex: ToolchainConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The TOML is malformed
    /// - A key has the wrong type
    ///
    /// # Example
    ///
    /// ```no_run
    /// use eqdb_cli::config::Config;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let config = Config::from_file("eqdb.toml")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string
    ///
    /// # Example
    ///
    /// ```
    /// use eqdb_cli::config::Config;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let config = Config::from_str(r#"
    ///     [latex]
    ///     tex_compiler = "lualatex"
    /// "#)?;
    /// assert_eq!(config.latex.tex_compiler.program, "lualatex");
    /// # Ok(())
    /// # }
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).context("Failed to parse TOML configuration")
    }

    /// Load `path` if given, otherwise use the defaults
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}

/// Where the database lives and who is writing to it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database file (default: `<data dir>/equation-db/equations.db`)
    pub path: Option<PathBuf>,
    /// Name recorded as creator/modifier (default: `$USER` or `$USERNAME`)
    pub user: Option<String>,
}

impl DatabaseConfig {
    pub fn resolved_path(&self) -> anyhow::Result<PathBuf> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => default_database_path(),
        }
    }

    pub fn resolved_user(&self) -> anyhow::Result<String> {
        match &self.user {
            Some(user) => Ok(user.clone()),
            None => default_user(),
        }
    }
}

/// `<data dir>/equation-db/equations.db`
pub fn default_database_path() -> anyhow::Result<PathBuf> {
    let data_dir = dirs::data_dir().context("No data directory found for this platform")?;
    Ok(data_dir.join("equation-db").join("equations.db"))
}

/// The login name from `$USER` (or `$USERNAME` on Windows)
pub fn default_user() -> anyhow::Result<String> {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
        .filter(|user| !user.trim().is_empty())
        .context("Could not determine the user name; set [database] user or $USER")
}
