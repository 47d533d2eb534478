//! Error types for template resolution and the compile pipeline

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while looking up templates
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("No templates are available")]
    NoTemplates,

    #[error("Template store error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors raised by the compile pipeline
///
/// Every stage failure aborts the remaining stages, so a caller never sees
/// partial image bytes.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Template has no placeholder '{placeholder}'")]
    TemplateSubstitution { placeholder: &'static str },

    #[error("Could not prepare working directory {path}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TeX compilation failed: {message}")]
    Compile {
        message: String,
        /// Tail of the TeX log (or process output when no log was written)
        log: String,
    },

    #[error("PDF to PNG conversion failed: {message}")]
    Rasterize { message: String, output: String },

    #[error("Could not read artifact {path}: {reason}")]
    ArtifactRead { path: PathBuf, reason: String },

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("Compilation cancelled")]
    Cancelled,

    #[error("Compile queue is full")]
    QueueFull,

    #[error("Compile worker is not running")]
    WorkerClosed,
}

impl PipelineError {
    /// Error lines reported by TeX (lines starting with `!`), if any
    pub fn tex_errors(&self) -> Vec<String> {
        match self {
            PipelineError::Compile { log, .. } => tex_errors(log),
            _ => Vec::new(),
        }
    }
}

/// Extract TeX error lines and their `l.<n>` location lines from a log
pub fn tex_errors(log: &str) -> Vec<String> {
    let mut errors = Vec::new();
    let mut lines = log.lines().peekable();

    while let Some(line) = lines.next() {
        let Some(message) = line.strip_prefix('!') else {
            continue;
        };
        let mut error = message.trim().to_string();

        // The offending input line follows within a few lines as "l.<n> ..."
        for _ in 0..4 {
            match lines.peek() {
                Some(next) if next.starts_with("l.") => {
                    error.push_str(" (");
                    error.push_str(next.trim());
                    error.push(')');
                    lines.next();
                    break;
                }
                Some(next) if next.starts_with('!') => break,
                Some(_) => {
                    lines.next();
                }
                None => break,
            }
        }

        errors.push(error);
    }

    errors
}
