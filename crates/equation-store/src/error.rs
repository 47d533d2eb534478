//! Error types for the equation store

use latex_engine::FragmentError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    /// A driver error, tagged with the operation that raised it
    #[error("Database operation '{operation}' failed: {source}")]
    Database {
        operation: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("{what} {id} not found")]
    NotFound { what: &'static str, id: i64 },

    #[error("Invalid input: {0}")]
    Invalid(String),

    #[error(transparent)]
    Fragment(#[from] FragmentError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub(crate) fn not_found(what: &'static str, id: i64) -> Self {
        StoreError::NotFound { what, id }
    }

    fn from_sqlite(operation: &'static str, source: rusqlite::Error) -> Self {
        match source.sqlite_error_code() {
            Some(rusqlite::ErrorCode::ConstraintViolation) => {
                StoreError::Invalid(format!("{}: {}", operation, source))
            }
            _ => StoreError::Database { operation, source },
        }
    }
}

/// Attach an operation name to driver errors
pub(crate) trait DbContext<T> {
    fn during(self, operation: &'static str) -> Result<T>;
}

impl<T> DbContext<T> for rusqlite::Result<T> {
    fn during(self, operation: &'static str) -> Result<T> {
        self.map_err(|source| StoreError::from_sqlite(operation, source))
    }
}
