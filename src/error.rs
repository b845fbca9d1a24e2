//! Error handling module for sly
//!
//! Configuration errors are raised synchronously while a run is being set up,
//! before any handler executes. They never travel through the completion
//! callback. Errors raised *during* a run (a handler or hook failing) are
//! plain `anyhow::Error` values delivered to the terminal callback instead.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration error raised while preparing a migration run
#[derive(Error, Debug)]
pub enum SlyError {
    /// The handler table was absent or empty after dropping disabled entries
    #[error("No handlers given")]
    NoHandlers,

    /// No configured path or pattern produced a migration file
    #[error("No migration files found")]
    NoMigrationFiles,

    /// A discovered file has an extension with no registered handler
    #[error("No handler registered for extension '{extension}' (file {file:?})")]
    MissingHandler { extension: String, file: PathBuf },

    /// A migration file does not follow the `<order>_<name>` convention
    #[error("Migration file name must look like '<order>_<name>': {file:?}")]
    InvalidFileName { file: PathBuf },

    /// A glob pattern could not be compiled
    #[error("Invalid migration pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    /// A migration file could not be read for digesting
    #[error("Failed to read migration file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// IO errors (directory traversal, config files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file errors (loading, validation)
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for setup operations
pub type Result<T> = std::result::Result<T, SlyError>;

impl SlyError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(SlyError::NoHandlers.to_string(), "No handlers given");
        assert_eq!(
            SlyError::NoMigrationFiles.to_string(),
            "No migration files found"
        );

        let err = SlyError::config("handler command must not be empty");
        assert_eq!(
            err.to_string(),
            "Configuration error: handler command must not be empty"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: SlyError = io_err.into();
        assert!(matches!(err, SlyError::Io(_)));
    }

    #[test]
    fn test_missing_handler_names_extension() {
        let err = SlyError::MissingHandler {
            extension: "rb".to_string(),
            file: PathBuf::from("migrations/4_seed.rb"),
        };
        let msg = err.to_string();
        assert!(msg.contains("'rb'"));
        assert!(msg.contains("4_seed.rb"));
    }
}
