//! Typed error handling for calltally.
//!
//! Per-file failures (`Io`, `Parse`) are recoverable: the scan records them
//! and moves on. Configuration and argument errors abort the session before
//! any output is produced.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for calltally operations.
#[derive(Error, Debug)]
pub enum CalltallyError {
    /// I/O error when reading source or config files
    #[error("I/O error at {path}: {message}")]
    Io {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Source could not be turned into a syntax tree
    #[error("Parse error in {path}: {message}")]
    Parse {
        path: PathBuf,
        message: String,
        /// Line number (1-indexed) if available
        line: Option<usize>,
        /// Column number (1-indexed) if available
        column: Option<usize>,
    },

    /// Configuration file errors
    #[error("Config error at {path}: {message}")]
    Config { path: PathBuf, message: String },

    /// Invalid option value (unknown mode, format, receiver type...)
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },
}

impl CalltallyError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create a parse error without location.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
            line: None,
            column: None,
        }
    }

    /// Create a parse error with line/column info.
    pub fn parse_at(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        line: usize,
        column: usize,
    ) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
            line: Some(line),
            column: Some(column),
        }
    }

    /// Create a config error.
    pub fn config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an invalid-argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Check if this is a recoverable error (the scan can skip the file and continue).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Parse { .. })
    }

    /// Error description without the path prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Io { message, .. }
            | Self::Parse { message, .. }
            | Self::Config { message, .. }
            | Self::InvalidArgument { message } => message,
        }
    }

    /// Get the path associated with this error, if any.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Io { path, .. } => Some(path),
            Self::Parse { path, .. } => Some(path),
            Self::Config { path, .. } => Some(path),
            Self::InvalidArgument { .. } => None,
        }
    }
}

/// Convenience type alias for calltally results.
pub type CalltallyResult<T> = Result<T, CalltallyError>;

/// Extension trait for converting std::io::Error with path context.
pub trait IoResultExt<T> {
    /// Add path context to an I/O error.
    fn with_path(self, path: impl Into<PathBuf>) -> CalltallyResult<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> CalltallyResult<T> {
        self.map_err(|e| CalltallyError::io(path, e))
    }
}
