//! Error types for cairn operations.
//!
//! This module defines [`CairnError`], the primary error type used throughout
//! the application, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Use `CairnError` for domain-specific errors that need distinct handling
//! - Use `anyhow::Error` (via `CairnError::Other`) for unexpected errors
//! - Registry operations never let errors cross their public boundary: they
//!   log, emit a failure event, and return `false`/`None`. `CairnError` is
//!   for internal helpers and the two constructor-time hard failures
//!   (registry load, engine validation).

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for cairn operations.
#[derive(Debug, Error)]
pub enum CairnError {
    /// Failed to parse a persisted JSON document.
    #[error("Failed to parse {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// Failed to serialize or write a persisted document.
    #[error("Failed to write {path}: {message}")]
    ConfigWriteError { path: PathBuf, message: String },

    /// Environment name is not registered.
    #[error("Environment '{name}' does not exist")]
    UnknownEnvironment { name: String },

    /// Environment name is already registered.
    #[error("Environment '{name}' already exists")]
    EnvironmentExists { name: String },

    /// No interpreter binary found inside an environment root.
    #[error("No interpreter found in environment '{name}', checked: {checked}")]
    InterpreterNotFound { name: String, checked: String },

    /// Interpreter path failed construction-time validation.
    #[error("Invalid interpreter at {path}: {message}")]
    InterpreterInvalid { path: PathBuf, message: String },

    /// External tool exited with a nonzero status.
    #[error("{tool} failed with exit code {code:?}: {stderr}")]
    ToolFailed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    /// Mirror name or URL rejected by the registry.
    #[error("Invalid mirror: {message}")]
    InvalidMirror { message: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for cairn operations.
pub type Result<T> = std::result::Result<T, CairnError>;
