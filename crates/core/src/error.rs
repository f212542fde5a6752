//! Error types for polygon
//!
//! This module provides unified error handling across the engine. Errors are
//! grouped the way the pipeline reacts to them: environment errors abort the
//! run, configuration errors abort a single connection, and downstream errors
//! are reported for the connection that triggered them.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for polygon
#[derive(Debug, Error)]
pub enum EngineError {
    // ========================================================================
    // Environment Errors
    // ========================================================================
    /// The project has no `sequel/` directory
    #[error("No sequel directory found at: {0}")]
    SequelDirMissing(PathBuf),

    /// File IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File read error
    #[error("Failed to read file '{path}': {message}")]
    FileRead { path: PathBuf, message: String },

    /// File write error
    #[error("Failed to write file '{path}': {message}")]
    FileWrite { path: PathBuf, message: String },

    /// Directory creation failed
    #[error("Failed to create directory '{path}': {message}")]
    DirectoryCreate { path: PathBuf, message: String },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// A configured field has no matching column
    #[error("Field '{field}' in sequel.yml does not exist on table '{connection}.{table}'")]
    UnknownField {
        connection: String,
        table: String,
        field: String,
    },

    /// A configured addition shadows a real column
    #[error("Addition '{name}' collides with an existing column of table '{connection}.{table}'")]
    AdditionCollision {
        connection: String,
        table: String,
        name: String,
    },

    /// A configured join path cannot be walked through foreign keys
    #[error("Join path '{path}' on table '{connection}.{table}' cannot be resolved at '{segment}'")]
    JoinPathUnresolved {
        connection: String,
        table: String,
        path: String,
        segment: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// YAML (de)serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // Downstream Errors
    // ========================================================================
    /// The external record generator failed
    #[error("Downstream generator '{program}' failed: {message}")]
    Downstream { program: String, message: String },

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Generic error with context
    #[error("{context}: {message}")]
    WithContext { context: String, message: String },
}

impl EngineError {
    /// Create an invalid-configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        EngineError::InvalidConfig(msg.into())
    }

    /// Create an unknown-field error
    pub fn unknown_field(
        connection: impl Into<String>,
        table: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        EngineError::UnknownField {
            connection: connection.into(),
            table: table.into(),
            field: field.into(),
        }
    }

    /// Create an addition-collision error
    pub fn addition_collision(
        connection: impl Into<String>,
        table: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        EngineError::AdditionCollision {
            connection: connection.into(),
            table: table.into(),
            name: name.into(),
        }
    }

    /// Create a file read error for `path`
    pub fn file_read(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        EngineError::FileRead {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Create a file write error for `path`
    pub fn file_write(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        EngineError::FileWrite {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        EngineError::Internal(msg.into())
    }

    /// Create an error with context
    pub fn with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        EngineError::WithContext {
            context: context.into(),
            message: msg.into(),
        }
    }

    /// Check if this error is a configuration error.
    ///
    /// Configuration errors stop generation for the affected connection only.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            EngineError::UnknownField { .. }
                | EngineError::AdditionCollision { .. }
                | EngineError::JoinPathUnresolved { .. }
                | EngineError::InvalidConfig(_)
                | EngineError::Yaml(_)
                | EngineError::Json(_)
        )
    }

    /// Check if this error comes from the environment (missing directories,
    /// unreadable or unwritable files). These abort the whole run.
    pub fn is_environment(&self) -> bool {
        matches!(
            self,
            EngineError::SequelDirMissing(_)
                | EngineError::Io(_)
                | EngineError::FileRead { .. }
                | EngineError::FileWrite { .. }
                | EngineError::DirectoryCreate { .. }
        )
    }

    /// Check if this error was raised by the downstream generator
    pub fn is_downstream(&self) -> bool {
        matches!(self, EngineError::Downstream { .. })
    }
}

/// Result type alias using EngineError
pub type EngineResult<T> = Result<T, EngineError>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn with_context<C: Into<String>>(self, context: C) -> EngineResult<T>;
}

impl<T, E: Into<EngineError>> ResultExt<T> for Result<T, E> {
    fn with_context<C: Into<String>>(self, context: C) -> EngineResult<T> {
        self.map_err(|e| {
            let err: EngineError = e.into();
            EngineError::WithContext {
                context: context.into(),
                message: err.to_string(),
            }
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
