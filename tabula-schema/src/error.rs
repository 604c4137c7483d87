//! Error types for schema migration and configuration.

// These warnings are false positives - the fields are used by derive macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors that can occur while accumulating, tracing or configuring schemas.
#[derive(Error, Debug, Diagnostic)]
pub enum SchemaError {
    /// A migration tried to mutate shared, read-only data.
    #[error("cannot migrate static data `{name}`")]
    #[diagnostic(
        code(tabula::schema::static_data),
        help("only tables created at runtime can accumulate migrations")
    )]
    StaticData { name: String },

    /// A named lookup failed.
    #[error("entry `{name}` not found")]
    #[diagnostic(code(tabula::schema::entry_not_found))]
    EntryNotFound { name: String },

    /// A rename trace ended on a dropped record.
    #[error("`{name}` was dropped by a pending migration")]
    #[diagnostic(code(tabula::schema::reentry_dropped))]
    ReentryDropped { name: String },

    /// Foreign key tracing finished with unresolved references.
    #[error("foreign key tracing failed with {count} error(s)")]
    #[diagnostic(code(tabula::schema::trace_failed))]
    TraceFailed {
        count: usize,
        #[related]
        errors: Vec<SchemaError>,
    },

    /// Error reading a file.
    #[error("failed to read file: {path}")]
    #[diagnostic(code(tabula::schema::io_error))]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration error.
    #[error("configuration error: {message}")]
    #[diagnostic(code(tabula::schema::config_error))]
    ConfigError { message: String },

    /// TOML parsing error.
    #[error("failed to parse TOML")]
    #[diagnostic(code(tabula::schema::toml_error))]
    TomlError {
        #[source]
        source: toml::de::Error,
    },
}

/// Coarse error code, as surfaced to backends and DDL emitters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Mutation attempted on static/shared data.
    StaticData,
    /// A named lookup failed.
    EntryNotFound,
    /// A trace hit a dropped record.
    ReentryDropped,
    /// Configuration could not be loaded.
    Config,
}

impl SchemaError {
    /// Create a static data error.
    pub fn static_data(name: impl Into<String>) -> Self {
        Self::StaticData { name: name.into() }
    }

    /// Create an entry not found error.
    pub fn entry_not_found(name: impl Into<String>) -> Self {
        Self::EntryNotFound { name: name.into() }
    }

    /// Create a reentry dropped error.
    pub fn reentry_dropped(name: impl Into<String>) -> Self {
        Self::ReentryDropped { name: name.into() }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Aggregate trace errors. Returns `None` when there is nothing to report.
    pub fn trace_failed(errors: Vec<SchemaError>) -> Option<Self> {
        if errors.is_empty() {
            return None;
        }
        Some(Self::TraceFailed {
            count: errors.len(),
            errors,
        })
    }

    /// Get the coarse code of this error.
    ///
    /// An aggregate reports the code of its last error, the same way a trace
    /// reports the last failure it saw.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::StaticData { .. } => ErrorCode::StaticData,
            Self::EntryNotFound { .. } => ErrorCode::EntryNotFound,
            Self::ReentryDropped { .. } => ErrorCode::ReentryDropped,
            Self::TraceFailed { errors, .. } => errors
                .last()
                .map(SchemaError::code)
                .unwrap_or(ErrorCode::EntryNotFound),
            Self::IoError { .. } | Self::ConfigError { .. } | Self::TomlError { .. } => {
                ErrorCode::Config
            }
        }
    }

    /// Individual errors carried by this error.
    pub fn errors(&self) -> &[SchemaError] {
        match self {
            Self::TraceFailed { errors, .. } => errors,
            other => std::slice::from_ref(other),
        }
    }
}
