//! Error types for the blueprint loading pipeline.
//!
//! This module defines one error type per layer:
//!
//! - [`ConvertError`] - a single CSV cell could not be converted to its bound type
//! - [`SchemaError`] - a record schema declaration is inconsistent
//! - [`RecordError`] - a record could not be materialized from its row(s)
//! - [`TableError`] - a whole table failed to load or serialize
//! - [`RegistryError`] - table registration errors
//! - [`ConfigError`] - configuration loading and path templating errors
//! - [`SourceError`] - storage backend errors (never cross `load_all`)
//! - [`ManagerError`] - load cycle orchestration errors
//! - [`ServerError`] - HTTP API errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Cell Conversion Errors
// =============================================================================

/// A raw cell value could not be converted to the bound type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot convert '{value}' to {expected}: {reason}")]
pub struct ConvertError {
    /// The raw cell text.
    pub value: String,
    /// Name of the target type.
    pub expected: &'static str,
    /// Why the conversion failed.
    pub reason: String,
}

impl ConvertError {
    pub fn new(value: impl Into<String>, expected: &'static str, reason: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            expected,
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Schema Declaration Errors
// =============================================================================

/// Errors raised while building a record schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// The same member was bound twice.
    #[error("{record_type}: member '{member}' is bound more than once")]
    DuplicateMember {
        record_type: &'static str,
        member: String,
    },

    /// The explicit key column does not name a scalar field.
    #[error("{record_type}: key column '{column}' is not a scalar field")]
    UnknownKeyColumn {
        record_type: &'static str,
        column: String,
    },

    /// The schema has no scalar field to use as key column.
    #[error("{record_type}: schema declares no scalar field to use as key column")]
    NoKeyColumn { record_type: &'static str },
}

// =============================================================================
// Record Errors
// =============================================================================

/// Errors while materializing a record from CSV rows.
///
/// Every variant carries the owning record type and the key value of the
/// row being read, so a malformed data file can be located quickly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// A column required by a binding is absent from the header.
    #[error("{record_type} (key '{key}', line {line}): missing column '{column}'")]
    MissingColumn {
        record_type: &'static str,
        key: String,
        column: String,
        line: u64,
    },

    /// A cell could not be converted to the member's type.
    #[error("{record_type} (key '{key}', line {line}): invalid value for member '{member}'")]
    Convert {
        record_type: &'static str,
        key: String,
        member: String,
        line: u64,
        #[source]
        source: ConvertError,
    },

    /// A keyed collection received the same key twice.
    #[error("{record_type} (line {line}): duplicate key '{key}'")]
    DuplicateKey {
        record_type: &'static str,
        key: String,
        line: u64,
    },
}

// =============================================================================
// Table Errors
// =============================================================================

/// Errors while loading or serializing a blueprint table.
#[derive(Debug, Error)]
pub enum TableError {
    /// The CSV document itself is malformed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A record could not be read.
    #[error(transparent)]
    Record(#[from] RecordError),

    /// IO error while writing CSV output.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Registry Errors
// =============================================================================

/// Errors from the table registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Two tables were registered under the same name.
    #[error("Blueprint table already registered: {0}")]
    DuplicateTable(String),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while loading configuration or rendering path templates.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Failed to read config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The configuration is not valid JSON or has wrong field types.
    #[error("Config JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The configuration failed schema validation.
    #[error("Invalid config: {}", .0.join("; "))]
    Invalid(Vec<String>),

    /// A path template references an unknown placeholder.
    #[error("Unknown placeholder '{{{placeholder}}}' in template '{template}'")]
    UnknownPlaceholder { template: String, placeholder: String },

    /// A source backend name could not be parsed.
    #[error("Unknown blueprint source: {0}")]
    UnknownSource(String),
}

// =============================================================================
// Source Errors
// =============================================================================

/// Errors raised inside a storage backend.
///
/// These never escape `BlueprintSource::load_all`; they are logged and the
/// affected data paths are reported as failed.
#[derive(Debug, Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status.
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    /// File system error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Zip archive error.
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Metadata JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Path template could not be rendered.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// A downloaded archive does not match its advertised hash.
    #[error("Hash mismatch for {url}: expected {expected}, got {actual}")]
    HashMismatch {
        url: String,
        expected: String,
        actual: String,
    },

    /// A blocking worker task failed.
    #[error("Worker task failed: {0}")]
    Worker(String),
}

// =============================================================================
// Manager Errors
// =============================================================================

/// Load cycle orchestration errors.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// A load cycle is already running.
    #[error("A blueprint load cycle is already in progress")]
    LoadInProgress,
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind or serve.
    #[error("Server IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for cell conversions.
pub type ConvertResult<T> = Result<T, ConvertError>;

/// Result type for record operations.
pub type RecordResult<T> = Result<T, RecordError>;

/// Result type for table operations.
pub type TableResult<T> = Result<T, TableError>;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for storage backend operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Result type for manager operations.
pub type ManagerResult<T> = Result<T, ManagerError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Render an error with its full `source()` chain.
pub fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut current = error.source();
    while let Some(cause) = current {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        current = cause.source();
    }
    message
}
