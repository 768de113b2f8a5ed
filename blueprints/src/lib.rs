//! # Blueprints - typed CSV game data tables
//!
//! Blueprints loads game design data ("blueprints") authored as CSV files
//! into typed, keyed record tables. Files come from one of three storage
//! backends, with a fallback backend for files the primary one misses.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Registry   │────▶│   Sources   │────▶│  Fallback   │────▶│   Tables    │
//! │ (data paths)│     │ (parallel)  │     │ (misses)    │     │ (parallel)  │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use blueprints::{BlueprintReaderManager, BlueprintRegistry, KeyedTable, ResourceSource};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut registry = BlueprintRegistry::new();
//!     let items = registry.register(KeyedTable::<ItemRecord>::new("Items")).unwrap();
//!
//!     let manager = BlueprintReaderManager::builder()
//!         .registry(registry)
//!         .source(ResourceSource::new().with_root("assets"))
//!         .build();
//!     let report = manager.load_blueprints().await.unwrap();
//!     println!("{} items, complete: {}", items.len(), report.is_complete());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`config`] - Source configuration and path templates
//! - [`validation`] - Configuration JSON schema validation
//! - [`record`] - Schema descriptors, record reader, value conversion
//! - [`table`] - Blueprint tables and the table registry
//! - [`source`] - Resource, remote and cloud bundle loaders
//! - [`manager`] - Load cycle orchestration
//! - [`signal`] - Progress and completion signals
//! - [`api`] - HTTP API server and log broadcaster

// Core modules
pub mod error;
pub mod config;

// Validation
pub mod validation;

// Records and tables
pub mod record;
pub mod table;

// Loading
pub mod source;
pub mod manager;
pub mod signal;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    error_chain,
    ConfigError,
    ConvertError,
    ManagerError,
    RecordError,
    RegistryError,
    RegistryResult,
    SchemaError,
    ServerError,
    SourceError,
    TableError,
};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::{BlueprintConfig, SourceKind};
pub use validation::{is_valid_config, validate_config};

// =============================================================================
// Re-exports - Records and tables
// =============================================================================

pub use record::{BlueprintValue, KeyedRecord, Record, RecordMap, RecordSchema, SubCollection};
pub use table::{BlueprintRegistry, BlueprintTable, KeyedTable, ListTable, Table};

// =============================================================================
// Re-exports - Sources
// =============================================================================

pub use source::{
    decode_text,
    write_bundle,
    BlueprintSource,
    BundleMetadata,
    CloudBundleSource,
    LoadResult,
    RemoteBundleSource,
    ResourceSource,
};

// =============================================================================
// Re-exports - Manager and signals
// =============================================================================

pub use manager::{BlueprintReaderManager, LoadPhase, LoadReport, TableFailure};
pub use signal::{BlueprintSignal, SignalBus};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::logs::{log_error, log_info, log_success, log_warning, LogEntry, LogLevel, LOG_BROADCASTER};
pub use api::server::{router, start_server};
