//! REST API types.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::SourceKind;
use crate::manager::{BlueprintReaderManager, LoadPhase, LoadReport};
use crate::table::BlueprintTable;

/// One registered table, as listed by `GET /api/tables`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSummary {
    pub name: String,
    pub data_path: String,
    /// `None` when the table follows the default source.
    pub source: Option<SourceKind>,
    pub record_type: String,
    pub record_count: usize,
    pub headers: Vec<String>,
}

impl TableSummary {
    pub fn from_table(table: &dyn BlueprintTable) -> Self {
        Self {
            name: table.name().to_string(),
            data_path: table.data_path().to_string(),
            source: table.source(),
            record_type: table.record_type().to_string(),
            record_count: table.len(),
            headers: table.headers().to_vec(),
        }
    }
}

/// Manager state, as returned by `GET /api/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub phase: LoadPhase,
    pub loading: bool,
    pub version: String,
    pub default_source: SourceKind,
    pub fallback_source: SourceKind,
    pub tables: Vec<TableSummary>,
}

impl StatusResponse {
    pub fn from_manager(manager: &BlueprintReaderManager) -> Self {
        let config = manager.config();
        Self {
            phase: manager.phase(),
            loading: manager.is_loading(),
            version: config.version.clone(),
            default_source: config.default_source,
            fallback_source: config.fallback_source,
            tables: manager
                .registry()
                .tables()
                .iter()
                .map(|t| TableSummary::from_table(t.as_ref()))
                .collect(),
        }
    }
}

/// Response of `POST /api/load`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadResponse {
    /// "complete" or "partial"
    pub status: String,
    pub report: LoadReport,
}

impl From<LoadReport> for LoadResponse {
    fn from(report: LoadReport) -> Self {
        Self {
            status: if report.is_complete() { "complete" } else { "partial" }.to_string(),
            report,
        }
    }
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "status": "error",
        "error": error,
    })
}
