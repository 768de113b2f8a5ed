//! JSON Schema validation for blueprint configuration documents.
//!
//! The configuration schema is embedded at compile time from
//! `schemas/blueprint-config.json` and checked before deserialization, so
//! a typo in a field name or an unknown source backend is reported instead
//! of being silently defaulted.
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use blueprints::validation::validate_config;
//!
//! assert!(validate_config(&json!({ "version": "1.0.0" })).is_ok());
//! assert!(validate_config(&json!({ "version": "1.0.0", "defaultSource": "ftp" })).is_err());
//! ```

use once_cell::sync::Lazy;
use serde_json::Value;

static CONFIG_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/blueprint-config.json"))
        .expect("Invalid embedded schema")
});

/// Validate a JSON value against a JSON schema (draft 7).
///
/// # Returns
/// * `Ok(())` when valid
/// * `Err(Vec<String>)` with one message per violation otherwise
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema)
        .map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Quick true/false check.
pub fn is_valid(schema: &Value, data: &Value) -> bool {
    jsonschema::draft7::is_valid(schema, data)
}

/// Validate against the embedded blueprint configuration schema.
pub fn validate_config(data: &Value) -> Result<(), Vec<String>> {
    validate(&CONFIG_SCHEMA, data)
}

/// Quick check against the embedded blueprint configuration schema.
pub fn is_valid_config(data: &Value) -> bool {
    is_valid(&CONFIG_SCHEMA, data)
}
