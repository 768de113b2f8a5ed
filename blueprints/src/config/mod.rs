//! Blueprint source configuration.
//!
//! Describes where blueprint files come from: the default and fallback
//! backends, the blueprint version, and the path templates of every
//! backend. A configuration is immutable for the duration of a load cycle.
//!
//! # JSON format
//!
//! ```json
//! {
//!   "version": "1.4.0",
//!   "fileType": "csv",
//!   "defaultSource": "cloud",
//!   "fallbackSource": "resource",
//!   "resourcePath": "BlueprintData",
//!   "remotePathTemplate": "https://cdn.example.com/blueprints/{version}/{path}.{fileType}",
//!   "cloudMetadataUrl": "https://api.example.com/blueprints/{version}/bundle",
//!   "cloudCachePath": ".blueprints/{version}/blueprints.zip"
//! }
//! ```
//!
//! Templates accept the `{version}`, `{path}` and `{fileType}` placeholders.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{ConfigError, ConfigResult};
use crate::validation::validate_config;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{(\w+)\}").expect("Invalid placeholder pattern"));

/// Storage backend class a blueprint file is loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Files bundled with the application.
    Resource,
    /// Files fetched one by one from a remote bundle host.
    Addressable,
    /// A versioned zip archive downloaded once and cached locally.
    Cloud,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resource => "resource",
            Self::Addressable => "addressable",
            Self::Cloud => "cloud",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "resource" | "resources" | "local" => Ok(Self::Resource),
            "addressable" | "addressables" | "remote" => Ok(Self::Addressable),
            "cloud" | "zip" => Ok(Self::Cloud),
            other => Err(ConfigError::UnknownSource(other.to_string())),
        }
    }
}

/// Process-wide blueprint source configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlueprintConfig {
    /// Blueprint data version tag.
    pub version: String,
    /// Blueprint file extension, without leading dot.
    pub file_type: String,
    /// Backend used by tables that declare no source of their own.
    pub default_source: SourceKind,
    /// Backend retried for files that failed on their primary backend.
    pub fallback_source: SourceKind,
    /// Path prefix of bundled resources.
    pub resource_path: String,
    /// URL template of single remote blueprint files.
    pub remote_path_template: String,
    /// URL template of the cloud bundle metadata endpoint.
    pub cloud_metadata_url: String,
    /// Local path template of the cached cloud archive.
    pub cloud_cache_path: String,
    /// HTTP timeout for remote requests.
    pub request_timeout_secs: Option<u64>,
}

impl Default for BlueprintConfig {
    fn default() -> Self {
        Self {
            version: "1.0.0".to_string(),
            file_type: "csv".to_string(),
            default_source: SourceKind::Resource,
            fallback_source: SourceKind::Resource,
            resource_path: "BlueprintData".to_string(),
            remote_path_template: "blueprints/{version}/{path}.{fileType}".to_string(),
            cloud_metadata_url: String::new(),
            cloud_cache_path: ".blueprints/{version}/blueprints.zip".to_string(),
            request_timeout_secs: Some(30),
        }
    }
}

impl BlueprintConfig {
    /// Load and validate a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let value: Value = serde_json::from_str(content)?;
        validate_config(&value).map_err(ConfigError::Invalid)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Defaults overridden by `BLUEPRINT_*` environment variables
    /// (a `.env` file is loaded first when present).
    pub fn from_env() -> ConfigResult<Self> {
        let _ = dotenvy::dotenv();
        Self::default().apply_env_overrides()
    }

    /// Override fields from `BLUEPRINT_*` environment variables.
    pub fn apply_env_overrides(mut self) -> ConfigResult<Self> {
        if let Ok(v) = env::var("BLUEPRINT_VERSION") {
            self.version = v;
        }
        if let Ok(v) = env::var("BLUEPRINT_FILE_TYPE") {
            self.file_type = v;
        }
        if let Ok(v) = env::var("BLUEPRINT_DEFAULT_SOURCE") {
            self.default_source = v.parse()?;
        }
        if let Ok(v) = env::var("BLUEPRINT_FALLBACK_SOURCE") {
            self.fallback_source = v.parse()?;
        }
        if let Ok(v) = env::var("BLUEPRINT_RESOURCE_PATH") {
            self.resource_path = v;
        }
        if let Ok(v) = env::var("BLUEPRINT_REMOTE_TEMPLATE") {
            self.remote_path_template = v;
        }
        if let Ok(v) = env::var("BLUEPRINT_CLOUD_METADATA_URL") {
            self.cloud_metadata_url = v;
        }
        if let Ok(v) = env::var("BLUEPRINT_CLOUD_CACHE_PATH") {
            self.cloud_cache_path = v;
        }
        Ok(self)
    }

    /// File extension without leading dot (`.csv` and `csv` are equivalent).
    pub fn file_type(&self) -> &str {
        self.file_type.trim().trim_start_matches('.')
    }

    /// Relative resource path of a blueprint file: `<resourcePath>/<path>.<fileType>`.
    pub fn resource_file(&self, data_path: &str) -> String {
        let prefix = self.resource_path.trim_matches('/');
        if prefix.is_empty() {
            format!("{}.{}", data_path, self.file_type())
        } else {
            format!("{}/{}.{}", prefix, data_path, self.file_type())
        }
    }

    /// URL of a single remote blueprint file.
    pub fn remote_url(&self, data_path: &str) -> ConfigResult<String> {
        self.render(&self.remote_path_template, Some(data_path))
    }

    /// URL of the cloud bundle metadata endpoint.
    pub fn cloud_metadata_url(&self) -> ConfigResult<String> {
        self.render(&self.cloud_metadata_url, None)
    }

    /// Local path of the cached cloud archive.
    pub fn cloud_cache_path(&self) -> ConfigResult<PathBuf> {
        self.render(&self.cloud_cache_path, None).map(PathBuf::from)
    }

    /// Substitute `{version}`, `{fileType}` and (when given) `{path}`.
    pub fn render(&self, template: &str, data_path: Option<&str>) -> ConfigResult<String> {
        let mut unknown = None;
        let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures| {
            match (&caps[1], data_path) {
                ("version", _) => self.version.clone(),
                ("fileType", _) => self.file_type().to_string(),
                ("path", Some(path)) => path.to_string(),
                (other, _) => {
                    unknown.get_or_insert_with(|| other.to_string());
                    caps[0].to_string()
                }
            }
        });

        match unknown {
            Some(placeholder) => Err(ConfigError::UnknownPlaceholder {
                template: template.to_string(),
                placeholder,
            }),
            None => Ok(rendered.into_owned()),
        }
    }
}
