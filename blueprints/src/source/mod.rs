//! Storage backends that turn data paths into raw CSV text.
//!
//! Every backend implements [`BlueprintSource`]. A backend never fails as a
//! whole: paths it cannot serve are reported in [`LoadResult::failed`] so the
//! manager can retry them against the fallback backend.
//!
//! - [`resource`] - files bundled with the application
//! - [`remote`] - one HTTP request per file
//! - [`cloud`] - one versioned zip archive, cached locally
//! - [`bundle`] - packing a directory into a cloud archive

pub mod bundle;
pub mod cloud;
pub mod remote;
pub mod resource;

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};

use crate::config::{BlueprintConfig, SourceKind};

pub use bundle::{write_bundle, BundleMetadata};
pub use cloud::CloudBundleSource;
pub use remote::RemoteBundleSource;
pub use resource::ResourceSource;

/// Outcome of one `load_all` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadResult {
    /// Raw text per resolved data path.
    pub loaded: HashMap<String, String>,
    /// Data paths the backend could not serve.
    pub failed: BTreeSet<String>,
}

impl LoadResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every requested path failed.
    pub fn all_failed(paths: &BTreeSet<String>) -> Self {
        Self {
            loaded: HashMap::new(),
            failed: paths.clone(),
        }
    }

    pub fn insert_loaded(&mut self, path: impl Into<String>, text: String) {
        let path = path.into();
        self.failed.remove(&path);
        self.loaded.insert(path, text);
    }

    pub fn insert_failed(&mut self, path: impl Into<String>) {
        let path = path.into();
        if !self.loaded.contains_key(&path) {
            self.failed.insert(path);
        }
    }

    /// Fan-in of a partial result: loaded entries win over earlier failures.
    pub fn merge(&mut self, other: LoadResult) {
        for path in other.failed {
            self.insert_failed(path);
        }
        for (path, text) in other.loaded {
            self.insert_loaded(path, text);
        }
    }
}

/// A storage backend class.
///
/// Implementations must be safe to invoke concurrently for disjoint path
/// sets.
#[async_trait]
pub trait BlueprintSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Load every requested path; unresolved paths end up in `failed`.
    async fn load_all(&self, config: &BlueprintConfig, paths: &BTreeSet<String>) -> LoadResult;
}

/// Decode raw file bytes to text.
///
/// A UTF-8 BOM is stripped. Invalid UTF-8 falls back to charset detection.
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }

    let charset = chardet::detect(bytes).0.to_lowercase();
    let encoding = match charset.as_str() {
        // Not UTF-8 after all; latin text is the common case for spreadsheets
        "" | "ascii" | "utf-8" | "utf8" | "iso-8859-1" | "latin-1" | "latin1" => {
            encoding_rs::WINDOWS_1252
        }
        other => encoding_rs::Encoding::for_label(other.as_bytes())
            .unwrap_or(encoding_rs::WINDOWS_1252),
    };
    encoding.decode(bytes).0.into_owned()
}
