//! Blueprint files shipped with the application.
//!
//! Entries are looked up first in the embedded namespace (static byte
//! slices, usually from `include_bytes!`), then under an optional on-disk
//! resource root. A miss is a failed path, never an error.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use super::{decode_text, BlueprintSource, LoadResult};
use crate::api::logs::log_info_indent;
use crate::config::{BlueprintConfig, SourceKind};

#[derive(Debug, Default, Clone)]
pub struct ResourceSource {
    /// Keyed by data path.
    embedded: HashMap<String, &'static [u8]>,
    root: Option<PathBuf>,
}

impl ResourceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an embedded blueprint file under its data path.
    pub fn with_embedded(mut self, data_path: impl Into<String>, bytes: &'static [u8]) -> Self {
        self.embedded.insert(data_path.into(), bytes);
        self
    }

    /// Directory holding `<resourcePath>/<path>.<fileType>` files.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    async fn read_one(&self, config: &BlueprintConfig, path: &str) -> Option<String> {
        if let Some(bytes) = self.embedded.get(path) {
            return Some(decode_text(bytes));
        }

        let file = self.root.as_ref()?.join(config.resource_file(path));
        match tokio::fs::read(&file).await {
            Ok(bytes) => Some(decode_text(&bytes)),
            Err(e) => {
                log_info_indent(format!("Resource {} not readable: {}", file.display(), e), 1);
                None
            }
        }
    }
}

#[async_trait]
impl BlueprintSource for ResourceSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Resource
    }

    async fn load_all(&self, config: &BlueprintConfig, paths: &BTreeSet<String>) -> LoadResult {
        let mut result = LoadResult::new();
        for path in paths {
            match self.read_one(config, path).await {
                Some(text) => result.insert_loaded(path.clone(), text),
                None => result.insert_failed(path.clone()),
            }
        }
        result
    }
}
