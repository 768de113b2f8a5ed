//! Blueprint files fetched one by one from a remote bundle host.

use async_trait::async_trait;
use futures::future::join_all;
use std::collections::BTreeSet;
use std::time::Duration;

use super::{decode_text, BlueprintSource, LoadResult};
use crate::api::logs::log_info_indent;
use crate::config::{BlueprintConfig, SourceKind};
use crate::error::{error_chain, SourceError, SourceResult};

/// Issues one independent GET per data path; all requests run concurrently
/// and one failure never cancels its siblings.
#[derive(Debug, Clone, Default)]
pub struct RemoteBundleSource {
    client: reqwest::Client,
}

impl RemoteBundleSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn fetch(&self, config: &BlueprintConfig, path: &str) -> SourceResult<String> {
        let url = config.remote_url(path)?;
        let mut request = self.client.get(&url);
        if let Some(secs) = config.request_timeout_secs {
            request = request.timeout(Duration::from_secs(secs));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url,
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await?;
        Ok(decode_text(&bytes))
    }
}

#[async_trait]
impl BlueprintSource for RemoteBundleSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Addressable
    }

    async fn load_all(&self, config: &BlueprintConfig, paths: &BTreeSet<String>) -> LoadResult {
        let fetches = paths.iter().map(|path| async move { (path, self.fetch(config, path).await) });

        let mut result = LoadResult::new();
        for (path, outcome) in join_all(fetches).await {
            match outcome {
                Ok(text) => result.insert_loaded(path.clone(), text),
                Err(e) => {
                    log_info_indent(format!("Remote blueprint '{}' unavailable: {}", path, error_chain(&e)), 1);
                    result.insert_failed(path.clone());
                }
            }
        }
        result
    }
}
