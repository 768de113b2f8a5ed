//! Versioned zip bundle downloaded once and cached on disk.
//!
//! A load goes through two steps:
//!
//! 1. **Sync** - fetch the bundle metadata (`{ url, hash }`). The cached
//!    archive is reused iff the URL recorded next to it equals the fetched
//!    URL and its SHA-256 equals the fetched hash; otherwise the archive is
//!    downloaded again, verified, and moved into place.
//! 2. **Extract** - read the requested `<path>.<fileType>` entries on a
//!    blocking worker thread. Paths missing from the archive fail.
//!
//! Only one sync runs at a time per source.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use std::ffi::OsString;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use zip::ZipArchive;

use super::bundle::{file_sha256, BundleMetadata};
use super::{decode_text, BlueprintSource, LoadResult};
use crate::api::logs::{log_info, log_success, log_warning};
use crate::config::{BlueprintConfig, SourceKind};
use crate::error::{error_chain, SourceError, SourceResult};
use crate::signal::{BlueprintSignal, SignalBus};

/// Byte progress of a bundle download: `(downloaded, total)`.
pub type ProgressCallback = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// Metadata persisted next to the cached archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedBundle {
    url: String,
    hash: String,
    downloaded_at: DateTime<Utc>,
}

pub struct CloudBundleSource {
    client: reqwest::Client,
    signals: Option<SignalBus>,
    on_progress: Option<ProgressCallback>,
    sync_lock: Mutex<()>,
}

impl Default for CloudBundleSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CloudBundleSource {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            signals: None,
            on_progress: None,
            sync_lock: Mutex::new(()),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Fire `LoadProgress` signals on `signals` while downloading.
    pub fn with_signals(mut self, signals: SignalBus) -> Self {
        self.signals = Some(signals);
        self
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    /// Bring the cached archive up to date and return its path.
    pub async fn sync_bundle(&self, config: &BlueprintConfig) -> SourceResult<PathBuf> {
        let _guard = self.sync_lock.lock().await;
        let archive = config.cloud_cache_path()?;

        let refreshed = match self.fetch_metadata(config).await {
            Ok(remote) => {
                if is_up_to_date(&archive, &remote).await? {
                    return Ok(archive);
                }
                self.download(&remote, &archive, config.request_timeout_secs).await
            }
            Err(e) => Err(e),
        };

        match refreshed {
            Ok(()) => Ok(archive),
            Err(e) => keep_cached(archive, e).await,
        }
    }

    async fn fetch_metadata(&self, config: &BlueprintConfig) -> SourceResult<BundleMetadata> {
        let url = config.cloud_metadata_url()?;
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
        Ok(response.json().await?)
    }

    async fn download(&self, remote: &BundleMetadata, archive: &Path, timeout_secs: Option<u64>) -> SourceResult<()> {
        log_info(format!("Downloading blueprint bundle {}", remote.url));

        let mut request = self.client.get(&remote.url);
        if let Some(secs) = timeout_secs {
            // The whole body has to arrive in time, not just the headers
            request = request.timeout(Duration::from_secs(secs.saturating_mul(10)));
        }
        let mut response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: remote.url.clone(),
                status: status.as_u16(),
            });
        }

        if let Some(parent) = archive.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let part = sibling(archive, ".part");
        let total = response.content_length();
        let mut file = tokio::fs::File::create(&part).await?;
        let mut hasher = Sha256::new();
        let mut downloaded = 0u64;

        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            hasher.update(&chunk);
            downloaded += chunk.len() as u64;
            self.report_progress(downloaded, total);
        }
        file.flush().await?;
        drop(file);

        let actual = hex::encode(hasher.finalize());
        if !remote.hash_matches(&actual) {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(SourceError::HashMismatch {
                url: remote.url.clone(),
                expected: remote.hash.clone(),
                actual,
            });
        }

        tokio::fs::rename(&part, archive).await?;
        let cached = CachedBundle {
            url: remote.url.clone(),
            hash: actual,
            downloaded_at: Utc::now(),
        };
        tokio::fs::write(sibling(archive, ".meta.json"), serde_json::to_vec_pretty(&cached)?).await?;

        self.report_progress(downloaded, Some(downloaded));
        log_success(format!("Bundle cached at {} ({} bytes)", archive.display(), downloaded));
        Ok(())
    }

    fn report_progress(&self, downloaded: u64, total: Option<u64>) {
        if let Some(callback) = &self.on_progress {
            callback(downloaded, total);
        }
        if let (Some(signals), Some(total)) = (&self.signals, total) {
            if total > 0 {
                let percent = (downloaded as f64 / total as f64 * 100.0).min(100.0) as f32;
                signals.fire(BlueprintSignal::LoadProgress { percent });
            }
        }
    }
}

#[async_trait]
impl BlueprintSource for CloudBundleSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Cloud
    }

    async fn load_all(&self, config: &BlueprintConfig, paths: &BTreeSet<String>) -> LoadResult {
        if paths.is_empty() {
            return LoadResult::new();
        }

        let archive = match self.sync_bundle(config).await {
            Ok(archive) => archive,
            Err(e) => {
                log_warning(format!("Cloud bundle unavailable: {}", error_chain(&e)));
                return LoadResult::all_failed(paths);
            }
        };

        let suffix = format!(".{}", config.file_type());
        let wanted = paths.clone();
        let extracted = tokio::task::spawn_blocking(move || extract_entries(&archive, &suffix, &wanted))
            .await
            .map_err(|e| SourceError::Worker(e.to_string()))
            .and_then(|inner| inner);

        let mut result = LoadResult::all_failed(paths);
        match extracted {
            Ok(found) => {
                for (path, text) in found {
                    result.insert_loaded(path, text);
                }
            }
            Err(e) => log_warning(format!("Cloud bundle extraction failed: {}", error_chain(&e))),
        }
        result
    }
}

/// Fall back to the last verified archive when refreshing it failed.
async fn keep_cached(archive: PathBuf, error: SourceError) -> SourceResult<PathBuf> {
    if tokio::fs::metadata(&archive).await.is_err() {
        return Err(error);
    }
    log_warning(format!(
        "Bundle refresh failed ({}), using cached {}",
        error_chain(&error),
        archive.display()
    ));
    Ok(archive)
}

/// `<archive><suffix>`, e.g. `blueprints.zip.part`.
fn sibling(archive: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(archive.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

async fn read_cached(archive: &Path) -> Option<CachedBundle> {
    let raw = tokio::fs::read(sibling(archive, ".meta.json")).await.ok()?;
    serde_json::from_slice(&raw).ok()
}

async fn is_up_to_date(archive: &Path, remote: &BundleMetadata) -> SourceResult<bool> {
    let Some(cached) = read_cached(archive).await else {
        return Ok(false);
    };
    if cached.url != remote.url || !remote.hash_matches(&cached.hash) {
        return Ok(false);
    }
    if tokio::fs::metadata(archive).await.is_err() {
        return Ok(false);
    }

    let path = archive.to_path_buf();
    let actual = tokio::task::spawn_blocking(move || file_sha256(&path))
        .await
        .map_err(|e| SourceError::Worker(e.to_string()))??;
    let fresh = remote.hash_matches(&actual);
    if fresh {
        log_info(format!(
            "Cached bundle {} (downloaded {}) is up to date",
            archive.display(),
            cached.downloaded_at.format("%Y-%m-%d %H:%M:%S")
        ));
    }
    Ok(fresh)
}

/// Read the entries of `archive` that match a requested data path.
///
/// An entry matches when its name without `suffix` equals a requested path,
/// or when its last path segment does. The first matching entry wins.
fn extract_entries(archive: &Path, suffix: &str, paths: &BTreeSet<String>) -> SourceResult<HashMap<String, String>> {
    let mut zip = ZipArchive::new(File::open(archive)?)?;
    let mut found = HashMap::new();

    for index in 0..zip.len() {
        let mut entry = zip.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let Some(stem) = name.strip_suffix(suffix) else {
            continue;
        };
        let base = stem.rsplit('/').next().unwrap_or(stem);
        let data_path = if paths.contains(stem) {
            stem
        } else if paths.contains(base) {
            base
        } else {
            continue;
        };
        if found.contains_key(data_path) {
            continue;
        }

        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes)?;
        found.insert(data_path.to_string(), decode_text(&bytes));
    }

    Ok(found)
}
