//! Shared fixtures: record types and a local blueprint host.
#![allow(dead_code)]

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use once_cell::sync::Lazy;
use serde_json::json;
use std::collections::HashMap;
use std::path::Path as FsPath;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use blueprints::record::{KeyedRecord, Record, RecordSchema};
use blueprints::{write_bundle, BlueprintConfig, SourceKind};

// =============================================================================
// Records
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Item {
    pub id: u32,
    pub name: String,
    pub price: u32,
}

impl Record for Item {
    fn schema() -> &'static RecordSchema<Self> {
        static SCHEMA: Lazy<RecordSchema<Item>> = Lazy::new(|| {
            RecordSchema::<Item>::builder()
                .field("id", |r| &r.id, |r| &mut r.id)
                .field("name", |r| &r.name, |r| &mut r.name)
                .field("price", |r| &r.price, |r| &mut r.price)
                .build()
                .expect("valid Item schema")
        });
        &SCHEMA
    }
}

impl KeyedRecord for Item {
    type Key = u32;

    fn key(&self) -> u32 {
        self.id
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LootDrop {
    pub item: u32,
    pub chance: f32,
}

impl Record for LootDrop {
    fn schema() -> &'static RecordSchema<Self> {
        static SCHEMA: Lazy<RecordSchema<LootDrop>> = Lazy::new(|| {
            RecordSchema::<LootDrop>::builder()
                .field("dropItem", |r| &r.item, |r| &mut r.item)
                .field("chance", |r| &r.chance, |r| &mut r.chance)
                .build()
                .expect("valid LootDrop schema")
        });
        &SCHEMA
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enemy {
    pub id: u32,
    pub name: String,
    pub health: i32,
    pub drops: Vec<LootDrop>,
}

impl Record for Enemy {
    fn schema() -> &'static RecordSchema<Self> {
        static SCHEMA: Lazy<RecordSchema<Enemy>> = Lazy::new(|| {
            RecordSchema::<Enemy>::builder()
                .field("id", |r| &r.id, |r| &mut r.id)
                .field("name", |r| &r.name, |r| &mut r.name)
                .field("health", |r| &r.health, |r| &mut r.health)
                .collection("drops", |r| &r.drops, |r| &mut r.drops)
                .build()
                .expect("valid Enemy schema")
        });
        &SCHEMA
    }
}

impl KeyedRecord for Enemy {
    type Key = u32;

    fn key(&self) -> u32 {
        self.id
    }
}

pub const ITEMS_CSV: &str = "id,name,price\n1,Sword,100\n2,Shield,50\n";
pub const ENEMIES_CSV: &str = "id,name,health,dropItem,chance\n1,Slime,10,1,0.5\n,,,2,0.25\n2,Bat,4,,\n";

// =============================================================================
// Blueprint host
// =============================================================================

/// Request counters and served content of a [`BlueprintHost`].
#[derive(Default)]
pub struct HostState {
    pub base: String,
    pub metadata_requests: AtomicUsize,
    pub bundle_downloads: AtomicUsize,
    pub remote_requests: AtomicUsize,
    /// Archive bytes and the hash advertised for them.
    pub bundle: RwLock<(Vec<u8>, String)>,
    /// Remote files keyed by `<path>.<fileType>`.
    pub remote_files: RwLock<HashMap<String, String>>,
}

/// Local HTTP server acting as metadata endpoint, bundle host and remote
/// bundle host.
pub struct BlueprintHost {
    pub state: Arc<HostState>,
}

impl BlueprintHost {
    pub async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let state = Arc::new(HostState {
            base,
            ..HostState::default()
        });

        let app = Router::new()
            .route("/meta", get(metadata))
            .route("/bundle.zip", get(bundle))
            .route("/remote/{version}/{file}", get(remote_file))
            .with_state(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { state }
    }

    pub fn base(&self) -> &str {
        &self.state.base
    }

    /// Serve `files` (data path, CSV) as the current cloud bundle.
    pub fn publish_bundle(&self, files: &[(&str, &str)]) -> String {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        for (path, csv) in files {
            std::fs::write(src.join(format!("{}.csv", path)), csv).unwrap();
        }
        let out = dir.path().join("bundle.zip");
        let meta = write_bundle(&src, &out, "csv", &format!("{}/bundle.zip", self.base())).unwrap();
        let bytes = std::fs::read(&out).unwrap();

        *self.state.bundle.write().unwrap() = (bytes, meta.hash.clone());
        meta.hash
    }

    /// Advertise `hash` for the current bundle without changing its bytes.
    pub fn advertise_hash(&self, hash: &str) {
        self.state.bundle.write().unwrap().1 = hash.to_string();
    }

    pub fn serve_remote(&self, path: &str, csv: &str) {
        self.state
            .remote_files
            .write()
            .unwrap()
            .insert(format!("{}.csv", path), csv.to_string());
    }

    pub fn downloads(&self) -> usize {
        self.state.bundle_downloads.load(Ordering::SeqCst)
    }

    pub fn remote_requests(&self) -> usize {
        self.state.remote_requests.load(Ordering::SeqCst)
    }

    /// Configuration pointing every backend at this host.
    pub fn config(&self, cache_dir: &FsPath, default_source: SourceKind) -> BlueprintConfig {
        BlueprintConfig {
            version: "1.2.0".into(),
            default_source,
            fallback_source: SourceKind::Resource,
            remote_path_template: format!("{}/remote/{{version}}/{{path}}.{{fileType}}", self.base()),
            cloud_metadata_url: format!("{}/meta", self.base()),
            cloud_cache_path: cache_dir.join("{version}").join("blueprints.zip").display().to_string(),
            request_timeout_secs: Some(5),
            ..BlueprintConfig::default()
        }
    }
}

async fn metadata(State(state): State<Arc<HostState>>) -> Response {
    state.metadata_requests.fetch_add(1, Ordering::SeqCst);
    let hash = state.bundle.read().unwrap().1.clone();
    if hash.is_empty() {
        return StatusCode::NOT_FOUND.into_response();
    }
    Json(json!({ "url": format!("{}/bundle.zip", state.base), "hash": hash })).into_response()
}

async fn bundle(State(state): State<Arc<HostState>>) -> Response {
    state.bundle_downloads.fetch_add(1, Ordering::SeqCst);
    let bytes = state.bundle.read().unwrap().0.clone();
    bytes.into_response()
}

async fn remote_file(
    State(state): State<Arc<HostState>>,
    Path((_version, file)): Path<(String, String)>,
) -> Response {
    state.remote_requests.fetch_add(1, Ordering::SeqCst);
    match state.remote_files.read().unwrap().get(&file) {
        Some(csv) => csv.clone().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
