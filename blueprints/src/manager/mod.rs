//! Blueprint reader manager: one load cycle over every registered table.
//!
//! # Cycle
//!
//! ```text
//! Idle ─▶ GatheringDependencies ─▶ LoadingSources ─▶ LoadingFallback ─▶ ParsingTables ─▶ Done
//!                                                     (only on misses)
//! ```
//!
//! 1. Group the data paths of all tables by source (the default source for
//!    tables without affinity).
//! 2. Run every source group concurrently and merge the results.
//! 3. Retry the misses once against the fallback source. Paths still
//!    missing are logged as warnings and their tables are skipped.
//! 4. Parse every resolved table concurrently. A failing table is logged
//!    and never affects its siblings; `ReadProgress` fires after each one.
//! 5. Fire `LoadSucceeded` with the [`LoadReport`], exactly once.
//!
//! Only one cycle runs at a time: an overlapping call is rejected.

use futures::future::join_all;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;
use uuid::Uuid;

use crate::api::logs::{log_error, log_info, log_info_indent, log_success, log_warning};
use crate::config::{BlueprintConfig, SourceKind};
use crate::error::{error_chain, ManagerError, ManagerResult};
use crate::signal::{BlueprintSignal, SignalBus};
use crate::source::{BlueprintSource, LoadResult};
use crate::table::{BlueprintRegistry, BlueprintTable};

/// Current step of the load cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LoadPhase {
    Idle,
    GatheringDependencies,
    LoadingSources,
    LoadingFallback,
    ParsingTables,
    Done,
}

/// A table whose CSV could not be parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableFailure {
    pub name: String,
    pub record_type: String,
    pub error: String,
}

/// Outcome of one load cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadReport {
    pub cycle_id: Uuid,
    /// Blueprint version the cycle ran against.
    pub version: String,
    pub loaded_tables: Vec<String>,
    pub failed_tables: Vec<TableFailure>,
    /// Tables whose data path no source could serve.
    pub skipped_tables: Vec<String>,
    pub unresolved_paths: Vec<String>,
    /// Number of raw files obtained from all sources.
    pub blob_count: usize,
    pub source_secs: f64,
    pub parse_secs: f64,
    pub total_secs: f64,
}

impl LoadReport {
    /// Every registered table loaded.
    pub fn is_complete(&self) -> bool {
        self.failed_tables.is_empty() && self.skipped_tables.is_empty()
    }
}

/// Builder for [`BlueprintReaderManager`].
#[derive(Default)]
pub struct ManagerBuilder {
    config: Option<BlueprintConfig>,
    registry: Option<Arc<BlueprintRegistry>>,
    sources: HashMap<SourceKind, Arc<dyn BlueprintSource>>,
    signals: Option<SignalBus>,
}

impl ManagerBuilder {
    pub fn config(mut self, config: BlueprintConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn registry(mut self, registry: BlueprintRegistry) -> Self {
        self.registry = Some(Arc::new(registry));
        self
    }

    /// Register a source under its own kind, replacing any previous one.
    pub fn source<S: BlueprintSource + 'static>(self, source: S) -> Self {
        self.shared_source(Arc::new(source))
    }

    pub fn shared_source(mut self, source: Arc<dyn BlueprintSource>) -> Self {
        self.sources.insert(source.kind(), source);
        self
    }

    pub fn signals(mut self, signals: SignalBus) -> Self {
        self.signals = Some(signals);
        self
    }

    pub fn build(self) -> BlueprintReaderManager {
        BlueprintReaderManager {
            config: RwLock::new(Arc::new(self.config.unwrap_or_default())),
            registry: self.registry.unwrap_or_default(),
            sources: self.sources,
            signals: self.signals.unwrap_or_default(),
            phase: Mutex::new(LoadPhase::Idle),
            cycle: tokio::sync::Mutex::new(()),
        }
    }
}

/// Drives load cycles over a registry of tables.
pub struct BlueprintReaderManager {
    config: RwLock<Arc<BlueprintConfig>>,
    registry: Arc<BlueprintRegistry>,
    sources: HashMap<SourceKind, Arc<dyn BlueprintSource>>,
    signals: SignalBus,
    phase: Mutex<LoadPhase>,
    cycle: tokio::sync::Mutex<()>,
}

impl BlueprintReaderManager {
    pub fn builder() -> ManagerBuilder {
        ManagerBuilder::default()
    }

    /// Configuration the next cycle will run with.
    pub fn config(&self) -> Arc<BlueprintConfig> {
        self.config.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Replace the configuration between cycles.
    pub fn set_config(&self, config: BlueprintConfig) -> ManagerResult<()> {
        let _idle = self.cycle.try_lock().map_err(|_| ManagerError::LoadInProgress)?;
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(config);
        Ok(())
    }

    pub fn registry(&self) -> &BlueprintRegistry {
        &self.registry
    }

    pub fn signals(&self) -> &SignalBus {
        &self.signals
    }

    pub fn phase(&self) -> LoadPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_loading(&self) -> bool {
        self.cycle.try_lock().is_err()
    }

    fn set_phase(&self, phase: LoadPhase) {
        tracing::debug!(?phase, "load phase");
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
    }

    /// Run one full load cycle.
    ///
    /// Missing files and broken tables never fail the cycle; they are listed
    /// in the returned report. The only error is an overlapping call.
    pub async fn load_blueprints(&self) -> ManagerResult<LoadReport> {
        let _cycle = self.cycle.try_lock().map_err(|_| ManagerError::LoadInProgress)?;
        let config = self.config();
        let cycle_id = Uuid::new_v4();
        let started = Instant::now();
        self.set_phase(LoadPhase::Idle);

        log_info(format!(
            "Blueprint load cycle {} started ({} tables, version {})",
            cycle_id,
            self.registry.len(),
            config.version
        ));

        self.set_phase(LoadPhase::GatheringDependencies);
        let groups = self.gather_dependencies(&config);

        self.set_phase(LoadPhase::LoadingSources);
        let source_started = Instant::now();
        let mut blobs = self.load_sources(&config, &groups).await;

        if !blobs.failed.is_empty() {
            self.set_phase(LoadPhase::LoadingFallback);
            log_info(format!(
                "Retrying {} blueprint files on fallback source {}",
                blobs.failed.len(),
                config.fallback_source
            ));
            let retry = blobs.failed.clone();
            let fallback = self.load_group(&config, config.fallback_source, &retry).await;
            blobs.merge(fallback);
        }

        for path in &blobs.failed {
            log_warning(format!("Blueprint file '{}' not found in any source", path));
        }
        let source_secs = source_started.elapsed().as_secs_f64();
        log_info(format!(
            "Loaded {} blueprint files in {:.2}s",
            blobs.loaded.len(),
            source_secs
        ));
        if blobs.loaded.is_empty() && !self.registry.is_empty() {
            log_error("No blueprint file could be loaded from any source");
        }

        self.set_phase(LoadPhase::ParsingTables);
        let parse_started = Instant::now();
        let parsed = self.parse_tables(&blobs).await;
        let parse_secs = parse_started.elapsed().as_secs_f64();

        let mut report = LoadReport {
            cycle_id,
            version: config.version.clone(),
            loaded_tables: Vec::new(),
            failed_tables: Vec::new(),
            skipped_tables: parsed.skipped,
            unresolved_paths: blobs.failed.iter().cloned().collect(),
            blob_count: blobs.loaded.len(),
            source_secs,
            parse_secs,
            total_secs: 0.0,
        };
        for outcome in parsed.outcomes {
            match outcome.result {
                Ok(_) => report.loaded_tables.push(outcome.name),
                Err(error) => report.failed_tables.push(TableFailure {
                    name: outcome.name,
                    record_type: outcome.record_type.to_string(),
                    error,
                }),
            }
        }
        report.loaded_tables.sort();
        report.failed_tables.sort_by(|a, b| a.name.cmp(&b.name));
        report.total_secs = started.elapsed().as_secs_f64();

        self.set_phase(LoadPhase::Done);
        log_success(format!(
            "Blueprint load cycle finished in {:.2}s (sources {:.2}s, parsing {:.2}s): {} loaded, {} failed, {} skipped",
            report.total_secs,
            report.source_secs,
            report.parse_secs,
            report.loaded_tables.len(),
            report.failed_tables.len(),
            report.skipped_tables.len()
        ));
        self.signals.fire(BlueprintSignal::LoadSucceeded { report: report.clone() });

        Ok(report)
    }

    /// Distinct data paths per resolved source.
    fn gather_dependencies(&self, config: &BlueprintConfig) -> BTreeMap<SourceKind, BTreeSet<String>> {
        let mut groups: BTreeMap<SourceKind, BTreeSet<String>> = BTreeMap::new();
        for table in self.registry.tables() {
            let kind = table.source().unwrap_or(config.default_source);
            groups.entry(kind).or_default().insert(table.data_path().to_string());
        }

        // A path claimed by several sources is requested from each of them
        for (kind, paths) in &groups {
            log_info_indent(format!("{}: {} files", kind, paths.len()), 1);
        }
        groups
    }

    async fn load_sources(
        &self,
        config: &BlueprintConfig,
        groups: &BTreeMap<SourceKind, BTreeSet<String>>,
    ) -> LoadResult {
        let loads = groups
            .iter()
            .map(|(kind, paths)| self.load_group(config, *kind, paths));

        let mut combined = LoadResult::new();
        for result in join_all(loads).await {
            combined.merge(result);
        }
        combined
    }

    async fn load_group(&self, config: &BlueprintConfig, kind: SourceKind, paths: &BTreeSet<String>) -> LoadResult {
        match self.sources.get(&kind) {
            Some(source) => source.load_all(config, paths).await,
            None => {
                log_warning(format!("No {} source registered, {} files unavailable", kind, paths.len()));
                LoadResult::all_failed(paths)
            }
        }
    }

    async fn parse_tables(&self, blobs: &LoadResult) -> ParsedTables {
        let mut skipped = Vec::new();
        let mut attempted = Vec::new();
        for table in self.registry.tables() {
            match blobs.loaded.get(table.data_path()) {
                Some(raw) => attempted.push((table.clone(), raw.as_str())),
                None => skipped.push(table.name().to_string()),
            }
        }
        skipped.sort();

        let max = attempted.len();
        let progress = Mutex::new(0usize);
        let parses = attempted.into_iter().map(|(table, raw)| {
            let progress = &progress;
            async move {
                let result = parse_isolated(table.as_ref(), raw).await;
                match &result {
                    Ok(count) => log_info_indent(format!("{}: {} records", table.name(), count), 1),
                    Err(error) => log_error(format!(
                        "Failed to load blueprint table {} ({}): {}",
                        table.name(),
                        table.record_type(),
                        error
                    )),
                }

                {
                    let mut current = progress.lock().unwrap_or_else(PoisonError::into_inner);
                    *current += 1;
                    self.signals.fire(BlueprintSignal::ReadProgress { current: *current, max });
                }

                TableOutcome {
                    name: table.name().to_string(),
                    record_type: table.record_type(),
                    result,
                }
            }
        });

        ParsedTables {
            outcomes: join_all(parses).await,
            skipped,
        }
    }
}

struct TableOutcome {
    name: String,
    record_type: &'static str,
    result: Result<usize, String>,
}

struct ParsedTables {
    outcomes: Vec<TableOutcome>,
    skipped: Vec<String>,
}

/// Load one table, turning errors and panics into a message.
async fn parse_isolated(table: &dyn BlueprintTable, raw: &str) -> Result<usize, String> {
    match AssertUnwindSafe(table.load_from_csv(raw)).catch_unwind().await {
        Ok(Ok(count)) => Ok(count),
        Ok(Err(e)) => Err(error_chain(&e)),
        Err(panic) => Err(format!("panicked: {}", panic_message(panic.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::testing::{EnemyRecord, ItemRecord, LevelRecord};
    use crate::table::KeyedTable;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// In-memory source that records every request.
    struct MapSource {
        kind: SourceKind,
        files: HashMap<String, String>,
        requests: Arc<Mutex<Vec<BTreeSet<String>>>>,
        delay: Option<Duration>,
    }

    impl MapSource {
        fn new(kind: SourceKind, files: &[(&str, &str)]) -> Self {
            Self {
                kind,
                files: files.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
                requests: Arc::new(Mutex::new(Vec::new())),
                delay: None,
            }
        }
    }

    #[async_trait]
    impl BlueprintSource for MapSource {
        fn kind(&self) -> SourceKind {
            self.kind
        }

        async fn load_all(&self, _config: &BlueprintConfig, paths: &BTreeSet<String>) -> LoadResult {
            self.requests.lock().unwrap().push(paths.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let mut result = LoadResult::new();
            for path in paths {
                match self.files.get(path) {
                    Some(text) => result.insert_loaded(path.clone(), text.clone()),
                    None => result.insert_failed(path.clone()),
                }
            }
            result
        }
    }

    struct PanickingTable;

    #[async_trait]
    impl BlueprintTable for PanickingTable {
        fn name(&self) -> &str {
            "Broken"
        }
        fn data_path(&self) -> &str {
            "Items"
        }
        fn source(&self) -> Option<SourceKind> {
            None
        }
        fn record_type(&self) -> &'static str {
            "Nothing"
        }
        fn headers(&self) -> &[String] {
            &[]
        }
        fn len(&self) -> usize {
            0
        }
        async fn load_from_csv(&self, _raw: &str) -> crate::error::TableResult<usize> {
            panic!("table exploded")
        }
        fn to_rows(&self, _include_header: bool) -> Vec<Vec<String>> {
            Vec::new()
        }
    }

    const ITEMS: &str = "id,name,price\n1,Sword,100\n2,Shield,50\n";
    const ENEMIES: &str = "id,name,health,lootItem,chance\n1,Slime,10,1,0.5\n";

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<BlueprintSignal>) -> Vec<BlueprintSignal> {
        let mut signals = Vec::new();
        while let Ok(signal) = rx.try_recv() {
            signals.push(signal);
        }
        signals
    }

    #[tokio::test]
    async fn test_groups_by_source_and_falls_back_once() {
        let mut registry = BlueprintRegistry::new();
        let items = registry.register(KeyedTable::<ItemRecord>::new("Items")).unwrap();
        let enemies = registry
            .register(KeyedTable::<EnemyRecord>::new("Enemies").with_source(SourceKind::Addressable))
            .unwrap();
        registry
            .register(KeyedTable::<LevelRecord>::new("Levels").with_source(SourceKind::Addressable))
            .unwrap();

        let resource = MapSource::new(SourceKind::Resource, &[("Items", ITEMS), ("Enemies", ENEMIES)]);
        let remote = MapSource::new(SourceKind::Addressable, &[]);
        let resource_requests = resource.requests.clone();
        let remote_requests = remote.requests.clone();

        let manager = BlueprintReaderManager::builder()
            .registry(registry)
            .source(resource)
            .source(remote)
            .build();
        let report = manager.load_blueprints().await.unwrap();

        let remote_calls = remote_requests.lock().unwrap().clone();
        assert_eq!(remote_calls.len(), 1);
        assert_eq!(remote_calls[0].len(), 2);

        let resource_calls = resource_requests.lock().unwrap().clone();
        assert_eq!(resource_calls.len(), 2, "default group plus one fallback call");
        assert_eq!(resource_calls[1], remote_calls[0]);

        assert_eq!(report.loaded_tables, vec!["Enemies", "Items"]);
        assert_eq!(report.skipped_tables, vec!["Levels"]);
        assert_eq!(report.unresolved_paths, vec!["Levels"]);
        assert_eq!(report.blob_count, 2);
        assert!(!report.is_complete());
        assert_eq!(items.len(), 2);
        assert_eq!(enemies.get(&1).unwrap().loot.len(), 1);
        assert_eq!(manager.phase(), LoadPhase::Done);
    }

    #[tokio::test]
    async fn test_no_fallback_call_when_everything_resolves() {
        let mut registry = BlueprintRegistry::new();
        registry.register(KeyedTable::<ItemRecord>::new("Items")).unwrap();
        let resource = MapSource::new(SourceKind::Resource, &[("Items", ITEMS)]);
        let requests = resource.requests.clone();

        let manager = BlueprintReaderManager::builder()
            .registry(registry)
            .source(resource)
            .build();
        let report = manager.load_blueprints().await.unwrap();

        assert!(report.is_complete());
        assert_eq!(requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_broken_table_is_isolated_and_completion_fires_once() {
        let mut registry = BlueprintRegistry::new();
        let items = registry.register(KeyedTable::<ItemRecord>::new("Items")).unwrap();
        registry
            .register(KeyedTable::<EnemyRecord>::new("Enemies"))
            .unwrap();
        registry.register(PanickingTable).unwrap();

        let bad_enemies = "id,name,health,lootItem,chance\n1,Slime,lots,,\n";
        let signals = SignalBus::default();
        let mut rx = signals.subscribe();
        let manager = BlueprintReaderManager::builder()
            .registry(registry)
            .source(MapSource::new(SourceKind::Resource, &[("Items", ITEMS), ("Enemies", bad_enemies)]))
            .signals(signals)
            .build();
        let report = manager.load_blueprints().await.unwrap();

        assert_eq!(report.loaded_tables, vec!["Items"]);
        assert_eq!(report.failed_tables.len(), 2);
        assert_eq!(report.failed_tables[0].name, "Broken");
        assert!(report.failed_tables[0].error.contains("table exploded"));
        assert_eq!(report.failed_tables[1].name, "Enemies");
        assert!(report.failed_tables[1].error.contains("health"));
        assert_eq!(items.len(), 2);

        let fired = drain(&mut rx);
        let progress: Vec<_> = fired
            .iter()
            .filter_map(|s| match s {
                BlueprintSignal::ReadProgress { current, max } => Some((*current, *max)),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);

        let completions = fired
            .iter()
            .filter(|s| matches!(s, BlueprintSignal::LoadSucceeded { .. }))
            .count();
        assert_eq!(completions, 1);
        assert!(matches!(fired.last(), Some(BlueprintSignal::LoadSucceeded { .. })));
    }

    #[tokio::test]
    async fn test_missing_source_fails_its_group() {
        let mut registry = BlueprintRegistry::new();
        registry
            .register(KeyedTable::<ItemRecord>::new("Items").with_source(SourceKind::Cloud))
            .unwrap();
        let manager = BlueprintReaderManager::builder().registry(registry).build();

        let report = manager.load_blueprints().await.unwrap();
        assert_eq!(report.skipped_tables, vec!["Items"]);
        assert_eq!(report.blob_count, 0);
    }

    #[tokio::test]
    async fn test_overlapping_cycle_is_rejected() {
        let mut registry = BlueprintRegistry::new();
        registry.register(KeyedTable::<ItemRecord>::new("Items")).unwrap();
        let mut slow = MapSource::new(SourceKind::Resource, &[("Items", ITEMS)]);
        slow.delay = Some(Duration::from_millis(200));

        let manager = BlueprintReaderManager::builder()
            .registry(registry)
            .source(slow)
            .build();

        let observed = AtomicUsize::new(0);
        let second = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            if manager.is_loading() {
                observed.fetch_add(1, Ordering::SeqCst);
            }
            let config_change = manager.set_config(BlueprintConfig::default());
            (manager.load_blueprints().await, config_change)
        };
        let (first, (second, config_change)) = tokio::join!(manager.load_blueprints(), second);

        assert!(first.is_ok());
        assert!(matches!(second, Err(ManagerError::LoadInProgress)));
        assert!(matches!(config_change, Err(ManagerError::LoadInProgress)));
        assert_eq!(observed.load(Ordering::SeqCst), 1);

        // Sequential cycles are fine
        assert!(manager.load_blueprints().await.is_ok());
    }
}
