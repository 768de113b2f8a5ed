//! Blueprint tables: named, typed record collections loaded from CSV.
//!
//! A table owns one data file (its data path) and optionally pins the
//! storage backend that file comes from. Two shapes exist:
//!
//! - [`KeyedTable`] - records ordered and looked up by key
//! - [`ListTable`] - records in file order
//!
//! Loading parses into a fresh collection and swaps it in only on success,
//! so a table whose file is malformed keeps its last good contents.

pub mod registry;

use async_trait::async_trait;
use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard};

use crate::config::SourceKind;
use crate::error::TableResult;
use crate::record::{for_each_row, rows_to_csv, short_type_name, KeyedRecord, Record, RecordMap, SubCollection};

pub use registry::BlueprintRegistry;

/// Object-safe view of a table, as driven by the reader manager.
#[async_trait]
pub trait BlueprintTable: Send + Sync {
    /// Unique table name.
    fn name(&self) -> &str;

    /// Data path of the backing file, without extension.
    fn data_path(&self) -> &str;

    /// Source affinity; `None` means the configured default source.
    fn source(&self) -> Option<SourceKind>;

    /// Short name of the record type, for diagnostics.
    fn record_type(&self) -> &'static str;

    /// Flattened column headers.
    fn headers(&self) -> &[String];

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace the contents with the records of `raw`; returns the record count.
    ///
    /// On error the previous contents are kept.
    async fn load_from_csv(&self, raw: &str) -> TableResult<usize>;

    /// Rows in the collection's iteration order.
    fn to_rows(&self, include_header: bool) -> Vec<Vec<String>>;

    fn to_csv(&self) -> TableResult<String> {
        rows_to_csv(&self.to_rows(true))
    }
}

/// A table backed by any [`SubCollection`].
pub struct Table<C> {
    name: String,
    data_path: String,
    source: Option<SourceKind>,
    records: RwLock<C>,
}

impl<C: SubCollection> fmt::Debug for Table<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name)
            .field("data_path", &self.data_path)
            .field("source", &self.source)
            .field("record_type", &short_type_name::<C::Item>())
            .field("len", &self.read().len())
            .finish()
    }
}

/// Records keyed and ordered by [`KeyedRecord::key`].
pub type KeyedTable<R> = Table<RecordMap<R>>;

/// Records in file order.
pub type ListTable<R> = Table<Vec<R>>;

impl<C: SubCollection> Table<C> {
    /// A table whose data path is its name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            data_path: name.clone(),
            name,
            source: None,
            records: RwLock::new(C::default()),
        }
    }

    pub fn with_data_path(mut self, data_path: impl Into<String>) -> Self {
        self.data_path = data_path.into();
        self
    }

    pub fn with_source(mut self, source: SourceKind) -> Self {
        self.source = Some(source);
        self
    }

    /// Shared read access to the records.
    pub fn read(&self) -> RwLockReadGuard<'_, C> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn clear(&self) {
        self.records.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn parse(raw: &str) -> TableResult<C> {
        let mut fresh = C::default();
        for_each_row(raw, |row| Ok(fresh.consume_row(row)?))?;
        Ok(fresh)
    }
}

impl<R: KeyedRecord + Clone> Table<RecordMap<R>> {
    pub fn get(&self, key: &R::Key) -> Option<R> {
        self.read().get(key).cloned()
    }

    pub fn contains_key(&self, key: &R::Key) -> bool {
        self.read().contains_key(key)
    }

    pub fn keys(&self) -> Vec<R::Key> {
        self.read().keys().cloned().collect()
    }
}

impl<R: Record + Clone> Table<Vec<R>> {
    pub fn get(&self, index: usize) -> Option<R> {
        self.read().get(index).cloned()
    }

    pub fn to_vec(&self) -> Vec<R> {
        self.read().to_vec()
    }
}

#[async_trait]
impl<C: SubCollection> BlueprintTable for Table<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn data_path(&self) -> &str {
        &self.data_path
    }

    fn source(&self) -> Option<SourceKind> {
        self.source
    }

    fn record_type(&self) -> &'static str {
        short_type_name::<C::Item>()
    }

    fn headers(&self) -> &[String] {
        C::Item::schema().headers()
    }

    fn len(&self) -> usize {
        self.read().len()
    }

    async fn load_from_csv(&self, raw: &str) -> TableResult<usize> {
        let fresh = Self::parse(raw)?;
        let count = fresh.len();
        *self.records.write().unwrap_or_else(PoisonError::into_inner) = fresh;
        Ok(count)
    }

    fn to_rows(&self, include_header: bool) -> Vec<Vec<String>> {
        let mut rows = Vec::new();
        if include_header {
            rows.push(self.headers().to_vec());
        }
        rows.extend(self.read().write_rows());
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{RecordError, TableError};
    use crate::record::testing::{EnemyRecord, ItemRecord, LevelRecord, LootRecord};

    const ITEMS: &str = "id,name,price\n2,Shield,50\n1,Sword,100\n";

    #[tokio::test]
    async fn test_keyed_table_loads_in_key_order() {
        let items: KeyedTable<ItemRecord> = Table::new("Items");
        assert_eq!(items.load_from_csv(ITEMS).await.unwrap(), 2);

        assert_eq!(items.keys(), vec![1, 2]);
        assert_eq!(items.get(&1).unwrap().name, "Sword");
        assert_eq!(items.record_type(), "ItemRecord");
        assert_eq!(items.data_path(), "Items");
        assert_eq!(items.source(), None);
    }

    #[tokio::test]
    async fn test_reload_replaces_contents() {
        let items: KeyedTable<ItemRecord> = Table::new("Items");
        items.load_from_csv(ITEMS).await.unwrap();
        items.load_from_csv("id,name,price\n7,Bow,30\n").await.unwrap();
        assert_eq!(items.keys(), vec![7]);
    }

    #[tokio::test]
    async fn test_header_only_csv_yields_empty_table() {
        let items: KeyedTable<ItemRecord> = Table::new("Items");
        assert_eq!(items.load_from_csv("id,name,price\n").await.unwrap(), 0);
        assert!(items.is_empty());

        items.load_from_csv(ITEMS).await.unwrap();
        assert_eq!(items.load_from_csv("id,name,price\n").await.unwrap(), 0);
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_missing_sub_collection_columns_leave_it_empty() {
        let enemies: KeyedTable<EnemyRecord> = Table::new("Enemies");
        assert_eq!(enemies.load_from_csv("id,name,health\n1,Slime,10\n").await.unwrap(), 1);

        let slime = enemies.get(&1).unwrap();
        assert_eq!(slime.health, 10);
        assert!(slime.loot.is_empty());
    }

    #[tokio::test]
    async fn test_failed_load_keeps_last_good_contents() {
        let items: KeyedTable<ItemRecord> = Table::new("Items");
        items.load_from_csv(ITEMS).await.unwrap();

        let err = items
            .load_from_csv("id,name,price\n3,Axe,lots\n")
            .await
            .unwrap_err();
        assert!(matches!(err, TableError::Record(RecordError::Convert { .. })));
        assert_eq!(items.len(), 2);
        assert!(items.contains_key(&2));
    }

    #[tokio::test]
    async fn test_list_table_keeps_file_order() {
        let loot: ListTable<LootRecord> = Table::new("Loot").with_data_path("tables/Loot");
        loot.load_from_csv("lootItem,chance\n9,0.5\n3,0.25\n").await.unwrap();
        assert_eq!(loot.get(0).unwrap().item, 9);
        assert_eq!(loot.to_vec().len(), 2);
        assert_eq!(loot.data_path(), "tables/Loot");
    }

    #[tokio::test]
    async fn test_to_csv_round_trips_sub_collections() {
        let raw = "id,name,health,lootItem,chance\n1,Slime,10,100,0.5\n,,,101,0.25\n";
        let enemies: KeyedTable<EnemyRecord> = Table::new("Enemies").with_source(SourceKind::Addressable);
        enemies.load_from_csv(raw).await.unwrap();
        assert_eq!(enemies.to_csv().unwrap(), raw);

        let again: KeyedTable<EnemyRecord> = Table::new("Enemies");
        again.load_from_csv(&enemies.to_csv().unwrap()).await.unwrap();
        assert_eq!(again.get(&1), enemies.get(&1));
    }

    #[tokio::test]
    async fn test_nested_record_headers_and_rows() {
        let raw = "levelId,title,difficulty,timeLimit,rewardItem,amount\n\
                   L1,Intro,1,60,10,1\n\
                   ,,,,11,2\n";
        let levels: KeyedTable<LevelRecord> = Table::new("Levels");
        levels.load_from_csv(raw).await.unwrap();

        let level = levels.get(&"L1".to_string()).unwrap();
        assert_eq!(level.stats.time_limit, 60.0);
        assert_eq!(level.rewards.len(), 2);
        assert_eq!(
            levels.headers(),
            ["levelId", "title", "difficulty", "timeLimit", "rewardItem", "amount"]
        );
        assert_eq!(levels.to_rows(false).len(), 2);
    }

    #[tokio::test]
    async fn test_clear_empties_table() {
        let items: KeyedTable<ItemRecord> = Table::new("Items");
        items.load_from_csv(ITEMS).await.unwrap();
        items.clear();
        assert!(items.is_empty());
        assert!(format!("{:?}", items).contains("len: 0"));
    }
}
