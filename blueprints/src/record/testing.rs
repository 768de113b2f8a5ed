//! Sample record types shared by unit tests.

use once_cell::sync::Lazy;

use super::collection::SubCollection;
use super::reader::for_each_row;
use super::schema::{KeyedRecord, Record, RecordSchema};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemRecord {
    pub id: u32,
    pub name: String,
    pub price: u32,
}

impl Record for ItemRecord {
    fn schema() -> &'static RecordSchema<Self> {
        static SCHEMA: Lazy<RecordSchema<ItemRecord>> = Lazy::new(|| {
            RecordSchema::<ItemRecord>::builder()
                .field("id", |r| &r.id, |r| &mut r.id)
                .field("name", |r| &r.name, |r| &mut r.name)
                .field("price", |r| &r.price, |r| &mut r.price)
                .build()
                .expect("valid ItemRecord schema")
        });
        &SCHEMA
    }
}

impl KeyedRecord for ItemRecord {
    type Key = u32;

    fn key(&self) -> u32 {
        self.id
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LootRecord {
    pub item: u32,
    pub chance: f32,
}

impl Record for LootRecord {
    fn schema() -> &'static RecordSchema<Self> {
        static SCHEMA: Lazy<RecordSchema<LootRecord>> = Lazy::new(|| {
            RecordSchema::<LootRecord>::builder()
                .field("lootItem", |r| &r.item, |r| &mut r.item)
                .field("chance", |r| &r.chance, |r| &mut r.chance)
                .build()
                .expect("valid LootRecord schema")
        });
        &SCHEMA
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnemyRecord {
    pub id: u32,
    pub name: String,
    pub health: i32,
    pub loot: Vec<LootRecord>,
}

impl Record for EnemyRecord {
    fn schema() -> &'static RecordSchema<Self> {
        static SCHEMA: Lazy<RecordSchema<EnemyRecord>> = Lazy::new(|| {
            RecordSchema::<EnemyRecord>::builder()
                .field("id", |r| &r.id, |r| &mut r.id)
                .field("name", |r| &r.name, |r| &mut r.name)
                .field("health", |r| &r.health, |r| &mut r.health)
                .collection("loot", |r| &r.loot, |r| &mut r.loot)
                .build()
                .expect("valid EnemyRecord schema")
        });
        &SCHEMA
    }
}

impl KeyedRecord for EnemyRecord {
    type Key = u32;

    fn key(&self) -> u32 {
        self.id
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsRecord {
    pub difficulty: i32,
    pub time_limit: f32,
}

impl Record for StatsRecord {
    fn schema() -> &'static RecordSchema<Self> {
        static SCHEMA: Lazy<RecordSchema<StatsRecord>> = Lazy::new(|| {
            RecordSchema::<StatsRecord>::builder()
                .field("difficulty", |r| &r.difficulty, |r| &mut r.difficulty)
                .field("timeLimit", |r| &r.time_limit, |r| &mut r.time_limit)
                .build()
                .expect("valid StatsRecord schema")
        });
        &SCHEMA
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RewardRecord {
    pub reward_item: u32,
    pub amount: u32,
}

impl Record for RewardRecord {
    fn schema() -> &'static RecordSchema<Self> {
        static SCHEMA: Lazy<RecordSchema<RewardRecord>> = Lazy::new(|| {
            RecordSchema::<RewardRecord>::builder()
                .field("rewardItem", |r| &r.reward_item, |r| &mut r.reward_item)
                .field("amount", |r| &r.amount, |r| &mut r.amount)
                .build()
                .expect("valid RewardRecord schema")
        });
        &SCHEMA
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LevelRecord {
    pub level_id: String,
    pub title: String,
    pub stats: StatsRecord,
    pub rewards: Vec<RewardRecord>,
}

impl Record for LevelRecord {
    fn schema() -> &'static RecordSchema<Self> {
        static SCHEMA: Lazy<RecordSchema<LevelRecord>> = Lazy::new(|| {
            RecordSchema::<LevelRecord>::builder()
                .field("levelId", |r| &r.level_id, |r| &mut r.level_id)
                .field("title", |r| &r.title, |r| &mut r.title)
                .nested("stats", |r| &r.stats, |r| &mut r.stats)
                .collection("rewards", |r| &r.rewards, |r| &mut r.rewards)
                .build()
                .expect("valid LevelRecord schema")
        });
        &SCHEMA
    }
}

impl KeyedRecord for LevelRecord {
    type Key = String;

    fn key(&self) -> String {
        self.level_id.clone()
    }
}

/// Read every record of `raw` into an ordered list, panicking on error.
pub fn read_all<R: Record>(raw: &str) -> Vec<R> {
    let mut records: Vec<R> = Vec::new();
    for_each_row(raw, |row| Ok(records.consume_row(row)?)).unwrap();
    records
}
