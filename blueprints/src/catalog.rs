//! Sample game catalog used by the CLI: items, enemies with loot tables and
//! levels with stats and rewards.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use blueprints::record::{KeyedRecord, Record, RecordSchema};
use blueprints::{blueprint_value_from_str, BlueprintRegistry, KeyedTable, RegistryResult, ResourceSource, SourceKind};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Rarity {
    #[default]
    Common,
    Rare,
    Legendary,
}

impl FromStr for Rarity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "" | "common" => Ok(Self::Common),
            "rare" => Ok(Self::Rare),
            "legendary" => Ok(Self::Legendary),
            other => Err(format!("unknown rarity '{}'", other)),
        }
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Common => "common",
            Self::Rare => "rare",
            Self::Legendary => "legendary",
        })
    }
}

blueprint_value_from_str!(Rarity);

#[derive(Debug, Clone, Default)]
pub struct ItemBlueprint {
    pub id: u32,
    pub name: String,
    pub price: u32,
    pub rarity: Rarity,
    pub tags: Vec<String>,
}

impl Record for ItemBlueprint {
    fn schema() -> &'static RecordSchema<Self> {
        static SCHEMA: Lazy<RecordSchema<ItemBlueprint>> = Lazy::new(|| {
            RecordSchema::<ItemBlueprint>::builder()
                .field("id", |r| &r.id, |r| &mut r.id)
                .field("name", |r| &r.name, |r| &mut r.name)
                .field("price", |r| &r.price, |r| &mut r.price)
                .field("rarity", |r| &r.rarity, |r| &mut r.rarity)
                .field("tags", |r| &r.tags, |r| &mut r.tags)
                .build()
                .expect("valid ItemBlueprint schema")
        });
        &SCHEMA
    }
}

impl KeyedRecord for ItemBlueprint {
    type Key = u32;

    fn key(&self) -> u32 {
        self.id
    }
}

#[derive(Debug, Clone, Default)]
pub struct LootEntry {
    pub item: u32,
    pub chance: f32,
}

impl Record for LootEntry {
    fn schema() -> &'static RecordSchema<Self> {
        static SCHEMA: Lazy<RecordSchema<LootEntry>> = Lazy::new(|| {
            RecordSchema::<LootEntry>::builder()
                .field("lootItem", |r| &r.item, |r| &mut r.item)
                .field("chance", |r| &r.chance, |r| &mut r.chance)
                .build()
                .expect("valid LootEntry schema")
        });
        &SCHEMA
    }
}

#[derive(Debug, Clone, Default)]
pub struct EnemyBlueprint {
    pub id: u32,
    pub name: String,
    pub health: i32,
    pub damage: i32,
    pub loot: Vec<LootEntry>,
}

impl Record for EnemyBlueprint {
    fn schema() -> &'static RecordSchema<Self> {
        static SCHEMA: Lazy<RecordSchema<EnemyBlueprint>> = Lazy::new(|| {
            RecordSchema::<EnemyBlueprint>::builder()
                .field("id", |r| &r.id, |r| &mut r.id)
                .field("name", |r| &r.name, |r| &mut r.name)
                .field("health", |r| &r.health, |r| &mut r.health)
                .field("damage", |r| &r.damage, |r| &mut r.damage)
                .collection("loot", |r| &r.loot, |r| &mut r.loot)
                .build()
                .expect("valid EnemyBlueprint schema")
        });
        &SCHEMA
    }
}

impl KeyedRecord for EnemyBlueprint {
    type Key = u32;

    fn key(&self) -> u32 {
        self.id
    }
}

#[derive(Debug, Clone, Default)]
pub struct LevelStats {
    pub difficulty: u8,
    pub time_limit: f32,
    pub unlocked_on: Option<NaiveDate>,
}

impl Record for LevelStats {
    fn schema() -> &'static RecordSchema<Self> {
        static SCHEMA: Lazy<RecordSchema<LevelStats>> = Lazy::new(|| {
            RecordSchema::<LevelStats>::builder()
                .field("difficulty", |r| &r.difficulty, |r| &mut r.difficulty)
                .field("timeLimit", |r| &r.time_limit, |r| &mut r.time_limit)
                .field("unlockedOn", |r| &r.unlocked_on, |r| &mut r.unlocked_on)
                .build()
                .expect("valid LevelStats schema")
        });
        &SCHEMA
    }
}

#[derive(Debug, Clone, Default)]
pub struct Reward {
    pub item: u32,
    pub amount: u32,
}

impl Record for Reward {
    fn schema() -> &'static RecordSchema<Self> {
        static SCHEMA: Lazy<RecordSchema<Reward>> = Lazy::new(|| {
            RecordSchema::<Reward>::builder()
                .field("rewardItem", |r| &r.item, |r| &mut r.item)
                .field("amount", |r| &r.amount, |r| &mut r.amount)
                .build()
                .expect("valid Reward schema")
        });
        &SCHEMA
    }
}

#[derive(Debug, Clone, Default)]
pub struct LevelBlueprint {
    pub level_id: String,
    pub title: String,
    pub stats: LevelStats,
    pub rewards: Vec<Reward>,
}

impl Record for LevelBlueprint {
    fn schema() -> &'static RecordSchema<Self> {
        static SCHEMA: Lazy<RecordSchema<LevelBlueprint>> = Lazy::new(|| {
            RecordSchema::<LevelBlueprint>::builder()
                .field("levelId", |r| &r.level_id, |r| &mut r.level_id)
                .field("title", |r| &r.title, |r| &mut r.title)
                .nested("stats", |r| &r.stats, |r| &mut r.stats)
                .collection("rewards", |r| &r.rewards, |r| &mut r.rewards)
                .build()
                .expect("valid LevelBlueprint schema")
        });
        &SCHEMA
    }
}

impl KeyedRecord for LevelBlueprint {
    type Key = String;

    fn key(&self) -> String {
        self.level_id.clone()
    }
}

/// Typed handles to the catalog tables.
pub struct Catalog {
    pub items: Arc<KeyedTable<ItemBlueprint>>,
    pub enemies: Arc<KeyedTable<EnemyBlueprint>>,
    pub levels: Arc<KeyedTable<LevelBlueprint>>,
}

impl Catalog {
    /// Register every catalog table. Enemies prefer the remote bundle host.
    pub fn register(registry: &mut BlueprintRegistry) -> RegistryResult<Self> {
        Ok(Self {
            items: registry.register(KeyedTable::new("Items"))?,
            enemies: registry.register(KeyedTable::new("Enemies").with_source(SourceKind::Addressable))?,
            levels: registry.register(KeyedTable::new("Levels"))?,
        })
    }

    /// Catalog data compiled into the binary.
    pub fn embedded_resources() -> ResourceSource {
        ResourceSource::new()
            .with_embedded("Items", include_bytes!("../data/BlueprintData/Items.csv"))
            .with_embedded("Enemies", include_bytes!("../data/BlueprintData/Enemies.csv"))
            .with_embedded("Levels", include_bytes!("../data/BlueprintData/Levels.csv"))
    }

    /// One line per table, for the CLI summary.
    pub fn summary(&self) -> Vec<String> {
        let rare_items = self
            .items
            .read()
            .values()
            .filter(|item| item.rarity != Rarity::Common)
            .count();
        let loot_entries: usize = self.enemies.read().values().map(|e| e.loot.len()).sum();
        let rewards: usize = self.levels.read().values().map(|l| l.rewards.len()).sum();

        vec![
            format!("Items: {} ({} rare or better)", self.items.read().len(), rare_items),
            format!("Enemies: {} ({} loot entries)", self.enemies.read().len(), loot_entries),
            format!("Levels: {} ({} rewards)", self.levels.read().len(), rewards),
        ]
    }
}
