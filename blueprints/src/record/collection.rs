//! Record collections: ordered lists and key-ordered maps.
//!
//! Both blueprint tables and one-to-many sub-collections are backed by a
//! [`SubCollection`]. Consuming a row either starts a new child record
//! (key cell present) or hands the row to the most recent child's own
//! sub-collections (key cell empty).

use std::collections::btree_map;
use std::collections::BTreeMap;

use super::reader::Row;
use super::schema::{short_type_name, KeyedRecord, Record};
use crate::error::{RecordError, RecordResult};

/// A container of child records populated row by row.
pub trait SubCollection: Default + Send + Sync + 'static {
    type Item: Record;

    /// Consume one row: start a new record or extend the last one.
    fn consume_row(&mut self, row: &Row<'_>) -> RecordResult<()>;

    /// Render every record, in iteration order, as schema-aligned rows.
    fn write_rows(&self) -> Vec<Vec<String>>;

    fn clear(&mut self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<R: Record> SubCollection for Vec<R> {
    type Item = R;

    fn consume_row(&mut self, row: &Row<'_>) -> RecordResult<()> {
        let schema = R::schema();
        match schema.read_record(row)? {
            Some(mut record) => {
                schema.feed_collections(&mut record, row)?;
                self.push(record);
            }
            None => {
                if let Some(last) = self.last_mut() {
                    schema.feed_collections(last, row)?;
                }
            }
        }
        Ok(())
    }

    fn write_rows(&self) -> Vec<Vec<String>> {
        let schema = R::schema();
        self.iter().flat_map(|record| schema.write_rows(record)).collect()
    }

    fn clear(&mut self) {
        Vec::clear(self);
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }
}

/// Key-ordered map of records that remembers the last inserted key.
///
/// Inserting a key twice is an error: silently overwriting would hide
/// data-authoring mistakes.
#[derive(Debug, Clone)]
pub struct RecordMap<R: KeyedRecord> {
    entries: BTreeMap<R::Key, R>,
    last: Option<R::Key>,
}

impl<R: KeyedRecord> Default for RecordMap<R> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            last: None,
        }
    }
}

impl<R: KeyedRecord> RecordMap<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `record` under its key. `line` is used for error context.
    pub fn insert(&mut self, record: R, line: u64) -> RecordResult<()> {
        let key = record.key();
        match self.entries.entry(key.clone()) {
            btree_map::Entry::Occupied(_) => Err(RecordError::DuplicateKey {
                record_type: short_type_name::<R>(),
                key: key.to_string(),
                line,
            }),
            btree_map::Entry::Vacant(slot) => {
                slot.insert(record);
                self.last = Some(key);
                Ok(())
            }
        }
    }

    pub fn get(&self, key: &R::Key) -> Option<&R> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &R::Key) -> bool {
        self.entries.contains_key(key)
    }

    /// The most recently inserted record.
    pub fn last_mut(&mut self) -> Option<&mut R> {
        let key = self.last.as_ref()?;
        self.entries.get_mut(key)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, R::Key, R> {
        self.entries.iter()
    }

    pub fn keys(&self) -> btree_map::Keys<'_, R::Key, R> {
        self.entries.keys()
    }

    pub fn values(&self) -> btree_map::Values<'_, R::Key, R> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a, R: KeyedRecord> IntoIterator for &'a RecordMap<R> {
    type Item = (&'a R::Key, &'a R);
    type IntoIter = btree_map::Iter<'a, R::Key, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl<R: KeyedRecord> SubCollection for RecordMap<R> {
    type Item = R;

    fn consume_row(&mut self, row: &Row<'_>) -> RecordResult<()> {
        let schema = R::schema();
        match schema.read_record(row)? {
            Some(mut record) => {
                schema.feed_collections(&mut record, row)?;
                self.insert(record, row.line())?;
            }
            None => {
                if let Some(last) = self.last_mut() {
                    schema.feed_collections(last, row)?;
                }
            }
        }
        Ok(())
    }

    fn write_rows(&self) -> Vec<Vec<String>> {
        let schema = R::schema();
        self.values().flat_map(|record| schema.write_rows(record)).collect()
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.last = None;
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
