//! Schema descriptors: the compiled mapping between a record type's members
//! and CSV columns.
//!
//! A schema is declared once per record type with [`RecordSchema::builder`]
//! and cached for the process lifetime, typically in a `Lazy` static:
//!
//! ```rust,ignore
//! use blueprints::record::{Record, RecordSchema};
//! use once_cell::sync::Lazy;
//!
//! #[derive(Debug, Clone, Default)]
//! struct ItemRecord { id: u32, name: String, price: u32 }
//!
//! impl Record for ItemRecord {
//!     fn schema() -> &'static RecordSchema<Self> {
//!         static SCHEMA: Lazy<RecordSchema<ItemRecord>> = Lazy::new(|| {
//!             RecordSchema::<ItemRecord>::builder()
//!                 .field("id", |r| &r.id, |r| &mut r.id)
//!                 .field("name", |r| &r.name, |r| &mut r.name)
//!                 .field("price", |r| &r.price, |r| &mut r.price)
//!                 .build()
//!                 .expect("valid ItemRecord schema")
//!         });
//!         &SCHEMA
//!     }
//! }
//! ```
//!
//! Three binding kinds exist, and a member is bound by exactly one of them:
//!
//! - **field**: one column, converted through [`BlueprintValue`]
//! - **nested**: a full record flattened inline into the same row
//! - **collection**: child records populated by the same row and by
//!   following rows whose parent key cell is empty

use std::collections::HashSet;
use std::fmt::{Debug, Display};

use super::collection::SubCollection;
use super::reader::Row;
use super::value::BlueprintValue;
use crate::error::{RecordError, RecordResult, SchemaError};

/// A record type that can be read from blueprint rows.
pub trait Record: Default + Send + Sync + 'static {
    /// The cached schema of this record type.
    fn schema() -> &'static RecordSchema<Self>;
}

/// A record with a key, storable in keyed tables and collections.
pub trait KeyedRecord: Record {
    type Key: Ord + Clone + Debug + Display + Send + Sync + 'static;

    fn key(&self) -> Self::Key;
}

/// Short name of a type, without its module path.
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    match base.rfind("::") {
        Some(idx) => &full[idx + 2..],
        None => full,
    }
}

type CellReader<R> = Box<dyn Fn(&R) -> String + Send + Sync>;
type CellWriter<R> = Box<dyn Fn(&mut R, &str) -> Result<(), crate::error::ConvertError> + Send + Sync>;
type RowApplier<R> = Box<dyn Fn(&mut R, &Row<'_>, &str) -> RecordResult<()> + Send + Sync>;
type RowFeeder<R> = Box<dyn Fn(&mut R, &Row<'_>) -> RecordResult<()> + Send + Sync>;
type RowsWriter<R> = Box<dyn Fn(&R) -> Vec<Vec<String>> + Send + Sync>;
type Clearer<R> = Box<dyn Fn(&mut R) + Send + Sync>;

struct FieldBinding<R> {
    column: String,
    read: CellReader<R>,
    write: CellWriter<R>,
}

struct NestedBinding<R> {
    member: String,
    headers: Vec<String>,
    apply: RowApplier<R>,
    feed: RowFeeder<R>,
    rows: RowsWriter<R>,
}

struct CollectionBinding<R> {
    member: String,
    headers: Vec<String>,
    clear: Clearer<R>,
    consume: RowFeeder<R>,
    rows: RowsWriter<R>,
}

enum Binding<R> {
    Field(FieldBinding<R>),
    Nested(NestedBinding<R>),
    Collection(CollectionBinding<R>),
}

impl<R> Binding<R> {
    fn member(&self) -> &str {
        match self {
            Self::Field(b) => &b.column,
            Self::Nested(b) => &b.member,
            Self::Collection(b) => &b.member,
        }
    }

    fn headers(&self) -> Vec<String> {
        match self {
            Self::Field(b) => vec![b.column.clone()],
            Self::Nested(b) => b.headers.clone(),
            Self::Collection(b) => b.headers.clone(),
        }
    }
}

/// Compiled schema of one record type.
pub struct RecordSchema<R> {
    key_column: String,
    bindings: Vec<Binding<R>>,
    headers: Vec<String>,
}

impl<R> Debug for RecordSchema<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordSchema")
            .field("record_type", &short_type_name::<R>())
            .field("key_column", &self.key_column)
            .field("headers", &self.headers)
            .finish()
    }
}

impl<R: Default + 'static> RecordSchema<R> {
    pub fn builder() -> RecordSchemaBuilder<R> {
        RecordSchemaBuilder {
            key_column: None,
            bindings: Vec::new(),
        }
    }

    /// Column whose presence marks the start of a new record.
    pub fn key_column(&self) -> &str {
        &self.key_column
    }

    /// Flattened column list in declaration order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Build the record starting on `row`.
    ///
    /// Returns `Ok(None)` when the key cell is empty or the file has no key
    /// column: no record starts here and the row only contributes to a
    /// sibling's sub-collections. Sub-collections are initialized but not
    /// yet populated.
    pub fn read_record(&self, row: &Row<'_>) -> RecordResult<Option<R>> {
        let key = match row.cell(&self.key_column) {
            Some(key) if !key.is_empty() => key,
            _ => return Ok(None),
        };

        let mut record = R::default();
        self.apply_fields(&mut record, row, key)?;
        for binding in &self.bindings {
            if let Binding::Collection(c) = binding {
                (c.clear)(&mut record);
            }
        }
        Ok(Some(record))
    }

    /// Apply every field and nested binding from `row`, without a key check.
    ///
    /// `key` is the owning record's key, used for error context.
    pub fn apply_fields(&self, record: &mut R, row: &Row<'_>, key: &str) -> RecordResult<()> {
        for binding in &self.bindings {
            match binding {
                Binding::Field(field) => {
                    let cell = row.cell(&field.column).ok_or_else(|| RecordError::MissingColumn {
                        record_type: short_type_name::<R>(),
                        key: key.to_string(),
                        column: field.column.clone(),
                        line: row.line(),
                    })?;
                    (field.write)(record, cell).map_err(|source| RecordError::Convert {
                        record_type: short_type_name::<R>(),
                        key: key.to_string(),
                        member: field.column.clone(),
                        line: row.line(),
                        source,
                    })?;
                }
                Binding::Nested(nested) => (nested.apply)(record, row, key)?,
                Binding::Collection(_) => {}
            }
        }
        Ok(())
    }

    /// Let every sub-collection (including those of nested members)
    /// consume `row`.
    pub fn feed_collections(&self, record: &mut R, row: &Row<'_>) -> RecordResult<()> {
        for binding in &self.bindings {
            match binding {
                Binding::Nested(nested) => (nested.feed)(record, row)?,
                Binding::Collection(collection) => (collection.consume)(record, row)?,
                Binding::Field(_) => {}
            }
        }
        Ok(())
    }

    /// Render `record` as rows aligned with [`headers`](Self::headers).
    ///
    /// Fields occupy the first row only; each sub-collection contributes
    /// its child rows from the first row downwards. Shorter blocks are
    /// padded with empty cells.
    pub fn write_rows(&self, record: &R) -> Vec<Vec<String>> {
        let blocks: Vec<(usize, Vec<Vec<String>>)> = self
            .bindings
            .iter()
            .map(|binding| match binding {
                Binding::Field(field) => (1, vec![vec![(field.read)(record)]]),
                Binding::Nested(nested) => (nested.headers.len(), (nested.rows)(record)),
                Binding::Collection(collection) => {
                    (collection.headers.len(), (collection.rows)(record))
                }
            })
            .collect();

        let height = blocks.iter().map(|(_, rows)| rows.len()).max().unwrap_or(0).max(1);
        (0..height)
            .map(|i| {
                let mut row = Vec::with_capacity(self.headers.len());
                for (width, rows) in &blocks {
                    match rows.get(i) {
                        Some(cells) => {
                            row.extend(cells.iter().cloned());
                            row.extend(std::iter::repeat(String::new()).take(width.saturating_sub(cells.len())));
                        }
                        None => row.extend(std::iter::repeat(String::new()).take(*width)),
                    }
                }
                row
            })
            .collect()
    }

    /// Render `record` as raw rows, optionally preceded by the header row.
    pub fn to_raw_rows(&self, record: &R, include_header: bool) -> Vec<Vec<String>> {
        let mut rows = Vec::new();
        if include_header {
            rows.push(self.headers.clone());
        }
        rows.extend(self.write_rows(record));
        rows
    }
}

/// Builder for [`RecordSchema`].
pub struct RecordSchemaBuilder<R> {
    key_column: Option<String>,
    bindings: Vec<Binding<R>>,
}

impl<R: Default + 'static> RecordSchemaBuilder<R> {
    /// Use `column` as key column instead of the first scalar field.
    pub fn key_column(mut self, column: impl Into<String>) -> Self {
        self.key_column = Some(column.into());
        self
    }

    /// Bind a scalar member to the column `column`.
    pub fn field<T>(mut self, column: impl Into<String>, get: fn(&R) -> &T, get_mut: fn(&mut R) -> &mut T) -> Self
    where
        T: BlueprintValue + 'static,
    {
        self.bindings.push(Binding::Field(FieldBinding {
            column: column.into(),
            read: Box::new(move |record: &R| get(record).to_cell()),
            write: Box::new(move |record: &mut R, cell: &str| {
                T::parse_cell(cell).map(|value| *get_mut(record) = value)
            }),
        }));
        self
    }

    /// Bind a member that is itself a record, flattened inline into the same row.
    pub fn nested<N>(mut self, member: impl Into<String>, get: fn(&R) -> &N, get_mut: fn(&mut R) -> &mut N) -> Self
    where
        N: Record,
    {
        self.bindings.push(Binding::Nested(NestedBinding {
            member: member.into(),
            headers: N::schema().headers().to_vec(),
            apply: Box::new(move |record: &mut R, row: &Row<'_>, key: &str| {
                N::schema().apply_fields(get_mut(record), row, key)
            }),
            feed: Box::new(move |record: &mut R, row: &Row<'_>| {
                N::schema().feed_collections(get_mut(record), row)
            }),
            rows: Box::new(move |record: &R| N::schema().write_rows(get(record))),
        }));
        self
    }

    /// Bind a keyed or ordered collection of child records.
    pub fn collection<C>(mut self, member: impl Into<String>, get: fn(&R) -> &C, get_mut: fn(&mut R) -> &mut C) -> Self
    where
        C: SubCollection,
    {
        self.bindings.push(Binding::Collection(CollectionBinding {
            member: member.into(),
            headers: <C::Item as Record>::schema().headers().to_vec(),
            clear: Box::new(move |record: &mut R| get_mut(record).clear()),
            consume: Box::new(move |record: &mut R, row: &Row<'_>| get_mut(record).consume_row(row)),
            rows: Box::new(move |record: &R| get(record).write_rows()),
        }));
        self
    }

    /// Validate the declaration and compile the schema.
    pub fn build(self) -> Result<RecordSchema<R>, SchemaError> {
        let record_type = short_type_name::<R>();

        let mut seen = HashSet::new();
        for binding in &self.bindings {
            if !seen.insert(binding.member()) {
                return Err(SchemaError::DuplicateMember {
                    record_type,
                    member: binding.member().to_string(),
                });
            }
        }

        let mut fields = self.bindings.iter().filter_map(|b| match b {
            Binding::Field(field) => Some(field.column.as_str()),
            _ => None,
        });
        let key_column = match self.key_column {
            Some(column) => {
                if !fields.any(|f| f == column) {
                    return Err(SchemaError::UnknownKeyColumn { record_type, column });
                }
                column
            }
            None => fields
                .next()
                .map(String::from)
                .ok_or(SchemaError::NoKeyColumn { record_type })?,
        };

        let headers = self.bindings.iter().flat_map(Binding::headers).collect();
        Ok(RecordSchema {
            key_column,
            bindings: self.bindings,
            headers,
        })
    }
}
