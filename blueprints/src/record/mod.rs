//! Typed records: schema descriptors, the record reader and the converter
//! registry.
//!
//! - [`value`] - cell text <-> typed value conversion ([`BlueprintValue`])
//! - [`schema`] - per-type column bindings ([`RecordSchema`], [`Record`])
//! - [`collection`] - row-driven record containers ([`RecordMap`], `Vec<R>`)
//! - [`reader`] - CSV cursor ([`Row`]) and CSV rendering

pub mod collection;
pub mod reader;
pub mod schema;
pub mod value;

#[cfg(test)]
pub(crate) mod testing;

pub use collection::{RecordMap, SubCollection};
pub use reader::{for_each_row, rows_to_csv, HeaderIndex, Row};
pub use schema::{short_type_name, KeyedRecord, Record, RecordSchema, RecordSchemaBuilder};
pub use value::{BlueprintValue, DATE_FORMAT, LIST_SEPARATOR};
