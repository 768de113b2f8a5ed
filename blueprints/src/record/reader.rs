//! Streaming CSV cursor over a blueprint document.
//!
//! The header row names the columns; every following row is exposed as a
//! [`Row`] that looks cells up by column name. Cells are trimmed and blank
//! lines are skipped.

use std::collections::HashMap;

use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};

use crate::error::{TableError, TableResult};

/// Column name -> position lookup for one CSV document.
///
/// When a header repeats a column name, the first occurrence wins.
#[derive(Debug, Clone, Default)]
pub struct HeaderIndex {
    positions: HashMap<String, usize>,
}

impl HeaderIndex {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut positions: HashMap<String, usize> = HashMap::new();
        for (i, column) in columns.into_iter().enumerate() {
            positions.entry(column.into()).or_insert(i);
        }
        Self { positions }
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.positions.get(column).copied()
    }
}

/// One data row of a blueprint document.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    headers: &'a HeaderIndex,
    cells: &'a StringRecord,
    line: u64,
}

impl<'a> Row<'a> {
    pub fn new(headers: &'a HeaderIndex, cells: &'a StringRecord, line: u64) -> Self {
        Self {
            headers,
            cells,
            line,
        }
    }

    /// Cell text for `column`.
    ///
    /// `None` when the header has no such column. A row shorter than the
    /// header yields an empty cell for the missing trailing columns.
    pub fn cell(&self, column: &str) -> Option<&'a str> {
        let position = self.headers.position(column)?;
        Some(self.cells.get(position).unwrap_or(""))
    }

    /// 1-based line number in the source document.
    pub fn line(&self) -> u64 {
        self.line
    }
}

/// Walk every data row of `raw`, handing each one to `on_row`.
///
/// Stops at the first error returned by `on_row`.
pub fn for_each_row<F>(raw: &str, mut on_row: F) -> TableResult<()>
where
    F: FnMut(&Row<'_>) -> TableResult<()>,
{
    let text = raw.trim_start_matches('\u{feff}');
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let headers = HeaderIndex::new(reader.headers()?.iter());
    let mut record = StringRecord::new();

    while reader.read_record(&mut record)? {
        if record.iter().all(str::is_empty) {
            continue;
        }
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        on_row(&Row::new(&headers, &record, line))?;
    }

    Ok(())
}

/// Render rows as CSV text.
pub fn rows_to_csv(rows: &[Vec<String>]) -> TableResult<String> {
    let mut writer = WriterBuilder::new().flexible(true).from_writer(Vec::new());
    for row in rows {
        writer.write_record(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| TableError::Io(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(raw: &str) -> Vec<(u64, Option<String>, Option<String>)> {
        let mut seen = Vec::new();
        for_each_row(raw, |row| {
            seen.push((
                row.line(),
                row.cell("id").map(String::from),
                row.cell("name").map(String::from),
            ));
            Ok(())
        })
        .unwrap();
        seen
    }

    #[test]
    fn test_rows_by_column_name() {
        let rows = collect("id,name\n1,Sword\n2, Shield \n");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], (2, Some("1".into()), Some("Sword".into())));
        assert_eq!(rows[1].2.as_deref(), Some("Shield"));
    }

    #[test]
    fn test_short_rows_pad_with_empty_cells() {
        let rows = collect("id,name\n1\n");
        assert_eq!(rows[0].2.as_deref(), Some(""));
    }

    #[test]
    fn test_unknown_column_is_none() {
        let rows = collect("id\n1\n");
        assert_eq!(rows[0].2, None);
    }

    #[test]
    fn test_header_only_and_empty_documents() {
        assert!(collect("id,name\n").is_empty());
        assert!(collect("").is_empty());
    }

    #[test]
    fn test_bom_and_blank_rows_are_skipped() {
        let rows = collect("\u{feff}id,name\n1,Sword\n,\n\n2,Shield");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].1.as_deref(), Some("2"));
    }

    #[test]
    fn test_quoted_cells() {
        let rows = collect("id,name\n1,\"Sword, Long\"\n");
        assert_eq!(rows[0].2.as_deref(), Some("Sword, Long"));
    }

    #[test]
    fn test_rows_to_csv_quotes_when_needed() {
        let csv = rows_to_csv(&[
            vec!["id".into(), "name".into()],
            vec!["1".into(), "Sword, Long".into()],
        ])
        .unwrap();
        assert_eq!(csv, "id,name\n1,\"Sword, Long\"\n");
    }
}
