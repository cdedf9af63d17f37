//! Persistence layer.
//!
//! The tracker treats its store as a spreadsheet: named collections, each
//! with a header row and string cells. `TabularStore` is the seam;
//! `Workbook` is the bundled implementation (JSON file on disk) and
//! `records` converts rows to and from the typed domain records.

pub mod records;
pub mod workbook;

use anyhow::Result;
use chrono::NaiveDate;
use std::collections::BTreeMap;

pub use records::Record;
pub use workbook::Workbook;

/// One data row keyed by header name.
pub type Row = BTreeMap<String, String>;

/// Header spellings accepted as the date column (case-insensitive).
pub const DATE_COLUMN_VARIANTS: &[&str] = &["date", "day", "pick date", "game date"];

/// Date format used in every date cell.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Abstraction over a spreadsheet-like store.
pub trait TabularStore: Send {
    /// All data rows of a collection in sheet order. A missing collection
    /// reads as empty.
    fn read(&self, collection: &str) -> Result<Vec<Row>>;

    /// Append one row. Keys must be header columns; missing keys are blank.
    fn append(&mut self, collection: &str, row: Row) -> Result<()>;

    /// Delete every row dated `date`, then append `rows`.
    fn replace_for_date(&mut self, collection: &str, date: NaiveDate, rows: Vec<Row>)
        -> Result<()>;

    /// Make the header equal to `header`, keeping every data row.
    fn ensure_schema(&mut self, collection: &str, header: &[&str]) -> Result<()>;
}

/// Find the date-like column in a header.
pub fn find_date_column<S: AsRef<str>>(columns: &[S]) -> Option<&str> {
    columns
        .iter()
        .map(|c| c.as_ref())
        .find(|c| DATE_COLUMN_VARIANTS.contains(&c.trim().to_lowercase().as_str()))
}

/// Parse a date cell, tolerating surrounding whitespace.
pub fn parse_date(cell: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(cell.trim(), DATE_FORMAT).ok()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Rows of a collection dated `date`, using whichever date column it has.
pub fn rows_for_date(store: &dyn TabularStore, collection: &str, date: NaiveDate) -> Result<Vec<Row>> {
    let rows = store.read(collection)?;
    Ok(rows
        .into_iter()
        .filter(|row| {
            row.iter().any(|(column, cell)| {
                find_date_column(&[column.as_str()]).is_some() && parse_date(cell) == Some(date)
            })
        })
        .collect())
}
