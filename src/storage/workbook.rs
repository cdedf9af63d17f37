//! JSON-file workbook.
//!
//! Holds every collection as a sheet (header + string rows) and, when
//! opened with a path, rewrites the whole file after each mutation so a run
//! interrupted between writes leaves the last completed write on disk.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{find_date_column, format_date, parse_date, Row, TabularStore};
use crate::types::TrackerError;

/// One named collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    fn to_row(&self, cells: &[String]) -> Row {
        self.header
            .iter()
            .enumerate()
            .map(|(i, column)| (column.clone(), cells.get(i).cloned().unwrap_or_default()))
            .collect()
    }

    /// Lay a keyed row out in header order, rejecting unknown keys.
    fn to_cells(&self, collection: &str, row: &Row) -> Result<Vec<String>, TrackerError> {
        if let Some(unknown) = row.keys().find(|k| !self.header.contains(k)) {
            return Err(TrackerError::SchemaMismatch {
                collection: collection.to_string(),
                detail: format!("column '{unknown}' is not in the header"),
            });
        }
        Ok(self
            .header
            .iter()
            .map(|column| row.get(column).cloned().unwrap_or_default())
            .collect())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct WorkbookFile {
    sheets: BTreeMap<String, Sheet>,
}

/// Spreadsheet-like store backed by an optional JSON file.
#[derive(Debug, Default)]
pub struct Workbook {
    path: Option<PathBuf>,
    sheets: BTreeMap<String, Sheet>,
}

impl Workbook {
    /// A workbook that never touches disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open (or start) a workbook file. A missing file is a fresh workbook.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            info!(path = %path.display(), "No workbook found, starting fresh");
            return Ok(Self { path: Some(path), sheets: BTreeMap::new() });
        }

        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read workbook from {}", path.display()))?;
        let file: WorkbookFile = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse workbook {}", path.display()))?;

        info!(
            path = %path.display(),
            sheets = file.sheets.len(),
            "Workbook loaded from disk"
        );
        Ok(Self { path: Some(path), sheets: file.sheets })
    }

    pub fn sheet(&self, collection: &str) -> Option<&Sheet> {
        self.sheets.get(collection)
    }

    fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let file = WorkbookFile { sheets: self.sheets.clone() };
        let json = serde_json::to_string_pretty(&file).context("Failed to serialise workbook")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write workbook to {}", path.display()))?;
        debug!(path = %path.display(), "Workbook saved");
        Ok(())
    }

    fn sheet_mut(&mut self, collection: &str) -> Result<&mut Sheet> {
        match self.sheets.get_mut(collection) {
            Some(sheet) if !sheet.header.is_empty() => Ok(sheet),
            _ => Err(TrackerError::SchemaMismatch {
                collection: collection.to_string(),
                detail: "collection has no header row".to_string(),
            }
            .into()),
        }
    }
}

impl TabularStore for Workbook {
    fn read(&self, collection: &str) -> Result<Vec<Row>> {
        Ok(self
            .sheets
            .get(collection)
            .map(|sheet| sheet.rows.iter().map(|cells| sheet.to_row(cells)).collect())
            .unwrap_or_default())
    }

    fn append(&mut self, collection: &str, row: Row) -> Result<()> {
        let sheet = self.sheet_mut(collection)?;
        let cells = sheet.to_cells(collection, &row)?;
        sheet.rows.push(cells);
        self.save()
    }

    fn replace_for_date(
        &mut self,
        collection: &str,
        date: NaiveDate,
        rows: Vec<Row>,
    ) -> Result<()> {
        let sheet = self.sheet_mut(collection)?;

        let Some(date_idx) = find_date_column(&sheet.header)
            .and_then(|col| sheet.header.iter().position(|c| c == col))
        else {
            bail!(TrackerError::SchemaMismatch {
                collection: collection.to_string(),
                detail: "no date column".to_string(),
            });
        };

        // Lay out every new row before touching existing ones.
        let new_cells = rows
            .iter()
            .map(|row| sheet.to_cells(collection, row))
            .collect::<Result<Vec<_>, _>>()?;

        let before = sheet.rows.len();
        sheet
            .rows
            .retain(|cells| cells.get(date_idx).and_then(|c| parse_date(c)) != Some(date));
        let removed = before - sheet.rows.len();
        let added = new_cells.len();
        sheet.rows.extend(new_cells);

        debug!(collection, date = %format_date(date), removed, added, "Rows replaced for date");
        self.save()
    }

    fn ensure_schema(&mut self, collection: &str, header: &[&str]) -> Result<()> {
        let wanted: Vec<String> = header.iter().map(|h| h.to_string()).collect();
        let sheet = self.sheets.entry(collection.to_string()).or_default();

        if sheet.header == wanted {
            return Ok(());
        }

        if !sheet.header.is_empty() {
            let mismatch = TrackerError::SchemaMismatch {
                collection: collection.to_string(),
                detail: format!("header {:?}, expected {:?}", sheet.header, wanted),
            };
            warn!(error = %mismatch, rows = sheet.rows.len(), "Rewriting header");
        }

        // Map each wanted column to its old position (exact, then by
        // case-insensitive name).
        let sources: Vec<Option<usize>> = wanted
            .iter()
            .map(|col| {
                sheet.header.iter().position(|h| h == col).or_else(|| {
                    sheet
                        .header
                        .iter()
                        .position(|h| h.trim().eq_ignore_ascii_case(col.trim()))
                })
            })
            .collect();

        let dropped: Vec<&String> = sheet
            .header
            .iter()
            .enumerate()
            .filter(|(i, _)| !sources.contains(&Some(*i)))
            .map(|(_, h)| h)
            .collect();
        if !dropped.is_empty() {
            warn!(collection, columns = ?dropped, "Columns not in schema are no longer kept");
        }

        sheet.rows = sheet
            .rows
            .iter()
            .map(|cells| {
                sources
                    .iter()
                    .map(|src| src.and_then(|i| cells.get(i).cloned()).unwrap_or_default())
                    .collect()
            })
            .collect();
        sheet.header = wanted;

        self.save()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
