//! Typed records and their sheet layouts.
//!
//! Column order of each `HEADER` is what the sheets show, so it must not be
//! reordered. Rows read back from the store are validated here: a row with
//! a missing required cell or an unparsable value is rejected instead of
//! flowing onward half-filled.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::warn;

use super::{format_date, parse_date, rows_for_date, Row, TabularStore};
use crate::types::{
    BankrollEntry, Combination, Direction, LogEntry, PickStatus, SinglePick, TrackerError,
    WatchlistEntry,
};

/// Separator between legs in a combination's `Legs` cell.
pub const LEG_SEPARATOR: &str = "; ";

/// A domain record that maps onto one sheet row.
pub trait Record: Sized {
    /// Short name used in validation errors.
    const KIND: &'static str;
    const HEADER: &'static [&'static str];

    fn to_row(&self) -> Row;
    fn from_row(row: &Row) -> Result<Self, TrackerError>;
}

// ---------------------------------------------------------------------------
// Cell helpers
// ---------------------------------------------------------------------------

fn invalid(kind: &str, reason: String) -> TrackerError {
    TrackerError::InvalidRecord {
        collection: kind.to_string(),
        reason,
    }
}

/// Look a cell up by header name, falling back to a case-insensitive match.
fn cell<'a>(row: &'a Row, column: &str) -> Option<&'a str> {
    row.get(column)
        .or_else(|| {
            row.iter()
                .find(|(k, _)| k.trim().eq_ignore_ascii_case(column))
                .map(|(_, v)| v)
        })
        .map(|v| v.trim())
}

fn required<'a>(kind: &str, row: &'a Row, column: &str) -> Result<&'a str, TrackerError> {
    match cell(row, column) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(invalid(kind, format!("missing '{column}'"))),
    }
}

fn parse_cell<T: FromStr>(kind: &str, row: &Row, column: &str) -> Result<T, TrackerError> {
    let raw = required(kind, row, column)?;
    raw.parse::<T>()
        .map_err(|_| invalid(kind, format!("bad '{column}' value '{raw}'")))
}

fn date_cell(kind: &str, row: &Row, column: &str) -> Result<NaiveDate, TrackerError> {
    let raw = required(kind, row, column)?;
    parse_date(raw).ok_or_else(|| invalid(kind, format!("bad '{column}' date '{raw}'")))
}

/// Status cells may be blank (unsettled).
fn non_negative(kind: &str, row: &Row, column: &str) -> Result<Decimal, TrackerError> {
    let value: Decimal = parse_cell(kind, row, column)?;
    if value < Decimal::ZERO {
        return Err(invalid(kind, format!("negative '{column}' value {value}")));
    }
    Ok(value)
}

fn status_cell(kind: &str, row: &Row) -> Result<PickStatus, TrackerError> {
    let raw = cell(row, "Status").unwrap_or("");
    raw.parse::<PickStatus>()
        .map_err(|_| invalid(kind, format!("bad 'Status' value '{raw}'")))
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn row_of(pairs: Vec<(&str, String)>) -> Row {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

impl Record for SinglePick {
    const KIND: &'static str = "single pick";
    // `Event` trails the ten sheet columns so their order is unchanged.
    const HEADER: &'static [&'static str] = &[
        "Date",
        "Sport",
        "Player",
        "Prop",
        "Line",
        "Recommendation",
        "Probability",
        "Units",
        "Stake",
        "Status",
        "Event",
    ];

    fn to_row(&self) -> Row {
        row_of(vec![
            ("Date", format_date(self.date)),
            ("Sport", self.sport.clone()),
            ("Player", self.player.clone()),
            ("Prop", self.prop.clone()),
            ("Line", self.line.to_string()),
            ("Recommendation", self.direction.to_string()),
            ("Probability", self.probability.to_string()),
            ("Units", self.units.to_string()),
            ("Stake", self.stake.to_string()),
            ("Status", self.status.to_string()),
            ("Event", self.event.clone()),
        ])
    }

    fn from_row(row: &Row) -> Result<Self, TrackerError> {
        let k = Self::KIND;
        let probability: f64 = parse_cell(k, row, "Probability")?;
        if !(0.0..=1.0).contains(&probability) {
            return Err(TrackerError::InvalidProbability(probability));
        }
        let units = non_negative(k, row, "Units")?;
        let stake = non_negative(k, row, "Stake")?;
        Ok(SinglePick {
            date: date_cell(k, row, "Date")?,
            sport: required(k, row, "Sport")?.to_string(),
            player: required(k, row, "Player")?.to_string(),
            prop: required(k, row, "Prop")?.to_string(),
            line: parse_cell(k, row, "Line")?,
            direction: parse_cell::<Direction>(k, row, "Recommendation")?,
            probability,
            units,
            stake,
            status: status_cell(k, row)?,
            // Rows written before the Event column existed cannot be looked up
            // by event, but still carry everything else.
            event: cell(row, "Event").unwrap_or("").to_string(),
        })
    }
}

impl Record for Combination {
    const KIND: &'static str = "combination";
    const HEADER: &'static [&'static str] = &[
        "Date",
        "Type",
        "Legs",
        "Payout",
        "Probability",
        "Units",
        "Stake",
        "Status",
        "Sports",
    ];

    fn to_row(&self) -> Row {
        row_of(vec![
            ("Date", format_date(self.date)),
            ("Type", self.kind.clone()),
            ("Legs", self.legs.join(LEG_SEPARATOR)),
            ("Payout", format!("{}×", self.payout)),
            ("Probability", self.probability.to_string()),
            ("Units", self.units.to_string()),
            ("Stake", self.stake.to_string()),
            ("Status", self.status.to_string()),
            ("Sports", self.sports.join(LEG_SEPARATOR)),
        ])
    }

    fn from_row(row: &Row) -> Result<Self, TrackerError> {
        let k = Self::KIND;
        let legs = split_list(required(k, row, "Legs")?);
        let sports = split_list(cell(row, "Sports").unwrap_or(""));
        if !sports.is_empty() && sports.len() != legs.len() {
            return Err(invalid(
                k,
                format!("{} sports for {} legs", sports.len(), legs.len()),
            ));
        }
        let raw_payout = required(k, row, "Payout")?;
        let payout = Decimal::from_str(raw_payout.trim_end_matches(&['×', 'x', 'X'][..]).trim())
            .map_err(|_| invalid(k, format!("bad 'Payout' value '{raw_payout}'")))?;

        Ok(Combination {
            date: date_cell(k, row, "Date")?,
            kind: required(k, row, "Type")?.to_string(),
            legs,
            sports,
            payout,
            probability: parse_cell(k, row, "Probability")?,
            units: non_negative(k, row, "Units")?,
            stake: non_negative(k, row, "Stake")?,
            status: status_cell(k, row)?,
        })
    }
}

impl Record for BankrollEntry {
    const KIND: &'static str = "bankroll";
    const HEADER: &'static [&'static str] = &["Date", "Balance"];

    fn to_row(&self) -> Row {
        row_of(vec![
            ("Date", format_date(self.date)),
            ("Balance", self.balance.to_string()),
        ])
    }

    fn from_row(row: &Row) -> Result<Self, TrackerError> {
        Ok(BankrollEntry {
            date: date_cell(Self::KIND, row, "Date")?,
            balance: parse_cell(Self::KIND, row, "Balance")?,
        })
    }
}

impl Record for LogEntry {
    const KIND: &'static str = "log";
    const HEADER: &'static [&'static str] = &[
        "Run Timestamp",
        "Pick Type",
        "Details",
        "Num Legs",
        "Combined Probability",
        "Units",
    ];

    fn to_row(&self) -> Row {
        row_of(vec![
            ("Run Timestamp", self.run_timestamp.to_rfc3339()),
            ("Pick Type", self.pick_type.clone()),
            ("Details", self.details.clone()),
            ("Num Legs", self.num_legs.to_string()),
            ("Combined Probability", self.probability.to_string()),
            ("Units", self.units.to_string()),
        ])
    }

    fn from_row(row: &Row) -> Result<Self, TrackerError> {
        let k = Self::KIND;
        let raw_ts = required(k, row, "Run Timestamp")?;
        let run_timestamp = DateTime::parse_from_rfc3339(raw_ts)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|_| invalid(k, format!("bad 'Run Timestamp' value '{raw_ts}'")))?;
        Ok(LogEntry {
            run_timestamp,
            pick_type: required(k, row, "Pick Type")?.to_string(),
            details: required(k, row, "Details")?.to_string(),
            num_legs: parse_cell(k, row, "Num Legs")?,
            probability: parse_cell(k, row, "Combined Probability")?,
            units: parse_cell(k, row, "Units")?,
        })
    }
}

impl Record for WatchlistEntry {
    const KIND: &'static str = "watchlist";
    const HEADER: &'static [&'static str] = &["Date", "Player", "Prop", "Event", "Status"];

    fn to_row(&self) -> Row {
        row_of(vec![
            ("Date", format_date(self.date)),
            ("Player", self.player.clone()),
            ("Prop", self.prop.clone()),
            ("Event", self.event.clone()),
            ("Status", self.status.clone()),
        ])
    }

    fn from_row(row: &Row) -> Result<Self, TrackerError> {
        let k = Self::KIND;
        Ok(WatchlistEntry {
            date: date_cell(k, row, "Date")?,
            player: required(k, row, "Player")?.to_string(),
            prop: required(k, row, "Prop")?.to_string(),
            event: cell(row, "Event").unwrap_or("").to_string(),
            status: cell(row, "Status").unwrap_or("").to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Store helpers
// ---------------------------------------------------------------------------

/// Read and validate every row of a collection. Invalid rows are logged
/// and skipped; they stay untouched in the store.
pub fn load<R: Record>(store: &dyn TabularStore, collection: &str) -> Result<Vec<R>> {
    let rows = store.read(collection)?;
    Ok(rows
        .iter()
        .filter_map(|row| match R::from_row(row) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(collection, error = %e, "Skipping invalid row");
                None
            }
        })
        .collect())
}

/// A row of one day's slice: parsed, or kept verbatim because it failed
/// validation.
#[derive(Debug, Clone)]
pub enum Stored<R> {
    Valid(R),
    Invalid(Row),
}

impl<R: Record> Stored<R> {
    fn to_row(&self) -> Row {
        match self {
            Stored::Valid(record) => record.to_row(),
            Stored::Invalid(row) => row.clone(),
        }
    }
}

/// Every row dated `date`, in sheet order, without dropping invalid ones.
pub fn load_day<R: Record>(
    store: &dyn TabularStore,
    collection: &str,
    date: NaiveDate,
) -> Result<Vec<Stored<R>>> {
    let rows = rows_for_date(store, collection, date)?;
    Ok(rows
        .into_iter()
        .map(|row| match R::from_row(&row) {
            Ok(record) => Stored::Valid(record),
            Err(e) => {
                warn!(collection, %date, error = %e, "Keeping invalid row as-is");
                Stored::Invalid(row)
            }
        })
        .collect())
}

/// Write a day's slice back in place of the stored one.
pub fn write_day<R: Record>(
    store: &mut dyn TabularStore,
    collection: &str,
    date: NaiveDate,
    day: &[Stored<R>],
) -> Result<()> {
    let rows = day.iter().map(Stored::to_row).collect();
    store.replace_for_date(collection, date, rows)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
