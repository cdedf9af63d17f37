//! Shared types for the PROPLINE tracker.
//!
//! These types form the data model used across all modules. Strategy,
//! engine and storage code depend on them without depending on each other.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Prop candidates
// ---------------------------------------------------------------------------

/// A potential bet as listed on the upstream board. Never persisted directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropCandidate {
    pub player: String,
    /// Stat / prop name, e.g. "Points" or "Passing Yards".
    pub prop: String,
    pub line: f64,
    /// Sport or category tag used to group combination legs.
    pub sport: String,
    /// Scheduled-event identifier used for outcome lookups.
    pub event: String,
    /// Board moment-group the prop was listed under.
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
}

impl fmt::Display for PropCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} {} ({})",
            self.sport, self.player, self.prop, self.line, self.event,
        )
    }
}

impl PropCandidate {
    /// Helper to build a test candidate with sensible defaults.
    #[cfg(test)]
    pub fn sample(sport: &str, player: &str) -> Self {
        PropCandidate {
            player: player.to_string(),
            prop: "Points".to_string(),
            line: 20.5,
            sport: sport.to_string(),
            event: format!("evt-{}", player.to_lowercase().replace(' ', "-")),
            group: None,
            starts_at: None,
        }
    }
}

/// Recommended side of a prop line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Over,
    Under,
}

impl Direction {
    /// One-letter form used in leg descriptions ("O28.5").
    pub fn short(&self) -> char {
        match self {
            Direction::Over => 'O',
            Direction::Under => 'U',
        }
    }

    /// Whether an observed stat value beats the line in this direction.
    /// Landing exactly on the line counts as a hit both ways.
    pub fn hits(&self, line: f64, observed: f64) -> bool {
        match self {
            Direction::Over => observed >= line,
            Direction::Under => observed <= line,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Over => write!(f, "Over"),
            Direction::Under => write!(f, "Under"),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "over" | "o" | "more" | "higher" => Ok(Direction::Over),
            "under" | "u" | "less" | "lower" => Ok(Direction::Under),
            _ => Err(anyhow::anyhow!("Unknown recommendation: {s}")),
        }
    }
}

/// A candidate after the probability model has scored it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredProp {
    pub candidate: PropCandidate,
    pub direction: Direction,
    /// Win probability, strictly inside (0, 1).
    pub probability: f64,
}

// ---------------------------------------------------------------------------
// Settlement status
// ---------------------------------------------------------------------------

/// Settlement state of a pick or combination.
///
/// Transitions only go out of `Unsettled`; the other three are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PickStatus {
    Unsettled,
    Hit,
    Miss,
    /// Did not play: no qualifying result was available.
    Dnp,
}

impl PickStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PickStatus::Unsettled)
    }

    /// Apply a settlement outcome. Terminal states never change, so
    /// re-settling is a no-op.
    pub fn resolve(self, outcome: PickStatus) -> PickStatus {
        if self.is_terminal() {
            self
        } else {
            outcome
        }
    }

    /// Net bankroll effect of a pick with this status and stake.
    pub fn stake_delta(&self, stake: Decimal) -> Decimal {
        match self {
            PickStatus::Hit => stake,
            PickStatus::Miss => -stake,
            PickStatus::Dnp | PickStatus::Unsettled => Decimal::ZERO,
        }
    }
}

impl fmt::Display for PickStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Open picks show a blank cell.
            PickStatus::Unsettled => write!(f, ""),
            PickStatus::Hit => write!(f, "Hit"),
            PickStatus::Miss => write!(f, "Miss"),
            PickStatus::Dnp => write!(f, "DNP"),
        }
    }
}

impl std::str::FromStr for PickStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "unsettled" | "pending" | "open" => Ok(PickStatus::Unsettled),
            "hit" | "win" | "won" => Ok(PickStatus::Hit),
            "miss" | "loss" | "lost" => Ok(PickStatus::Miss),
            "dnp" | "void" | "cancelled" => Ok(PickStatus::Dnp),
            _ => Err(anyhow::anyhow!("Unknown pick status: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Picks and combinations
// ---------------------------------------------------------------------------

/// A single-leg recommendation for one calendar day.
///
/// Identity is `(date, sport, player, prop)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinglePick {
    pub date: NaiveDate,
    pub sport: String,
    pub player: String,
    pub prop: String,
    pub line: f64,
    pub direction: Direction,
    pub probability: f64,
    pub units: Decimal,
    pub stake: Decimal,
    pub status: PickStatus,
    pub event: String,
}

impl fmt::Display for SinglePick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {} | {:.0}% | {}u ${:.2}",
            self.date,
            self.sport,
            self.leg_description(),
            self.probability * 100.0,
            self.units,
            self.stake,
        )
    }
}

impl SinglePick {
    /// Description used as a combination leg, e.g. "LeBron James Points O28.5".
    pub fn leg_description(&self) -> String {
        format!(
            "{} {} {}{}",
            self.player,
            self.prop,
            self.direction.short(),
            self.line
        )
    }

    /// Same-day identity key (the date is implied by the collection slice).
    pub fn identity(&self) -> (&str, &str, &str) {
        (&self.sport, &self.player, &self.prop)
    }
}

/// A fixed-size group of legs from distinct categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Combination {
    pub date: NaiveDate,
    /// Combination kind name, e.g. "Parlay" or "Moonshot".
    pub kind: String,
    pub legs: Vec<String>,
    /// Sport of each leg, in leg order. Empty for rows written before the
    /// sports were recorded.
    pub sports: Vec<String>,
    /// Product of the leg probabilities.
    pub probability: f64,
    /// Capped payout multiplier, one decimal place.
    pub payout: Decimal,
    pub units: Decimal,
    pub stake: Decimal,
    pub status: PickStatus,
}

impl fmt::Display for Combination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} → {}× ({:.1}% win)",
            self.kind,
            self.legs.join("; "),
            self.payout,
            self.probability * 100.0,
        )
    }
}

// ---------------------------------------------------------------------------
// Bankroll, log and watchlist records
// ---------------------------------------------------------------------------

/// One point of the bankroll time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankrollEntry {
    pub date: NaiveDate,
    pub balance: Decimal,
}

/// Append-only audit row written for every persisted pick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub run_timestamp: DateTime<Utc>,
    pub pick_type: String,
    pub details: String,
    pub num_legs: usize,
    pub probability: f64,
    pub units: Decimal,
}

/// Status tracking for an in-doubt player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub date: NaiveDate,
    pub player: String,
    pub prop: String,
    pub event: String,
    pub status: String,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for PROPLINE.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("Invalid probability: {0} (must lie in [0, 1])")]
    InvalidProbability(f64),

    #[error("Invalid bankroll: ${0} (must not be negative)")]
    InvalidBankroll(Decimal),

    #[error("No outcome available for {player} {prop} ({event})")]
    OutcomeUnavailable {
        player: String,
        prop: String,
        event: String,
    },

    #[error("Schema mismatch in '{collection}': {detail}")]
    SchemaMismatch { collection: String, detail: String },

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Invalid record in '{collection}': {reason}")]
    InvalidRecord { collection: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl TrackerError {
    /// Whether the caller may simply retry the operation later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TrackerError::UpstreamUnavailable(_))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
