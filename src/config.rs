//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every section falls back to the reference defaults, so an empty file is a
//! valid configuration. Secrets (the board session token) are referenced by
//! env-var name and resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::fs;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub staking: StakingConfig,
    #[serde(default)]
    pub combos: CombosConfig,
    #[serde(default)]
    pub settlement: SettlementConfig,
    #[serde(default)]
    pub board: BoardConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TrackerConfig {
    pub name: String,
    /// Bankroll used when the bankroll series is empty.
    pub seed_balance: Decimal,
    pub currency: String,
    /// Canonical sport spellings; board tags matching one of these
    /// case-insensitively adopt its spelling, others are title-cased.
    pub sports: Vec<String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            name: "PROPLINE".to_string(),
            seed_balance: dec!(20.0),
            currency: "USD".to_string(),
            sports: ["Soccer", "NBA", "Baseball", "NFL", "NHL"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Collection (sheet tab) names and the backing file.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON workbook path. `None` keeps everything in memory.
    pub path: Option<String>,
    pub daily_tab: String,
    pub multi_tab: String,
    pub log_tab: String,
    pub bankroll_tab: String,
    pub watchlist_tab: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: Some("propline_workbook.json".to_string()),
            daily_tab: "Daily Picks".to_string(),
            multi_tab: "MultiSport Picks".to_string(),
            log_tab: "Log".to_string(),
            bankroll_tab: "Bankroll".to_string(),
            watchlist_tab: "Watchlist".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ModelConfig {
    /// RNG seed; identical seed and board give identical probabilities.
    pub seed: u64,
    pub min_probability: f64,
    pub max_probability: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            seed: 7,
            min_probability: 0.55,
            max_probability: 0.85,
        }
    }
}

/// One step of the probability → units table.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct UnitBand {
    /// Inclusive lower bound on win probability.
    pub min_probability: f64,
    pub units: Decimal,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StakingConfig {
    /// Fraction of bankroll risked by one unit.
    pub risk_fraction: Decimal,
    pub bands: Vec<UnitBand>,
    /// Units used when the probability is below every band.
    pub floor_units: Decimal,
}

impl Default for StakingConfig {
    fn default() -> Self {
        Self {
            risk_fraction: dec!(0.05),
            bands: vec![
                UnitBand { min_probability: 0.8, units: dec!(2) },
                UnitBand { min_probability: 0.7, units: dec!(1) },
                UnitBand { min_probability: 0.6, units: dec!(0.5) },
            ],
            floor_units: dec!(0.25),
        }
    }
}

/// A combination kind: how many legs and the payout cap.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ComboKind {
    pub name: String,
    pub legs: usize,
    pub payout_cap: Decimal,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CombosConfig {
    pub enabled: bool,
    pub kinds: Vec<ComboKind>,
}

impl Default for CombosConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            kinds: vec![
                ComboKind { name: "Parlay".to_string(), legs: 3, payout_cap: dec!(15) },
                ComboKind { name: "Moonshot".to_string(), legs: 4, payout_cap: dec!(25) },
            ],
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SettlementConfig {
    /// Grade combinations from their legs and count them in the bankroll.
    pub settle_combinations: bool,
    /// Upper bound on a single outcome lookup.
    pub lookup_timeout_secs: u64,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            settle_combinations: true,
            lookup_timeout_secs: 20,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BoardConfig {
    pub endpoint: String,
    /// Env var holding the session token. Unset → sample board.
    pub session_env: String,
    /// Per-request HTTP timeout.
    pub timeout_secs: u64,
    /// Upper bound on a whole board fetch, retries included.
    pub fetch_timeout_secs: u64,
    pub max_retries: u32,
    pub base_backoff_ms: u64,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://production.prizepicks.com/graphql".to_string(),
            session_env: "RL_SESSION".to_string(),
            timeout_secs: 30,
            fetch_timeout_secs: 120,
            max_retries: 3,
            base_backoff_ms: 500,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
