//! Pipeline orchestrator.
//!
//! `generate` turns the live board into the day's picks and combinations;
//! `settle` grades them and moves the bankroll. Both replace whatever the
//! previous run wrote for the same date, so either can be re-run freely.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::{info, warn};

use super::bankroll::BankrollLedger;
use super::settlement::{SettlementEngine, SettlementReport};
use crate::config::AppConfig;
use crate::platforms::BoardProvider;
use crate::storage::{Record, TabularStore};
use crate::strategy::combos::CombinationEngine;
use crate::strategy::model::{validate_scores, ProbabilityModel};
use crate::strategy::staking::StakeSizer;
use crate::strategy::build_picks;
use crate::types::{
    BankrollEntry, Combination, LogEntry, PropCandidate, SinglePick, TrackerError,
    WatchlistEntry,
};

/// Props shown in the diagnostics board sample.
const DIAGNOSTIC_SAMPLE: usize = 3;

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Summary of one `generate` run.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateReport {
    pub date: NaiveDate,
    pub board_size: usize,
    /// Candidates dropped for a blank field or a non-finite line.
    pub rejected: usize,
    pub picks: Vec<SinglePick>,
    pub combinations: Vec<Combination>,
    /// Bankroll the stakes were sized against.
    pub bankroll: Decimal,
}

/// External account and board health, for the CLI.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    pub provider: String,
    pub external_balance: Result<Decimal, String>,
    pub board_size: Result<usize, String>,
    pub board_sample: Vec<PropCandidate>,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline {
    config: AppConfig,
    store: Box<dyn TabularStore>,
    board: Box<dyn BoardProvider>,
    model: Box<dyn ProbabilityModel>,
    sizer: StakeSizer,
    combos: CombinationEngine,
    settlement: SettlementEngine,
}

impl Pipeline {
    pub fn new(
        config: AppConfig,
        store: Box<dyn TabularStore>,
        board: Box<dyn BoardProvider>,
        model: Box<dyn ProbabilityModel>,
    ) -> Result<Self> {
        let sizer = StakeSizer::new(&config.staking).context("Invalid staking configuration")?;
        let combos = CombinationEngine::new(config.combos.kinds.clone())
            .context("Invalid combination configuration")?;
        let settlement = SettlementEngine::new(&config.settlement, &config.store);

        Ok(Self {
            config,
            store,
            board,
            model,
            sizer,
            combos,
            settlement,
        })
    }

    pub fn store(&self) -> &dyn TabularStore {
        self.store.as_ref()
    }

    pub fn provider_name(&self) -> &str {
        self.board.name()
    }

    /// Make every collection carry its current header.
    pub fn ensure_schemas(&mut self) -> Result<()> {
        let tabs = &self.config.store;
        let schemas: [(&str, &[&str]); 5] = [
            (tabs.daily_tab.as_str(), SinglePick::HEADER),
            (tabs.multi_tab.as_str(), Combination::HEADER),
            (tabs.log_tab.as_str(), LogEntry::HEADER),
            (tabs.bankroll_tab.as_str(), BankrollEntry::HEADER),
            (tabs.watchlist_tab.as_str(), WatchlistEntry::HEADER),
        ];
        for (collection, header) in schemas {
            self.store
                .ensure_schema(collection, header)
                .with_context(|| format!("Failed to prepare '{collection}'"))?;
        }
        Ok(())
    }

    /// Canonical spelling of a board sport tag.
    pub fn normalise_sport(&self, tag: &str) -> String {
        let tag = tag.trim();
        if let Some(known) = self
            .config
            .tracker
            .sports
            .iter()
            .find(|s| s.eq_ignore_ascii_case(tag))
        {
            return known.clone();
        }
        title_case(tag)
    }

    /// Latest bankroll on or before `date`, else the configured seed.
    pub fn current_balance(&self, date: NaiveDate) -> Result<Decimal> {
        let ledger = BankrollLedger::load(
            self.store.as_ref(),
            &self.config.store.bankroll_tab,
            self.config.tracker.seed_balance,
        )?;
        Ok(ledger.current_balance(date))
    }

    async fn fetch_board(&self) -> Result<Vec<PropCandidate>, TrackerError> {
        let limit = Duration::from_secs(self.config.board.fetch_timeout_secs);
        match tokio::time::timeout(limit, self.board.fetch_board()).await {
            Ok(Ok(board)) => Ok(board),
            Ok(Err(e)) => Err(TrackerError::UpstreamUnavailable(format!(
                "{}: {e:#}",
                self.board.name()
            ))),
            Err(_) => Err(TrackerError::UpstreamUnavailable(format!(
                "{}: board fetch timed out after {}s",
                self.board.name(),
                limit.as_secs()
            ))),
        }
    }

    /// Normalise sports and drop candidates that cannot become picks.
    fn prepare(&self, board: Vec<PropCandidate>) -> (Vec<PropCandidate>, usize) {
        let total = board.len();
        let kept: Vec<PropCandidate> = board
            .into_iter()
            .filter_map(|mut c| {
                c.sport = self.normalise_sport(&c.sport);
                c.player = c.player.trim().to_string();
                c.prop = c.prop.trim().to_string();
                if c.sport.is_empty() || c.player.is_empty() || c.prop.is_empty() || !c.line.is_finite() {
                    warn!(candidate = %c, "Dropping incomplete board entry");
                    return None;
                }
                Some(c)
            })
            .collect();
        let rejected = total - kept.len();
        (kept, rejected)
    }

    /// Build and persist the picks and combinations for `date`.
    pub async fn generate(&mut self, date: NaiveDate) -> Result<GenerateReport> {
        self.ensure_schemas()?;

        let board = self.fetch_board().await?;
        let board_size = board.len();
        let (candidates, rejected) = self.prepare(board);

        let scored = validate_scores(&candidates, self.model.score(&candidates)?)?;
        let bankroll = self.current_balance(date)?;
        let picks = build_picks(scored, &self.sizer, bankroll, date)?;

        let combinations = if self.config.combos.enabled {
            self.combos.build_all(&picks, &self.sizer, bankroll, date)?
        } else {
            Vec::new()
        };

        let tabs = self.config.store.clone();
        self.store
            .replace_for_date(tabs.daily_tab.as_str(), date, picks.iter().map(Record::to_row).collect())
            .context("Failed to write single picks")?;
        // Also runs with combinations off, clearing any left by an earlier run.
        self.store
            .replace_for_date(
                &tabs.multi_tab,
                date,
                combinations.iter().map(Record::to_row).collect(),
            )
            .context("Failed to write combinations")?;

        let run_timestamp = Utc::now();
        for entry in log_entries(&picks, &combinations, run_timestamp) {
            self.store
                .append(tabs.log_tab.as_str(), entry.to_row())
                .context("Failed to append log row")?;
        }

        info!(
            date = %date,
            provider = self.board.name(),
            board = board_size,
            rejected,
            picks = picks.len(),
            combinations = combinations.len(),
            bankroll = format!("${:.2}", bankroll),
            "Picks generated"
        );

        Ok(GenerateReport {
            date,
            board_size,
            rejected,
            picks,
            combinations,
            bankroll,
        })
    }

    /// Settle `date` and set its bankroll row.
    pub async fn settle(&mut self, date: NaiveDate) -> Result<SettlementReport> {
        self.ensure_schemas()?;

        let mut report = self
            .settlement
            .settle_day(self.store.as_mut(), self.board.as_ref(), date)
            .await?;

        let tab = &self.config.store.bankroll_tab;
        let mut ledger =
            BankrollLedger::load(self.store.as_ref(), tab, self.config.tracker.seed_balance)?;
        let update = ledger.advance(date, report.delta);
        ledger
            .persist(self.store.as_mut(), tab, &update)
            .context("Failed to write bankroll")?;

        report.balance_before = update.before;
        report.balance_after = update.after;

        if report.needs_retry() {
            warn!(
                date = %date,
                pending = report.pending,
                lookup_failures = report.lookup_failures,
                "Some picks are still open; run settle again later"
            );
        }
        Ok(report)
    }

    pub async fn diagnostics(&self) -> Diagnostics {
        let limit = Duration::from_secs(self.config.board.fetch_timeout_secs);

        let external_balance = match tokio::time::timeout(limit, self.board.fetch_balance()).await {
            Ok(Ok(balance)) => Ok(balance),
            Ok(Err(e)) => Err(format!("{e:#}")),
            Err(_) => Err(format!("timed out after {}s", limit.as_secs())),
        };

        let (board_size, board_sample) = match self.fetch_board().await {
            Ok(board) => {
                let sample = board.iter().take(DIAGNOSTIC_SAMPLE).cloned().collect();
                (Ok(board.len()), sample)
            }
            Err(e) => (Err(e.to_string()), Vec::new()),
        };

        Diagnostics {
            provider: self.board.name().to_string(),
            external_balance,
            board_size,
            board_sample,
        }
    }
}

/// Audit rows for one generate run: singles first, then combinations.
fn log_entries(
    picks: &[SinglePick],
    combinations: &[Combination],
    run_timestamp: chrono::DateTime<Utc>,
) -> Vec<LogEntry> {
    let singles = picks.iter().map(|p| LogEntry {
        run_timestamp,
        pick_type: "Single".to_string(),
        details: format!("{} | {}", p.sport, p.leg_description()),
        num_legs: 1,
        probability: p.probability,
        units: p.units,
    });
    let combos = combinations.iter().map(|c| LogEntry {
        run_timestamp,
        pick_type: c.kind.clone(),
        details: c.legs.join(crate::storage::records::LEG_SEPARATOR),
        num_legs: c.legs.len(),
        probability: c.probability,
        units: c.units,
    });
    singles.chain(combos).collect()
}

fn title_case(tag: &str) -> String {
    tag.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
