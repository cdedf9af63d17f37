//! Settlement engine.
//!
//! Grades a day's open picks against observed outcomes, writes each change
//! back as soon as it is known, then grades combinations from their legs.
//! The day's bankroll delta is recomputed from every settled row, so the
//! same day can be settled any number of times.

use anyhow::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{SettlementConfig, StoreConfig};
use crate::platforms::BoardProvider;
use crate::storage::records::{load_day, write_day, Stored};
use crate::storage::TabularStore;
use crate::types::{Combination, Direction, PickStatus, SinglePick, TrackerError};

// ---------------------------------------------------------------------------
// Grading
// ---------------------------------------------------------------------------

/// Grade one pick. No observed value means the player did not play.
pub fn grade(direction: Direction, line: f64, observed: Option<f64>) -> PickStatus {
    match observed {
        None => PickStatus::Dnp,
        Some(value) if direction.hits(line, value) => PickStatus::Hit,
        Some(_) => PickStatus::Miss,
    }
}

/// Key a leg by its sport and description.
pub fn leg_key(sport: &str, leg: &str) -> String {
    format!("{sport} | {leg}")
}

/// Grade a combination from the statuses of the day's single picks, keyed
/// as in `leg_keys`. A leg with no matching pick keeps it open.
pub fn grade_combination(legs: &[String], leg_status: &HashMap<String, PickStatus>) -> PickStatus {
    let mut statuses = Vec::with_capacity(legs.len());
    for leg in legs {
        match leg_status.get(leg) {
            Some(status) => statuses.push(*status),
            None => return PickStatus::Unsettled,
        }
    }

    if statuses.contains(&PickStatus::Miss) {
        PickStatus::Miss
    } else if !statuses.is_empty() && statuses.iter().all(|s| *s == PickStatus::Hit) {
        PickStatus::Hit
    } else if !statuses.is_empty() && statuses.iter().all(|s| s.is_terminal()) {
        PickStatus::Dnp
    } else {
        PickStatus::Unsettled
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// What a settlement run did for one date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettlementReport {
    pub date: Option<NaiveDate>,
    pub hits: usize,
    pub misses: usize,
    pub dnps: usize,
    /// Picks that were already terminal before this run.
    pub already_settled: usize,
    /// Picks still open after this run.
    pub pending: usize,
    /// Lookups that errored or timed out (picks left open).
    pub lookup_failures: usize,
    pub combos_settled: usize,
    pub combos_pending: usize,
    /// Net bankroll effect of every settled row dated `date`.
    pub delta: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
}

impl SettlementReport {
    /// Whether another run could still settle something.
    pub fn needs_retry(&self) -> bool {
        self.lookup_failures > 0 || self.pending > 0 || self.combos_pending > 0
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct SettlementEngine {
    lookup_timeout: Duration,
    settle_combinations: bool,
    daily_tab: String,
    multi_tab: String,
}

impl SettlementEngine {
    pub fn new(config: &SettlementConfig, store: &StoreConfig) -> Self {
        Self {
            lookup_timeout: Duration::from_secs(config.lookup_timeout_secs),
            settle_combinations: config.settle_combinations,
            daily_tab: store.daily_tab.clone(),
            multi_tab: store.multi_tab.clone(),
        }
    }

    /// Look a pick's outcome up, bounded by the lookup timeout.
    ///
    /// `Err` means "try again later". A provider reporting the outcome as
    /// unavailable grades the pick DNP.
    async fn lookup(&self, board: &dyn BoardProvider, pick: &SinglePick) -> Result<PickStatus> {
        let lookup = board.lookup_outcome(&pick.player, &pick.prop, &pick.event);
        match tokio::time::timeout(self.lookup_timeout, lookup).await {
            Ok(Ok(observed)) => Ok(grade(pick.direction, pick.line, observed)),
            Ok(Err(e)) => match e.downcast_ref::<TrackerError>() {
                Some(TrackerError::OutcomeUnavailable { .. }) => Ok(PickStatus::Dnp),
                _ => Err(e),
            },
            Err(_) => anyhow::bail!(
                "outcome lookup timed out after {}s",
                self.lookup_timeout.as_secs()
            ),
        }
    }

    /// Settle every open pick (and, if enabled, combination) dated `date`.
    ///
    /// The returned report carries the day's delta; balances are left at
    /// zero for the caller to fill in once the bankroll has moved.
    pub async fn settle_day(
        &self,
        store: &mut dyn TabularStore,
        board: &dyn BoardProvider,
        date: NaiveDate,
    ) -> Result<SettlementReport> {
        let mut report = SettlementReport {
            date: Some(date),
            ..Default::default()
        };

        let mut day: Vec<Stored<SinglePick>> = load_day(&*store, &self.daily_tab, date)?;

        for i in 0..day.len() {
            let Stored::Valid(pick) = &day[i] else {
                continue;
            };
            if pick.status.is_terminal() {
                report.already_settled += 1;
                continue;
            }

            let outcome = match self.lookup(board, pick).await {
                Ok(status) => status,
                Err(e) => {
                    warn!(
                        player = %pick.player,
                        prop = %pick.prop,
                        event = %pick.event,
                        error = %e,
                        "Outcome lookup failed, pick left open"
                    );
                    report.lookup_failures += 1;
                    report.pending += 1;
                    continue;
                }
            };

            if let Stored::Valid(pick) = &mut day[i] {
                pick.status = pick.status.resolve(outcome);
                match pick.status {
                    PickStatus::Hit => report.hits += 1,
                    PickStatus::Miss => report.misses += 1,
                    PickStatus::Dnp => report.dnps += 1,
                    PickStatus::Unsettled => report.pending += 1,
                }
                debug!(pick = %pick, status = %pick.status, "Pick settled");
            }
            write_day(store, &self.daily_tab, date, &day)?;
        }

        let picks: Vec<&SinglePick> = day
            .iter()
            .filter_map(|stored| match stored {
                Stored::Valid(pick) => Some(pick),
                Stored::Invalid(_) => None,
            })
            .collect();
        report.delta = picks.iter().map(|p| p.status.stake_delta(p.stake)).sum();

        if self.settle_combinations {
            let combo_delta = self.settle_combinations_for(store, &picks, date, &mut report)?;
            report.delta += combo_delta;
        }

        info!(
            date = %date,
            hits = report.hits,
            misses = report.misses,
            dnps = report.dnps,
            pending = report.pending,
            lookup_failures = report.lookup_failures,
            delta = format!("${:.2}", report.delta),
            "Settlement pass complete"
        );
        Ok(report)
    }

    /// Grade the day's open combinations and return their combined delta.
    fn settle_combinations_for(
        &self,
        store: &mut dyn TabularStore,
        picks: &[&SinglePick],
        date: NaiveDate,
        report: &mut SettlementReport,
    ) -> Result<Decimal> {
        // Combinations without recorded sports fall back to the bare
        // description, where the last pick of a shared description wins.
        let mut leg_status: HashMap<String, PickStatus> = HashMap::new();
        for pick in picks {
            let leg = pick.leg_description();
            leg_status.insert(leg_key(&pick.sport, &leg), pick.status);
            leg_status.insert(leg, pick.status);
        }

        let mut combos: Vec<Stored<Combination>> = load_day(&*store, &self.multi_tab, date)?;
        let mut changed = false;

        for stored in combos.iter_mut() {
            let Stored::Valid(combo) = stored else {
                continue;
            };
            if combo.status.is_terminal() {
                continue;
            }
            let status = grade_combination(&leg_keys(combo), &leg_status);
            if status.is_terminal() {
                combo.status = combo.status.resolve(status);
                report.combos_settled += 1;
                changed = true;
            } else {
                report.combos_pending += 1;
            }
        }

        if changed {
            write_day(store, &self.multi_tab, date, &combos)?;
        }

        Ok(combos
            .iter()
            .filter_map(|stored| match stored {
                Stored::Valid(combo) => Some(combo.status.stake_delta(combo.stake)),
                Stored::Invalid(_) => None,
            })
            .sum())
    }
}

/// Lookup keys for a combination's legs: sport-qualified when the sports
/// were recorded, the bare description otherwise.
fn leg_keys(combo: &Combination) -> Vec<String> {
    if combo.sports.len() == combo.legs.len() {
        combo
            .sports
            .iter()
            .zip(&combo.legs)
            .map(|(sport, leg)| leg_key(sport, leg))
            .collect()
    } else {
        combo.legs.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
