//! Strategy layer: probability scoring, unit staking and combinations.

pub mod combos;
pub mod model;
pub mod staking;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::types::{PickStatus, ScoredProp, SinglePick, TrackerError};
use staking::StakeSizer;

/// Turn scored props into the day's single-leg picks.
///
/// Stakes are sized against `bankroll`. A later duplicate of an
/// already-seen (sport, player, prop) identity is dropped, so each
/// identity has at most one pick per day.
pub fn build_picks(
    scored: Vec<ScoredProp>,
    sizer: &StakeSizer,
    bankroll: Decimal,
    date: NaiveDate,
) -> Result<Vec<SinglePick>, TrackerError> {
    let mut seen: HashSet<(String, String, String)> = HashSet::new();
    let mut picks = Vec::with_capacity(scored.len());

    for s in scored {
        let c = s.candidate;
        let key = (c.sport.clone(), c.player.clone(), c.prop.clone());
        if !seen.insert(key) {
            debug!(sport = %c.sport, player = %c.player, prop = %c.prop, "Duplicate prop dropped");
            continue;
        }

        let stake = sizer.stake(s.probability, bankroll)?;
        picks.push(SinglePick {
            date,
            sport: c.sport,
            player: c.player,
            prop: c.prop,
            line: c.line,
            direction: s.direction,
            probability: s.probability,
            units: stake.units,
            stake: stake.amount,
            status: PickStatus::Unsettled,
            event: c.event,
        });
    }

    info!(
        picks = picks.len(),
        bankroll = format!("${:.2}", bankroll),
        "Single-leg picks built"
    );
    Ok(picks)
}
