//! Combination engine: multi-sport parlays and moonshots.
//!
//! One representative pick is chosen per sport, then every K-sized set of
//! distinct sports becomes a combination. Sports are walked in
//! lexicographic order so the output is reproducible run to run.

use chrono::NaiveDate;
use itertools::Itertools;
use rust_decimal::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::staking::StakeSizer;
use crate::config::ComboKind;
use crate::types::{Combination, PickStatus, SinglePick, TrackerError};

/// Builds combinations for every configured kind.
pub struct CombinationEngine {
    kinds: Vec<ComboKind>,
}

impl CombinationEngine {
    pub fn new(kinds: Vec<ComboKind>) -> Result<Self, TrackerError> {
        for kind in &kinds {
            if kind.legs == 0 {
                return Err(TrackerError::Config(format!("{} has zero legs", kind.name)));
            }
            if kind.payout_cap <= Decimal::ZERO {
                return Err(TrackerError::Config(format!(
                    "{} payout cap must be positive",
                    kind.name
                )));
            }
        }
        Ok(Self { kinds })
    }

    pub fn kinds(&self) -> &[ComboKind] {
        &self.kinds
    }

    /// Best pick per sport: highest probability, earliest on a tie.
    pub fn representatives(picks: &[SinglePick]) -> BTreeMap<String, &SinglePick> {
        let mut reps: BTreeMap<String, &SinglePick> = BTreeMap::new();
        for pick in picks {
            let better = reps
                .get(&pick.sport)
                .map_or(true, |current| pick.probability > current.probability);
            if better {
                reps.insert(pick.sport.clone(), pick);
            }
        }
        reps
    }

    /// Every `legs`-sized selection of distinct sports, in lexicographic
    /// order. Fewer sports than legs yields nothing.
    pub fn enumerate<'a>(
        reps: &BTreeMap<String, &'a SinglePick>,
        legs: usize,
    ) -> Vec<Vec<&'a SinglePick>> {
        if legs == 0 || reps.len() < legs {
            return Vec::new();
        }
        reps.values().copied().combinations(legs).collect()
    }

    /// Product of leg probabilities (legs treated as independent).
    pub fn combined_probability(legs: &[&SinglePick]) -> f64 {
        legs.iter().map(|leg| leg.probability).product()
    }

    /// `min(cap, 1 / probability)` to one decimal place.
    pub fn payout(probability: f64, cap: Decimal) -> Result<Decimal, TrackerError> {
        if !probability.is_finite() || probability <= 0.0 || probability > 1.0 {
            return Err(TrackerError::InvalidProbability(probability));
        }
        let fair = Decimal::from_f64(1.0 / probability)
            .ok_or(TrackerError::InvalidProbability(probability))?;
        Ok(fair.min(cap).round_dp(1))
    }

    /// Build all combinations of one kind for a day's picks.
    pub fn build_kind(
        &self,
        kind: &ComboKind,
        picks: &[SinglePick],
        sizer: &StakeSizer,
        bankroll: Decimal,
        date: NaiveDate,
    ) -> Result<Vec<Combination>, TrackerError> {
        let reps = Self::representatives(picks);
        let sets = Self::enumerate(&reps, kind.legs);

        let mut combos = Vec::with_capacity(sets.len());
        for legs in sets {
            let probability = Self::combined_probability(&legs);
            let payout = Self::payout(probability, kind.payout_cap)?;
            let stake = sizer.stake(probability, bankroll)?;
            debug!(
                kind = %kind.name,
                probability = format!("{:.4}", probability),
                payout = %payout,
                "Combination built"
            );
            combos.push(Combination {
                date,
                kind: kind.name.clone(),
                legs: legs.iter().map(|leg| leg.leg_description()).collect(),
                sports: legs.iter().map(|leg| leg.sport.clone()).collect(),
                probability,
                payout,
                units: stake.units,
                stake: stake.amount,
                status: PickStatus::Unsettled,
            });
        }

        info!(
            kind = %kind.name,
            sports = reps.len(),
            legs = kind.legs,
            built = combos.len(),
            "Combinations generated"
        );
        Ok(combos)
    }

    /// Build every configured kind, kinds in configuration order.
    pub fn build_all(
        &self,
        picks: &[SinglePick],
        sizer: &StakeSizer,
        bankroll: Decimal,
        date: NaiveDate,
    ) -> Result<Vec<Combination>, TrackerError> {
        let mut all = Vec::new();
        for kind in &self.kinds {
            all.extend(self.build_kind(kind, picks, sizer, bankroll, date)?);
        }
        Ok(all)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
