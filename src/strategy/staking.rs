//! Unit-based stake sizing.
//!
//! Maps a win probability onto a discrete unit size through a configurable
//! step table, then converts units into dollars at a fixed fraction of the
//! current bankroll.

use rust_decimal::prelude::*;
use tracing::debug;

use crate::config::{StakingConfig, UnitBand};
use crate::types::TrackerError;

/// Units and dollars for one recommendation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stake {
    pub units: Decimal,
    pub amount: Decimal,
}

pub struct StakeSizer {
    /// Sorted by `min_probability`, highest first.
    bands: Vec<UnitBand>,
    floor_units: Decimal,
    risk_fraction: Decimal,
}

impl StakeSizer {
    pub fn new(config: &StakingConfig) -> Result<Self, TrackerError> {
        if config.risk_fraction < Decimal::ZERO || config.risk_fraction > Decimal::ONE {
            return Err(TrackerError::Config(format!(
                "risk_fraction {} outside [0, 1]",
                config.risk_fraction
            )));
        }
        if config.floor_units < Decimal::ZERO {
            return Err(TrackerError::Config("floor_units must not be negative".into()));
        }
        for band in &config.bands {
            if !(0.0..=1.0).contains(&band.min_probability) {
                return Err(TrackerError::InvalidProbability(band.min_probability));
            }
            if band.units < Decimal::ZERO {
                return Err(TrackerError::Config(format!(
                    "band at {} has negative units",
                    band.min_probability
                )));
            }
        }

        let mut bands = config.bands.clone();
        bands.sort_by(|a, b| b.min_probability.total_cmp(&a.min_probability));

        Ok(Self {
            bands,
            floor_units: config.floor_units,
            risk_fraction: config.risk_fraction,
        })
    }

    pub fn risk_fraction(&self) -> Decimal {
        self.risk_fraction
    }

    /// Units for a probability: the first band whose threshold the
    /// probability reaches (thresholds are inclusive), else the floor.
    pub fn unit_size(&self, probability: f64) -> Result<Decimal, TrackerError> {
        if !(0.0..=1.0).contains(&probability) {
            // NaN fails the range check too.
            return Err(TrackerError::InvalidProbability(probability));
        }
        Ok(self
            .bands
            .iter()
            .find(|band| probability >= band.min_probability)
            .map(|band| band.units)
            .unwrap_or(self.floor_units))
    }

    /// Stake at the configured risk fraction.
    pub fn stake(&self, probability: f64, bankroll: Decimal) -> Result<Stake, TrackerError> {
        self.stake_with_fraction(probability, bankroll, self.risk_fraction)
    }

    /// `units × bankroll × risk_fraction`, rounded to cents.
    pub fn stake_with_fraction(
        &self,
        probability: f64,
        bankroll: Decimal,
        risk_fraction: Decimal,
    ) -> Result<Stake, TrackerError> {
        if bankroll < Decimal::ZERO {
            return Err(TrackerError::InvalidBankroll(bankroll));
        }
        let units = self.unit_size(probability)?;
        let amount = (units * bankroll * risk_fraction).round_dp(2).max(Decimal::ZERO);

        debug!(
            probability,
            units = %units,
            bankroll = %bankroll,
            amount = format!("${:.2}", amount),
            "Stake sized"
        );

        Ok(Stake { units, amount })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
