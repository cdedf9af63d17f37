//! Probability model.
//!
//! Assigns a recommended direction and a win probability to each board
//! candidate. The shipped `UniformModel` is a seeded stub; anything that
//! implements `ProbabilityModel` can replace it.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::config::ModelConfig;
use crate::types::{Direction, PropCandidate, ScoredProp, TrackerError};

/// Scores prop candidates.
///
/// Implementations must be deterministic for a fixed input and seed, return
/// one score per candidate in input order, and only produce probabilities
/// strictly inside (0, 1).
#[cfg_attr(test, mockall::automock)]
pub trait ProbabilityModel: Send + Sync {
    fn score(&self, candidates: &[PropCandidate]) -> Result<Vec<ScoredProp>, TrackerError>;
}

/// Check a model's output against the scoring contract.
pub fn validate_scores(
    candidates: &[PropCandidate],
    scored: Vec<ScoredProp>,
) -> Result<Vec<ScoredProp>, TrackerError> {
    if scored.len() != candidates.len() {
        return Err(TrackerError::Config(format!(
            "model returned {} scores for {} candidates",
            scored.len(),
            candidates.len()
        )));
    }
    for s in &scored {
        if !s.probability.is_finite() || s.probability <= 0.0 || s.probability >= 1.0 {
            return Err(TrackerError::InvalidProbability(s.probability));
        }
    }
    Ok(scored)
}

/// Uniform-random stub: every prop is an "Over" with a probability drawn
/// from `[min_probability, max_probability]` and rounded to two decimals.
#[derive(Debug, Clone)]
pub struct UniformModel {
    seed: u64,
    min: f64,
    max: f64,
}

impl UniformModel {
    pub fn new(config: &ModelConfig) -> Result<Self, TrackerError> {
        let (min, max) = (config.min_probability, config.max_probability);
        for p in [min, max] {
            if !p.is_finite() || p <= 0.0 || p >= 1.0 {
                return Err(TrackerError::InvalidProbability(p));
            }
        }
        if min > max {
            return Err(TrackerError::Config(format!(
                "model range is empty: min {min} > max {max}"
            )));
        }
        Ok(Self { seed: config.seed, min, max })
    }
}

impl ProbabilityModel for UniformModel {
    fn score(&self, candidates: &[PropCandidate]) -> Result<Vec<ScoredProp>, TrackerError> {
        let mut rng = StdRng::seed_from_u64(self.seed);

        let scored = candidates
            .iter()
            .map(|c| {
                let draw: f64 = rng.gen_range(self.min..=self.max);
                let probability = (draw * 100.0).round() / 100.0;
                debug!(player = %c.player, prop = %c.prop, probability, "Scored candidate");
                ScoredProp {
                    candidate: c.clone(),
                    direction: Direction::Over,
                    probability,
                }
            })
            .collect();

        validate_scores(candidates, scored)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
