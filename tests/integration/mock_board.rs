//! Mock board provider and fixed model for integration testing.
//!
//! Provides a deterministic `BoardProvider` whose props, outcomes and
//! failures are all controllable from test code, plus a `FixedModel` that
//! hands out a known probability per prop. Clones share state, so a test
//! can keep a handle after boxing one into the pipeline.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use propline::platforms::BoardProvider;
use propline::strategy::model::ProbabilityModel;
use propline::types::{Direction, PropCandidate, ScoredProp, TrackerError};

/// A mock board for deterministic testing.
#[derive(Clone)]
pub struct MockBoard {
    props: Arc<Mutex<Vec<PropCandidate>>>,
    outcomes: Arc<Mutex<HashMap<String, f64>>>,
    /// Players whose outcome lookups fail.
    failing_lookups: Arc<Mutex<HashSet<String>>>,
    /// If set, lookups sleep this long before answering.
    lookup_delay: Arc<Mutex<Option<Duration>>>,
    /// If set, board fetches return this error.
    force_error: Arc<Mutex<Option<String>>>,
    lookups: Arc<Mutex<usize>>,
}

impl MockBoard {
    pub fn new(props: Vec<PropCandidate>) -> Self {
        Self {
            props: Arc::new(Mutex::new(props)),
            outcomes: Arc::new(Mutex::new(HashMap::new())),
            failing_lookups: Arc::new(Mutex::new(HashSet::new())),
            lookup_delay: Arc::new(Mutex::new(None)),
            force_error: Arc::new(Mutex::new(None)),
            lookups: Arc::new(Mutex::new(0)),
        }
    }

    /// One prop per sport, line 10.5, in the given order.
    pub fn one_per_sport(sports: &[&str]) -> Self {
        let props = sports
            .iter()
            .map(|sport| make_prop(sport, &format!("{sport} Player"), 10.5))
            .collect();
        Self::new(props)
    }

    pub fn set_outcome(&self, player: &str, value: f64) {
        self.outcomes.lock().unwrap().insert(player.to_string(), value);
    }

    pub fn fail_lookup(&self, player: &str) {
        self.failing_lookups.lock().unwrap().insert(player.to_string());
    }

    pub fn clear_lookup_failures(&self) {
        self.failing_lookups.lock().unwrap().clear();
    }

    pub fn set_lookup_delay(&self, delay: Duration) {
        *self.lookup_delay.lock().unwrap() = Some(delay);
    }

    /// Force all subsequent board fetches to return an error.
    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn clear_error(&self) {
        *self.force_error.lock().unwrap() = None;
    }

    pub fn lookup_count(&self) -> usize {
        *self.lookups.lock().unwrap()
    }
}

#[async_trait]
impl BoardProvider for MockBoard {
    async fn fetch_board(&self) -> Result<Vec<PropCandidate>> {
        if let Some(err) = self.force_error.lock().unwrap().as_ref() {
            return Err(anyhow!("{}", err));
        }
        Ok(self.props.lock().unwrap().clone())
    }

    async fn fetch_balance(&self) -> Result<Decimal> {
        Ok(Decimal::new(4250, 2))
    }

    async fn lookup_outcome(&self, player: &str, prop: &str, event: &str) -> Result<Option<f64>> {
        *self.lookups.lock().unwrap() += 1;

        let delay = *self.lookup_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing_lookups.lock().unwrap().contains(player) {
            return Err(anyhow!("stats service unavailable for {player}"));
        }
        if player == "Scratched Player" {
            return Err(TrackerError::OutcomeUnavailable {
                player: player.to_string(),
                prop: prop.to_string(),
                event: event.to_string(),
            }
            .into());
        }
        Ok(self.outcomes.lock().unwrap().get(player).copied())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Build a prop with a predictable event id.
pub fn make_prop(sport: &str, player: &str, line: f64) -> PropCandidate {
    PropCandidate {
        player: player.to_string(),
        prop: "Points".to_string(),
        line,
        sport: sport.to_string(),
        event: format!("evt-{}", player.to_lowercase().replace(' ', "-")),
        group: None,
        starts_at: None,
    }
}

/// Scores props with a fixed probability list, in board order, all Over.
/// Runs past the end of the list reuse its last value.
pub struct FixedModel {
    probabilities: Vec<f64>,
}

impl FixedModel {
    pub fn new(probabilities: Vec<f64>) -> Self {
        Self { probabilities }
    }
}

impl ProbabilityModel for FixedModel {
    fn score(&self, candidates: &[PropCandidate]) -> Result<Vec<ScoredProp>, TrackerError> {
        let fallback = self.probabilities.last().copied().unwrap_or(0.7);
        Ok(candidates
            .iter()
            .enumerate()
            .map(|(i, c)| ScoredProp {
                candidate: c.clone(),
                direction: Direction::Over,
                probability: self.probabilities.get(i).copied().unwrap_or(fallback),
            })
            .collect())
    }
}
