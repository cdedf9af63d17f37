//! Static sample board.
//!
//! Five props across five sports, used when no session token is configured
//! so `generate` can still run end to end. Outcomes are whatever the caller
//! records with `with_outcome`; anything else reads as "no result".

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;

use super::BoardProvider;
use crate::types::PropCandidate;

const PROVIDER_NAME: &str = "sample";

const SAMPLE_PROPS: &[(&str, &str, f64, &str)] = &[
    ("Lionel Messi", "Goals", 1.5, "Soccer"),
    ("LeBron James", "Points", 28.5, "NBA"),
    ("Mookie Betts", "Hits", 1.5, "Baseball"),
    ("Patrick Mahomes", "Passing Yards", 275.5, "NFL"),
    ("Connor McDavid", "Assists", 1.5, "NHL"),
];

pub struct SampleBoard {
    props: Vec<PropCandidate>,
    outcomes: HashMap<(String, String), f64>,
    balance: Decimal,
}

impl Default for SampleBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleBoard {
    pub fn new() -> Self {
        let props = SAMPLE_PROPS
            .iter()
            .map(|(player, prop, line, sport)| PropCandidate {
                player: player.to_string(),
                prop: prop.to_string(),
                line: *line,
                sport: sport.to_string(),
                event: format!("sample-{}", player.to_lowercase().replace(' ', "-")),
                group: Some("Sample".to_string()),
                starts_at: None,
            })
            .collect();
        Self {
            props,
            outcomes: HashMap::new(),
            balance: Decimal::ZERO,
        }
    }

    /// Record a final stat value for a player's prop.
    pub fn with_outcome(mut self, player: &str, prop: &str, value: f64) -> Self {
        self.outcomes.insert((player.to_string(), prop.to_string()), value);
        self
    }
}

#[async_trait]
impl BoardProvider for SampleBoard {
    async fn fetch_board(&self) -> Result<Vec<PropCandidate>> {
        Ok(self.props.clone())
    }

    async fn fetch_balance(&self) -> Result<Decimal> {
        Ok(self.balance)
    }

    async fn lookup_outcome(&self, player: &str, prop: &str, _event: &str) -> Result<Option<f64>> {
        Ok(self
            .outcomes
            .get(&(player.to_string(), prop.to_string()))
            .copied())
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }
}
