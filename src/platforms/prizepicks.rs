//! PrizePicks board integration.
//!
//! Talks to the PrizePicks GraphQL endpoint with a bearer session token.
//! Transient failures (HTTP 429, 5xx, transport errors) are retried with
//! exponential backoff; everything else fails immediately.
//!
//! Endpoint: `https://production.prizepicks.com/graphql`
//! Auth: `Authorization: Bearer {session}`

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, Secret};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::BoardProvider;
use crate::config::BoardConfig;
use crate::types::PropCandidate;

const PROVIDER_NAME: &str = "prizepicks";

const BOARD_QUERY: &str = r#"
query {
  momentGroups {
    id
    name
    props {
      id
      playerName
      statKey
      line
      sport { id name }
      startsAt
    }
  }
}"#;

const BALANCE_QUERY: &str = r#"
query {
  me {
    id
    balance { total_balance }
  }
}"#;

const OUTCOME_QUERY: &str = r#"
query($event: ID!, $player: String!, $stat: String!) {
  propOutcome(id: $event, playerName: $player, statKey: $stat) {
    final
    value
  }
}"#;

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct GraphqlRequest<'a> {
    query: &'a str,
    variables: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BoardData {
    #[serde(default)]
    moment_groups: Vec<MomentGroup>,
}

#[derive(Debug, Deserialize)]
struct MomentGroup {
    name: String,
    #[serde(default)]
    props: Vec<ApiProp>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiProp {
    id: String,
    player_name: String,
    stat_key: String,
    line: f64,
    sport: ApiSport,
    #[serde(default)]
    starts_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ApiSport {
    name: String,
}

#[derive(Debug, Deserialize)]
struct BalanceData {
    me: Me,
}

#[derive(Debug, Deserialize)]
struct Me {
    balance: Balance,
}

#[derive(Debug, Deserialize)]
struct Balance {
    total_balance: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OutcomeData {
    prop_outcome: Option<ApiOutcome>,
}

#[derive(Debug, Deserialize)]
struct ApiOutcome {
    #[serde(rename = "final", default)]
    is_final: bool,
    value: Option<f64>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// PrizePicks GraphQL client.
pub struct PrizePicksClient {
    http: Client,
    endpoint: String,
    session: Secret<String>,
    max_retries: u32,
    base_backoff_ms: u64,
}

impl PrizePicksClient {
    pub fn new(config: &BoardConfig, session: String) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("PROPLINE/0.1.0")
            .build()
            .context("Failed to build HTTP client for PrizePicks")?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            session: Secret::new(session),
            max_retries: config.max_retries,
            base_backoff_ms: config.base_backoff_ms,
        })
    }

    /// Delay before retry `attempt` (1-based): base × 2^(attempt-1).
    fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
        Duration::from_millis(base_ms.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1))))
    }

    /// POST a GraphQL query with retry + backoff and decode its `data`.
    async fn query<T: DeserializeOwned>(&self, query: &str, variables: serde_json::Value) -> Result<T> {
        let request = GraphqlRequest { query, variables };
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Self::backoff_delay(self.base_backoff_ms, attempt);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "Retrying PrizePicks request");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .http
                .post(&self.endpoint)
                .bearer_auth(self.session.expose_secret())
                .json(&request)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let body: GraphqlResponse<T> = response
                            .json()
                            .await
                            .context("Failed to parse PrizePicks response")?;
                        return Self::unwrap_data(body);
                    }

                    // Retryable: 429 (rate limit) and 5xx
                    if status.as_u16() == 429 || status.is_server_error() {
                        let error_text = response.text().await.unwrap_or_default();
                        warn!(status = %status, attempt, error = %error_text, "Retryable PrizePicks error");
                        last_error = Some(format!("HTTP {status}: {error_text}"));
                        continue;
                    }

                    let error_text = response.text().await.unwrap_or_default();
                    anyhow::bail!("PrizePicks API error {status}: {error_text}");
                }
                Err(e) => {
                    warn!(attempt, error = %e, "PrizePicks request failed");
                    last_error = Some(format!("Request error: {e}"));
                }
            }
        }

        anyhow::bail!(
            "PrizePicks API failed after {} retries: {}",
            self.max_retries,
            last_error.unwrap_or_default()
        )
    }

    fn unwrap_data<T>(body: GraphqlResponse<T>) -> Result<T> {
        if !body.errors.is_empty() {
            let messages: Vec<&str> = body.errors.iter().map(|e| e.message.as_str()).collect();
            anyhow::bail!("PrizePicks GraphQL errors: {}", messages.join("; "));
        }
        body.data.context("PrizePicks response has no data")
    }

    /// Flatten moment groups into candidates. The prop id doubles as the
    /// scheduled-event identifier for outcome lookups.
    fn board_to_candidates(data: BoardData) -> Vec<PropCandidate> {
        data.moment_groups
            .into_iter()
            .flat_map(|group| {
                let name = group.name;
                group.props.into_iter().map(move |p| PropCandidate {
                    player: p.player_name,
                    prop: p.stat_key,
                    line: p.line,
                    sport: p.sport.name,
                    event: p.id,
                    group: Some(name.clone()),
                    starts_at: p.starts_at,
                })
            })
            .collect()
    }

    /// A missing outcome or a final one without a value reads as "no result".
    /// Outcomes that are not final yet are an error so the pick stays open.
    fn outcome_value(data: OutcomeData) -> Result<Option<f64>> {
        match data.prop_outcome {
            None => Ok(None),
            Some(outcome) if !outcome.is_final => anyhow::bail!("Outcome not final yet"),
            Some(outcome) => Ok(outcome.value.filter(|v| v.is_finite())),
        }
    }
}

#[async_trait]
impl BoardProvider for PrizePicksClient {
    async fn fetch_board(&self) -> Result<Vec<PropCandidate>> {
        let data: BoardData = self.query(BOARD_QUERY, serde_json::json!({})).await?;
        let board = Self::board_to_candidates(data);
        info!(props = board.len(), "PrizePicks board fetched");
        Ok(board)
    }

    async fn fetch_balance(&self) -> Result<Decimal> {
        let data: BalanceData = self.query(BALANCE_QUERY, serde_json::json!({})).await?;
        Ok(data.me.balance.total_balance)
    }

    async fn lookup_outcome(&self, player: &str, prop: &str, event: &str) -> Result<Option<f64>> {
        let variables = serde_json::json!({ "event": event, "player": player, "stat": prop });
        let data: OutcomeData = self.query(OUTCOME_QUERY, variables).await?;
        Self::outcome_value(data)
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
