//! Board provider integrations.
//!
//! Defines the `BoardProvider` trait and provides implementations for:
//! - PrizePicks (GraphQL): live board, account balance, final stat lookups
//! - Sample board: the static five-sport board used without a session token

pub mod prizepicks;
pub mod sample;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::types::PropCandidate;

/// Abstraction over the upstream source of props and results.
///
/// Implementors own their transport concerns (timeouts, retries); the
/// engine only sees the data or an error.
#[async_trait]
pub trait BoardProvider: Send + Sync {
    /// Fetch every prop currently on the board.
    async fn fetch_board(&self) -> Result<Vec<PropCandidate>>;

    /// External account balance (diagnostics only, never the bankroll).
    async fn fetch_balance(&self) -> Result<Decimal>;

    /// Final observed stat value for a finished event.
    /// `Ok(None)` means no qualifying result (the player did not play).
    /// Events that have not finished should return an error instead.
    async fn lookup_outcome(&self, player: &str, prop: &str, event: &str) -> Result<Option<f64>>;

    /// Provider name for logging and identification.
    fn name(&self) -> &str;
}
