//! Core engine: the generate → settle → bankroll cycle.

pub mod bankroll;
pub mod pipeline;
pub mod settlement;

pub use pipeline::{Diagnostics, GenerateReport, Pipeline};
pub use settlement::SettlementReport;
