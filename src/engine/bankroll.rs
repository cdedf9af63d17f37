//! Bankroll ledger.
//!
//! One balance per calendar day. A day's balance is always recomputed from
//! the balance before it plus that day's settled delta, so advancing the
//! same day twice lands on the same number.

use anyhow::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Unbounded};
use tracing::info;

use crate::storage::records::load;
use crate::storage::{Record, TabularStore};
use crate::types::BankrollEntry;

/// Balance movement for one advance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BankrollUpdate {
    pub date: NaiveDate,
    pub before: Decimal,
    pub after: Decimal,
}

/// In-memory view of the bankroll time series.
pub struct BankrollLedger {
    seed: Decimal,
    entries: BTreeMap<NaiveDate, Decimal>,
}

impl BankrollLedger {
    pub fn new(seed: Decimal, entries: impl IntoIterator<Item = BankrollEntry>) -> Self {
        // A later row for the same day wins.
        let entries = entries.into_iter().map(|e| (e.date, e.balance)).collect();
        Self { seed, entries }
    }

    pub fn load(store: &dyn TabularStore, collection: &str, seed: Decimal) -> Result<Self> {
        let entries: Vec<BankrollEntry> = load(store, collection)?;
        Ok(Self::new(seed, entries))
    }

    /// Latest balance on or before `date`, else the seed.
    pub fn current_balance(&self, date: NaiveDate) -> Decimal {
        self.entries
            .range(..=date)
            .next_back()
            .map(|(_, balance)| *balance)
            .unwrap_or(self.seed)
    }

    /// Latest balance strictly before `date`, else the seed.
    pub fn balance_before(&self, date: NaiveDate) -> Decimal {
        self.entries
            .range(..date)
            .next_back()
            .map(|(_, balance)| *balance)
            .unwrap_or(self.seed)
    }

    /// Set the balance for `date` to the prior balance plus `delta`.
    ///
    /// Rows after `date` were built on its previous balance, so they move by
    /// the same amount and each keeps its own day's delta.
    pub fn advance(&mut self, date: NaiveDate, delta: Decimal) -> BankrollUpdate {
        let before = self.balance_before(date);
        let after = (before + delta).round_dp(2);
        let previous = self.entries.get(&date).copied().unwrap_or(before);
        self.entries.insert(date, after);

        let shift = after - previous;
        let mut rolled = 0;
        if !shift.is_zero() {
            for (_, balance) in self.entries.range_mut((Excluded(date), Unbounded)) {
                *balance += shift;
                rolled += 1;
            }
        }

        info!(
            date = %date,
            before = format!("${:.2}", before),
            after = format!("${:.2}", after),
            delta = format!("${:.2}", delta),
            rolled_forward = rolled,
            "Bankroll advanced"
        );

        BankrollUpdate { date, before, after }
    }

    /// Write the row for `update.date` and every later row, replacing what
    /// was stored for those days.
    pub fn persist(
        &self,
        store: &mut dyn TabularStore,
        collection: &str,
        update: &BankrollUpdate,
    ) -> Result<()> {
        for (date, balance) in self.entries.range(update.date..) {
            let entry = BankrollEntry {
                date: *date,
                balance: *balance,
            };
            store.replace_for_date(collection, *date, vec![entry.to_row()])?;
        }
        Ok(())
    }

    pub fn entries(&self) -> impl Iterator<Item = BankrollEntry> + '_ {
        self.entries
            .iter()
            .map(|(date, balance)| BankrollEntry { date: *date, balance: *balance })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
