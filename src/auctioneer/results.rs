// 8.0.2: result types and errors for auctioneer operations.

use crate::config::ConfigError;
use crate::market::MarketError;
use crate::message::{Message, QuoteMessage};
use crate::solver::SolverStatus;
use crate::transfer::TransferInstruction;
use crate::types::{Price, PropertyId, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AuctioneerError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Market error: {0}")]
    Market(#[from] MarketError),
}

/// Everything one call to `act` hands back to the scheduler.
#[derive(Debug, Clone)]
pub struct StepOutput {
    /// When the auctioneer wants to be invoked next.
    pub next: Timestamp,
    pub quotes: Vec<QuoteMessage>,
    pub transfers: Vec<TransferInstruction>,
    /// Present only when the solver ran this step.
    pub clearing: Option<ClearingRecord>,
}

impl StepOutput {
    pub fn is_clearing(&self) -> bool {
        self.clearing.is_some()
    }

    /// Outgoing messages, quotes first.
    pub fn into_messages(self) -> Vec<Message> {
        self.quotes
            .into_iter()
            .map(Message::Quote)
            .chain(self.transfers.into_iter().map(Message::Transfer))
            .collect()
    }
}

/// One solved round as written to the output series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClearingRecord {
    pub round: u64,
    pub time: Timestamp,
    /// Solved prices, registration order, at quote precision.
    pub prices: Vec<(PropertyId, Price)>,
    pub residual: f64,
    pub status: SolverStatus,
    pub iterations: usize,
    // false when the previous quotes were kept
    pub applied: bool,
}

impl ClearingRecord {
    pub fn price_of(&self, property: PropertyId) -> Option<Price> {
        self.prices
            .iter()
            .find(|(p, _)| *p == property)
            .map(|(_, price)| *price)
    }
}

/// Append-only (time, prices) series, one entry per round that actually cleared.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClearingSeries {
    records: Vec<ClearingRecord>,
}

impl ClearingSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, record: ClearingRecord) {
        debug_assert!(self.records.last().map_or(true, |last| last.time <= record.time));
        self.records.push(record);
    }

    pub fn records(&self) -> &[ClearingRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&ClearingRecord> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Price path of one property across all recorded rounds.
    pub fn prices_of(&self, property: PropertyId) -> Vec<(Timestamp, Price)> {
        self.records
            .iter()
            .filter_map(|r| r.price_of(property).map(|price| (r.time, price)))
            .collect()
    }
}
