//! Traded properties and their current quotes.
//!
//! The set of properties is fixed when the auctioneer is built. Quotes are
//! replaced every clearing round but keys are never added or removed, and
//! iteration always follows registration order.

use crate::demand::PriceVector;
use crate::types::{Price, PropertyId, Quote};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarketError {
    #[error("no traded properties configured")]
    Empty,

    #[error("property {0} registered twice")]
    DuplicateProperty(PropertyId),
}

/// Ordered map from property to its last published quote.
#[derive(Debug, Clone, PartialEq)]
pub struct TradedProperties {
    entries: Vec<(PropertyId, Quote)>,
}

impl TradedProperties {
    pub fn new(entries: impl IntoIterator<Item = (PropertyId, Quote)>) -> Result<Self, MarketError> {
        let mut collected: Vec<(PropertyId, Quote)> = Vec::new();
        for (property, quote) in entries {
            if collected.iter().any(|(p, _)| *p == property) {
                return Err(MarketError::DuplicateProperty(property));
            }
            collected.push((property, quote));
        }

        if collected.is_empty() {
            return Err(MarketError::Empty);
        }

        Ok(Self { entries: collected })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // construction rejects an empty set
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, property: PropertyId) -> bool {
        self.index_of(property).is_some()
    }

    pub fn index_of(&self, property: PropertyId) -> Option<usize> {
        self.entries.iter().position(|(p, _)| *p == property)
    }

    pub fn quote(&self, property: PropertyId) -> Option<Quote> {
        self.entries
            .iter()
            .find(|(p, _)| *p == property)
            .map(|(_, q)| *q)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PropertyId, Quote)> + '_ {
        self.entries.iter().copied()
    }

    pub fn properties(&self) -> impl Iterator<Item = PropertyId> + '_ {
        self.entries.iter().map(|(p, _)| *p)
    }

    pub fn prices(&self) -> Vec<(PropertyId, Price)> {
        self.entries.iter().map(|(p, q)| (*p, q.price())).collect()
    }

    /// Current quotes as the solver's starting point.
    pub fn price_vector(&self) -> PriceVector {
        PriceVector::new(self.entries.iter().map(|(p, q)| (*p, q.price().to_f64())))
    }

    /// Overwrite the quote of a registered property. Unknown properties are
    /// ignored so the key set can never grow.
    pub(crate) fn update(&mut self, property: PropertyId, quote: Quote) -> bool {
        match self.entries.iter_mut().find(|(p, _)| *p == property) {
            Some(entry) => {
                entry.1 = quote;
                true
            }
            None => false,
        }
    }
}
