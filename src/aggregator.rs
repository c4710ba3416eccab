//! Per-round collection of excess demand functions.
//!
//! Orders are keyed by sender so a second order from the same agent in the same
//! round replaces the first. Every order is checked against the registered
//! properties when it arrives; a malformed one never reaches the solver.

use crate::demand::{DemandVector, ExcessDemand, PriceVector};
use crate::market::TradedProperties;
use crate::message::Order;
use crate::types::{AgentId, PropertyId};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderRejection {
    #[error("order from {agent} references unregistered {property}")]
    UnknownProperty { agent: AgentId, property: PropertyId },

    #[error("order from {agent} has non-finite excess demand for {property}")]
    NonFiniteDemand { agent: AgentId, property: PropertyId },
}

impl OrderRejection {
    pub fn agent(&self) -> AgentId {
        match self {
            OrderRejection::UnknownProperty { agent, .. } => *agent,
            OrderRejection::NonFiniteDemand { agent, .. } => *agent,
        }
    }
}

#[derive(Default)]
pub struct ExcessDemandAggregator {
    orders: BTreeMap<AgentId, Box<dyn ExcessDemand>>,
}

impl ExcessDemandAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `order` at the current quotes and store it. Returns whether an
    /// earlier order from the same sender was replaced.
    pub fn submit(
        &mut self,
        order: Order,
        properties: &TradedProperties,
    ) -> Result<bool, OrderRejection> {
        let quotes = properties.price_vector();
        for (property, ed) in order.demand.excess_demand(&quotes) {
            if !properties.contains(property) {
                return Err(OrderRejection::UnknownProperty {
                    agent: order.sender,
                    property,
                });
            }
            if !ed.is_finite() {
                return Err(OrderRejection::NonFiniteDemand {
                    agent: order.sender,
                    property,
                });
            }
        }

        Ok(self.orders.insert(order.sender, order.demand).is_some())
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn contains(&self, agent: AgentId) -> bool {
        self.orders.contains_key(&agent)
    }

    /// Drop everything collected so far. Returns how many orders were discarded.
    pub fn clear(&mut self) -> usize {
        let discarded = self.orders.len();
        self.orders.clear();
        discarded
    }

    /// Hand the whole round over to the caller, leaving the aggregator empty.
    pub fn take_round(&mut self) -> RoundOrders {
        RoundOrders {
            orders: std::mem::take(&mut self.orders),
        }
    }
}

impl fmt::Debug for ExcessDemandAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExcessDemandAggregator")
            .field("senders", &self.orders.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// The orders of one clearing round, in ascending agent order.
pub struct RoundOrders {
    orders: BTreeMap<AgentId, Box<dyn ExcessDemand>>,
}

impl RoundOrders {
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn agents(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.orders.keys().copied()
    }

    pub fn demands(&self) -> Vec<&dyn ExcessDemand> {
        self.orders.values().map(|d| d.as_ref()).collect()
    }

    /// Every agent's excess demand at `prices`.
    pub fn realized(&self, prices: &PriceVector) -> BTreeMap<AgentId, DemandVector> {
        self.orders
            .iter()
            .map(|(agent, demand)| (*agent, demand.excess_demand(prices)))
            .collect()
    }
}
