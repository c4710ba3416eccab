// 8.1 auctioneer/state.rs: the auctioneer struct. all round state lives here.

use super::results::{AuctioneerError, ClearingSeries};
use crate::aggregator::ExcessDemandAggregator;
use crate::config::AuctioneerConfig;
use crate::events::{Event, EventId, EventPayload};
use crate::market::TradedProperties;
use crate::message::QuoteMessage;
use crate::solver::EquilibriumSolver;
use crate::transfer::TransferGenerator;
use crate::types::{AgentId, PropertyId, Quote, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Which phase the next call to `act` runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClearingState {
    AwaitingBroadcast,
    AwaitingOrders,
}

impl ClearingState {
    pub fn next(self) -> Self {
        match self {
            ClearingState::AwaitingBroadcast => ClearingState::AwaitingOrders,
            ClearingState::AwaitingOrders => ClearingState::AwaitingBroadcast,
        }
    }
}

#[derive(Debug)]
pub struct Auctioneer {
    pub(super) id: AgentId,
    pub(super) config: AuctioneerConfig,
    pub(super) solver: EquilibriumSolver,
    pub(super) transfers: TransferGenerator,
    pub(super) properties: TradedProperties,
    pub(super) state: ClearingState,
    pub(super) participants: BTreeSet<AgentId>,
    pub(super) aggregator: ExcessDemandAggregator,
    pub(super) series: ClearingSeries,
    pub(super) events: Vec<Event>,
    pub(super) next_event_id: u64,
    pub(super) round: u64,
    pub(super) current_time: Timestamp,
}

impl Auctioneer {
    /// Fails on an invalid config or an empty / duplicated property set. Both
    /// are fatal: nothing can be cleared without them.
    pub fn new(
        id: AgentId,
        initial_quotes: impl IntoIterator<Item = (PropertyId, Quote)>,
        config: AuctioneerConfig,
    ) -> Result<Self, AuctioneerError> {
        config.validate()?;
        let properties = TradedProperties::new(initial_quotes)?;

        Ok(Self {
            id,
            solver: EquilibriumSolver::new(config.solver.clone()),
            transfers: TransferGenerator::new(id, config.minimum_transfer),
            config,
            properties,
            state: ClearingState::AwaitingBroadcast,
            participants: BTreeSet::new(),
            aggregator: ExcessDemandAggregator::new(),
            series: ClearingSeries::new(),
            events: Vec::new(),
            next_event_id: 1,
            round: 0,
            current_time: Timestamp(0),
        })
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn config(&self) -> &AuctioneerConfig {
        &self.config
    }

    pub fn state(&self) -> ClearingState {
        self.state
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    /// Number of order phases run so far, including empty ones.
    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn quotes(&self) -> &TradedProperties {
        &self.properties
    }

    pub fn quote(&self, property: PropertyId) -> Option<Quote> {
        self.properties.quote(property)
    }

    pub fn series(&self) -> &ClearingSeries {
        &self.series
    }

    pub fn pending_orders(&self) -> usize {
        self.aggregator.len()
    }

    pub fn register_participant(&mut self, agent: AgentId) -> bool {
        self.participants.insert(agent)
    }

    pub fn remove_participant(&mut self, agent: AgentId) -> bool {
        self.participants.remove(&agent)
    }

    pub fn participants(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.participants.iter().copied()
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    // one message per participant, ascending agent id
    pub(super) fn quote_messages(&self, sent_at: Timestamp) -> Vec<QuoteMessage> {
        let quotes: Vec<(PropertyId, Quote)> = self.properties.iter().collect();
        self.participants
            .iter()
            .map(|recipient| QuoteMessage {
                sender: self.id,
                recipient: *recipient,
                sent_at,
                quotes: quotes.clone(),
            })
            .collect()
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        let event = Event::new(EventId(self.next_event_id), self.current_time, payload);
        self.next_event_id += 1;

        if self.config.verbose {
            debug!(id = event.id.0, payload = ?event.payload, "event");
        }

        self.events.push(event);

        if self.events.len() > self.config.max_events {
            let drain_count = self.events.len() - self.config.max_events;
            self.events.drain(0..drain_count);
        }
    }
}
