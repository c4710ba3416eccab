// 11.0: every state change of the auctioneer produces an event. used for audit trails
// and for inspecting clearing quality after a run. EventPayload lists all event types.

use crate::message::MessageKind;
use crate::solver::SolverStatus;
use crate::transfer::Direction;
use crate::types::{AgentId, Price, PropertyId, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // Phase A
    QuotesBroadcast(QuotesBroadcastEvent),

    // Order intake
    OrderAccepted(OrderAcceptedEvent),
    OrderRejected(OrderRejectedEvent),
    MessageIgnored(MessageIgnoredEvent),

    // Phase B
    MarketCleared(MarketClearedEvent),
    ClearingSkipped(ClearingSkippedEvent),
    TransferIssued(TransferIssuedEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotesBroadcastEvent {
    pub recipients: usize,
    pub prices: Vec<(PropertyId, Price)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAcceptedEvent {
    pub agent: AgentId,
    // a previous order from the same agent this round was overwritten
    pub replaced: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRejectedEvent {
    pub agent: AgentId,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageIgnoredEvent {
    pub sender: AgentId,
    pub kind: MessageKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketClearedEvent {
    pub round: u64,
    pub orders: usize,
    pub prices: Vec<(PropertyId, Price)>,
    pub residual: f64,
    pub status: SolverStatus,
    pub iterations: usize,
    // false when the previous quotes were kept
    pub applied: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearingSkippedEvent {
    pub round: u64,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    NoOrders,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferIssuedEvent {
    pub round: u64,
    pub agent: AgentId,
    pub property: PropertyId,
    pub direction: Direction,
    pub quantity: u64,
}
