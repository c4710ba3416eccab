// 4.0 message.rs: everything that crosses the boundary to the simulation kernel.
// one closed enum, matched exhaustively where orders are picked out of the inbox.

use crate::demand::ExcessDemand;
use crate::transfer::TransferInstruction;
use crate::types::{AgentId, PropertyId, Quote, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An agent's excess demand function for the current round.
pub struct Order {
    pub sender: AgentId,
    pub demand: Box<dyn ExcessDemand>,
}

impl Order {
    pub fn new(sender: AgentId, demand: impl ExcessDemand + 'static) -> Self {
        Self {
            sender,
            demand: Box::new(demand),
        }
    }
}

impl fmt::Debug for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Order")
            .field("sender", &self.sender)
            .finish_non_exhaustive()
    }
}

/// Current quote of every traded property, sent to one participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteMessage {
    pub sender: AgentId,
    pub recipient: AgentId,
    pub sent_at: Timestamp,
    // registration order
    pub quotes: Vec<(PropertyId, Quote)>,
}

impl QuoteMessage {
    pub fn quote(&self, property: PropertyId) -> Option<Quote> {
        self.quotes
            .iter()
            .find(|(p, _)| *p == property)
            .map(|(_, q)| *q)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Order,
    Quote,
    Transfer,
}

#[derive(Debug)]
pub enum Message {
    Order(Order),
    Quote(QuoteMessage),
    Transfer(TransferInstruction),
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Order(_) => MessageKind::Order,
            Message::Quote(_) => MessageKind::Quote,
            Message::Transfer(_) => MessageKind::Transfer,
        }
    }

    pub fn sender(&self) -> AgentId {
        match self {
            Message::Order(order) => order.sender,
            Message::Quote(quote) => quote.sender,
            Message::Transfer(transfer) => transfer.issuer,
        }
    }
}

impl From<Order> for Message {
    fn from(order: Order) -> Self {
        Message::Order(order)
    }
}
