//! Inbound message handling.

use super::state::Auctioneer;
use crate::aggregator::OrderRejection;
use crate::events::{EventPayload, MessageIgnoredEvent, OrderAcceptedEvent, OrderRejectedEvent};
use crate::message::Message;
use tracing::{debug, warn};

impl Auctioneer {
    /// Hand one inbound message to the auctioneer.
    ///
    /// Orders are validated against the registered properties and stored for
    /// the next clearing phase; a rejected order is logged and returned as an
    /// error, the round carries on without it. Any other message kind is not
    /// addressed to the auctioneer and is ignored.
    pub fn deliver(&mut self, message: Message) -> Result<(), OrderRejection> {
        match message {
            Message::Order(order) => {
                let agent = order.sender;
                match self.aggregator.submit(order, &self.properties) {
                    Ok(replaced) => {
                        debug!(%agent, replaced, "order accepted");
                        self.emit_event(EventPayload::OrderAccepted(OrderAcceptedEvent {
                            agent,
                            replaced,
                        }));
                        Ok(())
                    }
                    Err(rejection) => {
                        warn!(%agent, %rejection, "order rejected");
                        self.emit_event(EventPayload::OrderRejected(OrderRejectedEvent {
                            agent,
                            reason: rejection.to_string(),
                        }));
                        Err(rejection)
                    }
                }
            }
            other @ (Message::Quote(_) | Message::Transfer(_)) => {
                let kind = other.kind();
                let sender = other.sender();
                debug!(%sender, ?kind, "message ignored");
                self.emit_event(EventPayload::MessageIgnored(MessageIgnoredEvent { sender, kind }));
                Ok(())
            }
        }
    }

    /// Deliver a whole inbox in arrival order. Returns the rejected orders.
    pub fn deliver_all(&mut self, messages: impl IntoIterator<Item = Message>) -> Vec<OrderRejection> {
        messages
            .into_iter()
            .filter_map(|message| self.deliver(message).err())
            .collect()
    }
}
