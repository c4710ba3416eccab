//! The two phases of a simulation step.

use super::results::{ClearingRecord, StepOutput};
use super::state::{Auctioneer, ClearingState};
use crate::events::{
    ClearingSkippedEvent, EventPayload, MarketClearedEvent, QuotesBroadcastEvent, SkipReason,
    TransferIssuedEvent,
};
use crate::message::QuoteMessage;
use crate::solver::SolverResult;
use crate::transfer::TransferInstruction;
use crate::types::{Price, PropertyId, Quote, TimeInterval};
use tracing::{debug, info, warn};

impl Auctioneer {
    /// Run the phase the auctioneer is waiting for and flip to the other one.
    ///
    /// A broadcast step publishes the current quotes and asks to be called
    /// again at `step.lower`, so orders can arrive within the same time point.
    /// A clearing step solves for new quotes when there are orders, broadcasts
    /// the result and asks to be called again at `step.upper`.
    pub fn act(&mut self, step: TimeInterval) -> StepOutput {
        self.current_time = step.lower;

        let output = match self.state {
            ClearingState::AwaitingBroadcast => self.broadcast_phase(step),
            ClearingState::AwaitingOrders => self.clearing_phase(step),
        };

        self.state = self.state.next();
        output
    }

    fn broadcast_phase(&mut self, step: TimeInterval) -> StepOutput {
        // anything delivered before the quotes went out belongs to no round
        let stale = self.aggregator.clear();
        if stale > 0 {
            debug!(stale, time = %step.lower, "discarded orders delivered before broadcast");
        }

        StepOutput {
            next: step.lower,
            quotes: self.broadcast(step),
            transfers: Vec::new(),
            clearing: None,
        }
    }

    fn clearing_phase(&mut self, step: TimeInterval) -> StepOutput {
        self.round += 1;
        let round = self.round;
        let orders = self.aggregator.take_round();

        if orders.is_empty() {
            info!(round, time = %step.lower, "no orders, quotes unchanged");
            self.emit_event(EventPayload::ClearingSkipped(ClearingSkippedEvent {
                round,
                reason: SkipReason::NoOrders,
            }));
            return StepOutput {
                next: step.upper,
                quotes: self.broadcast(step),
                transfers: Vec::new(),
                clearing: None,
            };
        }

        let initial = self.properties.price_vector();
        let result = self.solver.solve(&initial, &orders.demands());
        let solved = self.published_prices(initial.values(), &result);

        let applied = result.is_usable() && (result.is_converged() || self.config.accept_unconverged);
        if applied {
            for (property, price) in &solved {
                self.properties.update(*property, Quote::new(*price));
            }
        } else {
            warn!(round, status = ?result.status, residual = result.residual, "solve not applied, quotes retained");
        }
        // the series only ever shows prices that were published
        let published = self.properties.prices();

        info!(
            round,
            orders = orders.len(),
            residual = result.residual,
            status = ?result.status,
            iterations = result.iterations,
            applied,
            "market cleared"
        );

        let record = ClearingRecord {
            round,
            time: step.lower,
            prices: published.clone(),
            residual: result.residual,
            status: result.status,
            iterations: result.iterations,
            applied,
        };
        self.series.push(record.clone());
        self.emit_event(EventPayload::MarketCleared(MarketClearedEvent {
            round,
            orders: orders.len(),
            prices: published,
            residual: result.residual,
            status: result.status,
            iterations: result.iterations,
            applied,
        }));

        let transfers = if applied {
            // at the solved prices, before quantization
            let realized = orders.realized(&result.prices);
            let properties: Vec<PropertyId> = self.properties.properties().collect();
            let plan = self.transfers.generate(&realized, &properties);
            if !plan.failures.is_empty() {
                warn!(round, failures = plan.failures.len(), "some transfer groups were skipped");
            }
            self.record_transfers(round, &plan.instructions);
            plan.instructions
        } else {
            Vec::new()
        };

        StepOutput {
            next: step.upper,
            quotes: self.broadcast(step),
            transfers,
            clearing: Some(record),
        }
    }

    // Solved prices at quote precision, registration order. A coordinate the
    // solver did not move keeps its current quote exactly, as does one that
    // cannot be published (non-finite or non-positive).
    fn published_prices(&self, initial: &[f64], result: &SolverResult) -> Vec<(PropertyId, Price)> {
        let decimals = self.config.quote_decimals;
        self.properties
            .iter()
            .zip(initial)
            .zip(result.prices.values())
            .map(|(((property, quote), start), solved)| {
                let price = if solved.to_bits() == start.to_bits() {
                    quote.price()
                } else {
                    Price::from_f64(*solved, decimals).unwrap_or_else(|| quote.price())
                };
                (property, price)
            })
            .collect()
    }

    fn broadcast(&mut self, step: TimeInterval) -> Vec<QuoteMessage> {
        let quotes = self.quote_messages(step.lower);
        debug!(recipients = quotes.len(), time = %step.lower, "quotes broadcast");
        self.emit_event(EventPayload::QuotesBroadcast(QuotesBroadcastEvent {
            recipients: quotes.len(),
            prices: self.properties.prices(),
        }));
        quotes
    }

    fn record_transfers(&mut self, round: u64, instructions: &[TransferInstruction]) {
        for instruction in instructions {
            self.emit_event(EventPayload::TransferIssued(TransferIssuedEvent {
                round,
                agent: instruction.agent(),
                property: instruction.property,
                direction: instruction.direction,
                quantity: instruction.quantity,
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::auctioneer::{Auctioneer, ClearingState};
    use crate::config::AuctioneerConfig;
    use crate::demand::{IsoelasticExcessDemand, LinearExcessDemand};
    use crate::message::{Message, Order};
    use crate::transfer::Direction;
    use crate::types::{AgentId, Price, PropertyId, Quote, TimeInterval, Timestamp};
    use rust_decimal_macros::dec;

    const AUCTIONEER: AgentId = AgentId(0);
    const GOLD: PropertyId = PropertyId(1);
    const WHEAT: PropertyId = PropertyId(2);

    fn quote(value: rust_decimal::Decimal) -> Quote {
        Quote::new(Price::new_unchecked(value))
    }

    fn setup(config: AuctioneerConfig) -> Auctioneer {
        let mut auctioneer =
            Auctioneer::new(AUCTIONEER, [(GOLD, quote(dec!(4))), (WHEAT, quote(dec!(7)))], config)
                .unwrap();
        auctioneer.register_participant(AgentId(1));
        auctioneer.register_participant(AgentId(2));
        auctioneer
    }

    fn linear(agent: u64, property: PropertyId, intercept: f64, slope: f64) -> Message {
        Message::from(Order::new(
            AgentId(agent),
            LinearExcessDemand {
                property,
                intercept,
                slope,
            },
        ))
    }

    #[test]
    fn broadcast_step_returns_lower_bound() {
        let mut auctioneer = setup(AuctioneerConfig::default());
        let output = auctioneer.act(TimeInterval::new(3, 4));
        assert!(!output.is_clearing());

        assert_eq!(output.next, Timestamp(3));
        assert_eq!(output.quotes.len(), 2);
        assert_eq!(output.quotes[0].quote(GOLD), Some(quote(dec!(4))));
        assert!(output.transfers.is_empty());
        assert_eq!(auctioneer.state(), ClearingState::AwaitingOrders);
    }

    #[test]
    fn empty_round_keeps_quotes() {
        let mut auctioneer = setup(AuctioneerConfig::default());
        auctioneer.act(TimeInterval::new(0, 1));
        let output = auctioneer.act(TimeInterval::new(0, 1));

        assert_eq!(output.next, Timestamp(1));
        assert!(output.clearing.is_none());
        assert!(output.transfers.is_empty());
        assert!(auctioneer.series().is_empty());
        assert_eq!(auctioneer.quote(GOLD), Some(quote(dec!(4))));
        assert_eq!(auctioneer.round(), 1);
    }

    #[test]
    fn clears_to_root_and_leaves_other_quote() {
        let mut auctioneer = setup(AuctioneerConfig::default());
        auctioneer.act(TimeInterval::new(0, 1));
        // 8 - p, root at 8
        auctioneer.deliver(linear(1, GOLD, 8.0, 1.0)).unwrap();
        let output = auctioneer.act(TimeInterval::new(0, 1));

        let record = output.clearing.unwrap();
        assert!(record.applied);
        assert_eq!(auctioneer.quote(GOLD), Some(quote(dec!(8.00))));
        assert_eq!(auctioneer.quote(WHEAT), Some(quote(dec!(7))));
        assert_eq!(auctioneer.series().len(), 1);
        assert_eq!(output.quotes[0].quote(GOLD), Some(quote(dec!(8.00))));
    }

    #[test]
    fn buyer_and_seller_get_opposite_transfers() {
        let mut auctioneer = setup(AuctioneerConfig::default());
        auctioneer.act(TimeInterval::new(0, 1));

        // aggregate 12 - 2p clears at 6, where agent 1 wants +3 and agent 2 -3
        auctioneer.deliver(linear(1, GOLD, 9.0, 1.0)).unwrap();
        auctioneer.deliver(linear(2, GOLD, 3.0, 1.0)).unwrap();
        let output = auctioneer.act(TimeInterval::new(0, 1));

        assert_eq!(auctioneer.quote(GOLD), Some(quote(dec!(6.00))));
        assert_eq!(output.transfers.len(), 2);
        let buy = &output.transfers[0];
        let sell = &output.transfers[1];
        assert_eq!(buy.direction, Direction::Buy);
        assert_eq!(sell.direction, Direction::Sell);
        assert_eq!(buy.property, sell.property);
        assert_eq!(buy.transferor, AUCTIONEER);
        assert_eq!(sell.transferee, AUCTIONEER);
        assert_eq!(buy.quantity, 3);
        assert_eq!(sell.quantity, 3);
    }

    #[test]
    fn unconverged_solve_retained_when_configured() {
        let mut config = AuctioneerConfig::precise();
        config.solver.max_iterations = 1;
        let mut auctioneer = setup(config);
        auctioneer.act(TimeInterval::new(0, 1));

        auctioneer
            .deliver(Message::from(Order::new(
                AgentId(1),
                IsoelasticExcessDemand {
                    property: GOLD,
                    budget: 100.0,
                    endowment: 1.0,
                },
            )))
            .unwrap();
        let output = auctioneer.act(TimeInterval::new(0, 1));

        let record = output.clearing.unwrap();
        assert!(!record.status.is_converged());
        assert!(!record.applied);
        assert!(output.transfers.is_empty());
        assert_eq!(auctioneer.quote(GOLD), Some(quote(dec!(4))));
        // the attempt is still on record, at the retained quotes
        assert_eq!(auctioneer.series().len(), 1);
        assert_eq!(record.price_of(GOLD), Some(Price::new_unchecked(dec!(4))));
        assert_eq!(
            auctioneer.series().prices_of(GOLD),
            vec![(Timestamp(0), Price::new_unchecked(dec!(4)))]
        );
    }

    #[test]
    fn transfers_use_solved_not_rounded_prices() {
        let mut config = AuctioneerConfig::default();
        config.quote_decimals = 0;
        let mut auctioneer = setup(config);
        auctioneer.act(TimeInterval::new(0, 1));

        // clears at 2.6, published as 3; at 3 the agent would look like a seller
        auctioneer.deliver(linear(1, GOLD, 2.6, 1.0)).unwrap();
        let output = auctioneer.act(TimeInterval::new(0, 1));

        assert_eq!(auctioneer.quote(GOLD), Some(quote(dec!(3))));
        assert!(output.transfers.is_empty());
    }

    #[test]
    fn stale_orders_are_dropped_at_broadcast() {
        let mut auctioneer = setup(AuctioneerConfig::default());
        auctioneer.deliver(linear(1, GOLD, 8.0, 1.0)).unwrap();
        auctioneer.act(TimeInterval::new(0, 1));
        assert_eq!(auctioneer.pending_orders(), 0);

        let output = auctioneer.act(TimeInterval::new(0, 1));
        assert!(output.clearing.is_none());
    }

    #[test]
    fn outgoing_messages_quotes_first() {
        let mut auctioneer = setup(AuctioneerConfig::default());
        auctioneer.act(TimeInterval::new(0, 1));
        auctioneer.deliver(linear(1, GOLD, 9.0, 1.0)).unwrap();
        auctioneer.deliver(linear(2, GOLD, 3.0, 1.0)).unwrap();

        let messages = auctioneer.act(TimeInterval::new(0, 1)).into_messages();
        assert_eq!(messages.len(), 4);
        assert!(matches!(messages[0], Message::Quote(_)));
        assert!(matches!(messages[3], Message::Transfer(_)));
    }
}
