//! Stress tests
//!
//! These tests run large agent populations and long simulations to verify the
//! auctioneer keeps clearing, settling and conserving lots.

use rust_decimal_macros::dec;
use std::collections::BTreeMap;
use walras_core::*;

const AUCTIONEER: AgentId = AgentId(0);

fn quote(value: rust_decimal::Decimal) -> Quote {
    Quote::new(Price::new_unchecked(value))
}

// deterministic spread of parameters without a rng
fn spread(i: u64, modulus: u64) -> f64 {
    ((i * 7919) % modulus) as f64
}

/// Many traders on several goods at once.
mod population_tests {
    use super::*;

    #[test]
    fn hundred_linear_traders_clear() {
        let properties: Vec<PropertyId> = (1..=4).map(PropertyId).collect();
        let mut auctioneer = Auctioneer::new(
            AUCTIONEER,
            properties.iter().map(|p| (*p, quote(dec!(10)))),
            AuctioneerConfig::default(),
        )
        .unwrap();

        let step = TimeInterval::new(0, 1);
        auctioneer.act(step);

        // per property: sum of intercepts / sum of slopes
        let mut intercepts: BTreeMap<PropertyId, f64> = BTreeMap::new();
        let mut slopes: BTreeMap<PropertyId, f64> = BTreeMap::new();
        for i in 1..=100u64 {
            let property = properties[(i % 4) as usize];
            let intercept = 5.0 + spread(i, 40);
            let slope = 0.5 + spread(i, 3);
            *intercepts.entry(property).or_default() += intercept;
            *slopes.entry(property).or_default() += slope;
            auctioneer
                .deliver(Message::from(Order::new(
                    AgentId(i),
                    LinearExcessDemand { property, intercept, slope },
                )))
                .unwrap();
        }

        let output = auctioneer.act(step);
        let record = output.clearing.unwrap();
        assert!(record.applied);

        for property in &properties {
            let root = intercepts[property] / slopes[property];
            let price = auctioneer.quote(*property).unwrap().price().to_f64();
            assert!((price - root).abs() <= 0.01, "{property}: {price} vs {root}");
        }
    }

    #[test]
    fn lots_match_rounded_side_totals() {
        let mut auctioneer =
            Auctioneer::new(AUCTIONEER, [(PropertyId(1), quote(dec!(20)))], AuctioneerConfig::default())
                .unwrap();
        let step = TimeInterval::new(0, 1);
        auctioneer.act(step);

        let mut traders = Vec::new();
        for i in 1..=60u64 {
            let intercept = 1.3 + spread(i, 50) * 0.7;
            traders.push((AgentId(i), intercept));
            auctioneer
                .deliver(Message::from(Order::new(
                    AgentId(i),
                    LinearExcessDemand { property: PropertyId(1), intercept, slope: 0.1 },
                )))
                .unwrap();
        }
        let output = auctioneer.act(step);

        // each side settles the rounded total of its unrounded demand
        let side_totals = |direction: Direction| -> (u64, f64) {
            output
                .transfers
                .iter()
                .filter(|t| t.direction == direction)
                .fold((0, 0.0), |(lots, demand), t| (lots + t.quantity, demand + t.excess_demand.abs()))
        };
        for direction in [Direction::Buy, Direction::Sell] {
            let (lots, demand) = side_totals(direction);
            assert!(demand > 1.0, "{direction:?} side is empty");
            assert_eq!(lots, demand.round() as u64, "{direction:?}");
        }

        // realized demand sits within half a quote tick of the published price
        let price = auctioneer.quote(PropertyId(1)).unwrap().price().to_f64();
        for transfer in &output.transfers {
            let (_, intercept) = traders[(transfer.agent().0 - 1) as usize];
            let at_quote = intercept - 0.1 * price;
            assert!((transfer.excess_demand - at_quote).abs() <= 0.1 * 0.005 + 1e-9);
        }
        assert!(output.transfers.iter().all(|t| t.issuer == AUCTIONEER));
    }
}

/// Long runs with a moving economy.
mod simulation_tests {
    use super::*;

    #[test]
    fn thousand_steps_keep_period_and_series() {
        let mut auctioneer =
            Auctioneer::new(AUCTIONEER, [(PropertyId(1), quote(dec!(1)))], AuctioneerConfig::fast())
                .unwrap();
        auctioneer.register_participant(AgentId(1));

        let mut cleared = 0;
        for t in 0..500u64 {
            let step = TimeInterval::new(t, t + 1);
            assert_eq!(auctioneer.state(), ClearingState::AwaitingBroadcast);
            auctioneer.act(step);

            // every third round is empty
            if t % 3 != 0 {
                let intercept = 2.0 + spread(t, 17);
                auctioneer
                    .deliver(Message::from(Order::new(
                        AgentId(1),
                        LinearExcessDemand { property: PropertyId(1), intercept, slope: 1.0 },
                    )))
                    .unwrap();
                cleared += 1;
            }
            let output = auctioneer.act(step);
            assert_eq!(output.quotes.len(), 1);
        }

        assert_eq!(auctioneer.series().len(), cleared);
        assert_eq!(auctioneer.round(), 500);
        assert!(auctioneer.events().len() <= auctioneer.config().max_events);
    }

    #[test]
    fn ledger_inventory_conserved_over_rounds() {
        let gold = PropertyId(1);
        let mut auctioneer =
            Auctioneer::new(AUCTIONEER, [(gold, quote(dec!(10)))], AuctioneerConfig::default()).unwrap();
        let mut ledger = InMemoryLedger::new();
        ledger.allow_overdraft(AUCTIONEER);
        for i in 1..=20u64 {
            ledger.set_holding(AgentId(i), gold, 1_000);
        }

        for t in 0..20u64 {
            let step = TimeInterval::new(t, t + 1);
            auctioneer.act(step);
            for i in 1..=20u64 {
                // half want to buy, half to sell at the clearing price
                let side = if i % 2 == 0 { 1.0 } else { -1.0 };
                let intercept = 10.0 + side * (1.0 + spread(i + t, 5));
                auctioneer
                    .deliver(Message::from(Order::new(
                        AgentId(i),
                        LinearExcessDemand { property: gold, intercept, slope: 1.0 },
                    )))
                    .unwrap();
            }
            let output = auctioneer.act(step);
            let batch = TransferBatch::new(auctioneer.round(), step.lower, output.transfers);
            ledger.execute(&batch).unwrap();
        }

        // whatever agents gained or lost, the auctioneer holds the difference
        let agents: i128 = (1..=20u64).map(|i| ledger.holding(AgentId(i), gold)).sum();
        assert_eq!(agents + ledger.holding(AUCTIONEER, gold), 20_000);
        assert_eq!(ledger.executed_rounds().len(), 20);
    }
}
