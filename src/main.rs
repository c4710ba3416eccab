//! Walrasian auctioneer simulation.
//!
//! Drives the auctioneer through full broadcast / clearing cycles: a single
//! good with a buyer and a seller, a two-good exchange economy, empty rounds
//! and malformed orders. Set `RUST_LOG=walras_core=debug` for solver traces.

use rust_decimal_macros::dec;
use std::error::Error;
use tracing_subscriber::EnvFilter;
use walras_core::*;

const AUCTIONEER: AgentId = AgentId(0);
const GOLD: PropertyId = PropertyId(1);
const WHEAT: PropertyId = PropertyId(2);

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("Walrasian Auctioneer Simulation");
    println!("Quote broadcast, order collection, L-BFGS clearing, lot settlement\n");

    scenario_1_single_good()?;
    scenario_2_exchange_economy()?;
    scenario_3_empty_rounds()?;
    scenario_4_malformed_orders()?;

    println!("\nAll simulations completed successfully.");
    Ok(())
}

fn quote(value: rust_decimal::Decimal) -> Quote {
    Quote::new(Price::new_unchecked(value))
}

/// Run one broadcast step and one clearing step over `[t, t + 1)`, delivering
/// `orders` in between.
fn run_round(auctioneer: &mut Auctioneer, t: u64, orders: Vec<Order>) -> StepOutput {
    let step = TimeInterval::new(t, t + 1);
    auctioneer.act(step);
    for rejection in auctioneer.deliver_all(orders.into_iter().map(Message::from)) {
        println!("  rejected: {rejection}");
    }
    auctioneer.act(step)
}

/// One buyer and one seller of gold, settled against an in-memory ledger.
fn scenario_1_single_good() -> Result<(), Box<dyn Error>> {
    println!("Scenario 1: Single Good, One Buyer and One Seller\n");

    let mut auctioneer = Auctioneer::new(AUCTIONEER, [(GOLD, quote(dec!(4)))], AuctioneerConfig::default())?;
    let alice = AgentId(1);
    let bob = AgentId(2);
    auctioneer.register_participant(alice);
    auctioneer.register_participant(bob);

    let mut ledger = InMemoryLedger::new();
    ledger.allow_overdraft(AUCTIONEER);
    ledger.set_holding(bob, GOLD, 10);

    println!("  Gold quoted at ${}", quote(dec!(4)));
    println!("  Alice wants 9 - p units, Bob wants 3 - p (holds 10)\n");

    let output = run_round(
        &mut auctioneer,
        0,
        vec![
            Order::new(alice, LinearExcessDemand { property: GOLD, intercept: 9.0, slope: 1.0 }),
            Order::new(bob, LinearExcessDemand { property: GOLD, intercept: 3.0, slope: 1.0 }),
        ],
    );

    if let Some(record) = &output.clearing {
        println!("  Cleared at ${}, residual {:.2e}, {:?}", record.prices[0].1, record.residual, record.status);
    }
    for transfer in &output.transfers {
        println!(
            "  {:?} {} x{}: {} -> {}",
            transfer.direction, transfer.property, transfer.quantity, transfer.transferor, transfer.transferee
        );
    }

    let batch = TransferBatch::new(auctioneer.round(), output.next, output.transfers);
    ledger.execute(&batch)?;
    println!(
        "\n  Ledger: Alice {} gold, Bob {} gold, auctioneer {}",
        ledger.holding(alice, GOLD),
        ledger.holding(bob, GOLD),
        ledger.holding(AUCTIONEER, GOLD)
    );

    println!();
    Ok(())
}

/// Two Cobb-Douglas traders swapping gold for wheat over several rounds.
fn scenario_2_exchange_economy() -> Result<(), Box<dyn Error>> {
    println!("Scenario 2: Two-Good Exchange Economy\n");

    let mut auctioneer = Auctioneer::new(
        AUCTIONEER,
        [(GOLD, quote(dec!(10))), (WHEAT, quote(dec!(2)))],
        AuctioneerConfig::precise(),
    )?;
    for agent in 1..=2 {
        auctioneer.register_participant(AgentId(agent));
    }

    // a gold holder who likes wheat, and the reverse
    let miner = CobbDouglasExcessDemand { goods: vec![(GOLD, 0.3, 10.0), (WHEAT, 0.7, 0.0)] };
    let farmer = CobbDouglasExcessDemand { goods: vec![(GOLD, 0.6, 0.0), (WHEAT, 0.4, 50.0)] };

    for t in 0..3 {
        let output = run_round(
            &mut auctioneer,
            t,
            vec![Order::new(AgentId(1), miner.clone()), Order::new(AgentId(2), farmer.clone())],
        );
        let Some(record) = output.clearing else { continue };
        println!(
            "  Round {}: gold ${}, wheat ${}, residual {:.2e}, {} transfers",
            record.round,
            record.prices[0].1,
            record.prices[1].1,
            record.residual,
            output.transfers.len()
        );
    }

    let path = auctioneer.series().prices_of(GOLD);
    println!("  Gold price path has {} points\n", path.len());
    Ok(())
}

/// Rounds without orders leave the quotes alone and write no series entry.
fn scenario_3_empty_rounds() -> Result<(), Box<dyn Error>> {
    println!("Scenario 3: Empty Rounds\n");

    let mut auctioneer = Auctioneer::new(AUCTIONEER, [(GOLD, quote(dec!(12.5)))], AuctioneerConfig::default())?;
    auctioneer.register_participant(AgentId(1));

    for t in 0..3 {
        let output = run_round(&mut auctioneer, t, Vec::new());
        println!(
            "  t={t}: state {:?}, next {}, quote ${}",
            auctioneer.state(),
            output.next,
            output.quotes[0].quote(GOLD).map(|q| q.to_string()).unwrap_or_default()
        );
    }
    println!("  Series entries: {}\n", auctioneer.series().len());
    Ok(())
}

/// Orders on unknown properties are rejected and never reach the solver.
fn scenario_4_malformed_orders() -> Result<(), Box<dyn Error>> {
    println!("Scenario 4: Malformed Orders\n");

    let mut auctioneer = Auctioneer::new(AUCTIONEER, [(GOLD, quote(dec!(5)))], AuctioneerConfig::default())?;
    let output = run_round(
        &mut auctioneer,
        0,
        vec![
            Order::new(AgentId(1), LinearExcessDemand { property: WHEAT, intercept: 1.0, slope: 1.0 }),
            Order::new(AgentId(2), LinearExcessDemand { property: GOLD, intercept: 6.0, slope: 1.0 }),
        ],
    );

    let rejected = auctioneer
        .events()
        .iter()
        .filter(|e| matches!(e.payload, EventPayload::OrderRejected(_)))
        .count();
    println!("  Rejected orders: {rejected}");
    if let Some(record) = output.clearing {
        println!("  Cleared on the remaining order at ${}", record.prices[0].1);
    }
    Ok(())
}
