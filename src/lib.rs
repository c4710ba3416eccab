// walras-core: Walrasian tatonnement auctioneer for multi-agent market simulations.
// collects excess demand functions, solves for clearing prices, settles in whole lots.
// all computation is deterministic with no external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: AgentId, PropertyId, Price, Quote, TimeInterval
//   2.x  demand.rs: excess demand trait, price vectors, reference demand functions
//   3.x  solver/: L-BFGS equilibrium solver over price multipliers
//   4.x  message.rs: orders, quote broadcasts, closed message enum
//   5.x  apportion.rs: largest-remainder apportionment
//   6.x  transfer.rs: transfer instructions from realized excess demand
//   7.x  config.rs: solver tolerances, transfer threshold, quote precision, presets
//   8.x  auctioneer/: state machine: broadcast, order intake, clearing
//   9.1  settlement.rs: transfer batches and ownership ledger (mocked)
//   10.x aggregator.rs: per-round order book, last write wins
//   11.x events.rs: state transition events for audit
//   12.x market.rs: traded properties + current quotes

// core clearing modules
pub mod aggregator;
pub mod apportion;
pub mod auctioneer;
pub mod demand;
pub mod market;
pub mod solver;
pub mod transfer;
pub mod types;

// protocol and integration modules
pub mod config;
pub mod events;
pub mod message;
pub mod settlement;

// re exports for convenience
pub use aggregator::{ExcessDemandAggregator, OrderRejection, RoundOrders};
pub use apportion::{largest_remainder, ApportionmentError};
pub use auctioneer::*;
pub use config::{AuctioneerConfig, ConfigError, SolverConfig};
pub use demand::*;
pub use events::*;
pub use market::*;
pub use message::*;
pub use settlement::{InMemoryLedger, LedgerError, OwnershipLedger, TransferBatch};
pub use solver::*;
pub use transfer::*;
pub use types::*;
