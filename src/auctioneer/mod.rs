// 8.0: the auctioneer. alternates quote broadcast and order clearing, one phase
// per simulation step. owns the quotes, the clearing state and the order book
// of the current round. deterministic, no I/O besides tracing.

mod clearing;
mod intake;
mod results;
mod state;

pub use results::{AuctioneerError, ClearingRecord, ClearingSeries, StepOutput};
pub use state::{Auctioneer, ClearingState};
