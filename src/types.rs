// 1.0: all the primitives live here. identities, prices, quotes, simulation time.
// each is a newtype so the compiler catches an agent id passed as a property id.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PropertyId(pub u64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent#{}", self.0)
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "property#{}", self.0)
    }
}

// 1.1: price in cash per unit of property. must be positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Price(Decimal);

impl Price {
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        if value > Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn new_unchecked(value: Decimal) -> Self {
        debug_assert!(value > Decimal::ZERO);
        Self(value)
    }

    /// Quantize a solver output to `decimals` places. Values that round to zero
    /// are lifted to one tick so a published price is never zero.
    pub fn from_f64(value: f64, decimals: u32) -> Option<Self> {
        if !value.is_finite() || value <= 0.0 {
            return None;
        }
        let rounded = Decimal::from_f64(value)?.round_dp(decimals);
        let tick = Decimal::new(1, decimals);
        Some(Self(rounded.max(tick)))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn to_f64(&self) -> f64 {
        // a Decimal always fits in an f64, possibly with rounding
        self.0.to_f64().unwrap_or(f64::NAN)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.2: the published price of one traded property for one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote(Price);

impl Quote {
    pub fn new(price: Price) -> Self {
        Self(price)
    }

    pub fn price(&self) -> Price {
        self.0
    }
}

impl From<Price> for Quote {
    fn from(price: Price) -> Self {
        Self(price)
    }
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.3: simulation time point. opaque tick counter owned by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={}", self.0)
    }
}

// 1.4: half-open step [lower, upper) handed to the auctioneer by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInterval {
    pub lower: Timestamp,
    pub upper: Timestamp,
}

impl TimeInterval {
    pub fn new(lower: u64, upper: u64) -> Self {
        debug_assert!(lower <= upper);
        Self {
            lower: Timestamp(lower),
            upper: Timestamp(upper),
        }
    }

    /// The step that follows this one with the same length.
    pub fn next(&self) -> Self {
        let len = self.upper.0.saturating_sub(self.lower.0).max(1);
        Self::new(self.upper.0, self.upper.0.saturating_add(len))
    }
}
