//! Settlement instructions from realized excess demand.
//!
//! After a clearing round every agent's excess demand is evaluated at the new
//! quotes. Net sellers deliver to the auctioneer, net buyers receive from it.
//! Fractional quantities are turned into whole lots per property and side with
//! largest-remainder apportionment, so each side's total is the rounded sum of
//! its fractional demand.

use crate::apportion::{largest_remainder, ApportionmentError};
use crate::demand::DemandVector;
use crate::types::{AgentId, PropertyId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Side of the trade from the agent's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    // agent -> auctioneer
    Sell,
    // auctioneer -> agent
    Buy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferInstruction {
    /// The auctioneer that produced the instruction.
    pub issuer: AgentId,
    pub property: PropertyId,
    pub quantity: u64,
    pub direction: Direction,
    pub transferor: AgentId,
    pub transferee: AgentId,
    /// Unrounded excess demand the quantity was derived from.
    pub excess_demand: f64,
}

impl TransferInstruction {
    /// The trading agent, whichever side of the transfer it is on.
    pub fn agent(&self) -> AgentId {
        match self.direction {
            Direction::Sell => self.transferor,
            Direction::Buy => self.transferee,
        }
    }
}

/// A (property, side) group whose quantities could not be apportioned.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferFailure {
    pub property: PropertyId,
    pub direction: Direction,
    pub error: ApportionmentError,
}

#[derive(Debug, Clone, Default)]
pub struct TransferPlan {
    pub instructions: Vec<TransferInstruction>,
    pub failures: Vec<TransferFailure>,
}

#[derive(Debug, Clone)]
pub struct TransferGenerator {
    auctioneer: AgentId,
    minimum_transfer: f64,
}

impl TransferGenerator {
    pub fn new(auctioneer: AgentId, minimum_transfer: f64) -> Self {
        Self {
            auctioneer,
            minimum_transfer,
        }
    }

    pub fn minimum_transfer(&self) -> f64 {
        self.minimum_transfer
    }

    // |ed| <= threshold is settled
    pub fn direction_of(&self, excess_demand: f64) -> Option<Direction> {
        if excess_demand < -self.minimum_transfer {
            Some(Direction::Sell)
        } else if excess_demand > self.minimum_transfer {
            Some(Direction::Buy)
        } else {
            None
        }
    }

    /// One instruction per qualifying (agent, property) pair, ordered by agent
    /// and then by property registration order. A pair whose lot rounds to
    /// zero still gets an instruction so the ledger sees every trade intent.
    pub fn generate(
        &self,
        realized: &BTreeMap<AgentId, DemandVector>,
        properties: &[PropertyId],
    ) -> TransferPlan {
        let mut plan = TransferPlan::default();
        let mut lots: BTreeMap<(AgentId, usize), (Direction, u64, f64)> = BTreeMap::new();

        for (index, property) in properties.iter().enumerate() {
            for direction in [Direction::Sell, Direction::Buy] {
                let members: Vec<(AgentId, f64)> = realized
                    .iter()
                    .filter_map(|(agent, demand)| {
                        let ed = *demand.get(property)?;
                        (self.direction_of(ed) == Some(direction)).then_some((*agent, ed))
                    })
                    .collect();
                if members.is_empty() {
                    continue;
                }

                let fractions: Vec<f64> = members.iter().map(|(_, ed)| ed.abs()).collect();
                match largest_remainder(&fractions) {
                    Ok(quantities) => {
                        for ((agent, ed), quantity) in members.into_iter().zip(quantities) {
                            lots.insert((agent, index), (direction, quantity, ed));
                        }
                    }
                    Err(error) => {
                        warn!(%property, ?direction, %error, "transfer quantities not apportionable");
                        plan.failures.push(TransferFailure {
                            property: *property,
                            direction,
                            error,
                        });
                    }
                }
            }
        }

        for ((agent, index), (direction, quantity, excess_demand)) in lots {
            let (transferor, transferee) = match direction {
                Direction::Sell => (agent, self.auctioneer),
                Direction::Buy => (self.auctioneer, agent),
            };
            plan.instructions.push(TransferInstruction {
                issuer: self.auctioneer,
                property: properties[index],
                quantity,
                direction,
                transferor,
                transferee,
                excess_demand,
            });
        }

        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AUCTIONEER: AgentId = AgentId(0);
    const GOLD: PropertyId = PropertyId(1);
    const WHEAT: PropertyId = PropertyId(2);

    fn realized(entries: &[(u64, PropertyId, f64)]) -> BTreeMap<AgentId, DemandVector> {
        let mut map: BTreeMap<AgentId, DemandVector> = BTreeMap::new();
        for &(agent, property, ed) in entries {
            map.entry(AgentId(agent)).or_default().insert(property, ed);
        }
        map
    }

    #[test]
    fn buyer_and_seller_get_opposite_transfers() {
        let generator = TransferGenerator::new(AUCTIONEER, 1e-4);
        let plan = generator.generate(&realized(&[(1, GOLD, 3.0), (2, GOLD, -3.0)]), &[GOLD]);

        assert_eq!(plan.instructions.len(), 2);
        let buy = &plan.instructions[0];
        let sell = &plan.instructions[1];

        assert_eq!(buy.direction, Direction::Buy);
        assert_eq!((buy.transferor, buy.transferee), (AUCTIONEER, AgentId(1)));
        assert_eq!(sell.direction, Direction::Sell);
        assert_eq!((sell.transferor, sell.transferee), (AgentId(2), AUCTIONEER));
        assert_eq!(buy.property, sell.property);
        assert_eq!(buy.quantity, 3);
        assert_eq!(sell.quantity, 3);
    }

    #[test]
    fn below_threshold_is_settled() {
        let generator = TransferGenerator::new(AUCTIONEER, 1e-4);
        let plan = generator.generate(&realized(&[(1, GOLD, 5e-5), (2, GOLD, -1e-4)]), &[GOLD]);
        assert!(plan.instructions.is_empty());
    }

    #[test]
    fn lots_are_apportioned_per_side() {
        let generator = TransferGenerator::new(AUCTIONEER, 1e-4);
        let plan = generator.generate(
            &realized(&[(1, GOLD, -2.6), (2, GOLD, -2.6), (3, GOLD, -2.8)]),
            &[GOLD],
        );

        let total: u64 = plan.instructions.iter().map(|t| t.quantity).sum();
        assert_eq!(total, 8);
        assert!(plan.instructions.iter().all(|t| t.direction == Direction::Sell));
    }

    #[test]
    fn ordered_by_agent_then_property() {
        let generator = TransferGenerator::new(AUCTIONEER, 1e-4);
        let plan = generator.generate(
            &realized(&[(2, WHEAT, 1.0), (2, GOLD, -1.0), (1, WHEAT, -1.0)]),
            &[WHEAT, GOLD],
        );

        let order: Vec<_> = plan
            .instructions
            .iter()
            .map(|t| (t.agent(), t.property))
            .collect();
        assert_eq!(
            order,
            vec![(AgentId(1), WHEAT), (AgentId(2), WHEAT), (AgentId(2), GOLD)]
        );
    }

    #[test]
    fn unapportionable_group_is_reported_not_fatal() {
        let generator = TransferGenerator::new(AUCTIONEER, 1e-4);
        let plan = generator.generate(&realized(&[(1, GOLD, 1e300), (2, WHEAT, 2.0)]), &[GOLD, WHEAT]);

        assert_eq!(plan.failures.len(), 1);
        assert_eq!(plan.failures[0].property, GOLD);
        assert_eq!(plan.instructions.len(), 1);
        assert_eq!(plan.instructions[0].property, WHEAT);
    }
}
