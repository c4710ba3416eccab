// 9.1 settlement.rs: MOCKED ledger. the real ownership ledger is an external collaborator.
// batches group one round's transfer instructions, the in-memory ledger applies them.

use crate::transfer::TransferInstruction;
use crate::types::{AgentId, PropertyId, Timestamp};
use std::collections::{BTreeMap, BTreeSet};

// One clearing round's transfer instructions, applied all or nothing
#[derive(Debug, Clone, PartialEq)]
pub struct TransferBatch {
    pub round: u64,
    pub created_at: Timestamp,
    pub instructions: Vec<TransferInstruction>,
}

impl TransferBatch {
    pub fn new(round: u64, created_at: Timestamp, instructions: Vec<TransferInstruction>) -> Self {
        Self {
            round,
            created_at,
            instructions,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    // net change in units per (owner, property). sums to zero per property.
    pub fn net_flows(&self) -> BTreeMap<(AgentId, PropertyId), i128> {
        let mut flows = BTreeMap::new();
        for instruction in &self.instructions {
            let quantity = i128::from(instruction.quantity);
            *flows
                .entry((instruction.transferor, instruction.property))
                .or_insert(0) -= quantity;
            *flows
                .entry((instruction.transferee, instruction.property))
                .or_insert(0) += quantity;
        }
        flows
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("{owner} holds {held} of {property}, batch needs {required}")]
    InsufficientHoldings {
        owner: AgentId,
        property: PropertyId,
        held: i128,
        required: i128,
    },
}

// Trait for ownership ledger backends
pub trait OwnershipLedger {
    fn execute(&mut self, batch: &TransferBatch) -> Result<(), LedgerError>;

    fn holding(&self, owner: AgentId, property: PropertyId) -> i128;
}

// In memory ledger for tests and the demo binary
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    holdings: BTreeMap<(AgentId, PropertyId), i128>,
    // owners allowed to go short, typically the auctioneer
    overdraft: BTreeSet<AgentId>,
    executed_rounds: Vec<u64>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_holding(&mut self, owner: AgentId, property: PropertyId, quantity: i128) {
        self.holdings.insert((owner, property), quantity);
    }

    pub fn allow_overdraft(&mut self, owner: AgentId) {
        self.overdraft.insert(owner);
    }

    pub fn executed_rounds(&self) -> &[u64] {
        &self.executed_rounds
    }
}

impl OwnershipLedger for InMemoryLedger {
    fn execute(&mut self, batch: &TransferBatch) -> Result<(), LedgerError> {
        let flows = batch.net_flows();

        // validate everything before touching any holding
        for (&(owner, property), &flow) in &flows {
            if flow >= 0 || self.overdraft.contains(&owner) {
                continue;
            }
            let held = self.holding(owner, property);
            if held + flow < 0 {
                return Err(LedgerError::InsufficientHoldings {
                    owner,
                    property,
                    held,
                    required: -flow,
                });
            }
        }

        for (key, flow) in flows {
            *self.holdings.entry(key).or_insert(0) += flow;
        }
        self.executed_rounds.push(batch.round);
        Ok(())
    }

    fn holding(&self, owner: AgentId, property: PropertyId) -> i128 {
        self.holdings.get(&(owner, property)).copied().unwrap_or(0)
    }
}
