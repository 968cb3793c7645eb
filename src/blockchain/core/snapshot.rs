use crate::consensus::Consensus;
use crate::crypto::Address;
use crate::error::ChainError;
use crate::staking::Validator;
use crate::transaction::{Amount, Transaction};
use std::collections::BTreeMap;

use super::block::Block;
use super::chain::Blockchain;

/// Point-in-time copy of a chain for external stores. Field order inside
/// blocks is preserved so stored hashes remain recomputable.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChainSnapshot {
    pub consensus: String,
    pub block_reward: Amount,
    pub blocks: Vec<Block>,
    pub balances: BTreeMap<Address, Amount>,
    pub pending: Vec<Transaction>,
    #[serde(default)]
    pub validators: Vec<Validator>,
}

impl ChainSnapshot {
    pub fn to_json(&self) -> Result<String, ChainError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ChainError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn height(&self) -> u64 {
        self.blocks.last().map_or(0, |b| b.header.index)
    }
}

impl<C: Consensus> Blockchain<C> {
    pub fn snapshot(&self) -> ChainSnapshot {
        ChainSnapshot {
            consensus: self.consensus.name().to_string(),
            block_reward: self.block_reward,
            blocks: self.blocks.clone(),
            balances: self.ledger.balances.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            pending: self.mempool.transactions().to_vec(),
            validators: self.consensus.validators().to_vec(),
        }
    }
}
