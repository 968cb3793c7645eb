//! Pluggable block-production rules

use crate::blockchain::{Block, Seal};
use crate::error::ChainError;
use crate::miner::{mine_block, CancelToken};
use crate::staking::{Validator, ValidatorRegistry};
use crate::transaction::Amount;

/// Default number of leading zero characters required by proof of work.
pub const DEFAULT_DIFFICULTY: u32 = 2;

/// Default minimum stake for a proof-of-stake validator.
pub const DEFAULT_MINIMUM_STAKE: i64 = 32;

/// Largest difficulty a hex SHA-256 digest can satisfy.
pub const MAX_DIFFICULTY: u32 = 64;

/// Consensus-specific sealing and validation shared by [`crate::blockchain::Blockchain`].
pub trait Consensus {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Seal stored in the genesis block.
    fn genesis_seal(&self) -> Seal;

    /// Finalizes a candidate block so that its hash satisfies this consensus.
    fn seal_block(&self, block: Block, cancel: &CancelToken) -> Result<Block, ChainError>;

    /// Consensus checks applied on top of hash and linkage validation.
    fn validate_block_extra(&self, block: &Block) -> bool;

    /// Registered block producers, if this consensus keeps any.
    fn validators(&self) -> &[Validator] {
        &[]
    }
}

/// Difficulty-target proof of work. Difficulty is fixed for the chain's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofOfWork {
    pub difficulty: u32,
}

impl ProofOfWork {
    pub fn new(difficulty: u32) -> Self {
        ProofOfWork { difficulty }
    }

    /// The string of zero characters every sealed hash must start with.
    pub fn target(&self) -> String {
        "0".repeat(self.difficulty as usize)
    }
}

impl Default for ProofOfWork {
    fn default() -> Self {
        Self::new(DEFAULT_DIFFICULTY)
    }
}

impl Consensus for ProofOfWork {
    fn name(&self) -> &'static str {
        "proof-of-work"
    }

    fn genesis_seal(&self) -> Seal {
        Seal::Work { nonce: 0 }
    }

    fn seal_block(&self, block: Block, cancel: &CancelToken) -> Result<Block, ChainError> {
        mine_block(block, self.difficulty, cancel)
    }

    fn validate_block_extra(&self, block: &Block) -> bool {
        matches!(block.header.seal, Seal::Work { .. }) && block.meets_difficulty(self.difficulty)
    }
}

/// Stake-weighted validator selection. Holds the validator registry.
#[derive(Debug, Clone, PartialEq)]
pub struct ProofOfStake {
    pub registry: ValidatorRegistry,
}

impl ProofOfStake {
    pub fn new(minimum_stake: Amount) -> Self {
        ProofOfStake {
            registry: ValidatorRegistry::new(minimum_stake),
        }
    }

    pub fn minimum_stake(&self) -> Amount {
        self.registry.minimum_stake()
    }
}

impl Default for ProofOfStake {
    fn default() -> Self {
        Self::new(Amount::from_num(DEFAULT_MINIMUM_STAKE))
    }
}

impl Consensus for ProofOfStake {
    fn name(&self) -> &'static str {
        "proof-of-stake"
    }

    fn genesis_seal(&self) -> Seal {
        Seal::Stake {
            validator: String::new(),
            stake: Amount::ZERO,
        }
    }

    /// No puzzle: the hash computed at construction already covers the
    /// validator fields.
    fn seal_block(&self, block: Block, _cancel: &CancelToken) -> Result<Block, ChainError> {
        match &block.header.seal {
            Seal::Stake { .. } => Ok(block),
            Seal::Work { .. } => Err(ChainError::InvalidBlock(
                "Proof-of-stake block must carry a validator seal".to_string(),
            )),
        }
    }

    fn validate_block_extra(&self, block: &Block) -> bool {
        matches!(block.header.seal, Seal::Stake { .. })
    }

    fn validators(&self) -> &[Validator] {
        self.registry.validators()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Transaction;

    fn coinbase() -> Vec<Transaction> {
        vec![Transaction::coinbase("producer", Amount::from_num(50))]
    }

    #[test]
    fn test_pow_seal_meets_target() {
        let pow = ProofOfWork::new(1);
        let block = Block::new(1, "0".into(), coinbase(), pow.genesis_seal());
        let sealed = pow.seal_block(block, &CancelToken::new()).unwrap();
        assert!(sealed.hash.starts_with(&pow.target()));
        assert!(pow.validate_block_extra(&sealed));
    }

    #[test]
    fn test_pow_rejects_stake_seal() {
        let pow = ProofOfWork::new(0);
        let block = Block::new(1, "0".into(), coinbase(), ProofOfStake::default().genesis_seal());
        assert!(!pow.validate_block_extra(&block));
    }

    #[test]
    fn test_pos_seal_is_single_hash() {
        let pos = ProofOfStake::default();
        let seal = Seal::Stake {
            validator: "bob".into(),
            stake: Amount::from_num(40),
        };
        let block = Block::new(1, "0".into(), coinbase(), seal);
        let expected = block.hash.clone();
        let sealed = pos.seal_block(block, &CancelToken::new()).unwrap();
        assert_eq!(sealed.hash, expected);
        assert!(pos.validate_block_extra(&sealed));
    }

    #[test]
    fn test_pos_rejects_work_seal() {
        let pos = ProofOfStake::default();
        let block = Block::new(1, "0".into(), coinbase(), Seal::Work { nonce: 0 });
        assert!(pos.seal_block(block, &CancelToken::new()).is_err());
    }
}
