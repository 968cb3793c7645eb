use crate::consensus::Consensus;
use crate::error::ChainError;

use super::block::Block;
use super::chain::Blockchain;

/// Checks every block after genesis against its predecessor. Stops at the
/// first failure and reports that block's index.
pub fn validate_blocks<C: Consensus>(blocks: &[Block], consensus: &C) -> Result<(), ChainError> {
    for pair in blocks.windows(2) {
        let (previous, block) = (&pair[0], &pair[1]);
        let violation = |reason: &str| ChainError::IntegrityViolation {
            index: block.header.index,
            reason: reason.to_string(),
        };

        if !block.has_valid_transactions() {
            return Err(violation("block contains invalid transactions"));
        }
        if block.hash != block.recompute_hash() {
            return Err(violation("stored hash does not match recomputed hash"));
        }
        if block.header.previous_hash != previous.hash {
            return Err(violation("previous hash does not match predecessor"));
        }
        if !consensus.validate_block_extra(block) {
            return Err(violation("block seal rejected by consensus"));
        }
    }
    Ok(())
}

impl<C: Consensus> Blockchain<C> {
    /// Read-only integrity scan. Nothing is repaired and later appends are not
    /// blocked by a failure.
    pub fn validate_chain(&self) -> Result<(), ChainError> {
        validate_blocks(&self.blocks, &self.consensus).map_err(|err| {
            tracing::warn!(consensus = self.consensus.name(), error = %err, "chain validation failed");
            err
        })
    }

    pub fn is_chain_valid(&self) -> bool {
        self.validate_chain().is_ok()
    }
}
