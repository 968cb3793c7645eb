use crate::consensus::ProofOfStake;
use crate::error::ChainError;
use crate::miner::CancelToken;
use crate::staking::Validator;
use crate::transaction::Amount;
use rand::Rng;

use super::block::{Block, Seal};
use super::chain::Blockchain;

impl Blockchain<ProofOfStake> {
    pub fn proof_of_stake(minimum_stake: Amount, block_reward: Amount) -> Self {
        Self::new(ProofOfStake::new(minimum_stake), block_reward)
    }

    pub fn minimum_stake(&self) -> Amount {
        self.consensus.minimum_stake()
    }

    /// Lock `amount` of the address's balance as validator stake. Returns the
    /// validator's total stake.
    pub fn stake(&mut self, address: &str, amount: Amount) -> Result<Amount, ChainError> {
        let balance = self.ledger.get_balance(address);
        if balance < amount {
            return Err(ChainError::InsufficientBalance {
                address: address.to_string(),
                balance,
                required: amount,
            });
        }

        let staked = self.consensus.registry.deposit(address, amount)?.stake;
        // Cannot fail: the deposit is positive and covered by the balance.
        self.ledger.debit(address, amount)?;
        tracing::info!(validator = address, deposit = %amount, stake = %staked, "stake deposited");
        Ok(staked)
    }

    /// Release `amount` of stake back to the address's balance. Returns the
    /// remaining stake; the validator is dropped if that is below the minimum.
    pub fn unstake(&mut self, address: &str, amount: Amount) -> Result<Amount, ChainError> {
        if self.ledger.get_balance(address).checked_add(amount).is_none() {
            return Err(ChainError::InvalidAmount(format!(
                "balance of {} would overflow",
                address
            )));
        }

        let remaining = self.consensus.registry.withdraw(address, amount)?;
        self.ledger.credit(address, amount)?;
        tracing::info!(validator = address, withdrawn = %amount, stake = %remaining, "stake withdrawn");
        Ok(remaining)
    }

    pub fn get_total_stake(&self) -> Amount {
        self.consensus.registry.total_stake()
    }

    pub fn validators(&self) -> &[Validator] {
        self.consensus.registry.validators()
    }

    pub fn get_validator(&self, address: &str) -> Option<&Validator> {
        self.consensus.registry.get(address)
    }

    pub fn select_validator(&self) -> Option<&Validator> {
        self.select_validator_with(&mut rand::thread_rng())
    }

    pub fn select_validator_with<R: Rng>(&self, rng: &mut R) -> Option<&Validator> {
        self.consensus.registry.select_with(rng)
    }

    /// Pick a producer by stake-weighted lottery and seal the pending pool plus
    /// its reward into a new block.
    pub fn forge_block(&mut self) -> Result<&Block, ChainError> {
        self.forge_block_with(&mut rand::thread_rng())
    }

    pub fn forge_block_with<R: Rng>(&mut self, rng: &mut R) -> Result<&Block, ChainError> {
        let (validator, stake) = self
            .select_validator_with(rng)
            .map(|v| (v.address.clone(), v.stake))
            .ok_or(ChainError::NoActiveValidators)?;

        tracing::debug!(validator = %validator, stake = %stake, "validator selected");
        let seal = Seal::Stake {
            validator: validator.clone(),
            stake,
        };
        self.produce_block(&validator, seal, &CancelToken::new())
    }
}
