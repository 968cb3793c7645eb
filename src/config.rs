//! Configuration management for DualChain

use crate::blockchain::Blockchain;
use crate::consensus::{ProofOfStake, ProofOfWork, DEFAULT_DIFFICULTY, DEFAULT_MINIMUM_STAKE, MAX_DIFFICULTY};
use crate::crypto::Address;
use crate::error::ChainError;
use crate::mempool::DEFAULT_MEMPOOL_CAPACITY;
use crate::transaction::Amount;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "dualchain.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub pow: PowConfig,
    #[serde(default)]
    pub pos: PosConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_block_reward")]
    pub block_reward: f64,
    #[serde(default = "default_mempool_capacity")]
    pub mempool_capacity: usize,
    /// Balances credited in the genesis block.
    #[serde(default)]
    pub initial_balances: BTreeMap<Address, f64>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            block_reward: default_block_reward(),
            mempool_capacity: default_mempool_capacity(),
            initial_balances: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PowConfig {
    #[serde(default = "default_difficulty")]
    pub difficulty: u32,
}

impl Default for PowConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PosConfig {
    #[serde(default = "default_minimum_stake")]
    pub minimum_stake: f64,
}

impl Default for PosConfig {
    fn default() -> Self {
        Self {
            minimum_stake: default_minimum_stake(),
        }
    }
}

fn default_block_reward() -> f64 {
    crate::blockchain::DEFAULT_BLOCK_REWARD as f64
}

fn default_mempool_capacity() -> usize {
    DEFAULT_MEMPOOL_CAPACITY
}

fn default_difficulty() -> u32 {
    DEFAULT_DIFFICULTY
}

fn default_minimum_stake() -> f64 {
    DEFAULT_MINIMUM_STAKE as f64
}

/// Amounts must be non-negative and fit the fixed-point range.
fn check_amount(name: &str, value: f64) -> Result<(), ChainError> {
    if value < 0.0 || Amount::checked_from_num(value).is_none() {
        return Err(ChainError::Config(format!(
            "{} must be a non-negative number no greater than {}",
            name,
            Amount::MAX
        )));
    }
    Ok(())
}

impl Config {
    pub fn validate(&self) -> Result<(), ChainError> {
        check_amount("chain.block_reward", self.chain.block_reward)?;
        if self.chain.mempool_capacity == 0 {
            return Err(ChainError::Config(
                "chain.mempool_capacity must be at least 1".to_string(),
            ));
        }
        if self.pow.difficulty == 0 || self.pow.difficulty > MAX_DIFFICULTY {
            return Err(ChainError::Config(format!(
                "pow.difficulty must be between 1 and {}",
                MAX_DIFFICULTY
            )));
        }
        check_amount("pos.minimum_stake", self.pos.minimum_stake)?;
        for (address, balance) in &self.chain.initial_balances {
            if address.is_empty() {
                return Err(ChainError::Config(
                    "chain.initial_balances cannot contain an empty address".to_string(),
                ));
            }
            check_amount(&format!("chain.initial_balances.{}", address), *balance)?;
        }
        Ok(())
    }

    pub fn block_reward(&self) -> Amount {
        Amount::from_num(self.chain.block_reward)
    }

    pub fn minimum_stake(&self) -> Amount {
        Amount::from_num(self.pos.minimum_stake)
    }

    pub fn initial_balances(&self) -> Vec<(Address, Amount)> {
        self.chain
            .initial_balances
            .iter()
            .map(|(address, balance)| (address.clone(), Amount::from_num(*balance)))
            .collect()
    }
}

impl Blockchain<ProofOfWork> {
    pub fn from_config(config: &Config) -> Result<Self, ChainError> {
        Blockchain::with_initial_balances(
            ProofOfWork::new(config.pow.difficulty),
            config.block_reward(),
            config.initial_balances(),
        )
        .with_mempool_capacity(config.chain.mempool_capacity)
    }
}

impl Blockchain<ProofOfStake> {
    pub fn from_config(config: &Config) -> Result<Self, ChainError> {
        Blockchain::with_initial_balances(
            ProofOfStake::new(config.minimum_stake()),
            config.block_reward(),
            config.initial_balances(),
        )
        .with_mempool_capacity(config.chain.mempool_capacity)
    }
}

pub fn parse_config(config_str: &str) -> Result<Config, ChainError> {
    let config: Config = toml::from_str(config_str)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from `path`, falling back to defaults when the file
/// does not exist.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ChainError> {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(config_str) => parse_config(&config_str),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Ok(Config::default())
        }
        Err(e) => Err(e.into()),
    }
}
