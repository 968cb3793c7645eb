//! Error types for DualChain

use crate::crypto::Address;
use crate::transaction::Amount;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChainError {
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
    #[error("Insufficient balance for {address}: has {balance}, needs {required}")]
    InsufficientBalance {
        address: Address,
        balance: Amount,
        required: Amount,
    },
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Stake deposit {amount} is below the minimum stake {minimum}")]
    StakeBelowMinimum { amount: Amount, minimum: Amount },
    #[error("Unknown validator: {0}")]
    UnknownValidator(Address),
    #[error("Insufficient stake for {address}: staked {staked}, requested {requested}")]
    InsufficientStake {
        address: Address,
        staked: Amount,
        requested: Amount,
    },
    #[error("No active validators")]
    NoActiveValidators,
    #[error("Mempool is full")]
    MempoolFull,
    #[error("Mining cancelled")]
    MiningCancelled,
    #[error("Invalid block: {0}")]
    InvalidBlock(String),
    #[error("Chain integrity violated at block {index}: {reason}")]
    IntegrityViolation { index: u64, reason: String },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::Io(err.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for ChainError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        ChainError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::Config(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
