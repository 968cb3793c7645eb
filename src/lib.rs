//! DualChain - an append-only transaction ledger with interchangeable
//! proof-of-work and proof-of-stake consensus
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`blockchain`] - Blocks, chain orchestration, ledger state and validation
//! - [`transaction`] - Transaction type and validity rules
//! - [`mempool`] - Pending transaction pool
//!
//! ## Consensus
//! - [`consensus`] - The `Consensus` trait with proof-of-work and proof-of-stake
//! - [`miner`] - Cancellable nonce search
//! - [`staking`] - Validator registry and stake-weighted selection
//!
//! ## Cryptography
//! - [`crypto`] - Hashing, Merkle roots and identifiers
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod mempool;
pub mod transaction;

// ============================================================================
// Consensus
// ============================================================================
pub mod consensus;
pub mod miner;
pub mod staking;

// ============================================================================
// Cryptography
// ============================================================================
pub mod crypto;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;

pub use blockchain::{Block, Blockchain, ChainSnapshot, Ledger, Seal, SharedChain};
pub use consensus::{Consensus, ProofOfStake, ProofOfWork};
pub use error::{ChainError, Result};
pub use transaction::{Amount, Transaction};

/// Proof-of-work chain.
pub type PowChain = Blockchain<ProofOfWork>;

/// Proof-of-stake chain.
pub type PosChain = Blockchain<ProofOfStake>;
