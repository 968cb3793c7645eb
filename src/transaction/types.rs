/// Transaction types for DualChain
use crate::crypto::{generate_id, Address};
use crate::error::ChainError;
use fixed::types::I32F32;

/// Fixed-point quantity used for amounts, balances and stakes.
pub type Amount = I32F32;

/// Maximum transaction size in bytes (100KB) to prevent DoS
pub const MAX_TRANSACTION_SIZE: usize = 100_000;

/// A transfer of value between two addresses, or a coinbase credit when
/// `sender` is absent.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Transaction {
    pub id: String,
    pub sender: Option<Address>,
    pub recipient: Address,
    pub amount: Amount,
    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp: u64,
    #[serde(default)]
    pub signature: Option<Vec<u8>>,
}

impl Transaction {
    pub fn new(sender: Option<Address>, recipient: impl Into<Address>, amount: Amount) -> Self {
        Transaction {
            id: generate_id(),
            sender,
            recipient: recipient.into(),
            amount,
            timestamp: chrono::Utc::now().timestamp_millis() as u64,
            signature: None,
        }
    }

    /// System-issued reward crediting `recipient`.
    pub fn coinbase(recipient: impl Into<Address>, amount: Amount) -> Self {
        Self::new(None, recipient, amount)
    }

    pub fn with_signature(mut self, signature: Vec<u8>) -> Self {
        self.signature = Some(signature);
        self
    }

    pub fn is_coinbase(&self) -> bool {
        self.sender.is_none()
    }

    /// Validate serialized size to prevent DoS attacks
    pub fn validate_size(&self) -> Result<(), ChainError> {
        let serialized = bincode::serialize(self)
            .map_err(|e| ChainError::InvalidTransaction(format!("Serialization failed: {}", e)))?;

        if serialized.len() > MAX_TRANSACTION_SIZE {
            return Err(ChainError::InvalidTransaction(format!(
                "Transaction too large: {} bytes (max: {})",
                serialized.len(),
                MAX_TRANSACTION_SIZE
            )));
        }
        Ok(())
    }
}
