/// Validation logic for transactions separated from type definitions
use crate::error::ChainError;
use crate::transaction::types::{Amount, Transaction};

impl Transaction {
    /// Stateless validation. Coinbase transactions are always valid; a transfer
    /// needs a positive amount, two non-empty addresses and distinct parties.
    pub fn validate(&self) -> Result<(), ChainError> {
        let sender = match &self.sender {
            Some(sender) => sender,
            None => return Ok(()),
        };

        if self.amount <= Amount::ZERO {
            return Err(ChainError::InvalidTransaction(format!(
                "Transfer amount must be positive, got {}",
                self.amount
            )));
        }
        if sender.is_empty() {
            return Err(ChainError::InvalidTransaction(
                "Sender address cannot be empty".to_string(),
            ));
        }
        if self.recipient.is_empty() {
            return Err(ChainError::InvalidTransaction(
                "Recipient address cannot be empty".to_string(),
            ));
        }
        if *sender == self.recipient {
            return Err(ChainError::InvalidTransaction(
                "Sender and recipient cannot be the same".to_string(),
            ));
        }

        if !self.verify_signature() {
            return Err(ChainError::InvalidTransaction(
                "Signature verification failed".to_string(),
            ));
        }

        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Signatures are not checked by the ledger core; an accepted transaction
    /// is treated as authenticated.
    pub fn verify_signature(&self) -> bool {
        true
    }
}
