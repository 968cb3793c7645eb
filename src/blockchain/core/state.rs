use crate::crypto::Address;
use crate::error::ChainError;
use crate::transaction::{Amount, Transaction};
use std::collections::HashMap;

/// Address balances derived from sealed blocks.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Ledger {
    pub balances: HashMap<Address, Amount>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_balance(&self, address: &str) -> Amount {
        self.balances.get(address).copied().unwrap_or(Amount::ZERO)
    }

    /// Settles a sealed block's transactions in order. Senders are debited
    /// without a sufficiency check; that happened at pool admission. Nothing
    /// is written unless every transaction settles.
    pub fn apply_block(&mut self, transactions: &[Transaction]) -> Result<(), ChainError> {
        let mut pending = self.pending();
        for tx in transactions {
            pending.settle(tx)?;
        }
        let staged = pending.into_staged();
        self.balances.extend(staged);
        Ok(())
    }

    /// Staged view over this ledger for trial settlement.
    pub fn pending(&self) -> PendingBalances<'_> {
        PendingBalances {
            ledger: self,
            staged: HashMap::new(),
        }
    }

    pub fn credit(&mut self, address: &str, amount: Amount) -> Result<Amount, ChainError> {
        let balance = checked_balance(address, self.get_balance(address).checked_add(amount))?;
        self.balances.insert(address.to_string(), balance);
        Ok(balance)
    }

    pub fn debit(&mut self, address: &str, amount: Amount) -> Result<Amount, ChainError> {
        let balance = checked_balance(address, self.get_balance(address).checked_sub(amount))?;
        self.balances.insert(address.to_string(), balance);
        Ok(balance)
    }

    /// Sum of all balances, saturating at the fixed-point limits.
    pub fn total_supply(&self) -> Amount {
        self.balances
            .values()
            .fold(Amount::ZERO, |total, balance| total.saturating_add(*balance))
    }
}

fn checked_balance(address: &str, balance: Option<Amount>) -> Result<Amount, ChainError> {
    balance.ok_or_else(|| ChainError::InvalidAmount(format!("balance of {} would overflow", address)))
}

/// Balance changes layered over a [`Ledger`] without touching it.
#[derive(Debug)]
pub struct PendingBalances<'a> {
    ledger: &'a Ledger,
    staged: HashMap<Address, Amount>,
}

impl PendingBalances<'_> {
    fn into_staged(self) -> HashMap<Address, Amount> {
        self.staged
    }

    pub fn get_balance(&self, address: &str) -> Amount {
        self.staged
            .get(address)
            .copied()
            .unwrap_or_else(|| self.ledger.get_balance(address))
    }

    /// Applies one transaction, or leaves the staged balances unchanged if
    /// either side would overflow.
    pub fn settle(&mut self, tx: &Transaction) -> Result<(), ChainError> {
        let debited = match &tx.sender {
            Some(sender) => {
                let balance = checked_balance(sender, self.get_balance(sender).checked_sub(tx.amount))?;
                Some((sender.clone(), balance))
            }
            None => None,
        };
        let credited = checked_balance(
            &tx.recipient,
            self.get_balance(&tx.recipient).checked_add(tx.amount),
        )?;

        if let Some((sender, balance)) = debited {
            self.staged.insert(sender, balance);
        }
        self.staged.insert(tx.recipient.clone(), credited);
        Ok(())
    }
}
