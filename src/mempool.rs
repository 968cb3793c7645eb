//! Pending transaction pool

use crate::error::ChainError;
use crate::transaction::Transaction;
use std::collections::HashSet;

/// Default upper bound on pending transactions.
pub const DEFAULT_MEMPOOL_CAPACITY: usize = 10_000;

/// Transactions waiting to be sealed, processed in arrival order.
#[derive(Debug, Clone)]
pub struct Mempool {
    transactions: Vec<Transaction>,
    ids: HashSet<String>,
    capacity: usize,
}

impl Default for Mempool {
    fn default() -> Self {
        Self::new()
    }
}

impl Mempool {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MEMPOOL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Mempool {
            transactions: Vec::new(),
            ids: HashSet::new(),
            capacity,
        }
    }

    pub fn add_transaction(&mut self, tx: Transaction) -> Result<(), ChainError> {
        if self.transactions.len() >= self.capacity {
            return Err(ChainError::MempoolFull);
        }
        if self.ids.contains(&tx.id) {
            return Err(ChainError::InvalidTransaction(format!(
                "Transaction {} is already pending",
                tx.id
            )));
        }
        self.ids.insert(tx.id.clone());
        self.transactions.push(tx);
        Ok(())
    }

    pub fn remove_transaction(&mut self, id: &str) -> Option<Transaction> {
        if !self.ids.remove(id) {
            return None;
        }
        let pos = self.transactions.iter().position(|tx| tx.id == id)?;
        Some(self.transactions.remove(pos))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Pending transactions in arrival order.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.transactions.clear();
        self.ids.clear();
    }
}
