use crate::consensus::{Consensus, ProofOfWork};
use crate::crypto::Address;
use crate::error::ChainError;
use crate::mempool::Mempool;
use crate::miner::{CancelToken, MiningJob};
use crate::transaction::{Amount, Transaction};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::block::{Block, Seal};
use super::state::Ledger;

pub const GENESIS_TIMESTAMP: u64 = 1672531200000;
pub const GENESIS_PREVIOUS_HASH: &str = "0";
pub const DEFAULT_BLOCK_REWARD: i64 = 50;

/// A chain shared between threads. Pool submission and block production must
/// go through the write lock so a drained pool is never observed half-sealed.
pub type SharedChain<C> = Arc<RwLock<Blockchain<C>>>;

/// Append-only chain of blocks, generic over the block-production rule.
#[derive(Debug, Clone)]
pub struct Blockchain<C: Consensus> {
    pub blocks: Vec<Block>,
    pub mempool: Mempool,
    pub ledger: Ledger,
    pub consensus: C,
    pub block_reward: Amount,
}

impl<C: Consensus> Blockchain<C> {
    /// Create a chain holding only the genesis block.
    pub fn new(consensus: C, block_reward: Amount) -> Self {
        Self::with_initial_balances(consensus, block_reward, Vec::new())
    }

    /// Create a chain whose genesis block credits each initial balance with a
    /// coinbase transaction.
    pub fn with_initial_balances<I>(consensus: C, block_reward: Amount, initial_balances: I) -> Self
    where
        I: IntoIterator<Item = (Address, Amount)>,
    {
        let genesis_block = Self::create_genesis_block(&consensus, initial_balances);
        // One coinbase per distinct address, so genesis settlement cannot overflow.
        let ledger = Ledger {
            balances: genesis_block
                .transactions
                .iter()
                .map(|tx| (tx.recipient.clone(), tx.amount))
                .collect(),
        };

        tracing::info!(
            consensus = consensus.name(),
            hash = %genesis_block.hash,
            accounts = genesis_block.transactions.len(),
            "genesis block created"
        );

        Blockchain {
            blocks: vec![genesis_block],
            mempool: Mempool::new(),
            ledger,
            consensus,
            block_reward,
        }
    }

    /// Replace the pending pool with one of the given capacity, carrying over
    /// pending transactions. Fails with `MempoolFull` if they do not fit.
    pub fn with_mempool_capacity(mut self, capacity: usize) -> Result<Self, ChainError> {
        let pending = std::mem::replace(&mut self.mempool, Mempool::with_capacity(capacity));
        for tx in pending.transactions() {
            self.mempool.add_transaction(tx.clone())?;
        }
        Ok(self)
    }

    pub fn into_shared(self) -> SharedChain<C> {
        Arc::new(RwLock::new(self))
    }

    fn create_genesis_block<I>(consensus: &C, initial_balances: I) -> Block
    where
        I: IntoIterator<Item = (Address, Amount)>,
    {
        let ordered: BTreeMap<Address, Amount> = initial_balances.into_iter().collect();
        let transactions = ordered
            .into_iter()
            .filter(|(_, amount)| *amount > Amount::ZERO)
            .map(|(address, amount)| Transaction::coinbase(address, amount))
            .collect();

        Block::with_timestamp(
            0,
            GENESIS_TIMESTAMP,
            GENESIS_PREVIOUS_HASH.to_string(),
            transactions,
            consensus.genesis_seal(),
        )
    }

    /// Admit a transaction to the pending pool. Sender funds are checked
    /// against sealed balances only; other pending spends are not counted.
    pub fn submit_transaction(&mut self, tx: Transaction) -> Result<String, ChainError> {
        tx.validate()?;
        tx.validate_size()?;

        if let Some(sender) = &tx.sender {
            let balance = self.ledger.get_balance(sender);
            if balance < tx.amount {
                return Err(ChainError::InsufficientBalance {
                    address: sender.clone(),
                    balance,
                    required: tx.amount,
                });
            }
        }

        self.ledger.pending().settle(&tx)?;

        let id = tx.id.clone();
        self.mempool.add_transaction(tx)?;
        tracing::debug!(tx = %id, pending = self.mempool.len(), "transaction admitted");
        Ok(id)
    }

    /// Build and submit a transaction, returning its id.
    pub fn create_transaction(
        &mut self,
        sender: Option<Address>,
        recipient: impl Into<Address>,
        amount: Amount,
    ) -> Result<String, ChainError> {
        self.submit_transaction(Transaction::new(sender, recipient, amount))
    }

    pub fn get_balance(&self, address: &str) -> Amount {
        self.ledger.get_balance(address)
    }

    pub fn latest_block(&self) -> &Block {
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Never true: the genesis block is always present.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.mempool.len()
    }

    pub fn pending_transactions(&self) -> &[Transaction] {
        self.mempool.transactions()
    }

    /// Finds a sealed transaction and the index of the block holding it.
    pub fn get_transaction(&self, id: &str) -> Option<(u64, &Transaction)> {
        self.blocks.iter().find_map(|block| {
            block
                .transactions
                .iter()
                .find(|tx| tx.id == id)
                .map(|tx| (block.header.index, tx))
        })
    }

    /// Unsealed block holding the pending transactions followed by the reward
    /// for `reward_address`. Pending transactions that would overflow a
    /// balance given those before them are left in the pool.
    pub fn build_candidate(&self, reward_address: &str, seal: Seal) -> Block {
        let mut balances = self.ledger.pending();
        let mut transactions = Vec::with_capacity(self.mempool.len() + 1);
        for tx in self.mempool.transactions() {
            match balances.settle(tx) {
                Ok(()) => transactions.push(tx.clone()),
                Err(err) => tracing::warn!(tx = %tx.id, error = %err, "pending transaction left out of candidate"),
            }
        }
        transactions.push(Transaction::coinbase(reward_address, self.block_reward));
        Block::new(
            self.blocks.len() as u64,
            self.latest_block().hash.clone(),
            transactions,
            seal,
        )
    }

    /// Seal a candidate with this chain's consensus and append it. A failed or
    /// cancelled seal leaves the chain and pool untouched.
    pub(crate) fn produce_block(
        &mut self,
        reward_address: &str,
        seal: Seal,
        cancel: &CancelToken,
    ) -> Result<&Block, ChainError> {
        let candidate = self.build_candidate(reward_address, seal);
        let sealed = self.consensus.seal_block(candidate, cancel)?;
        self.apply_block(sealed)
    }

    /// Append a sealed block after checking it extends the current tip, then
    /// settle it in the ledger and drop its transactions from the pool.
    pub fn apply_block(&mut self, block: Block) -> Result<&Block, ChainError> {
        let tip = self.latest_block();
        let expected_index = self.blocks.len() as u64;

        if block.header.index != expected_index {
            return Err(ChainError::InvalidBlock(format!(
                "Invalid block index. Expected {}, but got {}.",
                expected_index, block.header.index
            )));
        }
        if block.header.previous_hash != tip.hash {
            return Err(ChainError::InvalidBlock(format!(
                "Invalid previous block hash. Expected {}, but got {}.",
                tip.hash, block.header.previous_hash
            )));
        }
        if !block.has_valid_hash() {
            return Err(ChainError::InvalidBlock(format!(
                "Block hash {} does not match its header.",
                block.hash
            )));
        }
        if !self.consensus.validate_block_extra(&block) {
            return Err(ChainError::InvalidBlock(format!(
                "Block seal rejected by {}.",
                self.consensus.name()
            )));
        }
        if block.transactions.is_empty() {
            return Err(ChainError::InvalidBlock(
                "Block must contain at least the reward transaction.".to_string(),
            ));
        }
        if !block.has_valid_transactions() {
            return Err(ChainError::InvalidBlock(
                "Block contains invalid transactions.".to_string(),
            ));
        }
        let expected_merkle_root = Block::calculate_merkle_root(&block.transactions);
        if expected_merkle_root != block.header.merkle_root {
            return Err(ChainError::InvalidBlock(format!(
                "Merkle root mismatch. Expected {}, but got {}.",
                expected_merkle_root, block.header.merkle_root
            )));
        }

        self.ledger
            .apply_block(&block.transactions)
            .map_err(|err| ChainError::InvalidBlock(format!("Block cannot be settled: {}", err)))?;
        for tx in &block.transactions {
            self.mempool.remove_transaction(&tx.id);
        }

        tracing::info!(
            consensus = self.consensus.name(),
            index = block.header.index,
            hash = %block.hash,
            transactions = block.transactions.len(),
            "block appended"
        );
        self.blocks.push(block);
        Ok(self.latest_block())
    }
}

impl Blockchain<ProofOfWork> {
    pub fn proof_of_work(difficulty: u32, block_reward: Amount) -> Self {
        Self::new(ProofOfWork::new(difficulty), block_reward)
    }

    pub fn difficulty(&self) -> u32 {
        self.consensus.difficulty
    }

    /// Mine every pending transaction plus the reward into a new block. The
    /// nonce search is unbounded.
    pub fn seal_pending_block(&mut self, reward_address: &str) -> Result<&Block, ChainError> {
        self.seal_pending_block_with_cancel(reward_address, &CancelToken::new())
    }

    pub fn seal_pending_block_with_cancel(
        &mut self,
        reward_address: &str,
        cancel: &CancelToken,
    ) -> Result<&Block, ChainError> {
        self.produce_block(reward_address, Seal::Work { nonce: 0 }, cancel)
    }

    /// Start mining the current pool on a worker thread. Hand the mined block
    /// back through [`Blockchain::apply_block`].
    pub fn start_mining(&self, reward_address: &str) -> MiningJob {
        let candidate = self.build_candidate(reward_address, Seal::Work { nonce: 0 });
        MiningJob::spawn(candidate, self.difficulty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amount(n: i32) -> Amount {
        Amount::from_num(n)
    }

    fn funded_chain() -> Blockchain<ProofOfWork> {
        Blockchain::with_initial_balances(
            ProofOfWork::new(1),
            amount(50),
            vec![("alice".to_string(), amount(100))],
        )
    }

    #[test]
    fn test_genesis_block() {
        let chain = Blockchain::proof_of_work(2, amount(50));
        assert_eq!(chain.len(), 1);
        let genesis = chain.latest_block();
        assert_eq!(genesis.header.index, 0);
        assert_eq!(genesis.header.previous_hash, "0");
        assert!(genesis.transactions.is_empty());
        assert_eq!(chain.pending_len(), 0);
    }

    #[test]
    fn test_initial_balances_live_in_genesis() {
        let chain = funded_chain();
        assert_eq!(chain.blocks[0].transactions.len(), 1);
        assert_eq!(chain.get_balance("alice"), amount(100));
    }

    #[test]
    fn test_submit_rejects_invalid_transaction() {
        let mut chain = funded_chain();
        let tx = Transaction::new(Some("alice".into()), "alice", amount(5));
        assert!(matches!(
            chain.submit_transaction(tx),
            Err(ChainError::InvalidTransaction(_))
        ));
        assert_eq!(chain.pending_len(), 0);
    }

    #[test]
    fn test_submit_rejects_insufficient_balance() {
        let mut chain = funded_chain();
        let result = chain.create_transaction(Some("alice".into()), "bob", amount(101));
        assert!(matches!(result, Err(ChainError::InsufficientBalance { .. })));
        assert_eq!(chain.pending_len(), 0);
    }

    #[test]
    fn test_pending_spends_are_not_accumulated() {
        let mut chain = funded_chain();
        chain.create_transaction(Some("alice".into()), "bob", amount(80)).unwrap();
        chain.create_transaction(Some("alice".into()), "carol", amount(80)).unwrap();
        assert_eq!(chain.pending_len(), 2);
        assert_eq!(chain.get_balance("alice"), amount(100));

        chain.seal_pending_block("miner").unwrap();
        assert_eq!(chain.get_balance("alice"), amount(-60));
    }

    #[test]
    fn test_seal_pending_block_appends_reward_last() {
        let mut chain = funded_chain();
        let id = chain.create_transaction(Some("alice".into()), "bob", amount(30)).unwrap();

        let block = chain.seal_pending_block("miner").unwrap().clone();
        assert_eq!(block.header.index, 1);
        assert_eq!(block.transactions.len(), 2);
        assert_eq!(block.transactions[0].id, id);
        assert!(block.transactions[1].is_coinbase());
        assert!(block.hash.starts_with('0'));

        assert_eq!(chain.pending_len(), 0);
        assert_eq!(chain.get_balance("alice"), amount(70));
        assert_eq!(chain.get_balance("bob"), amount(30));
        assert_eq!(chain.get_balance("miner"), amount(50));
        assert_eq!(chain.get_transaction(&id).map(|(index, _)| index), Some(1));
    }

    #[test]
    fn test_seal_on_empty_pool_mints_reward_only() {
        let mut chain = Blockchain::proof_of_work(1, amount(50));
        let block = chain.seal_pending_block("miner").unwrap();
        assert_eq!(block.transactions.len(), 1);
        assert_eq!(chain.get_balance("miner"), amount(50));
    }

    #[test]
    fn test_cancelled_seal_leaves_state_untouched() {
        let mut chain = Blockchain::proof_of_work(64, amount(50));
        chain.create_transaction(None, "alice", amount(5)).unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        let result = chain.seal_pending_block_with_cancel("miner", &cancel);
        assert_eq!(result.err(), Some(ChainError::MiningCancelled));
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.pending_len(), 1);
        assert_eq!(chain.get_balance("alice"), Amount::ZERO);
    }

    #[test]
    fn test_apply_block_rejects_stale_parent() {
        let mut chain = Blockchain::proof_of_work(1, amount(50));
        let stale = chain.start_mining("miner").wait().unwrap();
        chain.seal_pending_block("miner").unwrap();

        let result = chain.apply_block(stale);
        assert!(matches!(result, Err(ChainError::InvalidBlock(_))));
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn test_apply_block_rejects_unmet_target() {
        let mut chain = Blockchain::proof_of_work(3, amount(50));
        let mut candidate = chain.build_candidate("miner", Seal::Work { nonce: 0 });
        let mut nonce = 0;
        while candidate.meets_difficulty(3) {
            nonce += 1;
            candidate.header.seal = Seal::Work { nonce };
            candidate.hash = candidate.recompute_hash();
        }
        assert!(chain.apply_block(candidate).is_err());
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_background_mining_result_applies() {
        let mut chain = Blockchain::proof_of_work(1, amount(50));
        chain.create_transaction(None, "alice", amount(5)).unwrap();

        let mined = chain.start_mining("miner").wait().unwrap();
        chain.apply_block(mined).unwrap();

        assert_eq!(chain.len(), 2);
        assert_eq!(chain.pending_len(), 0);
        assert_eq!(chain.get_balance("alice"), amount(5));
    }

    #[test]
    fn test_shared_chain_serializes_writers() {
        let shared = Blockchain::proof_of_work(1, amount(50)).into_shared();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let chain = shared.clone();
                std::thread::spawn(move || {
                    let mut chain = chain.write();
                    chain.create_transaction(None, format!("user{}", i), amount(1)).unwrap();
                    let sealed = chain.seal_pending_block("miner").map(|b| b.header.index);
                    sealed
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap().is_ok());
        }

        let chain = shared.read();
        assert_eq!(chain.len(), 5);
        assert!(chain.is_chain_valid());
        assert_eq!(chain.get_balance("miner"), amount(200));
    }

    #[test]
    fn test_overflowing_reward_leaves_chain_untouched() {
        let mut chain = Blockchain::proof_of_work(1, amount(50));
        chain.create_transaction(None, "alice", Amount::MAX).unwrap();

        let result = chain.seal_pending_block("alice");
        assert!(matches!(result, Err(ChainError::InvalidBlock(_))));
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.pending_len(), 1);
        assert_eq!(chain.get_balance("alice"), Amount::ZERO);

        chain.seal_pending_block("miner").unwrap();
        assert_eq!(chain.get_balance("alice"), Amount::MAX);
        assert_eq!(chain.get_balance("miner"), amount(50));
        assert!(chain.is_chain_valid());
    }

    #[test]
    fn test_submit_rejects_overflowing_credit() {
        let mut chain = Blockchain::with_initial_balances(
            ProofOfWork::new(1),
            amount(50),
            vec![("alice".to_string(), Amount::MAX), ("bob".to_string(), amount(10))],
        );
        assert!(matches!(
            chain.create_transaction(None, "alice", amount(1)),
            Err(ChainError::InvalidAmount(_))
        ));
        assert!(matches!(
            chain.create_transaction(Some("bob".into()), "alice", amount(1)),
            Err(ChainError::InvalidAmount(_))
        ));
        assert_eq!(chain.pending_len(), 0);
    }

    #[test]
    fn test_candidate_leaves_out_overflowing_transactions() {
        let mut chain = Blockchain::proof_of_work(1, amount(50));
        let first = chain.create_transaction(None, "bob", Amount::MAX).unwrap();
        let second = chain.create_transaction(None, "bob", Amount::MAX).unwrap();

        let block = chain.seal_pending_block("miner").unwrap();
        assert_eq!(block.transactions.len(), 2);
        assert_eq!(block.transactions[0].id, first);
        assert!(block.transactions[1].is_coinbase());

        assert_eq!(chain.pending_transactions()[0].id, second);
        assert_eq!(chain.get_balance("bob"), Amount::MAX);
    }

    #[test]
    fn test_with_mempool_capacity_keeps_pending() {
        let mut chain = Blockchain::proof_of_work(1, amount(50));
        chain.create_transaction(None, "alice", amount(1)).unwrap();
        chain.create_transaction(None, "bob", amount(1)).unwrap();

        assert_eq!(
            chain.clone().with_mempool_capacity(1).err(),
            Some(ChainError::MempoolFull)
        );
        let chain = chain.with_mempool_capacity(5).unwrap();
        assert_eq!(chain.pending_len(), 2);
        assert_eq!(chain.mempool.capacity(), 5);
    }
}
