use crate::crypto::{merkle_root, Address, HashDigest};
use crate::transaction::{Amount, Transaction};
use sha2::{Digest, Sha256};

/// Consensus-specific header fields that take part in the block hash.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Seal {
    Work { nonce: u64 },
    Stake { validator: Address, stake: Amount },
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BlockHeader {
    pub index: u64,
    pub timestamp: u64,
    pub previous_hash: HashDigest,
    pub merkle_root: HashDigest,
    pub seal: Seal,
}

impl BlockHeader {
    /// Hashes index, previous hash, timestamp, merkle root and seal fields,
    /// in that order.
    pub fn hash(&self) -> HashDigest {
        let mut hasher = Sha256::new();
        hasher.update(self.index.to_string().as_bytes());
        hasher.update(self.previous_hash.as_bytes());
        hasher.update(self.timestamp.to_string().as_bytes());
        hasher.update(self.merkle_root.as_bytes());
        match &self.seal {
            Seal::Work { nonce } => hasher.update(nonce.to_string().as_bytes()),
            Seal::Stake { validator, stake } => {
                hasher.update(validator.as_bytes());
                hasher.update(stake.to_string().as_bytes());
            }
        }
        hex::encode(hasher.finalize())
    }

    pub fn nonce(&self) -> Option<u64> {
        match self.seal {
            Seal::Work { nonce } => Some(nonce),
            Seal::Stake { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
    pub hash: HashDigest,
}

impl Block {
    /// Builds a block stamped with the current time. The merkle root is fixed
    /// here and the hash is computed once for the given seal.
    pub fn new(index: u64, previous_hash: HashDigest, transactions: Vec<Transaction>, seal: Seal) -> Self {
        let timestamp = chrono::Utc::now().timestamp_millis() as u64;
        Self::with_timestamp(index, timestamp, previous_hash, transactions, seal)
    }

    pub fn with_timestamp(
        index: u64,
        timestamp: u64,
        previous_hash: HashDigest,
        transactions: Vec<Transaction>,
        seal: Seal,
    ) -> Self {
        let merkle_root = Block::calculate_merkle_root(&transactions);
        let header = BlockHeader {
            index,
            timestamp,
            previous_hash,
            merkle_root,
            seal,
        };
        let hash = header.hash();
        Block {
            header,
            transactions,
            hash,
        }
    }

    pub fn calculate_merkle_root(transactions: &[Transaction]) -> HashDigest {
        let ids: Vec<&str> = transactions.iter().map(|tx| tx.id.as_str()).collect();
        merkle_root(&ids)
    }

    pub fn recompute_hash(&self) -> HashDigest {
        self.header.hash()
    }

    pub fn has_valid_hash(&self) -> bool {
        self.hash == self.recompute_hash()
    }

    pub fn has_valid_transactions(&self) -> bool {
        self.transactions.iter().all(Transaction::is_valid)
    }

    pub fn meets_difficulty(&self, difficulty: u32) -> bool {
        hash_meets_difficulty(&self.hash, difficulty)
    }
}

/// True when the first `difficulty` characters of `hash` are all `'0'`.
pub fn hash_meets_difficulty(hash: &str, difficulty: u32) -> bool {
    let difficulty = difficulty as usize;
    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_block() -> Block {
        let txs = vec![
            Transaction::coinbase("alice", Amount::from_num(50)),
            Transaction::new(Some("alice".into()), "bob", Amount::from_num(5)),
        ];
        Block::with_timestamp(1, 1_700_000_000_000, "0".repeat(64), txs, Seal::Work { nonce: 7 })
    }

    #[test]
    fn test_hash_binding() {
        let block = sample_block();
        assert_eq!(block.recompute_hash(), block.hash);
        assert!(block.has_valid_hash());
    }

    #[test]
    fn test_mutating_header_changes_hash() {
        let block = sample_block();

        let mut tampered = block.clone();
        tampered.header.index += 1;
        assert_ne!(tampered.recompute_hash(), block.hash);

        let mut tampered = block.clone();
        tampered.header.timestamp += 1;
        assert_ne!(tampered.recompute_hash(), block.hash);

        let mut tampered = block.clone();
        tampered.header.previous_hash = "1".repeat(64);
        assert_ne!(tampered.recompute_hash(), block.hash);

        let mut tampered = block.clone();
        tampered.header.merkle_root = Block::calculate_merkle_root(&block.transactions[..1]);
        assert_ne!(tampered.header.merkle_root, block.header.merkle_root);
        assert_ne!(tampered.recompute_hash(), block.hash);

        let mut tampered = block.clone();
        tampered.header.seal = Seal::Work { nonce: 8 };
        assert_ne!(tampered.recompute_hash(), block.hash);
    }

    #[test]
    fn test_stake_seal_fields_bound_into_hash() {
        let seal = |validator: &str, stake: i32| Seal::Stake {
            validator: validator.to_string(),
            stake: Amount::from_num(stake),
        };
        let a = Block::with_timestamp(1, 1, "0".into(), vec![], seal("bob", 40));
        let b = Block::with_timestamp(1, 1, "0".into(), vec![], seal("bob", 41));
        let c = Block::with_timestamp(1, 1, "0".into(), vec![], seal("carol", 40));
        assert_ne!(a.hash, b.hash);
        assert_ne!(a.hash, c.hash);
        assert_eq!(a.header.nonce(), None);
    }

    #[test]
    fn test_merkle_root_fixed_at_construction() {
        let mut block = sample_block();
        let root = block.header.merkle_root.clone();
        block.transactions.pop();
        assert_eq!(block.header.merkle_root, root);
        assert_ne!(Block::calculate_merkle_root(&block.transactions), root);
    }

    #[test]
    fn test_has_valid_transactions() {
        let mut block = sample_block();
        assert!(block.has_valid_transactions());
        block.transactions[1].amount = Amount::ZERO;
        assert!(!block.has_valid_transactions());
    }

    #[test]
    fn test_hash_meets_difficulty() {
        assert!(hash_meets_difficulty("00ab", 2));
        assert!(!hash_meets_difficulty("0a0b", 2));
        assert!(hash_meets_difficulty("abcd", 0));
        assert!(!hash_meets_difficulty("00", 3));
    }
}
