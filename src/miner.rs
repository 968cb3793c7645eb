//! Proof-of-work nonce search

use crate::blockchain::{hash_meets_difficulty, Block, Seal};
use crate::error::ChainError;
use crossbeam_channel::{bounded, Receiver, TryRecvError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Nonces tried between cancellation checks.
const CANCEL_CHECK_INTERVAL: u64 = 1024;

/// Cooperative cancellation flag shared between a caller and a running search.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Searches nonces from zero upward until the block hash starts with
/// `difficulty` zero characters. The search has no upper bound; only the
/// token can stop it.
pub fn mine_block(block: Block, difficulty: u32, cancel: &CancelToken) -> Result<Block, ChainError> {
    mine_block_with_progress(block, difficulty, cancel, None)
}

fn mine_block_with_progress(
    mut block: Block,
    difficulty: u32,
    cancel: &CancelToken,
    progress: Option<&AtomicU64>,
) -> Result<Block, ChainError> {
    let mut nonce: u64 = 0;
    loop {
        block.header.seal = Seal::Work { nonce };
        block.hash = block.header.hash();
        if hash_meets_difficulty(&block.hash, difficulty) {
            tracing::debug!(index = block.header.index, nonce, "proof of work found");
            return Ok(block);
        }

        nonce = nonce.wrapping_add(1);
        if nonce % CANCEL_CHECK_INTERVAL == 0 {
            if let Some(progress) = progress {
                progress.store(nonce, Ordering::Relaxed);
            }
            if cancel.is_cancelled() {
                tracing::debug!(index = block.header.index, nonce, "mining cancelled");
                return Err(ChainError::MiningCancelled);
            }
        }
    }
}

/// A nonce search running on its own thread.
pub struct MiningJob {
    cancel: CancelToken,
    attempts: Arc<AtomicU64>,
    result: Receiver<Result<Block, ChainError>>,
    handle: Option<JoinHandle<()>>,
}

impl MiningJob {
    pub fn spawn(block: Block, difficulty: u32) -> Self {
        let cancel = CancelToken::new();
        let attempts = Arc::new(AtomicU64::new(0));
        let (tx, rx) = bounded(1);

        let worker_cancel = cancel.clone();
        let worker_attempts = attempts.clone();
        let handle = thread::spawn(move || {
            let mined = mine_block_with_progress(block, difficulty, &worker_cancel, Some(&worker_attempts));
            let _ = tx.send(mined);
        });

        MiningJob {
            cancel,
            attempts,
            result: rx,
            handle: Some(handle),
        }
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Approximate number of nonces tried so far.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Returns the outcome if the search has finished.
    pub fn try_result(&mut self) -> Option<Result<Block, ChainError>> {
        match self.result.try_recv() {
            Ok(result) => {
                self.join();
                Some(result)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(ChainError::MiningCancelled)),
        }
    }

    /// Blocks until the search finishes or is cancelled.
    pub fn wait(mut self) -> Result<Block, ChainError> {
        let result = self.result.recv().unwrap_or(Err(ChainError::MiningCancelled));
        self.join();
        result
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MiningJob {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{Amount, Transaction};

    fn candidate() -> Block {
        Block::new(
            1,
            "0".repeat(64),
            vec![Transaction::coinbase("miner", Amount::from_num(50))],
            Seal::Work { nonce: 0 },
        )
    }

    #[test]
    fn test_mined_block_meets_target() {
        let mined = mine_block(candidate(), 2, &CancelToken::new()).unwrap();
        assert!(mined.hash.starts_with("00"));
        assert_eq!(mined.hash, mined.recompute_hash());
    }

    #[test]
    fn test_difficulty_zero_accepts_first_nonce() {
        let mined = mine_block(candidate(), 0, &CancelToken::new()).unwrap();
        assert_eq!(mined.header.nonce(), Some(0));
    }

    #[test]
    fn test_cancelled_token_stops_search() {
        let token = CancelToken::new();
        token.cancel();
        let result = mine_block(candidate(), 64, &token);
        assert_eq!(result, Err(ChainError::MiningCancelled));
    }

    #[test]
    fn test_background_job_completes() {
        let job = MiningJob::spawn(candidate(), 1);
        let mined = job.wait().unwrap();
        assert!(mined.meets_difficulty(1));
    }

    #[test]
    fn test_background_job_can_be_cancelled() {
        let job = MiningJob::spawn(candidate(), 64);
        job.cancel();
        assert_eq!(job.wait(), Err(ChainError::MiningCancelled));
    }
}
