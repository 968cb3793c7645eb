//! Hashing primitives for DualChain

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Account address. Addresses are opaque, non-empty strings.
pub type Address = String;

/// Hex-encoded SHA-256 digest.
pub type HashDigest = String;

/// Number of random bytes behind a generated identifier.
const ID_BYTES: usize = 16;

/// Hashes arbitrary bytes into a lowercase hex SHA-256 digest.
pub fn hash(input: impl AsRef<[u8]>) -> HashDigest {
    hex::encode(Sha256::digest(input.as_ref()))
}

/// Reduces an ordered list of identifiers to a single Merkle root.
///
/// An empty list hashes the empty string and a single element is returned
/// as-is. Otherwise adjacent pairs are hashed left to right, duplicating the
/// last element of any odd-length level, until one value remains.
pub fn merkle_root<S: AsRef<str>>(ids: &[S]) -> HashDigest {
    match ids.len() {
        0 => return hash(""),
        1 => return ids[0].as_ref().to_string(),
        _ => {}
    }

    let mut level: Vec<HashDigest> = ids.iter().map(|id| id.as_ref().to_string()).collect();
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            if let Some(last) = level.last().cloned() {
                level.push(last);
            }
        }
        level = level
            .chunks(2)
            .map(|pair| {
                let mut hasher = Sha256::new();
                hasher.update(pair[0].as_bytes());
                hasher.update(pair[1].as_bytes());
                hex::encode(hasher.finalize())
            })
            .collect();
    }
    level.remove(0)
}

/// Generates a random identifier. Identifiers are not derived from content,
/// so two otherwise identical transactions never share one.
pub fn generate_id() -> String {
    let mut bytes = [0u8; ID_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
