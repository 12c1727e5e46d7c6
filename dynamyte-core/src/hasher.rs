use sha2::{Digest, Sha256};

/// Digest used for ring positions and Merkle tree hashes.
///
/// Every node in a cluster must use the same implementation, otherwise
/// nodes disagree on key ownership and tree shapes.
pub trait Hasher: Send + Sync {
    fn hash(&self, input: &str) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl Hasher for Sha256Hasher {
    fn hash(&self, input: &str) -> String {
        compute_hash(input.as_bytes())
    }
}

/// Compute SHA256 hash of data
pub fn compute_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
