//! Snapshot digests for the run report.
//!
//! The digest lets an operator tell whether two runs saw the same config
//! without opening the repository.

use sha2::{Digest, Sha256};

/// SHA-256 of `data` as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
