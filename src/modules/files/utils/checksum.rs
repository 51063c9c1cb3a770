//! Content checksum calculation utilities

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Supported checksum algorithms
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub enum ChecksumAlgorithm {
    Md5,
    #[default]
    Sha1,
    Sha256,
}

/// Hex digest of an in-memory buffer
pub fn checksum_bytes(data: &[u8], algorithm: ChecksumAlgorithm) -> String {
    match algorithm {
        ChecksumAlgorithm::Md5 => format!("{:x}", Md5::digest(data)),
        ChecksumAlgorithm::Sha1 => format!("{:x}", Sha1::digest(data)),
        ChecksumAlgorithm::Sha256 => format!("{:x}", Sha256::digest(data)),
    }
}
