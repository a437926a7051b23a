//! Integrity hashing for persisted context documents
//!
//! Every stored document carries a SHA-256 digest so a damaged record can be
//! told apart from a valid one on load.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of a serialized context document
pub fn compute_document_hash(document: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document.as_bytes());
    hex::encode(hasher.finalize())
}

/// Whether `document` still matches the digest it was stored with
pub fn verify_document(document: &str, expected_hash: &str) -> bool {
    compute_document_hash(document).eq_ignore_ascii_case(expected_hash)
}
