//! Content fingerprints
//!
//! A project's fingerprint is the SHA-256 of its document hashes, sorted
//! lexicographically and concatenated. It stands in for a version vector:
//! polling clients compare it byte for byte against their cached value to
//! decide whether a full pull is needed, so it must not depend on the order
//! documents were stored or fetched in.

use sha2::{Digest, Sha256};

use crate::models::DocumentHash;

/// SHA-256 hex digest of a document's content
pub fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Combined fingerprint over a project's documents.
///
/// An empty set yields the digest of the empty string.
pub fn compute(docs: &[DocumentHash]) -> String {
    compute_from_hashes(docs.iter().map(|d| d.hash.as_str()))
}

/// Same as [`compute`] over bare hash strings
pub fn compute_from_hashes<I, S>(hashes: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut hashes: Vec<S> = hashes.into_iter().collect();
    hashes.sort_by(|a, b| a.as_ref().cmp(b.as_ref()));

    let mut hasher = Sha256::new();
    for hash in &hashes {
        hasher.update(hash.as_ref().as_bytes());
    }
    hex::encode(hasher.finalize())
}
