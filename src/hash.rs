//! Domain-separated SHA-256 hashing.
//!
//! Every hash in the protocol is `SHA256(tag || parts...)` where `tag` is one
//! of the fixed ASCII prefixes below. A leaf hash and an internal node hash can
//! therefore never collide even when their inputs have the same length.
//!
//! SHA-256 is the digest computed by the device secure element, so the server
//! side must use it too.

use crate::types::{Hash, HASH_SIZE};
use sha2::{Digest, Sha256};

/// Tag for leaf hashes: `SHA256("leaf:" || device_id)`.
pub const LEAF_TAG: &[u8] = b"leaf:";
/// Tag for internal nodes: `SHA256("node:" || left || right)`.
pub const NODE_TAG: &[u8] = b"node:";
/// Tag for nullifiers.
pub const NULLIFIER_TAG: &[u8] = b"nullifier:v1:";
/// Tag for contribution commitments.
pub const COMMITMENT_TAG: &[u8] = b"commitment:v1:";

/// Hashes `parts` in order after the domain `tag`.
#[inline]
#[must_use]
pub fn tagged_hash(tag: &[u8], parts: &[&[u8]]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(tag);
    for part in parts {
        hasher.update(part);
    }
    let digest: [u8; HASH_SIZE] = hasher.finalize().into();
    digest
}

/// Leaf hash of a device's public identifier.
#[inline]
#[must_use]
pub fn leaf_hash(device_id: &[u8]) -> Hash {
    tagged_hash(LEAF_TAG, &[device_id])
}

/// Parent hash of two sibling nodes.
#[inline]
#[must_use]
pub fn node_hash(left: &Hash, right: &Hash) -> Hash {
    tagged_hash(NODE_TAG, &[left, right])
}
