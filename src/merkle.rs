//! Merkle tree implementation for device membership proofs.
//!
//! A binary tree built bottom-up over an ordered list of leaf hashes. Levels
//! with an odd number of nodes pair the last node with itself, so the tree is
//! a pure function of the leaf list and proof shape depends only on the leaf
//! count. The empty tree has the all-zero root.
//!
//! # Leaf index convention
//!
//! Bit `i` of the leaf index (least significant bit first) selects the fold
//! order at level `i`: `0` means the running node is the left child and is
//! combined as `node(current, sibling)`, `1` means it is the right child and is
//! combined as `node(sibling, current)`.

use crate::error::RegistryError;
use crate::hash::node_hash;
use crate::types::{Hash, ZERO_HASH};
use std::fmt;

/// A Merkle proof for leaf inclusion.
///
/// Contains the leaf hash, the root it was generated against, the sibling
/// hashes from the leaf level upward, and the leaf index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    pub leaf: Hash,
    pub root: Hash,
    pub siblings: Vec<Hash>,
    pub leaf_index: usize,
}

/// A binary Merkle tree.
///
/// Stores the root hash and all leaves. Supports proof generation and verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    pub root: Hash,
    pub leaves: Vec<Hash>,
}

/// Number of sibling hashes in a proof for a tree of `leaf_count` leaves.
///
/// `ceil(log2(n))` for `n > 1`, and `0` for a single leaf or an empty tree.
#[must_use]
pub fn tree_height(leaf_count: usize) -> usize {
    if leaf_count <= 1 {
        return 0;
    }
    (usize::BITS - (leaf_count - 1).leading_zeros()) as usize
}

fn next_level(level: &[Hash]) -> Vec<Hash> {
    level
        .chunks(2)
        .map(|pair| {
            let left = &pair[0];
            let right = pair.get(1).unwrap_or(left);
            node_hash(left, right)
        })
        .collect()
}

/// Computes the root of the tree over `leaves`.
///
/// Returns [`ZERO_HASH`] for an empty leaf list. Callers must treat that value
/// as "registry empty", never as a root to verify against.
#[must_use]
pub fn build_root(leaves: &[Hash]) -> Hash {
    if leaves.is_empty() {
        return ZERO_HASH;
    }

    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = next_level(&level);
    }
    level[0]
}

/// Collects the sibling path for the leaf at `leaf_index`.
///
/// # Errors
///
/// Returns [`RegistryError::LeafIndexOutOfRange`] if `leaf_index` does not
/// address a leaf in `leaves`.
pub fn build_proof(leaves: &[Hash], leaf_index: usize) -> Result<Vec<Hash>, RegistryError> {
    if leaf_index >= leaves.len() {
        return Err(RegistryError::LeafIndexOutOfRange {
            index: leaf_index,
            len: leaves.len(),
        });
    }

    let mut siblings = Vec::with_capacity(tree_height(leaves.len()));
    let mut level = leaves.to_vec();
    let mut index = leaf_index;

    while level.len() > 1 {
        let sibling_index = index ^ 1;
        // A missing right sibling is the node itself, matching next_level.
        let sibling = level.get(sibling_index).unwrap_or(&level[index]);
        siblings.push(*sibling);

        level = next_level(&level);
        index >>= 1;
    }

    Ok(siblings)
}

/// Folds `leaf` up through `siblings` and compares the result with `expected_root`.
///
/// Rejects indices with bits set above the proof height, and never accepts the
/// all-zero root.
#[must_use]
pub fn verify_proof(leaf: &Hash, siblings: &[Hash], leaf_index: usize, expected_root: &Hash) -> bool {
    if *expected_root == ZERO_HASH {
        return false;
    }
    if siblings.len() < usize::BITS as usize && leaf_index >> siblings.len() != 0 {
        return false;
    }

    let mut current = *leaf;
    for (level, sibling) in siblings.iter().enumerate() {
        let bit = u32::try_from(level)
            .ok()
            .and_then(|shift| leaf_index.checked_shr(shift))
            .unwrap_or(0)
            & 1;
        current = if bit == 0 {
            node_hash(&current, sibling)
        } else {
            node_hash(sibling, &current)
        };
    }

    current == *expected_root
}

impl MerkleTree {
    /// Create a new Merkle tree from an ordered list of leaf hashes.
    pub fn new(leaves: Vec<Hash>) -> Self {
        MerkleTree {
            root: build_root(&leaves),
            leaves,
        }
    }

    /// Number of leaves, which is also the anonymity set size.
    #[must_use]
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Generate a Merkle proof for the leaf at the given index.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::LeafIndexOutOfRange`] if the index is not a leaf.
    pub fn generate_proof(&self, leaf_index: usize) -> Result<MerkleProof, RegistryError> {
        let siblings = build_proof(&self.leaves, leaf_index)?;

        Ok(MerkleProof {
            leaf: self.leaves[leaf_index],
            root: self.root,
            siblings,
            leaf_index,
        })
    }

    /// Verify a Merkle proof against this tree's root.
    ///
    /// A proof generated against any other root fails, even if it was valid
    /// for an earlier version of the same leaf set.
    #[must_use]
    pub fn verify_proof(&self, proof: &MerkleProof) -> bool {
        if proof.root != self.root {
            return false;
        }
        verify_proof(&proof.leaf, &proof.siblings, proof.leaf_index, &self.root)
    }
}

impl MerkleProof {
    /// Checks the proof against `expected_root`, ignoring the root it carries.
    #[must_use]
    pub fn verify_against(&self, expected_root: &Hash) -> bool {
        verify_proof(&self.leaf, &self.siblings, self.leaf_index, expected_root)
    }
}

impl fmt::Display for MerkleProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MerkleProof:\n  Leaf: {}\n  Root: {}\n  Index: {}\n  Siblings: {}",
            hex::encode(self.leaf),
            hex::encode(self.root),
            self.leaf_index,
            self.siblings.len()
        )
    }
}
