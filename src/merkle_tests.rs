#[cfg(test)]
mod tests {
    use crate::hash::{leaf_hash, node_hash};
    use crate::merkle::{build_proof, build_root, tree_height, verify_proof};
    use crate::types::ZERO_HASH;
    use crate::{MerkleTree, RegistryError};

    fn numbered_leaves(count: usize) -> Vec<[u8; 32]> {
        (0..count)
            .map(|i| leaf_hash(format!("dev-{i}").as_bytes()))
            .collect()
    }

    #[test]
    fn test_merkle_tree_creation() {
        let leaves = vec![[1u8; 32], [2u8; 32], [3u8; 32], [4u8; 32]];

        let tree = MerkleTree::new(leaves);
        assert_ne!(tree.root, ZERO_HASH);
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn test_empty_tree_has_zero_root() {
        assert_eq!(build_root(&[]), ZERO_HASH);
        let tree = MerkleTree::new(Vec::new());
        assert!(tree.is_empty());
        assert_eq!(tree.root, ZERO_HASH);
    }

    #[test]
    fn test_single_leaf_is_root() {
        let leaf = leaf_hash(b"dev-1");
        let tree = MerkleTree::new(vec![leaf]);
        assert_eq!(tree.root, leaf);

        let proof = tree.generate_proof(0).unwrap();
        assert!(proof.siblings.is_empty());
        assert!(tree.verify_proof(&proof));
    }

    #[test]
    fn test_odd_count_duplicates_last_leaf() {
        let a = leaf_hash(b"A");
        let b = leaf_hash(b"B");
        let c = leaf_hash(b"C");

        assert_eq!(build_root(&[a, b, c]), build_root(&[a, b, c, c]));

        let expected = node_hash(&node_hash(&a, &b), &node_hash(&c, &c));
        assert_eq!(build_root(&[a, b, c]), expected);
    }

    #[test]
    fn test_odd_count_proof_uses_self_as_sibling() {
        let leaves = numbered_leaves(3);
        let siblings = build_proof(&leaves, 2).unwrap();

        assert_eq!(siblings.len(), 2);
        assert_eq!(siblings[0], leaves[2]);
        assert_eq!(siblings[1], node_hash(&leaves[0], &leaves[1]));
    }

    #[test]
    fn test_tree_height() {
        assert_eq!(tree_height(0), 0);
        assert_eq!(tree_height(1), 0);
        assert_eq!(tree_height(2), 1);
        assert_eq!(tree_height(3), 2);
        assert_eq!(tree_height(4), 2);
        assert_eq!(tree_height(5), 3);
        assert_eq!(tree_height(1024), 10);
        assert_eq!(tree_height(1025), 11);
    }

    #[test]
    fn test_every_leaf_verifies_for_many_sizes() {
        for count in 1..=40 {
            let leaves = numbered_leaves(count);
            let root = build_root(&leaves);

            for (index, leaf) in leaves.iter().enumerate() {
                let siblings = build_proof(&leaves, index).unwrap();
                assert_eq!(siblings.len(), tree_height(count));
                assert!(
                    verify_proof(leaf, &siblings, index, &root),
                    "leaf {index} of {count} failed to verify"
                );
            }
        }
    }

    #[test]
    fn test_root_is_deterministic() {
        let leaves = numbered_leaves(17);
        assert_eq!(build_root(&leaves), build_root(&leaves.clone()));
        assert_eq!(MerkleTree::new(leaves.clone()), MerkleTree::new(leaves));
    }

    #[test]
    fn test_merkle_proof_verification() {
        let leaves = vec![[1u8; 32], [2u8; 32], [3u8; 32], [4u8; 32]];

        let tree = MerkleTree::new(leaves);
        let proof = tree.generate_proof(2).unwrap();

        assert!(tree.verify_proof(&proof));
    }

    #[test]
    fn test_merkle_proof_invalid_verification() {
        let leaves1 = vec![[1u8; 32], [2u8; 32], [3u8; 32], [4u8; 32]];
        let leaves2 = vec![[5u8; 32], [6u8; 32], [7u8; 32], [8u8; 32]];

        let tree1 = MerkleTree::new(leaves1);
        let tree2 = MerkleTree::new(leaves2);

        let proof = tree1.generate_proof(0).unwrap();

        // Proof is from a different tree
        assert!(!tree2.verify_proof(&proof));
        assert!(!proof.verify_against(&tree2.root));
    }

    #[test]
    fn test_large_merkle_tree() {
        let leaves = numbered_leaves(1024);

        let tree = MerkleTree::new(leaves);
        let proof = tree.generate_proof(512).unwrap();

        assert_eq!(proof.siblings.len(), 10);
        assert!(tree.verify_proof(&proof));
    }

    #[test]
    fn test_merkle_proof_with_invalid_index() {
        let leaves = vec![[1u8; 32], [2u8; 32], [3u8; 32], [4u8; 32]];

        let tree = MerkleTree::new(leaves);
        let result = tree.generate_proof(999);

        assert!(matches!(
            result,
            Err(RegistryError::LeafIndexOutOfRange { index: 999, len: 4 })
        ));
    }

    #[test]
    fn test_merkle_proof_with_tampered_root() {
        let tree = MerkleTree::new(numbered_leaves(4));
        let mut proof = tree.generate_proof(0).unwrap();

        proof.root = [0xFFu8; 32];

        assert!(!tree.verify_proof(&proof));
    }

    #[test]
    fn test_merkle_proof_with_tampered_leaf() {
        let tree = MerkleTree::new(numbered_leaves(4));
        let mut proof = tree.generate_proof(0).unwrap();

        proof.leaf = [0xFFu8; 32];

        assert!(!tree.verify_proof(&proof));
    }

    #[test]
    fn test_every_single_bit_flip_in_siblings_is_rejected() {
        let leaves = numbered_leaves(11);
        let root = build_root(&leaves);
        let siblings = build_proof(&leaves, 6).unwrap();

        for level in 0..siblings.len() {
            for byte in 0..32 {
                let mut tampered = siblings.clone();
                tampered[level][byte] ^= 0x01;
                assert!(!verify_proof(&leaves[6], &tampered, 6, &root));
            }
        }
    }

    #[test]
    fn test_wrong_index_is_rejected() {
        let leaves = numbered_leaves(8);
        let root = build_root(&leaves);
        let siblings = build_proof(&leaves, 5).unwrap();

        for index in (0..8).filter(|&i| i != 5) {
            assert!(!verify_proof(&leaves[5], &siblings, index, &root));
        }
    }

    #[test]
    fn test_index_beyond_proof_height_is_rejected() {
        let leaves = numbered_leaves(4);
        let root = build_root(&leaves);
        let siblings = build_proof(&leaves, 1).unwrap();

        assert!(verify_proof(&leaves[1], &siblings, 1, &root));
        assert!(!verify_proof(&leaves[1], &siblings, 1 + 4, &root));
    }

    #[test]
    fn test_truncated_and_extended_paths_are_rejected() {
        let leaves = numbered_leaves(6);
        let root = build_root(&leaves);
        let siblings = build_proof(&leaves, 3).unwrap();

        assert!(!verify_proof(&leaves[3], &siblings[..siblings.len() - 1], 3, &root));

        let mut extended = siblings.clone();
        extended.push([0u8; 32]);
        assert!(!verify_proof(&leaves[3], &extended, 3, &root));
    }

    #[test]
    fn test_zero_root_never_verifies() {
        assert!(!verify_proof(&ZERO_HASH, &[], 0, &ZERO_HASH));
    }

    #[test]
    fn test_proof_display() {
        let tree = MerkleTree::new(numbered_leaves(2));
        let proof = tree.generate_proof(1).unwrap();
        let rendered = proof.to_string();

        assert!(rendered.contains(&hex::encode(tree.root)));
        assert!(rendered.contains("Index: 1"));
        assert!(rendered.contains("Siblings: 1"));
    }
}
