//! Merkle tree core implementation.

use std::collections::HashMap;
use std::marker::PhantomData;

use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use super::hash::{combine, hex_hash, to_hex, ByteOrder, Hash, TreeDigest};
use super::proof::InclusionProof;

/// Merkle tree errors.
#[derive(Error, Debug)]
pub enum MerkleError {
    #[error("Cannot build tree with no leaves")]
    EmptyInput,

    #[error("Duplicate leaf {} at index {} (first seen at {})", to_hex(.hash), .index, .first_index)]
    DuplicateLeaf {
        hash: Hash,
        first_index: usize,
        index: usize,
    },

    #[error("Leaf not found: {}", to_hex(.0))]
    LeafNotFound(Hash),

    #[error("Invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("Invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid length: {0} bytes is not a multiple of 32")]
    MisalignedLength(usize),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type MerkleResult<T> = Result<T, MerkleError>;

/// Tree format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Byte order used when canonically ordering children.
    #[serde(default)]
    pub byte_order: ByteOrder,
}

/// Tree statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeStats {
    #[serde(with = "hex_hash")]
    pub root_hash: Hash,
    pub height: usize,
    pub leaf_count: usize,
}

/// Immutable binary Merkle tree over a fixed, ordered set of distinct leaves.
///
/// Level 0 holds the leaves in input order; each level above holds
/// `ceil(n / 2)` parents and the last level holds only the root. A trailing
/// unpaired node is combined with itself.
#[derive(Debug, Clone)]
pub struct MerkleTree<D = Sha256> {
    levels: Vec<Vec<Hash>>,
    leaf_index: HashMap<Hash, usize>,
    byte_order: ByteOrder,
    _digest: PhantomData<fn() -> D>,
}

impl MerkleTree<Sha256> {
    /// Build a SHA-256 tree with the default configuration.
    pub fn build(leaves: &[Hash]) -> MerkleResult<Self> {
        Self::with_config(leaves, TreeConfig::default())
    }
}

impl<D: TreeDigest> MerkleTree<D> {
    /// Build a tree from `leaves` using digest `D` and the given config.
    ///
    /// Fails with [`MerkleError::EmptyInput`] on an empty slice and with
    /// [`MerkleError::DuplicateLeaf`] as soon as a repeated hash is seen.
    pub fn with_config(leaves: &[Hash], config: TreeConfig) -> MerkleResult<Self> {
        if leaves.is_empty() {
            warn!("rejecting merkle tree build: no leaves");
            return Err(MerkleError::EmptyInput);
        }

        let mut leaf_index: HashMap<Hash, usize> = HashMap::with_capacity(leaves.len());
        for (index, leaf) in leaves.iter().enumerate() {
            if let Some(&first_index) = leaf_index.get(leaf) {
                warn!(
                    "rejecting merkle tree build: leaf {} repeated at {} and {}",
                    to_hex(leaf),
                    first_index,
                    index
                );
                return Err(MerkleError::DuplicateLeaf {
                    hash: *leaf,
                    first_index,
                    index,
                });
            }
            leaf_index.insert(*leaf, index);
        }

        let byte_order = config.byte_order;
        let mut levels = Vec::new();
        let mut current = leaves.to_vec();

        while current.len() > 1 {
            let next: Vec<Hash> = current
                .chunks(2)
                .map(|pair| {
                    let left = &pair[0];
                    // Odd node - pair with itself
                    let right = pair.get(1).unwrap_or(left);
                    combine::<D>(left, right, byte_order)
                })
                .collect();

            levels.push(std::mem::replace(&mut current, next));
        }
        levels.push(current);

        let tree = Self {
            levels,
            leaf_index,
            byte_order,
            _digest: PhantomData,
        };

        debug!(
            "built merkle tree: {} leaves, height {}, root {}",
            tree.leaf_count(),
            tree.height(),
            to_hex(&tree.root_hash())
        );

        Ok(tree)
    }

    /// The single hash of the top level.
    pub fn root_hash(&self) -> Hash {
        self.levels[self.levels.len() - 1][0]
    }

    /// Number of levels, leaves and root included.
    pub fn height(&self) -> usize {
        self.levels.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    /// Leaves in their original order.
    pub fn leaves(&self) -> &[Hash] {
        &self.levels[0]
    }

    /// Hashes at `level` (0 = leaves), if that level exists.
    pub fn level(&self, level: usize) -> Option<&[Hash]> {
        self.levels.get(level).map(Vec::as_slice)
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn is_included(&self, leaf_hash: &Hash) -> bool {
        self.leaf_index.contains_key(leaf_hash)
    }

    /// Position of `leaf_hash` among the leaves.
    pub fn leaf_index(&self, leaf_hash: &Hash) -> Option<usize> {
        self.leaf_index.get(leaf_hash).copied()
    }

    /// Sibling hashes from the leaf level up to, but excluding, the root.
    pub fn get_proof(&self, leaf_hash: &Hash) -> MerkleResult<Vec<Hash>> {
        let index = self
            .leaf_index(leaf_hash)
            .ok_or(MerkleError::LeafNotFound(*leaf_hash))?;

        let proof = self.siblings_of(index);
        trace!(
            "generated proof for leaf {}: {} siblings",
            to_hex(leaf_hash),
            proof.len()
        );
        Ok(proof)
    }

    /// Generate a proof bundle for `leaf_hash`.
    ///
    /// The bundle records the byte order but not the digest: for trees not
    /// built on SHA-256, check it with [`InclusionProof::verify_with`].
    pub fn prove(&self, leaf_hash: &Hash) -> MerkleResult<InclusionProof> {
        let leaf_index = self
            .leaf_index(leaf_hash)
            .ok_or(MerkleError::LeafNotFound(*leaf_hash))?;

        Ok(InclusionProof {
            leaf_hash: *leaf_hash,
            leaf_index,
            root_hash: self.root_hash(),
            siblings: self.siblings_of(leaf_index),
            byte_order: self.byte_order,
        })
    }

    fn siblings_of(&self, mut index: usize) -> Vec<Hash> {
        let top = self.levels.len() - 1;
        let mut siblings = Vec::with_capacity(top);
        for level in &self.levels[..top] {
            siblings.push(level[sibling_index(index, level.len())]);
            index /= 2;
        }
        siblings
    }

    pub fn stats(&self) -> TreeStats {
        TreeStats {
            root_hash: self.root_hash(),
            height: self.height(),
            leaf_count: self.leaf_count(),
        }
    }
}

/// Sibling of `index` in a level of `len` nodes.
///
/// The trailing node of an odd-length level is its own sibling.
fn sibling_index(index: usize, len: usize) -> usize {
    if index % 2 == 1 {
        index - 1
    } else if index + 1 < len {
        index + 1
    } else {
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merkle::{hash_leaf, verify};

    fn leaves(n: usize) -> Vec<Hash> {
        (0..n)
            .map(|i| hash_leaf::<Sha256>(format!("leaf-{}", i).as_bytes()))
            .collect()
    }

    fn pair(a: &Hash, b: &Hash) -> Hash {
        combine::<Sha256>(a, b, ByteOrder::default())
    }

    #[test]
    fn test_sibling_index() {
        assert_eq!(sibling_index(0, 2), 1);
        assert_eq!(sibling_index(1, 2), 0);
        assert_eq!(sibling_index(2, 3), 2);
        assert_eq!(sibling_index(2, 4), 3);
        assert_eq!(sibling_index(0, 1), 0);
    }

    #[test]
    fn test_single_leaf() {
        let l = leaves(1);
        let tree = MerkleTree::build(&l).unwrap();

        // Single leaf tree: root = leaf
        assert_eq!(tree.root_hash(), l[0]);
        assert_eq!(tree.height(), 1);
        assert!(tree.get_proof(&l[0]).unwrap().is_empty());
    }

    #[test]
    fn test_three_leaves_pairs_last_with_itself() {
        let l = leaves(3);
        let tree = MerkleTree::build(&l).unwrap();

        let left = pair(&l[0], &l[1]);
        let right = pair(&l[2], &l[2]);
        assert_eq!(tree.level(1).unwrap(), &[left, right]);
        assert_eq!(tree.root_hash(), pair(&left, &right));
        assert_eq!(tree.height(), 3);

        assert_eq!(tree.get_proof(&l[2]).unwrap(), vec![l[2], left]);
        assert_eq!(tree.get_proof(&l[0]).unwrap(), vec![l[1], right]);
    }

    #[test]
    fn test_level_sizes() {
        let tree = MerkleTree::build(&leaves(10)).unwrap();
        let sizes: Vec<usize> = (0..tree.height())
            .map(|k| tree.level(k).unwrap().len())
            .collect();
        assert_eq!(sizes, vec![10, 5, 3, 2, 1]);
        assert!(tree.level(5).is_none());
    }

    #[test]
    fn test_empty_rejected() {
        assert!(matches!(MerkleTree::build(&[]), Err(MerkleError::EmptyInput)));
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut l = leaves(4);
        l.push(l[1]);

        match MerkleTree::build(&l) {
            Err(MerkleError::DuplicateLeaf {
                hash,
                first_index,
                index,
            }) => {
                assert_eq!(hash, l[1]);
                assert_eq!(first_index, 1);
                assert_eq!(index, 4);
            }
            Err(other) => panic!("expected DuplicateLeaf, got {:?}", other),
            Ok(_) => panic!("expected DuplicateLeaf, got a tree"),
        }
    }

    #[test]
    fn test_proof_for_unknown_leaf() {
        let tree = MerkleTree::build(&leaves(4)).unwrap();
        let stranger = hash_leaf::<Sha256>(b"stranger");

        assert!(!tree.is_included(&stranger));
        assert!(matches!(
            tree.get_proof(&stranger),
            Err(MerkleError::LeafNotFound(h)) if h == stranger
        ));
    }

    #[test]
    fn test_every_leaf_verifies() {
        for n in 1..=17 {
            let l = leaves(n);
            let tree = MerkleTree::build(&l).unwrap();
            for leaf in &l {
                let proof = tree.get_proof(leaf).unwrap();
                assert_eq!(proof.len(), tree.height() - 1);
                assert!(verify(&proof, &tree.root_hash(), leaf), "n={}", n);
            }
        }
    }

    #[test]
    fn test_stats_and_prove() {
        let l = leaves(5);
        let tree = MerkleTree::build(&l).unwrap();

        let stats = tree.stats();
        assert_eq!(stats.leaf_count, 5);
        assert_eq!(stats.height, 4);
        assert_eq!(stats.root_hash, tree.root_hash());

        let bundle = tree.prove(&l[4]).unwrap();
        assert_eq!(bundle.leaf_index, 4);
        assert_eq!(bundle.root_hash, tree.root_hash());
        assert!(bundle.verify());
    }

    #[test]
    fn test_prove_on_other_digest() {
        use sha2::Sha512_256;

        let l: Vec<Hash> = (0u8..5).map(|i| hash_leaf::<Sha512_256>(&[i])).collect();
        let tree = MerkleTree::<Sha512_256>::with_config(&l, TreeConfig::default()).unwrap();

        let bundle = tree.prove(&l[3]).unwrap();
        assert_eq!(bundle.siblings, tree.get_proof(&l[3]).unwrap());
        assert!(bundle.verify_with::<Sha512_256>(&tree.root_hash()));

        // Bundle verification defaults to SHA-256
        assert!(!bundle.verify());
    }

    #[test]
    fn test_prove_unknown_leaf() {
        let tree = MerkleTree::build(&leaves(3)).unwrap();
        let stranger = hash_leaf::<Sha256>(b"stranger");
        assert!(matches!(tree.prove(&stranger), Err(MerkleError::LeafNotFound(_))));
    }

    #[test]
    fn test_tree_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MerkleTree>();
    }
}
