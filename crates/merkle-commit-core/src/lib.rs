//! Merkle Commit Core Library
//!
//! Binary Merkle tree over 32-byte leaf hashes, with `O(log n)` inclusion
//! proofs and stateless verification against a committed root.
//!
//! # Architecture
//!
//! ```text
//! leaf hashes ──► level 0 ──► level 1 ──► ... ──► root
//!                    │
//!                    └── leaf index (hash → position)
//!
//! get_proof(leaf): one sibling per level, bottom first
//! verify(proof, root, leaf): fold combine(acc, sibling) and compare
//! ```
//!
//! Parents are `combine(a, b)`: the smaller child (under the tree's
//! [`merkle::ByteOrder`]) is hashed first, so a verifier never needs to know
//! which side a sibling sat on. A trailing unpaired node is combined with
//! itself.
//!
//! # Example
//!
//! ```
//! use merkle_commit_core::merkle::{hash_leaf, verify, MerkleTree};
//! use sha2::Sha256;
//!
//! let leaves: Vec<_> = (b'0'..=b'9').map(|d| hash_leaf::<Sha256>(&[d])).collect();
//! let tree = MerkleTree::build(&leaves).unwrap();
//! assert_eq!(tree.height(), 5);
//!
//! let proof = tree.get_proof(&leaves[3]).unwrap();
//! assert!(verify(&proof, &tree.root_hash(), &leaves[3]));
//! ```
//!
//! # Modules
//!
//! - [`merkle`]: tree construction, proof generation and verification

pub mod merkle;

pub use merkle::{MerkleError, MerkleResult, MerkleTree};
