//! Merkle tree with commutative node hashing and inclusion proofs.

mod hash;
mod proof;
mod tree;

pub use hash::*;
pub use proof::*;
pub use tree::*;
