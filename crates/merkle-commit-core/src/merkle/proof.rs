//! Inclusion proofs and stateless verification.

use serde::{Deserialize, Serialize};
use sha2::Sha256;

use super::hash::{combine, hex_hash, hex_hashes, ByteOrder, Hash, TreeDigest, HASH_LEN};
use super::{MerkleError, MerkleResult};

/// Fold `proof` into a root, starting from `leaf_hash`.
///
/// Uses SHA-256 and the default byte order.
pub fn process_proof(proof: &[Hash], leaf_hash: &Hash) -> Hash {
    process_proof_with::<Sha256>(proof, leaf_hash, ByteOrder::default())
}

/// [`process_proof`] with an explicit digest and byte order.
pub fn process_proof_with<D: TreeDigest>(proof: &[Hash], leaf_hash: &Hash, order: ByteOrder) -> Hash {
    proof
        .iter()
        .fold(*leaf_hash, |acc, sibling| combine::<D>(&acc, sibling, order))
}

/// Check that `proof` leads from `leaf_hash` to `root`.
///
/// Needs no tree: any holder of a root and a proof can call it. A proof of the
/// wrong length simply fails to match.
pub fn verify(proof: &[Hash], root: &Hash, leaf_hash: &Hash) -> bool {
    process_proof(proof, leaf_hash) == *root
}

/// [`verify`] with an explicit digest and byte order.
pub fn verify_with<D: TreeDigest>(
    proof: &[Hash],
    root: &Hash,
    leaf_hash: &Hash,
    order: ByteOrder,
) -> bool {
    process_proof_with::<D>(proof, leaf_hash, order) == *root
}

/// Concatenate siblings into a flat byte string, 32 bytes each.
pub fn siblings_to_bytes(siblings: &[Hash]) -> Vec<u8> {
    siblings.concat()
}

/// Split a flat byte string back into 32-byte siblings.
pub fn siblings_from_bytes(bytes: &[u8]) -> MerkleResult<Vec<Hash>> {
    if bytes.len() % HASH_LEN != 0 {
        return Err(MerkleError::MisalignedLength(bytes.len()));
    }

    Ok(bytes
        .chunks_exact(HASH_LEN)
        .map(|chunk| {
            let mut hash = [0u8; HASH_LEN];
            hash.copy_from_slice(chunk);
            hash
        })
        .collect())
}

/// Merkle inclusion proof bundled with the context it was generated in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionProof {
    /// Hash of the leaf being proven
    #[serde(with = "hex_hash")]
    pub leaf_hash: Hash,
    /// Index of leaf in tree (for context)
    pub leaf_index: usize,
    /// Root hash at time of proof generation
    #[serde(with = "hex_hash")]
    pub root_hash: Hash,
    /// Sibling hashes from leaf to root
    #[serde(with = "hex_hashes")]
    pub siblings: Vec<Hash>,
    /// Byte order the tree was built with
    #[serde(default)]
    pub byte_order: ByteOrder,
}

impl InclusionProof {
    /// Recompute the root with SHA-256 and compare it to the embedded root.
    ///
    /// The bundle does not record its digest. Proofs from a tree built with
    /// another digest always fail here; check those with [`Self::verify_with`].
    pub fn verify(&self) -> bool {
        self.verify_with::<Sha256>(&self.root_hash)
    }

    /// Check the proof against a root obtained elsewhere, using SHA-256.
    pub fn verify_against(&self, root: &Hash) -> bool {
        self.verify_with::<Sha256>(root)
    }

    /// Check the proof against `root` using digest `D`.
    pub fn verify_with<D: TreeDigest>(&self, root: &Hash) -> bool {
        verify_with::<D>(&self.siblings, root, &self.leaf_hash, self.byte_order)
    }

    pub fn to_json(&self) -> MerkleResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> MerkleResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
