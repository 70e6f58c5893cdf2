//! Hash primitive and commutative node hashing.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use sha2::digest::consts::U32;
use sha2::digest::OutputSizeUser;
use sha2::Digest;

use super::{MerkleError, MerkleResult};

/// Length in bytes of every hash handled by the tree.
pub const HASH_LEN: usize = 32;

/// A 32-byte digest: a leaf, an internal node or the root.
pub type Hash = [u8; HASH_LEN];

/// Digest algorithms usable for node hashing.
///
/// Any RustCrypto [`Digest`] with a 32-byte output qualifies.
pub trait TreeDigest: Digest + OutputSizeUser<OutputSize = U32> {}

impl<D> TreeDigest for D where D: Digest + OutputSizeUser<OutputSize = U32> {}

/// Byte order used to canonically order two children before hashing them.
///
/// This is part of the tree format: roots built under different orders are
/// incompatible, so a deployment must stick to one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    /// Byte 0 is the most significant (plain lexicographic order).
    #[default]
    MostSignificantFirst,
    /// Byte 31 is the most significant.
    LeastSignificantFirst,
}

/// Compare two hashes as unsigned 256-bit integers under `order`.
pub fn compare_hashes(a: &Hash, b: &Hash, order: ByteOrder) -> Ordering {
    match order {
        ByteOrder::MostSignificantFirst => a.cmp(b),
        ByteOrder::LeastSignificantFirst => a.iter().rev().cmp(b.iter().rev()),
    }
}

/// Hash two children into their parent.
///
/// The smaller operand is fed first, so `combine(a, b) == combine(b, a)`.
/// A fresh digest is created on every call.
pub fn combine<D: TreeDigest>(a: &Hash, b: &Hash, order: ByteOrder) -> Hash {
    let (first, second) = match compare_hashes(a, b, order) {
        Ordering::Greater => (b, a),
        _ => (a, b),
    };

    let mut hasher = D::new();
    hasher.update(first);
    hasher.update(second);
    finalize(hasher)
}

/// Digest arbitrary application data into a leaf hash.
pub fn hash_leaf<D: TreeDigest>(data: &[u8]) -> Hash {
    let mut hasher = D::new();
    hasher.update(data);
    finalize(hasher)
}

fn finalize<D: TreeDigest>(hasher: D) -> Hash {
    let mut out = [0u8; HASH_LEN];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Render a hash as lowercase hex.
pub fn to_hex(hash: &Hash) -> String {
    hex::encode(hash)
}

/// Parse a 64-character hex string into a hash.
pub fn from_hex(s: &str) -> MerkleResult<Hash> {
    let bytes = hex::decode(s)?;
    Hash::try_from(bytes.as_slice()).map_err(|_| MerkleError::InvalidLength {
        expected: HASH_LEN,
        actual: bytes.len(),
    })
}

/// Serde adapter storing a [`Hash`] as a hex string.
pub(crate) mod hex_hash {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    use super::Hash;

    pub fn serialize<S: Serializer>(hash: &Hash, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::to_hex(hash))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Hash, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::from_hex(&s).map_err(D::Error::custom)
    }
}

/// Serde adapter storing a list of hashes as hex strings.
pub(crate) mod hex_hashes {
    use serde::{de::Error, ser::SerializeSeq, Deserialize, Deserializer, Serializer};

    use super::Hash;

    pub fn serialize<S: Serializer>(hashes: &[Hash], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(hashes.len()))?;
        for hash in hashes {
            seq.serialize_element(&super::to_hex(hash))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Hash>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|s| super::from_hex(s).map_err(D::Error::custom))
            .collect()
    }
}
