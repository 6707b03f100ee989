//! Merkle inclusion proof verification
//!
//! Recomputes a tree's root hash from a leaf hash and its audit path and
//! compares it to the tree head. Leaf and interior nodes are domain separated
//! (`0x00` and `0x01` prefixes) so a leaf can never be passed off as a node.
//!
//! Trees whose size is not a power of two have an unpaired rightmost node on
//! some levels. That node is carried up unchanged and consumes no path entry.

use crate::crypto::provider::constant_time_eq;
use crate::types::{Hash, Leaf, TreeHead, INTERIOR_NODE_PREFIX};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Inclusion proof failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MerkleError {
    #[error("leaf index {index} out of range for tree size {size}")]
    IndexOutOfRange { index: u64, size: u64 },

    #[error("tree size is 1 but leaf does not match root hash")]
    SizeOneMismatch,

    #[error("empty inclusion path for tree size {size}")]
    EmptyPath { size: u64 },

    #[error("invalid proof: inclusion path too short")]
    PathTooShort,

    #[error("internal error: unused path elements ({unused} left)")]
    UnusedPathElements { unused: usize },

    #[error("invalid proof: root hash mismatch")]
    RootMismatch,
}

/// Hash a leaf in its canonical form.
pub fn hash_leaf(leaf: &Leaf) -> Hash {
    Hash::new(Sha256::digest(leaf.to_bytes()).into())
}

/// `SHA256(0x01 || left || right)`
pub fn hash_interior(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update([INTERIOR_NODE_PREFIX]);
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    Hash::new(hasher.finalize().into())
}

/// Verify that `leaf_hash` sits at `leaf_index` in the tree described by `tree_head`.
///
/// Every path entry must be consumed exactly once; the final root comparison
/// is constant time.
pub fn verify_inclusion(
    leaf_hash: &Hash,
    leaf_index: u64,
    tree_head: &TreeHead,
    path: &[Hash],
) -> Result<(), MerkleError> {
    let size = tree_head.size;
    if leaf_index >= size {
        return Err(MerkleError::IndexOutOfRange {
            index: leaf_index,
            size,
        });
    }

    if path.is_empty() {
        if size != 1 {
            return Err(MerkleError::EmptyPath { size });
        }
        return if constant_time_eq(leaf_hash.as_bytes(), tree_head.root_hash.as_bytes()) {
            Ok(())
        } else {
            Err(MerkleError::SizeOneMismatch)
        };
    }

    let mut current = *leaf_hash;
    let mut index = leaf_index;
    let mut last = size - 1;
    let mut siblings = path.iter();

    while last > 0 {
        if index & 1 == 1 {
            let sibling = siblings.next().ok_or(MerkleError::PathTooShort)?;
            current = hash_interior(sibling, &current);
        } else if index < last {
            let sibling = siblings.next().ok_or(MerkleError::PathTooShort)?;
            current = hash_interior(&current, sibling);
        }
        index >>= 1;
        last >>= 1;
    }

    let unused = siblings.len();
    if unused > 0 {
        return Err(MerkleError::UnusedPathElements { unused });
    }

    if constant_time_eq(current.as_bytes(), tree_head.root_hash.as_bytes()) {
        Ok(())
    } else {
        Err(MerkleError::RootMismatch)
    }
}
