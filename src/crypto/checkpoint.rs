//! Canonical byte strings covered by leaf, tree head and cosignature signatures.

use crate::encoding::encode_base64;
use crate::types::{Hash, KeyHash, TreeHead};

/// Origin line prefix; the log's hex key hash follows.
pub const CHECKPOINT_NAME_PREFIX: &str = "sigsum.org/v1/tree/";

/// First line of the data a witness cosigns.
pub const COSIGNATURE_NAMESPACE: &str = "cosignature/v1";

/// Domain separation for leaf signatures.
pub const LEAF_NAMESPACE: &[u8] = b"sigsum.org/v1/tree-leaf";

/// Data the submitter signs: `namespace || 0x00 || checksum`.
pub fn leaf_signed_data(checksum: &Hash) -> Vec<u8> {
    let mut data = Vec::with_capacity(LEAF_NAMESPACE.len() + 1 + Hash::LEN);
    data.extend_from_slice(LEAF_NAMESPACE);
    data.push(0);
    data.extend_from_slice(checksum.as_bytes());
    data
}

/// Checkpoint body signed by the log.
pub fn format_checkpoint(tree_head: &TreeHead, log_key_hash: &KeyHash) -> String {
    format!(
        "{CHECKPOINT_NAME_PREFIX}{}\n{}\n{}\n",
        log_key_hash.to_hex(),
        tree_head.size,
        encode_base64(tree_head.root_hash.as_bytes())
    )
}

/// Data a witness cosigns: namespace, timestamp line, then the checkpoint.
pub fn format_cosigned_data(tree_head: &TreeHead, log_key_hash: &KeyHash, timestamp: u64) -> String {
    format!(
        "{COSIGNATURE_NAMESPACE}\ntime {timestamp}\n{}",
        format_checkpoint(tree_head, log_key_hash)
    )
}
