//! Value types for the Sigsum proof data model.
//!
//! Hashes, key hashes, raw public keys and signatures are distinct types with
//! their length checked at construction. Most of them are 32 bytes, so keeping
//! them apart stops a root hash from being passed where a key hash belongs.

use crate::encoding::{decode_hex, encode_hex, EncodingError};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;

/// Prefix byte of a Merkle leaf node.
pub const LEAF_NODE_PREFIX: u8 = 0x00;

/// Prefix byte of a Merkle interior node.
pub const INTERIOR_NODE_PREFIX: u8 = 0x01;

macro_rules! fixed_bytes {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name([u8; $len]);

        impl $name {
            /// Length in bytes.
            pub const LEN: usize = $len;

            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Build from a slice, rejecting any other length.
            pub fn from_slice(bytes: &[u8]) -> Result<Self, EncodingError> {
                let array: [u8; $len] =
                    bytes.try_into().map_err(|_| EncodingError::InvalidLength {
                        expected: $len,
                        actual: bytes.len(),
                    })?;
                Ok(Self(array))
            }

            pub fn from_hex(s: &str) -> Result<Self, EncodingError> {
                Self::from_slice(&decode_hex(s)?)
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                encode_hex(&self.0)
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }
    };
}

fixed_bytes!(
    /// A SHA-256 digest: message hash, checksum, leaf hash or tree node.
    Hash,
    32
);

fixed_bytes!(
    /// SHA-256 of a raw Ed25519 public key. Identifies logs, witnesses and submitters.
    KeyHash,
    32
);

fixed_bytes!(
    /// A raw 32-byte Ed25519 public key.
    RawPublicKey,
    32
);

fixed_bytes!(
    /// An Ed25519 signature.
    Signature,
    64
);

impl KeyHash {
    /// Hash a raw public key.
    pub fn of(key: &RawPublicKey) -> Self {
        Self(Sha256::digest(key.as_bytes()).into())
    }
}

/// A log's tree head: size and root hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeHead {
    pub size: u64,
    pub root_hash: Hash,
}

/// A tree head signed by its log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTreeHead {
    pub tree_head: TreeHead,
    pub signature: Signature,
}

/// A witness cosignature over a tree head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cosignature {
    /// Unix timestamp (seconds) the witness signed at
    pub timestamp: u64,
    pub signature: Signature,
}

/// A signed tree head plus the cosignatures collected for it, keyed by witness key hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CosignedTreeHead {
    pub signed_tree_head: SignedTreeHead,
    pub cosignatures: HashMap<KeyHash, Cosignature>,
}

impl CosignedTreeHead {
    pub fn tree_head(&self) -> &TreeHead {
        &self.signed_tree_head.tree_head
    }
}

/// A log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Leaf {
    pub checksum: Hash,
    pub signature: Signature,
    pub key_hash: KeyHash,
}

impl Leaf {
    /// Size of the canonical leaf encoding.
    pub const ENCODED_LEN: usize = 1 + Hash::LEN + Signature::LEN + KeyHash::LEN;

    /// Canonical form: `0x00 || checksum || signature || key_hash`.
    pub fn to_bytes(&self) -> [u8; Self::ENCODED_LEN] {
        let mut out = [0u8; Self::ENCODED_LEN];
        out[0] = LEAF_NODE_PREFIX;
        let mut offset = 1;
        for part in [
            self.checksum.as_ref(),
            self.signature.as_ref(),
            self.key_hash.as_ref(),
        ] {
            out[offset..offset + part.len()].copy_from_slice(part);
            offset += part.len();
        }
        out
    }
}

/// The leaf as carried in a proof: the checksum is recomputed by the verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortLeaf {
    pub key_hash: KeyHash,
    pub signature: Signature,
}

impl ShortLeaf {
    pub fn to_leaf(&self, checksum: Hash) -> Leaf {
        Leaf {
            checksum,
            signature: self.signature,
            key_hash: self.key_hash,
        }
    }
}

impl From<&Leaf> for ShortLeaf {
    fn from(leaf: &Leaf) -> Self {
        Self {
            key_hash: leaf.key_hash,
            signature: leaf.signature,
        }
    }
}

/// Audit path for one leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InclusionProof {
    pub leaf_index: u64,
    pub path: Vec<Hash>,
}
