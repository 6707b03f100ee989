/// Cryptographic building blocks for proof verification
///
/// This module implements:
/// - The capability trait for Ed25519 verification and SHA-256 (provider)
/// - Canonical checkpoint and cosignature strings (checkpoint)
/// - Merkle inclusion proof verification (merkle)
pub mod checkpoint;
pub mod merkle;
pub mod provider;

pub use checkpoint::{format_checkpoint, format_cosigned_data, leaf_signed_data};
pub use merkle::{hash_interior, hash_leaf, verify_inclusion, MerkleError};
pub use provider::{
    constant_time_eq, hash_key, CryptoError, CryptoProvider, CryptoResult, PublicKey, RingCrypto,
};
