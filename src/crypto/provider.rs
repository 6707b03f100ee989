//! Cryptographic capabilities consumed by the verifier.
//!
//! Key import, signature verification and digests sit behind
//! [`CryptoProvider`] so the orchestrator can await them independently and
//! tests can substitute failing or counting implementations.

use crate::types::{Hash, KeyHash, RawPublicKey, Signature};
use async_trait::async_trait;
use ring::signature::{UnparsedPublicKey, ED25519};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Result type for capability calls
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Failures of the underlying primitives. Always terminal for a verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("failed to import public key: {0}")]
    KeyImport(String),

    #[error("signature verification failed to run: {0}")]
    Verify(String),

    #[error("digest failed: {0}")]
    Digest(String),
}

/// An imported Ed25519 verification key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicKey {
    raw: RawPublicKey,
}

impl PublicKey {
    pub fn new(raw: RawPublicKey) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &RawPublicKey {
        &self.raw
    }
}

/// Signing and hashing primitives.
///
/// `verify` returns `Ok(false)` for a signature that does not match; `Err` is
/// reserved for the primitive itself failing.
#[async_trait]
pub trait CryptoProvider: Send + Sync {
    /// Import a raw Ed25519 public key.
    async fn import_public_key(&self, raw: &RawPublicKey) -> CryptoResult<PublicKey>;

    /// Verify an Ed25519 signature over `message`.
    async fn verify(
        &self,
        key: &PublicKey,
        signature: &Signature,
        message: &[u8],
    ) -> CryptoResult<bool>;

    /// SHA-256 of `data`.
    async fn digest(&self, data: &[u8]) -> CryptoResult<Hash>;
}

/// Compute the key hash of an imported key.
pub async fn hash_key<C>(crypto: &C, key: &PublicKey) -> CryptoResult<KeyHash>
where
    C: CryptoProvider + ?Sized,
{
    let digest = crypto.digest(key.raw().as_bytes()).await?;
    Ok(KeyHash::new(*digest.as_bytes()))
}

/// Constant-time equality. Slices of different length compare unequal.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Default provider: Ed25519 via `ring`, SHA-256 via `sha2`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RingCrypto;

impl RingCrypto {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CryptoProvider for RingCrypto {
    async fn import_public_key(&self, raw: &RawPublicKey) -> CryptoResult<PublicKey> {
        Ok(PublicKey::new(*raw))
    }

    async fn verify(
        &self,
        key: &PublicKey,
        signature: &Signature,
        message: &[u8],
    ) -> CryptoResult<bool> {
        let key = UnparsedPublicKey::new(&ED25519, key.raw().as_bytes());
        Ok(key.verify(message, signature.as_bytes()).is_ok())
    }

    async fn digest(&self, data: &[u8]) -> CryptoResult<Hash> {
        Ok(Hash::new(Sha256::digest(data).into()))
    }
}
