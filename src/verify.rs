//! Proof verification.
//!
//! [`Verifier`] runs the fixed gate sequence for a proof of logging:
//!
//! 1. import the submitter key and hash it
//! 2. compute the leaf checksum from the message hash
//! 3. match the leaf's key hash against the submitter (constant time)
//! 4. verify the leaf signature
//! 5. resolve the log key from the trust policy
//! 6. verify the tree head signature
//! 7. verify witness cosignatures until the quorum is satisfied
//! 8. verify the inclusion proof
//!
//! Every gate failure is terminal and reported as its own [`VerifyError`].
//! Only step 7 tolerates individual failures: an invalid cosignature is
//! logged and skipped, and the gate fails only once no witnesses remain.

use crate::crypto::{
    constant_time_eq, format_checkpoint, format_cosigned_data, hash_key, leaf_signed_data,
    verify_inclusion, CryptoError, CryptoProvider, MerkleError, RingCrypto,
};
use crate::policy::{CompiledPolicy, CompiledPolicyError, Policy, PolicyError};
use crate::proof::{Proof, ProofParseError};
use crate::types::{Hash, KeyHash, RawPublicKey};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Verification errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("proof key does not match the provided one")]
    KeyMismatch,

    #[error("invalid message signature")]
    InvalidMessageSignature,

    #[error("log key not found in policy")]
    LogNotFound,

    #[error("failed to verify tree head signature")]
    TreeHeadSignature,

    #[error("cosignature quorum not satisfied")]
    QuorumNotSatisfied,

    #[error(transparent)]
    Inclusion(#[from] MerkleError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    CompiledPolicy(#[from] CompiledPolicyError),

    #[error(transparent)]
    Proof(#[from] ProofParseError),
}

/// The trust policy a proof is checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustPolicy {
    /// Quorum tree, witnesses looked up by key hash
    Policy(Policy),

    /// Compiled policy, quorum evaluated by the bytecode machine
    Compiled(CompiledPolicy),
}

impl TrustPolicy {
    pub fn from_text(text: &str) -> Result<Self, PolicyError> {
        Ok(TrustPolicy::Policy(crate::policy::parse_policy_text(text)?))
    }

    pub fn from_compiled(bytes: &[u8]) -> Result<Self, CompiledPolicyError> {
        Ok(TrustPolicy::Compiled(CompiledPolicy::parse(bytes)?))
    }

    fn witness_keys(&self) -> Vec<&RawPublicKey> {
        match self {
            TrustPolicy::Policy(policy) => policy.witnesses().values().map(|e| &e.public_key).collect(),
            TrustPolicy::Compiled(compiled) => compiled.witnesses().iter().collect(),
        }
    }

    /// `present` and `found` describe the same set: by key hash and by
    /// witness position respectively.
    fn is_satisfied(&self, present: &HashSet<KeyHash>, found: &[u8]) -> bool {
        match self {
            TrustPolicy::Policy(policy) => policy.is_quorum(present),
            TrustPolicy::Compiled(compiled) => compiled.evaluate(found),
        }
    }
}

impl From<Policy> for TrustPolicy {
    fn from(policy: Policy) -> Self {
        TrustPolicy::Policy(policy)
    }
}

impl From<CompiledPolicy> for TrustPolicy {
    fn from(compiled: CompiledPolicy) -> Self {
        TrustPolicy::Compiled(compiled)
    }
}

/// Proof verifier over a [`CryptoProvider`].
///
/// Holds no per-call state; one verifier can serve concurrent calls.
#[derive(Debug, Clone, Default)]
pub struct Verifier<C: CryptoProvider = RingCrypto> {
    crypto: C,
}

impl Verifier<RingCrypto> {
    pub fn new() -> Self {
        Self { crypto: RingCrypto }
    }
}

impl<C: CryptoProvider> Verifier<C> {
    pub fn with_crypto(crypto: C) -> Self {
        Self { crypto }
    }

    pub fn crypto(&self) -> &C {
        &self.crypto
    }

    /// Verify a proof for `message`.
    pub async fn verify_message(
        &self,
        message: &[u8],
        submitter_key: &RawPublicKey,
        policy: &TrustPolicy,
        proof: &Proof,
    ) -> Result<(), VerifyError> {
        let message_hash = self.crypto.digest(message).await?;
        self.verify_hash(&message_hash, submitter_key, policy, proof)
            .await
    }

    /// Verify a proof for a message already hashed with SHA-256.
    pub async fn verify_hash(
        &self,
        message_hash: &Hash,
        submitter_key: &RawPublicKey,
        policy: &TrustPolicy,
        proof: &Proof,
    ) -> Result<(), VerifyError> {
        let submitter = self.crypto.import_public_key(submitter_key).await?;
        let submitter_hash = hash_key(&self.crypto, &submitter).await?;

        let checksum = self.crypto.digest(message_hash.as_bytes()).await?;

        if !constant_time_eq(proof.leaf.key_hash.as_bytes(), submitter_hash.as_bytes()) {
            return Err(VerifyError::KeyMismatch);
        }
        debug!(submitter = %submitter_hash, "leaf key matches submitter");

        let leaf_data = leaf_signed_data(&checksum);
        if !self
            .crypto
            .verify(&submitter, &proof.leaf.signature, &leaf_data)
            .await?
        {
            return Err(VerifyError::InvalidMessageSignature);
        }
        debug!("leaf signature verified");

        let log_raw =
            Self::resolve_log(policy, &proof.log_key_hash).ok_or(VerifyError::LogNotFound)?;
        let log_key = self.crypto.import_public_key(&log_raw).await?;

        let signed = &proof.tree_head.signed_tree_head;
        let checkpoint = format_checkpoint(&signed.tree_head, &proof.log_key_hash);
        if !self
            .crypto
            .verify(&log_key, &signed.signature, checkpoint.as_bytes())
            .await?
        {
            return Err(VerifyError::TreeHeadSignature);
        }
        debug!(log = %proof.log_key_hash, size = signed.tree_head.size, "tree head signature verified");

        if !self.check_quorum(policy, proof).await? {
            return Err(VerifyError::QuorumNotSatisfied);
        }

        let leaf = proof.leaf.to_leaf(checksum);
        let leaf_hash = self.crypto.digest(&leaf.to_bytes()).await?;
        verify_inclusion(
            &leaf_hash,
            proof.inclusion.leaf_index,
            &signed.tree_head,
            &proof.inclusion.path,
        )?;

        info!(
            log = %proof.log_key_hash,
            leaf_index = proof.inclusion.leaf_index,
            size = signed.tree_head.size,
            "proof verified"
        );
        Ok(())
    }

    /// The raw key of the log with `key_hash`, if the policy trusts it.
    fn resolve_log(policy: &TrustPolicy, key_hash: &KeyHash) -> Option<RawPublicKey> {
        match policy {
            TrustPolicy::Policy(policy) => policy.log(key_hash).map(|entity| entity.public_key),
            TrustPolicy::Compiled(compiled) => compiled.log(key_hash).copied(),
        }
    }

    /// Verify cosignatures concurrently, stopping once the quorum holds.
    ///
    /// Dropping the stream on success cancels checks still in flight.
    async fn check_quorum(&self, policy: &TrustPolicy, proof: &Proof) -> Result<bool, VerifyError> {
        let witness_keys = policy.witness_keys();
        let mut present = HashSet::new();
        let mut found = vec![0u8; witness_keys.len()];

        if policy.is_satisfied(&present, &found) {
            warn!("quorum satisfied without any cosignatures");
            return Ok(true);
        }

        let crypto = &self.crypto;
        let tree_head = proof.tree_head.tree_head();
        let log_key_hash = &proof.log_key_hash;

        let mut pending = FuturesUnordered::new();
        for (index, raw) in witness_keys.into_iter().enumerate() {
            let key = crypto.import_public_key(raw).await?;
            let witness = hash_key(crypto, &key).await?;
            let Some(cosignature) = proof.tree_head.cosignatures.get(&witness) else {
                debug!(witness = %witness, "no cosignature from witness");
                continue;
            };
            pending.push(async move {
                let data = format_cosigned_data(tree_head, log_key_hash, cosignature.timestamp);
                let valid = crypto
                    .verify(&key, &cosignature.signature, data.as_bytes())
                    .await;
                (index, witness, valid)
            });
        }

        while let Some((index, witness, valid)) = pending.next().await {
            if !valid? {
                warn!(witness = %witness, "invalid cosignature");
                continue;
            }
            debug!(witness = %witness, "cosignature verified");
            present.insert(witness);
            found[index] = 1;
            if policy.is_satisfied(&present, &found) {
                debug!(cosigned = present.len(), "quorum satisfied");
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Verify a proof for `message` with the default crypto provider.
pub async fn verify_message(
    message: &[u8],
    submitter_key: &RawPublicKey,
    policy: &TrustPolicy,
    proof: &Proof,
) -> Result<(), VerifyError> {
    Verifier::new()
        .verify_message(message, submitter_key, policy, proof)
        .await
}

/// Verify a proof for a pre-hashed message with the default crypto provider.
pub async fn verify_hash(
    message_hash: &Hash,
    submitter_key: &RawPublicKey,
    policy: &TrustPolicy,
    proof: &Proof,
) -> Result<(), VerifyError> {
    Verifier::new()
        .verify_hash(message_hash, submitter_key, policy, proof)
        .await
}

/// Parse policy text and proof text, then verify `message`.
pub async fn verify_message_with_text(
    message: &[u8],
    submitter_key: &RawPublicKey,
    policy_text: &str,
    proof_text: &str,
) -> Result<(), VerifyError> {
    let policy = TrustPolicy::from_text(policy_text)?;
    let proof = Proof::from_ascii(proof_text)?;
    verify_message(message, submitter_key, &policy, &proof).await
}

/// Parse a compiled policy and proof text, then verify `message`.
pub async fn verify_message_with_compiled(
    message: &[u8],
    submitter_key: &RawPublicKey,
    compiled_policy: &[u8],
    proof_text: &str,
) -> Result<(), VerifyError> {
    let policy = TrustPolicy::from_compiled(compiled_policy)?;
    let proof = Proof::from_ascii(proof_text)?;
    verify_message(message, submitter_key, &policy, &proof).await
}
