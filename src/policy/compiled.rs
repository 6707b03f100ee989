//! Reader for compiled policies.
//!
//! A compiled policy is a frozen trust policy: the raw keys of its logs and
//! witnesses plus a quorum program. Verifying against one never involves the
//! text parser or the quorum tree.

use super::bytecode::eval_quorum_bytecode;
use crate::types::{KeyHash, RawPublicKey};
use thiserror::Error;

/// The only compiled policy version understood.
pub const COMPILED_POLICY_VERSION: u8 = 0;

const HEADER_LEN: usize = 4;

/// Errors reading a compiled policy
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompiledPolicyError {
    #[error("compiled policy too short")]
    TooShort,

    #[error("unsupported compiled policy version {0}")]
    UnsupportedVersion(u8),

    #[error("compiled policy truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("compiled policy has {0} trailing bytes")]
    TrailingBytes(usize),

    #[error("compiled policy keys not sorted by key hash")]
    UnsortedKeys,
}

/// A parsed compiled policy.
///
/// Logs and witnesses are in ascending key-hash order. A witness's position
/// in [`witnesses`](Self::witnesses) is the id the quorum program uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPolicy {
    logs: Vec<RawPublicKey>,
    witnesses: Vec<RawPublicKey>,
    quorum: Vec<u8>,
}

impl CompiledPolicy {
    /// Parse the binary form. The input must be consumed exactly.
    pub fn parse(bytes: &[u8]) -> Result<Self, CompiledPolicyError> {
        let Some(header) = bytes.get(..HEADER_LEN) else {
            return Err(CompiledPolicyError::TooShort);
        };
        if header[0] != COMPILED_POLICY_VERSION {
            return Err(CompiledPolicyError::UnsupportedVersion(header[0]));
        }
        let log_count = usize::from(header[1]);
        let witness_count = usize::from(header[2]);
        let quorum_len = usize::from(header[3]);

        let expected = HEADER_LEN + RawPublicKey::LEN * (log_count + witness_count) + quorum_len;
        if bytes.len() < expected {
            return Err(CompiledPolicyError::Truncated {
                expected,
                actual: bytes.len(),
            });
        }
        if bytes.len() > expected {
            return Err(CompiledPolicyError::TrailingBytes(bytes.len() - expected));
        }

        let mut keys = bytes[HEADER_LEN..].chunks_exact(RawPublicKey::LEN);
        let logs = read_keys(&mut keys, log_count)?;
        let witnesses = read_keys(&mut keys, witness_count)?;
        let quorum = bytes[expected - quorum_len..].to_vec();

        Ok(Self {
            logs,
            witnesses,
            quorum,
        })
    }

    pub fn version(&self) -> u8 {
        COMPILED_POLICY_VERSION
    }

    pub fn logs(&self) -> &[RawPublicKey] {
        &self.logs
    }

    pub fn witnesses(&self) -> &[RawPublicKey] {
        &self.witnesses
    }

    pub fn quorum_bytecode(&self) -> &[u8] {
        &self.quorum
    }

    /// Find a log by key hash.
    pub fn log(&self, key_hash: &KeyHash) -> Option<&RawPublicKey> {
        self.logs.iter().find(|k| KeyHash::of(k) == *key_hash)
    }

    /// Run the quorum program. `found[i]` is 1 when witness `i` has a valid
    /// cosignature.
    pub fn evaluate(&self, found: &[u8]) -> bool {
        eval_quorum_bytecode(&self.quorum, self.witnesses.len(), found)
    }

    /// Serialize back into the binary form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            HEADER_LEN + RawPublicKey::LEN * (self.logs.len() + self.witnesses.len()) + self.quorum.len(),
        );
        out.push(COMPILED_POLICY_VERSION);
        out.push(self.logs.len() as u8);
        out.push(self.witnesses.len() as u8);
        out.push(self.quorum.len() as u8);
        for key in self.logs.iter().chain(&self.witnesses) {
            out.extend_from_slice(key.as_bytes());
        }
        out.extend_from_slice(&self.quorum);
        out
    }
}

fn read_keys<'a>(
    chunks: &mut impl Iterator<Item = &'a [u8]>,
    count: usize,
) -> Result<Vec<RawPublicKey>, CompiledPolicyError> {
    let mut keys = Vec::with_capacity(count);
    let mut previous: Option<KeyHash> = None;
    for chunk in chunks.take(count) {
        let key = RawPublicKey::from_slice(chunk).map_err(|_| CompiledPolicyError::TooShort)?;
        let hash = KeyHash::of(&key);
        if previous.is_some_and(|p| p >= hash) {
            return Err(CompiledPolicyError::UnsortedKeys);
        }
        previous = Some(hash);
        keys.push(key);
    }
    Ok(keys)
}
