//! Trust policy model: trusted logs, trusted witnesses and the witness quorum.

use crate::encoding::EncodingError;
use crate::types::{KeyHash, RawPublicKey};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// Policy construction and policy text errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("Duplicate log key: {0}")]
    DuplicateLog(KeyHash),

    #[error("Duplicate witness key: {0}")]
    DuplicateWitness(KeyHash),

    #[error("quorum can only be set once")]
    QuorumAlreadySet,

    #[error("no quorum defined")]
    NoQuorum,

    #[error("invalid threshold: {k} of {members}")]
    InvalidThreshold { k: usize, members: usize },

    #[error("quorum references witness {0} missing from policy")]
    UnknownWitness(KeyHash),

    #[error("Unknown keyword: {0}")]
    UnknownKeyword(String),

    #[error("log line must include pubkey and optional URL")]
    LogSyntax,

    #[error("witness line must include name and pubkey and optional URL")]
    WitnessSyntax,

    #[error("group requires name, threshold, and members")]
    GroupSyntax,

    #[error("quorum requires a single name")]
    QuorumSyntax,

    #[error("duplicate name: {0}")]
    DuplicateName(String),

    #[error("undefined name: {0}")]
    UndefinedName(String),

    #[error("Ed25519 raw keys must be exactly 32-bytes")]
    InvalidKeyLength,

    #[error("invalid public key: {0}")]
    InvalidKeyEncoding(#[from] EncodingError),
}

/// A log or witness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub public_key: RawPublicKey,
    pub url: Option<String>,
}

impl Entity {
    pub fn new(public_key: RawPublicKey, url: Option<String>) -> Self {
        Self { public_key, url }
    }

    pub fn key_hash(&self) -> KeyHash {
        KeyHash::of(&self.public_key)
    }
}

/// Witness quorum rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Quorum {
    /// Satisfied when this witness has cosigned
    Single(KeyHash),

    /// Satisfied when at least `k` of `members` are satisfied
    KofN { members: Vec<Quorum>, k: usize },
}

impl Quorum {
    pub fn single(witness: KeyHash) -> Self {
        Quorum::Single(witness)
    }

    /// A `k`-of-`members` group. Requires `1 <= k <= members.len()`.
    pub fn k_of_n(members: Vec<Quorum>, k: usize) -> Result<Self, PolicyError> {
        if k < 1 || k > members.len() {
            return Err(PolicyError::InvalidThreshold {
                k,
                members: members.len(),
            });
        }
        Ok(Quorum::KofN { members, k })
    }

    /// The zero-of-zero group. Always satisfied, so it turns quorum enforcement
    /// off. Only an explicit opt-out should produce it.
    pub fn none() -> Self {
        Quorum::KofN {
            members: Vec::new(),
            k: 0,
        }
    }

    /// Whether this is the always-satisfied zero-of-zero group.
    pub fn is_none(&self) -> bool {
        matches!(self, Quorum::KofN { members, k: 0 } if members.is_empty())
    }

    pub fn is_quorum(&self, present: &HashSet<KeyHash>) -> bool {
        match self {
            Quorum::Single(witness) => present.contains(witness),
            Quorum::KofN { members, k } => {
                members.iter().filter(|m| m.is_quorum(present)).count() >= *k
            }
        }
    }

    fn validate(&self, witnesses: &BTreeMap<KeyHash, Entity>) -> Result<(), PolicyError> {
        match self {
            Quorum::Single(witness) => {
                if witnesses.contains_key(witness) {
                    Ok(())
                } else {
                    Err(PolicyError::UnknownWitness(*witness))
                }
            }
            Quorum::KofN { members, k } => {
                let valid = if members.is_empty() {
                    *k == 0
                } else {
                    *k >= 1 && *k <= members.len()
                };
                if !valid {
                    return Err(PolicyError::InvalidThreshold {
                        k: *k,
                        members: members.len(),
                    });
                }
                members.iter().try_for_each(|m| m.validate(witnesses))
            }
        }
    }
}

/// A sealed trust policy. Built once through [`PolicyBuilder`], read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    logs: BTreeMap<KeyHash, Entity>,
    witnesses: BTreeMap<KeyHash, Entity>,
    quorum: Quorum,
}

impl Policy {
    pub fn builder() -> PolicyBuilder {
        PolicyBuilder::default()
    }

    /// Trusted logs, ordered by key hash
    pub fn logs(&self) -> &BTreeMap<KeyHash, Entity> {
        &self.logs
    }

    /// Trusted witnesses, ordered by key hash
    pub fn witnesses(&self) -> &BTreeMap<KeyHash, Entity> {
        &self.witnesses
    }

    pub fn quorum(&self) -> &Quorum {
        &self.quorum
    }

    pub fn log(&self, key_hash: &KeyHash) -> Option<&Entity> {
        self.logs.get(key_hash)
    }

    pub fn is_quorum(&self, present: &HashSet<KeyHash>) -> bool {
        self.quorum.is_quorum(present)
    }
}

/// Accumulates logs, witnesses and the quorum, then seals them into a [`Policy`].
#[derive(Debug, Default)]
pub struct PolicyBuilder {
    logs: BTreeMap<KeyHash, Entity>,
    witnesses: BTreeMap<KeyHash, Entity>,
    quorum: Option<Quorum>,
}

impl PolicyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a log, returning its key hash.
    pub fn add_log(&mut self, entity: Entity) -> Result<KeyHash, PolicyError> {
        let hash = entity.key_hash();
        if self.logs.contains_key(&hash) {
            return Err(PolicyError::DuplicateLog(hash));
        }
        self.logs.insert(hash, entity);
        Ok(hash)
    }

    /// Add a witness, returning its key hash.
    pub fn add_witness(&mut self, entity: Entity) -> Result<KeyHash, PolicyError> {
        let hash = entity.key_hash();
        if self.witnesses.contains_key(&hash) {
            return Err(PolicyError::DuplicateWitness(hash));
        }
        self.witnesses.insert(hash, entity);
        Ok(hash)
    }

    pub fn set_quorum(&mut self, quorum: Quorum) -> Result<(), PolicyError> {
        if self.quorum.is_some() {
            return Err(PolicyError::QuorumAlreadySet);
        }
        self.quorum = Some(quorum);
        Ok(())
    }

    /// Seal the policy. Fails without a quorum or when the quorum names a
    /// witness that was never added.
    pub fn build(self) -> Result<Policy, PolicyError> {
        let quorum = self.quorum.ok_or(PolicyError::NoQuorum)?;
        quorum.validate(&self.witnesses)?;
        Ok(Policy {
            logs: self.logs,
            witnesses: self.witnesses,
            quorum,
        })
    }
}
