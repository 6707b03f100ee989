//! Sigsum proof text format.
//!
//! A proof is a set of `key=value` lines in three parts separated by blank
//! lines: a header naming the log and the leaf, the cosigned tree head, and
//! the inclusion proof.
//!
//! ```text
//! version=2
//! log=<hex key hash>
//! leaf=<hex key hash> <hex signature>
//!
//! size=<n>
//! root_hash=<hex>
//! signature=<hex>
//! cosignature=<hex key hash> <unix time> <hex signature>
//!
//! leaf_index=<n>
//! node_hash=<hex>
//! ```
//!
//! Version 1 proofs carry an extra legacy checksum as the first field of the
//! `leaf=` line. It is ignored; verifiers always recompute the checksum.

use crate::encoding::EncodingError;
use crate::types::{
    Cosignature, CosignedTreeHead, Hash, InclusionProof, KeyHash, ShortLeaf, Signature,
    SignedTreeHead, TreeHead,
};
use std::collections::HashMap;
use thiserror::Error;

/// Proof parsing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProofParseError {
    #[error("missing {0} line")]
    MissingLine(&'static str),

    #[error("unknown proof version {0}")]
    UnknownVersion(String),

    #[error("invalid leaf line format")]
    InvalidLeafLine,

    #[error("missing tree head start")]
    MissingTreeHead,

    #[error("missing tree_head fields")]
    MissingTreeHeadFields,

    #[error("missing tree head signature")]
    MissingTreeHeadSignature,

    #[error("invalid tree size")]
    InvalidTreeSize,

    #[error("invalid cosignature format")]
    InvalidCosignature,

    #[error("invalid cosignature timestamp")]
    InvalidCosignatureTimestamp,

    #[error("duplicate cosignature for witness {0}")]
    DuplicateCosignature(KeyHash),

    #[error("invalid line in inclusion proof: {0}")]
    InvalidInclusionLine(String),

    #[error("invalid leaf_index value")]
    InvalidLeafIndex,

    #[error("duplicate leaf_index line in inclusion proof")]
    DuplicateLeafIndex,

    #[error("missing leaf_index line in inclusion proof")]
    MissingLeafIndex,

    #[error("invalid proof field: {0}")]
    Encoding(#[from] EncodingError),
}

/// A parsed proof of logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proof {
    pub version: u8,
    pub log_key_hash: KeyHash,
    pub leaf: ShortLeaf,
    pub tree_head: CosignedTreeHead,
    pub inclusion: InclusionProof,
}

impl Proof {
    /// Parse the ASCII proof format. Versions 1 and 2 are accepted.
    pub fn from_ascii(text: &str) -> Result<Self, ProofParseError> {
        let lines: Vec<&str> = text.trim().lines().collect();

        let version_value = find_value(&lines, "version").ok_or(ProofParseError::MissingLine("version"))?;
        let version = match version_value.trim() {
            "1" => 1,
            "2" => 2,
            other => return Err(ProofParseError::UnknownVersion(other.to_string())),
        };

        let log_value = find_value(&lines, "log").ok_or(ProofParseError::MissingLine("log"))?;
        let log_key_hash = KeyHash::from_hex(log_value.trim())?;

        let leaf_value = find_value(&lines, "leaf").ok_or(ProofParseError::MissingLine("leaf"))?;
        let leaf = parse_leaf(leaf_value, version)?;

        let start = lines
            .iter()
            .position(|l| l.starts_with("size="))
            .ok_or(ProofParseError::MissingTreeHead)?;
        let block = lines[start..]
            .iter()
            .take_while(|l| !l.trim().is_empty())
            .copied();
        let tree_head = parse_cosigned_tree_head(block)?;

        let inclusion_lines = match lines.iter().position(|l| l.starts_with("leaf_index=")) {
            Some(start) => lines[start..]
                .iter()
                .filter(|l| l.starts_with("leaf_index=") || l.starts_with("node_hash="))
                .copied()
                .collect(),
            None => Vec::new(),
        };
        let inclusion = parse_inclusion_proof(&inclusion_lines)?;

        Ok(Self {
            version,
            log_key_hash,
            leaf,
            tree_head,
            inclusion,
        })
    }
}

/// Value of the first line starting with `key=`.
fn find_value<'a>(lines: &[&'a str], key: &str) -> Option<&'a str> {
    lines.iter().find_map(|line| {
        line.strip_prefix(key)
            .and_then(|rest| rest.strip_prefix('='))
    })
}

fn parse_leaf(value: &str, version: u8) -> Result<ShortLeaf, ProofParseError> {
    let fields: Vec<&str> = value.split_whitespace().collect();
    let (key_hash, signature) = match (version, fields.as_slice()) {
        (1, [_checksum, key_hash, signature]) => (key_hash, signature),
        (2, [key_hash, signature]) => (key_hash, signature),
        _ => return Err(ProofParseError::InvalidLeafLine),
    };
    Ok(ShortLeaf {
        key_hash: KeyHash::from_hex(key_hash)?,
        signature: Signature::from_hex(signature)?,
    })
}

fn parse_cosigned_tree_head<'a>(
    lines: impl Iterator<Item = &'a str>,
) -> Result<CosignedTreeHead, ProofParseError> {
    let mut size = None;
    let mut root_hash = None;
    let mut signature = None;
    let mut cosignatures = HashMap::new();

    for line in lines {
        let line = line.trim();

        if let Some(rest) = line.strip_prefix("cosignature=") {
            let fields: Vec<&str> = rest.split_whitespace().collect();
            let [key_hash, timestamp, sig] = fields.as_slice() else {
                return Err(ProofParseError::InvalidCosignature);
            };
            let key_hash = KeyHash::from_hex(key_hash)?;
            let timestamp = timestamp
                .parse::<u64>()
                .ok()
                .filter(|t| *t > 0)
                .ok_or(ProofParseError::InvalidCosignatureTimestamp)?;
            let cosignature = Cosignature {
                timestamp,
                signature: Signature::from_hex(sig)?,
            };
            if cosignatures.insert(key_hash, cosignature).is_some() {
                return Err(ProofParseError::DuplicateCosignature(key_hash));
            }
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        if key.is_empty() || value.is_empty() {
            continue;
        }
        match key {
            "size" => {
                let parsed = value
                    .parse::<u64>()
                    .ok()
                    .filter(|s| *s > 0)
                    .ok_or(ProofParseError::InvalidTreeSize)?;
                size = Some(parsed);
            }
            "root_hash" => root_hash = Some(Hash::from_hex(value)?),
            "signature" => signature = Some(Signature::from_hex(value)?),
            _ => {}
        }
    }

    let (Some(size), Some(root_hash)) = (size, root_hash) else {
        return Err(ProofParseError::MissingTreeHeadFields);
    };
    let signature = signature.ok_or(ProofParseError::MissingTreeHeadSignature)?;

    Ok(CosignedTreeHead {
        signed_tree_head: SignedTreeHead {
            tree_head: TreeHead { size, root_hash },
            signature,
        },
        cosignatures,
    })
}

fn parse_inclusion_proof(lines: &[&str]) -> Result<InclusionProof, ProofParseError> {
    let mut leaf_index = None;
    let mut path = Vec::new();

    for line in lines {
        let Some((key, value)) = line.trim().split_once('=').filter(|(k, v)| !k.is_empty() && !v.is_empty())
        else {
            return Err(ProofParseError::InvalidInclusionLine(line.to_string()));
        };
        match key {
            "leaf_index" => {
                if leaf_index.is_some() {
                    return Err(ProofParseError::DuplicateLeafIndex);
                }
                leaf_index = Some(
                    value
                        .parse::<u64>()
                        .map_err(|_| ProofParseError::InvalidLeafIndex)?,
                );
            }
            "node_hash" => path.push(Hash::from_hex(value)?),
            _ => {}
        }
    }

    Ok(InclusionProof {
        leaf_index: leaf_index.ok_or(ProofParseError::MissingLeafIndex)?,
        path,
    })
}
