//! Policy compiler
//!
//! Turns a [`Policy`] into the compact binary form understood by other
//! Sigsum verifiers:
//!
//! ```text
//! [version:1][logs:1][witnesses:1][bytecode_len:1][log keys][witness keys][bytecode]
//! ```
//!
//! Logs and witnesses are written in ascending key-hash order, and a witness's
//! position in that order is its id in the bytecode. Group members are
//! emitted smallest encoding first, with same-size members ordered by their
//! bytes. Together this makes the output independent of declaration order.
//!
//! Sizes are computed for the whole tree before anything is written, so
//! compilation either fails up front or produces the full program.

use super::bytecode::{encoded_len, write_operand, CLASS_THRESHOLD, CLASS_WITNESS, OP_ADD};
use super::compiled::COMPILED_POLICY_VERSION;
use super::model::{Policy, PolicyError, Quorum};
use super::text::parse_policy_text;
use crate::types::KeyHash;
use std::collections::HashMap;
use thiserror::Error;

/// Maximum logs, witnesses and bytecode bytes in a compiled policy.
pub const MAX_COMPILED_ENTRIES: usize = 0xff;

/// Compilation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("Policy lists {0} logs, can have at most 255.")]
    TooManyLogs(usize),

    #[error("Policy lists {0} witnesses, can have at most 255.")]
    TooManyWitnesses(usize),

    #[error("Policy quorum too complex, {0} instructions, can have at most 255.")]
    QuorumTooComplex(usize),

    #[error("empty quorum group")]
    EmptyGroup,

    #[error("witness {0} referenced in quorum but missing from policy")]
    UnknownWitness(KeyHash),

    #[error(transparent)]
    Policy(#[from] PolicyError),
}

/// A quorum node with its encoded size known.
enum Prepared {
    Witness {
        id: usize,
        size: usize,
    },
    Group {
        members: Vec<Prepared>,
        threshold: usize,
        size: usize,
    },
}

impl Prepared {
    fn size(&self) -> usize {
        match self {
            Prepared::Witness { size, .. } | Prepared::Group { size, .. } => *size,
        }
    }
}

/// Compile policy text.
pub fn compile_policy_text(text: &str) -> Result<Vec<u8>, CompileError> {
    let policy = parse_policy_text(text)?;
    compile_policy(&policy)
}

/// Compile a policy into its canonical binary form.
pub fn compile_policy(policy: &Policy) -> Result<Vec<u8>, CompileError> {
    // BTreeMap iteration is already ascending by key hash
    let logs: Vec<_> = policy.logs().values().collect();
    let witnesses: Vec<_> = policy.witnesses().iter().collect();

    if logs.len() > MAX_COMPILED_ENTRIES {
        return Err(CompileError::TooManyLogs(logs.len()));
    }
    if witnesses.len() > MAX_COMPILED_ENTRIES {
        return Err(CompileError::TooManyWitnesses(witnesses.len()));
    }

    let ids: HashMap<KeyHash, usize> = witnesses
        .iter()
        .enumerate()
        .map(|(id, (hash, _))| (**hash, id))
        .collect();

    let prepared = prepare(policy.quorum(), &ids)?;
    if prepared.size() > MAX_COMPILED_ENTRIES {
        return Err(CompileError::QuorumTooComplex(prepared.size()));
    }

    let bytecode = emit(&prepared);
    debug_assert_eq!(bytecode.len(), prepared.size());

    let key_bytes = 32 * (logs.len() + witnesses.len());
    let mut out = Vec::with_capacity(4 + key_bytes + bytecode.len());
    out.push(COMPILED_POLICY_VERSION);
    out.push(logs.len() as u8);
    out.push(witnesses.len() as u8);
    out.push(bytecode.len() as u8);
    for log in logs {
        out.extend_from_slice(log.public_key.as_bytes());
    }
    for (_, witness) in witnesses {
        out.extend_from_slice(witness.public_key.as_bytes());
    }
    out.extend_from_slice(&bytecode);

    tracing::debug!(
        logs = policy.logs().len(),
        witnesses = policy.witnesses().len(),
        bytecode_len = bytecode.len(),
        "compiled policy"
    );
    Ok(out)
}

/// Size every node bottom-up.
fn prepare(quorum: &Quorum, ids: &HashMap<KeyHash, usize>) -> Result<Prepared, CompileError> {
    match quorum {
        Quorum::Single(hash) => {
            let id = *ids.get(hash).ok_or(CompileError::UnknownWitness(*hash))?;
            Ok(Prepared::Witness {
                id,
                size: encoded_len(id),
            })
        }
        Quorum::KofN { members, k } => {
            if members.is_empty() {
                return Err(CompileError::EmptyGroup);
            }
            let members = members
                .iter()
                .map(|m| prepare(m, ids))
                .collect::<Result<Vec<_>, _>>()?;

            // A lone member already evaluates to 0 or 1; no fold or threshold needed
            let size = if members.len() == 1 {
                members[0].size()
            } else {
                members.iter().map(Prepared::size).sum::<usize>()
                    + (members.len() - 1)
                    + encoded_len(*k)
            };
            Ok(Prepared::Group {
                members,
                threshold: *k,
                size,
            })
        }
    }
}

fn emit(node: &Prepared) -> Vec<u8> {
    match node {
        Prepared::Witness { id, .. } => {
            let mut out = Vec::with_capacity(encoded_len(*id));
            write_operand(&mut out, CLASS_WITNESS, *id);
            out
        }
        Prepared::Group {
            members,
            threshold,
            size,
        } => {
            let mut blocks: Vec<Vec<u8>> = members.iter().map(emit).collect();
            if blocks.len() == 1 {
                return blocks.swap_remove(0);
            }
            blocks.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));

            let mut out = Vec::with_capacity(*size);
            for (i, block) in blocks.iter().enumerate() {
                out.extend_from_slice(block);
                if i > 0 {
                    out.push(OP_ADD);
                }
            }
            write_operand(&mut out, CLASS_THRESHOLD, *threshold);
            out
        }
    }
}
