//! Trust policies for Sigsum verification
//!
//! A policy names the logs a verifier trusts, the witnesses whose
//! cosignatures count, and the quorum of witnesses a tree head needs.
//!
//! Two representations are supported:
//! - The structured [`Policy`], built programmatically or parsed from text
//! - The binary [`CompiledPolicy`], evaluated by a small stack machine
//!
//! ## Properties
//! - Compilation is independent of the order logs, witnesses and group
//!   members are declared in
//! - Evaluating a compiled quorum agrees with evaluating the quorum tree
//! - Malformed quorum bytecode evaluates to "not satisfied", never a panic

pub mod bytecode;
pub mod compiled;
pub mod compiler;
pub mod model;
pub mod text;

#[cfg(test)]
mod proptests;

pub use bytecode::eval_quorum_bytecode;
pub use compiled::{CompiledPolicy, CompiledPolicyError, COMPILED_POLICY_VERSION};
pub use compiler::{compile_policy, compile_policy_text, CompileError};
pub use model::{Entity, Policy, PolicyBuilder, PolicyError, Quorum};
pub use text::{parse_policy_text, NONE_QUORUM_NAME};
