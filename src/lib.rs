//! sigsum-verify - Offline verification of Sigsum proofs of logging
//!
//! Checks that a signed message was logged by a trusted transparency log and
//! that the log's tree head was cosigned by a quorum of trusted witnesses.
//!
//! Key principles:
//! - Trust comes from the policy, never from keys carried in the proof
//! - Every failing check is reported as its own error
//! - Compiled policies are byte-compatible with other Sigsum verifiers
//! - No network access; proofs and policies are plain inputs

pub mod crypto;
pub mod encoding;
pub mod policy;
pub mod proof;
pub mod types;
pub mod verify;

pub use policy::{compile_policy, compile_policy_text, CompiledPolicy, Policy};
pub use proof::Proof;
pub use types::{Hash, KeyHash, RawPublicKey, Signature};
pub use verify::{
    verify_hash, verify_message, verify_message_with_compiled, verify_message_with_text,
    TrustPolicy, Verifier, VerifyError,
};
