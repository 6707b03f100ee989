use super::config::VerifierConfig;
use sigsum_verify::{Hash, Proof, RawPublicKey, TrustPolicy, Verifier};
use std::path::{Path, PathBuf};

/// Options for the `verify` command
#[derive(Debug, Clone)]
pub struct VerifyArgs {
    pub message: PathBuf,
    pub submitter_key: String,
    pub proof: PathBuf,
    pub policy: Option<PathBuf>,
    pub compiled: bool,
    pub prehashed: bool,
}

/// Verify a Sigsum proof of logging
///
/// Checks, in order:
/// - The proof's leaf was signed by the submitter key
/// - The tree head was signed by a log the policy trusts
/// - The tree head was cosigned by a quorum of trusted witnesses
/// - The leaf is included in the tree head
pub async fn execute(
    args: VerifyArgs,
    config: &VerifierConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let policy = load_policy(&args, config).await?;

    let submitter_key = RawPublicKey::from_hex(args.submitter_key.trim())
        .map_err(|e| format!("Invalid submitter key: {}", e))?;

    let proof_text = read_file(&args.proof, "proof").await?;
    let proof = Proof::from_ascii(&String::from_utf8_lossy(&proof_text))?;

    let message = read_file(&args.message, "message").await?;
    let verifier = Verifier::new();
    if args.prehashed {
        let message_hash = Hash::from_slice(&message)
            .map_err(|_| format!("Prehashed message must be exactly {} bytes", Hash::LEN))?;
        verifier
            .verify_hash(&message_hash, &submitter_key, &policy, &proof)
            .await?;
    } else {
        verifier
            .verify_message(&message, &submitter_key, &policy, &proof)
            .await?;
    }

    println!("✅ verified");
    Ok(())
}

/// Policy from the command line, else from the config file.
async fn load_policy(
    args: &VerifyArgs,
    config: &VerifierConfig,
) -> Result<TrustPolicy, Box<dyn std::error::Error>> {
    let (path, compiled) = match &args.policy {
        Some(path) => (path.clone(), args.compiled),
        None => {
            let path = config
                .policy
                .path
                .clone()
                .ok_or("No policy given: pass --policy or set policy.path in the config file")?;
            (path, config.policy.compiled)
        }
    };

    let bytes = read_file(&path, "policy").await?;
    let policy = if compiled {
        TrustPolicy::from_compiled(&bytes)?
    } else {
        TrustPolicy::from_text(&String::from_utf8_lossy(&bytes))?
    };
    tracing::debug!(path = %path.display(), compiled, "loaded trust policy");
    Ok(policy)
}

async fn read_file(path: &Path, what: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    tokio::fs::read(path)
        .await
        .map_err(|e| format!("Failed to read {} file '{}': {}", what, path.display(), e).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn args(dir: &TempDir) -> VerifyArgs {
        VerifyArgs {
            message: dir.path().join("message"),
            submitter_key: "236bb3cff541f16b1c357624d20f258cc48b7c57080ff7de60c971df70c04ad8"
                .to_string(),
            proof: dir.path().join("proof"),
            policy: None,
            compiled: false,
            prehashed: false,
        }
    }

    #[tokio::test]
    async fn test_read_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("proof");
        fs::write(&path, b"version=2\n").unwrap();
        assert_eq!(read_file(&path, "proof").await.unwrap(), b"version=2\n");

        let err = read_file(&dir.path().join("absent"), "proof")
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Failed to read proof file"));
    }

    #[tokio::test]
    async fn test_missing_policy() {
        let dir = TempDir::new().unwrap();
        let err = execute(args(&dir), &VerifierConfig::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No policy given"));
    }

    #[tokio::test]
    async fn test_unreadable_policy_file() {
        let dir = TempDir::new().unwrap();
        let mut args = args(&dir);
        args.policy = Some(dir.path().join("absent.txt"));
        let err = execute(args, &VerifierConfig::default()).await.unwrap_err();
        assert!(err.to_string().contains("Failed to read policy file"));
    }

    #[tokio::test]
    async fn test_policy_from_config() {
        let dir = TempDir::new().unwrap();
        let policy_path = dir.path().join("policy.bin");
        fs::write(&policy_path, [7u8, 0, 0, 0]).unwrap();

        let mut config = VerifierConfig::default();
        config.policy.path = Some(policy_path);
        config.policy.compiled = true;

        let err = execute(args(&dir), &config).await.unwrap_err();
        assert!(err.to_string().contains("unsupported compiled policy version"));
    }

    #[tokio::test]
    async fn test_invalid_submitter_key() {
        let dir = TempDir::new().unwrap();
        let policy_path = dir.path().join("policy.txt");
        fs::write(&policy_path, "quorum none\n").unwrap();

        let mut args = args(&dir);
        args.policy = Some(policy_path);
        args.submitter_key = "abcd".to_string();
        let err = execute(args, &VerifierConfig::default()).await.unwrap_err();
        assert!(err.to_string().starts_with("Invalid submitter key"));
    }

    #[tokio::test]
    async fn test_prehashed_message_length() {
        let dir = TempDir::new().unwrap();
        let policy_path = dir.path().join("policy.txt");
        fs::write(&policy_path, "quorum none\n").unwrap();
        fs::write(dir.path().join("message"), b"not a hash").unwrap();
        fs::write(
            dir.path().join("proof"),
            "version=2\nlog=4e89cc51651f0d95f3c6127c15e1a42e3ddf7046c5b17b752689c402e773bb4d\n\
             leaf=00004cce3ad5f54dceb2e20788b72b1c91a8c3913e7866670f5752fe14009f4d \
             7fdadea21d3268bceb9c4959f25ed8d7a0be2e23637bbcf795b861498626928bcde9180591c5d3c1d6b15b0b6a36df329226d312cde0bb36331888194df1680a\n\n\
             size=1\nroot_hash=f24ca2b7b234c380438fbeb7e6a3e7481705adf22b8ecab47ca049b31b642bd8\n\
             signature=a3e28bf1b8e97664ba2505ed1f02373af70ad86f5a794b8ddf77c9dfc2cda3766479cc53906312dc705f5892472eb1b1a60843f1fd0e0ea3442b6df6a7f11805\n\n\
             leaf_index=0\n",
        )
        .unwrap();

        let mut args = args(&dir);
        args.policy = Some(policy_path);
        args.prehashed = true;
        let err = execute(args, &VerifierConfig::default()).await.unwrap_err();
        assert!(err.to_string().contains("exactly 32 bytes"));
    }
}
