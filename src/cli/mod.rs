use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub mod compile;
pub mod config;
pub mod verify;
pub mod version;

use config::VerifierConfig;

#[derive(Parser)]
#[command(name = "sigsum-verify")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Offline verifier for Sigsum proofs of logging", long_about = None)]
pub struct Cli {
    /// Path to config file (default: <config dir>/sigsum-verify/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Verify a proof of logging for a message
    Verify {
        /// File holding the signed message
        #[arg(long)]
        message: PathBuf,

        /// Submitter's Ed25519 public key, hex encoded
        #[arg(long)]
        submitter_key: String,

        /// Proof file in Sigsum ASCII format
        #[arg(long)]
        proof: PathBuf,

        /// Trust policy file (default: policy.path from the config file)
        #[arg(long)]
        policy: Option<PathBuf>,

        /// The policy file is a compiled policy
        #[arg(long)]
        compiled: bool,

        /// The message file holds the 32-byte SHA-256 of the message
        #[arg(long)]
        prehashed: bool,
    },

    /// Compile a policy text file into the binary policy format
    Compile {
        /// Policy text file
        #[arg(long)]
        policy: PathBuf,

        /// Output file (default: stdout)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write hex instead of raw bytes
        #[arg(long)]
        hex: bool,
    },

    /// Write a default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Display version information
    Version,
}

/// Install the tracing subscriber. `RUST_LOG` wins over the configured level.
pub fn init_logging(config: &VerifierConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

/// Load the configuration and install logging for commands that use them.
fn setup(explicit: Option<&Path>) -> Result<VerifierConfig, Box<dyn std::error::Error>> {
    let config = VerifierConfig::resolve(explicit)?;
    init_logging(&config);
    Ok(config)
}

/// Write the default config to `path`. The existing file is never parsed,
/// so `--force` can replace a broken one.
fn init_config(path: &Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() && !force {
        return Err(format!(
            "Config file '{}' already exists (use --force to overwrite)",
            path.display()
        )
        .into());
    }
    VerifierConfig::create_default(path)?;
    println!("✅ Wrote {}", path.display());
    Ok(())
}

pub async fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Verify {
            message,
            submitter_key,
            proof,
            policy,
            compiled,
            prehashed,
        } => {
            let config = setup(cli.config.as_deref())?;
            let args = verify::VerifyArgs {
                message,
                submitter_key,
                proof,
                policy,
                compiled,
                prehashed,
            };
            verify::execute(args, &config).await
        }
        Commands::Compile {
            policy,
            output,
            hex,
        } => {
            setup(cli.config.as_deref())?;
            compile::execute(&policy, output.as_deref(), hex)
        }
        Commands::InitConfig { force } => {
            let path = cli.config.unwrap_or_else(config::default_config_path);
            init_config(&path, force)
        }
        Commands::Version => {
            version::execute();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn init_config_cli(path: &Path, force: bool) -> Cli {
        let path = path.to_str().unwrap();
        let mut args = vec!["sigsum-verify", "--config", path, "init-config"];
        if force {
            args.push("--force");
        }
        Cli::parse_from(args)
    }

    #[tokio::test]
    async fn test_init_config_creates_file_at_given_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("new.toml");

        execute(init_config_cli(&path, false)).await.unwrap();

        let config = VerifierConfig::load(&path).unwrap();
        assert!(config.policy.path.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[tokio::test]
    async fn test_init_config_keeps_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();

        let err = execute(init_config_cli(&path, false)).await.unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(VerifierConfig::load(&path).unwrap().logging.level, "debug");
    }

    #[tokio::test]
    async fn test_init_config_force_replaces_unparsable_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "garbage = [").unwrap();

        execute(init_config_cli(&path, true)).await.unwrap();

        let config = VerifierConfig::load(&path).unwrap();
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_cli_parse_verify() {
        let cli = Cli::parse_from([
            "sigsum-verify",
            "verify",
            "--message",
            "msg.txt",
            "--submitter-key",
            "236bb3cff541f16b1c357624d20f258cc48b7c57080ff7de60c971df70c04ad8",
            "--proof",
            "msg.txt.proof",
        ]);

        match cli.command {
            Commands::Verify {
                message,
                submitter_key,
                proof,
                policy,
                compiled,
                prehashed,
            } => {
                assert_eq!(message, PathBuf::from("msg.txt"));
                assert!(submitter_key.starts_with("236bb3cf"));
                assert_eq!(proof, PathBuf::from("msg.txt.proof"));
                assert_eq!(policy, None);
                assert!(!compiled);
                assert!(!prehashed);
            }
            _ => panic!("Expected Verify command"),
        }
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_parse_verify_with_all_options() {
        let cli = Cli::parse_from([
            "sigsum-verify",
            "verify",
            "--message",
            "msg.sha256",
            "--submitter-key",
            "00",
            "--proof",
            "msg.proof",
            "--policy",
            "/etc/sigsum/policy.bin",
            "--compiled",
            "--prehashed",
            "--config",
            "/tmp/config.toml",
        ]);

        match cli.command {
            Commands::Verify {
                policy,
                compiled,
                prehashed,
                ..
            } => {
                assert_eq!(policy, Some(PathBuf::from("/etc/sigsum/policy.bin")));
                assert!(compiled);
                assert!(prehashed);
            }
            _ => panic!("Expected Verify command"),
        }
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/config.toml")));
    }

    #[test]
    fn test_cli_parse_compile() {
        let cli = Cli::parse_from(["sigsum-verify", "compile", "--policy", "policy.txt", "--hex"]);

        match cli.command {
            Commands::Compile {
                policy,
                output,
                hex,
            } => {
                assert_eq!(policy, PathBuf::from("policy.txt"));
                assert_eq!(output, None);
                assert!(hex);
            }
            _ => panic!("Expected Compile command"),
        }
    }

    #[test]
    fn test_cli_parse_init_config() {
        let cli = Cli::parse_from(["sigsum-verify", "init-config", "--force"]);
        assert!(matches!(cli.command, Commands::InitConfig { force: true }));
    }

    #[test]
    fn test_cli_parse_version() {
        let cli = Cli::parse_from(["sigsum-verify", "version"]);
        assert!(matches!(cli.command, Commands::Version));
    }

    #[test]
    fn test_cli_verify_requires_proof() {
        let result = Cli::try_parse_from([
            "sigsum-verify",
            "verify",
            "--message",
            "msg.txt",
            "--submitter-key",
            "00",
        ]);
        assert!(result.is_err());
    }
}
