use sigsum_verify::encoding::encode_hex;
use sigsum_verify::policy::compile_policy_text;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Compile a policy text file into the binary policy format
///
/// Writes raw bytes, or lowercase hex with `--hex`, to `output` or stdout.
pub fn execute(
    policy: &Path,
    output: Option<&Path>,
    hex: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let text = fs::read_to_string(policy)
        .map_err(|e| format!("Failed to read policy file '{}': {}", policy.display(), e))?;

    let compiled = compile_policy_text(&text)?;
    let bytes = if hex {
        let mut encoded = encode_hex(&compiled).into_bytes();
        encoded.push(b'\n');
        encoded
    } else {
        compiled
    };

    match output {
        Some(path) => {
            fs::write(path, &bytes)
                .map_err(|e| format!("Failed to write output file '{}': {}", path.display(), e))?;
            tracing::info!(path = %path.display(), "wrote compiled policy");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.flush()?;
        }
    }

    Ok(())
}
