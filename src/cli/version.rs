/// Display version information
pub fn execute() {
    println!("sigsum-verify {}", env!("CARGO_PKG_VERSION"));
    println!("Offline verifier for Sigsum proofs of logging");
    println!(
        "Compiled policy format version {}",
        sigsum_verify::policy::COMPILED_POLICY_VERSION
    );
}
