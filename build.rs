// Embed git hash for --version; "unknown" outside a git checkout.
fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    let mut hash = String::from("unknown");
    if let Ok(output) = std::process::Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
    {
        if output.status.success() {
            if let Ok(s) = String::from_utf8(output.stdout) {
                hash = s.trim().to_owned();
            }
        }
    }
    println!("cargo:rustc-env=SORA_GIT_HASH={hash}");
}
