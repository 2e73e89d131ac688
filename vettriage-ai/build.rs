//! Build script for vettriage-ai
//!
//! Stamps the binary with the commit, build time and profile it was built
//! from. These surface in the startup log and in `GET /health`.
//!
//! `VETTRIAGE_GIT_HASH` overrides the commit for builds without a git
//! checkout (container images, source tarballs).

use std::path::Path;
use std::process::Command;

const GIT_HASH_ENV: &str = "VETTRIAGE_GIT_HASH";

fn main() {
    let git_hash = std::env::var(GIT_HASH_ENV)
        .ok()
        .filter(|hash| !hash.trim().is_empty())
        .or_else(git_head_hash)
        .unwrap_or_else(|| "unknown".to_string());

    let build_timestamp = chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, false);
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rustc-env=GIT_HASH={}", git_hash.trim());
    println!("cargo:rustc-env=BUILD_TIMESTAMP={}", build_timestamp);
    println!("cargo:rustc-env=BUILD_PROFILE={}", profile);

    // Re-stamp on commit or checkout, not on every source edit
    println!("cargo:rerun-if-env-changed={}", GIT_HASH_ENV);
    let git_dir = Path::new("..").join(".git");
    for watched in ["HEAD", "refs/heads"] {
        let path = git_dir.join(watched);
        if path.exists() {
            println!("cargo:rerun-if-changed={}", path.display());
        }
    }
}

/// Short (8 character) hash of the checked-out commit
fn git_head_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short=8", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|hash| hash.trim().to_string())
}
