// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    // Re-run build script if git HEAD changes
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");

    // Packagers can pin the version string
    let version = if let Ok(v) = std::env::var("EDGECAM_VERSION") {
        v
    } else {
        get_git_version()
    };

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

fn get_git_version() -> String {
    let crate_version = env!("CARGO_PKG_VERSION");

    // Outside a checkout (release tarballs) only the crate version is known
    let Some(hash) = get_commit_hash() else {
        return crate_version.to_string();
    };

    let described = Command::new("git")
        .args(["describe", "--tags", "--exact-match", "--match", "v*"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string());

    match described {
        // Exact tag: "0.1.0-abcdef1"
        Some(tag) => format!("{}-{}", tag.strip_prefix('v').unwrap_or(&tag), hash),
        // Anything else is a development build: "0.1.0-dirty-abcdef1"
        None => format!("{}-dirty-{}", crate_version, hash),
    }
}

fn get_commit_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;

    if output.status.success() {
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        None
    }
}
