// Build identification for the startup banner in main.rs

use std::process::Command;

fn main() {
    let stamp = chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, false);
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".into());

    emit("GIT_HASH", &git_hash().unwrap_or_else(|| "unknown".into()));
    emit("BUILD_TIMESTAMP", &stamp);
    emit("BUILD_PROFILE", &profile);
}

/// None outside a git checkout or without git on PATH
fn git_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short=8", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let hash = String::from_utf8(output.stdout).ok()?;
    Some(hash.trim().to_owned())
}

fn emit(key: &str, value: &str) {
    println!("cargo:rustc-env={key}={value}");
}
