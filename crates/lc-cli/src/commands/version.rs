use std::error::Error;
use std::process::Command;

use clap::Args;
use lc_core::to_canonical_json_bytes;
use serde::Serialize;

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Emit extended metadata including git and toolchain information.
    #[arg(long)]
    pub long: bool,
}

#[derive(Debug, Serialize)]
struct VersionInfo {
    version: String,
    git_commit: String,
    rustc: String,
    sh: String,
}

pub fn run(args: &VersionArgs) -> Result<(), Box<dyn Error>> {
    if !args.long {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    let info = VersionInfo {
        version: env!("CARGO_PKG_VERSION").into(),
        git_commit: probe("git", &["rev-parse", "HEAD"]).unwrap_or_else(|| "unknown".into()),
        rustc: probe("rustc", &["--version"]).unwrap_or_else(|| "rustc unavailable".into()),
        sh: probe("sh", &["-c", "command -v sh"]).unwrap_or_else(|| "sh unavailable".into()),
    };
    let json = to_canonical_json_bytes(&info)?;
    println!("{}", String::from_utf8(json)?);
    Ok(())
}

fn probe(program: &str, args: &[&str]) -> Option<String> {
    let out = Command::new(program).args(args).output().ok()?;
    if !out.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&out.stdout).trim().to_string())
}
