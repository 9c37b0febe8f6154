use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use lc_core::errors::{ErrorInfo, LcError};
use lc_exp::{read_manifest, ResultCache};

use super::CacheFormatArg;

#[derive(Args, Debug)]
pub struct CacheArgs {
    /// Experiment directory to inspect.
    pub expt_dir: PathBuf,
    #[arg(long, value_enum, default_value_t = CacheFormatArg::Snapshot)]
    pub format: CacheFormatArg,
    /// List every cached key with its score.
    #[arg(long)]
    pub keys: bool,
}

pub fn run(args: &CacheArgs) -> Result<(), Box<dyn Error>> {
    if !args.expt_dir.is_dir() {
        return Err(Box::new(LcError::Cache(
            ErrorInfo::new("cache-dir-missing", "experiment directory does not exist")
                .with_context("path", args.expt_dir.display().to_string()),
        )));
    }
    let cache = ResultCache::open(&args.expt_dir, args.format.into())?;
    println!("cache: {}", cache.path().display());
    println!("entries: {}", cache.len());
    if let Some(manifest) = read_manifest(&args.expt_dir)? {
        println!("config_hash: {}", manifest.provenance.config_hash);
        println!("created_at: {}", manifest.provenance.created_at);
        println!("seed: {}", manifest.provenance.seed);
    }
    if args.keys {
        for (key, score) in cache.entries() {
            println!("{key}\t{score:?}");
        }
    }
    Ok(())
}
