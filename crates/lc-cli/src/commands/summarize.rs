use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use lc_core::to_canonical_json_bytes;
use lc_exp::{read_score_table, summarize_rows, FoldSummary};
use serde::Serialize;

#[derive(Args, Debug)]
pub struct SummarizeArgs {
    /// Score tables written by `run` (`SIZE S_1 .. S_R` per line).
    #[arg(required = true)]
    pub series: Vec<PathBuf>,
    /// Emit canonical JSON instead of a text table.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct SeriesSummary {
    series: String,
    folds: Vec<FoldSummary>,
}

pub fn run(args: &SummarizeArgs) -> Result<(), Box<dyn Error>> {
    let mut summaries = Vec::with_capacity(args.series.len());
    for path in &args.series {
        let rows = read_score_table(path)?;
        summaries.push(SeriesSummary {
            series: path.display().to_string(),
            folds: summarize_rows(&rows),
        });
    }
    if args.json {
        let json = to_canonical_json_bytes(&summaries)?;
        println!("{}", String::from_utf8(json)?);
        return Ok(());
    }
    println!("series\tsize\tn\tmean\tci95");
    for summary in &summaries {
        for fold in &summary.folds {
            println!(
                "{}\t{}\t{}\t{:.4}\t{:.4}",
                summary.series, fold.size, fold.n, fold.mean, fold.ci95
            );
        }
    }
    Ok(())
}
