use std::error::Error;
use std::path::PathBuf;

use clap::{Args, ValueEnum};
use lc_corpus::{
    extract_gazetteer, read_conll, write_bio_gazetteer, write_stanford_gazetteer,
    GazetteerOptions,
};
use tracing::info;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum GazetteerFormat {
    /// `TOKEN B-LABEL` lines, as consumed by the model.
    Bio,
    /// `LABEL surface text` lines, as consumed by the baseline.
    Stanford,
}

#[derive(Args, Debug)]
pub struct GazetteerArgs {
    /// CoNLL file to extract from.
    pub input: PathBuf,
    /// Destination of the gazetteer.
    pub output: PathBuf,
    /// Keep duplicate entries.
    #[arg(long)]
    pub repeat: bool,
    /// Label of tokens outside any entity.
    #[arg(long, default_value = "O")]
    pub other_label: String,
    #[arg(long, value_enum, default_value_t = GazetteerFormat::Bio)]
    pub format: GazetteerFormat,
}

pub fn run(args: &GazetteerArgs) -> Result<(), Box<dyn Error>> {
    let corpus = read_conll(&args.input)?;
    let opts = GazetteerOptions {
        repeat: args.repeat,
        other_label: args.other_label.clone(),
    };
    let gazetteer = extract_gazetteer(corpus.instances(), &opts);
    match args.format {
        GazetteerFormat::Bio => {
            write_bio_gazetteer(gazetteer.iter(), &args.output, &args.other_label)?
        }
        GazetteerFormat::Stanford => write_stanford_gazetteer(gazetteer.iter(), &args.output)?,
    }
    info!(
        instances = corpus.len(),
        entries = gazetteer.len(),
        output = %args.output.display(),
        "wrote gazetteer"
    );
    Ok(())
}
