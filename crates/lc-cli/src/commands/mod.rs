pub mod cache;
pub mod gazetteer;
pub mod run;
pub mod summarize;
pub mod version;

use clap::ValueEnum;
use lc_exp::CacheFormat;

/// Cache layout as spelled on the command line.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheFormatArg {
    Snapshot,
    Journal,
}

impl From<CacheFormatArg> for CacheFormat {
    fn from(arg: CacheFormatArg) -> Self {
        match arg {
            CacheFormatArg::Snapshot => CacheFormat::Snapshot,
            CacheFormatArg::Journal => CacheFormat::Journal,
        }
    }
}
