#![deny(missing_docs)]
#![doc = "Labeled corpus loading, BIO chunking, and gazetteer extraction for learning-curve experiments."]

/// Span grouping of labeled tokens.
pub mod chunk;
/// CoNLL-style reader and writer.
pub mod conll;
/// Gazetteer extraction and serialization.
pub mod gazetteer;
/// Instance and corpus types.
pub mod instance;

pub use chunk::{chunk_instance, Chunk};
pub use conll::{parse_conll, read_conll, write_instances};
pub use gazetteer::{
    convert_bio_to_stanford, extract_gazetteer, read_bio_gazetteer, write_bio_gazetteer,
    write_empty_gazetteer, write_stanford_gazetteer, Gazetteer, GazetteerEntry, GazetteerOptions,
};
pub use instance::{Corpus, Instance, TaggedToken};
