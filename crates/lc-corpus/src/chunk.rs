use crate::instance::{Instance, TaggedToken};

/// A unit produced by grouping the tokens of an instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    /// A token carrying the "other" label, kept on its own.
    Flat(TaggedToken),
    /// A contiguous entity span sharing one label.
    Span {
        /// Entity label without BIO prefix.
        label: String,
        /// Surface tokens of the span in order.
        tokens: Vec<String>,
    },
}

impl Chunk {
    /// Surface text, span tokens joined by single spaces.
    pub fn text(&self) -> String {
        match self {
            Chunk::Flat(token) => token.text.clone(),
            Chunk::Span { tokens, .. } => tokens.join(" "),
        }
    }

    /// Label of the chunk (the raw label for flat tokens).
    pub fn label(&self) -> &str {
        match self {
            Chunk::Flat(token) => &token.label,
            Chunk::Span { label, .. } => label,
        }
    }
}

enum Tag<'a> {
    Other,
    Begin(&'a str),
    Inside(&'a str),
}

fn classify<'a>(label: &'a str, other_label: &str) -> Tag<'a> {
    if label == other_label {
        Tag::Other
    } else if let Some(rest) = label.strip_prefix("B-") {
        Tag::Begin(rest)
    } else if let Some(rest) = label.strip_prefix("I-") {
        Tag::Inside(rest)
    } else {
        // IO-style corpora: a bare label continues a run of the same label.
        Tag::Inside(label)
    }
}

/// Groups the tokens of an instance into flat tokens and entity spans.
///
/// `B-X` opens a span, `I-X` (or a bare `X`) extends an open span labeled
/// `X` and opens a new one otherwise. Tokens labeled `other_label` are never
/// merged: each becomes its own [`Chunk::Flat`].
pub fn chunk_instance(instance: &Instance, other_label: &str) -> Vec<Chunk> {
    let mut chunks: Vec<Chunk> = Vec::new();
    let mut open = false;
    for token in instance.tokens() {
        match classify(&token.label, other_label) {
            Tag::Other => {
                chunks.push(Chunk::Flat(token.clone()));
                open = false;
            }
            Tag::Begin(label) => {
                chunks.push(Chunk::Span {
                    label: label.to_string(),
                    tokens: vec![token.text.clone()],
                });
                open = true;
            }
            Tag::Inside(label) => {
                if open {
                    if let Some(Chunk::Span {
                        label: current,
                        tokens,
                    }) = chunks.last_mut()
                    {
                        if current.as_str() == label {
                            tokens.push(token.text.clone());
                            continue;
                        }
                    }
                }
                chunks.push(Chunk::Span {
                    label: label.to_string(),
                    tokens: vec![token.text.clone()],
                });
                open = true;
            }
        }
    }
    chunks
}
