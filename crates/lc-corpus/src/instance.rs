use std::sync::Arc;

use lc_core::errors::{ErrorInfo, LcError};
use lc_core::rng::RngHandle;
use serde::{Deserialize, Serialize};

/// One `(token, label)` pair of a labeled sentence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaggedToken {
    /// Surface form of the token.
    pub text: String,
    /// Label as it appears in the corpus (e.g. `O`, `B-PER`, `I-LOC`).
    pub label: String,
}

impl TaggedToken {
    /// Creates a token from its surface form and label.
    pub fn new(text: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            label: label.into(),
        }
    }
}

/// A labeled sentence: an ordered sequence of tagged tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instance {
    tokens: Vec<TaggedToken>,
}

impl Instance {
    /// Wraps an ordered token sequence.
    pub fn new(tokens: Vec<TaggedToken>) -> Self {
        Self { tokens }
    }

    /// Builds an instance from `(text, label)` pairs.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self::new(
            pairs
                .into_iter()
                .map(|(text, label)| TaggedToken::new(text, label))
                .collect(),
        )
    }

    /// Tokens in sentence order.
    pub fn tokens(&self) -> &[TaggedToken] {
        &self.tokens
    }

    /// Number of tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the instance carries no tokens.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// An immutable, ordered collection of instances.
///
/// Shuffling produces a new `Corpus`; the instances themselves are shared
/// behind an `Arc`, so views never observe each other's orderings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Corpus {
    instances: Arc<[Instance]>,
}

impl Corpus {
    /// Creates a corpus from an ordered list of instances.
    pub fn new(instances: Vec<Instance>) -> Self {
        Self {
            instances: instances.into(),
        }
    }

    /// Instances in corpus order.
    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    /// Number of instances.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Whether the corpus is empty.
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Returns a freshly shuffled copy of this corpus.
    pub fn shuffled(&self, rng: &mut RngHandle) -> Corpus {
        Corpus::new(rng.shuffled(&self.instances))
    }

    /// The first `len` instances, or the whole corpus when it is shorter.
    pub fn prefix(&self, len: usize) -> &[Instance] {
        &self.instances[..len.min(self.instances.len())]
    }

    /// Exactly `len` instances starting at `start`.
    ///
    /// Fails with `corpus-insufficient` when fewer than `len` instances
    /// remain; `region` names the slice in the error context.
    pub fn region(&self, region: &str, start: usize, len: usize) -> Result<&[Instance], LcError> {
        let end = start.saturating_add(len);
        if end > self.instances.len() {
            let available = self.instances.len().saturating_sub(start);
            return Err(LcError::Corpus(
                ErrorInfo::new(
                    "corpus-insufficient",
                    format!("insufficient instances for {region}"),
                )
                .with_context("region", region)
                .with_context("start", start.to_string())
                .with_context("requested", len.to_string())
                .with_context("available", available.to_string())
                .with_hint("lower the budgets or supply a larger corpus"),
            ));
        }
        Ok(&self.instances[start..end])
    }
}
