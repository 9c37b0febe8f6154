//! Structured error types shared across lcurve crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`LcError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (paths, sizes, keys, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the lcurve engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum LcError {
    /// Corpus loading and budget errors.
    #[error("corpus error: {0}")]
    Corpus(ErrorInfo),
    /// Gazetteer extraction and serialization errors.
    #[error("gazetteer error: {0}")]
    Gazetteer(ErrorInfo),
    /// Invalid experiment configuration.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Result cache load and persistence errors.
    #[error("cache error: {0}")]
    Cache(ErrorInfo),
    /// External tool invocation and output parsing errors.
    #[error("tool error: {0}")]
    Tool(ErrorInfo),
    /// Retry budget exhausted without a usable result.
    #[error("retry error: {0}")]
    Retry(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
    /// Filesystem errors outside the other families.
    #[error("io error: {0}")]
    Io(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl LcError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            LcError::Corpus(info)
            | LcError::Gazetteer(info)
            | LcError::Config(info)
            | LcError::Cache(info)
            | LcError::Tool(info)
            | LcError::Retry(info)
            | LcError::Serde(info)
            | LcError::Io(info) => info,
        }
    }

    /// Wraps a filesystem error raised while touching `path`.
    pub fn io(code: &str, path: &Path, err: impl ToString) -> Self {
        LcError::Io(
            ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
        )
    }
}
