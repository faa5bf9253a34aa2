use std::path::PathBuf;
use thiserror::Error;

/// A single validation fault on one field of a raw chunk record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFault {
    /// Field path, e.g. `chunks[3].publish_year`.
    pub field: String,
    pub problem: String,
}

impl std::fmt::Display for FieldFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.problem)
    }
}

/// Validation failure carrying every fault found in one pass, not just the
/// first one.
#[derive(Debug, Clone, Error)]
#[error("invalid chunk record(s): {}", faults.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
pub struct SchemaError {
    pub faults: Vec<FieldFault>,
}

impl SchemaError {
    pub fn new(faults: Vec<FieldFault>) -> Self {
        Self { faults }
    }
}

/// The crate-wide error taxonomy. Every public operation returns one of
/// these; nothing is downgraded to an empty success.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or contradictory input detectable before any work starts.
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// A remote source could not be downloaded (timeout, transport failure,
    /// or a non-2xx response).
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// A cloud-share link whose shape we cannot rewrite to a direct download.
    #[error("unsupported source url: {0}")]
    UnsupportedSource(String),

    /// The resolved payload was not a JSON array of chunk records.
    #[error("parse error: {0}")]
    Parse(String),

    /// The embedding dependency failed after exhausting retries, or rejected
    /// the request outright.
    #[error("embedding service error: {0}")]
    EmbeddingService(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The vector store could not serve the call. Not retried here; retry
    /// policy belongs to the caller.
    #[error("vector store unavailable: {0}")]
    StoreUnavailable(String),

    /// One or both requested documents have no chunks. Carries every missing
    /// id so the caller can name them.
    #[error("document(s) not found: {}", .0.join(", "))]
    DocumentNotFound(Vec<String>),

    #[error("summarization failed: {0}")]
    Summarization(String),

    /// Usage analytics store failure. Never affects search correctness.
    #[error("usage store error: {0}")]
    UsageStore(String),
}
