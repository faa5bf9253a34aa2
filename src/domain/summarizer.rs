use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::domain::error::Error;

/// Seam over the generative summarization dependency.
///
/// Failures surface as `Error::Summarization`; there is no internal retry.
/// The transient-failure retry budget of this system belongs to the
/// embedding dependency alone.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Produces a bounded-length summary of one document's text.
    async fn summarize(&self, text: &str) -> Result<String, Error>;

    /// Produces a comparison narrative across two already-generated
    /// summaries.
    async fn compare(&self, summary_a: &str, summary_b: &str) -> Result<String, Error>;

    fn model_name(&self) -> &str;
}
