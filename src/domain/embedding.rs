use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::domain::error::Error;

/// Seam over the remote embedding dependency.
///
/// `embed` returns one fixed-dimension vector per input text, in input order.
/// Implementations may split the input into several provider calls, but a
/// call either embeds everything or fails as a whole; partially embedded
/// batches are never returned.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, Error>;

    /// Vector dimension produced by the configured model.
    fn dimension(&self) -> usize;

    fn model_name(&self) -> &str;
}
