use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::domain::chunk::{Chunk, IndexStats, SearchResult};
use crate::domain::error::Error;

/// Seam over the persistent vector store. The store exclusively owns chunk
/// persistence; every caller re-fetches through it rather than caching.
///
/// Store-unavailable conditions are fatal for the call and are not retried
/// inside implementations; retry policy belongs to the caller.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait VectorRepository: Send + Sync {
    /// Inserts or overwrites chunks by `id`, storing the non-vector fields as
    /// retrievable payload. `chunks` and `vectors` are parallel slices.
    /// Safe to call concurrently with `query`.
    async fn upsert(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<(), Error>;

    /// Nearest-neighbor search. Results are ordered by descending score with
    /// ties broken by ascending chunk id, truncated to `k` (clamped to
    /// [1,100]), and entries scoring below `min_score` are excluded.
    async fn query(
        &self,
        query_vector: Vec<f32>,
        k: usize,
        min_score: f32,
    ) -> Result<Vec<SearchResult>, Error>;

    /// All chunks of one document ordered by ascending `chunk_index`.
    /// An absent document yields an empty Vec, not an error.
    async fn get_by_document(&self, source_doc_id: &str) -> Result<Vec<Chunk>, Error>;

    async fn stats(&self) -> Result<IndexStats, Error>;
}
