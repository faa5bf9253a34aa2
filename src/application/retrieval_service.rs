use std::collections::HashSet;
use std::sync::Arc;

use log::{info, warn};

use crate::domain::chunk::{Document, IndexStats, SearchResponse};
use crate::domain::embedding::EmbeddingProvider;
use crate::domain::error::Error;
use crate::domain::usage::UsageRepository;
use crate::domain::vector_repository::VectorRepository;

/// Search and document retrieval, with usage tracking as a side channel.
///
/// Every chunk returned to the caller is recorded at most once per request;
/// a tracker failure is logged and swallowed, never failing the request.
pub struct RetrievalService {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorRepository>,
    usage: Arc<dyn UsageRepository>,
}

impl RetrievalService {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorRepository>,
        usage: Arc<dyn UsageRepository>,
    ) -> Self {
        Self {
            embedder,
            index,
            usage,
        }
    }

    /// Semantic similarity search over all chunks.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        min_score: f32,
    ) -> Result<SearchResponse, Error> {
        info!("Search: '{}' (k={}, min_score={})", query, k, min_score);

        let query_vector = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .pop()
            .ok_or_else(|| {
                Error::EmbeddingService("no vector returned for query".to_string())
            })?;

        let results = self.index.query(query_vector, k, min_score).await?;
        self.record_batch(results.iter().map(|r| (&r.chunk.id, &r.chunk.source_doc_id)))
            .await;

        Ok(SearchResponse {
            total_results: results.len(),
            results,
            query: query.to_string(),
        })
    }

    /// Fetches a whole document by its source id. Absence is an error here:
    /// callers of this operation asked for one specific document.
    pub async fn get_document(&self, source_doc_id: &str) -> Result<Document, Error> {
        let chunks = self.index.get_by_document(source_doc_id).await?;
        self.record_batch(chunks.iter().map(|c| (&c.id, &c.source_doc_id)))
            .await;
        Document::from_chunks(chunks)
            .ok_or_else(|| Error::DocumentNotFound(vec![source_doc_id.to_string()]))
    }

    pub async fn stats(&self) -> Result<IndexStats, Error> {
        self.index.stats().await
    }

    /// Records one access per distinct chunk id. Deduplicated within the
    /// request so a chunk reached via several code paths still counts once.
    async fn record_batch(&self, accesses: impl Iterator<Item = (&String, &String)>) {
        let mut seen = HashSet::new();
        for (chunk_id, source_doc_id) in accesses {
            if !seen.insert(chunk_id.clone()) {
                continue;
            }
            if let Err(e) = self.usage.record_access(chunk_id, source_doc_id).await {
                warn!("Usage tracking failed for chunk '{}': {}", chunk_id, e);
            }
        }
    }
}
