use std::sync::Arc;

use log::{error, info};

use crate::application::chunk_validator::ChunkValidator;
use crate::domain::chunk::{Chunk, IngestReceipt};
use crate::domain::embedding::EmbeddingProvider;
use crate::domain::error::Error;
use crate::domain::vector_repository::VectorRepository;
use crate::infrastructure::source_resolver::{IngestRequest, SourceResolver};

/// Orchestrates ingestion: classify → resolve → validate synchronously,
/// then embed and upsert in a detached background task.
///
/// Everything detectable at submission time (contradictory request, missing
/// file, failed download, schema faults) rejects the request before any
/// background work starts. A search issued moments after the receipt may
/// still see pre-upload results; that eventual-consistency window is part of
/// the contract.
#[derive(Clone)]
pub struct IngestService {
    validator: ChunkValidator,
    resolver: SourceResolver,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorRepository>,
}

impl IngestService {
    pub fn new(
        resolver: SourceResolver,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorRepository>,
    ) -> Self {
        Self {
            validator: ChunkValidator::new(),
            resolver,
            embedder,
            index,
        }
    }

    /// The synchronous half: turns a request into validated chunks, or an
    /// error, without touching the embedding service or the index.
    pub async fn prepare(&self, request: IngestRequest) -> Result<Vec<Chunk>, Error> {
        let source = request.classify()?;
        let records = self.resolver.resolve(source).await?;
        if records.is_empty() {
            return Err(Error::BadRequest("no chunks provided".to_string()));
        }
        let chunks = self.validator.validate_batch(&records)?;
        Ok(chunks)
    }

    /// Accepts an ingestion request. On success the receipt is returned
    /// immediately and embedding + indexing continue in a background task;
    /// each task owns its resources, so submissions can run concurrently.
    pub async fn submit(&self, request: IngestRequest) -> Result<IngestReceipt, Error> {
        let chunks = self.prepare(request).await?;
        let accepted = chunks.len();
        info!("Accepted {} chunks for background ingestion.", accepted);

        let service = self.clone();
        tokio::spawn(async move {
            if let Err(e) = service.embed_and_store(chunks).await {
                // Background failures are terminal for the task; nothing was
                // partially committed, so the whole submission is retriable.
                error!("Background ingestion failed: {}", e);
            }
        });

        Ok(IngestReceipt::accepted(accepted))
    }

    /// The background half: embed every chunk text, then upsert chunks and
    /// vectors in one call. All or nothing: an embedding failure aborts
    /// before anything reaches the index.
    pub async fn embed_and_store(&self, chunks: Vec<Chunk>) -> Result<(), Error> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        self.index.upsert(&chunks, &vectors).await?;
        info!("Ingested {} chunks into the vector index.", chunks.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IngestConfig;
    use crate::domain::chunk::IndexStats;
    use crate::domain::chunk::SearchResult;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct StubEmbedder {
        calls: AtomicUsize,
        dimension: usize,
        fail: bool,
    }

    impl StubEmbedder {
        fn new(dimension: usize, fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                dimension,
                fail,
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for StubEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::EmbeddingService("stub outage".to_string()));
            }
            Ok(texts.iter().map(|_| vec![0.0; self.dimension]).collect())
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn model_name(&self) -> &str {
            "stub-embedder"
        }
    }

    #[derive(Default)]
    struct RecordingIndex {
        upserted: Mutex<Vec<Chunk>>,
    }

    #[async_trait]
    impl VectorRepository for RecordingIndex {
        async fn upsert(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<(), Error> {
            assert_eq!(chunks.len(), vectors.len());
            self.upserted.lock().unwrap().extend_from_slice(chunks);
            Ok(())
        }

        async fn query(
            &self,
            _query_vector: Vec<f32>,
            _k: usize,
            _min_score: f32,
        ) -> Result<Vec<SearchResult>, Error> {
            Ok(Vec::new())
        }

        async fn get_by_document(&self, _source_doc_id: &str) -> Result<Vec<Chunk>, Error> {
            Ok(Vec::new())
        }

        async fn stats(&self) -> Result<IndexStats, Error> {
            Ok(IndexStats {
                total_chunks: self.upserted.lock().unwrap().len() as u64,
                collection_name: "test".to_string(),
            })
        }
    }

    fn service(
        embedder: Arc<StubEmbedder>,
        index: Arc<RecordingIndex>,
    ) -> IngestService {
        let resolver = SourceResolver::new(&IngestConfig {
            fetch_timeout_secs: 5,
        })
        .unwrap();
        IngestService::new(resolver, embedder, index)
    }

    fn raw_chunk(id: &str, index: i64) -> serde_json::Value {
        json!({
            "id": id,
            "source_doc_id": "docA",
            "chunk_index": index,
            "section_heading": "Agronomy",
            "journal": "Tropical Legumes",
            "publish_year": 2016,
            "usage_count": 0,
            "attributes": ["legume"],
            "link": "https://example.org/mucuna",
            "text": "velvet bean is a legume"
        })
    }

    #[tokio::test]
    async fn submit_rejects_both_sources_without_background_work() {
        let embedder = Arc::new(StubEmbedder::new(3, false));
        let index = Arc::new(RecordingIndex::default());
        let svc = service(embedder.clone(), index.clone());

        let request = IngestRequest {
            chunks: Some(vec![raw_chunk("c1", 0)]),
            file_path: Some("/tmp/chunks.json".to_string()),
        };
        let result = svc.submit(request).await;
        assert!(matches!(result, Err(Error::BadRequest(_))));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert!(index.upserted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn submit_rejects_schema_faults_synchronously() {
        let embedder = Arc::new(StubEmbedder::new(3, false));
        let index = Arc::new(RecordingIndex::default());
        let svc = service(embedder.clone(), index.clone());

        let mut bad = raw_chunk("c1", 0);
        bad.as_object_mut().unwrap().remove("text");
        let request = IngestRequest {
            chunks: Some(vec![bad]),
            file_path: None,
        };
        let result = svc.submit(request).await;
        assert!(matches!(result, Err(Error::Schema(_))));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn submit_acknowledges_then_indexes_in_background() {
        let embedder = Arc::new(StubEmbedder::new(3, false));
        let index = Arc::new(RecordingIndex::default());
        let svc = service(embedder.clone(), index.clone());

        let request = IngestRequest {
            chunks: Some(vec![raw_chunk("c1", 0), raw_chunk("c2", 1)]),
            file_path: None,
        };
        let receipt = svc.submit(request).await.unwrap();
        assert_eq!(receipt.status, "accepted");
        assert_eq!(receipt.chunks_accepted, 2);

        // Wait for the detached task to land.
        for _ in 0..50 {
            if index.upserted.lock().unwrap().len() == 2 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let upserted = index.upserted.lock().unwrap();
        assert_eq!(upserted.len(), 2);
        assert_eq!(upserted[0].id, "c1");
    }

    #[tokio::test]
    async fn embedding_failure_keeps_index_untouched() {
        let embedder = Arc::new(StubEmbedder::new(3, true));
        let index = Arc::new(RecordingIndex::default());
        let svc = service(embedder.clone(), index.clone());

        let chunks = svc
            .prepare(IngestRequest {
                chunks: Some(vec![raw_chunk("c1", 0)]),
                file_path: None,
            })
            .await
            .unwrap();
        let result = svc.embed_and_store(chunks).await;
        assert!(matches!(result, Err(Error::EmbeddingService(_))));
        assert!(index.upserted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_inline_batch_is_bad_request() {
        let embedder = Arc::new(StubEmbedder::new(3, false));
        let index = Arc::new(RecordingIndex::default());
        let svc = service(embedder, index);

        let result = svc
            .submit(IngestRequest {
                chunks: Some(vec![]),
                file_path: None,
            })
            .await;
        assert!(matches!(result, Err(Error::BadRequest(_))));
    }
}
