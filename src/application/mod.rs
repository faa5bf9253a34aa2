pub mod chunk_validator;
pub mod comparison_service;
pub mod ingest_service;
pub mod retrieval_service;

pub use chunk_validator::ChunkValidator;
pub use comparison_service::ComparisonService;
pub use ingest_service::IngestService;
pub use retrieval_service::RetrievalService;

use std::sync::Arc;

use crate::domain::chunk::{ComparisonResult, Document, IndexStats, IngestReceipt, SearchResponse};
use crate::domain::error::Error;
use crate::domain::usage::{UsageAnalytics, UsageRecord, UsageRepository};
use crate::infrastructure::source_resolver::IngestRequest;

/// The facade handed to the routing layer. Authorization happened before a
/// call lands here; this type only wires the services together.
pub struct Assistant {
    ingest: IngestService,
    retrieval: RetrievalService,
    comparison: ComparisonService,
    usage: Arc<dyn UsageRepository>,
}

impl Assistant {
    pub fn new(
        ingest: IngestService,
        retrieval: RetrievalService,
        comparison: ComparisonService,
        usage: Arc<dyn UsageRepository>,
    ) -> Self {
        Self {
            ingest,
            retrieval,
            comparison,
            usage,
        }
    }

    /// Accepts chunks for ingestion; embedding and indexing continue in the
    /// background after the receipt is returned.
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestReceipt, Error> {
        self.ingest.submit(request).await
    }

    pub async fn search(
        &self,
        query: &str,
        k: usize,
        min_score: f32,
    ) -> Result<SearchResponse, Error> {
        self.retrieval.search(query, k, min_score).await
    }

    pub async fn get_document(&self, source_doc_id: &str) -> Result<Document, Error> {
        self.retrieval.get_document(source_doc_id).await
    }

    pub async fn compare(
        &self,
        source_doc_id_1: &str,
        source_doc_id_2: &str,
    ) -> Result<ComparisonResult, Error> {
        self.comparison
            .compare(source_doc_id_1, source_doc_id_2)
            .await
    }

    pub async fn popular(&self, limit: usize) -> Result<Vec<UsageRecord>, Error> {
        self.usage.most_popular(limit).await
    }

    pub async fn analytics(&self) -> Result<UsageAnalytics, Error> {
        self.usage.analytics().await
    }

    pub async fn stats(&self) -> Result<IndexStats, Error> {
        self.retrieval.stats().await
    }

    /// Direct access to the ingestion pipeline for offline tooling that
    /// wants to run embed+upsert in the foreground.
    pub fn ingest_service(&self) -> &IngestService {
        &self.ingest
    }
}
