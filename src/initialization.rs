use std::sync::Arc;

use anyhow::{Context, Result};
use qdrant_client::Qdrant;

use crate::application::{Assistant, ComparisonService, IngestService, RetrievalService};
use crate::config::AppConfig;
use crate::domain::embedding::EmbeddingProvider;
use crate::domain::summarizer::Summarizer;
use crate::domain::usage::UsageRepository;
use crate::domain::vector_repository::VectorRepository;
use crate::infrastructure::embedding::RemoteEmbeddingClient;
use crate::infrastructure::source_resolver::SourceResolver;
use crate::infrastructure::summarization::ChatSummarizer;
use crate::infrastructure::usage_store::RedisUsageTracker;
use crate::infrastructure::vector_db::QdrantVectorIndex;

/// Builds the full dependency graph from configuration: Qdrant client and
/// collection, Redis connection, HTTP clients, and the services on top.
///
/// Construction is the only place that touches connection parameters;
/// components receive their collaborators ready-made.
pub async fn build_assistant(config: &AppConfig) -> Result<Assistant> {
    log::info!(
        "Initializing against Qdrant at {} (collection '{}')",
        config.vector_store.url,
        config.vector_store.collection
    );

    let qdrant = Qdrant::from_url(&config.vector_store.url)
        .build()
        .context("Failed to build Qdrant client")?;
    let index = QdrantVectorIndex::new(
        qdrant,
        config.vector_store.collection.clone(),
        config.embedding.dimension as u64,
    )?;
    index.initialize_collection().await?;
    let index: Arc<dyn VectorRepository> = Arc::new(index);

    let embedder: Arc<dyn EmbeddingProvider> =
        Arc::new(RemoteEmbeddingClient::new(&config.embedding)?);
    let summarizer: Arc<dyn Summarizer> = Arc::new(ChatSummarizer::new(&config.summary)?);
    let usage: Arc<dyn UsageRepository> = Arc::new(
        RedisUsageTracker::connect(&config.usage_store.url)
            .await
            .context("Failed to connect to the usage store")?,
    );

    let resolver = SourceResolver::new(&config.ingest)?;
    let ingest = IngestService::new(resolver, embedder.clone(), index.clone());
    let retrieval = RetrievalService::new(embedder, index.clone(), usage.clone());
    let comparison =
        ComparisonService::new(index, summarizer, config.summary.max_context_chars);

    Ok(Assistant::new(ingest, retrieval, comparison, usage))
}
