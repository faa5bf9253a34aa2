pub mod embedding;
pub mod source_resolver;
pub mod summarization;
pub mod usage_store;
pub mod vector_db;

// Re-export key types for easier access from the application layer
pub use embedding::RemoteEmbeddingClient;
pub use source_resolver::{IngestRequest, IngestSource, SourceResolver};
pub use summarization::ChatSummarizer;
pub use usage_store::RedisUsageTracker;
pub use vector_db::QdrantVectorIndex;
