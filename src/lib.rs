pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod initialization;

/// Re-export the types the routing layer needs
pub use application::Assistant;
pub use config::{load_config, AppConfig};
pub use domain::chunk::{
    Chunk, ComparisonResult, Document, IndexStats, IngestReceipt, SearchResponse, SearchResult,
};
pub use domain::error::{Error, SchemaError};
pub use domain::usage::{UsageAnalytics, UsageRecord};
pub use infrastructure::source_resolver::IngestRequest;
pub use initialization::build_assistant;
