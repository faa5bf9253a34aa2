use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Remote embedding API settings.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EmbeddingConfig {
    /// Base URL of an OpenAI-compatible embeddings endpoint.
    pub api_base: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub model: String,
    /// Vector dimension the model produces. Must match the collection once
    /// the index has been initialized.
    pub dimension: usize,
    /// Upper bound on texts per provider call.
    pub max_batch_size: usize,
    /// Upper bound on total characters per provider call.
    pub max_batch_chars: usize,
    pub timeout_secs: u64,
    /// Attempt ceiling for transient failures (includes the first try).
    pub max_attempts: u32,
    /// Base delay for exponential backoff between attempts.
    pub backoff_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "text-embedding-3-small".to_string(),
            dimension: 1536,
            max_batch_size: 64,
            max_batch_chars: 100_000,
            timeout_secs: 30,
            max_attempts: 4,
            backoff_ms: 500,
        }
    }
}

/// Generative summarization API settings.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SummaryConfig {
    /// Base URL of an OpenAI-compatible chat-completions endpoint.
    pub api_base: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    /// Character budget for each document's concatenated text before it is
    /// sent for summarization.
    pub max_context_chars: usize,
    pub summary_min_words: usize,
    pub summary_max_words: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 60,
            max_context_chars: 24_000,
            summary_min_words: 150,
            summary_max_words: 250,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VectorStoreConfig {
    pub url: String,
    pub collection: String,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            collection: "journal_chunks".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UsageStoreConfig {
    pub url: String,
}

impl Default for UsageStoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379/2".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct IngestConfig {
    /// Timeout for downloading a remote or cloud-share source.
    pub fetch_timeout_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 30,
        }
    }
}

/// Process-wide configuration, constructed once at startup and passed by
/// reference into each component's constructor. Components never read the
/// environment themselves.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub usage_store: UsageStoreConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

/// Loads configuration: programmatic defaults, then a TOML file
/// (`ASSIST_CONFIG_PATH` or `assist.toml`), then `ASSIST_`-prefixed
/// environment variables with `__` as the section separator.
pub fn load_config() -> Result<AppConfig> {
    let config_path_env = std::env::var("ASSIST_CONFIG_PATH").ok();
    let config_path = config_path_env
        .clone()
        .unwrap_or_else(|| "assist.toml".to_string());

    if let Some(ref env_path) = config_path_env {
        if !std::path::Path::new(env_path).exists() {
            return Err(anyhow::anyhow!(
                "Config file not found at ASSIST_CONFIG_PATH: {}",
                env_path
            ));
        }
        log::info!("ASSIST_CONFIG_PATH is set: {}", env_path);
    }

    let figment = Figment::new()
        .merge(Serialized::defaults(AppConfig::default()))
        .merge(Toml::file(&config_path))
        .merge(Env::prefixed("ASSIST_").split("__"));

    let config: AppConfig = figment.extract().context("Failed to extract AppConfig")?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &AppConfig) -> Result<()> {
    if config.embedding.dimension == 0 {
        return Err(anyhow::anyhow!("embedding.dimension must be non-zero"));
    }
    if config.embedding.max_batch_size == 0 {
        return Err(anyhow::anyhow!("embedding.max_batch_size must be non-zero"));
    }
    if config.embedding.max_attempts == 0 {
        return Err(anyhow::anyhow!("embedding.max_attempts must be non-zero"));
    }
    if config.vector_store.collection.is_empty() {
        return Err(anyhow::anyhow!("vector_store.collection cannot be empty"));
    }
    if config.summary.summary_min_words > config.summary.summary_max_words {
        return Err(anyhow::anyhow!(
            "summary.summary_min_words cannot exceed summary.summary_max_words"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_load_config_default() {
        Jail::expect_with(|_jail| {
            let config = load_config().expect("Failed to load default config");
            assert_eq!(config.vector_store.collection, "journal_chunks");
            assert_eq!(config.embedding.dimension, 1536);
            assert_eq!(config.embedding.max_attempts, 4);
            assert_eq!(config.summary.summary_max_words, 250);
            Ok(())
        });
    }

    #[test]
    fn test_load_config_toml_only() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "assist.toml",
                r#"
[embedding]
model = "text-embedding-3-large"
dimension = 3072

[vector_store]
url = "http://qdrant.internal:6334"
collection = "papers"

[usage_store]
url = "redis://cache.internal:6379/0"
                "#,
            )?;
            let config = load_config().expect("Failed to load TOML config");
            assert_eq!(config.embedding.model, "text-embedding-3-large");
            assert_eq!(config.embedding.dimension, 3072);
            assert_eq!(config.vector_store.collection, "papers");
            assert_eq!(config.usage_store.url, "redis://cache.internal:6379/0");
            // Untouched sections keep their defaults.
            assert_eq!(config.ingest.fetch_timeout_secs, 30);
            Ok(())
        });
    }

    #[test]
    fn test_load_config_env_overrides_toml() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "assist.toml",
                r#"
[summary]
model = "gpt-4o-mini"
                "#,
            )?;
            jail.set_env("ASSIST_SUMMARY__MODEL", "gpt-4o");
            jail.set_env("ASSIST_EMBEDDING__API_KEY", "sk-test");
            let config = load_config().expect("Failed to load env config");
            assert_eq!(config.summary.model, "gpt-4o");
            assert_eq!(config.embedding.api_key.as_deref(), Some("sk-test"));
            Ok(())
        });
    }

    #[test]
    fn test_load_config_rejects_zero_dimension() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "assist.toml",
                r#"
[embedding]
dimension = 0
                "#,
            )?;
            assert!(load_config().is_err());
            Ok(())
        });
    }
}
