//! Configuration management for Lexbridge services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values
//!
//! Every section has defaults, so an empty environment yields a usable
//! configuration that talks to locally hosted inference servers.

use crate::lang::DEFAULT_TARGET_LANGUAGES;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP server configuration (online search service)
    pub server: ServerConfig,

    /// Embedding service configuration
    pub embedding: EmbeddingConfig,

    /// Translation service configuration
    pub translation: TranslationConfig,

    /// Summarization service configuration
    pub summarization: SummarizationConfig,

    /// Vector index configuration (online path)
    pub index: IndexConfig,

    /// Offline evaluation-corpus synthesis
    pub synthesis: SynthesisConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Number of cases returned when a request does not say
    pub default_top_k: usize,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding provider: openai, huggingface, hash
    pub provider: String,

    /// API key for embedding service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    pub model: String,

    /// Embedding dimension
    pub dimension: usize,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum retries for transient failures
    pub max_retries: u32,

    /// Batch size for embedding requests
    pub batch_size: usize,
}

/// Precision hint forwarded to the translation server
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Quantization {
    None,
    Int8,
    Int4,
    Fp16,
}

/// Decoding parameters for one kind of translation call
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct GenerationParams {
    /// Input truncation length in tokens
    pub max_input_tokens: usize,

    /// Maximum generated length in tokens
    pub max_output_tokens: usize,

    /// Beam width
    pub num_beams: u32,

    /// Forbid repeating n-grams of this size
    #[serde(default)]
    pub no_repeat_ngram_size: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// Translation provider: indictrans, mymemory, mock
    pub provider: String,

    /// Inference server endpoint
    pub endpoint: String,

    /// API key (optional)
    pub api_key: Option<String>,

    /// Items per batched call
    pub batch_size: usize,

    /// Parameters for batched calls
    pub batch: GenerationParams,

    /// Parameters for the per-item fallback calls
    pub item: GenerationParams,

    /// Timeout for one backend call in seconds
    pub timeout_secs: u64,

    /// Maximum retries for transient transport failures
    pub max_retries: u32,

    /// Precision mode hint (performance only)
    pub quantization: Quantization,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SummarizationConfig {
    /// Summarization provider: huggingface, lead
    pub provider: String,

    /// Model to use
    pub model: String,

    /// API key (optional)
    pub api_key: Option<String>,

    /// API base URL
    pub api_base: Option<String>,

    /// Maximum summary length in tokens
    pub max_length: usize,

    /// Minimum summary length in tokens
    pub min_length: usize,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Similarity metric used by a vector index
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMetric {
    Cosine,
    DotProduct,
    Euclidean,
}

impl SimilarityMetric {
    /// Whether larger scores mean closer matches
    pub fn higher_is_better(&self) -> bool {
        !matches!(self, SimilarityMetric::Euclidean)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Index provider: pinecone, memory
    pub provider: String,

    /// Index host URL (pinecone)
    pub host: Option<String>,

    /// API key (pinecone)
    pub api_key: Option<String>,

    /// Index name
    pub name: String,

    /// Metric the index was created with
    pub metric: SimilarityMetric,

    /// Corpus loaded into the in-memory index
    pub corpus_path: Option<PathBuf>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum retries for transient failures
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Raw case corpus (JSON Lines)
    pub corpus_path: PathBuf,

    /// Directory receiving the outputs
    pub output_dir: PathBuf,

    /// Output file names
    pub json_file: String,
    pub long_csv_file: String,
    pub wide_csv_file: String,
    pub archive_file: String,

    /// Number of synthetic queries (capped at corpus size)
    pub num_queries: usize,

    /// Relevant cases per query
    pub top_k: usize,

    /// Random seed for sampling and template selection
    pub seed: u64,

    /// Source language of synthesized queries
    pub source_language: String,

    /// Languages every query is translated into
    pub target_languages: Vec<String>,

    /// Languages translated at the same time
    pub translation_concurrency: usize,

    /// Documents per embedding request
    pub embed_batch_size: usize,

    /// Characters of a document fed to the summarizer
    pub snippet_chars: usize,

    /// Characters of the snippet used when summarization fails
    pub fallback_chars: usize,

    /// Case text truncation in the wide CSV
    pub wide_text_chars: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error) or a full EnvFilter directive
    pub log_level: String,

    /// Enable JSON logging
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    pub metrics_port: u16,

    /// Service name for tracing
    pub service_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8787,
            default_top_k: 3,
            request_timeout_secs: 60,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "huggingface".to_string(),
            api_key: None,
            api_base: None,
            model: crate::DEFAULT_EMBEDDING_MODEL.to_string(),
            dimension: crate::DEFAULT_EMBEDDING_DIMENSION,
            timeout_secs: 30,
            max_retries: 3,
            batch_size: 32,
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: "indictrans".to_string(),
            endpoint: "http://localhost:8090".to_string(),
            api_key: None,
            batch_size: 32,
            batch: GenerationParams {
                max_input_tokens: 512,
                max_output_tokens: 128,
                num_beams: 4,
                no_repeat_ngram_size: Some(2),
            },
            item: GenerationParams {
                max_input_tokens: 512,
                max_output_tokens: 128,
                num_beams: 4,
                no_repeat_ngram_size: None,
            },
            timeout_secs: 120,
            max_retries: 2,
            quantization: Quantization::Int8,
        }
    }
}

impl Default for SummarizationConfig {
    fn default() -> Self {
        Self {
            provider: "huggingface".to_string(),
            model: "facebook/bart-large-cnn".to_string(),
            api_key: None,
            api_base: None,
            max_length: 40,
            min_length: 15,
            timeout_secs: 60,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            provider: "pinecone".to_string(),
            host: None,
            api_key: None,
            name: "legal-documents".to_string(),
            metric: SimilarityMetric::Cosine,
            corpus_path: None,
            timeout_secs: 10,
            max_retries: 3,
        }
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            corpus_path: PathBuf::from("data/train.jsonl"),
            output_dir: PathBuf::from("output"),
            json_file: "Eval_data.json".to_string(),
            long_csv_file: "Eval_data_long.csv".to_string(),
            wide_csv_file: "Eval_data_wide_ids.csv".to_string(),
            archive_file: "Eval_data_outputs.zip".to_string(),
            num_queries: 120,
            top_k: 10,
            seed: 42,
            source_language: "en".to_string(),
            target_languages: DEFAULT_TARGET_LANGUAGES
                .iter()
                .map(|tag| tag.to_string())
                .collect(),
            translation_concurrency: 1,
            embed_batch_size: 32,
            snippet_chars: 1200,
            fallback_chars: 300,
            wide_text_chars: 500,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logging: true,
            metrics_port: 9090,
            service_name: "lexbridge".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            .add_source(Self::environment())
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Self::environment())
            .build()?;

        config.try_deserialize()
    }

    /// Environment variables with the APP__ prefix,
    /// e.g. `APP__SYNTHESIS__NUM_QUERIES=50` or `APP__SYNTHESIS__TARGET_LANGUAGES=hi,bn`
    fn environment() -> Environment {
        Environment::with_prefix("APP")
            .prefix_separator("__")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("synthesis.target_languages")
            .try_parsing(true)
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8787);
        assert_eq!(config.server.default_top_k, 3);
        assert_eq!(config.synthesis.top_k, 10);
        assert_eq!(config.synthesis.num_queries, 120);
        assert_eq!(config.synthesis.seed, 42);
        assert_eq!(config.synthesis.target_languages.len(), 22);
        assert_eq!(config.embedding.model, "sentence-transformers/all-MiniLM-L6-v2");
    }

    #[test]
    fn test_generation_params_differ_by_call_kind() {
        let config = TranslationConfig::default();
        assert_eq!(config.batch.max_input_tokens, 512);
        assert_eq!(config.item.max_input_tokens, 512);
        assert_eq!(config.batch.no_repeat_ngram_size, Some(2));
        assert_eq!(config.item.no_repeat_ngram_size, None);
    }

    #[test]
    fn test_from_toml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lexbridge.toml");
        std::fs::write(
            &path,
            "[synthesis]\nnum_queries = 5\ntop_k = 2\n\n[index]\nmetric = \"euclidean\"\n",
        )
        .unwrap();

        let config = AppConfig::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.synthesis.num_queries, 5);
        assert_eq!(config.synthesis.top_k, 2);
        assert_eq!(config.synthesis.seed, 42);
        assert_eq!(config.index.metric, SimilarityMetric::Euclidean);
        assert!(!config.index.metric.higher_is_better());
    }

    #[test]
    fn test_from_file_reads_language_list_from_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lexbridge.toml");
        std::fs::write(&path, "[synthesis]
num_queries = 5
").unwrap();

        std::env::set_var("APP__SYNTHESIS__TARGET_LANGUAGES", "hi,bn");
        let config = AppConfig::from_file(path.to_str().unwrap());
        std::env::remove_var("APP__SYNTHESIS__TARGET_LANGUAGES");

        let config = config.unwrap();
        assert_eq!(config.synthesis.target_languages, vec!["hi", "bn"]);
        assert_eq!(config.synthesis.num_queries, 5);
    }
}
