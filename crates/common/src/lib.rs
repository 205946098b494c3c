//! Lexbridge Common Library
//!
//! Shared code for the Lexbridge services including:
//! - Case corpus model and JSONL loading
//! - Embedding client abstraction
//! - Translation with batch fallback
//! - Summarization client abstraction
//! - Vector index (in-memory and managed)
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod corpus;
pub mod embeddings;
pub mod errors;
pub mod http;
pub mod index;
pub mod lang;
pub mod metrics;
pub mod summarization;
pub mod telemetry;
pub mod translation;

// Re-export commonly used types
pub use config::AppConfig;
pub use corpus::{CaseDocument, CaseId};
pub use embeddings::Embedder;
pub use errors::{AppError, PipelineStage, Result};
pub use index::{ScoredMatch, VectorIndex};
pub use summarization::Summarizer;
pub use translation::{BatchTranslation, TranslationBackend, Translator};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Default embedding dimension
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 384;
