//! Embedding service abstraction
//!
//! Provides a unified interface for multiple embedding providers:
//! - OpenAI-compatible `/embeddings` endpoints (hosted or local inference servers)
//! - Hugging Face feature extraction (token embeddings, mean-pooled here)
//! - A deterministic hashing embedder for tests and dry runs
//!
//! Every provider rejects empty or blank input before touching the model.

use crate::config::EmbeddingConfig;
use crate::errors::{AppError, Result};
use crate::http::JsonClient;
use crate::metrics;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Trait for embedding generation
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, one row per input in order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;
}

/// Reject inputs no embedder accepts
pub fn ensure_encodable<S: AsRef<str>>(texts: &[S]) -> Result<()> {
    if texts.is_empty() {
        return Err(AppError::Encoding {
            message: "No input to embed".to_string(),
        });
    }
    if let Some(position) = texts.iter().position(|t| t.as_ref().trim().is_empty()) {
        return Err(AppError::Encoding {
            message: format!("Input {} is empty", position),
        });
    }
    Ok(())
}

/// OpenAI-compatible embedding client
pub struct OpenAIEmbedder {
    http: JsonClient,
    api_key: Option<String>,
    model: String,
    dimension: usize,
    base_url: String,
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    data: Vec<OpenAIEmbedding>,
}

#[derive(Deserialize)]
struct OpenAIEmbedding {
    embedding: Vec<f32>,
}

impl OpenAIEmbedder {
    // Inputs per provider request
    const REQUEST_BATCH: usize = 100;

    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            http: JsonClient::new(Duration::from_secs(config.timeout_secs), config.max_retries)?,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            dimension: config.dimension,
            base_url: config
                .api_base
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
        })
    }

    async fn make_request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);
        let request = OpenAIRequest {
            input: texts,
            model: &self.model,
        };

        let start = Instant::now();
        let result = self
            .http
            .send::<OpenAIResponse, _>(|client| {
                let builder = client.post(&url).json(&request);
                match &self.api_key {
                    Some(key) => builder.bearer_auth(key),
                    None => builder,
                }
            })
            .await;
        metrics::record_embedding(
            start.elapsed().as_secs_f64(),
            &self.model,
            texts.len(),
            result.is_ok(),
        );

        let response = result.map_err(|e| AppError::Encoding {
            message: e.to_string(),
        })?;

        if response.data.len() != texts.len() {
            return Err(AppError::Encoding {
                message: format!(
                    "Expected {} embeddings, got {}",
                    texts.len(),
                    response.data.len()
                ),
            });
        }

        Ok(response.data.into_iter().map(|e| e.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings.into_iter().next().ok_or_else(|| AppError::Encoding {
            message: "Empty response".to_string(),
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        ensure_encodable(texts)?;

        let mut all_embeddings = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(Self::REQUEST_BATCH) {
            all_embeddings.extend(self.make_request(chunk).await?);
        }
        Ok(all_embeddings)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Hugging Face feature-extraction client
///
/// The endpoint returns one token×dimension matrix per input (or an already
/// pooled vector). Token rows are mean-pooled and the result L2-normalised.
pub struct HuggingFaceEmbedder {
    http: JsonClient,
    api_key: Option<String>,
    model: String,
    dimension: usize,
    base_url: String,
}

#[derive(Serialize)]
struct FeatureExtractionRequest<'a> {
    inputs: &'a [String],
}

impl HuggingFaceEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            http: JsonClient::new(Duration::from_secs(config.timeout_secs), config.max_retries)?,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            dimension: config.dimension,
            base_url: config.api_base.clone().unwrap_or_else(|| {
                "https://api-inference.huggingface.co/pipeline/feature-extraction".to_string()
            }),
        })
    }
}

#[async_trait]
impl Embedder for HuggingFaceEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings.into_iter().next().ok_or_else(|| AppError::Encoding {
            message: "Empty response".to_string(),
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        ensure_encodable(texts)?;

        let url = format!("{}/{}", self.base_url, self.model);
        let request = FeatureExtractionRequest { inputs: texts };

        let start = Instant::now();
        let result = self
            .http
            .send::<Vec<Value>, _>(|client| {
                let builder = client.post(&url).json(&request);
                match &self.api_key {
                    Some(key) => builder.bearer_auth(key),
                    None => builder,
                }
            })
            .await;
        metrics::record_embedding(
            start.elapsed().as_secs_f64(),
            &self.model,
            texts.len(),
            result.is_ok(),
        );

        let rows = result.map_err(|e| AppError::Encoding {
            message: e.to_string(),
        })?;
        if rows.len() != texts.len() {
            return Err(AppError::Encoding {
                message: format!("Expected {} embeddings, got {}", texts.len(), rows.len()),
            });
        }

        rows.iter().map(pool_features).collect()
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Reduce one feature-extraction output to a normalised vector
fn pool_features(value: &Value) -> Result<Vec<f32>> {
    let malformed = || AppError::Encoding {
        message: "Malformed feature-extraction output".to_string(),
    };

    let rows = value.as_array().ok_or_else(malformed)?;
    let tokens: Vec<Vec<f32>> = if rows.first().map(Value::is_array).unwrap_or(false) {
        rows.iter()
            .map(|row| to_floats(row).ok_or_else(malformed))
            .collect::<Result<_>>()?
    } else {
        vec![to_floats(value).ok_or_else(malformed)?]
    };

    let dim = tokens.first().map(Vec::len).unwrap_or(0);
    if dim == 0 || tokens.iter().any(|t| t.len() != dim) {
        return Err(malformed());
    }

    let mut mean = vec![0.0f32; dim];
    for token in &tokens {
        for (acc, v) in mean.iter_mut().zip(token) {
            *acc += v;
        }
    }
    let count = tokens.len() as f32;
    mean.iter_mut().for_each(|v| *v /= count);

    Ok(normalize(mean))
}

fn to_floats(value: &Value) -> Option<Vec<f32>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect()
}

fn normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|v| *v /= norm);
    }
    vector
}

/// Deterministic feature-hashing embedder
///
/// Each lowercase alphanumeric token is hashed with SHA-256 into a signed
/// bucket; the bag is L2-normalised. Texts sharing words land close together,
/// which is enough for tests and offline dry runs.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn encode(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            let index = (u64::from_le_bytes(bucket) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[index] += sign;
        }
        normalize(vector)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        ensure_encodable(&[text])?;
        Ok(self.encode(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        ensure_encodable(texts)?;
        Ok(texts.iter().map(|t| self.encode(t)).collect())
    }

    fn model_name(&self) -> &str {
        "hash-embedding"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Create an embedder based on configuration
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAIEmbedder::new(config)?)),
        "huggingface" => Ok(Arc::new(HuggingFaceEmbedder::new(config)?)),
        "hash" | "mock" => Ok(Arc::new(HashEmbedder::new(config.dimension))),
        other => Err(AppError::Configuration {
            message: format!("Unknown embedding provider: {}", other),
        }),
    }
}
