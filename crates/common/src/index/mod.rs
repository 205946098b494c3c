//! Vector index abstraction
//!
//! A [`VectorIndex`] answers top-K nearest-neighbour queries over a fixed
//! embedding space. Results are ordered best first and carry distinct ids;
//! ties keep insertion order, and fewer than `top_k` results come back only
//! when the index holds fewer distinct ids.

mod pinecone;

pub use pinecone::PineconeIndex;

use crate::config::{IndexConfig, SimilarityMetric};
use crate::corpus::{load_corpus, CaseDocument};
use crate::embeddings::Embedder;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;
use tracing::info;

/// One retrieved item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredMatch {
    pub id: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: Value,
}

/// Read-only nearest-neighbour index
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Top `top_k` items for `vector`, best first
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredMatch>>;

    /// Metric the scores are expressed in
    fn metric(&self) -> SimilarityMetric;

    /// Index name for logs and health checks
    fn name(&self) -> &str;
}

pub(crate) fn ensure_top_k(top_k: usize) -> Result<()> {
    if top_k == 0 {
        return Err(AppError::Validation {
            message: "top_k must be at least 1".to_string(),
            field: Some("top_k".to_string()),
        });
    }
    Ok(())
}

/// Cosine similarity; 0.0 when either vector has zero norm
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let score = dot / (norm_a.sqrt() * norm_b.sqrt());
    if score.is_nan() {
        0.0
    } else {
        score
    }
}

/// Score every row of `matrix` against `query`, best first
///
/// Returns `(row, score)` pairs. The sort is stable, so equal scores keep
/// row order.
pub fn rank_by_cosine(query: &[f32], matrix: &[Vec<f32>]) -> Result<Vec<(usize, f32)>> {
    let mut scored = Vec::with_capacity(matrix.len());
    for (row, vector) in matrix.iter().enumerate() {
        if vector.len() != query.len() {
            return Err(AppError::Retrieval {
                message: format!(
                    "Dimension mismatch at row {}: query has {}, row has {}",
                    row,
                    query.len(),
                    vector.len()
                ),
            });
        }
        scored.push((row, cosine_similarity(query, vector)));
    }

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    Ok(scored)
}

/// First `top_k` ranked rows with distinct keys
///
/// A row whose key was already taken is skipped, so lower ranks fill the
/// freed slot.
pub fn top_k_distinct<K, F>(ranked: Vec<(usize, f32)>, top_k: usize, mut key: F) -> Vec<(usize, f32)>
where
    K: Eq + Hash,
    F: FnMut(usize) -> K,
{
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(top_k.min(ranked.len()));
    for (row, score) in ranked {
        if kept.len() == top_k {
            break;
        }
        if seen.insert(key(row)) {
            kept.push((row, score));
        }
    }
    kept
}

/// Stable re-sort of matches by the metric's direction
pub(crate) fn sort_matches(matches: &mut [ScoredMatch], metric: SimilarityMetric) {
    if metric.higher_is_better() {
        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    } else {
        matches.sort_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(Ordering::Equal));
    }
}

#[derive(Debug, Clone)]
struct IndexEntry {
    id: String,
    metadata: Value,
}

/// In-process cosine index over an embedding matrix
pub struct InMemoryIndex {
    name: String,
    entries: Vec<IndexEntry>,
    matrix: Vec<Vec<f32>>,
}

impl InMemoryIndex {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
            matrix: Vec::new(),
        }
    }

    /// Append one item; insertion order breaks score ties
    pub fn insert(&mut self, id: impl Into<String>, vector: Vec<f32>, metadata: Value) {
        self.entries.push(IndexEntry {
            id: id.into(),
            metadata,
        });
        self.matrix.push(vector);
    }

    /// Embed documents and index them with `{"text": ...}` metadata
    ///
    /// Documents with blank text are skipped.
    pub async fn from_documents(
        name: impl Into<String>,
        embedder: &dyn Embedder,
        documents: &[CaseDocument],
        batch_size: usize,
    ) -> Result<Self> {
        let mut index = Self::new(name);
        let kept: Vec<&CaseDocument> = documents
            .iter()
            .filter(|d| !d.text.trim().is_empty())
            .collect();

        for chunk in kept.chunks(batch_size.max(1)) {
            let texts: Vec<String> = chunk.iter().map(|d| d.text.trim().to_string()).collect();
            let vectors = embedder.embed_batch(&texts).await?;
            for (doc, vector) in chunk.iter().zip(vectors) {
                index.insert(doc.case_id.as_str(), vector, json!({ "text": doc.text }));
            }
        }

        info!(index = %index.name, size = index.len(), "In-memory index built");
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredMatch>> {
        ensure_top_k(top_k)?;

        let ranked = rank_by_cosine(vector, &self.matrix)?;
        let distinct = top_k_distinct(ranked, top_k, |row| self.entries[row].id.as_str());
        Ok(distinct
            .into_iter()
            .map(|(row, score)| ScoredMatch {
                id: self.entries[row].id.clone(),
                score,
                metadata: self.entries[row].metadata.clone(),
            })
            .collect())
    }

    fn metric(&self) -> SimilarityMetric {
        SimilarityMetric::Cosine
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Create a vector index based on configuration
///
/// The memory provider loads `corpus_path` and embeds it with `embedder`.
pub async fn create_index(
    config: &IndexConfig,
    embedder: &dyn Embedder,
    batch_size: usize,
) -> Result<Arc<dyn VectorIndex>> {
    match config.provider.as_str() {
        "pinecone" => Ok(Arc::new(PineconeIndex::new(config)?)),
        "memory" => {
            let path = config.corpus_path.as_ref().ok_or_else(|| AppError::Configuration {
                message: "index.corpus_path is required for the memory index".to_string(),
            })?;
            let documents = load_corpus(path)?;
            let index =
                InMemoryIndex::from_documents(config.name.clone(), embedder, &documents, batch_size)
                    .await?;
            Ok(Arc::new(index))
        }
        other => Err(AppError::Configuration {
            message: format!("Unknown index provider: {}", other),
        }),
    }
}
