//! Pinecone managed index client

use super::{ensure_top_k, sort_matches, ScoredMatch, VectorIndex};
use crate::config::{IndexConfig, SimilarityMetric};
use crate::errors::{AppError, Result};
use crate::http::JsonClient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Read-only client for one Pinecone index host
pub struct PineconeIndex {
    http: JsonClient,
    host: String,
    api_key: String,
    name: String,
    metric: SimilarityMetric,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<ScoredMatch>,
}

impl PineconeIndex {
    pub fn new(config: &IndexConfig) -> Result<Self> {
        let host = config.host.as_deref().ok_or_else(|| AppError::Configuration {
            message: "index.host is required for the pinecone index".to_string(),
        })?;
        let api_key = config.api_key.clone().ok_or_else(|| AppError::Configuration {
            message: "index.api_key is required for the pinecone index".to_string(),
        })?;

        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", host.trim_end_matches('/'))
        };

        Ok(Self {
            http: JsonClient::new(Duration::from_secs(config.timeout_secs), config.max_retries)?,
            host,
            api_key,
            name: config.name.clone(),
            metric: config.metric,
        })
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredMatch>> {
        ensure_top_k(top_k)?;

        let url = format!("{}/query", self.host);
        let request = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            include_values: false,
        };

        let response = self
            .http
            .send::<QueryResponse, _>(|client| {
                client
                    .post(&url)
                    .header("Api-Key", &self.api_key)
                    .json(&request)
            })
            .await
            .map_err(|e| AppError::Retrieval {
                message: format!("Pinecone query failed: {}", e),
            })?;

        let mut matches = response.matches;
        sort_matches(&mut matches, self.metric);
        matches.truncate(top_k);

        debug!(index = %self.name, count = matches.len(), "Pinecone query complete");

        Ok(matches)
    }

    fn metric(&self) -> SimilarityMetric {
        self.metric
    }

    fn name(&self) -> &str {
        &self.name
    }
}
