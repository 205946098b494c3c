//! Summarization service abstraction
//!
//! Providers:
//! - Hugging Face inference API `summarization` task (greedy decoding)
//! - A leading-words extractor for tests and offline dry runs

use crate::config::SummarizationConfig;
use crate::errors::{AppError, Result};
use crate::http::JsonClient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Length bounds for one summary, in model tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryBounds {
    pub max_length: usize,
    pub min_length: usize,
}

impl From<&SummarizationConfig> for SummaryBounds {
    fn from(config: &SummarizationConfig) -> Self {
        Self {
            max_length: config.max_length,
            min_length: config.min_length.min(config.max_length),
        }
    }
}

/// Trait for summary generation
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize `text` within `bounds`
    async fn summarize(&self, text: &str, bounds: SummaryBounds) -> Result<String>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Hugging Face inference API summarizer
pub struct HuggingFaceSummarizer {
    http: JsonClient,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct SummarizationRequest<'a> {
    inputs: &'a str,
    parameters: SummarizationParameters,
}

#[derive(Serialize)]
struct SummarizationParameters {
    max_length: usize,
    min_length: usize,
    do_sample: bool,
}

#[derive(Deserialize)]
struct SummarizationOutput {
    summary_text: String,
}

impl HuggingFaceSummarizer {
    pub fn new(config: &SummarizationConfig) -> Result<Self> {
        Ok(Self {
            // No retries; callers fall back on failure
            http: JsonClient::new(Duration::from_secs(config.timeout_secs), 0)?,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config
                .api_base
                .clone()
                .unwrap_or_else(|| "https://api-inference.huggingface.co".to_string()),
        })
    }
}

#[async_trait]
impl Summarizer for HuggingFaceSummarizer {
    async fn summarize(&self, text: &str, bounds: SummaryBounds) -> Result<String> {
        let url = format!("{}/models/{}", self.base_url.trim_end_matches('/'), self.model);
        let request = SummarizationRequest {
            inputs: text,
            parameters: SummarizationParameters {
                max_length: bounds.max_length,
                min_length: bounds.min_length,
                do_sample: false,
            },
        };

        let outputs = self
            .http
            .send::<Vec<SummarizationOutput>, _>(|client| {
                let builder = client.post(&url).json(&request);
                match &self.api_key {
                    Some(key) => builder.bearer_auth(key),
                    None => builder,
                }
            })
            .await
            .map_err(|e| AppError::Summarization {
                message: e.to_string(),
            })?;

        outputs
            .into_iter()
            .next()
            .map(|o| o.summary_text)
            .ok_or_else(|| AppError::Summarization {
                message: "Empty response".to_string(),
            })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Extractive summarizer keeping the first `max_length` words
#[derive(Debug, Default)]
pub struct LeadSummarizer;

#[async_trait]
impl Summarizer for LeadSummarizer {
    async fn summarize(&self, text: &str, bounds: SummaryBounds) -> Result<String> {
        let words: Vec<&str> = text.split_whitespace().take(bounds.max_length).collect();
        if words.is_empty() {
            return Err(AppError::Summarization {
                message: "Nothing to summarize".to_string(),
            });
        }
        Ok(words.join(" "))
    }

    fn model_name(&self) -> &str {
        "lead"
    }
}

/// Create a summarizer based on configuration
pub fn create_summarizer(config: &SummarizationConfig) -> Result<Arc<dyn Summarizer>> {
    match config.provider.as_str() {
        "huggingface" => Ok(Arc::new(HuggingFaceSummarizer::new(config)?)),
        "lead" | "mock" => Ok(Arc::new(LeadSummarizer)),
        other => Err(AppError::Configuration {
            message: format!("Unknown summarization provider: {}", other),
        }),
    }
}
