//! Translation with batch fallback
//!
//! A [`TranslationBackend`] is the raw capability: it translates a list of
//! texts in one call and may fail as a whole. [`Translator`] wraps it with the
//! policies Lexbridge relies on:
//!
//! - strict calls (`translate_one`, `translate_many`) surface every error
//! - `translate_batch` never fails: a failed batch call is retried item by
//!   item, and an item that fails again becomes `""`
//!
//! Output is always index-aligned with input. Every backend call is bounded by
//! a timeout, and a timeout counts as a failure of that call.

mod backends;

pub use backends::{create_translation_backend, IndicTransBackend, MockTranslationBackend, MyMemoryBackend};

use crate::config::{GenerationParams, TranslationConfig};
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Raw translation capability
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    /// Translate `texts` from `source` to `target` in one call
    ///
    /// Implementations return one output per input, in order, or fail.
    async fn translate(
        &self,
        texts: &[String],
        source: &str,
        target: &str,
        params: &GenerationParams,
    ) -> Result<Vec<String>>;

    /// Backend name for logs
    fn name(&self) -> &str;
}

/// How one item of a fault-tolerant batch was produced
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum ItemTranslation {
    /// Translated by the batched call
    Batched(String),
    /// Translated by the per-item retry after its batch failed
    Recovered(String),
    /// Failed in both paths; contributes an empty string
    Failed(String),
}

impl ItemTranslation {
    /// Text contributed to the output, `""` on failure
    pub fn text(&self) -> &str {
        match self {
            ItemTranslation::Batched(text) | ItemTranslation::Recovered(text) => text,
            ItemTranslation::Failed(_) => "",
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ItemTranslation::Failed(_))
    }
}

/// Result of a fault-tolerant batch, aligned with its input
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchTranslation {
    pub target: String,
    pub items: Vec<ItemTranslation>,
}

impl BatchTranslation {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Output texts, `""` where translation failed
    pub fn texts(&self) -> Vec<String> {
        self.items.iter().map(|i| i.text().to_string()).collect()
    }

    pub fn recovered_count(&self) -> usize {
        self.items
            .iter()
            .filter(|i| matches!(i, ItemTranslation::Recovered(_)))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.items.iter().filter(|i| i.is_failed()).count()
    }
}

/// Translation front-end over a backend
pub struct Translator {
    backend: Arc<dyn TranslationBackend>,
    batch_size: usize,
    batch_params: GenerationParams,
    item_params: GenerationParams,
    timeout: Duration,
}

impl Translator {
    pub fn new(backend: Arc<dyn TranslationBackend>, config: &TranslationConfig) -> Self {
        Self {
            backend,
            batch_size: config.batch_size.max(1),
            batch_params: config.batch.clone(),
            item_params: config.item.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Override the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    async fn call(
        &self,
        texts: &[String],
        source: &str,
        target: &str,
        params: &GenerationParams,
    ) -> Result<Vec<String>> {
        let pending = self.backend.translate(texts, source, target, params);
        let translated = tokio::time::timeout(self.timeout, pending)
            .await
            .map_err(|_| AppError::TranslationTimeout {
                timeout_ms: self.timeout.as_millis() as u64,
            })??;

        if translated.len() != texts.len() {
            return Err(AppError::Translation {
                message: format!(
                    "Expected {} translations, got {}",
                    texts.len(),
                    translated.len()
                ),
            });
        }
        Ok(translated)
    }

    /// Translate a single text, surfacing any failure
    pub async fn translate_one(&self, text: &str, source: &str, target: &str) -> Result<String> {
        let translated = self
            .call(&[text.to_string()], source, target, &self.item_params)
            .await?;
        translated.into_iter().next().ok_or_else(|| AppError::Translation {
            message: "Empty response".to_string(),
        })
    }

    /// Translate many texts in batches, failing on the first error
    pub async fn translate_many(
        &self,
        texts: &[String],
        source: &str,
        target: &str,
    ) -> Result<Vec<String>> {
        let mut translated = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            translated.extend(self.call(chunk, source, target, &self.batch_params).await?);
        }
        Ok(translated)
    }

    /// Translate many texts, degrading failures to empty strings
    #[instrument(skip(self, texts), fields(backend = self.backend.name(), count = texts.len()))]
    pub async fn translate_batch(
        &self,
        texts: &[String],
        source: &str,
        target: &str,
    ) -> BatchTranslation {
        let mut items = Vec::with_capacity(texts.len());

        for (chunk_index, chunk) in texts.chunks(self.batch_size).enumerate() {
            let offset = chunk_index * self.batch_size;

            match self.call(chunk, source, target, &self.batch_params).await {
                Ok(translated) => {
                    items.extend(translated.into_iter().map(ItemTranslation::Batched));
                    metrics::record_translation_batch(target, false, 0);
                }
                Err(e) => {
                    let batch_error = AppError::TranslationBatch {
                        target: target.to_string(),
                        message: e.to_string(),
                    };
                    warn!(error = %batch_error, offset, "Falling back to per-item translation");

                    let mut failed = 0;
                    for (i, text) in chunk.iter().enumerate() {
                        let single = std::slice::from_ref(text);
                        match self.call(single, source, target, &self.item_params).await {
                            Ok(translated) => {
                                let text = translated.into_iter().next().unwrap_or_default();
                                items.push(ItemTranslation::Recovered(text));
                            }
                            Err(e) => {
                                failed += 1;
                                let item_error = AppError::TranslationItem {
                                    target: target.to_string(),
                                    index: offset + i,
                                    message: e.to_string(),
                                };
                                debug!(error = %item_error, "Item left untranslated");
                                items.push(ItemTranslation::Failed(item_error.to_string()));
                            }
                        }
                    }
                    metrics::record_translation_batch(target, true, failed);
                }
            }
        }

        BatchTranslation {
            target: target.to_string(),
            items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails any call containing a text that starts with "BAD"
    struct PoisonBackend {
        calls: AtomicUsize,
    }

    impl PoisonBackend {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TranslationBackend for PoisonBackend {
        async fn translate(
            &self,
            texts: &[String],
            _source: &str,
            target: &str,
            _params: &GenerationParams,
        ) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if texts.iter().any(|t| t.starts_with("BAD")) {
                return Err(AppError::Translation {
                    message: "tokenizer choked".to_string(),
                });
            }
            Ok(texts.iter().map(|t| format!("{}:{}", target, t)).collect())
        }

        fn name(&self) -> &str {
            "poison"
        }
    }

    /// Never answers
    struct StallBackend;

    #[async_trait]
    impl TranslationBackend for StallBackend {
        async fn translate(
            &self,
            _texts: &[String],
            _source: &str,
            _target: &str,
            _params: &GenerationParams,
        ) -> Result<Vec<String>> {
            std::future::pending().await
        }

        fn name(&self) -> &str {
            "stall"
        }
    }

    /// Drops the last output
    struct ShortBackend;

    #[async_trait]
    impl TranslationBackend for ShortBackend {
        async fn translate(
            &self,
            texts: &[String],
            _source: &str,
            _target: &str,
            _params: &GenerationParams,
        ) -> Result<Vec<String>> {
            Ok(texts.iter().skip(1).cloned().collect())
        }

        fn name(&self) -> &str {
            "short"
        }
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_poisoned_item_becomes_empty() {
        let translator = Translator::new(Arc::new(PoisonBackend::new()), &TranslationConfig::default());
        let input = texts(&["contract", "BAD input", "damages"]);

        let result = translator.translate_batch(&input, "en", "hi").await;

        assert_eq!(result.texts(), vec!["hi:contract", "", "hi:damages"]);
        assert_eq!(result.recovered_count(), 2);
        assert_eq!(result.failed_count(), 1);
    }

    #[tokio::test]
    async fn test_fallback_is_per_chunk() {
        let backend = Arc::new(PoisonBackend::new());
        let config = TranslationConfig {
            batch_size: 2,
            ..Default::default()
        };
        let translator = Translator::new(backend.clone(), &config);
        let input = texts(&["a", "b", "BAD", "c", "d"]);

        let result = translator.translate_batch(&input, "en", "ta").await;

        assert_eq!(result.texts(), vec!["ta:a", "ta:b", "", "ta:c", "ta:d"]);
        assert_eq!(
            result.items[0],
            ItemTranslation::Batched("ta:a".to_string())
        );
        assert_eq!(
            result.items[3],
            ItemTranslation::Recovered("ta:c".to_string())
        );
        // 3 chunk calls + 2 item retries for the poisoned chunk
        assert_eq!(backend.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_timeout_triggers_fallback() {
        let translator = Translator::new(Arc::new(StallBackend), &TranslationConfig::default())
            .with_timeout(Duration::from_millis(20));
        let input = texts(&["x", "y"]);

        let result = translator.translate_batch(&input, "en", "bn").await;

        assert_eq!(result.texts(), vec!["", ""]);
        assert_eq!(result.failed_count(), 2);
    }

    #[tokio::test]
    async fn test_length_mismatch_is_batch_failure() {
        let translator = Translator::new(Arc::new(ShortBackend), &TranslationConfig::default());
        let input = texts(&["x", "y", "z"]);

        let result = translator.translate_batch(&input, "en", "gu").await;
        assert_eq!(result.len(), 3);
        assert_eq!(result.failed_count(), 3);

        let err = translator.translate_many(&input, "en", "gu").await.unwrap_err();
        assert!(matches!(err, AppError::Translation { .. }));
    }

    #[tokio::test]
    async fn test_strict_calls_surface_errors() {
        let translator = Translator::new(Arc::new(PoisonBackend::new()), &TranslationConfig::default());
        assert_eq!(
            translator.translate_one("bail", "hi", "en").await.unwrap(),
            "en:bail"
        );
        tokio_test::assert_err!(translator.translate_one("BAD", "hi", "en").await);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let translator = Translator::new(Arc::new(PoisonBackend::new()), &TranslationConfig::default());
        let result = translator.translate_batch(&[], "en", "hi").await;
        assert!(result.is_empty());
        assert!(translator.translate_many(&[], "en", "hi").await.unwrap().is_empty());
    }
}
