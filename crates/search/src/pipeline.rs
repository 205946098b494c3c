//! Online cross-lingual retrieval pipeline
//!
//! `RECEIVED -> [TRANSLATED_TO_EN] -> EMBEDDED -> RETRIEVED -> [TRANSLATED_TO_TARGET] -> RETURNED`
//!
//! Bracketed stages are skipped for English. A failure anywhere is reported
//! as [`AppError::Stage`] naming the stage that failed.

use lexbridge_common::{
    errors::{AppError, PipelineStage, Result},
    lang::{is_english, ENGLISH},
    metrics, Embedder, ScoredMatch, Translator, VectorIndex,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// English form of a query together with its matches
#[derive(Debug, Clone)]
pub struct ResolvedQuery {
    pub english_query: String,
    pub matches: Vec<ScoredMatch>,
}

/// Query path shared by all request handlers
pub struct LegalPipeline {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    translator: Arc<Translator>,
}

impl LegalPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        translator: Arc<Translator>,
    ) -> Self {
        Self {
            embedder,
            index,
            translator,
        }
    }

    pub fn index_name(&self) -> &str {
        self.index.name()
    }

    /// Ranked cases for `user_input` written in `lang`
    pub async fn get_cases(
        &self,
        user_input: &str,
        lang: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredMatch>> {
        Ok(self.resolve(user_input, lang, top_k).await?.matches)
    }

    /// Translate to English when needed, embed and retrieve
    #[instrument(skip(self, user_input), fields(index = self.index.name()))]
    pub async fn resolve(&self, user_input: &str, lang: &str, top_k: usize) -> Result<ResolvedQuery> {
        if user_input.trim().is_empty() {
            return Err(AppError::Validation {
                message: "Query must not be blank".to_string(),
                field: Some("query".to_string()),
            }
            .at_stage(PipelineStage::Received));
        }

        let english_query = if is_english(lang) {
            user_input.to_string()
        } else {
            let translated = self
                .translator
                .translate_one(user_input, lang, ENGLISH)
                .await
                .map_err(|e| e.at_stage(PipelineStage::TranslatedToEn))?;
            debug!(source = lang, "Query translated to English");
            translated
        };

        let vector = self
            .embedder
            .embed(&english_query)
            .await
            .map_err(|e| e.at_stage(PipelineStage::Embedded))?;

        let start = Instant::now();
        let matches = self
            .index
            .query(&vector, top_k)
            .await
            .map_err(|e| e.at_stage(PipelineStage::Retrieved))?;
        metrics::record_retrieval(start.elapsed().as_secs_f64(), self.index.name(), matches.len());

        info!(results = matches.len(), "Cases retrieved");
        Ok(ResolvedQuery {
            english_query,
            matches,
        })
    }

    /// Translate English result texts into `target_lang`, index-aligned
    pub async fn translate_results(
        &self,
        summaries: &[String],
        target_lang: &str,
    ) -> Result<Vec<String>> {
        if is_english(target_lang) || summaries.is_empty() {
            return Ok(summaries.to_vec());
        }

        self.translator
            .translate_many(summaries, ENGLISH, target_lang)
            .await
            .map_err(|e| e.at_stage(PipelineStage::TranslatedToTarget))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lexbridge_common::{
        config::{GenerationParams, TranslationConfig},
        corpus::CaseDocument,
        embeddings::HashEmbedder,
        index::InMemoryIndex,
        translation::{MockTranslationBackend, TranslationBackend},
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls, then behaves like the mock backend
    #[derive(Default)]
    struct CountingBackend {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TranslationBackend for CountingBackend {
        async fn translate(
            &self,
            texts: &[String],
            source: &str,
            target: &str,
            params: &GenerationParams,
        ) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            MockTranslationBackend.translate(texts, source, target, params).await
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    struct RejectingBackend;

    #[async_trait]
    impl TranslationBackend for RejectingBackend {
        async fn translate(
            &self,
            _texts: &[String],
            _source: &str,
            _target: &str,
            _params: &GenerationParams,
        ) -> Result<Vec<String>> {
            Err(AppError::UnsupportedLanguage {
                tag: "xx".to_string(),
            })
        }

        fn name(&self) -> &str {
            "rejecting"
        }
    }

    async fn pipeline_with(backend: Arc<dyn TranslationBackend>) -> LegalPipeline {
        let embedder = Arc::new(HashEmbedder::new(256));
        let documents = vec![
            CaseDocument::new("1", "breach of contract damages awarded"),
            CaseDocument::new("2", "anticipatory breach of a sale contract"),
            CaseDocument::new("3", "bail granted in a murder trial"),
        ];
        let index = InMemoryIndex::from_documents("cases", embedder.as_ref(), &documents, 8)
            .await
            .unwrap();
        let translator = Translator::new(backend, &TranslationConfig::default());
        LegalPipeline::new(embedder, Arc::new(index), Arc::new(translator))
    }

    #[tokio::test]
    async fn test_english_query_skips_translation() {
        let backend = Arc::new(CountingBackend::default());
        let pipeline = pipeline_with(backend.clone()).await;

        let resolved = pipeline
            .resolve("breach of contract damages", "eng_Latn", 3)
            .await
            .unwrap();
        assert_eq!(resolved.english_query, "breach of contract damages");
        assert_eq!(resolved.matches.len(), 3);
        assert_eq!(resolved.matches[0].id, "1");
        assert!(resolved
            .matches
            .windows(2)
            .all(|w| w[0].score >= w[1].score));

        let summaries = vec!["1. Case".to_string()];
        let out = pipeline.translate_results(&summaries, "EN").await.unwrap();
        assert_eq!(out, summaries);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_foreign_query_is_translated_both_ways() {
        let backend = Arc::new(CountingBackend::default());
        let pipeline = pipeline_with(backend.clone()).await;

        let resolved = pipeline.resolve("अनुबंध का उल्लंघन", "hi", 2).await.unwrap();
        assert_eq!(resolved.english_query, "[en] अनुबंध का उल्लंघन");
        assert_eq!(resolved.matches.len(), 2);

        let out = pipeline
            .translate_results(&["a".to_string(), "b".to_string()], "hi")
            .await
            .unwrap();
        assert_eq!(out, vec!["[hi] a", "[hi] b"]);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_get_cases_caps_at_corpus_size() {
        let pipeline = pipeline_with(Arc::new(CountingBackend::default())).await;
        let cases = tokio_test::assert_ok!(pipeline.get_cases("contract", "en", 50).await);
        assert_eq!(cases.len(), 3);
    }

    #[tokio::test]
    async fn test_failures_name_their_stage() {
        let pipeline = pipeline_with(Arc::new(RejectingBackend)).await;

        let err = pipeline.resolve("query", "xx", 3).await.unwrap_err();
        assert_eq!(err.stage(), Some(PipelineStage::TranslatedToEn));

        let err = pipeline.resolve("query", "en", 0).await.unwrap_err();
        assert_eq!(err.stage(), Some(PipelineStage::Retrieved));

        let err = pipeline.resolve("   ", "en", 3).await.unwrap_err();
        assert_eq!(err.stage(), Some(PipelineStage::Received));

        let err = pipeline
            .translate_results(&["x".to_string()], "xx")
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Some(PipelineStage::TranslatedToTarget));
    }
}
