//! Evaluation corpus synthesis
//!
//! One run turns a raw case corpus into multilingual query/relevance records:
//! 1. Load the JSON Lines corpus
//! 2. Drop documents without text
//! 3. Embed the surviving documents
//! 4. Sample documents with a seeded RNG
//! 5. Synthesize an English query per sampled document
//! 6. Translate all queries, one batch job per target language
//! 7. Retrieve the top-K cases for every English query
//! 8. Assemble the entries
//! 9. Write the three encodings and the archive

use crate::errors::{Result, SynthesisError};
use crate::output::{self, OutputPaths};
use crate::query::{QuerySynthesizer, SummarySource};
use futures::stream::{self, StreamExt};
use lexbridge_common::{
    config::SynthesisConfig,
    corpus::{load_corpus, CaseDocument, CaseId, FilteredCorpus},
    index::{rank_by_cosine, top_k_distinct},
    lang::is_english,
    BatchTranslation, Embedder, Translator,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Query text per language, English first, then target languages in order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultilingualQuerySet {
    entries: Vec<(String, String)>,
}

impl MultilingualQuerySet {
    pub fn new(english: impl Into<String>, source_language: impl Into<String>) -> Self {
        Self {
            entries: vec![(source_language.into(), english.into())],
        }
    }

    /// Add or replace the text for `language`
    pub fn insert(&mut self, language: impl Into<String>, text: impl Into<String>) {
        let language = language.into();
        let text = text.into();
        match self.entries.iter_mut().find(|(tag, _)| *tag == language) {
            Some(entry) => entry.1 = text,
            None => self.entries.push((language, text)),
        }
    }

    pub fn get(&self, language: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(tag, _)| tag == language)
            .map(|(_, text)| text.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(tag, text)| (tag.as_str(), text.as_str()))
    }
}

impl Serialize for MultilingualQuerySet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (tag, text) in &self.entries {
            map.serialize_entry(tag, text)?;
        }
        map.end()
    }
}

/// One judged case
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RelevantCase {
    pub case_id: CaseId,
    pub text: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct EvaluationEntry {
    pub queries: MultilingualQuerySet,
    /// Best first; rank is position + 1
    pub relevant_cases: Vec<RelevantCase>,
}

/// Translation outcome counts for one target language
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct LanguageOutcome {
    pub language: String,
    pub batched: usize,
    pub recovered: usize,
    pub failed: usize,
}

impl From<&BatchTranslation> for LanguageOutcome {
    fn from(batch: &BatchTranslation) -> Self {
        let recovered = batch.recovered_count();
        let failed = batch.failed_count();
        Self {
            language: batch.target.clone(),
            batched: batch.len() - recovered - failed,
            recovered,
            failed,
        }
    }
}

/// Summary of one synthesis run
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SynthesisReport {
    pub loaded: usize,
    pub surviving: usize,
    pub entries: usize,
    pub summary_fallbacks: usize,
    pub languages: Vec<LanguageOutcome>,
}

/// Draw `min(requested, available)` distinct positions in sampling order
pub fn sample_positions<R: Rng + ?Sized>(available: usize, requested: usize, rng: &mut R) -> Vec<usize> {
    let amount = requested.min(available);
    rand::seq::index::sample(rng, available, amount).into_vec()
}

/// Offline builder of the evaluation corpus
pub struct CorpusSynthesizer {
    embedder: Arc<dyn Embedder>,
    translator: Arc<Translator>,
    queries: QuerySynthesizer,
    config: SynthesisConfig,
}

impl CorpusSynthesizer {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        translator: Arc<Translator>,
        queries: QuerySynthesizer,
        config: SynthesisConfig,
    ) -> Result<Self> {
        if config.top_k == 0 {
            return Err(SynthesisError::Settings("top_k must be at least 1".to_string()));
        }
        Ok(Self {
            embedder,
            translator,
            queries,
            config,
        })
    }

    /// Load the configured corpus, build the entries and write every output
    #[instrument(skip(self), fields(corpus = %self.config.corpus_path.display()))]
    pub async fn run(&self) -> Result<SynthesisReport> {
        let documents = load_corpus(&self.config.corpus_path)?;
        let (entries, report) = self.build(&documents).await?;

        let paths = OutputPaths::from_config(&self.config);
        output::write_all(&entries, &paths, self.config.wide_text_chars)?;
        info!(archive = %paths.archive.display(), "Outputs written");

        Ok(report)
    }

    /// Build the evaluation entries for an already loaded corpus
    pub async fn build(
        &self,
        documents: &[CaseDocument],
    ) -> Result<(Vec<EvaluationEntry>, SynthesisReport)> {
        let corpus = FilteredCorpus::new(documents);
        let mut report = SynthesisReport {
            loaded: documents.len(),
            surviving: corpus.len(),
            ..Default::default()
        };
        info!(loaded = report.loaded, surviving = report.surviving, "Corpus filtered");

        if corpus.is_empty() {
            warn!("No document has text; nothing to synthesize");
            return Ok((Vec::new(), report));
        }

        let matrix = self.embed_corpus(corpus.texts()).await?;

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let sampled = sample_positions(corpus.len(), self.config.num_queries, &mut rng);

        let mut english = Vec::with_capacity(sampled.len());
        for &position in &sampled {
            let query = self
                .queries
                .synthesize(&documents[corpus.origin(position)].text, &mut rng)
                .await;
            if query.summary_source == SummarySource::Fallback {
                report.summary_fallbacks += 1;
            }
            english.push(query.text);
        }
        info!(
            queries = english.len(),
            fallbacks = report.summary_fallbacks,
            "English queries synthesized"
        );

        let translations = self.translate_all(&english).await;
        report.languages = translations.iter().map(LanguageOutcome::from).collect();

        let mut entries = Vec::with_capacity(english.len());
        for (qi, query) in english.iter().enumerate() {
            let mut queries = MultilingualQuerySet::new(query.as_str(), self.config.source_language.as_str());
            for batch in &translations {
                let text = batch.items.get(qi).map(|item| item.text()).unwrap_or_default();
                queries.insert(batch.target.as_str(), text);
            }

            let relevant_cases = self.retrieve(query, &matrix, &corpus, documents).await?;
            entries.push(EvaluationEntry {
                queries,
                relevant_cases,
            });
        }

        report.entries = entries.len();
        info!(entries = report.entries, "Evaluation entries assembled");
        Ok((entries, report))
    }

    async fn embed_corpus(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut matrix = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.config.embed_batch_size.max(1)) {
            matrix.extend(self.embedder.embed_batch(batch).await?);
        }
        info!(rows = matrix.len(), model = self.embedder.model_name(), "Corpus embedded");
        Ok(matrix)
    }

    /// One fault-tolerant batch job per target language, in configured order
    async fn translate_all(&self, english: &[String]) -> Vec<BatchTranslation> {
        let source = self.config.source_language.as_str();
        let targets: Vec<&str> = self
            .config
            .target_languages
            .iter()
            .map(String::as_str)
            .filter(|tag| {
                let keep = !is_english(tag) && *tag != source;
                if !keep {
                    warn!(language = tag, "Skipping target equal to the source language");
                }
                keep
            })
            .collect();

        stream::iter(targets)
            .map(|target| async move {
                let batch = self.translator.translate_batch(english, source, target).await;
                info!(
                    language = target,
                    recovered = batch.recovered_count(),
                    failed = batch.failed_count(),
                    "Language translated"
                );
                batch
            })
            .buffered(self.config.translation_concurrency.max(1))
            .collect()
            .await
    }

    /// Top-K distinct cases for one English query
    async fn retrieve(
        &self,
        query: &str,
        matrix: &[Vec<f32>],
        corpus: &FilteredCorpus,
        documents: &[CaseDocument],
    ) -> Result<Vec<RelevantCase>> {
        let vector = self.embedder.embed(query).await?;
        let ranked = rank_by_cosine(&vector, matrix)?;

        let distinct = top_k_distinct(ranked, self.config.top_k, |row| {
            &documents[corpus.origin(row)].case_id
        });

        let relevant = distinct
            .into_iter()
            .map(|(row, _score)| {
                let document = &documents[corpus.origin(row)];
                RelevantCase {
                    case_id: document.case_id.clone(),
                    text: document.text.clone(),
                }
            })
            .collect();
        Ok(relevant)
    }
}
