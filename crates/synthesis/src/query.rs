//! Short English queries from long case documents
//!
//! A query is a summary of the document's opening, lowercased and dropped
//! into one of a fixed set of interrogative templates. When the summarizer
//! fails the leading characters of the document stand in for the summary.

use crate::errors::{Result, SynthesisError};
use lexbridge_common::{
    config::{SummarizationConfig, SynthesisConfig},
    metrics,
    summarization::{SummaryBounds, Summarizer},
};
use rand::seq::SliceRandom;
use rand::Rng;
use regex_lite::Regex;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Interrogative templates; `{}` receives the lowercased summary
pub const QUERY_TEMPLATES: [&str; 6] = [
    "What are some cases discussing {}?",
    "How have courts ruled in matters involving {}?",
    "Find precedents related to {}.",
    "Examples of cases about {}.",
    "Which judgments concern {}?",
    "Show legal cases involving {}.",
];

const TRAILING_PUNCTUATION: [char; 6] = ['.', '!', '?', ',', ';', ':'];

/// Where the topic of a synthesized query came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SummarySource {
    Model,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedQuery {
    pub text: String,
    pub summary_source: SummarySource,
}

pub struct QuerySynthesizer {
    summarizer: Arc<dyn Summarizer>,
    bounds: SummaryBounds,
    snippet_chars: usize,
    fallback_chars: usize,
    whitespace: Regex,
}

impl QuerySynthesizer {
    pub fn new(
        summarizer: Arc<dyn Summarizer>,
        summarization: &SummarizationConfig,
        synthesis: &SynthesisConfig,
    ) -> Result<Self> {
        let whitespace =
            Regex::new(r"\s+").map_err(|e| SynthesisError::Settings(e.to_string()))?;

        Ok(Self {
            summarizer,
            bounds: SummaryBounds::from(summarization),
            snippet_chars: synthesis.snippet_chars,
            fallback_chars: synthesis.fallback_chars,
            whitespace,
        })
    }

    /// Build one query for `document_text`
    ///
    /// Draws exactly one value from `rng`. Never fails.
    pub async fn synthesize<R: Rng + ?Sized>(
        &self,
        document_text: &str,
        rng: &mut R,
    ) -> SynthesizedQuery {
        let template = QUERY_TEMPLATES
            .choose(rng)
            .copied()
            .unwrap_or(QUERY_TEMPLATES[0]);

        let collapsed = self.whitespace.replace_all(document_text.trim(), " ");
        let snippet = truncate_chars(&collapsed, self.snippet_chars);

        let summarized = match self.summarizer.summarize(snippet, self.bounds).await {
            Ok(summary) => Some(clean_summary(&summary)).filter(|s| !s.is_empty()),
            Err(e) => {
                debug!(error = %e, "Summarizer failed, using leading text");
                None
            }
        };

        let (topic, summary_source) = match summarized {
            Some(topic) => (topic, SummarySource::Model),
            None => (
                clean_summary(truncate_chars(snippet, self.fallback_chars)),
                SummarySource::Fallback,
            ),
        };
        metrics::record_summary(
            self.summarizer.model_name(),
            summary_source == SummarySource::Fallback,
        );

        SynthesizedQuery {
            text: template.replacen("{}", &topic, 1),
            summary_source,
        }
    }
}

/// Longest prefix of at most `max_chars` characters
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Trim, drop trailing sentence punctuation and lowercase
fn clean_summary(summary: &str) -> String {
    summary
        .trim()
        .trim_end_matches(TRAILING_PUNCTUATION)
        .trim_end()
        .to_lowercase()
}
