//! Lexbridge Synthesis
//!
//! Builds a multilingual evaluation corpus from a raw case corpus:
//! 1. Samples case documents with a fixed seed
//! 2. Synthesizes an English query for each
//! 3. Translates every query into the target languages
//! 4. Judges relevance by cosine similarity in the embedding space
//! 5. Writes JSON, long CSV, wide CSV and a zip archive

mod errors;
mod output;
mod processor;
mod query;

use anyhow::Context;
use clap::Parser;
use lexbridge_common::{
    config::AppConfig,
    embeddings::create_embedder,
    summarization::create_summarizer,
    telemetry,
    translation::create_translation_backend,
    Translator, VERSION,
};
use processor::CorpusSynthesizer;
use query::QuerySynthesizer;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "synthesize", version, about = "Build a multilingual legal retrieval evaluation corpus")]
struct Cli {
    /// Configuration file (TOML); defaults to config/ and APP__ variables
    #[arg(short, long)]
    config: Option<String>,

    /// Raw case corpus (JSON Lines)
    #[arg(long)]
    corpus: Option<PathBuf>,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Number of queries to synthesize
    #[arg(short = 'n', long)]
    num_queries: Option<usize>,

    /// Relevant cases per query
    #[arg(short = 'k', long)]
    top_k: Option<usize>,

    /// Random seed
    #[arg(long)]
    seed: Option<u64>,
}

impl Cli {
    fn apply(self, config: &mut AppConfig) {
        let synthesis = &mut config.synthesis;
        if let Some(corpus) = self.corpus {
            synthesis.corpus_path = corpus;
        }
        if let Some(output_dir) = self.output_dir {
            synthesis.output_dir = output_dir;
        }
        if let Some(n) = self.num_queries {
            synthesis.num_queries = n;
        }
        if let Some(k) = self.top_k {
            synthesis.top_k = k;
        }
        if let Some(seed) = self.seed {
            synthesis.seed = seed;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::load(),
    }
    .context("Failed to load configuration")?;
    cli.apply(&mut config);

    telemetry::init_tracing(&config.observability);
    info!("Starting Lexbridge Synthesis v{}", VERSION);

    let embedder = create_embedder(&config.embedding)?;
    info!(
        model = %embedder.model_name(),
        dimension = embedder.dimension(),
        "Embedder initialized"
    );

    let summarizer = create_summarizer(&config.summarization)?;
    let backend = create_translation_backend(&config.translation)?;
    let translator = Translator::new(backend, &config.translation);
    info!(
        summarizer = summarizer.model_name(),
        translator = translator.backend_name(),
        languages = config.synthesis.target_languages.len(),
        "Models initialized"
    );

    let queries = QuerySynthesizer::new(summarizer, &config.summarization, &config.synthesis)?;
    let synthesizer = CorpusSynthesizer::new(
        embedder,
        Arc::new(translator),
        queries,
        config.synthesis.clone(),
    )?;

    let report = synthesizer.run().await?;

    for language in &report.languages {
        info!(
            language = %language.language,
            batched = language.batched,
            recovered = language.recovered,
            failed = language.failed,
            "Translation outcome"
        );
    }
    info!(
        loaded = report.loaded,
        surviving = report.surviving,
        entries = report.entries,
        summary_fallbacks = report.summary_fallbacks,
        output_dir = %config.synthesis.output_dir.display(),
        "Synthesis complete"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::parse_from(["synthesize", "--corpus", "cases.jsonl", "-n", "5", "-k", "2", "--seed", "7"]);
        let mut config = AppConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.synthesis.corpus_path, PathBuf::from("cases.jsonl"));
        assert_eq!(config.synthesis.num_queries, 5);
        assert_eq!(config.synthesis.top_k, 2);
        assert_eq!(config.synthesis.seed, 7);
        assert_eq!(config.synthesis.output_dir, PathBuf::from("output"));
    }
}
