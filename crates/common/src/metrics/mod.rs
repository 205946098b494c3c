//! Metrics and observability utilities
//!
//! Prometheus-style metrics with standardized naming conventions. Without an
//! installed recorder (e.g. in the offline synthesizer) every call is a no-op.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

/// Metrics prefix for all Lexbridge metrics
pub const METRICS_PREFIX: &str = "lexbridge";

/// Buckets for query latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.010, // 10ms
    0.025, // 25ms
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
    10.00, // 10s
];

/// Buckets for model inference latency (typically slower)
pub const INFERENCE_BUCKETS: &[f64] = &[
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.000, // 2s
    5.000, // 5s
    10.00, // 10s
    30.00, // 30s
    60.00, // 1m
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Query metrics
    describe_counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total online case queries by outcome"
    );

    describe_histogram!(
        format!("{}_query_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Online case query latency in seconds"
    );

    // Retrieval metrics
    describe_histogram!(
        format!("{}_retrieval_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Vector index query latency in seconds"
    );

    describe_gauge!(
        format!("{}_retrieval_results_count", METRICS_PREFIX),
        Unit::Count,
        "Number of cases returned by the last retrieval"
    );

    // Embedding metrics
    describe_counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding requests"
    );

    describe_histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embedding generation latency in seconds"
    );

    describe_counter!(
        format!("{}_embedding_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding errors"
    );

    // Translation metrics
    describe_counter!(
        format!("{}_translation_batches_total", METRICS_PREFIX),
        Unit::Count,
        "Total batched translation calls by outcome"
    );

    describe_counter!(
        format!("{}_translation_failed_items_total", METRICS_PREFIX),
        Unit::Count,
        "Items left empty after the per-item fallback failed"
    );

    // Summarization metrics
    describe_counter!(
        format!("{}_summaries_total", METRICS_PREFIX),
        Unit::Count,
        "Total summaries by source (model or fallback)"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record online query metrics
pub fn record_query(duration_secs: f64, language: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        "language" => language.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_query_duration_seconds", METRICS_PREFIX),
        "language" => language.to_string()
    )
    .record(duration_secs);
}

/// Helper to record retrieval metrics
pub fn record_retrieval(duration_secs: f64, index: &str, result_count: usize) {
    histogram!(
        format!("{}_retrieval_duration_seconds", METRICS_PREFIX),
        "index" => index.to_string()
    )
    .record(duration_secs);

    gauge!(
        format!("{}_retrieval_results_count", METRICS_PREFIX),
        "index" => index.to_string()
    )
    .set(result_count as f64);
}

/// Helper to record embedding metrics
pub fn record_embedding(duration_secs: f64, model: &str, batch_size: usize, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_embedding_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration_secs);
    } else {
        counter!(
            format!("{}_embedding_errors_total", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .increment(batch_size as u64);
    }
}

/// Helper to record one batched translation call and its fallback result
pub fn record_translation_batch(target: &str, fell_back: bool, failed_items: usize) {
    let outcome = if fell_back { "fallback" } else { "batched" };

    counter!(
        format!("{}_translation_batches_total", METRICS_PREFIX),
        "target" => target.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    if failed_items > 0 {
        counter!(
            format!("{}_translation_failed_items_total", METRICS_PREFIX),
            "target" => target.to_string()
        )
        .increment(failed_items as u64);
    }
}

/// Helper to record where a synthesized query's summary came from
pub fn record_summary(model: &str, fallback: bool) {
    let source = if fallback { "fallback" } else { "model" };

    counter!(
        format!("{}_summaries_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "source" => source.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_sorted() {
        for buckets in [LATENCY_BUCKETS, INFERENCE_BUCKETS] {
            let mut prev = 0.0;
            for &bucket in buckets {
                assert!(bucket > prev);
                prev = bucket;
            }
        }
    }

    #[test]
    fn test_recording_without_recorder() {
        // No recorder installed: every helper must be a silent no-op
        record_query(0.01, "hi", true);
        record_retrieval(0.01, "memory", 3);
        record_translation_batch("hi", true, 1);
        record_summary("lead", false);
    }
}
