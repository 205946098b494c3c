//! Lexbridge Search Service
//!
//! Cross-lingual legal case retrieval over HTTP:
//! - Query translation into English when needed
//! - Embedding and top-K retrieval from the case index
//! - Result titles translated back into the caller's language

mod handlers;
mod pipeline;

use anyhow::Context;
use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use lexbridge_common::{
    config::AppConfig,
    embeddings::create_embedder,
    index::create_index,
    metrics::{self, INFERENCE_BUCKETS, LATENCY_BUCKETS, METRICS_PREFIX},
    telemetry,
    translation::create_translation_backend,
    Translator, VERSION,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use pipeline::LegalPipeline;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pipeline: Arc<LegalPipeline>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;
    let config = Arc::new(config);

    telemetry::init_tracing(&config.observability);
    info!("Starting Lexbridge Search Service v{}", VERSION);

    // Initialize metrics
    if config.observability.metrics_port != 0 {
        let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .set_buckets_for_metric(
                Matcher::Full(format!("{}_query_duration_seconds", METRICS_PREFIX)),
                LATENCY_BUCKETS,
            )?
            .set_buckets_for_metric(
                Matcher::Full(format!("{}_retrieval_duration_seconds", METRICS_PREFIX)),
                LATENCY_BUCKETS,
            )?
            .set_buckets_for_metric(
                Matcher::Full(format!("{}_embedding_duration_seconds", METRICS_PREFIX)),
                INFERENCE_BUCKETS,
            )?
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!("Metrics exporter listening on {}", metrics_addr);
    }
    metrics::register_metrics();

    // Model and index clients
    let embedder = create_embedder(&config.embedding)?;
    info!(model = embedder.model_name(), "Embedder ready");

    let index = create_index(&config.index, embedder.as_ref(), config.embedding.batch_size).await?;
    info!(provider = %config.index.provider, index = index.name(), "Vector index ready");

    let backend = create_translation_backend(&config.translation)?;
    let translator = Translator::new(backend, &config.translation);
    info!(backend = translator.backend_name(), "Translator ready");

    let state = AppState {
        config: config.clone(),
        pipeline: Arc::new(LegalPipeline::new(embedder, index, Arc::new(translator))),
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Create the main application router
pub(crate) fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let timeout = request_timeout_layer(state.config.request_timeout());

    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/query", post(handlers::query::query))
        .layer(TraceLayer::new_for_http())
        .layer(timeout)
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Requests running longer than `timeout` answer 408
fn request_timeout_layer(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
