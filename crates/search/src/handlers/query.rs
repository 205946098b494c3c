//! Case query handler

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use validator::Validate;

use crate::AppState;
use lexbridge_common::{
    errors::{AppError, Result},
    lang::is_english,
    metrics, ScoredMatch,
};

/// Metadata fields that may name a match, in order of preference
const TITLE_FIELDS: [&str; 6] = ["title", "case_title", "translated", "query", "data", "text"];

/// Query request
#[derive(Debug, Deserialize, Validate)]
pub struct QueryRequest {
    #[validate(length(min = 1, max = 4000))]
    pub query: String,

    /// Language tag of `query`
    #[serde(default = "default_language")]
    pub language: String,

    /// Number of cases to return (server default when absent)
    #[serde(default, alias = "topK")]
    #[validate(range(min = 1, max = 100))]
    pub top_k: Option<usize>,
}

fn default_language() -> String {
    "en".to_string()
}

/// Query response
#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub translated_query: String,
    pub matches: Vec<ScoredMatch>,
    pub english_summary: String,
    pub native_summary: String,
    pub source_language: String,
}

/// Display title of a match
pub fn match_title(metadata: &Value) -> String {
    TITLE_FIELDS
        .iter()
        .filter_map(|field| metadata.get(*field).and_then(Value::as_str))
        .map(str::trim)
        .find(|title| !title.is_empty())
        .unwrap_or("Result")
        .to_string()
}

/// Numbered list of match titles
fn numbered_titles(matches: &[ScoredMatch]) -> Vec<String> {
    matches
        .iter()
        .enumerate()
        .map(|(i, m)| format!("{}. {}", i + 1, match_title(&m.metadata)))
        .collect()
}

/// Answer a case query in the caller's language
pub async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    let start = Instant::now();

    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let top_k = request.top_k.unwrap_or(state.config.server.default_top_k);
    let result = answer(&state, &request, top_k).await;

    metrics::record_query(
        start.elapsed().as_secs_f64(),
        &request.language,
        result.is_ok(),
    );

    let response = result?;
    tracing::info!(
        language = %request.language,
        top_k,
        results = response.matches.len(),
        latency_ms = start.elapsed().as_millis() as u64,
        "Query completed"
    );

    Ok(Json(response))
}

async fn answer(state: &AppState, request: &QueryRequest, top_k: usize) -> Result<QueryResponse> {
    let resolved = state
        .pipeline
        .resolve(&request.query, &request.language, top_k)
        .await?;

    let titles = numbered_titles(&resolved.matches);
    let english_summary = if titles.is_empty() {
        "No results found.".to_string()
    } else {
        titles.join("\n")
    };

    let native_summary = if is_english(&request.language) || titles.is_empty() {
        String::new()
    } else {
        state
            .pipeline
            .translate_results(&titles, &request.language)
            .await?
            .join("\n")
    };

    Ok(QueryResponse {
        translated_query: resolved.english_query,
        matches: resolved.matches,
        english_summary,
        native_summary,
        source_language: request.language.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_router, pipeline::LegalPipeline};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use lexbridge_common::{
        config::AppConfig,
        corpus::CaseDocument,
        embeddings::HashEmbedder,
        index::InMemoryIndex,
        translation::MockTranslationBackend,
        Translator,
    };
    use serde_json::json;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn test_state() -> AppState {
        let config = AppConfig::default();
        let embedder = Arc::new(HashEmbedder::new(256));
        let documents = vec![
            CaseDocument::new("101", "landlord sought eviction of tenant for arrears of rent"),
            CaseDocument::new("102", "tenant challenged eviction order under rent control act"),
        ];
        let index = InMemoryIndex::from_documents("cases", embedder.as_ref(), &documents, 8)
            .await
            .unwrap();
        let translator = Translator::new(Arc::new(MockTranslationBackend), &config.translation);
        AppState {
            config: Arc::new(config),
            pipeline: Arc::new(LegalPipeline::new(embedder, Arc::new(index), Arc::new(translator))),
        }
    }

    async fn post(body: Value) -> (StatusCode, Value) {
        let app = create_router(test_state().await);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/query")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_title_precedence() {
        assert_eq!(match_title(&json!({"text": "body", "title": "Roe v. State"})), "Roe v. State");
        assert_eq!(match_title(&json!({"title": "  ", "case_title": "X v. Y"})), "X v. Y");
        assert_eq!(match_title(&json!({"data": "raw", "query": "asked"})), "asked");
        assert_eq!(match_title(&json!({"score": 1})), "Result");
        assert_eq!(match_title(&Value::Null), "Result");
    }

    #[tokio::test]
    async fn test_english_query() {
        let (status, body) = post(json!({"query": "eviction of tenant"})).await;
        assert_eq!(status, StatusCode::OK);

        let response: QueryResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.translated_query, "eviction of tenant");
        assert_eq!(response.matches.len(), 2);
        assert!(response.english_summary.starts_with("1. "));
        assert!(response.native_summary.is_empty());
        assert_eq!(response.source_language, "en");
    }

    #[tokio::test]
    async fn test_native_summary_is_translated() {
        let (status, body) = post(json!({"query": "किरायेदार", "language": "hi", "top_k": 1})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["matches"].as_array().map(Vec::len), Some(1));
        assert!(body["native_summary"].as_str().unwrap().starts_with("[hi] 1. "));
        assert_eq!(body["translated_query"], "[en] किरायेदार");
    }

    #[tokio::test]
    async fn test_invalid_requests_are_rejected() {
        let (status, body) = post(json!({"query": ""})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, _) = post(json!({"query": "rent", "top_k": 0})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = post(json!({"query": "rent", "top_k": 101})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
