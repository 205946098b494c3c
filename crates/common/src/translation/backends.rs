//! Translation backends

use super::TranslationBackend;
use crate::config::{GenerationParams, Quantization, TranslationConfig};
use crate::errors::{AppError, Result};
use crate::http::{HttpFailure, JsonClient};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Client for an IndicTrans2 inference server
///
/// `POST {endpoint}/translate` with the texts, both tags and the decoding
/// parameters; the server answers `{"translations": [...]}`. A 422 answer
/// means the server does not know one of the tags.
pub struct IndicTransBackend {
    http: JsonClient,
    endpoint: String,
    api_key: Option<String>,
    quantization: Quantization,
}

#[derive(Serialize)]
struct IndicTransRequest<'a> {
    inputs: &'a [String],
    src_lang: &'a str,
    tgt_lang: &'a str,
    max_input_length: usize,
    max_length: usize,
    num_beams: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    no_repeat_ngram_size: Option<u32>,
    quantization: Quantization,
}

#[derive(Deserialize)]
struct IndicTransResponse {
    translations: Vec<String>,
}

impl IndicTransBackend {
    pub fn new(config: &TranslationConfig) -> Result<Self> {
        Ok(Self {
            http: JsonClient::new(Duration::from_secs(config.timeout_secs), config.max_retries)?,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            quantization: config.quantization,
        })
    }
}

#[async_trait]
impl TranslationBackend for IndicTransBackend {
    async fn translate(
        &self,
        texts: &[String],
        source: &str,
        target: &str,
        params: &GenerationParams,
    ) -> Result<Vec<String>> {
        let url = format!("{}/translate", self.endpoint);
        let request = IndicTransRequest {
            inputs: texts,
            src_lang: source,
            tgt_lang: target,
            max_input_length: params.max_input_tokens,
            max_length: params.max_output_tokens,
            num_beams: params.num_beams,
            no_repeat_ngram_size: params.no_repeat_ngram_size,
            quantization: self.quantization,
        };

        let response = self
            .http
            .send::<IndicTransResponse, _>(|client| {
                let builder = client.post(&url).json(&request);
                match &self.api_key {
                    Some(key) => builder.bearer_auth(key),
                    None => builder,
                }
            })
            .await
            .map_err(|failure| map_failure(failure, source, target))?;

        Ok(response.translations)
    }

    fn name(&self) -> &str {
        "indictrans"
    }
}

/// Client for the public MyMemory translation API, one request per text
pub struct MyMemoryBackend {
    http: JsonClient,
    endpoint: String,
    api_key: Option<String>,
}

impl MyMemoryBackend {
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.mymemory.translated.net";

    pub fn new(config: &TranslationConfig) -> Result<Self> {
        Ok(Self {
            http: JsonClient::new(Duration::from_secs(config.timeout_secs), config.max_retries)?,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    async fn translate_text(&self, text: &str, source: &str, target: &str) -> Result<String> {
        let url = format!("{}/get", self.endpoint);
        let langpair = format!("{}|{}", source, target);

        let body: Value = self
            .http
            .send(|client| {
                let mut query = vec![("q", text), ("langpair", langpair.as_str())];
                if let Some(key) = &self.api_key {
                    query.push(("key", key.as_str()));
                }
                client.get(&url).query(&query)
            })
            .await
            .map_err(|failure| map_failure(failure, source, target))?;

        // responseStatus is sometimes a number, sometimes a string
        let status = match &body["responseStatus"] {
            Value::Number(n) => n.as_u64().unwrap_or(0),
            Value::String(s) => s.parse().unwrap_or(0),
            _ => 0,
        };
        let details = body["responseDetails"].as_str().unwrap_or_default();

        if status != 200 {
            let upper = details.to_uppercase();
            if upper.contains("INVALID") && upper.contains("LANGUAGE") {
                return Err(AppError::UnsupportedLanguage {
                    tag: blamed_tag(details, source, target),
                });
            }
            return Err(AppError::Translation {
                message: format!("MyMemory status {}: {}", status, details),
            });
        }

        body["responseData"]["translatedText"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AppError::Translation {
                message: "Missing translatedText".to_string(),
            })
    }
}

#[async_trait]
impl TranslationBackend for MyMemoryBackend {
    async fn translate(
        &self,
        texts: &[String],
        source: &str,
        target: &str,
        _params: &GenerationParams,
    ) -> Result<Vec<String>> {
        let mut translated = Vec::with_capacity(texts.len());
        for text in texts {
            translated.push(self.translate_text(text, source, target).await?);
        }
        Ok(translated)
    }

    fn name(&self) -> &str {
        "mymemory"
    }
}

/// Deterministic backend for tests and dry runs: `"[{target}] {text}"`
#[derive(Debug, Default)]
pub struct MockTranslationBackend;

#[async_trait]
impl TranslationBackend for MockTranslationBackend {
    async fn translate(
        &self,
        texts: &[String],
        _source: &str,
        target: &str,
        _params: &GenerationParams,
    ) -> Result<Vec<String>> {
        Ok(texts.iter().map(|t| format!("[{}] {}", target, t)).collect())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

fn map_failure(failure: HttpFailure, source: &str, target: &str) -> AppError {
    match failure.status {
        Some(StatusCode::UNPROCESSABLE_ENTITY) => AppError::UnsupportedLanguage {
            tag: blamed_tag(&failure.message, source, target),
        },
        _ => AppError::Translation {
            message: failure.to_string(),
        },
    }
}

/// Which of the two tags an error message is about; the target unless only
/// the source is named
fn blamed_tag(message: &str, source: &str, target: &str) -> String {
    let lower = message.to_lowercase();
    if lower.contains(&source.to_lowercase()) && !lower.contains(&target.to_lowercase()) {
        source.to_string()
    } else {
        target.to_string()
    }
}

/// Create a translation backend based on configuration
pub fn create_translation_backend(config: &TranslationConfig) -> Result<Arc<dyn TranslationBackend>> {
    match config.provider.as_str() {
        "indictrans" => Ok(Arc::new(IndicTransBackend::new(config)?)),
        "mymemory" => {
            let mut config = config.clone();
            if config.endpoint.is_empty() || config.endpoint == TranslationConfig::default().endpoint {
                config.endpoint = MyMemoryBackend::DEFAULT_ENDPOINT.to_string();
            }
            Ok(Arc::new(MyMemoryBackend::new(&config)?))
        }
        "mock" => Ok(Arc::new(MockTranslationBackend)),
        other => Err(AppError::Configuration {
            message: format!("Unknown translation provider: {}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> TranslationConfig {
        TranslationConfig {
            endpoint: server.uri(),
            max_retries: 0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_indictrans_sends_generation_params() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/translate"))
            .and(body_partial_json(json!({
                "src_lang": "en",
                "tgt_lang": "hi",
                "max_input_length": 512,
                "max_length": 128,
                "num_beams": 4,
                "no_repeat_ngram_size": 2,
                "quantization": "int8"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "translations": ["अनुबंध", "क्षति"]
            })))
            .mount(&server)
            .await;

        let config = config_for(&server);
        let backend = IndicTransBackend::new(&config).unwrap();
        let texts = vec!["contract".to_string(), "damages".to_string()];
        let out = backend.translate(&texts, "en", "hi", &config.batch).await.unwrap();
        assert_eq!(out, vec!["अनुबंध", "क्षति"]);
    }

    #[tokio::test]
    async fn test_indictrans_unsupported_language() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/translate"))
            .respond_with(
                ResponseTemplate::new(422).set_body_string("unknown language tag: xx"),
            )
            .mount(&server)
            .await;

        let config = config_for(&server);
        let backend = IndicTransBackend::new(&config).unwrap();
        let err = backend
            .translate(&["hello".to_string()], "en", "xx", &config.item)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnsupportedLanguage { tag } if tag == "xx"));
    }

    #[tokio::test]
    async fn test_mymemory_translates_each_item() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/get"))
            .and(query_param("langpair", "hi|en"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "responseData": {"translatedText": "bail plea"},
                "responseStatus": 200
            })))
            .expect(2)
            .mount(&server)
            .await;

        let config = config_for(&server);
        let backend = MyMemoryBackend::new(&config).unwrap();
        let texts = vec!["जमानत".to_string(), "याचिका".to_string()];
        let out = backend.translate(&texts, "hi", "en", &config.item).await.unwrap();
        assert_eq!(out.len(), 2);
    }

    #[tokio::test]
    async fn test_mymemory_invalid_language() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/get"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "responseData": {"translatedText": "'ZZ' IS AN INVALID TARGET LANGUAGE"},
                "responseDetails": "'ZZ' IS AN INVALID TARGET LANGUAGE",
                "responseStatus": "403"
            })))
            .mount(&server)
            .await;

        let config = config_for(&server);
        let backend = MyMemoryBackend::new(&config).unwrap();
        let err = backend
            .translate(&["x".to_string()], "en", "zz", &config.item)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnsupportedLanguage { tag } if tag == "zz"));
    }

    #[tokio::test]
    async fn test_mock_backend_tags_output() {
        let out = MockTranslationBackend
            .translate(&["x".to_string()], "en", "ta", &TranslationConfig::default().batch)
            .await
            .unwrap();
        assert_eq!(out, vec!["[ta] x"]);
    }

    #[test]
    fn test_blamed_tag() {
        assert_eq!(blamed_tag("bad source tag qq", "qq", "hi"), "qq");
        assert_eq!(blamed_tag("unsupported pair qq-zz", "qq", "zz"), "zz");
        assert_eq!(blamed_tag("unsupported", "en", "zz"), "zz");
    }
}
