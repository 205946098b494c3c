//! Error types for Lexbridge services
//!
//! Provides:
//! - Distinct error types for each model/index collaborator
//! - Pipeline stage attribution for online failures
//! - HTTP status code mapping
//! - Structured error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    InvalidFormat,

    // Language errors (2xxx)
    UnsupportedLanguage,

    // Model errors (8xxx)
    UpstreamError,
    EncodingError,
    TranslationError,
    TranslationTimeout,
    SummarizationError,
    RetrievalError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::InvalidFormat => 1003,

            ErrorCode::UnsupportedLanguage => 2001,

            ErrorCode::UpstreamError => 8001,
            ErrorCode::EncodingError => 8002,
            ErrorCode::TranslationError => 8003,
            ErrorCode::TranslationTimeout => 8004,
            ErrorCode::SummarizationError => 8005,
            ErrorCode::RetrievalError => 8006,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Stages of the online query path, used to attribute failures
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Received,
    TranslatedToEn,
    Embedded,
    Retrieved,
    TranslatedToTarget,
    Returned,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Received => "RECEIVED",
            PipelineStage::TranslatedToEn => "TRANSLATED_TO_EN",
            PipelineStage::Embedded => "EMBEDDED",
            PipelineStage::Retrieved => "RETRIEVED",
            PipelineStage::TranslatedToTarget => "TRANSLATED_TO_TARGET",
            PipelineStage::Returned => "RETURNED",
        };
        f.write_str(name)
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    // Model and index errors
    #[error("Embedding failed: {message}")]
    Encoding { message: String },

    #[error("Batch translation to {target} failed: {message}")]
    TranslationBatch { target: String, message: String },

    #[error("Translation of item {index} to {target} failed: {message}")]
    TranslationItem {
        target: String,
        index: usize,
        message: String,
    },

    #[error("Translation failed: {message}")]
    Translation { message: String },

    #[error("Translation timed out after {timeout_ms}ms")]
    TranslationTimeout { timeout_ms: u64 },

    #[error("Unsupported language: {tag}")]
    UnsupportedLanguage { tag: String },

    #[error("Summarization failed: {message}")]
    Summarization { message: String },

    #[error("Retrieval failed: {message}")]
    Retrieval { message: String },

    #[error("Pipeline failed at {stage}: {source}")]
    Stage {
        stage: PipelineStage,
        #[source]
        source: Box<AppError>,
    },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Attribute this error to a pipeline stage
    pub fn at_stage(self, stage: PipelineStage) -> Self {
        match self {
            // Keep the innermost attribution
            err @ AppError::Stage { .. } => err,
            err => AppError::Stage {
                stage,
                source: Box::new(err),
            },
        }
    }

    /// The stage this error was attributed to, if any
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            AppError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            AppError::Encoding { .. } => ErrorCode::EncodingError,
            AppError::TranslationBatch { .. }
            | AppError::TranslationItem { .. }
            | AppError::Translation { .. } => ErrorCode::TranslationError,
            AppError::TranslationTimeout { .. } => ErrorCode::TranslationTimeout,
            AppError::UnsupportedLanguage { .. } => ErrorCode::UnsupportedLanguage,
            AppError::Summarization { .. } => ErrorCode::SummarizationError,
            AppError::Retrieval { .. } => ErrorCode::RetrievalError,
            AppError::Stage { source, .. } => source.code(),
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. }
            | AppError::InvalidFormat { .. }
            | AppError::Encoding { .. }
            | AppError::UnsupportedLanguage { .. } => StatusCode::BAD_REQUEST,

            // 500 Internal Server Error
            AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::TranslationBatch { .. }
            | AppError::TranslationItem { .. }
            | AppError::Translation { .. }
            | AppError::Summarization { .. }
            | AppError::Retrieval { .. }
            | AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,

            // 504 Gateway Timeout
            AppError::TranslationTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,

            AppError::Stage { source, .. } => source.status_code(),
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();
        let stage = self.stage();

        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                stage = ?stage,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                stage = ?stage,
                status = status.as_u16(),
                "Client error"
            );
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                details: stage.map(|s| serde_json::json!({ "stage": s })),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}
