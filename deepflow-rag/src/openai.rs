//! OpenAI-compatible embedding provider.
//!
//! This module is only available when the `openai` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::EmbeddingSettings;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// The default OpenAI API base URL.
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Dimensionality assumed for models missing from [`dimensions_for_model`].
const FALLBACK_DIMENSIONS: usize = 1536;

/// Native output dimensions of known OpenAI embedding models.
pub fn dimensions_for_model(model: &str) -> Option<usize> {
    match model {
        "text-embedding-3-large" => Some(3072),
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        _ => None,
    }
}

/// An [`EmbeddingProvider`] backed by an OpenAI-compatible `/embeddings` endpoint.
///
/// # Configuration
///
/// - `model` – defaults to `text-embedding-3-large`.
/// - `base_url` – defaults to `https://api.openai.com/v1`; any compatible
///   gateway works.
/// - `api_key` – from the settings, falling back to `OPENAI_API_KEY`.
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
    dimensions: usize,
}

impl OpenAIEmbeddingProvider {
    /// Create a new provider with the given API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::EmbeddingError {
                provider: "OpenAI".into(),
                message: "API key must not be empty".into(),
            });
        }
        let model = model.into();
        let dimensions = dimensions_for_model(&model).unwrap_or(FALLBACK_DIMENSIONS);

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            endpoint: embeddings_endpoint(OPENAI_BASE_URL),
            dimensions,
        })
    }

    /// Create a provider from resolved [`EmbeddingSettings`].
    pub fn from_settings(settings: &EmbeddingSettings) -> Result<Self> {
        let api_key = match &settings.api_key {
            Some(key) => key.clone(),
            None => std::env::var("OPENAI_API_KEY").map_err(|_| RagError::EmbeddingError {
                provider: "OpenAI".into(),
                message: "no API key configured and OPENAI_API_KEY not set".into(),
            })?,
        };
        let provider = Self::new(api_key, settings.model.clone())?;
        Ok(match &settings.base_url {
            Some(base_url) => provider.with_base_url(base_url),
            None => provider,
        })
    }

    /// Point the provider at a different OpenAI-compatible base URL.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.endpoint = embeddings_endpoint(base_url);
        self
    }

    /// Override the reported dimensionality for models not in the built-in table.
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self
    }

    /// The resolved `/embeddings` endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn embeddings_endpoint(base_url: &str) -> String {
    format!("{}/embeddings", base_url.trim_end_matches('/'))
}

// ── OpenAI API request/response types ──────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

// ── EmbeddingProvider implementation ───────────────────────────────

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = "OpenAI", text_len = text.len(), "embedding query text");

        let results = self.embed_batch(&[text]).await?;
        results.into_iter().next().ok_or_else(|| RagError::EmbeddingError {
            provider: "OpenAI".into(),
            message: "API returned empty response".into(),
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request_body = EmbeddingRequest { model: &self.model, input: texts.to_vec() };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = "OpenAI", error = %e, "request failed");
                RagError::EmbeddingError {
                    provider: "OpenAI".into(),
                    message: format!("request failed: {e}"),
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);

            error!(provider = "OpenAI", %status, "API error");
            return Err(RagError::EmbeddingError {
                provider: "OpenAI".into(),
                message: format!("API returned {status}: {detail}"),
            });
        }

        let embedding_response: EmbeddingResponse = response.json().await.map_err(|e| {
            error!(provider = "OpenAI", error = %e, "failed to parse response");
            RagError::EmbeddingError {
                provider: "OpenAI".into(),
                message: format!("failed to parse response: {e}"),
            }
        })?;

        Ok(embedding_response.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_api_key() {
        assert!(OpenAIEmbeddingProvider::new("", "text-embedding-3-small").is_err());
    }

    #[test]
    fn known_models_report_native_dimensions() {
        let large = OpenAIEmbeddingProvider::new("sk-test", "text-embedding-3-large").unwrap();
        assert_eq!(large.dimensions(), 3072);
        let custom = OpenAIEmbeddingProvider::new("sk-test", "in-house-embedder").unwrap();
        assert_eq!(custom.dimensions(), FALLBACK_DIMENSIONS);
        assert_eq!(custom.with_dimensions(768).dimensions(), 768);
    }

    #[test]
    fn base_url_is_normalized() {
        let settings = EmbeddingSettings {
            api_key: Some("sk-test".into()),
            base_url: Some("http://localhost:8080/v1/".into()),
            ..Default::default()
        };
        let provider = OpenAIEmbeddingProvider::from_settings(&settings).unwrap();
        assert_eq!(provider.endpoint(), "http://localhost:8080/v1/embeddings");

        let default = OpenAIEmbeddingProvider::new("sk-test", "text-embedding-3-small").unwrap();
        assert_eq!(default.endpoint(), "https://api.openai.com/v1/embeddings");
    }
}
