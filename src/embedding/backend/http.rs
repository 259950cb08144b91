//! Embeddings over an OpenAI-compatible `/v1/embeddings` endpoint
//!
//! Movie descriptions and queries are embedded by whatever server the
//! `[embedding]` section points at: OpenAI itself, Azure, or a local
//! server such as LM Studio, vLLM or text-embeddings-inference.

use super::normalize_embedding;
use super::traits::{EmbeddingBackend, EmbeddingError, EmbeddingResult};
use crate::types::Embedding;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Environment variable consulted when no key is configured
const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Connection settings for [`HttpBackend`]
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Full URL of the embeddings route
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    /// Expected vector length; responses of any other length are rejected
    pub dimensions: usize,
    pub timeout_secs: u64,
    /// Texts per request when embedding the catalog
    pub max_batch_size: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/embeddings".to_string(),
            api_key: None,
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            timeout_secs: 30,
            max_batch_size: 100,
        }
    }
}

#[derive(Debug)]
pub struct HttpBackend {
    client: Client,
    config: HttpConfig,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
    encoding_format: &'static str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: usize,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl HttpBackend {
    pub fn new(config: HttpConfig) -> EmbeddingResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        // Configured key wins over the environment
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok());

        match api_key {
            Some(key) => {
                let bearer = HeaderValue::from_str(&format!("Bearer {}", key))
                    .map_err(|e| EmbeddingError::Config(format!("Invalid API key format: {}", e)))?;
                headers.insert(AUTHORIZATION, bearer);
            }
            None if requires_key(&config.endpoint) => {
                warn!("No API key for {}; requests will likely be rejected", config.endpoint);
            }
            None => {}
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| EmbeddingError::Config(format!("Failed to build HTTP client: {}", e)))?;

        info!(
            endpoint = %config.endpoint,
            model = %config.model,
            dimensions = config.dimensions,
            "HTTP embedding backend ready"
        );

        Ok(Self { client, config })
    }

    /// One round trip for at most `max_batch_size` texts
    fn request_embeddings(&self, texts: &[&str]) -> EmbeddingResult<Vec<Embedding>> {
        let request = EmbeddingRequest {
            model: &self.config.model,
            input: texts,
            // Only text-embedding-3-* accepts a dimensions override
            dimensions: self
                .config
                .model
                .contains("text-embedding-3")
                .then_some(self.config.dimensions),
            encoding_format: "float",
        };

        debug!(
            endpoint = %self.config.endpoint,
            texts = texts.len(),
            "Requesting embeddings"
        );

        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&request)
            .send()?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok());
            return Err(EmbeddingError::RateLimited {
                retry_after_ms: retry_after_ms(retry_after),
            });
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let body: EmbeddingResponse = response.json().map_err(|e| {
            EmbeddingError::EmbeddingFailed(format!("Failed to parse response: {}", e))
        })?;
        if let Some(usage) = &body.usage {
            debug!(tokens = usage.total_tokens, "Embedding usage");
        }

        collect_embeddings(body.data, texts.len(), self.config.dimensions)
    }
}

/// Hosted providers reject anonymous calls; local servers usually do not
fn requires_key(endpoint: &str) -> bool {
    endpoint.contains("openai.com") || endpoint.contains("azure.com")
}

/// `Retry-After` in seconds, converted to milliseconds
fn retry_after_ms(header: Option<&str>) -> Option<u64> {
    header
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|secs| secs.saturating_mul(1000))
}

/// Prefer the provider's own message when the body is an error envelope
fn status_error(status: StatusCode, body: &str) -> EmbeddingError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => EmbeddingError::EmbeddingFailed(format!(
            "API error ({}): {}",
            status, envelope.error.message
        )),
        Err(_) => EmbeddingError::EmbeddingFailed(format!("HTTP error ({}): {}", status, body)),
    }
}

/// Restore input order, then check count and width before normalizing
fn collect_embeddings(
    mut data: Vec<EmbeddingData>,
    expected_count: usize,
    dimensions: usize,
) -> EmbeddingResult<Vec<Embedding>> {
    data.sort_by_key(|d| d.index);

    if data.len() != expected_count {
        return Err(EmbeddingError::EmbeddingFailed(format!(
            "Expected {} embeddings, received {}",
            expected_count,
            data.len()
        )));
    }

    data.into_iter()
        .map(|d| {
            if d.embedding.len() != dimensions {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: dimensions,
                    actual: d.embedding.len(),
                });
            }
            Ok(normalize_embedding(&d.embedding))
        })
        .collect()
}

impl EmbeddingBackend for HttpBackend {
    fn embed(&self, text: &str) -> EmbeddingResult<Embedding> {
        self.request_embeddings(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::EmbeddingFailed("No embedding returned".to_string()))
    }

    fn embed_batch(&self, texts: &[String]) -> EmbeddingResult<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let mut embeddings = Vec::with_capacity(texts.len());
        for chunk in refs.chunks(self.config.max_batch_size.max(1)) {
            embeddings.extend(self.request_embeddings(chunk)?);
        }

        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn name(&self) -> &str {
        "http"
    }
}
