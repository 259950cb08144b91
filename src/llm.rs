//! Chat-completions boundary shared by the remote decision policy, the
//! remote reranker and answer generation

use std::fmt::Debug;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::util::truncate_str;

/// A request/response text-completion service
///
/// Implementations must bound every call with a timeout.
pub trait CompletionService: Send + Sync + Debug {
    fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

/// OpenAI-compatible `/v1/chat/completions` client
#[derive(Debug)]
pub struct ChatCompletionsClient {
    client: Client,
    config: LlmConfig,
}

impl ChatCompletionsClient {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        if let Some(key) = &api_key {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", key))
                    .map_err(|e| LlmError::Config(format!("Invalid API key format: {}", e)))?,
            );
        } else {
            warn!("No API key configured for {}", config.endpoint);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| LlmError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn call_once(&self, prompt: &str) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let response = self.client.post(&self.config.endpoint).json(&request).send()?;
        let status = response.status();
        let body = response.text()?;

        if !status.is_success() {
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: truncate_str(&body, 200),
            });
        }

        let json: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| LlmError::Malformed(format!("invalid JSON response: {}", e)))?;

        json.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|content| content.trim().to_string())
            .ok_or_else(|| {
                LlmError::Malformed(format!(
                    "unexpected response format: {}",
                    truncate_str(&body, 200)
                ))
            })
    }
}

fn is_retryable(err: &LlmError) -> bool {
    matches!(err, LlmError::Status { status, .. } if *status == 429 || *status >= 500)
}

impl CompletionService for ChatCompletionsClient {
    /// One retry on rate limiting or server errors; everything else fails fast
    fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        match self.call_once(prompt) {
            Err(e) if is_retryable(&e) => {
                warn!("Completion call failed ({}), retrying once", e);
                self.call_once(prompt)
            }
            other => other,
        }
    }
}

/// Pull the first JSON object out of a model reply.
///
/// Tolerates code fences and prose around the object. Returns `None` when no
/// balanced `{...}` block parses.
pub fn extract_json_object(text: &str) -> Option<serde_json::Value> {
    let trimmed = text.trim();
    if let Ok(value @ serde_json::Value::Object(_)) = serde_json::from_str::<serde_json::Value>(trimmed) {
        return Some(value);
    }

    let bytes = trimmed.as_bytes();
    let mut search_from = 0;
    while let Some(offset) = trimmed[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(end) = balanced_end(&bytes[start..]) {
            let candidate = &trimmed[start..start + end];
            if let Ok(value @ serde_json::Value::Object(_)) = serde_json::from_str::<serde_json::Value>(candidate) {
                return Some(value);
            }
        }
        search_from = start + 1;
    }

    debug!("No JSON object in reply: {}", truncate_str(trimmed, 120));
    None
}

/// Length of the balanced `{...}` block starting at `bytes[0]`, string-aware
fn balanced_end(bytes: &[u8]) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}
