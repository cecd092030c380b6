//! Text-generation capability.
//!
//! [`TextGenerator`] is the seam the rest of the crate talks to. Any
//! `Fn(&GenerationRequest) -> Result<String, GenerationError>` closure
//! implements it, and [`HttpTextGenerator`] implements it against the
//! Generative Language REST API.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::config::GeneratorConfig;
use crate::error::GenerationError;

/// A prompt plus the JSON schema the response must follow.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub schema: Value,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Returns the raw JSON text produced for `request`.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

#[async_trait]
impl<F> TextGenerator for F
where
    F: Fn(&GenerationRequest) -> Result<String, GenerationError> + Send + Sync,
{
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self(request)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            initial_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based): doubles each time.
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.initial_delay
            .saturating_mul(2u32.saturating_pow(retry))
    }
}

#[tracing::instrument(skip_all, fields(request_id = %Uuid::new_v4()))]
pub async fn generate_with_retry<G>(
    generator: &G,
    request: &GenerationRequest,
    policy: &RetryPolicy,
) -> Result<String, GenerationError>
where
    G: TextGenerator + ?Sized,
{
    let mut retry = 0;
    loop {
        match generator.generate(request).await {
            Ok(text) => {
                debug!(attempts = retry + 1, bytes = text.len(), "Text generation succeeded");
                return Ok(text);
            }
            Err(err) if retry < policy.retries => {
                let delay = policy.delay_for(retry);
                warn!(
                    error = %err,
                    retries_left = policy.retries - retry,
                    delay_ms = delay.as_millis() as u64,
                    "Text generation failed, retrying"
                );
                tokio::time::sleep(delay).await;
                retry += 1;
            }
            Err(err) => {
                error!(error = %err, attempts = retry + 1, "Text generation failed after retries");
                return Err(err);
            }
        }
    }
}

/// Runs the request with retries and parses the response as `T`.
/// A response that does not parse is not retried.
pub async fn generate_json<G, T>(
    generator: &G,
    request: &GenerationRequest,
    policy: &RetryPolicy,
) -> Result<T, GenerationError>
where
    G: TextGenerator + ?Sized,
    T: DeserializeOwned,
{
    let text = generate_with_retry(generator, request, policy).await?;
    Ok(serde_json::from_str(strip_code_fence(&text))?)
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|inner| inner.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

pub struct HttpTextGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpTextGenerator {
    pub fn new(config: &GeneratorConfig) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/models/{}:generateContent", config.base_url, config.model),
            api_key: config.api_key.clone(),
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentBody<'a> {
    contents: Value,
    generation_config: GenerationConfigBody<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfigBody<'a> {
    response_mime_type: &'static str,
    response_schema: &'a Value,
}

fn request_body(request: &GenerationRequest) -> GenerateContentBody<'_> {
    GenerateContentBody {
        contents: json!([{ "role": "user", "parts": [{ "text": request.prompt }] }]),
        generation_config: GenerationConfigBody {
            response_mime_type: "application/json",
            response_schema: &request.schema,
        },
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

fn response_text(response: GenerateContentResponse) -> Result<String, GenerationError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        Err(GenerationError::EmptyResponse)
    } else {
        Ok(text)
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body(request))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status { status, body });
        }

        let parsed: GenerateContentResponse = response.json().await?;
        response_text(parsed)
    }
}
