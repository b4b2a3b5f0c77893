//! Vision collaborator: image + prompt → free-form text.
//!
//! Two clients implement [`VisionModel`]:
//!
//! * [`LlmVision`] — any `edgequake_llm` provider (OpenAI, Anthropic, Gemini,
//!   Ollama, …), credentials read from the environment by the provider.
//! * [`GeminiVision`] — the Gemini `generateContent` REST endpoint with an
//!   explicitly supplied key.
//!
//! ## Retry Strategy
//!
//! Both wrap each call in a per-call timeout and retry transient failures
//! (network errors, 408, 429, 5xx) with exponential backoff
//! (`retry_backoff_ms * 2^attempt`, at most [`MAX_RETRIES`] retries).
//! Other 4xx answers fail the page at once. A refused key or model becomes
//! [`PageError::CredentialsRejected`] and the orchestrator stops the run.

use crate::config::SplitConfig;
use crate::error::PageError;
use crate::pipeline::encode;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use image::DynamicImage;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Default model when calling Gemini directly.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Anything that can read a page image and answer a prompt.
pub trait VisionModel {
    /// Ask the model about one rendered page. `page_index` is 0-indexed and
    /// used only for diagnostics.
    fn describe(
        &self,
        page_index: usize,
        image: &DynamicImage,
        prompt: &str,
    ) -> impl Future<Output = Result<String, PageError>> + Send;

    /// Provider name used in error messages.
    fn provider(&self) -> &str {
        "vision"
    }
}

/// Upper bound on retries per page; the backoff doubles each attempt.
pub const MAX_RETRIES: u32 = 10;

/// Timeout and backoff shared by both clients.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub timeout_secs: u64,
}

impl From<&SplitConfig> for RetryPolicy {
    fn from(config: &SplitConfig) -> Self {
        Self {
            max_retries: config.max_retries.min(MAX_RETRIES),
            backoff_ms: config.retry_backoff_ms,
            timeout_secs: config.api_timeout_secs,
        }
    }
}

/// How a failed call is handled by [`with_retries`].
#[derive(Debug, Clone, PartialEq)]
enum CallError {
    /// Network errors, 408, 429, 5xx: try again.
    Transient(String),
    /// The request is wrong for this page; the same request fails the same way.
    Permanent(String),
    /// Key or model refused. Fails every page.
    Rejected(String),
}

/// Classify an HTTP error status from a provider.
fn classify_status(status: u16, body: &str) -> CallError {
    let detail = format!("HTTP {status}: {body}");
    match status {
        401 | 403 | 404 => CallError::Rejected(detail),
        400 if is_key_message(body) => CallError::Rejected(detail),
        408 | 429 => CallError::Transient(detail),
        400..=499 => CallError::Permanent(detail),
        _ => CallError::Transient(detail),
    }
}

/// Classify an error string from an `edgequake_llm` provider, which does
/// not expose the status code.
fn classify_message(detail: String) -> CallError {
    let lower = detail.to_lowercase();
    if lower.contains("401")
        || lower.contains("403")
        || lower.contains("unauthorized")
        || lower.contains("forbidden")
        || lower.contains("authentication")
        || is_key_message(&lower)
    {
        CallError::Rejected(detail)
    } else {
        CallError::Transient(detail)
    }
}

fn is_key_message(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("api key not valid")
        || lower.contains("api_key_invalid")
        || lower.contains("invalid api key")
        || lower.contains("incorrect api key")
}

/// Run `call` until it succeeds, fails permanently or the policy is exhausted.
async fn with_retries<F, Fut>(
    page_index: usize,
    policy: RetryPolicy,
    mut call: F,
) -> Result<String, PageError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String, CallError>>,
{
    let page = page_index + 1;
    let max_retries = policy.max_retries.min(MAX_RETRIES);
    let mut last_err: Option<PageError> = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let backoff = policy
                .backoff_ms
                .saturating_mul(2u64.saturating_pow(attempt - 1));
            warn!(
                "Page {}: retry {}/{} after {}ms",
                page, attempt, max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match timeout(Duration::from_secs(policy.timeout_secs), call()).await {
            Ok(Ok(text)) => return Ok(text),
            Ok(Err(CallError::Rejected(detail))) => {
                warn!("Page {}: provider rejected the request: {}", page, detail);
                return Err(PageError::CredentialsRejected { page, detail });
            }
            Ok(Err(CallError::Permanent(detail))) => {
                warn!(
                    "Page {}: attempt {} failed, not retrying: {}",
                    page,
                    attempt + 1,
                    detail
                );
                return Err(PageError::VisionFailed {
                    page,
                    retries: attempt,
                    detail,
                });
            }
            Ok(Err(CallError::Transient(detail))) => {
                warn!("Page {}: attempt {} failed: {}", page, attempt + 1, detail);
                last_err = Some(PageError::VisionFailed {
                    page,
                    retries: max_retries,
                    detail,
                });
            }
            Err(_) => {
                warn!(
                    "Page {}: attempt {} timed out after {}s",
                    page,
                    attempt + 1,
                    policy.timeout_secs
                );
                last_err = Some(PageError::Timeout {
                    page,
                    secs: policy.timeout_secs,
                });
            }
        }
    }

    Err(last_err.unwrap_or(PageError::VisionFailed {
        page,
        retries: max_retries,
        detail: "Unknown error".to_string(),
    }))
}

/// Vision client backed by an `edgequake_llm` provider.
pub struct LlmVision {
    provider: Arc<dyn LLMProvider>,
    label: String,
    options: CompletionOptions,
    policy: RetryPolicy,
}

impl LlmVision {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &SplitConfig) -> Self {
        Self {
            provider,
            label: config
                .provider_name
                .clone()
                .unwrap_or_else(|| "auto".to_string()),
            options: build_options(config),
            policy: RetryPolicy::from(config),
        }
    }
}

impl VisionModel for LlmVision {
    async fn describe(
        &self,
        page_index: usize,
        image: &DynamicImage,
        prompt: &str,
    ) -> Result<String, PageError> {
        let image_data = encode::encode_page(image).map_err(|e| PageError::RenderFailed {
            page: page_index + 1,
            detail: format!("image encoding failed: {e}"),
        })?;

        // Prompt and image travel together in one user turn.
        let messages = vec![ChatMessage::user_with_images(prompt, vec![image_data])];
        let start = Instant::now();

        let messages = &messages;
        let provider = &self.provider;
        let options = &self.options;

        with_retries(page_index, self.policy, || async move {
            let response = provider
                .chat(messages, Some(options))
                .await
                .map_err(|e| classify_message(e.to_string()))?;
            debug!(
                "Page {}: {} input tokens, {} output tokens, {:?}",
                page_index + 1,
                response.prompt_tokens,
                response.completion_tokens,
                start.elapsed()
            );
            Ok(response.content)
        })
        .await
    }

    fn provider(&self) -> &str {
        &self.label
    }
}

/// Build `CompletionOptions` from the split config.
fn build_options(config: &SplitConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Direct Gemini client using an explicit API key.
#[derive(Clone)]
pub struct GeminiVision {
    client: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
    policy: RetryPolicy,
}

impl GeminiVision {
    pub fn new(api_key: impl Into<String>, config: &SplitConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            policy: RetryPolicy::from(config),
        }
    }

    async fn generate(&self, body: &Value) -> Result<String, CallError> {
        let url = format!("{}/{}:generateContent", GEMINI_ENDPOINT, self.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| CallError::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &text));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| CallError::Transient(format!("invalid JSON from Gemini: {e}")))?;
        gemini_text(&payload).ok_or_else(|| {
            CallError::Transient("Gemini response had no text candidate".to_string())
        })
    }
}

impl VisionModel for GeminiVision {
    async fn describe(
        &self,
        page_index: usize,
        image: &DynamicImage,
        prompt: &str,
    ) -> Result<String, PageError> {
        let b64 = encode::encode_png_base64(image).map_err(|e| PageError::RenderFailed {
            page: page_index + 1,
            detail: format!("image encoding failed: {e}"),
        })?;

        let body = json!({
            "contents": [{
                "parts": [
                    { "text": prompt },
                    { "inline_data": { "mime_type": "image/png", "data": b64 } }
                ]
            }],
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_tokens
            }
        });

        with_retries(page_index, self.policy, || self.generate(&body)).await
    }

    fn provider(&self) -> &str {
        "gemini"
    }
}

/// Concatenate the text parts of the first candidate.
fn gemini_text(payload: &Value) -> Option<String> {
    let parts = payload
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    Some(text)
}

/// Either vision client, chosen at run start from the config.
pub enum VisionClient {
    Llm(LlmVision),
    Gemini(GeminiVision),
}

impl VisionModel for VisionClient {
    async fn describe(
        &self,
        page_index: usize,
        image: &DynamicImage,
        prompt: &str,
    ) -> Result<String, PageError> {
        match self {
            VisionClient::Llm(v) => v.describe(page_index, image, prompt).await,
            VisionClient::Gemini(v) => v.describe(page_index, image, prompt).await,
        }
    }

    fn provider(&self) -> &str {
        match self {
            VisionClient::Llm(v) => v.provider(),
            VisionClient::Gemini(v) => v.provider(),
        }
    }
}
