//! Configuration types for a settlement split run.
//!
//! All run behaviour is controlled through [`SplitConfig`], built via its
//! [`SplitConfigBuilder`]. Credentials are resolved from the config before
//! the document is opened, so a missing key never costs a rendered page.

use crate::error::SplitError;
use crate::pipeline::classify::PageMarkers;
use crate::pipeline::llm::MAX_RETRIES;
use crate::progress::ProgressCallback;
use chrono::NaiveDate;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Where the vision model's credentials come from.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum Credentials {
    /// Let the provider factory read `OPENAI_API_KEY`, `GEMINI_API_KEY`, …
    #[default]
    Environment,
    /// Call Gemini directly with an operator-supplied API key.
    GeminiKey(String),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Environment => f.write_str("Environment"),
            Credentials::GeminiKey(_) => f.write_str("GeminiKey(<redacted>)"),
        }
    }
}

/// Configuration for a split run.
///
/// Built via [`SplitConfig::builder()`] or [`SplitConfig::default()`].
///
/// # Example
/// ```rust
/// use settlement_split::SplitConfig;
///
/// let config = SplitConfig::builder()
///     .render_scale(3.0)
///     .model("gemini-2.0-flash")
///     .max_retries(1)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct SplitConfig {
    /// Zoom factor applied when rasterising a page. Range: 1.0–8.0. Default: 4.0.
    ///
    /// Settlement reports use small print; 4× keeps totals legible to the model.
    pub render_scale: f32,

    /// Cap on either rendered dimension in pixels. Default: 4000.
    pub max_rendered_pixels: u32,

    /// Model identifier. If None, a per-provider default is used.
    pub model: Option<String>,

    /// Provider name for the provider factory (e.g. "openai", "gemini").
    pub provider_name: Option<String>,

    /// Pre-constructed provider. Takes precedence over everything else.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Credential source used when no provider is supplied.
    pub credentials: Credentials,

    /// Sampling temperature. Default: 0.0 (extraction wants determinism).
    pub temperature: f32,

    /// Maximum tokens the model may generate per page. Default: 1024.
    pub max_tokens: usize,

    /// Retries on a failed vision call. Default: 2. At most
    /// [`MAX_RETRIES`](crate::pipeline::llm::MAX_RETRIES).
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call vision timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Extraction prompt override. If None, uses [`crate::prompts::EXTRACTION_PROMPT`].
    pub prompt: Option<String>,

    /// Text markers used by the pre-filter.
    pub markers: PageMarkers,

    /// Skip summary/continuation pages before calling the model. Default: true.
    pub pre_filter: bool,

    /// Date stamped into filenames. If None, today's local date at run start.
    pub run_date: Option<NaiveDate>,

    /// Optional per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            render_scale: 4.0,
            max_rendered_pixels: 4000,
            model: None,
            provider_name: None,
            provider: None,
            credentials: Credentials::default(),
            temperature: 0.0,
            max_tokens: 1024,
            max_retries: 2,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            password: None,
            prompt: None,
            markers: PageMarkers::default(),
            pre_filter: true,
            run_date: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for SplitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SplitConfig")
            .field("render_scale", &self.render_scale)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("credentials", &self.credentials)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("markers", &self.markers)
            .field("pre_filter", &self.pre_filter)
            .field("run_date", &self.run_date)
            .finish()
    }
}

impl SplitConfig {
    /// Create a new builder for `SplitConfig`.
    pub fn builder() -> SplitConfigBuilder {
        SplitConfigBuilder {
            config: Self::default(),
        }
    }

    /// The effective extraction prompt.
    pub fn prompt(&self) -> &str {
        self.prompt
            .as_deref()
            .unwrap_or(crate::prompts::EXTRACTION_PROMPT)
    }
}

/// Builder for [`SplitConfig`].
pub struct SplitConfigBuilder {
    config: SplitConfig,
}

impl fmt::Debug for SplitConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SplitConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl SplitConfigBuilder {
    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale.clamp(1.0, 8.0);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.config.credentials = credentials;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n.min(MAX_RETRIES);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    pub fn markers(mut self, markers: PageMarkers) -> Self {
        self.config.markers = markers;
        self
    }

    pub fn pre_filter(mut self, enabled: bool) -> Self {
        self.config.pre_filter = enabled;
        self
    }

    pub fn run_date(mut self, date: NaiveDate) -> Self {
        self.config.run_date = Some(date);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<SplitConfig, SplitError> {
        let c = &self.config;
        if !(1.0..=8.0).contains(&c.render_scale) {
            return Err(SplitError::InvalidConfig(format!(
                "render scale must be 1.0–8.0, got {}",
                c.render_scale
            )));
        }
        if c.max_tokens == 0 {
            return Err(SplitError::InvalidConfig("max tokens must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(SplitError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if let Credentials::GeminiKey(key) = &c.credentials {
            if key.trim().is_empty() {
                return Err(SplitError::ProviderNotConfigured {
                    provider: "gemini".into(),
                    hint: "The supplied Gemini API key is empty.".into(),
                });
            }
        }
        Ok(self.config)
    }
}
