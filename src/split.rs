//! Run orchestration: walk the document page by page and collect files.
//!
//! Pages are processed strictly in order, one at a time. The sequence
//! counter is shared run state: page N+1's number depends on whether page N
//! was accepted, so no page starts before the previous verdict is final.
//!
//! Per-page state machine:
//!
//! ```text
//! Pending ─▶ pre-filter ─┬─▶ SkippedEarly
//!                        └─▶ render ─▶ vision ─▶ parse ─┬─▶ SkippedUnparseable
//!                                                      ├─▶ Rejected
//!                                                      ├─▶ Failed
//!                                                      └─▶ Accepted (counter + 1)
//! ```
//!
//! Resolving credentials, opening the source document and a provider that
//! refuses the key or model fail the run. Everything else degrades to a
//! per-page outcome.

use crate::config::{Credentials, SplitConfig};
use crate::error::{PageError, SplitError};
use crate::output::{PageOutcome, PageReport, RunOutput, RunStats};
use crate::pipeline::classify::{self, Verdict};
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::llm::{GeminiVision, LlmVision, VisionClient, VisionModel};
use crate::pipeline::naming::RunState;
use crate::pipeline::render::{PageSource, PdfiumDocument};
use crate::pipeline::response::{self, ModelResponse};
use crate::pipeline::validate;
use chrono::Local;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Split a settlement-report PDF on disk.
///
/// `start_sequence` is the number given to the first accepted page; use
/// [`crate::start_sequence_after`] to derive it from the last number used.
///
/// # Errors
/// Returns `Err(SplitError)` only for fatal errors:
/// - credentials missing or invalid
/// - file not found / permission denied / not a PDF
/// - PDF corrupt or password-protected
/// - the provider rejects the key or model on its first vision call
///
/// A run in which no page is accepted is still `Ok`, with an empty file list.
pub async fn split_pdf(
    path: impl AsRef<Path>,
    start_sequence: u32,
    config: &SplitConfig,
) -> Result<RunOutput, SplitError> {
    let resolved = input::resolve_local(path)?;
    split_resolved(&resolved, start_sequence, config).await
}

/// Split an uploaded PDF held in memory.
///
/// The bytes are staged to a temporary directory that is removed when this
/// function returns, whatever the outcome.
pub async fn split_from_bytes(
    bytes: &[u8],
    file_name: &str,
    start_sequence: u32,
    config: &SplitConfig,
) -> Result<RunOutput, SplitError> {
    let staged = input::stage_upload(bytes, file_name)?;
    split_resolved(&staged, start_sequence, config).await
}

/// Synchronous wrapper around [`split_pdf`].
///
/// Creates a temporary tokio runtime internally.
pub fn split_sync(
    path: impl AsRef<Path>,
    start_sequence: u32,
    config: &SplitConfig,
) -> Result<RunOutput, SplitError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| SplitError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(split_pdf(path, start_sequence, config))
}

async fn split_resolved(
    resolved: &ResolvedInput,
    start_sequence: u32,
    config: &SplitConfig,
) -> Result<RunOutput, SplitError> {
    if start_sequence == 0 {
        return Err(SplitError::InvalidConfig(
            "start sequence must be ≥ 1".into(),
        ));
    }

    let vision = resolve_vision(config)?;
    let document = PdfiumDocument::open(
        resolved.path(),
        config.password.as_deref(),
        config.max_rendered_pixels,
    )
    .await?;

    run_pipeline(&document, &vision, start_sequence, config).await
}

/// Drive every page of `source` through classification and extraction.
///
/// Per-page problems are recorded in [`RunOutput::pages`].
/// `next_sequence` is `start_sequence` plus the number of accepted pages.
///
/// # Errors
/// - [`SplitError::InvalidConfig`] when `start_sequence` is 0 or too close to
///   `u32::MAX` for the page count. Checked before any page is touched.
/// - [`SplitError::AuthError`] when the vision provider rejects the
///   credentials. No later page is sent.
pub async fn run_pipeline<S, V>(
    source: &S,
    vision: &V,
    start_sequence: u32,
    config: &SplitConfig,
) -> Result<RunOutput, SplitError>
where
    S: PageSource,
    V: VisionModel,
{
    let total_start = Instant::now();
    let total_pages = source.page_count();
    let run_date = config.run_date.unwrap_or_else(|| Local::now().date_naive());
    let mut state = RunState::new(start_sequence, run_date, total_pages)?;
    info!(
        "Starting run: {} pages, first sequence {}, date {}",
        total_pages,
        start_sequence,
        run_date.format("%y%m%d")
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(total_pages);
    }

    let mut pages = Vec::with_capacity(total_pages);
    let mut vision_calls = 0usize;

    for page_index in 0..total_pages {
        let status = format!("Processing page {} of {}", page_index + 1, total_pages);
        if let Some(ref cb) = config.progress_callback {
            cb.on_page(page_index, total_pages, &status);
        }

        let outcome = process_page(
            source,
            vision,
            page_index,
            config,
            &mut state,
            &mut vision_calls,
        )
        .await;

        if let Some(ref cb) = config.progress_callback {
            cb.on_page_done(page_index, total_pages, &outcome);
        }
        if let PageOutcome::Failed {
            error: PageError::CredentialsRejected { detail, .. },
        } = &outcome
        {
            warn!(
                "Provider '{}' rejected the credentials, stopping at page {}",
                vision.provider(),
                page_index + 1
            );
            if let Some(ref cb) = config.progress_callback {
                cb.on_run_complete(total_pages, state.results.len());
            }
            return Err(SplitError::AuthError {
                provider: vision.provider().to_string(),
                detail: detail.clone(),
            });
        }
        pages.push(PageReport {
            page_index,
            outcome,
        });
    }

    let stats = compute_stats(&pages, vision_calls, total_start.elapsed().as_millis() as u64);
    let next_sequence = state.next_sequence();

    info!(
        "Run complete: {}/{} pages accepted, next sequence {}, {}ms",
        stats.accepted_pages, total_pages, next_sequence, stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(total_pages, stats.accepted_pages);
    }

    Ok(RunOutput {
        files: state.results,
        next_sequence,
        pages,
        stats,
    })
}

/// One page, start to finish.
async fn process_page<S, V>(
    source: &S,
    vision: &V,
    page_index: usize,
    config: &SplitConfig,
    state: &mut RunState,
    vision_calls: &mut usize,
) -> PageOutcome
where
    S: PageSource,
    V: VisionModel,
{
    let page = page_index + 1;

    let pre = if config.pre_filter {
        let text = match source.page_text(page_index).await {
            Ok(text) => text,
            Err(e) => {
                warn!("{}; deciding from the AI response alone", e);
                String::new()
            }
        };
        classify::pre_filter(&text, &config.markers)
    } else {
        Verdict::Process
    };

    if pre != Verdict::Process {
        info!("Page {}: {}, skipping", page, pre);
        return PageOutcome::SkippedEarly { verdict: pre };
    }

    let image = match source.render_page(page_index, config.render_scale).await {
        Ok(image) => image,
        Err(error) => {
            warn!("{}", error);
            return PageOutcome::Failed { error };
        }
    };

    *vision_calls += 1;
    let text = match vision.describe(page_index, &image, config.prompt()).await {
        Ok(text) => text,
        Err(error) => {
            warn!("{}", error);
            return PageOutcome::Failed { error };
        }
    };
    drop(image);

    let parsed = response::parse_response(&text);
    if classify::post_filter(pre, &parsed) == Verdict::SkipUnparseable {
        let malformed = match &parsed {
            ModelResponse::Malformed(detail) => {
                warn!("Page {}: malformed AI response ({}), skipping", page, detail);
                true
            }
            _ => {
                info!("Page {}: no settlement data, skipping", page);
                false
            }
        };
        return PageOutcome::SkippedUnparseable { malformed };
    }
    let ModelResponse::Object(fields) = parsed else {
        return PageOutcome::SkippedUnparseable { malformed: false };
    };

    let extraction = match validate::validate(&fields) {
        Ok(extraction) => extraction,
        Err(reason) => {
            warn!("Page {}: {}, skipping", page, reason);
            return PageOutcome::Rejected { reason };
        }
    };
    debug!("Page {}: extracted {:?}", page, extraction);

    let content = match source.extract_page(page_index).await {
        Ok(bytes) => bytes,
        Err(error) => {
            warn!("{}", error);
            return PageOutcome::Failed { error };
        }
    };

    let file = state.accept(page_index, extraction, content);
    info!("Page {} → {}", page, file.filename);
    PageOutcome::Accepted {
        filename: file.filename.clone(),
        sequence_number: file.sequence_number,
    }
}

fn compute_stats(pages: &[PageReport], vision_calls: usize, total_duration_ms: u64) -> RunStats {
    let mut stats = RunStats {
        total_pages: pages.len(),
        vision_calls,
        total_duration_ms,
        ..Default::default()
    };
    for report in pages {
        match report.outcome {
            PageOutcome::Accepted { .. } => stats.accepted_pages += 1,
            PageOutcome::SkippedEarly { .. } | PageOutcome::SkippedUnparseable { .. } => {
                stats.skipped_pages += 1
            }
            PageOutcome::Rejected { .. } => stats.rejected_pages += 1,
            PageOutcome::Failed { .. } => stats.failed_pages += 1,
        }
    }
    stats
}

// ── Vision client resolution ─────────────────────────────────────────────

/// Model used with a named provider when the config names none.
fn default_model_for(provider: &str) -> &'static str {
    match provider {
        "gemini" => crate::pipeline::llm::DEFAULT_GEMINI_MODEL,
        "anthropic" => "claude-sonnet-4-20250514",
        _ => "gpt-4.1-nano",
    }
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, SplitError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        SplitError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the vision client, from most-specific to least-specific:
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Explicit Gemini key** (`Credentials::GeminiKey`), direct REST client.
/// 3. **Named provider** (`config.provider_name`) with its key from the environment.
/// 4. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`.
/// 5. **Full auto-detection** via `ProviderFactory::from_env`.
///
/// Any failure here is a configuration error and the run does not start.
pub fn resolve_vision(config: &SplitConfig) -> Result<VisionClient, SplitError> {
    if let Some(ref provider) = config.provider {
        return Ok(VisionClient::Llm(LlmVision::new(Arc::clone(provider), config)));
    }

    if let Credentials::GeminiKey(ref key) = config.credentials {
        let key = key.trim();
        if key.is_empty() {
            return Err(SplitError::ProviderNotConfigured {
                provider: "gemini".into(),
                hint: "The supplied Gemini API key is empty.".into(),
            });
        }
        return Ok(VisionClient::Gemini(GeminiVision::new(key, config)));
    }

    if let Some(ref name) = config.provider_name {
        let model = config
            .model
            .as_deref()
            .unwrap_or_else(|| default_model_for(name));
        let provider = create_vision_provider(name, model)?;
        return Ok(VisionClient::Llm(LlmVision::new(provider, config)));
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            let provider = create_vision_provider(&prov, &model)?;
            return Ok(VisionClient::Llm(LlmVision::new(provider, config)));
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| SplitError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No vision provider could be auto-detected from the environment.\n\
                Set GEMINI_API_KEY, OPENAI_API_KEY or ANTHROPIC_API_KEY, or pass --gemini-key.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(VisionClient::Llm(LlmVision::new(llm_provider, config)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_gemini_key_fails_before_any_io() {
        let mut config = SplitConfig::default();
        config.credentials = Credentials::GeminiKey(String::new());
        let err = resolve_vision(&config).err().expect("must fail");
        assert!(matches!(err, SplitError::ProviderNotConfigured { .. }));
    }

    #[test]
    fn explicit_gemini_key_selects_gemini_client() {
        let config = SplitConfig::builder()
            .credentials(Credentials::GeminiKey("test-key".into()))
            .build()
            .unwrap();
        assert!(matches!(
            resolve_vision(&config),
            Ok(VisionClient::Gemini(_))
        ));
    }

    #[test]
    fn default_models() {
        assert_eq!(default_model_for("gemini"), "gemini-2.0-flash");
        assert_eq!(default_model_for("openai"), "gpt-4.1-nano");
    }

    #[tokio::test]
    async fn zero_start_sequence_is_rejected() {
        let staged = input::stage_upload(b"%PDF-1.7\n%%EOF", "a.pdf").unwrap();
        let err = split_resolved(&staged, 0, &SplitConfig::default())
            .await
            .err()
            .expect("must fail");
        assert!(matches!(err, SplitError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn missing_file_is_fatal() {
        let err = split_pdf("/no/such/report.pdf", 1, &SplitConfig::default())
            .await
            .err()
            .expect("must fail");
        assert!(matches!(err, SplitError::FileNotFound { .. }));
    }
}
