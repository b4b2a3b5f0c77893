//! Error types for the settlement-split library.
//!
//! Four error types map onto four failure scopes:
//!
//! * [`SplitError`] — **Fatal**: the run cannot start or the source document
//!   cannot be opened (missing file, wrong password, no credentials).
//!   Returned as `Err(SplitError)` from the top-level `split*` functions.
//!
//! * [`PageError`] — **Per page**: rendering, the vision call or single-page
//!   extraction failed for one page. Recorded in
//!   [`crate::output::PageReport`]; the run moves on to the next page.
//!
//! * [`Rejection`] — **Per page**: the model answered, but a required field
//!   was missing or unusable. Also recorded, also non-fatal.
//!
//! * [`DraftError`] — **Per file, after the run**: an email draft could not
//!   be created. Never invalidates the generated file itself.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the settlement-split library.
#[derive(Debug, Error)]
pub enum SplitError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or place the library next to the binary."
    )]
    PdfiumBindingFailed(String),

    // ── Configuration errors ──────────────────────────────────────────────
    /// The vision provider cannot be built (missing or empty API key etc.).
    #[error("Vision provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The provider refused the credentials or the model on the first call
    /// that reached it. No page can succeed, so the run stops.
    #[error("Authentication error from provider '{provider}': {detail}")]
    AuthError { provider: String, detail: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write a generated file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// ZIP packaging failed.
    #[error("Failed to package generated files: {0}")]
    PackageFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A transient failure confined to a single page.
///
/// Pages are reported 1-indexed in messages, matching what an operator sees
/// in a PDF viewer.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum PageError {
    /// The page's text layer could not be read.
    #[error("Page {page}: text extraction failed: {detail}")]
    TextFailed { page: usize, detail: String },

    /// Page rasterisation failed.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// Vision call failed after retries.
    #[error("Page {page}: vision call failed after {retries} retries: {detail}")]
    VisionFailed {
        page: usize,
        retries: u32,
        detail: String,
    },

    /// The provider refused the key or model (401/403/404, invalid key).
    /// Never retried; the orchestrator turns it into [`SplitError::AuthError`].
    #[error("Page {page}: provider rejected the request: {detail}")]
    CredentialsRejected { page: usize, detail: String },

    /// Vision call timed out on its final attempt.
    #[error("Page {page}: vision call timed out after {secs}s")]
    Timeout { page: usize, secs: u64 },

    /// Copying the page into a standalone PDF failed.
    #[error("Page {page}: single-page extraction failed: {detail}")]
    ExtractFailed { page: usize, detail: String },
}

/// Why a parsed model response could not become an extraction result.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum Rejection {
    /// A required key is absent, null or blank.
    #[error("missing required field '{0}'")]
    MissingField(String),

    /// The name was present but simplified to nothing.
    #[error("simplified name is empty (raw: {raw:?})")]
    EmptyName { raw: String },

    /// `payment_total` could not be read as a decimal.
    #[error("payment total {raw:?} is not a number")]
    InvalidTotal { raw: String },
}

/// Failure to create one email draft.
#[derive(Debug, Error)]
pub enum DraftError {
    /// No access token was supplied.
    #[error("draft service is not configured: {0}")]
    NotConfigured(String),

    /// The request never got a response.
    #[error("draft request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("draft API returned {status}: {body}")]
    Api { status: u16, body: String },

    /// The API answered 2xx but without a draft id.
    #[error("draft API response had no id")]
    MissingId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_error_display_is_one_indexed() {
        let e = PageError::RenderFailed {
            page: 3,
            detail: "bitmap allocation".into(),
        };
        let msg = e.to_string();
        assert!(msg.starts_with("Page 3"), "got: {msg}");
        assert!(msg.contains("bitmap allocation"));
    }

    #[test]
    fn vision_failed_display() {
        let e = PageError::VisionFailed {
            page: 2,
            retries: 2,
            detail: "503".into(),
        };
        assert!(e.to_string().contains("after 2 retries"));
    }

    #[test]
    fn provider_not_configured_display() {
        let e = SplitError::ProviderNotConfigured {
            provider: "gemini".into(),
            hint: "API key is empty".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("gemini"));
        assert!(msg.contains("API key is empty"));
    }

    #[test]
    fn auth_error_display() {
        let e = SplitError::AuthError {
            provider: "gemini".into(),
            detail: "HTTP 401".into(),
        };
        assert!(e.to_string().contains("gemini"));
        assert!(e.to_string().contains("HTTP 401"));
    }

    #[test]
    fn rejection_names_the_field() {
        let r = Rejection::MissingField("currency".into());
        assert_eq!(r.to_string(), "missing required field 'currency'");
    }

    #[test]
    fn page_error_roundtrips_through_json() {
        let e = PageError::Timeout { page: 7, secs: 60 };
        let json = serde_json::to_string(&e).unwrap();
        let back: PageError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }
}
