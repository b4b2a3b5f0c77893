//! # settlement-split
//!
//! Split a multi-page fund settlement report into one PDF per settlement
//! instruction, named from data a vision model reads off each page.
//!
//! ## Why this crate?
//!
//! Settlement reports arrive as one long PDF that interleaves instruction
//! pages with summary pages and continuation pages. Each instruction has to
//! be filed and emailed on its own, under a filename that carries the run
//! date, a daily sequence number, the fund house and the currency. Reading
//! those by hand is slow and error-prone; this crate renders each page, asks
//! a vision model for the three fields, and cuts the page out.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     resolve a local file or stage uploaded bytes
//!  ├─ 2. Classify  text-layer markers skip summary / continuation pages
//!  ├─ 3. Render    rasterise the page via pdfium (spawn_blocking)
//!  ├─ 4. Vision    name, currency and total as JSON (retry + timeout)
//!  ├─ 5. Validate  required fields, name simplification, sanitisation
//!  ├─ 6. Name      S<YYMMDD>-<seq>_<name>_<CCY>-order details.pdf
//!  └─ 7. Extract   single-page PDF bytes
//! ```
//!
//! After the run, [`package`] zips or writes the files and [`draft`] creates
//! one email draft per file.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use settlement_split::{split_pdf, start_sequence_after, SplitConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / ANTHROPIC_API_KEY
//!     let config = SplitConfig::default();
//!     let output = split_pdf("settlement.pdf", start_sequence_after(Some(4))?, &config).await?;
//!     for file in &output.files {
//!         println!("{}", file.filename);
//!     }
//!     eprintln!("next sequence: {}", output.next_sequence);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `settlement-split` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod draft;
pub mod error;
pub mod output;
pub mod package;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod split;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{Credentials, SplitConfig, SplitConfigBuilder};
pub use error::{DraftError, PageError, Rejection, SplitError};
pub use output::{GeneratedFile, PageOutcome, PageReport, RunOutput, RunStats};
pub use pipeline::classify::{PageMarkers, Verdict};
pub use pipeline::llm::VisionModel;
pub use pipeline::naming::start_sequence_after;
pub use pipeline::render::PageSource;
pub use progress::{NoopProgressCallback, ProgressCallback, SplitProgressCallback};
pub use split::{resolve_vision, run_pipeline, split_from_bytes, split_pdf, split_sync};
