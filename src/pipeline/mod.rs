//! Pipeline stages for splitting a settlement report.
//!
//! Each submodule implements one step; all but the collaborators
//! ([`render`], [`llm`]) are pure functions over their inputs.
//!
//! ## Data Flow
//!
//! ```text
//! input ─▶ render.page_text ─▶ classify::pre_filter ─┬─▶ (skip)
//!                                                   └─▶ render.render_page ─▶ llm ─▶ response
//!   ─▶ classify::post_filter ─▶ validate ─▶ render.extract_page ─▶ naming::RunState::accept
//! ```
//!
//! 1. [`input`]    — validate a local path or stage uploaded bytes
//! 2. [`render`]   — pdfium text layer, rasterisation, single-page extraction
//! 3. [`classify`] — summary/continuation pre-filter and post-filter verdicts
//! 4. [`encode`]   — PNG + base64 for the vision request
//! 5. [`llm`]      — vision call with retry/backoff; the only network I/O
//! 6. [`response`] — pull the JSON object out of the model text
//! 7. [`validate`] — required fields, name simplification, sanitisation
//! 8. [`naming`]   — sequence numbers and filenames

pub mod classify;
pub mod encode;
pub mod input;
pub mod llm;
pub mod naming;
pub mod render;
pub mod response;
pub mod validate;
