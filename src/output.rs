//! Result types produced by a split run.
//!
//! A run yields one [`GeneratedFile`] per accepted settlement page plus a
//! [`PageReport`] for every page, so callers can show exactly why a page did
//! not produce a file without re-reading logs.

use crate::error::{PageError, Rejection};
use crate::pipeline::classify::Verdict;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One single-page settlement PDF produced by the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedFile {
    /// `S<YYMMDD>-<seq>_<name>_<currency>-order details.pdf`, unique within the run.
    pub filename: String,
    /// Single-page PDF bytes. Not serialised; use [`crate::package`] to ship them.
    #[serde(skip)]
    pub content: Vec<u8>,
    pub simplified_name: String,
    pub currency: String,
    pub payment_total: Decimal,
    pub sequence_number: u32,
    /// 0-indexed page of the source document this file was cut from.
    pub page_index: usize,
    /// The model returned a dash-containing name that no special case covers;
    /// the pre-dash substring was used and a human should confirm it.
    pub needs_review: bool,
}

/// What happened to a single page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PageOutcome {
    /// Text markers identified a summary or continuation page; no AI call was made.
    SkippedEarly { verdict: Verdict },
    /// The model answered with no object, an empty object, or malformed JSON.
    SkippedUnparseable { malformed: bool },
    /// The model answered, but a required field was unusable.
    Rejected { reason: Rejection },
    /// Rendering, the vision call or extraction failed.
    Failed { error: PageError },
    /// A file was generated.
    Accepted {
        filename: String,
        sequence_number: u32,
    },
}

impl PageOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, PageOutcome::Accepted { .. })
    }

    /// Short human-readable description used in progress output.
    pub fn describe(&self) -> String {
        match self {
            PageOutcome::SkippedEarly { verdict } => format!("skipped ({verdict})"),
            PageOutcome::SkippedUnparseable { malformed: true } => {
                "skipped (malformed AI response)".to_string()
            }
            PageOutcome::SkippedUnparseable { malformed: false } => {
                "skipped (no settlement data)".to_string()
            }
            PageOutcome::Rejected { reason } => format!("rejected: {reason}"),
            PageOutcome::Failed { error } => error.to_string(),
            PageOutcome::Accepted { filename, .. } => filename.clone(),
        }
    }
}

/// Per-page record, in document order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageReport {
    /// 0-indexed.
    pub page_index: usize,
    #[serde(flatten)]
    pub outcome: PageOutcome,
}

/// Counters for a finished run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub total_pages: usize,
    pub accepted_pages: usize,
    pub skipped_pages: usize,
    pub rejected_pages: usize,
    pub failed_pages: usize,
    /// Number of vision calls actually made (pre-filtered pages cost nothing).
    pub vision_calls: usize,
    pub total_duration_ms: u64,
}

/// Everything a run hands back to its caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    /// Accepted files in document order; sequence numbers strictly increasing.
    pub files: Vec<GeneratedFile>,
    /// The first sequence number not used by this run.
    pub next_sequence: u32,
    pub pages: Vec<PageReport>,
    pub stats: RunStats,
}

impl RunOutput {
    /// Files flagged for human review of the simplified name.
    pub fn needs_review(&self) -> impl Iterator<Item = &GeneratedFile> {
        self.files.iter().filter(|f| f.needs_review)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_report_serialises_flat() {
        let report = PageReport {
            page_index: 1,
            outcome: PageOutcome::SkippedEarly {
                verdict: Verdict::SkipSummary,
            },
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["page_index"], 1);
        assert_eq!(json["outcome"], "skipped_early");
        assert_eq!(json["verdict"], "skip_summary");
    }

    #[test]
    fn generated_file_json_omits_content() {
        let file = GeneratedFile {
            filename: "S261017-01_ABC Fund_USD-order details.pdf".into(),
            content: b"%PDF-1.7".to_vec(),
            simplified_name: "ABC Fund".into(),
            currency: "USD".into(),
            payment_total: Decimal::new(123456, 2),
            sequence_number: 1,
            page_index: 0,
            needs_review: false,
        };
        let json = serde_json::to_value(&file).unwrap();
        assert!(json.get("content").is_none());
        assert_eq!(json["payment_total"], "1234.56");
    }

    #[test]
    fn describe_accepted_is_filename() {
        let outcome = PageOutcome::Accepted {
            filename: "x.pdf".into(),
            sequence_number: 4,
        };
        assert!(outcome.is_accepted());
        assert_eq!(outcome.describe(), "x.pdf");
    }
}
