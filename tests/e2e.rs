//! End-to-end tests for settlement-split.
//!
//! These tests use a real settlement report in `./test_cases/` and make live
//! vision API calls. They are gated behind the `E2E_ENABLED` environment
//! variable so they do not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=. cargo test --test e2e -- --nocapture

use settlement_split::package::create_zip;
use settlement_split::pipeline::render::{PageSource, PdfiumDocument};
use settlement_split::{split_from_bytes, split_pdf, PageOutcome, SplitConfig, SplitError};
use std::collections::HashSet;
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

fn report_path() -> PathBuf {
    std::env::var("E2E_REPORT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| test_cases_dir().join("settlement_report.pdf"))
}

/// Skip this test if E2E_ENABLED is not set *or* no PDF file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP — test file not found: {}", p.display());
            return;
        }
        p
    }};
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_open_counts_pages() {
    let path = e2e_skip_unless_ready!(report_path());

    let doc = PdfiumDocument::open(&path, None, 4000)
        .await
        .expect("open report");
    assert!(doc.page_count() > 0);

    let single = doc.extract_page(0).await.expect("extract first page");
    assert!(single.starts_with(b"%PDF"));
}

#[tokio::test]
async fn test_full_run() {
    let path = e2e_skip_unless_ready!(report_path());

    let config = SplitConfig::default();
    let output = split_pdf(&path, 1, &config).await.expect("run");

    println!("{}", serde_json::to_string_pretty(&output).unwrap());
    assert_eq!(output.pages.len(), output.stats.total_pages);
    assert_eq!(output.next_sequence, 1 + output.files.len() as u32);

    let names: HashSet<_> = output.files.iter().map(|f| &f.filename).collect();
    assert_eq!(names.len(), output.files.len(), "filenames must be unique");

    for (i, file) in output.files.iter().enumerate() {
        assert_eq!(file.sequence_number, 1 + i as u32);
        assert!(file.filename.ends_with("-order details.pdf"));
        assert!(file.content.starts_with(b"%PDF"));
    }

    let skipped_early = output
        .pages
        .iter()
        .filter(|p| matches!(p.outcome, PageOutcome::SkippedEarly { .. }))
        .count();
    assert!(output.stats.vision_calls + skipped_early <= output.stats.total_pages);

    let zip = create_zip(&output.files).expect("zip");
    assert!(zip.starts_with(b"PK"));
}

#[tokio::test]
async fn test_upload_bytes() {
    let path = e2e_skip_unless_ready!(report_path());
    let bytes = std::fs::read(&path).expect("read report");

    let output = split_from_bytes(&bytes, "report.pdf", 10, &SplitConfig::default())
        .await
        .expect("run");
    if let Some(first) = output.files.first() {
        assert_eq!(first.sequence_number, 10);
    }
}

#[tokio::test]
async fn test_missing_file_is_fatal() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
        return;
    }
    let err = split_pdf(test_cases_dir().join("nope.pdf"), 1, &SplitConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SplitError::FileNotFound { .. }));
}
