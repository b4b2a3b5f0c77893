//! CLI binary for settlement-split.
//!
//! A thin shim over the library crate that maps CLI flags to `SplitConfig`,
//! runs the split, then writes, zips and drafts the generated files.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use settlement_split::draft::{create_drafts, GmailDrafts};
use settlement_split::package::{
    create_zip, download_label, group_by_currency, write_atomic, write_files,
};
use settlement_split::{
    split_pdf, start_sequence_after, Credentials, PageOutcome, ProgressCallback, RunOutput,
    SplitConfig, SplitProgressCallback,
};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Progress bar plus one log line per page.
struct CliProgressCallback {
    bar: ProgressBar,
    failures: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            failures: AtomicUsize::new(0),
        })
    }
}

impl SplitProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_pages: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} pages  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_pages as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Splitting");
    }

    fn on_page(&self, _page_index: usize, _total_pages: usize, status: &str) {
        self.bar.set_message(status.to_string());
    }

    fn on_page_done(&self, page_index: usize, total_pages: usize, outcome: &PageOutcome) {
        let mark = match outcome {
            PageOutcome::Accepted { .. } => green("✓"),
            PageOutcome::Failed { .. } => {
                self.failures.fetch_add(1, Ordering::SeqCst);
                red("✗")
            }
            PageOutcome::Rejected { .. } => yellow("!"),
            _ => dim("·"),
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            mark,
            page_index + 1,
            total_pages,
            outcome.describe()
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total_pages: usize, accepted: usize) {
        self.bar.finish_and_clear();
        let failed = self.failures.load(Ordering::SeqCst);
        eprintln!(
            "{} {} files from {} pages{}",
            if failed == 0 { green("✔") } else { yellow("⚠") },
            bold(&accepted.to_string()),
            total_pages,
            if failed == 0 {
                String::new()
            } else {
                format!("  ({} pages failed)", red(&failed.to_string()))
            }
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Split today's report; files land in the current directory
  settlement-split report.pdf

  # Continue numbering after yesterday's run ended at 07
  settlement-split --last-sequence 7 report.pdf -o out/

  # One ZIP of everything, plus a Gmail draft per file
  settlement-split report.pdf --zip settlements.zip \
      --drafts --draft-to desk@example.com --gmail-token "$(gcloud auth print-access-token)"

  # Use a Gemini key directly
  settlement-split --gemini-key AIza... report.pdf

  # Machine-readable summary
  settlement-split --json report.pdf > run.json

FILENAMES:
  S<YYMMDD>-<seq>_<name>_<currency>-order details.pdf
  e.g. S261017-01_ABC Fund_USD-order details.pdf

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (auto-detected)
  OPENAI_API_KEY          OpenAI API key (auto-detected)
  ANTHROPIC_API_KEY       Anthropic API key (auto-detected)
  EDGEQUAKE_LLM_PROVIDER  Override provider (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL         Override model ID
  GMAIL_ACCESS_TOKEN      OAuth token used by --drafts
  PDFIUM_LIB_PATH         Path to libpdfium if it is not on the library path
"#;

/// Split settlement-report PDFs into one file per settlement.
#[derive(Parser, Debug)]
#[command(
    name = "settlement-split",
    version,
    about = "Split settlement-report PDFs into one named PDF per settlement using Vision LLMs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Settlement report PDF.
    input: PathBuf,

    /// Last sequence number already used today (0 = none).
    #[arg(short = 'l', long, env = "SETTLEMENT_LAST_SEQUENCE", default_value_t = 0)]
    last_sequence: u32,

    /// Directory for the generated PDFs. Default: current directory, unless --zip is given.
    #[arg(short, long, env = "SETTLEMENT_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Also (or only) write all generated files into this ZIP.
    #[arg(long)]
    zip: Option<PathBuf>,

    /// Create one Gmail draft per generated file.
    #[arg(long)]
    drafts: bool,

    /// Draft recipients (comma-separated).
    #[arg(long, value_delimiter = ',', env = "SETTLEMENT_DRAFT_TO")]
    draft_to: Vec<String>,

    /// Gmail OAuth access token for --drafts.
    #[arg(long, env = "GMAIL_ACCESS_TOKEN", hide_env_values = true)]
    gmail_token: Option<String>,

    /// Vision model ID (e.g. gemini-2.0-flash, gpt-4.1-mini).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Vision provider: gemini, openai, anthropic, ollama.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Gemini API key; calls Gemini directly instead of auto-detecting.
    #[arg(long, env = "SETTLEMENT_GEMINI_KEY", hide_env_values = true)]
    gemini_key: Option<String>,

    /// Page zoom factor for the vision model (1.0–8.0).
    #[arg(long, default_value_t = 4.0)]
    scale: f32,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "SETTLEMENT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Retries per page on vision failure (0–10).
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u32).range(0..=10))]
    max_retries: u32,

    /// Date stamped into filenames (YYYY-MM-DD). Default: today.
    #[arg(long, value_parser = parse_run_date)]
    run_date: Option<NaiveDate>,

    /// Print the run result as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

fn parse_run_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level logs unless --verbose is set.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let gmail = if cli.drafts {
        let token = cli
            .gmail_token
            .clone()
            .context("--drafts needs --gmail-token or GMAIL_ACCESS_TOKEN")?;
        Some(GmailDrafts::new(token).context("Invalid Gmail configuration")?)
    } else {
        None
    };

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn SplitProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run ──────────────────────────────────────────────────────────────
    let start_sequence =
        start_sequence_after(Some(cli.last_sequence)).context("Invalid --last-sequence")?;
    let output = split_pdf(&cli.input, start_sequence, &config)
        .await
        .context("Split failed")?;

    // ── Ship ─────────────────────────────────────────────────────────────
    let output_dir = match (&cli.output_dir, &cli.zip) {
        (Some(dir), _) => Some(dir.clone()),
        (None, None) => Some(PathBuf::from(".")),
        (None, Some(_)) => None,
    };
    if let Some(ref dir) = output_dir {
        write_files(&output.files, dir)
            .await
            .context("Failed to write generated files")?;
    }
    if let Some(ref zip_path) = cli.zip {
        let bytes = create_zip(&output.files).context("Failed to build ZIP")?;
        write_atomic(zip_path, &bytes)
            .await
            .context("Failed to write ZIP")?;
    }

    let mut draft_failures = 0;
    if let Some(ref mailer) = gmail {
        for outcome in create_drafts(mailer, &output.files, &cli.draft_to).await {
            match outcome.result {
                Ok(id) if !cli.quiet && !cli.json => {
                    eprintln!("  {} draft {}  {}", green("✉"), dim(&id), outcome.filename)
                }
                Ok(_) => {}
                Err(e) => {
                    draft_failures += 1;
                    eprintln!("  {} draft failed for {}: {}", red("✗"), outcome.filename, e);
                }
            }
        }
    }

    // ── Report ───────────────────────────────────────────────────────────
    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&cli, &output, output_dir.as_ref());
    }

    if draft_failures > 0 {
        anyhow::bail!("{draft_failures} email drafts could not be created");
    }
    Ok(())
}

/// Map CLI args to `SplitConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<SplitConfig> {
    let mut builder = SplitConfig::builder()
        .render_scale(cli.scale)
        .max_retries(cli.max_retries);

    if let Some(ref key) = cli.gemini_key {
        builder = builder.credentials(Credentials::GeminiKey(key.clone()));
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(date) = cli.run_date {
        builder = builder.run_date(date);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(cli: &Cli, output: &RunOutput, output_dir: Option<&PathBuf>) {
    if output.files.is_empty() {
        eprintln!("{} No settlement pages found.", yellow("⚠"));
    }

    for (currency, files) in group_by_currency(&output.files) {
        eprintln!("\n{}", bold(&format!("{currency} files:")));
        for file in files {
            let flag = if file.needs_review {
                yellow("  (check name)")
            } else {
                String::new()
            };
            eprintln!("  {}{}", download_label(&file.filename), flag);
        }
    }

    eprintln!();
    if let Some(dir) = output_dir {
        eprintln!("Written to {}", bold(&dir.display().to_string()));
    }
    if let Some(ref zip) = cli.zip {
        eprintln!("ZIP: {}", bold(&zip.display().to_string()));
    }
    eprintln!(
        "{}  {} vision calls, {}ms",
        dim(&format!(
            "{} accepted / {} skipped / {} rejected / {} failed",
            output.stats.accepted_pages,
            output.stats.skipped_pages,
            output.stats.rejected_pages,
            output.stats.failed_pages
        )),
        output.stats.vision_calls,
        output.stats.total_duration_ms,
    );
    eprintln!(
        "Next run: --last-sequence {}",
        bold(&output.next_sequence.saturating_sub(1).to_string())
    );
}
