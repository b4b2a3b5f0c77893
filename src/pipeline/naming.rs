//! Sequence numbering and output filenames.
//!
//! The date stamp is fixed when the run starts and the counter only moves on
//! acceptance, so every filename in a run is distinct even when two pages
//! share a fund house and currency.

use crate::error::SplitError;
use crate::output::GeneratedFile;
use crate::pipeline::validate::{sanitize_filename, ExtractionResult};
use chrono::NaiveDate;

/// First sequence number for a run that follows `last_sequence`.
///
/// `None` or `Some(0)` means no prior sequence was used. `u32::MAX` has no
/// successor and is rejected.
pub fn start_sequence_after(last_sequence: Option<u32>) -> Result<u32, SplitError> {
    match last_sequence {
        Some(last) if last > 0 => last.checked_add(1).ok_or_else(|| {
            SplitError::InvalidConfig(format!(
                "last sequence {last} is the largest supported; no number follows it"
            ))
        }),
        _ => Ok(1),
    }
}

/// `S<YYMMDD>-<seq>_<name>_<currency>-order details.pdf`, sequence padded to two digits.
pub fn output_filename(run_date: NaiveDate, sequence: u32, name: &str, currency: &str) -> String {
    format!(
        "S{}-{:02}_{}_{}-order details.pdf",
        run_date.format("%y%m%d"),
        sequence,
        sanitize_filename(name),
        sanitize_filename(currency)
    )
}

/// Mutable state of one run, owned by the orchestrator.
#[derive(Debug, Clone)]
pub struct RunState {
    pub start_sequence: u32,
    pub current_sequence: u32,
    pub run_date: NaiveDate,
    pub results: Vec<GeneratedFile>,
}

impl RunState {
    /// State for a run of at most `max_pages` acceptances.
    ///
    /// Fails when `start_sequence` is 0 or when `start_sequence + max_pages`
    /// does not fit in a `u32`, so [`accept`](Self::accept) can never wrap.
    pub fn new(
        start_sequence: u32,
        run_date: NaiveDate,
        max_pages: usize,
    ) -> Result<Self, SplitError> {
        if start_sequence == 0 {
            return Err(SplitError::InvalidConfig(
                "start sequence must be ≥ 1".into(),
            ));
        }
        u32::try_from(max_pages)
            .ok()
            .and_then(|n| start_sequence.checked_add(n))
            .ok_or_else(|| {
                SplitError::InvalidConfig(format!(
                    "start sequence {start_sequence} leaves no room for {max_pages} pages"
                ))
            })?;

        Ok(Self {
            start_sequence,
            current_sequence: start_sequence,
            run_date,
            results: Vec::new(),
        })
    }

    /// Record an accepted page and advance the counter by exactly one.
    pub fn accept(
        &mut self,
        page_index: usize,
        extraction: ExtractionResult,
        content: Vec<u8>,
    ) -> &GeneratedFile {
        let sequence_number = self.current_sequence;
        let filename = output_filename(
            self.run_date,
            sequence_number,
            &extraction.simplified_name,
            &extraction.currency,
        );

        self.results.push(GeneratedFile {
            filename,
            content,
            simplified_name: extraction.simplified_name,
            currency: extraction.currency,
            payment_total: extraction.payment_total,
            sequence_number,
            page_index,
            needs_review: extraction.needs_review,
        });
        self.current_sequence = self.current_sequence.saturating_add(1);

        &self.results[self.results.len() - 1]
    }

    /// The first sequence number this run has not used.
    pub fn next_sequence(&self) -> u32 {
        self.current_sequence
    }
}
