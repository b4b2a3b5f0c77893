//! Page classification from the page's own text layer and the model answer.
//!
//! The pre-filter only saves vision calls: a page it lets through is still
//! judged by the post-filter once the model has answered.

use crate::pipeline::response::ModelResponse;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decision for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Process,
    SkipContinuation,
    SkipSummary,
    SkipUnparseable,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Process => "process",
            Verdict::SkipContinuation => "continuation page",
            Verdict::SkipSummary => "summary page",
            Verdict::SkipUnparseable => "no usable AI response",
        };
        f.write_str(s)
    }
}

/// Text markers printed by the settlement report generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMarkers {
    /// Present on the end-of-report summary page.
    pub summary: String,
    /// Present on every page that carries a payment group total.
    pub payment_group: String,
    /// Header printed only on the first page of each settlement.
    pub primary_header: String,
    /// Footer printed on every page, including continuations.
    pub footer: String,
}

impl Default for PageMarkers {
    fn default() -> Self {
        Self {
            summary: "Summary".to_string(),
            payment_group: "Payment Group".to_string(),
            primary_header: "Fund House :".to_string(),
            footer: "WMC Nominees Ltd".to_string(),
        }
    }
}

/// Decide from the text layer alone whether the page is worth a vision call.
///
/// Summary detection wins over continuation detection. A page with no text
/// layer (scanned image) yields `Process`.
pub fn pre_filter(page_text: &str, markers: &PageMarkers) -> Verdict {
    if page_text.contains(&markers.summary) && !page_text.contains(&markers.payment_group) {
        return Verdict::SkipSummary;
    }
    if !page_text.contains(&markers.primary_header) && page_text.contains(&markers.footer) {
        return Verdict::SkipContinuation;
    }
    Verdict::Process
}

/// Combine the pre-filter outcome with the parsed model answer.
pub fn post_filter(pre: Verdict, response: &ModelResponse) -> Verdict {
    match response {
        ModelResponse::Empty | ModelResponse::Malformed(_) => Verdict::SkipUnparseable,
        ModelResponse::Object(_) => pre,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn markers() -> PageMarkers {
        PageMarkers::default()
    }

    #[test]
    fn primary_page_is_processed() {
        let text = "Fund House : ABC\nPayment Group 12 Total 1,234.56\nWMC Nominees Ltd";
        assert_eq!(pre_filter(text, &markers()), Verdict::Process);
    }

    #[test]
    fn summary_without_payment_group_is_skipped() {
        let text = "Settlement Summary\nUSD 10,000.00\nHKD 3,000.00\nWMC Nominees Ltd";
        assert_eq!(pre_filter(text, &markers()), Verdict::SkipSummary);
    }

    #[test]
    fn summary_word_with_payment_group_is_not_a_summary() {
        let text = "Fund House : ABC\nPayment Group 3 Summary\nWMC Nominees Ltd";
        assert_eq!(pre_filter(text, &markers()), Verdict::Process);
    }

    #[test]
    fn footer_without_header_is_continuation() {
        let text = "Trade 4 ... Trade 9\nPayment Group 3 Total 88.00\nWMC Nominees Ltd";
        assert_eq!(pre_filter(text, &markers()), Verdict::SkipContinuation);
    }

    #[test]
    fn empty_text_layer_is_processed() {
        assert_eq!(pre_filter("", &markers()), Verdict::Process);
    }

    #[test]
    fn custom_markers_are_honoured() {
        let m = PageMarkers {
            footer: "Custodian Footer".into(),
            ..PageMarkers::default()
        };
        assert_eq!(pre_filter("Custodian Footer", &m), Verdict::SkipContinuation);
        assert_eq!(pre_filter("WMC Nominees Ltd", &m), Verdict::Process);
    }

    #[test]
    fn post_filter_overrides_on_empty_or_malformed() {
        assert_eq!(
            post_filter(Verdict::Process, &ModelResponse::Empty),
            Verdict::SkipUnparseable
        );
        assert_eq!(
            post_filter(Verdict::Process, &ModelResponse::Malformed("eof".into())),
            Verdict::SkipUnparseable
        );
    }

    #[test]
    fn post_filter_keeps_pre_verdict_on_object() {
        let mut map = Map::new();
        map.insert("currency".into(), "USD".into());
        assert_eq!(
            post_filter(Verdict::Process, &ModelResponse::Object(map)),
            Verdict::Process
        );
    }
}
