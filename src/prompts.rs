//! Prompt sent with every rendered page.
//!
//! Callers can override it via [`crate::config::SplitConfig::prompt`]. The
//! special-case names listed here must stay in step with
//! [`crate::pipeline::validate::simplify_name`], which re-applies the rule to
//! whatever the model returns.

/// Default extraction prompt for one settlement-report page image.
pub const EXTRACTION_PROMPT: &str = r#"From the document image, extract the following information.
The document is a fund house settlement report. Each page represents a settlement for a fund house, except for continuation or summary pages.

1.  **Fund Hse Settlement Inst**: Find the text following "Fund Hse Settlement Inst :".
    - If it contains a dash ('-'), take only the part BEFORE the first dash.
    - Special Cases (use the name after the arrow):
      - "ICBC(Asia) Trustee Company Limited - GaoTeng" -> "GaoTeng"
      - "State Street Fund Services (Ireland) Limited - Barings" -> "Barings"
      - "UI efa S.A. - Nevastar" -> "Nevastar"
      - "MFEX - BlackRock" -> "MFEX"

2.  **Currency**: Find the 3-letter code following "Currency :".

3.  **Payment Group Total**: Find the numerical value following "Payment Group [ID] Total".

If you cannot find these fields (e.g., on a continuation or summary page), return an empty JSON object.

RETURN A JSON OBJECT. Your response must be only the JSON, like this:
{
    "simplified_name": "Extracted and simplified name",
    "currency": "e.g., USD",
    "payment_total": "e.g., 31510.97"
}"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_names_every_required_key() {
        for key in ["simplified_name", "currency", "payment_total"] {
            assert!(EXTRACTION_PROMPT.contains(key), "prompt missing {key}");
        }
    }

    #[test]
    fn prompt_asks_for_empty_object_on_skip_pages() {
        assert!(EXTRACTION_PROMPT.contains("empty JSON object"));
    }
}
