//! Email drafts for generated settlement files.
//!
//! One draft per file, addressed to the settlement desk, with the single-page
//! PDF attached and the currency and payment total in the subject and body.
//! Drafts are created after the run; a failed draft is reported against its
//! file and never affects the file or the other drafts.

use crate::error::DraftError;
use crate::output::GeneratedFile;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine as _;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use std::future::Future;
use tracing::{info, warn};

const GMAIL_DRAFTS_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me/drafts";
const MIXED_BOUNDARY: &str = "settlement-split-mixed";
const ALT_BOUNDARY: &str = "settlement-split-alt";

// ── Template ─────────────────────────────────────────────────────────────

/// `1234567.8` → `"1,234,567.80"`.
pub fn format_amount(amount: &Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}{grouped}.{frac_part}")
}

/// Subject, plain-text body and HTML body for one settlement file.
pub fn settlement_template(currency: &str, payment_total: &Decimal) -> (String, String, String) {
    let amount = format_amount(payment_total);

    let subject = format!("Settlement Instruction - {currency} {amount}");
    let body = format!(
        "Dear Team,\r\n\r\n\
         Please find attached the order details for settlement.\r\n\r\n\
         Currency: {currency}\r\n\
         Payment Total: {currency} {amount}\r\n\r\n\
         Kindly arrange payment on the settlement date.\r\n\r\n\
         Best regards"
    );
    let html_body = format!(
        "<html><body>\
         <p>Dear Team,</p>\
         <p>Please find attached the order details for settlement.</p>\
         <table>\
         <tr><td><b>Currency:</b></td><td>{currency}</td></tr>\
         <tr><td><b>Payment Total:</b></td><td>{currency} {amount}</td></tr>\
         </table>\
         <p>Kindly arrange payment on the settlement date.</p>\
         <p>Best regards</p>\
         </body></html>"
    );

    (subject, body, html_body)
}

// ── Message ──────────────────────────────────────────────────────────────

/// A ready-to-send draft with one PDF attachment.
#[derive(Debug, Clone)]
pub struct EmailDraft {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    pub html_body: String,
    pub attachment_name: String,
    pub attachment: Vec<u8>,
}

impl EmailDraft {
    pub fn for_file(file: &GeneratedFile, recipients: &[String]) -> Self {
        let (subject, body, html_body) = settlement_template(&file.currency, &file.payment_total);
        Self {
            to: recipients.to_vec(),
            subject,
            body,
            html_body,
            attachment_name: file.filename.clone(),
            attachment: file.content.clone(),
        }
    }

    /// Render as an RFC 822 `multipart/mixed` message with CRLF line endings.
    pub fn to_mime(&self) -> String {
        let mut m = String::new();
        if !self.to.is_empty() {
            m.push_str(&format!("To: {}\r\n", self.to.join(", ")));
        }
        m.push_str(&format!("Subject: {}\r\n", encode_header(&self.subject)));
        m.push_str("MIME-Version: 1.0\r\n");
        m.push_str(&format!(
            "Content-Type: multipart/mixed; boundary=\"{MIXED_BOUNDARY}\"\r\n\r\n"
        ));

        m.push_str(&format!("--{MIXED_BOUNDARY}\r\n"));
        m.push_str(&format!(
            "Content-Type: multipart/alternative; boundary=\"{ALT_BOUNDARY}\"\r\n\r\n"
        ));
        push_part(
            &mut m,
            ALT_BOUNDARY,
            "text/plain; charset=\"UTF-8\"",
            None,
            self.body.as_bytes(),
        );
        push_part(
            &mut m,
            ALT_BOUNDARY,
            "text/html; charset=\"UTF-8\"",
            None,
            self.html_body.as_bytes(),
        );
        m.push_str(&format!("--{ALT_BOUNDARY}--\r\n"));

        let name = self.attachment_name.replace('"', "'");
        push_part(
            &mut m,
            MIXED_BOUNDARY,
            &format!("application/pdf; name=\"{name}\""),
            Some(&format!("attachment; filename=\"{name}\"")),
            &self.attachment,
        );
        m.push_str(&format!("--{MIXED_BOUNDARY}--\r\n"));
        m
    }
}

fn push_part(
    m: &mut String,
    boundary: &str,
    content_type: &str,
    disposition: Option<&str>,
    data: &[u8],
) {
    m.push_str(&format!("--{boundary}\r\n"));
    m.push_str(&format!("Content-Type: {content_type}\r\n"));
    if let Some(d) = disposition {
        m.push_str(&format!("Content-Disposition: {d}\r\n"));
    }
    m.push_str("Content-Transfer-Encoding: base64\r\n\r\n");
    let encoded = STANDARD.encode(data);
    // RFC 2045 caps encoded lines at 76 characters.
    for chunk in encoded.as_bytes().chunks(76) {
        m.push_str(std::str::from_utf8(chunk).unwrap_or_default());
        m.push_str("\r\n");
    }
}

/// RFC 2047 encoded-word for non-ASCII header values.
fn encode_header(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(value.as_bytes()))
    }
}

// ── Mailer ───────────────────────────────────────────────────────────────

/// Anything that can store a draft and hand back its id.
pub trait DraftMailer {
    fn create_draft(&self, draft: &EmailDraft)
        -> impl Future<Output = Result<String, DraftError>> + Send;
}

/// Gmail drafts API, authenticated with an OAuth access token obtained
/// outside this crate (e.g. `gcloud auth print-access-token`).
pub struct GmailDrafts {
    client: reqwest::Client,
    access_token: String,
    endpoint: String,
}

#[derive(Deserialize)]
struct DraftResponse {
    id: Option<String>,
}

impl GmailDrafts {
    pub fn new(access_token: impl Into<String>) -> Result<Self, DraftError> {
        let access_token = access_token.into().trim().to_string();
        if access_token.is_empty() {
            return Err(DraftError::NotConfigured(
                "Gmail access token is empty".into(),
            ));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            access_token,
            endpoint: GMAIL_DRAFTS_URL.to_string(),
        })
    }
}

impl DraftMailer for GmailDrafts {
    async fn create_draft(&self, draft: &EmailDraft) -> Result<String, DraftError> {
        let raw = URL_SAFE.encode(draft.to_mime().as_bytes());
        let payload = serde_json::json!({ "message": { "raw": raw } });

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DraftError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: DraftResponse = resp.json().await?;
        parsed.id.ok_or(DraftError::MissingId)
    }
}

// ── Batch ────────────────────────────────────────────────────────────────

/// Result of drafting one file.
#[derive(Debug)]
pub struct DraftOutcome {
    pub filename: String,
    pub result: Result<String, DraftError>,
}

/// Create one draft per file, in run order. Every file gets an outcome.
pub async fn create_drafts<M: DraftMailer>(
    mailer: &M,
    files: &[GeneratedFile],
    recipients: &[String],
) -> Vec<DraftOutcome> {
    let mut outcomes = Vec::with_capacity(files.len());
    for file in files {
        let draft = EmailDraft::for_file(file, recipients);
        let result = mailer.create_draft(&draft).await;
        match &result {
            Ok(id) => info!("Draft {} created for {}", id, file.filename),
            Err(e) => warn!("Draft failed for {}: {}", file.filename, e),
        }
        outcomes.push(DraftOutcome {
            filename: file.filename.clone(),
            result,
        });
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use std::sync::Mutex;

    fn file(seq: u32, currency: &str, total: &str) -> GeneratedFile {
        GeneratedFile {
            filename: format!("S261017-{seq:02}_Fund_{currency}-order details.pdf"),
            content: b"%PDF-1.7".to_vec(),
            simplified_name: "Fund".into(),
            currency: currency.into(),
            payment_total: Decimal::from_str(total).unwrap(),
            sequence_number: seq,
            page_index: 0,
            needs_review: false,
        }
    }

    #[test]
    fn amounts_get_separators_and_two_decimals() {
        assert_eq!(format_amount(&Decimal::from_str("1234567.8").unwrap()), "1,234,567.80");
        assert_eq!(format_amount(&Decimal::from_str("999").unwrap()), "999.00");
        assert_eq!(format_amount(&Decimal::from_str("1000.005").unwrap()), "1,000.01");
        assert_eq!(format_amount(&Decimal::from_str("-45000").unwrap()), "-45,000.00");
        assert_eq!(format_amount(&Decimal::ZERO), "0.00");
    }

    #[test]
    fn template_mentions_currency_and_total() {
        let (subject, body, html) =
            settlement_template("USD", &Decimal::from_str("12500.5").unwrap());
        assert!(subject.contains("USD 12,500.50"));
        assert!(body.contains("Payment Total: USD 12,500.50"));
        assert!(html.contains("12,500.50"));
    }

    #[test]
    fn mime_has_both_bodies_and_attachment() {
        let draft = EmailDraft::for_file(&file(1, "EUR", "10"), &["desk@example.com".into()]);
        let mime = draft.to_mime();
        assert!(mime.starts_with("To: desk@example.com\r\n"));
        assert!(mime.contains("multipart/alternative"));
        assert!(mime.contains("text/plain"));
        assert!(mime.contains("text/html"));
        assert!(mime.contains(
            "Content-Disposition: attachment; filename=\"S261017-01_Fund_EUR-order details.pdf\""
        ));
        assert!(mime.contains(&STANDARD.encode(b"%PDF-1.7")));
        assert!(mime.trim_end().ends_with(&format!("--{MIXED_BOUNDARY}--")));
    }

    #[test]
    fn non_ascii_subject_is_encoded() {
        assert_eq!(encode_header("plain"), "plain");
        assert!(encode_header("Règlement").starts_with("=?UTF-8?B?"));
    }

    #[test]
    fn empty_token_is_not_configured() {
        assert!(matches!(
            GmailDrafts::new("  "),
            Err(DraftError::NotConfigured(_))
        ));
    }

    struct FlakyMailer {
        seen: Mutex<Vec<String>>,
    }

    impl DraftMailer for FlakyMailer {
        async fn create_draft(&self, draft: &EmailDraft) -> Result<String, DraftError> {
            let mut seen = self.seen.lock().unwrap();
            seen.push(draft.attachment_name.clone());
            if draft.subject.contains("EUR") {
                Err(DraftError::Api {
                    status: 500,
                    body: "backend error".into(),
                })
            } else {
                Ok(format!("r-{}", seen.len()))
            }
        }
    }

    #[tokio::test]
    async fn one_failure_does_not_block_the_rest() {
        let mailer = FlakyMailer {
            seen: Mutex::new(Vec::new()),
        };
        let files = vec![file(1, "USD", "1"), file(2, "EUR", "2"), file(3, "GBP", "3")];

        let outcomes = create_drafts(&mailer, &files, &[]).await;
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].result.is_ok());
        assert!(matches!(outcomes[1].result, Err(DraftError::Api { status: 500, .. })));
        assert_eq!(outcomes[2].result.as_ref().unwrap(), "r-3");
        assert_eq!(mailer.seen.lock().unwrap().len(), 3);
    }
}
