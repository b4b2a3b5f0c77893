//! Field validation and normalisation of a parsed model answer.
//!
//! The prompt asks the model to simplify fund-house names itself, but models
//! comply only partially, so the same rule is applied again here. Applying it
//! to an already simplified name is a no-op.

use crate::error::Rejection;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;
use tracing::warn;

/// Validated fields for one settlement page.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionResult {
    /// Simplified and filename-safe.
    pub simplified_name: String,
    /// Trimmed, uppercased.
    pub currency: String,
    pub payment_total: Decimal,
    /// See [`SimplifiedName::needs_review`].
    pub needs_review: bool,
}

/// A fund-house name mapped to a fixed short name.
struct SpecialCase {
    all_of: &'static [&'static str],
    name: &'static str,
}

const SPECIAL_CASES: &[SpecialCase] = &[
    SpecialCase {
        all_of: &["ICBC(Asia) Trustee Company Limited", "GaoTeng"],
        name: "GaoTeng",
    },
    SpecialCase {
        all_of: &["State Street Fund Services (Ireland) Limited", "Barings"],
        name: "Barings",
    },
    SpecialCase {
        all_of: &["UI efa S.A.", "Nevastar"],
        name: "Nevastar",
    },
    SpecialCase {
        all_of: &["MFEX", "-"],
        name: "MFEX",
    },
];

/// Output of [`simplify_name`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimplifiedName {
    pub name: String,
    /// The raw name had a dash but matched no special case, so the pre-dash
    /// substring was used. New fund houses show up this way.
    pub needs_review: bool,
}

/// Apply the fund-house name rule.
pub fn simplify_name(raw: &str) -> SimplifiedName {
    let raw = raw.trim();

    if let Some(case) = SPECIAL_CASES
        .iter()
        .find(|case| case.all_of.iter().all(|needle| raw.contains(needle)))
    {
        return SimplifiedName {
            name: case.name.to_string(),
            needs_review: false,
        };
    }

    match raw.split_once('-') {
        Some((head, _)) => SimplifiedName {
            name: head.trim().to_string(),
            needs_review: true,
        },
        None => SimplifiedName {
            name: raw.to_string(),
            needs_review: false,
        },
    }
}

static ILLEGAL_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[<>:"/\\|?*]"#).expect("valid regex"));

/// Replace characters that are illegal in filenames with `_`.
pub fn sanitize_filename(name: &str) -> String {
    ILLEGAL_FILENAME_CHARS.replace_all(name, "_").into_owned()
}

/// Turn a parsed model object into an [`ExtractionResult`].
pub fn validate(fields: &Map<String, Value>) -> Result<ExtractionResult, Rejection> {
    let raw_name = required_str(fields, "simplified_name")?;
    let simplified = simplify_name(raw_name);
    if simplified.name.is_empty() {
        return Err(Rejection::EmptyName {
            raw: raw_name.to_string(),
        });
    }
    if simplified.needs_review {
        warn!(
            "Name {:?} matched no special case; using {:?} (flagged for review)",
            raw_name, simplified.name
        );
    }

    let currency = required_str(fields, "currency")?.trim().to_uppercase();

    let total = fields
        .get("payment_total")
        .ok_or_else(|| Rejection::MissingField("payment_total".to_string()))?;
    let payment_total = parse_total(total)?;

    Ok(ExtractionResult {
        simplified_name: sanitize_filename(&simplified.name),
        currency,
        payment_total,
        needs_review: simplified.needs_review,
    })
}

/// Fetch a non-blank string field.
fn required_str<'a>(fields: &'a Map<String, Value>, key: &str) -> Result<&'a str, Rejection> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| Rejection::MissingField(key.to_string()))
}

/// Parse a total given as a string (`"31,510.97"`) or a JSON number.
fn parse_total(value: &Value) -> Result<Decimal, Rejection> {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Null => return Err(Rejection::MissingField("payment_total".to_string())),
        other => {
            return Err(Rejection::InvalidTotal {
                raw: other.to_string(),
            })
        }
    };

    let cleaned: String = raw
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return Err(Rejection::MissingField("payment_total".to_string()));
    }

    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .map_err(|_| Rejection::InvalidTotal { raw })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(map) => map,
            _ => panic!("test input must be an object"),
        }
    }

    #[test]
    fn dash_name_keeps_prefix() {
        let s = simplify_name("ABC Fund - Trustee");
        assert_eq!(s.name, "ABC Fund");
        assert!(s.needs_review);
    }

    #[test]
    fn mfex_special_case() {
        let s = simplify_name("MFEX - BlackRock");
        assert_eq!(s.name, "MFEX");
        assert!(!s.needs_review);
    }

    #[test]
    fn other_special_cases() {
        assert_eq!(
            simplify_name("ICBC(Asia) Trustee Company Limited - GaoTeng").name,
            "GaoTeng"
        );
        assert_eq!(
            simplify_name("State Street Fund Services (Ireland) Limited - Barings").name,
            "Barings"
        );
        assert_eq!(simplify_name("UI efa S.A. - Nevastar").name, "Nevastar");
    }

    #[test]
    fn simplification_is_idempotent() {
        for raw in [
            "ABC Fund - Trustee",
            "MFEX - BlackRock",
            "ICBC(Asia) Trustee Company Limited - GaoTeng",
            "Plain Name",
            "A-B-C",
            "  padded - name  ",
        ] {
            let once = simplify_name(raw).name;
            let twice = simplify_name(&once).name;
            assert_eq!(once, twice, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn sanitize_replaces_illegal_chars() {
        assert_eq!(sanitize_filename(r#"a<b>c:d"e/f\g|h?i*j"#), "a_b_c_d_e_f_g_h_i_j");
        assert_eq!(sanitize_filename("Fine Name"), "Fine Name");
    }

    #[test]
    fn validate_full_answer() {
        let fields = object(json!({
            "simplified_name": "ABC Fund - Trustee",
            "currency": " usd ",
            "payment_total": "1,234.56"
        }));
        let r = validate(&fields).unwrap();
        assert_eq!(r.simplified_name, "ABC Fund");
        assert_eq!(r.currency, "USD");
        assert_eq!(r.payment_total, Decimal::new(123456, 2));
    }

    #[test]
    fn numeric_total_is_accepted() {
        let fields = object(json!({
            "simplified_name": "Barings",
            "currency": "EUR",
            "payment_total": 31510.97
        }));
        assert_eq!(
            validate(&fields).unwrap().payment_total,
            Decimal::from_str("31510.97").unwrap()
        );
    }

    #[test]
    fn missing_fields_are_rejected() {
        let fields = object(json!({ "currency": "USD", "payment_total": "1" }));
        assert_eq!(
            validate(&fields),
            Err(Rejection::MissingField("simplified_name".into()))
        );

        let fields = object(json!({ "simplified_name": "X", "currency": "  ", "payment_total": "1" }));
        assert_eq!(
            validate(&fields),
            Err(Rejection::MissingField("currency".into()))
        );

        let fields = object(json!({ "simplified_name": "X", "currency": "USD" }));
        assert_eq!(
            validate(&fields),
            Err(Rejection::MissingField("payment_total".into()))
        );
    }

    #[test]
    fn unparseable_total_is_rejected() {
        let fields = object(json!({
            "simplified_name": "X",
            "currency": "USD",
            "payment_total": "about twelve"
        }));
        assert!(matches!(
            validate(&fields),
            Err(Rejection::InvalidTotal { .. })
        ));
    }

    #[test]
    fn leading_dash_name_is_rejected() {
        let fields = object(json!({
            "simplified_name": "- Trustee",
            "currency": "USD",
            "payment_total": "1.00"
        }));
        assert!(matches!(validate(&fields), Err(Rejection::EmptyName { .. })));
    }

    #[test]
    fn non_string_name_is_missing() {
        let fields = object(json!({
            "simplified_name": 42,
            "currency": "USD",
            "payment_total": "1.00"
        }));
        assert_eq!(
            validate(&fields),
            Err(Rejection::MissingField("simplified_name".into()))
        );
    }
}
