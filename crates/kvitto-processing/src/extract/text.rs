//! Heuristic text extraction.
//!
//! Pulls the text layer out of the PDF and derives the purchase fields from
//! it: the merchant name from the top lines, the total as the largest
//! amount-shaped number, and the purchase date from the first recognizable
//! date. Receipts without a text layer (pure scans) fail here and stay
//! retryable; use the vision backend for those.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use kvitto_core::models::ExtractedReceipt;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

use super::{ExtractError, ReceiptExtractor};

/// Lines containing these words are assumed to not name the merchant.
const SKIP_KEYWORDS: [&str; 7] = [
    "DATE", "INVOICE", "TOTAL", "CHARGE", "FEE", "BALANCE", "AMOUNT",
];

/// How many of the top lines are considered merchant candidates.
const MERCHANT_CANDIDATE_LINES: usize = 10;

static AMOUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-9][0-9,]*\.[0-9]{2})").expect("amount regex"));
static DATE_SLASH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{2,4})\b").expect("slash date regex"));
static DATE_ISO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").expect("iso date regex"));

/// Text-layer extraction backend.
#[derive(Clone, Default)]
pub struct TextExtractor;

impl TextExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ReceiptExtractor for TextExtractor {
    fn name(&self) -> &'static str {
        "text"
    }

    async fn extract(&self, data: &[u8]) -> Result<ExtractedReceipt, ExtractError> {
        let data = data.to_vec();
        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&data))
            .await
            .map_err(|e| ExtractError::Backend(format!("text extraction task failed: {}", e)))?
            .map_err(|e| ExtractError::TextExtraction(e.to_string()))?;

        parse_receipt_text(&text)
    }
}

/// Derive the purchase fields from extracted text.
pub fn parse_receipt_text(text: &str) -> Result<ExtractedReceipt, ExtractError> {
    if text.trim().is_empty() {
        return Err(ExtractError::NoTextContent);
    }

    Ok(ExtractedReceipt {
        merchant_name: merchant_name(text),
        total_amount: total_amount(text),
        purchased_at: purchase_date(text).unwrap_or_else(Utc::now),
    })
}

fn merchant_name(text: &str) -> String {
    let candidates: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(MERCHANT_CANDIDATE_LINES)
        .collect();

    let acceptable = |line: &str| {
        !SKIP_KEYWORDS
            .iter()
            .any(|kw| line.to_uppercase().contains(kw))
    };

    // Prefer short upper- or title-cased lines; those usually carry the name.
    for line in candidates.iter().copied().filter(|l| acceptable(l)) {
        if (is_upper_case(line) || is_title_case(line)) && line.len() > 3 && line.len() < 40 {
            return line.replace('*', "").trim().to_string();
        }
    }

    // Fallback: first non-skipped line.
    if let Some(line) = candidates.iter().copied().find(|l| acceptable(l)) {
        return line.to_string();
    }

    "Unknown".to_string()
}

fn is_upper_case(line: &str) -> bool {
    let mut has_alpha = false;
    for c in line.chars().filter(|c| c.is_alphabetic()) {
        has_alpha = true;
        if !c.is_uppercase() {
            return false;
        }
    }
    has_alpha
}

fn is_title_case(line: &str) -> bool {
    let mut words = 0;
    for word in line.split_whitespace() {
        let mut chars = word.chars().filter(|c| c.is_alphabetic());
        let Some(first) = chars.next() else {
            continue;
        };
        words += 1;
        if !first.is_uppercase() || chars.any(|c| c.is_uppercase()) {
            return false;
        }
    }
    words > 0
}

/// Largest amount-shaped number anywhere in the text; receipts repeat
/// subtotals and line items, and the grand total dominates them.
fn total_amount(text: &str) -> Decimal {
    AMOUNT_RE
        .captures_iter(text)
        .filter_map(|caps| Decimal::from_str(&caps[1].replace(',', "")).ok())
        .max()
        .unwrap_or(Decimal::ZERO)
}

fn purchase_date(text: &str) -> Option<DateTime<Utc>> {
    if let Some(caps) = DATE_SLASH_RE.captures(text) {
        // day/month/year order
        let day: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let mut year: i32 = caps[3].parse().ok()?;
        if year < 100 {
            year += 2000;
        }
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }

    if let Some(caps) = DATE_ISO_RE.captures(text) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    const RECEIPT_TEXT: &str = "\
GREEN GROCER
123 Market Street
Date: 12/05/2024
Apples              3.20
Bread               2.80
TOTAL              42.50
Thank you for shopping!";

    #[test]
    fn test_merchant_is_first_uppercase_line() {
        let extracted = parse_receipt_text(RECEIPT_TEXT).unwrap();
        assert_eq!(extracted.merchant_name, "GREEN GROCER");
    }

    #[test]
    fn test_merchant_skips_keyword_lines() {
        let text = "TOTAL DUE\nCOFFEE HOUSE\nitems...";
        let extracted = parse_receipt_text(text).unwrap();
        assert_eq!(extracted.merchant_name, "COFFEE HOUSE");
    }

    #[test]
    fn test_merchant_title_case_accepted() {
        let text = "Corner Bakery\n1 Main St\n12.00";
        let extracted = parse_receipt_text(text).unwrap();
        assert_eq!(extracted.merchant_name, "Corner Bakery");
    }

    #[test]
    fn test_merchant_strips_decoration() {
        let text = "*** SUPERMART ***\nsomething";
        let extracted = parse_receipt_text(text).unwrap();
        assert_eq!(extracted.merchant_name, "SUPERMART");
    }

    #[test]
    fn test_merchant_fallback_first_line() {
        let text = "a very long lowercase header line that no heuristic likes\n9.99";
        let extracted = parse_receipt_text(text).unwrap();
        assert_eq!(
            extracted.merchant_name,
            "a very long lowercase header line that no heuristic likes"
        );
    }

    #[test]
    fn test_total_is_largest_amount() {
        let extracted = parse_receipt_text(RECEIPT_TEXT).unwrap();
        assert_eq!(extracted.total_amount, Decimal::from_str("42.50").unwrap());
    }

    #[test]
    fn test_total_handles_thousands_separator() {
        let text = "BIG STORE\nTOTAL 1,234.56";
        let extracted = parse_receipt_text(text).unwrap();
        assert_eq!(
            extracted.total_amount,
            Decimal::from_str("1234.56").unwrap()
        );
    }

    #[test]
    fn test_total_defaults_to_zero_without_amounts() {
        let text = "CORNER SHOP\nno numbers here";
        let extracted = parse_receipt_text(text).unwrap();
        assert_eq!(extracted.total_amount, Decimal::ZERO);
    }

    #[test]
    fn test_slash_date_parsed_day_first() {
        let extracted = parse_receipt_text(RECEIPT_TEXT).unwrap();
        assert_eq!(extracted.purchased_at.day(), 12);
        assert_eq!(extracted.purchased_at.month(), 5);
        assert_eq!(extracted.purchased_at.year(), 2024);
    }

    #[test]
    fn test_iso_date_parsed() {
        let text = "CORNER SHOP\n2024-05-12\n9.99";
        let extracted = parse_receipt_text(text).unwrap();
        assert_eq!(extracted.purchased_at.year(), 2024);
        assert_eq!(extracted.purchased_at.month(), 5);
        assert_eq!(extracted.purchased_at.day(), 12);
    }

    #[test]
    fn test_two_digit_year_expanded() {
        let text = "CORNER SHOP\n12/05/24\n9.99";
        let extracted = parse_receipt_text(text).unwrap();
        assert_eq!(extracted.purchased_at.year(), 2024);
    }

    #[test]
    fn test_missing_date_falls_back_to_now() {
        let text = "CORNER SHOP\n9.99";
        let before = Utc::now();
        let extracted = parse_receipt_text(text).unwrap();
        assert!(extracted.purchased_at >= before);
    }

    #[test]
    fn test_empty_text_is_no_content() {
        assert!(matches!(
            parse_receipt_text("   \n  "),
            Err(ExtractError::NoTextContent)
        ));
    }

    #[test]
    fn test_result_is_well_formed() {
        let extracted = parse_receipt_text(RECEIPT_TEXT).unwrap();
        assert!(extracted.well_formed().is_ok());
    }
}
