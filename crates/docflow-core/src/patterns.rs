//! Shared text patterns for classification, validation, and routing.
//!
//! Date shapes, currency cleanup, and the keyword table used when the
//! completion service gives an unusable classification.

use lazy_static::lazy_static;
use regex::Regex;

use crate::types::DocumentType;

lazy_static! {
    // =========================================================================
    // DATE PATTERNS (matched at the start of the trimmed value)
    // =========================================================================

    /// D/D/Y with 1-2 digit day/month and 2-4 digit year
    pub static ref SLASH_DATE_PATTERN: Regex = Regex::new(
        r"^\d{1,2}/\d{1,2}/\d{2,4}"
    ).unwrap();

    /// D-D-Y with 1-2 digit day/month and 2-4 digit year
    pub static ref DASH_DATE_PATTERN: Regex = Regex::new(
        r"^\d{1,2}-\d{1,2}-\d{2,4}"
    ).unwrap();

    /// Y-D-D, ISO-like
    pub static ref ISO_DATE_PATTERN: Regex = Regex::new(
        r"^\d{4}-\d{1,2}-\d{1,2}"
    ).unwrap();

    /// "Month D, YYYY"
    pub static ref TEXTUAL_DATE_PATTERN: Regex = Regex::new(
        r"^\w+ \d{1,2}, \d{4}"
    ).unwrap();

    // =========================================================================
    // AMOUNT CLEANUP
    // =========================================================================

    /// Currency symbols and thousands separators
    pub static ref CURRENCY_NOISE_PATTERN: Regex = Regex::new(
        r"[$€£¥,]"
    ).unwrap();

    // =========================================================================
    // CLASSIFICATION KEYWORDS (checked in order, first hit wins)
    // =========================================================================

    pub static ref KEYWORD_TABLE: Vec<(DocumentType, Regex)> = vec![
        (DocumentType::Invoice, Regex::new(r"(?i)invoice|bill").unwrap()),
        (DocumentType::Contract, Regex::new(r"(?i)contract|agreement").unwrap()),
        (DocumentType::Receipt, Regex::new(r"(?i)receipt").unwrap()),
        (DocumentType::Report, Regex::new(r"(?i)report").unwrap()),
    ];
}

/// Check if a value starts with one of the accepted date shapes.
pub fn is_date(value: &str) -> bool {
    let value = value.trim();
    SLASH_DATE_PATTERN.is_match(value)
        || DASH_DATE_PATTERN.is_match(value)
        || ISO_DATE_PATTERN.is_match(value)
        || TEXTUAL_DATE_PATTERN.is_match(value)
}

/// Parse a monetary amount after stripping currency symbols and separators.
pub fn parse_amount(value: &str) -> Option<f64> {
    let cleaned = CURRENCY_NOISE_PATTERN.replace_all(value.trim(), "");
    cleaned.trim().parse::<f64>().ok()
}

/// Check if a value is a plausible amount in [0.01, 1,000,000].
pub fn is_plausible_amount(value: &str) -> bool {
    parse_amount(value)
        .map(|amount| (0.01..=1_000_000.0).contains(&amount))
        .unwrap_or(false)
}

/// First document type whose keywords appear in the content.
pub fn keyword_match(content: &str) -> Option<DocumentType> {
    KEYWORD_TABLE
        .iter()
        .find(|(_, regex)| regex.is_match(content))
        .map(|(doc_type, _)| *doc_type)
}
