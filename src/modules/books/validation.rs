//! Field rules for book entities.
//!
//! Every rule is a pure function of its input (the publication date bound
//! also reads the clock) and fails with a [`ValidationError`] that names the
//! offending field and the rule it broke.

use std::ops::RangeInclusive;

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use time::{macros::datetime, Date, Month, OffsetDateTime, PrimitiveDateTime, Time};

pub const MAX_TEXT_LEN: usize = 255;
pub const MAX_PRICE: f64 = 999_999.99;
pub const MIN_PAGE_COUNT: u32 = 1;
pub const MAX_PAGE_COUNT: u32 = 50_000;
/// How far into the future a publication date may lie.
pub const MAX_YEARS_AHEAD: i32 = 10;

const EARLIEST_PUBLICATION: OffsetDateTime = datetime!(1000-01-01 0:00 UTC);
/// Years a `publicationYear` filter may name. Four digits, matching the
/// publication window and what RFC 3339 can print.
pub const PUBLICATION_YEARS: RangeInclusive<i32> = 1000..=9999;

/// Which rule a field broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    Required,
    Empty,
    TooLong,
    InvalidFormat,
    NotANumber,
    BelowMinimum,
    AboveMaximum,
    NotAnInteger,
    OutOfRange,
    UnknownVariant,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub rule: Rule,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, rule: Rule, message: impl Into<String>) -> Self {
        Self {
            field,
            rule,
            message: message.into(),
        }
    }

    pub fn required(field: &'static str, message: impl Into<String>) -> Self {
        Self::new(field, Rule::Required, message)
    }

    /// `{ field, rule, error }` entry for an error envelope's `details`.
    pub fn detail(&self) -> Value {
        json!({
            "field": self.field,
            "rule": self.rule,
            "error": self.message,
        })
    }
}

pub type ValidationResult<T> = Result<T, ValidationError>;

fn validate_text(
    field: &'static str,
    label: &str,
    value: &str,
) -> ValidationResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(
            field,
            Rule::Empty,
            format!("{label} cannot be empty"),
        ));
    }
    if value.chars().count() > MAX_TEXT_LEN {
        return Err(ValidationError::new(
            field,
            Rule::TooLong,
            format!("{label} must be {MAX_TEXT_LEN} characters or less"),
        ));
    }
    Ok(trimmed.to_string())
}

/// Non-empty after trim, at most 255 characters. Returns the trimmed title.
pub fn validate_title(title: &str) -> ValidationResult<String> {
    validate_text("title", "Title", title)
}

/// Same rules as the title. Returns the trimmed author.
pub fn validate_author(author: &str) -> ValidationResult<String> {
    validate_text("author", "Author", author)
}

/// Optional free text: trimmed, blank collapses to `None`.
pub fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Strip hyphens and whitespace.
pub fn normalize_isbn(isbn: &str) -> String {
    isbn.chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect()
}

/// ISBN-10: nine digits then a digit or `X`; weights 10..1 sum to a
/// multiple of 11.
pub fn is_valid_isbn10(isbn: &str) -> bool {
    let bytes = isbn.as_bytes();
    if bytes.len() != 10 {
        return false;
    }

    let mut sum = 0u32;
    for (i, &b) in bytes.iter().enumerate() {
        let value = match b {
            b'0'..=b'9' => u32::from(b - b'0'),
            b'X' if i == 9 => 10,
            _ => return false,
        };
        sum += value * (10 - i as u32);
    }
    sum % 11 == 0
}

/// ISBN-13: thirteen digits; weights alternate 1,3 and the last digit equals
/// `(10 - sum mod 10) mod 10` over the first twelve.
pub fn is_valid_isbn13(isbn: &str) -> bool {
    let bytes = isbn.as_bytes();
    if bytes.len() != 13 || !bytes.iter().all(u8::is_ascii_digit) {
        return false;
    }

    let sum: u32 = bytes[..12]
        .iter()
        .enumerate()
        .map(|(i, b)| u32::from(b - b'0') * if i % 2 == 0 { 1 } else { 3 })
        .sum();
    let check = (10 - sum % 10) % 10;
    u32::from(bytes[12] - b'0') == check
}

/// Normalize and checksum an ISBN. Returns the normalized form.
pub fn validate_isbn(isbn: &str) -> ValidationResult<String> {
    if isbn.trim().is_empty() {
        return Err(ValidationError::required("isbn", "ISBN is required"));
    }

    let normalized = normalize_isbn(isbn);
    let valid = match normalized.len() {
        10 => is_valid_isbn10(&normalized),
        13 => is_valid_isbn13(&normalized),
        _ => false,
    };

    if valid {
        Ok(normalized)
    } else {
        Err(ValidationError::new(
            "isbn",
            Rule::InvalidFormat,
            "Invalid ISBN format",
        ))
    }
}

pub fn validate_price(price: f64) -> ValidationResult<f64> {
    if price.is_nan() {
        return Err(ValidationError::new(
            "price",
            Rule::NotANumber,
            "Price must be a valid number",
        ));
    }
    if price < 0.0 {
        return Err(ValidationError::new(
            "price",
            Rule::BelowMinimum,
            "Price cannot be negative",
        ));
    }
    if price > MAX_PRICE {
        return Err(ValidationError::new(
            "price",
            Rule::AboveMaximum,
            "Price cannot exceed 999,999.99",
        ));
    }
    Ok(price)
}

/// Integral and within 1..=50,000.
pub fn validate_page_count(page_count: f64) -> ValidationResult<u32> {
    if !page_count.is_finite() {
        return Err(ValidationError::new(
            "page_count",
            Rule::NotANumber,
            "Page count must be a valid number",
        ));
    }
    if page_count.fract() != 0.0 {
        return Err(ValidationError::new(
            "page_count",
            Rule::NotAnInteger,
            "Page count must be a whole number",
        ));
    }
    if page_count < f64::from(MIN_PAGE_COUNT) {
        return Err(ValidationError::new(
            "page_count",
            Rule::BelowMinimum,
            "Page count must be at least 1",
        ));
    }
    if page_count > f64::from(MAX_PAGE_COUNT) {
        return Err(ValidationError::new(
            "page_count",
            Rule::AboveMaximum,
            "Page count cannot exceed 50,000",
        ));
    }
    Ok(page_count as u32)
}

/// Same calendar position `years` later, with Feb 29 falling back to Feb 28.
pub fn add_years(at: OffsetDateTime, years: i32) -> OffsetDateTime {
    let target_year = at.year() + years;
    at.replace_year(target_year).unwrap_or_else(|_| {
        at.replace_day(28)
            .and_then(|d| d.replace_year(target_year))
            .unwrap_or(at)
    })
}

/// Latest accepted publication date relative to `now`.
pub fn latest_publication(now: OffsetDateTime) -> OffsetDateTime {
    add_years(now, MAX_YEARS_AHEAD)
}

/// Within `[1000-01-01, now + 10 years]`.
pub fn validate_publication_date(
    date: OffsetDateTime,
    now: OffsetDateTime,
) -> ValidationResult<OffsetDateTime> {
    if date < EARLIEST_PUBLICATION || date > latest_publication(now) {
        return Err(ValidationError::new(
            "publication_date",
            Rule::OutOfRange,
            "Publication date must be between year 1000 and 10 years in the future",
        ));
    }
    Ok(truncate_to_millis(date))
}

/// Accepts `YYYY-MM-DD` (midnight UTC) or a full RFC 3339 timestamp.
pub fn parse_publication_date(raw: &str) -> ValidationResult<OffsetDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ValidationError::required(
            "publication_date",
            "Publication date is required",
        ));
    }

    let invalid = || {
        ValidationError::new(
            "publication_date",
            Rule::InvalidFormat,
            "Publication date must be a valid date",
        )
    };

    if let Ok(parsed) =
        OffsetDateTime::parse(raw, &time::format_description::well_known::Rfc3339)
    {
        return Ok(parsed.to_offset(time::UtcOffset::UTC));
    }

    let date = Date::parse(raw, time::macros::format_description!("[year]-[month]-[day]"))
        .map_err(|_| invalid())?;
    Ok(PrimitiveDateTime::new(date, Time::MIDNIGHT).assume_utc())
}

/// `[Jan 1 year, Jan 1 year+1)` in UTC, for years in [`PUBLICATION_YEARS`].
pub fn year_bounds(year: i32) -> ValidationResult<(OffsetDateTime, OffsetDateTime)> {
    let out_of_range = || {
        ValidationError::new(
            "publication_year",
            Rule::OutOfRange,
            "Publication year is out of range",
        )
    };
    if !PUBLICATION_YEARS.contains(&year) {
        return Err(out_of_range());
    }

    let start_of = |y: i32| {
        Date::from_calendar_date(y, Month::January, 1)
            .map(|d| PrimitiveDateTime::new(d, Time::MIDNIGHT).assume_utc())
    };
    match (start_of(year), start_of(year + 1)) {
        (Ok(start), Ok(end)) => Ok((start, end)),
        _ => Err(out_of_range()),
    }
}

/// Stored timestamps keep millisecond precision, matching the document store.
pub fn truncate_to_millis(at: OffsetDateTime) -> OffsetDateTime {
    let millis = at.millisecond();
    at.replace_nanosecond(u32::from(millis) * 1_000_000)
        .unwrap_or(at)
}

pub fn now_millis() -> OffsetDateTime {
    truncate_to_millis(OffsetDateTime::now_utc())
}
