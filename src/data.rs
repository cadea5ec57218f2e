//! Cell values and the coercion functions that turn them into strict types.
//!
//! Spreadsheet cells arrive as a closed [`CellValue`] variant. Every coercion
//! pattern-matches over that variant: the `parse_*` functions used for
//! required fields report failures, the `parse_optional_*` family degrades to
//! `None` and never errors.

use std::{fmt, str::FromStr};

use anyhow::{Result, anyhow, bail};
use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Largest serial day number Excel accepts (9999-12-31).
const EXCEL_MAX_SERIAL: f64 = 2_958_466.0;

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub enum CellValue {
    #[default]
    Empty,
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl CellValue {
    pub fn as_display(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::String(s) => s.clone(),
            CellValue::Integer(i) => i.to_string(),
            CellValue::Float(f) => {
                if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    (*f as i64).to_string()
                } else {
                    f.to_string()
                }
            }
            CellValue::Boolean(b) => b.to_string(),
            CellValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            CellValue::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    /// True for missing cells and whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Text shown to users when a value is rejected.
    pub fn describe(&self) -> String {
        if self.is_blank() {
            "<blank>".to_string()
        } else {
            self.as_display()
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::String(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::String(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Integer(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Float(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Boolean(value)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(value: NaiveDate) -> Self {
        CellValue::Date(value)
    }
}

/// Trimmed text of a cell, or `""` for blanks and the `nan`/`none` tokens.
pub fn clean_string(value: &CellValue) -> String {
    if matches!(value, CellValue::Empty) {
        return String::new();
    }
    let text = value.as_display();
    let trimmed = text.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("nan")
        || trimmed.eq_ignore_ascii_case("none")
    {
        String::new()
    } else {
        trimmed.to_string()
    }
}

/// Parses a decimal after stripping thousands separators.
///
/// Returns `Ok(None)` when nothing is left to parse and an error when the
/// remaining text is not a number.
pub fn parse_decimal(value: &CellValue) -> Result<Option<Decimal>> {
    let text = match value {
        CellValue::Empty => return Ok(None),
        CellValue::Boolean(_) | CellValue::Date(_) | CellValue::DateTime(_) => {
            bail!("'{value}' is not a decimal number")
        }
        other => other.as_display(),
    };
    let stripped = text
        .trim()
        .chars()
        .filter(|c| *c != ',')
        .collect::<String>();
    if stripped.is_empty() {
        return Ok(None);
    }
    parse_decimal_literal(&stripped).map(Some)
}

pub fn parse_optional_decimal(value: &CellValue) -> Option<Decimal> {
    parse_decimal(value).ok().flatten()
}

pub fn parse_decimal_literal(text: &str) -> Result<Decimal> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .map_err(|_| anyhow!("Failed to parse '{text}' as decimal"))
}

/// Parses a native date, an Excel serial day number, or date text.
pub fn parse_date(value: &CellValue) -> Result<Option<NaiveDate>> {
    match value {
        CellValue::Empty => Ok(None),
        CellValue::Date(d) => Ok(Some(*d)),
        CellValue::DateTime(dt) => Ok(Some(dt.date())),
        CellValue::Integer(i) => excel_serial_to_date(*i as f64)
            .map(Some)
            .ok_or_else(|| anyhow!("{i} is not a valid serial date")),
        CellValue::Float(f) => excel_serial_to_date(*f)
            .map(Some)
            .ok_or_else(|| anyhow!("{f} is not a valid serial date")),
        CellValue::Boolean(b) => bail!("'{b}' is not a date"),
        CellValue::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            parse_naive_date(trimmed)
                .or_else(|_| parse_naive_datetime(trimmed).map(|dt| dt.date()))
                .map(Some)
        }
    }
}

pub fn parse_optional_date(value: &CellValue) -> Option<NaiveDate> {
    parse_date(value).ok().flatten()
}

/// Integer via float truncation, so `"3.0"` and `3.7` both give 3.
pub fn parse_optional_int(value: &CellValue) -> Option<i64> {
    match value {
        CellValue::Empty | CellValue::Date(_) | CellValue::DateTime(_) => None,
        CellValue::Integer(i) => Some(*i),
        CellValue::Float(f) => truncate_float(*f),
        CellValue::Boolean(b) => Some(i64::from(*b)),
        CellValue::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok().and_then(truncate_float)
        }
    }
}

pub fn parse_optional_bool(value: &CellValue) -> Option<bool> {
    match value {
        CellValue::Boolean(b) => Some(*b),
        CellValue::Empty => None,
        other => match other.as_display().trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "y" | "yes" => Some(true),
            "false" | "0" | "n" | "no" => Some(false),
            _ => None,
        },
    }
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

pub fn parse_naive_datetime(value: &str) -> Result<NaiveDateTime> {
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.naive_local());
    }
    Err(anyhow!("Failed to parse '{value}' as datetime"))
}

/// Converts a 1900-system Excel serial day number to a date.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || !(1.0..EXCEL_MAX_SERIAL).contains(&serial) {
        return None;
    }
    // Day 60 is the phantom 1900-02-29, so the epoch sits on 1899-12-30.
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_days(Days::new(serial.floor() as u64))
}

pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    let date = excel_serial_to_date(serial)?;
    let seconds = (serial.fract() * 86_400.0).round() as u32;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(seconds.min(86_399), 0)?;
    Some(date.and_time(time))
}

fn truncate_float(value: f64) -> Option<i64> {
    if value.is_finite() && value.abs() < i64::MAX as f64 {
        Some(value.trunc() as i64)
    } else {
        None
    }
}
