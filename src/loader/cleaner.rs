use crate::models::{PriceRecord, RawPriceRow};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::debug;

// ── Parsers ───────────────────────────────────────────────────────────────────

/// Numeric coercion: anything that is not a finite number becomes `None`.
/// "101.5" → 101.5 | "TSLA" → None | "" → None | "nan" → None
pub fn parse_numeric(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Volume as a whole share count. "1200" → 1200 | "1.2e3" → 1200
pub fn parse_volume(s: &str) -> Option<u64> {
    let s = s.trim();
    if let Ok(v) = s.parse::<u64>() {
        return Some(v);
    }
    parse_numeric(s)
        .filter(|v| *v >= 0.0)
        .map(|v| v.round() as u64)
}

const DATETIME_OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%a %b %d %H:%M:%S %z %Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%b %d, %Y",
    "%d %b %Y",
];

/// Normalise a date or timestamp to its calendar date.
///
/// Time-of-day is discarded. Timestamps carrying an offset keep the date as
/// written in that offset; they are not converted to UTC first.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    for fmt in DATETIME_OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.date_naive());
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }

    None
}

// ── Prices CSV → PriceRecord ──────────────────────────────────────────────────

/// Outcome of cleaning one raw price row.
#[derive(Debug, Clone, PartialEq)]
pub enum CleanedPrice {
    Record(PriceRecord),
    /// Close failed numeric coercion; the row is dropped without error.
    NonNumericClose,
    /// Close is numeric but the date could not be parsed.
    BadDate(String),
}

pub fn csv_row_to_price(row: &RawPriceRow) -> CleanedPrice {
    let Some(close) = row.close.as_deref().and_then(parse_numeric) else {
        debug!("Dropping row with non-numeric close {:?}", row.close);
        return CleanedPrice::NonNumericClose;
    };

    let date_str = row.date.as_deref().unwrap_or_default();
    let Some(date) = parse_date(date_str) else {
        return CleanedPrice::BadDate(date_str.to_string());
    };

    CleanedPrice::Record(PriceRecord {
        date,
        open: row.open.as_deref().and_then(parse_numeric),
        high: row.high.as_deref().and_then(parse_numeric),
        low: row.low.as_deref().and_then(parse_numeric),
        close,
        adj_close: row.adj_close.as_deref().and_then(parse_numeric),
        volume: row.volume.as_deref().and_then(parse_volume),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
