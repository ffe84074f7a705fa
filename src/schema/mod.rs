//! Column detection for input files whose header names vary by source.
//!
//! Each logical field has an ordered list of recognised aliases; the first
//! alias present in the header wins.

use crate::error::PipelineError;
use std::path::Path;

/// A logical column the pipeline needs to locate in a CSV header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    NewsDate,
    NewsSentiment,
    NewsText,
    PriceDate,
    PriceClose,
}

impl Field {
    /// Aliases in priority order.
    pub fn candidates(self) -> &'static [&'static str] {
        match self {
            Self::NewsDate => &["date", "created_at", "tweet_date", "Date", "datetime", "time"],
            Self::NewsSentiment => &["sentiment", "Sentiment", "label", "polarity", "SentimentScore"],
            Self::NewsText => &["headline", "text", "clean_text", "tweet", "Tweet", "content"],
            Self::PriceDate => &["Date", "date", "Datetime"],
            Self::PriceClose => &["Close", "close", "Price"],
        }
    }

    /// Category name used in error messages.
    pub fn category(self) -> &'static str {
        match self {
            Self::NewsDate | Self::PriceDate => "date",
            Self::NewsSentiment => "sentiment",
            Self::NewsText => "text",
            Self::PriceClose => "close",
        }
    }
}

/// A field resolved to a concrete header position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumn {
    pub name: String,
    pub index: usize,
}

/// First candidate of `field` present in `headers`, if any.
pub fn resolve(headers: &csv::StringRecord, field: Field) -> Option<ResolvedColumn> {
    field.candidates().iter().find_map(|candidate| {
        headers
            .iter()
            .position(|h| h.trim() == *candidate)
            .map(|index| ResolvedColumn {
                name: (*candidate).to_string(),
                index,
            })
    })
}

/// Like [`resolve`], but a missing field is an error listing the columns present.
pub fn require(
    headers: &csv::StringRecord,
    field: Field,
    path: &Path,
) -> Result<ResolvedColumn, PipelineError> {
    resolve(headers, field).ok_or_else(|| PipelineError::MissingColumn {
        field: field.category(),
        path: path.to_path_buf(),
        available: headers.iter().map(|h| h.to_string()).collect(),
    })
}

/// Position of an optional column by exact name.
pub fn position(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim() == name)
}
