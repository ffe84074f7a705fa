use crate::storage::CsvTable;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ── Price bar ─────────────────────────────────────────────────────────────────

/// One daily OHLCV bar, in the column layout of the prices file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceRecord {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Open")]
    pub open: Option<f64>,
    #[serde(rename = "High")]
    pub high: Option<f64>,
    #[serde(rename = "Low")]
    pub low: Option<f64>,
    #[serde(rename = "Close")]
    pub close: f64,
    #[serde(rename = "Adj Close")]
    pub adj_close: Option<f64>,
    #[serde(rename = "Volume")]
    pub volume: Option<u64>,
}

// ── Sentiment ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    /// Case-insensitive match on the three known labels.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("positive") {
            Some(Self::Positive)
        } else if s.eq_ignore_ascii_case("negative") {
            Some(Self::Negative)
        } else if s.eq_ignore_ascii_case("neutral") {
            Some(Self::Neutral)
        } else {
            None
        }
    }

    pub fn score(self) -> f64 {
        match self {
            Self::Positive => 1.0,
            Self::Negative => -1.0,
            Self::Neutral => 0.0,
        }
    }
}

/// A precomputed sentiment cell: either already a number or a class label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SentimentValue {
    Numeric(f64),
    Categorical(SentimentLabel),
}

impl SentimentValue {
    pub fn score(self) -> f64 {
        match self {
            Self::Numeric(v) => v,
            Self::Categorical(label) => label.score(),
        }
    }
}

/// One news item after its date was normalised and its score resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredItem {
    pub date: NaiveDate,
    pub score: f64,
}

/// Mean sentiment of all items published on one calendar date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailySentiment {
    pub date: NaiveDate,
    pub sentiment: f64,
}

// ── Features ──────────────────────────────────────────────────────────────────

/// A model-ready row of the feature table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureRow {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    /// Empty when the prices file had no such column.
    #[serde(rename = "Open")]
    pub open: Option<f64>,
    #[serde(rename = "High")]
    pub high: Option<f64>,
    #[serde(rename = "Low")]
    pub low: Option<f64>,
    #[serde(rename = "Close")]
    pub close: f64,
    #[serde(rename = "Volume")]
    pub volume: Option<u64>,
    pub sentiment: f64,
    pub return_1d: f64,
    pub return_5d: f64,
    pub sentiment_lag1: f64,
    pub sentiment_roll3: f64,
    pub target_up: u8,
}

impl FeatureRow {
    pub const FEATURE_NAMES: [&'static str; 4] =
        ["return_1d", "return_5d", "sentiment_lag1", "sentiment_roll3"];
}

/// Which of the optional OHLCV columns a prices file actually carries.
///
/// A row only needs a value in the columns its file has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarriedColumns {
    pub open: bool,
    pub high: bool,
    pub low: bool,
    pub volume: bool,
}

impl CarriedColumns {
    pub const ALL: Self = Self {
        open: true,
        high: true,
        low: true,
        volume: true,
    };

    pub const NONE: Self = Self {
        open: false,
        high: false,
        low: false,
        volume: false,
    };
}

/// Price rows plus the optional columns their file declared.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTable {
    pub records: Vec<PriceRecord>,
    pub columns: CarriedColumns,
}

// ── File headers ──────────────────────────────────────────────────────────────

impl CsvTable for PriceRecord {
    const COLUMNS: &'static [&'static str] =
        &["Date", "Open", "High", "Low", "Close", "Adj Close", "Volume"];
}

impl CsvTable for DailySentiment {
    const COLUMNS: &'static [&'static str] = &["date", "sentiment"];
}

impl CsvTable for FeatureRow {
    const COLUMNS: &'static [&'static str] = &[
        "Date",
        "Open",
        "High",
        "Low",
        "Close",
        "Volume",
        "sentiment",
        "return_1d",
        "return_5d",
        "sentiment_lag1",
        "sentiment_roll3",
        "target_up",
    ];
}

/// The subset of the feature file the trainer reads; other columns are ignored.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TrainingRow {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    pub return_1d: f64,
    pub return_5d: f64,
    pub sentiment_lag1: f64,
    pub sentiment_roll3: f64,
    pub target_up: u8,
}

impl TrainingRow {
    pub fn features(&self) -> [f64; 4] {
        [
            self.return_1d,
            self.return_5d,
            self.sentiment_lag1,
            self.sentiment_roll3,
        ]
    }
}

// ── Raw CSV rows ──────────────────────────────────────────────────────────────

/// Prices CSV as read from disk, before coercion.
#[derive(Debug, Clone, Default)]
pub struct RawPriceRow {
    pub date: Option<String>,
    pub open: Option<String>,
    pub high: Option<String>,
    pub low: Option<String>,
    pub close: Option<String>,
    pub adj_close: Option<String>,
    pub volume: Option<String>,
}
