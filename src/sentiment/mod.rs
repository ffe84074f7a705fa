//! News/tweet file → one mean sentiment score per calendar date.
//!
//! The input schema varies by source. A date column is mandatory; the score
//! comes from a precomputed sentiment column when one exists, otherwise from
//! lexicon scoring of a text column.

pub mod lexicon;

use crate::config::{AppConfig, SentimentConfig, UnmappedLabelPolicy};
use crate::error::{PipelineError, Result};
use crate::loader::{cleaner::parse_date, open_reader};
use crate::models::{DailySentiment, ScoredItem, SentimentLabel, SentimentValue};
use crate::schema::{self, Field, ResolvedColumn};
use crate::storage;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

use self::lexicon::Lexicon;

/// Where each item's score comes from.
enum ScoreSource {
    Precomputed(ResolvedColumn),
    Text(ResolvedColumn, Lexicon),
}

/// A precomputed sentiment cell before the unmapped-label policy is applied.
#[derive(Debug, Clone, PartialEq)]
pub enum SentimentCell {
    Value(SentimentValue),
    Missing,
    Unmapped(String),
}

pub fn classify_cell(cell: &str) -> SentimentCell {
    let s = cell.trim();
    if s.is_empty() {
        return SentimentCell::Missing;
    }
    if let Ok(v) = s.parse::<f64>() {
        return if v.is_nan() {
            SentimentCell::Missing
        } else {
            SentimentCell::Value(SentimentValue::Numeric(v))
        };
    }
    match SentimentLabel::parse(s) {
        Some(label) => SentimentCell::Value(SentimentValue::Categorical(label)),
        None => SentimentCell::Unmapped(s.to_string()),
    }
}

/// Read a news file and resolve every item to a dated score.
pub fn score_news_file(path: &Path, config: &SentimentConfig) -> Result<Vec<ScoredItem>> {
    let mut reader = open_reader(path)?;
    let headers = reader.headers()?.clone();

    let date_col = schema::require(&headers, Field::NewsDate, path)?;
    let source = match schema::resolve(&headers, Field::NewsSentiment) {
        Some(col) => {
            info!("Using existing sentiment column {:?}", col.name);
            ScoreSource::Precomputed(col)
        }
        None => {
            let col = schema::require(&headers, Field::NewsText, path)?;
            info!("No sentiment column; scoring text column {:?}", col.name);
            let lexicon = match &config.lexicon_path {
                Some(p) => Lexicon::from_vader_file(p)?,
                None => Lexicon::new(),
            };
            ScoreSource::Text(col, lexicon)
        }
    };

    let mut items = Vec::new();
    let mut skipped = 0usize;

    for result in reader.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();

        let date_str = record.get(date_col.index).unwrap_or_default();
        let date = parse_date(date_str).ok_or_else(|| PipelineError::InvalidDate {
            line,
            value: date_str.to_string(),
        })?;

        let score = match &source {
            ScoreSource::Text(col, lexicon) => Some(lexicon.compound(record.get(col.index).unwrap_or_default())),
            ScoreSource::Precomputed(col) => {
                match classify_cell(record.get(col.index).unwrap_or_default()) {
                    SentimentCell::Value(v) => Some(v.score()),
                    SentimentCell::Missing => None,
                    SentimentCell::Unmapped(value) => {
                        resolve_unmapped(config.unmapped_label_policy, line, value)?
                    }
                }
            }
        };

        match score {
            Some(score) => items.push(ScoredItem { date, score }),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        debug!("{} items without a usable sentiment value", skipped);
    }
    info!("{:?}: {} scored items", path, items.len());
    Ok(items)
}

fn resolve_unmapped(policy: UnmappedLabelPolicy, line: u64, value: String) -> Result<Option<f64>> {
    match policy {
        UnmappedLabelPolicy::Error => Err(PipelineError::UnmappedSentiment { line, value }),
        UnmappedLabelPolicy::Neutral => {
            warn!("line {}: unmapped label {:?} scored as neutral", line, value);
            Ok(Some(0.0))
        }
        UnmappedLabelPolicy::Skip => {
            warn!("line {}: unmapped label {:?} skipped", line, value);
            Ok(None)
        }
    }
}

/// Arithmetic mean per date, ascending. Dates without items do not appear.
pub fn daily_mean(items: &[ScoredItem]) -> Vec<DailySentiment> {
    let mut by_date: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for item in items {
        let entry = by_date.entry(item.date).or_insert((0.0, 0));
        entry.0 += item.score;
        entry.1 += 1;
    }

    by_date
        .into_iter()
        .map(|(date, (sum, n))| DailySentiment {
            date,
            sentiment: sum / n as f64,
        })
        .collect()
}

// ── Stage ─────────────────────────────────────────────────────────────────────

/// Score the configured news file and write the daily sentiment file.
pub fn aggregate_news(config: &AppConfig) -> Result<Vec<DailySentiment>> {
    let ticker = &config.prices.ticker;
    let news_path = config.paths.news_file(ticker);

    let items = score_news_file(&news_path, &config.sentiment)?;
    let daily = daily_mean(&items);

    storage::write_csv(&config.paths.daily_sentiment_file(ticker), &daily)?;
    Ok(daily)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn news_file(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("news.csv");
        std::fs::write(&path, body).unwrap();
        path
    }

    fn policy(p: UnmappedLabelPolicy) -> SentimentConfig {
        SentimentConfig {
            unmapped_label_policy: p,
            lexicon_path: None,
        }
    }

    #[test]
    fn test_classify_cell() {
        assert_eq!(
            classify_cell("0.25"),
            SentimentCell::Value(SentimentValue::Numeric(0.25))
        );
        assert_eq!(
            classify_cell("Negative"),
            SentimentCell::Value(SentimentValue::Categorical(SentimentLabel::Negative))
        );
        assert_eq!(classify_cell(""), SentimentCell::Missing);
        assert_eq!(classify_cell("NaN"), SentimentCell::Missing);
        assert_eq!(classify_cell("mixed"), SentimentCell::Unmapped("mixed".into()));
    }

    #[test]
    fn test_daily_mean_is_arithmetic_mean_per_date() {
        let items = vec![
            ScoredItem { date: ymd(2023, 1, 4), score: 1.0 },
            ScoredItem { date: ymd(2023, 1, 3), score: 0.5 },
            ScoredItem { date: ymd(2023, 1, 4), score: -0.5 },
            ScoredItem { date: ymd(2023, 1, 4), score: 0.0 },
            ScoredItem { date: ymd(2023, 1, 3), score: -0.1 },
        ];
        let daily = daily_mean(&items);
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].date, ymd(2023, 1, 3));
        assert!((daily[0].sentiment - 0.2).abs() < 1e-12);
        assert_eq!(daily[1].date, ymd(2023, 1, 4));
        assert!((daily[1].sentiment - 1.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_categorical_labels_with_time_of_day() {
        let dir = tempfile::tempdir().unwrap();
        let path = news_file(
            &dir,
            "id,Date,Sentiment,text\n\
             1,2023-01-03 09:15:00,Positive,ignored\n\
             2,2023-01-03 17:40:00,negative,ignored\n\
             3,2023-01-04 08:00:00,Neutral,ignored\n\
             4,2023-01-04 12:00:00,positive,ignored\n",
        );

        let items = score_news_file(&path, &SentimentConfig::default()).unwrap();
        let daily = daily_mean(&items);
        assert_eq!(
            daily,
            vec![
                DailySentiment { date: ymd(2023, 1, 3), sentiment: 0.0 },
                DailySentiment { date: ymd(2023, 1, 4), sentiment: 0.5 },
            ]
        );
    }

    #[test]
    fn test_numeric_column_and_empty_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = news_file(
            &dir,
            "created_at,polarity\n2023-01-03,0.6\n2023-01-03,\n2023-01-03,0.2\n",
        );
        let items = score_news_file(&path, &SentimentConfig::default()).unwrap();
        assert_eq!(items.len(), 2);
        assert!((daily_mean(&items)[0].sentiment - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_unmapped_label_policies() {
        let dir = tempfile::tempdir().unwrap();
        let path = news_file(&dir, "date,label\n2023-01-03,positive\n2023-01-03,mixed\n");

        let err = score_news_file(&path, &policy(UnmappedLabelPolicy::Error)).unwrap_err();
        match err {
            PipelineError::UnmappedSentiment { line, value } => {
                assert_eq!(line, 3);
                assert_eq!(value, "mixed");
            }
            other => panic!("unexpected error: {other}"),
        }

        let neutral = score_news_file(&path, &policy(UnmappedLabelPolicy::Neutral)).unwrap();
        assert_eq!(daily_mean(&neutral)[0].sentiment, 0.5);

        let skipped = score_news_file(&path, &policy(UnmappedLabelPolicy::Skip)).unwrap();
        assert_eq!(skipped.len(), 1);
        assert_eq!(daily_mean(&skipped)[0].sentiment, 1.0);
    }

    #[test]
    fn test_text_column_is_scored_when_no_sentiment_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = news_file(
            &dir,
            "tweet_date,tweet\n\
             2023-01-03T10:00:00Z,Deliveries look great\n\
             2023-01-03T11:00:00Z,Terrible recall news\n\
             2023-01-05T09:00:00Z,\n",
        );
        let items = score_news_file(&path, &SentimentConfig::default()).unwrap();
        assert_eq!(items.len(), 3);
        assert!(items[0].score > 0.0);
        assert!(items[1].score < 0.0);
        assert_eq!(items[2], ScoredItem { date: ymd(2023, 1, 5), score: 0.0 });
    }

    #[test]
    fn test_missing_date_column_names_available_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = news_file(&dir, "when,text\nyesterday,good\n");
        let err = score_news_file(&path, &SentimentConfig::default()).unwrap_err();
        match err {
            PipelineError::MissingColumn { field, available, .. } => {
                assert_eq!(field, "date");
                assert_eq!(available, vec!["when".to_string(), "text".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_text_column_when_no_sentiment() {
        let dir = tempfile::tempdir().unwrap();
        let path = news_file(&dir, "date,body\n2023-01-03,good\n");
        let err = score_news_file(&path, &SentimentConfig::default()).unwrap_err();
        assert!(err.to_string().contains("text column"));
        assert!(err.to_string().contains("body"));
    }

    #[test]
    fn test_bad_date_fails_the_stage() {
        let dir = tempfile::tempdir().unwrap();
        let path = news_file(&dir, "date,sentiment\nsoon,1\n");
        let err = score_news_file(&path, &SentimentConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidDate { line: 2, .. }));
    }

    #[test]
    fn test_aggregate_news_writes_daily_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.paths.raw_dir = dir.path().join("raw");
        config.paths.processed_dir = dir.path().join("processed");
        std::fs::create_dir_all(&config.paths.raw_dir).unwrap();
        std::fs::write(
            config.paths.news_file("TSLA"),
            "date,sentiment\n2023-01-04,1\n2023-01-03,-1\n2023-01-04,0\n",
        )
        .unwrap();

        let daily = aggregate_news(&config).unwrap();
        assert_eq!(daily.len(), 2);

        let body = std::fs::read_to_string(config.paths.daily_sentiment_file("TSLA")).unwrap();
        assert_eq!(body, "date,sentiment\n2023-01-03,-1.0\n2023-01-04,0.5\n");
    }
}
