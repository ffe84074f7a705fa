//! CSV readers for the files exchanged between pipeline stages.

pub mod cleaner;

use crate::error::{PipelineError, Result};
use crate::models::{CarriedColumns, DailySentiment, PriceTable, RawPriceRow, TrainingRow};
use crate::schema::{self, Field};
use std::path::Path;
use tracing::{debug, info};

use self::cleaner::{CleanedPrice, csv_row_to_price, parse_date, parse_numeric};

/// Open a headered CSV file, tolerating ragged rows.
pub fn open_reader(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    Ok(csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?)
}

/// Load a prices file: Date + Close required, the other OHLCV columns optional.
///
/// Rows whose close is not numeric are dropped. The records are sorted by
/// date; `columns` records which optional columns the file declared.
pub fn load_price_table(path: &Path) -> Result<PriceTable> {
    let mut reader = open_reader(path)?;
    let headers = reader.headers()?.clone();

    let date_col = schema::require(&headers, Field::PriceDate, path)?;
    let close_col = schema::require(&headers, Field::PriceClose, path)?;
    let open_col = schema::position(&headers, "Open");
    let high_col = schema::position(&headers, "High");
    let low_col = schema::position(&headers, "Low");
    let adj_col = schema::position(&headers, "Adj Close");
    let volume_col = schema::position(&headers, "Volume");
    let columns = CarriedColumns {
        open: open_col.is_some(),
        high: high_col.is_some(),
        low: low_col.is_some(),
        volume: volume_col.is_some(),
    };

    debug!(
        "Loading prices from {:?} (date={}, close={})",
        path, date_col.name, close_col.name
    );

    let mut records = Vec::new();
    let mut dropped = 0usize;

    for result in reader.records() {
        let record = result?;
        let cell = |idx: Option<usize>| idx.and_then(|i| record.get(i)).map(|s| s.to_string());

        let raw = RawPriceRow {
            date: cell(Some(date_col.index)),
            open: cell(open_col),
            high: cell(high_col),
            low: cell(low_col),
            close: cell(Some(close_col.index)),
            adj_close: cell(adj_col),
            volume: cell(volume_col),
        };

        match csv_row_to_price(&raw) {
            CleanedPrice::Record(rec) => records.push(rec),
            CleanedPrice::NonNumericClose => dropped += 1,
            CleanedPrice::BadDate(value) => {
                let line = record.position().map(|p| p.line()).unwrap_or_default();
                return Err(PipelineError::InvalidDate { line, value });
            }
        }
    }

    records.sort_by_key(|r| r.date);

    info!(
        "{:?}: {} price rows ({} dropped with non-numeric close)",
        path,
        records.len(),
        dropped
    );
    Ok(PriceTable { records, columns })
}

/// Load a `date,sentiment` file, normalising the date column.
pub fn load_daily_sentiment(path: &Path) -> Result<Vec<DailySentiment>> {
    let mut reader = open_reader(path)?;
    let headers = reader.headers()?.clone();

    let date_idx = schema::position(&headers, "date").ok_or_else(|| missing(&headers, "date", path))?;
    let sent_idx = schema::position(&headers, "sentiment")
        .ok_or_else(|| missing(&headers, "sentiment", path))?;

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();

        let date_str = record.get(date_idx).unwrap_or_default();
        let date = parse_date(date_str).ok_or_else(|| PipelineError::InvalidDate {
            line,
            value: date_str.to_string(),
        })?;

        // An empty cell would be NaN upstream; it never survives the aggregator.
        let Some(sentiment) = record.get(sent_idx).and_then(parse_numeric) else {
            debug!("line {}: skipping empty sentiment", line);
            continue;
        };

        rows.push(DailySentiment { date, sentiment });
    }

    rows.sort_by_key(|r| r.date);
    Ok(rows)
}

/// Load the training columns of a feature file, in file order.
pub fn load_training_rows(path: &Path) -> Result<Vec<TrainingRow>> {
    let mut reader = open_reader(path)?;
    let rows = reader
        .deserialize()
        .collect::<std::result::Result<Vec<TrainingRow>, csv::Error>>()?;
    info!("{:?}: {} feature rows", path, rows.len());
    Ok(rows)
}

fn missing(headers: &csv::StringRecord, field: &'static str, path: &Path) -> PipelineError {
    PipelineError::MissingColumn {
        field,
        path: path.to_path_buf(),
        available: headers.iter().map(|h| h.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_prices_skips_multiindex_header_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "prices_TSLA.csv",
            "Date,Close,High,Low,Open,Volume\n\
             ,TSLA,TSLA,TSLA,TSLA,TSLA\n\
             2023-01-04,113.64,114.59,107.52,109.11,180389000\n\
             2023-01-03,108.10,118.80,104.64,118.47,231402800\n",
        );

        let prices = load_price_table(&path).unwrap().records;
        assert_eq!(prices.len(), 2);
        assert_eq!(prices[0].date, NaiveDate::from_ymd_opt(2023, 1, 3).unwrap());
        assert_eq!(prices[1].close, 113.64);
        assert_eq!(prices[1].adj_close, None);
    }

    #[test]
    fn test_load_prices_requires_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "p.csv", "Date,Open\n2023-01-03,1\n");
        let err = load_price_table(&path).unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn { field: "close", .. }));
    }

    #[test]
    fn test_load_prices_rejects_bad_date_on_numeric_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "p.csv", "Date,Close\nsoon,100\n");
        let err = load_price_table(&path).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidDate { line: 2, .. }));
    }

    #[test]
    fn test_price_table_reports_present_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "p.csv", "Date,Close
2023-01-03,100
");
        let table = load_price_table(&path).unwrap();
        assert_eq!(table.columns, CarriedColumns::NONE);
        assert_eq!(table.records[0].open, None);

        let path = write_file(&dir, "q.csv", "Date,Open,Close,Volume
2023-01-03,99,100,
");
        let table = load_price_table(&path).unwrap();
        assert!(table.columns.open && table.columns.volume);
        assert!(!table.columns.high && !table.columns.low);
        assert_eq!(table.records[0].volume, None);
    }

    #[test]
    fn test_header_only_daily_sentiment_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "s.csv", "date,sentiment\n");
        assert!(load_daily_sentiment(&path).unwrap().is_empty());
    }

    #[test]
    fn test_load_daily_sentiment_normalises_dates() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "s.csv",
            "date,sentiment\n2023-01-04 00:00:00,0.5\n2023-01-03,-0.25\n",
        );
        let rows = load_daily_sentiment(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2023, 1, 3).unwrap());
        assert_eq!(rows[1].sentiment, 0.5);
    }
}
