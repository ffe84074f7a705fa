//! Prices ⋈ daily sentiment → model-ready feature table.

use crate::config::AppConfig;
use crate::error::Result;
use crate::loader::{load_daily_sentiment, load_price_table};
use crate::models::{CarriedColumns, DailySentiment, FeatureRow, PriceRecord};
use crate::storage;
use crate::utils::fmt_count;
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::info;

/// Trailing window for the rolling sentiment mean.
pub const ROLL_WINDOW: usize = 3;

/// One joined row before incomplete rows are dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRow {
    pub price: PriceRecord,
    pub sentiment: f64,
    pub return_1d: Option<f64>,
    pub return_5d: Option<f64>,
    pub sentiment_lag1: Option<f64>,
    pub sentiment_roll3: Option<f64>,
    pub target_up: Option<u8>,
}

impl JoinedRow {
    /// `Some` only when every feature is defined and every carried column the
    /// prices file has is filled. Columns the file lacks stay empty.
    fn complete(&self, columns: CarriedColumns) -> Option<FeatureRow> {
        Some(FeatureRow {
            date: self.price.date,
            open: carried(columns.open, self.price.open)?,
            high: carried(columns.high, self.price.high)?,
            low: carried(columns.low, self.price.low)?,
            close: self.price.close,
            volume: carried(columns.volume, self.price.volume)?,
            sentiment: self.sentiment,
            return_1d: self.return_1d?,
            return_5d: self.return_5d?,
            sentiment_lag1: self.sentiment_lag1?,
            sentiment_roll3: self.sentiment_roll3?,
            target_up: self.target_up?,
        })
    }
}

/// `None` (drop the row) when a present column is empty.
fn carried<T>(present: bool, value: Option<T>) -> Option<Option<T>> {
    match (present, value) {
        (true, None) => None,
        (true, v) => Some(v),
        (false, _) => Some(None),
    }
}

/// Percentage change against the value `periods` rows earlier.
///
/// A zero earlier close gives an infinite ratio, which is treated as
/// undefined so the row is dropped rather than fed to the models.
pub fn pct_change(values: &[f64], periods: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            let prev = values[i.checked_sub(periods)?];
            Some(values[i] / prev - 1.0).filter(|r| r.is_finite())
        })
        .collect()
}

/// Mean over the trailing `window` values, undefined until the window fills.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if window == 0 || i + 1 < window {
                return None;
            }
            let slice = &values[i + 1 - window..=i];
            Some(slice.iter().sum::<f64>() / window as f64)
        })
        .collect()
}

/// Left-join prices with sentiment and derive every feature column.
///
/// Prices are put in date order first. A date without sentiment gets 0.0,
/// which conflates "no news" with "neutral news".
pub fn join_and_derive(prices: &[PriceRecord], sentiment: &[DailySentiment]) -> Vec<JoinedRow> {
    let mut prices = prices.to_vec();
    prices.sort_by_key(|p| p.date);

    let by_date: HashMap<NaiveDate, f64> = sentiment.iter().map(|s| (s.date, s.sentiment)).collect();
    let sent: Vec<f64> = prices
        .iter()
        .map(|p| by_date.get(&p.date).copied().unwrap_or(0.0))
        .collect();
    let closes: Vec<f64> = prices.iter().map(|p| p.close).collect();

    let return_1d = pct_change(&closes, 1);
    let return_5d = pct_change(&closes, 5);
    let roll3 = rolling_mean(&sent, ROLL_WINDOW);
    let n = prices.len();

    prices
        .into_iter()
        .enumerate()
        .map(|(i, price)| JoinedRow {
            price,
            sentiment: sent[i],
            return_1d: return_1d[i],
            return_5d: return_5d[i],
            sentiment_lag1: i.checked_sub(1).map(|j| sent[j]),
            sentiment_roll3: roll3[i],
            // The last row has nothing to label it with.
            target_up: (i + 1 < n).then(|| u8::from(return_1d[i + 1].is_some_and(|r| r > 0.0))),
        })
        .collect()
}

/// Feature rows with every incomplete row removed.
pub fn engineer(
    prices: &[PriceRecord],
    columns: CarriedColumns,
    sentiment: &[DailySentiment],
) -> Vec<FeatureRow> {
    join_and_derive(prices, sentiment)
        .iter()
        .filter_map(|row| row.complete(columns))
        .collect()
}

// ── Stage ─────────────────────────────────────────────────────────────────────

/// Load prices + daily sentiment, build the feature table and write it.
pub fn build_features(config: &AppConfig) -> Result<Vec<FeatureRow>> {
    let ticker = &config.prices.ticker;
    let prices = load_price_table(&config.paths.prices_file(ticker))?;
    let sentiment = load_daily_sentiment(&config.paths.daily_sentiment_file(ticker))?;

    let rows = engineer(&prices.records, prices.columns, &sentiment);
    let out_path = config.paths.features_file(ticker);
    storage::write_csv(&out_path, &rows)?;

    info!(
        "Saved features to {:?} with {} rows ({} price days in)",
        out_path,
        fmt_count(rows.len()),
        fmt_count(prices.records.len())
    );
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn price(day: u32, close: f64) -> PriceRecord {
        PriceRecord {
            date: ymd(2023, 1, day),
            open: Some(close),
            high: Some(close),
            low: Some(close),
            close,
            adj_close: None,
            volume: Some(100),
        }
    }

    fn sent(day: u32, sentiment: f64) -> DailySentiment {
        DailySentiment {
            date: ymd(2023, 1, day),
            sentiment,
        }
    }

    fn close_to(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_pct_change() {
        let r = pct_change(&[100.0, 102.0, 101.0], 1);
        assert_eq!(r[0], None);
        assert!(close_to(r[1].unwrap(), 0.02));
        assert!(close_to(r[2].unwrap(), 101.0 / 102.0 - 1.0));
        assert_eq!(pct_change(&[0.0, 1.0], 1)[1], None);
    }

    #[test]
    fn test_rolling_mean() {
        let r = rolling_mean(&[1.0, 2.0, 3.0, 4.0], 3);
        assert_eq!(r[..2], [None, None]);
        assert!(close_to(r[2].unwrap(), 2.0));
        assert!(close_to(r[3].unwrap(), 3.0));
    }

    #[test]
    fn test_six_day_fixture_has_no_complete_rows() {
        // 5-day return needs five prior rows and the last row is unlabelled.
        let prices: Vec<_> = [100.0, 102.0, 101.0, 105.0, 103.0, 110.0]
            .iter()
            .enumerate()
            .map(|(i, &c)| price(i as u32 + 1, c))
            .collect();

        let joined = join_and_derive(&prices, &[]);
        assert!(close_to(joined[1].return_1d.unwrap(), 0.02));
        // 01-03 falls (101 < 102), so 01-02 is labelled down.
        assert_eq!(joined[1].target_up, Some(0));
        assert_eq!(joined[2].target_up, Some(1));
        assert_eq!(joined[5].target_up, None);
        assert!(joined.iter().all(|r| r.sentiment == 0.0));

        assert!(engineer(&prices, CarriedColumns::ALL, &[]).is_empty());
    }

    #[test]
    fn test_eight_day_fixture() {
        let closes = [100.0, 102.0, 101.0, 105.0, 103.0, 110.0, 108.0, 112.0];
        let prices: Vec<_> = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| price(i as u32 + 1, c))
            .collect();
        // 01-02 has no news; 01-08 is never used because it is dropped.
        let daily = vec![
            sent(1, 0.3),
            sent(3, -0.6),
            sent(4, 0.9),
            sent(5, 0.0),
            sent(6, 0.6),
            sent(7, -0.3),
        ];

        let rows = engineer(&prices, CarriedColumns::ALL, &daily);
        assert_eq!(rows.len(), 2);

        let r6 = &rows[0];
        assert_eq!(r6.date, ymd(2023, 1, 6));
        assert!(close_to(r6.return_1d, 110.0 / 103.0 - 1.0));
        assert!(close_to(r6.return_5d, 110.0 / 100.0 - 1.0));
        assert_eq!(r6.sentiment, 0.6);
        assert_eq!(r6.sentiment_lag1, 0.0);
        assert!(close_to(r6.sentiment_roll3, (0.9 + 0.0 + 0.6) / 3.0));
        assert_eq!(r6.target_up, 0);

        let r7 = &rows[1];
        assert_eq!(r7.date, ymd(2023, 1, 7));
        assert!(close_to(r7.return_5d, 108.0 / 102.0 - 1.0));
        assert_eq!(r7.sentiment_lag1, 0.6);
        assert!(close_to(r7.sentiment_roll3, (0.0 + 0.6 - 0.3) / 3.0));
        assert_eq!(r7.target_up, 1);
    }

    #[test]
    fn test_target_matches_next_return_and_last_row_dropped() {
        let closes = [
            10.0, 11.0, 10.5, 10.5, 12.0, 11.0, 11.5, 13.0, 12.5, 12.5, 14.0, 13.0,
        ];
        let prices: Vec<_> = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| price(i as u32 + 1, c))
            .collect();

        let joined = join_and_derive(&prices, &[]);
        for w in joined.windows(2) {
            let next_up = w[1].return_1d.is_some_and(|r| r > 0.0);
            assert_eq!(w[0].target_up, Some(u8::from(next_up)));
        }

        let rows = engineer(&prices, CarriedColumns::ALL, &[]);
        let last = prices.last().unwrap().date;
        assert!(rows.iter().all(|r| r.date != last));
        // A flat next day (12.5 → 12.5) is not "up".
        let flat = rows.iter().find(|r| r.date == ymd(2023, 1, 9)).unwrap();
        assert_eq!(flat.target_up, 0);
    }

    #[test]
    fn test_missing_carried_column_drops_row() {
        let mut prices: Vec<_> = (1..=8).map(|d| price(d, 100.0 + d as f64)).collect();
        prices[6].volume = None;
        let rows = engineer(&prices, CarriedColumns::ALL, &[]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, ymd(2023, 1, 6));
    }

    #[test]
    fn test_unsorted_prices_are_ordered_by_date() {
        let mut prices: Vec<_> = (1..=8).map(|d| price(d, 100.0 + d as f64)).collect();
        prices.reverse();
        let rows = engineer(&prices, CarriedColumns::ALL, &[]);
        let dates: Vec<_> = rows.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![ymd(2023, 1, 6), ymd(2023, 1, 7)]);
    }

    #[test]
    fn test_zero_close_drops_rows_whose_return_divides_by_it() {
        let closes = [100.0, 102.0, 0.0, 105.0, 103.0, 110.0, 108.0, 112.0, 111.0];
        let prices: Vec<_> = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| price(i as u32 + 1, c))
            .collect();

        let joined = join_and_derive(&prices, &[]);
        assert_eq!(joined[3].return_1d, None);
        assert_eq!(joined[7].return_5d, None);

        let dates: Vec<_> = engineer(&prices, CarriedColumns::ALL, &[])
            .iter()
            .map(|r| r.date)
            .collect();
        assert_eq!(dates, vec![ymd(2023, 1, 6), ymd(2023, 1, 7)]);
    }

    fn temp_config(dir: &tempfile::TempDir) -> AppConfig {
        let mut config = AppConfig::default();
        config.paths.raw_dir = dir.path().join("raw");
        config.paths.processed_dir = dir.path().join("processed");
        config
    }

    #[test]
    fn test_date_close_only_prices_keep_their_rows() {
        let dir = tempfile::tempdir().unwrap();
        let config = temp_config(&dir);

        let mut body = String::from("Date,Close\n");
        for (i, c) in [100.0, 102.0, 101.0, 105.0, 103.0, 110.0, 108.0, 112.0, 111.0]
            .iter()
            .enumerate()
        {
            body.push_str(&format!("2023-01-{:02},{}\n", i + 1, c));
        }
        let prices_path = config.paths.prices_file("TSLA");
        std::fs::create_dir_all(prices_path.parent().unwrap()).unwrap();
        std::fs::write(&prices_path, body).unwrap();
        storage::write_csv(&config.paths.daily_sentiment_file("TSLA"), &[sent(5, 0.4)]).unwrap();

        let rows = build_features(&config).unwrap();
        let dates: Vec<_> = rows.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![ymd(2023, 1, 6), ymd(2023, 1, 7), ymd(2023, 1, 8)]);
        assert!(rows.iter().all(|r| r.open.is_none() && r.volume.is_none()));
        assert_eq!(rows[0].sentiment_lag1, 0.4);

        let written = std::fs::read_to_string(config.paths.features_file("TSLA")).unwrap();
        let first = written.lines().nth(1).unwrap();
        assert!(first.starts_with("2023-01-06,,,,110.0,,"), "{first}");
    }

    #[test]
    fn test_news_without_items_zero_fills_features() {
        let dir = tempfile::tempdir().unwrap();
        let config = temp_config(&dir);

        let news_path = config.paths.news_file("TSLA");
        std::fs::create_dir_all(news_path.parent().unwrap()).unwrap();
        std::fs::write(&news_path, "date,sentiment\n").unwrap();
        assert!(crate::sentiment::aggregate_news(&config).unwrap().is_empty());

        let prices: Vec<_> = (1..=8).map(|d| price(d, 100.0 + d as f64)).collect();
        storage::write_csv(&config.paths.prices_file("TSLA"), &prices).unwrap();

        let rows = build_features(&config).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.sentiment == 0.0 && r.sentiment_roll3 == 0.0));
    }

    #[test]
    fn test_build_features_is_byte_identical_on_rerun() {
        let dir = tempfile::tempdir().unwrap();
        let config = temp_config(&dir);

        let prices: Vec<_> = [100.0, 102.0, 101.0, 105.0, 103.0, 110.0, 108.0, 112.0, 111.0]
            .iter()
            .enumerate()
            .map(|(i, &c)| price(i as u32 + 1, c))
            .collect();
        storage::write_csv(&config.paths.prices_file("TSLA"), &prices).unwrap();
        storage::write_csv(
            &config.paths.daily_sentiment_file("TSLA"),
            &[sent(2, 0.1), sent(5, -0.4), sent(7, 0.25)],
        )
        .unwrap();

        let out = config.paths.features_file("TSLA");
        let first = build_features(&config).unwrap();
        let bytes_first = std::fs::read(&out).unwrap();
        let second = build_features(&config).unwrap();
        let bytes_second = std::fs::read(&out).unwrap();

        assert_eq!(first, second);
        assert_eq!(bytes_first, bytes_second);
        assert_eq!(first.len(), 3);

        let header = String::from_utf8(bytes_first).unwrap();
        assert!(header.starts_with(
            "Date,Open,High,Low,Close,Volume,sentiment,return_1d,return_5d,\
             sentiment_lag1,sentiment_roll3,target_up\n"
        ));
    }
}
