//! Runs the four stages in order, each reading the file the previous one wrote.
//!
//! 1. Fetch daily bars → `prices_<TICKER>.csv`
//! 2. Score news and average per day → `daily_sentiment_<ticker>.csv`
//! 3. Join and derive features → `features_<ticker>.csv`
//! 4. Chronological split, fit both models, report on the held-out slice
//!
//! A failing stage stops the run; later stages never see a stale file.

use crate::config::AppConfig;
use crate::features::build_features;
use crate::fetcher::{MarketDataSource, download_prices};
use crate::sentiment::aggregate_news;
use crate::trainer::{TrainingSummary, train_and_evaluate};
use crate::utils::StageTimer;
use anyhow::{Context, Result};
use tracing::info;

pub struct Pipeline {
    config: AppConfig,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub async fn run<S>(&self, source: &S) -> Result<PipelineStats>
    where
        S: MarketDataSource + ?Sized,
    {
        let ticker = &self.config.prices.ticker;

        info!("=== Step 1: Fetching prices for {} ===", ticker);
        let prices = {
            let _t = StageTimer::start("price fetch");
            download_prices(source, &self.config)
                .await
                .with_context(|| format!("Price fetch failed for {}", ticker))?
        };

        info!("=== Step 2: Aggregating news sentiment ===");
        let daily = {
            let _t = StageTimer::start("sentiment aggregation");
            aggregate_news(&self.config).context("Sentiment aggregation failed")?
        };

        info!("=== Step 3: Building features ===");
        let features = {
            let _t = StageTimer::start("feature build");
            build_features(&self.config).context("Feature build failed")?
        };

        info!("=== Step 4: Training models ===");
        let summary = {
            let _t = StageTimer::start("training");
            train_and_evaluate(&self.config).context("Model training failed")?
        };

        let stats = PipelineStats {
            price_rows: prices.len(),
            sentiment_days: daily.len(),
            feature_rows: features.len(),
            train_rows: summary.train_rows,
            test_rows: summary.test_rows,
            summary,
        };
        info!(
            "=== Done: {} price rows | {} sentiment days | {} feature rows | {}/{} train/test ===",
            stats.price_rows,
            stats.sentiment_days,
            stats.feature_rows,
            stats.train_rows,
            stats.test_rows
        );
        Ok(stats)
    }
}

#[derive(Debug)]
pub struct PipelineStats {
    pub price_rows: usize,
    pub sentiment_days: usize,
    pub feature_rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub summary: TrainingSummary,
}
