pub mod http_client;
pub mod yahoo;

use crate::config::{AppConfig, PricesConfig};
use crate::error::Result;
use crate::models::PriceRecord;
use crate::storage;
use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::info;

use self::http_client::HttpClient;
use self::yahoo::{ChartResponse, chart_url, parse_chart};

// ── Source trait ──────────────────────────────────────────────────────────────

/// Swappable market-data provider.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Daily bars for `symbol` in `[start, end)`, sorted, one per date.
    async fn fetch_daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceRecord>>;
}

// ── Yahoo Finance ─────────────────────────────────────────────────────────────

pub struct YahooSource {
    client: HttpClient,
    base_url: String,
}

impl YahooSource {
    pub fn new(config: &PricesConfig) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new(config)?,
            base_url: config.base_url.clone(),
        })
    }
}

#[async_trait]
impl MarketDataSource for YahooSource {
    async fn fetch_daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceRecord>> {
        let url = chart_url(&self.base_url, symbol, start, end)?;
        info!("Fetching {} daily bars {} → {}", symbol, start, end);

        let resp: ChartResponse = self.client.get_json(&url).await?;
        parse_chart(symbol, start, end, resp)
    }
}

// ── Stage ─────────────────────────────────────────────────────────────────────

/// Download the configured ticker's bars and write the raw prices file.
pub async fn download_prices<S>(source: &S, config: &AppConfig) -> Result<Vec<PriceRecord>>
where
    S: MarketDataSource + ?Sized,
{
    let prices = &config.prices;
    let bars = source
        .fetch_daily_bars(&prices.ticker, prices.start, prices.end)
        .await?;

    let out_path = config.paths.prices_file(&prices.ticker);
    storage::write_csv(&out_path, &bars)?;
    Ok(bars)
}
