//! Yahoo Finance v8 chart API: request URL and response decoding.

use crate::error::{PipelineError, Result};
use crate::models::PriceRecord;
use chrono::NaiveDate;
use serde::Deserialize;

// ── Response shape ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    /// Exchange offset from UTC in seconds.
    #[serde(default)]
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

// ── Request ───────────────────────────────────────────────────────────────────

/// Chart URL for daily bars in `[start, end)`.
pub fn chart_url(base_url: &str, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<url::Url> {
    let period1 = start.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
    let period2 = end.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();

    let base = format!("{}/{}", base_url.trim_end_matches('/'), symbol.to_uppercase());
    Ok(url::Url::parse_with_params(
        &base,
        &[
            ("period1", period1.to_string()),
            ("period2", period2.to_string()),
            ("interval", "1d".to_string()),
            ("includeAdjustedClose", "true".to_string()),
        ],
    )?)
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Turn a chart response into price records, sorted by date with one row per date.
///
/// Bars that are entirely null (holidays) or lack a close are skipped; bars
/// outside `[start, end)` are discarded.
pub fn parse_chart(
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
    resp: ChartResponse,
) -> Result<Vec<PriceRecord>> {
    let no_data = || PipelineError::NoData {
        symbol: symbol.to_string(),
        start,
        end,
    };

    let results = match (resp.chart.result, resp.chart.error) {
        (_, Some(err)) if err.code == "Not Found" => return Err(no_data()),
        (_, Some(err)) => {
            return Err(PipelineError::Provider(format!("{}: {}", err.code, err.description)));
        }
        (None, None) => return Err(no_data()),
        (Some(results), None) => results,
    };

    let Some(data) = results.into_iter().next() else {
        return Err(no_data());
    };
    let timestamps = data.timestamp.unwrap_or_default();
    // Session timestamps are UTC; the trading date is the exchange's local one.
    let gmtoffset = data.meta.and_then(|m| m.gmtoffset).unwrap_or(0);
    let Some(quote) = data.indicators.quote.into_iter().next() else {
        return Err(PipelineError::Provider("response has no quote block".into()));
    };
    let adj_closes = data
        .indicators
        .adjclose
        .and_then(|v| v.into_iter().next())
        .map(|a| a.adjclose)
        .unwrap_or_default();

    let at = |v: &Vec<Option<f64>>, i: usize| v.get(i).copied().flatten();

    let mut bars: Vec<PriceRecord> = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let date = chrono::DateTime::from_timestamp(ts + gmtoffset, 0)
            .map(|dt| dt.date_naive())
            .ok_or_else(|| PipelineError::Provider(format!("invalid timestamp: {ts}")))?;

        if date < start || date >= end {
            continue;
        }

        let Some(close) = at(&quote.close, i).filter(|c| c.is_finite()) else {
            continue;
        };

        bars.push(PriceRecord {
            date,
            open: at(&quote.open, i),
            high: at(&quote.high, i),
            low: at(&quote.low, i),
            close,
            adj_close: at(&adj_closes, i),
            volume: quote.volume.get(i).copied().flatten(),
        });
    }

    bars.sort_by_key(|b| b.date);
    // Intraday "live" bars can repeat the last session's date; keep the latest.
    bars.reverse();
    bars.dedup_by_key(|b| b.date);
    bars.reverse();

    if bars.is_empty() {
        return Err(no_data());
    }
    Ok(bars)
}
