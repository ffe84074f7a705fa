mod config;
mod error;
mod features;
mod fetcher;
mod loader;
mod models;
mod pipeline;
mod schema;
mod sentiment;
mod storage;
mod trainer;
mod utils;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::AppConfig;
use crate::fetcher::{YahooSource, download_prices};
use crate::pipeline::Pipeline;
use crate::trainer::TrainingSummary;

#[derive(Parser)]
#[command(
    name = "sentiment-pipeline",
    about = "News sentiment → next-day price direction pipeline",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Ticker symbol (overrides config)
    #[arg(long, global = true, env = "PIPELINE_TICKER")]
    ticker: Option<String>,

    /// First date to fetch, inclusive (YYYY-MM-DD)
    #[arg(long, global = true)]
    start: Option<NaiveDate>,

    /// Last date to fetch, exclusive (YYYY-MM-DD)
    #[arg(long, global = true)]
    end: Option<NaiveDate>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Download daily bars into the raw prices file
    FetchPrices,

    /// Score the news file and write the daily sentiment file
    Sentiment {
        /// News/tweet CSV to read instead of data/raw/news_<ticker>.csv
        #[arg(long)]
        news: Option<PathBuf>,
    },

    /// Join prices with daily sentiment and write the feature table
    Features,

    /// Fit both models on the feature table and print their reports
    Train {
        /// Also write the metrics as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Run every stage in order
    Run,
}

impl Cli {
    /// Fold the command-line overrides into the loaded config.
    fn apply(&self, config: &mut AppConfig) -> Result<()> {
        if let Some(ticker) = &self.ticker {
            config.prices.ticker = ticker.trim().to_uppercase();
        }
        if let Some(start) = self.start {
            config.prices.start = start;
        }
        if let Some(end) = self.end {
            config.prices.end = end;
        }
        if let Command::Sentiment { news: Some(path) } = &self.command {
            config.paths.news_file = Some(path.clone());
        }
        anyhow::ensure!(
            config.prices.start < config.prices.end,
            "start {} must be before end {}",
            config.prices.start,
            config.prices.end
        );
        Ok(())
    }
}

fn print_summary(summary: &TrainingSummary, report: Option<&PathBuf>) -> Result<()> {
    println!("{}", summary);
    if let Some(path) = report {
        let json = serde_json::to_string_pretty(summary)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write report {:?}", path))?;
        info!("Metrics report written to {:?}", path);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "sentiment_pipeline=info,warn",
        1 => "sentiment_pipeline=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let mut config = AppConfig::load().context("Failed to load configuration")?;
    cli.apply(&mut config)?;

    match &cli.command {
        Command::FetchPrices => {
            let _t = utils::StageTimer::start("price fetch");
            let source = YahooSource::new(&config.prices)?;
            let bars = download_prices(&source, &config)
                .await
                .with_context(|| format!("Price fetch failed for {}", config.prices.ticker))?;
            info!("Done: {} daily bars", utils::fmt_count(bars.len()));
        }

        Command::Sentiment { .. } => {
            let _t = utils::StageTimer::start("sentiment aggregation");
            let daily = sentiment::aggregate_news(&config)?;
            info!("Done: {} days with sentiment", utils::fmt_count(daily.len()));
        }

        Command::Features => {
            let _t = utils::StageTimer::start("feature build");
            features::build_features(&config)?;
        }

        Command::Train { report } => {
            let _t = utils::StageTimer::start("training");
            let summary = trainer::train_and_evaluate(&config)?;
            print_summary(&summary, report.as_ref())?;
        }

        Command::Run => {
            let source = YahooSource::new(&config.prices)?;
            let stats = Pipeline::new(config).run(&source).await?;
            println!("{}", stats.summary);
        }
    }

    Ok(())
}
