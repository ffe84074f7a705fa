use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub prices: PricesConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub sentiment: SentimentConfig,
    #[serde(default)]
    pub training: TrainingConfig,
}

/// Price download configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PricesConfig {
    #[serde(default = "default_ticker")]
    pub ticker: String,

    #[serde(default = "default_start")]
    pub start: NaiveDate,

    /// Exclusive upper bound of the date range.
    #[serde(default = "default_end")]
    pub end: NaiveDate,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Locations of the files handed from one stage to the next
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    #[serde(default = "default_raw_dir")]
    pub raw_dir: PathBuf,

    #[serde(default = "default_processed_dir")]
    pub processed_dir: PathBuf,

    /// Overrides the default `news_<ticker>.csv` under `raw_dir`.
    #[serde(default)]
    pub news_file: Option<PathBuf>,
}

/// What to do with a sentiment cell that is neither numeric nor a known label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmappedLabelPolicy {
    /// Fail the stage, naming the offending line and value.
    #[default]
    Error,
    /// Score the item as 0.0.
    Neutral,
    /// Leave the item out of the daily mean.
    Skip,
}

/// Sentiment aggregation configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SentimentConfig {
    #[serde(default)]
    pub unmapped_label_policy: UnmappedLabelPolicy,

    /// VADER-format lexicon file replacing the built-in word list.
    #[serde(default)]
    pub lexicon_path: Option<PathBuf>,
}

/// Model training configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrainingConfig {
    #[serde(default = "default_train_fraction")]
    pub train_fraction: f64,

    #[serde(default)]
    pub logistic: LogisticConfig,

    #[serde(default)]
    pub boosting: BoostingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogisticConfig {
    /// Inverse L2 regularisation strength.
    #[serde(default = "default_c")]
    pub c: f64,

    #[serde(default = "default_logistic_learning_rate")]
    pub learning_rate: f64,

    #[serde(default = "default_max_iter")]
    pub max_iter: usize,

    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BoostingConfig {
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,

    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    #[serde(default = "default_boosting_learning_rate")]
    pub learning_rate: f64,

    #[serde(default = "default_subsample")]
    pub subsample: f64,

    #[serde(default = "default_lambda")]
    pub lambda: f64,

    #[serde(default = "default_min_child_weight")]
    pub min_child_weight: f64,

    #[serde(default = "default_seed")]
    pub seed: u64,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_ticker() -> String {
    "TSLA".to_string()
}
fn default_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2018, 1, 1).unwrap_or_default()
}
fn default_end() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default()
}
fn default_base_url() -> String {
    "https://query2.finance.yahoo.com/v8/finance/chart".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) sentiment-pipeline/0.1".to_string()
}
fn default_raw_dir() -> PathBuf {
    PathBuf::from("data/raw")
}
fn default_processed_dir() -> PathBuf {
    PathBuf::from("data/processed")
}
fn default_train_fraction() -> f64 {
    0.8
}
fn default_c() -> f64 {
    1.0
}
fn default_logistic_learning_rate() -> f64 {
    0.1
}
fn default_max_iter() -> usize {
    1000
}
fn default_tolerance() -> f64 {
    1e-6
}
fn default_n_estimators() -> usize {
    200
}
fn default_max_depth() -> usize {
    3
}
fn default_boosting_learning_rate() -> f64 {
    0.05
}
fn default_subsample() -> f64 {
    0.8
}
fn default_lambda() -> f64 {
    1.0
}
fn default_min_child_weight() -> f64 {
    1.0
}
fn default_seed() -> u64 {
    42
}

impl Default for PricesConfig {
    fn default() -> Self {
        Self {
            ticker: default_ticker(),
            start: default_start(),
            end: default_end(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_dir: default_raw_dir(),
            processed_dir: default_processed_dir(),
            news_file: None,
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            train_fraction: default_train_fraction(),
            logistic: LogisticConfig::default(),
            boosting: BoostingConfig::default(),
        }
    }
}

impl Default for LogisticConfig {
    fn default() -> Self {
        Self {
            c: default_c(),
            learning_rate: default_logistic_learning_rate(),
            max_iter: default_max_iter(),
            tolerance: default_tolerance(),
        }
    }
}

impl Default for BoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: default_n_estimators(),
            max_depth: default_max_depth(),
            learning_rate: default_boosting_learning_rate(),
            subsample: default_subsample(),
            lambda: default_lambda(),
            min_child_weight: default_min_child_weight(),
            seed: default_seed(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            prices: PricesConfig::default(),
            paths: PathsConfig::default(),
            sentiment: SentimentConfig::default(),
            training: TrainingConfig::default(),
        }
    }
}

// ── File layout ──────────────────────────────────────────────────────────────

impl PathsConfig {
    /// `data/raw/prices_TSLA.csv`
    pub fn prices_file(&self, ticker: &str) -> PathBuf {
        self.raw_dir.join(format!("prices_{}.csv", ticker.to_uppercase()))
    }

    /// `data/raw/news_tsla.csv` unless overridden.
    pub fn news_file(&self, ticker: &str) -> PathBuf {
        self.news_file
            .clone()
            .unwrap_or_else(|| self.raw_dir.join(format!("news_{}.csv", ticker.to_lowercase())))
    }

    pub fn daily_sentiment_file(&self, ticker: &str) -> PathBuf {
        self.processed_dir
            .join(format!("daily_sentiment_{}.csv", ticker.to_lowercase()))
    }

    pub fn features_file(&self, ticker: &str) -> PathBuf {
        self.processed_dir
            .join(format!("features_{}.csv", ticker.to_lowercase()))
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("config"))
    }

    pub fn load_from(dir: &Path) -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::from(dir.join("default"))
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::from(dir.join("local"))
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("PIPELINE").separator("__"))
            .build()?;

        Ok(cfg.try_deserialize()?)
    }
}
