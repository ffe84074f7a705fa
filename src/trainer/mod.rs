//! Chronological train/test evaluation of the direction classifiers.

pub mod boosting;
pub mod logistic;
pub mod report;

use crate::config::{AppConfig, TrainingConfig};
use crate::error::{PipelineError, Result};
use crate::loader::load_training_rows;
use crate::models::{FeatureRow, TrainingRow};
use chrono::NaiveDate;
use ndarray::{Array1, Array2};
use serde::Serialize;
use std::fmt;
use tracing::info;

use self::boosting::GradientBoostedTrees;
use self::logistic::LogisticRegression;
use self::report::{ClassificationReport, classification_report};

/// A binary classifier over the feature matrix.
pub trait Classifier {
    fn name(&self) -> &str;
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<u8>>;
}

/// Split point for a time-ordered table: the first `floor(fraction · n)` rows train.
pub fn train_len(n: usize, train_fraction: f64) -> usize {
    // The epsilon keeps e.g. 0.8 · 15 = 12.000000000000002 from drifting.
    let len = (n as f64 * train_fraction + 1e-9).floor();
    (len.max(0.0) as usize).min(n)
}

/// Split without shuffling so no future row informs training.
pub fn chronological_split(
    rows: &[TrainingRow],
    train_fraction: f64,
) -> Result<(&[TrainingRow], &[TrainingRow])> {
    let n_train = train_len(rows.len(), train_fraction);
    if n_train == 0 || n_train == rows.len() {
        return Err(PipelineError::InsufficientData {
            rows: rows.len(),
            needed: 2,
        });
    }
    Ok(rows.split_at(n_train))
}

/// Feature matrix and 0/1 label vector.
pub fn to_matrix(rows: &[TrainingRow]) -> Result<(Array2<f64>, Array1<f64>)> {
    let width = FeatureRow::FEATURE_NAMES.len();
    let values: Vec<f64> = rows.iter().flat_map(|r| r.features()).collect();
    let x = Array2::from_shape_vec((rows.len(), width), values)?;
    let y = rows.iter().map(|r| f64::from(r.target_up)).collect();
    Ok((x, y))
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelEvaluation {
    pub model: String,
    pub report: ClassificationReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingSummary {
    pub train_rows: usize,
    pub test_rows: usize,
    pub train_end: NaiveDate,
    pub test_start: NaiveDate,
    pub evaluations: Vec<ModelEvaluation>,
}

impl fmt::Display for TrainingSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "train: {} rows (to {}) | test: {} rows (from {})",
            self.train_rows, self.train_end, self.test_rows, self.test_start
        )?;
        for eval in &self.evaluations {
            writeln!(f, "\n=== {} ===", eval.model)?;
            write!(f, "{}", eval.report)?;
        }
        Ok(())
    }
}

/// Fit on the training slice and score on the held-out slice.
pub fn evaluate(
    model: &mut dyn Classifier,
    train: &[TrainingRow],
    test: &[TrainingRow],
) -> Result<ModelEvaluation> {
    let (x_train, y_train) = to_matrix(train)?;
    let (x_test, y_test) = to_matrix(test)?;

    model.fit(&x_train, &y_train)?;
    let predicted = model.predict(&x_test)?;

    let truth: Vec<u8> = y_test.iter().map(|&v| u8::from(v > 0.5)).collect();
    Ok(ModelEvaluation {
        model: model.name().to_string(),
        report: classification_report(&truth, &predicted.to_vec()),
    })
}

/// Both configured models, freshly constructed.
pub fn models(config: &TrainingConfig) -> Vec<Box<dyn Classifier>> {
    vec![
        Box::new(LogisticRegression::new(config.logistic.clone())),
        Box::new(GradientBoostedTrees::new(config.boosting.clone())),
    ]
}

/// Evaluate every model on an already-loaded, date-ordered table.
pub fn train_on_rows(rows: &[TrainingRow], config: &TrainingConfig) -> Result<TrainingSummary> {
    let (train, test) = chronological_split(rows, config.train_fraction)?;
    let (Some(last_train), Some(first_test)) = (train.last(), test.first()) else {
        return Err(PipelineError::InsufficientData {
            rows: rows.len(),
            needed: 2,
        });
    };
    info!(
        "Split: {} train rows (to {}), {} test rows (from {})",
        train.len(),
        last_train.date,
        test.len(),
        first_test.date
    );

    let mut evaluations = Vec::new();
    for mut model in models(config) {
        let eval = evaluate(model.as_mut(), train, test)?;
        info!("{}: accuracy {:.3}", eval.model, eval.report.accuracy);
        evaluations.push(eval);
    }

    Ok(TrainingSummary {
        train_rows: train.len(),
        test_rows: test.len(),
        train_end: last_train.date,
        test_start: first_test.date,
        evaluations,
    })
}

// ── Stage ─────────────────────────────────────────────────────────────────────

/// Load the feature file, split chronologically, fit and report both models.
pub fn train_and_evaluate(config: &AppConfig) -> Result<TrainingSummary> {
    let path = config.paths.features_file(&config.prices.ticker);
    let mut rows = load_training_rows(&path)?;
    rows.sort_by_key(|r| r.date);
    train_on_rows(&rows, &config.training)
}
