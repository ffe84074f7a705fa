//! L2-regularised logistic regression fitted by batch gradient descent.

use super::Classifier;
use crate::config::LogisticConfig;
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, Axis};
use tracing::debug;

pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Per-column centring and scaling learned on the training slice.
#[derive(Debug, Clone)]
struct Standardizer {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl Standardizer {
    fn fit(x: &Array2<f64>) -> Self {
        let mean = x
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(x.ncols()));
        // Constant columns are left unscaled.
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 1e-12 { s } else { 1.0 });
        Self { mean, scale }
    }

    fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        (x - &self.mean) / &self.scale
    }
}

#[derive(Debug, Clone)]
pub struct LogisticRegression {
    config: LogisticConfig,
    scaler: Option<Standardizer>,
    coefficients: Option<Array1<f64>>,
    intercept: f64,
    /// Iterations used by the last fit.
    pub iterations: usize,
}

impl LogisticRegression {
    pub fn new(config: LogisticConfig) -> Self {
        Self {
            config,
            scaler: None,
            coefficients: None,
            intercept: 0.0,
            iterations: 0,
        }
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (Some(scaler), Some(w)) = (&self.scaler, &self.coefficients) else {
            return Err(PipelineError::NotFitted);
        };
        if x.ncols() != w.len() {
            return Err(PipelineError::DimensionMismatch {
                expected: w.len(),
                got: x.ncols(),
            });
        }
        let z = scaler.transform(x).dot(w) + self.intercept;
        Ok(z.mapv(sigmoid))
    }
}

impl Classifier for LogisticRegression {
    fn name(&self) -> &str {
        "Logistic Regression"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(PipelineError::DimensionMismatch {
                expected: x.nrows(),
                got: y.len(),
            });
        }
        if x.nrows() == 0 {
            return Err(PipelineError::InsufficientData { rows: 0, needed: 1 });
        }

        let scaler = Standardizer::fit(x);
        let xs = scaler.transform(x);
        let n = xs.nrows() as f64;
        let lr = self.config.learning_rate;
        // Penalty 1/(2C)·‖w‖² on the summed loss, expressed per sample.
        let alpha = 1.0 / (self.config.c * n);

        let mut w = Array1::<f64>::zeros(xs.ncols());
        let mut b = 0.0;
        self.iterations = self.config.max_iter;

        for iter in 0..self.config.max_iter {
            let p = (xs.dot(&w) + b).mapv(sigmoid);
            let errors = &p - y;

            let grad_w = xs.t().dot(&errors) / n + &w * alpha;
            let grad_b = errors.sum() / n;

            let step_w = grad_w * lr;
            let step_b = grad_b * lr;
            w = &w - &step_w;
            b -= step_b;

            let moved = step_w.iter().map(|s| s.abs()).sum::<f64>() + step_b.abs();
            if moved < self.config.tolerance {
                self.iterations = iter + 1;
                break;
            }
        }

        debug!(
            "logistic fit: {} iterations, w={:?}, b={:.6}",
            self.iterations, w, b
        );
        self.scaler = Some(scaler);
        self.coefficients = Some(w);
        self.intercept = b;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<u8>> {
        Ok(self.predict_proba(x)?.mapv(|p| u8::from(p > 0.5)))
    }
}
