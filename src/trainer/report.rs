//! Per-class precision / recall / F1 summary.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

/// Ratio that is 0.0 when the denominator is empty.
fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

/// Metrics for every label seen in either `y_true` or `y_pred`.
pub fn classification_report(y_true: &[u8], y_pred: &[u8]) -> ClassificationReport {
    let labels: BTreeSet<u8> = y_true.iter().chain(y_pred).copied().collect();
    let pairs = || y_true.iter().zip(y_pred);

    let classes: Vec<ClassMetrics> = labels
        .iter()
        .map(|&label| {
            let tp = pairs().filter(|&(t, p)| *t == label && *p == label).count();
            let predicted = y_pred.iter().filter(|&&p| p == label).count();
            let support = y_true.iter().filter(|&&t| t == label).count();
            let precision = ratio(tp, predicted);
            let recall = ratio(tp, support);
            ClassMetrics {
                label: label.to_string(),
                precision,
                recall,
                f1: f1(precision, recall),
                support,
            }
        })
        .collect();

    let total = y_true.len();
    let correct = pairs().filter(|&(t, p)| t == p).count();
    let k = classes.len().max(1) as f64;
    let w = |m: &ClassMetrics| ratio(m.support, total);

    let macro_avg = ClassMetrics {
        label: "macro avg".into(),
        precision: classes.iter().map(|m| m.precision).sum::<f64>() / k,
        recall: classes.iter().map(|m| m.recall).sum::<f64>() / k,
        f1: classes.iter().map(|m| m.f1).sum::<f64>() / k,
        support: total,
    };
    let weighted_avg = ClassMetrics {
        label: "weighted avg".into(),
        precision: classes.iter().map(|m| m.precision * w(m)).sum(),
        recall: classes.iter().map(|m| m.recall * w(m)).sum(),
        f1: classes.iter().map(|m| m.f1 * w(m)).sum(),
        support: total,
    };

    ClassificationReport {
        classes,
        accuracy: ratio(correct, total),
        macro_avg,
        weighted_avg,
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>12} {:>9} {:>9} {:>9} {:>9}\n",
            "", "precision", "recall", "f1-score", "support"
        )?;
        for m in &self.classes {
            writeln!(
                f,
                "{:>12} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                m.label, m.precision, m.recall, m.f1, m.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>12} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        for m in [&self.macro_avg, &self.weighted_avg] {
            writeln!(
                f,
                "{:>12} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                m.label, m.precision, m.recall, m.f1, m.support
            )?;
        }
        Ok(())
    }
}
