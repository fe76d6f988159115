//! Classification report over `(actual, predicted)` label pairs.

use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub total: usize,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

impl ClassificationReport {
    /// Build a report from label pairs. Labels are compared lower-cased.
    ///
    /// Classes are the sorted union of actual and predicted labels; a class
    /// that never appears as a prediction gets zero precision.
    pub fn from_pairs<A, P>(pairs: &[(A, P)]) -> Self
    where
        A: AsRef<str>,
        P: AsRef<str>,
    {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(a, p)| (a.as_ref().to_lowercase(), p.as_ref().to_lowercase()))
            .collect();
        let total = pairs.len();

        let labels: BTreeSet<&str> = pairs
            .iter()
            .flat_map(|(a, p)| [a.as_str(), p.as_str()])
            .collect();

        let classes: Vec<ClassMetrics> = labels
            .into_iter()
            .map(|label| {
                let tp = pairs.iter().filter(|(a, p)| a == label && p == label).count();
                let predicted = pairs.iter().filter(|(_, p)| p == label).count();
                let support = pairs.iter().filter(|(a, _)| a == label).count();
                let precision = ratio(tp, predicted);
                let recall = ratio(tp, support);
                ClassMetrics {
                    label: label.to_string(),
                    precision,
                    recall,
                    f1: harmonic_mean(precision, recall),
                    support,
                }
            })
            .collect();

        let correct = pairs.iter().filter(|(a, p)| a == p).count();
        let macro_avg = average(&classes, "macro avg", |_| 1.0);
        let weighted_avg = average(&classes, "weighted avg", |c| c.support as f64);

        Self {
            classes,
            accuracy: ratio(correct, total),
            total,
            macro_avg,
            weighted_avg,
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

fn harmonic_mean(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

fn average(classes: &[ClassMetrics], label: &str, weight: impl Fn(&ClassMetrics) -> f64) -> ClassMetrics {
    let total_weight: f64 = classes.iter().map(&weight).sum();
    let mean = |field: fn(&ClassMetrics) -> f64| {
        if total_weight == 0.0 {
            0.0
        } else {
            classes.iter().map(|c| field(c) * weight(c)).sum::<f64>() / total_weight
        }
    };
    ClassMetrics {
        label: label.to_string(),
        precision: mean(|c| c.precision),
        recall: mean(|c| c.recall),
        f1: mean(|c| c.f1),
        support: classes.iter().map(|c| c.support).sum(),
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .classes
            .iter()
            .map(|c| c.label.len())
            .chain(["weighted avg".len()])
            .max()
            .unwrap_or(0);

        writeln!(f, "Accuracy: {:.4}", self.accuracy)?;
        writeln!(f)?;
        writeln!(
            f,
            "{:>width$}  {:>9}  {:>9}  {:>9}  {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for c in &self.classes {
            write_row(f, c, width)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>width$}  {:>9}  {:>9}  {:>9.2}  {:>9}",
            "accuracy", "", "", self.accuracy, self.total
        )?;
        write_row(f, &self.macro_avg, width)?;
        write_row(f, &self.weighted_avg, width)
    }
}

fn write_row(f: &mut fmt::Formatter<'_>, c: &ClassMetrics, width: usize) -> fmt::Result {
    writeln!(
        f,
        "{:>width$}  {:>9.2}  {:>9.2}  {:>9.2}  {:>9}",
        c.label, c.precision, c.recall, c.f1, c.support
    )
}
