//! Aggregated quality metrics for a classifier over a labelled test set.

use std::collections::HashMap;
use std::hash::Hash;

use num_traits::{AsPrimitive, Float};

use crate::common_types::FeatureVector;
use crate::knn::Classifier;

/// One-vs-rest confusion counts for a single label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LabelTally {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

/// Accumulated evaluation results.
///
/// Counts are kept per label, generalizing the two-class
/// positive-vs-other scheme: `precision`/`recall`/`f1` give the one-vs-rest
/// view for any single label, the `macro_*` methods average over all labels
/// seen. Everything divides in `f64` and a zero denominator yields 0.0
/// rather than a crash or a truncated integer.
#[derive(Debug, Clone, Default)]
pub struct Metrics<L> {
    total: usize,
    correct: usize,
    unmatched: usize,
    per_label: HashMap<L, LabelTally>,
}

impl<L> Metrics<L>
where
    L: Clone + Eq + Hash,
{
    pub fn new() -> Self {
        Metrics { total: 0, correct: 0, unmatched: 0, per_label: HashMap::new() }
    }

    /// Folds one test item into the counts. `None` means the classifier
    /// produced no match; that counts as a miss for the true label.
    pub fn record(&mut self, truth: &L, prediction: Option<&L>) {
        self.total += 1;
        match prediction {
            Some(predicted) if predicted == truth => {
                self.correct += 1;
                self.per_label.entry(truth.clone()).or_default().true_positives += 1;
            }
            Some(predicted) => {
                self.per_label.entry(predicted.clone()).or_default().false_positives += 1;
                self.per_label.entry(truth.clone()).or_default().false_negatives += 1;
            }
            None => {
                self.unmatched += 1;
                self.per_label.entry(truth.clone()).or_default().false_negatives += 1;
            }
        }
    }

    /// Number of test items folded in.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Items whose prediction came back unknown.
    pub fn unmatched(&self) -> usize {
        self.unmatched
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.correct, self.total)
    }

    /// One-vs-rest precision for `label`: tp / (tp + fp). 0.0 when the
    /// label was never predicted.
    pub fn precision(&self, label: &L) -> f64 {
        let tally = self.tally(label);
        ratio(tally.true_positives, tally.true_positives + tally.false_positives)
    }

    /// One-vs-rest recall for `label`: tp / (tp + fn). 0.0 when the label
    /// never occurred in the test set.
    pub fn recall(&self, label: &L) -> f64 {
        let tally = self.tally(label);
        ratio(tally.true_positives, tally.true_positives + tally.false_negatives)
    }

    /// Harmonic mean of precision and recall for `label`.
    pub fn f1(&self, label: &L) -> f64 {
        harmonic_mean(self.precision(label), self.recall(label))
    }

    pub fn macro_precision(&self) -> f64 {
        self.macro_average(|label| self.precision(label))
    }

    pub fn macro_recall(&self) -> f64 {
        self.macro_average(|label| self.recall(label))
    }

    pub fn macro_f1(&self) -> f64 {
        self.macro_average(|label| self.f1(label))
    }

    /// The raw counts for one label, all zero if it was never seen.
    pub fn tally(&self, label: &L) -> LabelTally {
        self.per_label.get(label).copied().unwrap_or_default()
    }

    /// All labels that occurred as a truth or a prediction.
    pub fn labels(&self) -> impl Iterator<Item = &L> {
        self.per_label.keys()
    }

    fn macro_average(&self, per_label: impl Fn(&L) -> f64) -> f64 {
        if self.per_label.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.per_label.keys().map(per_label).sum();
        sum / self.per_label.len() as f64
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 { 0.0 } else { numerator as f64 / denominator as f64 }
}

fn harmonic_mean(precision: f64, recall: f64) -> f64 {
    let sum = precision + recall;
    if sum == 0.0 { 0.0 } else { 2.0 * precision * recall / sum }
}

/// Runs every test item through the classifier and aggregates the counts.
///
/// Items the classifier cannot match (empty training set, corrupt query)
/// count as misses and the run continues; a bad record never aborts the
/// whole evaluation.
pub fn evaluate<F, L>(
    classifier: &Classifier<F, L>,
    test_set: &[FeatureVector<F, L>],
) -> Metrics<L>
where
    F: Float + AsPrimitive<f64>,
    L: Clone + Eq + Hash,
{
    let mut metrics = Metrics::new();
    for item in test_set {
        let prediction = classifier.predict(&item.features);
        metrics.record(&item.label, prediction.as_ref());
    }
    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::Distance;
    use approx::assert_relative_eq;

    #[test]
    fn four_item_scenario() {
        // truths [a, b, a, b] against predictions [a, b, b, b]
        let mut metrics = Metrics::new();
        metrics.record(&"a", Some(&"a"));
        metrics.record(&"b", Some(&"b"));
        metrics.record(&"a", Some(&"b"));
        metrics.record(&"b", Some(&"b"));

        assert_relative_eq!(metrics.accuracy(), 0.75, epsilon = 1e-12);
        assert_relative_eq!(metrics.precision(&"a"), 1.0, epsilon = 1e-12);
        assert_relative_eq!(metrics.recall(&"a"), 0.5, epsilon = 1e-12);
        assert_relative_eq!(metrics.precision(&"b"), 2.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(metrics.recall(&"b"), 1.0, epsilon = 1e-12);
        assert_relative_eq!(metrics.f1(&"a"), 2.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(metrics.f1(&"b"), 0.8, epsilon = 1e-12);
    }

    #[test]
    fn never_predicted_label_has_zero_precision_without_crashing() {
        let mut metrics = Metrics::new();
        metrics.record(&"a", Some(&"b"));
        metrics.record(&"a", Some(&"b"));

        assert_relative_eq!(metrics.precision(&"a"), 0.0, epsilon = 1e-12);
        assert_relative_eq!(metrics.recall(&"a"), 0.0, epsilon = 1e-12);
        assert_relative_eq!(metrics.f1(&"a"), 0.0, epsilon = 1e-12);
        // Absent label: all-zero tally, still no division problems.
        assert_relative_eq!(metrics.precision(&"c"), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn unknown_predictions_count_as_misses() {
        let mut metrics = Metrics::new();
        metrics.record(&"a", Some(&"a"));
        metrics.record(&"a", None);
        metrics.record(&"a", None);

        assert_eq!(metrics.total(), 3);
        assert_eq!(metrics.unmatched(), 2);
        assert_relative_eq!(metrics.accuracy(), 1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(metrics.recall(&"a"), 1.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn empty_run_reports_zeros() {
        let metrics: Metrics<&str> = Metrics::new();
        assert_relative_eq!(metrics.accuracy(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(metrics.macro_precision(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(metrics.macro_f1(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn evaluate_runs_a_classifier_over_a_test_set() {
        let training = vec![
            FeatureVector::new(vec![0.0, 0.0], "a".to_string()),
            FeatureVector::new(vec![0.0, 1.0], "a".to_string()),
            FeatureVector::new(vec![10.0, 10.0], "b".to_string()),
            FeatureVector::new(vec![10.0, 11.0], "b".to_string()),
        ];
        let classifier = Classifier::fit(training, Distance::Euclidean).unwrap();

        let test_set = vec![
            FeatureVector::new(vec![0.5, 0.5], "a".to_string()),
            FeatureVector::new(vec![10.5, 10.5], "b".to_string()),
            FeatureVector::new(vec![9.0, 9.0], "a".to_string()), // will be called "b"
        ];
        let metrics = evaluate(&classifier, &test_set);

        assert_eq!(metrics.total(), 3);
        assert_relative_eq!(metrics.accuracy(), 2.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(metrics.recall(&"a".to_string()), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn a_corrupt_query_is_a_miss_not_an_abort() {
        let training = vec![
            FeatureVector::new(vec![0.0, 0.0], "a".to_string()),
            FeatureVector::new(vec![10.0, 10.0], "b".to_string()),
        ];
        let classifier = Classifier::fit(training, Distance::Euclidean).unwrap();

        let test_set = vec![
            FeatureVector::new(vec![0.5, 0.5], "a".to_string()),
            FeatureVector::new(vec![1.0], "a".to_string()), // wrong length
            FeatureVector::new(vec![9.5, 9.5], "b".to_string()),
        ];
        let metrics = evaluate(&classifier, &test_set);

        assert_eq!(metrics.total(), 3);
        assert_eq!(metrics.unmatched(), 1);
        assert_relative_eq!(metrics.accuracy(), 2.0 / 3.0, epsilon = 1e-12);
    }
}
