//! Nearest-neighbor classification over descriptor batches.

pub mod heap_utils;
pub mod kd_tree;

use std::collections::HashMap;
use std::hash::Hash;

use num_traits::{AsPrimitive, Float};

use crate::common_types::{Classification, FeatureVector};
use crate::distance::Distance;
use crate::error::ClassifyError;
use self::heap_utils::KBest;
use self::kd_tree::KdTree;

/// A nearest-neighbor classifier backed by a k-d tree, with a brute-force
/// k-NN mode kept around for cross-checking the tree and for batches small
/// enough that exhaustive scans are cheaper than tree bookkeeping.
#[derive(Debug)]
pub struct Classifier<F, L> {
    training: Vec<FeatureVector<F, L>>,
    tree: KdTree<F, L>,
}

impl<F, L> Classifier<F, L>
where
    F: Float + AsPrimitive<f64>,
    L: Clone + Eq + Hash,
{
    /// Builds the classifier from a training batch.
    ///
    /// An empty batch is fine; every prediction then comes back unknown.
    /// A batch of inconsistent dimensionality is rejected whole.
    pub fn fit(
        training: Vec<FeatureVector<F, L>>,
        metric: Distance,
    ) -> Result<Self, ClassifyError> {
        let tree = KdTree::build(training.clone(), metric)?;
        Ok(Classifier { training, tree })
    }

    /// Nearest-neighbor result with the winning distance included, so
    /// callers can threshold weak matches instead of accepting the forced
    /// best guess.
    pub fn classify(&self, query: &[F]) -> Classification<L> {
        self.tree.nearest(query)
    }

    /// The predicted label alone; `None` means no match ("unknown").
    pub fn predict(&self, query: &[F]) -> Option<L> {
        self.classify(query).label
    }

    /// Brute-force k-NN majority vote over the whole training batch.
    ///
    /// Every stored vector is scanned, the `k` closest are kept and the
    /// most common label among them wins. A tie between equally common
    /// labels falls to whichever the vote map yields: an arbitrary but
    /// documented policy, matching the plain map-iteration behavior this
    /// replaces.
    pub fn predict_knn(&self, query: &[F], k: usize) -> Option<L> {
        if k == 0 || self.training.is_empty() {
            return None;
        }
        if query.len() != self.tree.dimensions() {
            log::warn!(
                "k-NN query has {} components but training data has {}; returning no match",
                query.len(),
                self.tree.dimensions()
            );
            return None;
        }

        let metric = self.tree.metric();
        let mut best = KBest::new(k);
        for point in &self.training {
            best.add(metric.between(query, &point.features), &point.label);
        }

        let mut votes: HashMap<&L, usize> = HashMap::new();
        for label in best.into_sorted() {
            *votes.entry(label).or_insert(0) += 1;
        }
        votes.into_iter().max_by_key(|&(_, count)| count).map(|(label, _)| label.clone())
    }

    /// Number of training vectors.
    pub fn len(&self) -> usize {
        self.training.len()
    }

    pub fn is_empty(&self) -> bool {
        self.training.is_empty()
    }

    pub fn metric(&self) -> Distance {
        self.tree.metric()
    }

    pub fn tree(&self) -> &KdTree<F, L> {
        &self.tree
    }
}

impl<F, L> Classifier<F, L>
where
    F: Float + AsPrimitive<f64> + Send + Sync,
    L: Clone + Eq + Hash + Send + Sync,
{
    /// Like [`Classifier::fit`], but builds the tree with parallel subtree
    /// splits. The resulting classifier behaves identically.
    pub fn fit_parallel(
        training: Vec<FeatureVector<F, L>>,
        metric: Distance,
    ) -> Result<Self, ClassifyError> {
        let tree = KdTree::build_parallel(training.clone(), metric)?;
        Ok(Classifier { training, tree })
    }
}
