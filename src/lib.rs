//! Nearest-neighbor classification of image feature descriptors.
//!
//! The pipeline: a loader (external to this crate) turns images into
//! labelled [`FeatureVector`]s for some [`DescriptorKind`]; a
//! [`KdTree`](knn::kd_tree::KdTree) partitions the batch for pruned
//! nearest-neighbor search under a configurable [`Distance`]; a
//! [`Classifier`](knn::Classifier) turns queries into labels (with a
//! brute-force k-NN cross-check mode); and [`evaluate`](evaluator::evaluate)
//! aggregates accuracy, precision, recall and F1 over a test set.

pub mod common_types;
pub mod dataset;
pub mod distance;
pub mod error;
pub mod evaluator;
pub mod knn;

pub use crate::common_types::{Classification, FeatureVector};
pub use crate::dataset::DescriptorKind;
pub use crate::distance::Distance;
pub use crate::error::ClassifyError;
pub use crate::evaluator::{Metrics, evaluate};
pub use crate::knn::Classifier;
pub use crate::knn::kd_tree::KdTree;
