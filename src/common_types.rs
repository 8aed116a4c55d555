//! This module contains the data types shared across the classifier stack.

/// A fixed-length feature descriptor paired with its label.
///
/// - `F`: the type of the components (e.g., `f64`, `f32`).
/// - `L`: the type of the label (e.g., `String`, an enum).
///
/// All vectors fed into one tree must share the same number of components;
/// that invariant is checked once at tree construction.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FeatureVector<F, L> {
    pub features: Vec<F>,
    pub label: L,
}

impl<F, L> FeatureVector<F, L> {
    pub fn new(features: Vec<F>, label: L) -> Self {
        FeatureVector { features, label }
    }
}

/// The outcome of a nearest-neighbor query: the winning label and the
/// distance at which it was found.
///
/// `label` is `None` when the query matched nothing (empty tree, or a query
/// the tree could not compare against); `distance` is then the
/// [`f64::INFINITY`] sentinel. Callers that want a forced best guess ignore
/// the distance; callers that want to reject weak matches threshold on it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Classification<L> {
    pub label: Option<L>,
    pub distance: f64,
}

impl<L> Classification<L> {
    /// The no-match result: no label, infinite distance.
    pub fn unknown() -> Self {
        Classification { label: None, distance: f64::INFINITY }
    }

    pub fn is_unknown(&self) -> bool {
        self.label.is_none()
    }
}
