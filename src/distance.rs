//! Scalar distance functions between feature vectors.

use num_traits::{AsPrimitive, Float};

use crate::error::ClassifyError;

/// The distance metric used to compare two descriptors.
///
/// Different descriptor families want different metrics: keypoint and
/// edge-map descriptors compare well under L2, histogram-shaped descriptors
/// under chi-square. The metric is chosen per tree at construction time, not
/// through any ambient state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Distance {
    /// Straight-line (L2) distance. The default.
    Euclidean,
    /// Sum of absolute component differences (L1).
    Manhattan,
    /// Generalized Lp distance; `p` is the order.
    Minkowski { p: u32 },
    /// `sum((a - b)^2 / (a + b))` over components, zero-sum bins skipped.
    /// Intended for non-negative histogram data.
    ChiSquare,
}

impl Default for Distance {
    fn default() -> Self {
        Distance::Euclidean
    }
}

impl Distance {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Euclidean => "euclidean",
            Self::Manhattan => "manhattan",
            Self::Minkowski { .. } => "minkowski",
            Self::ChiSquare => "chi-square",
        }
    }

    /// Distance between two vectors of equal length.
    ///
    /// Lengths are a precondition checked at tree construction; this hot
    /// path only debug-asserts them. Use [`Distance::try_between`] when the
    /// inputs come from an unvalidated source.
    pub fn between<F>(&self, a: &[F], b: &[F]) -> f64
    where
        F: Float + AsPrimitive<f64>,
    {
        debug_assert_eq!(a.len(), b.len(), "vectors must have equal length");
        match self {
            Self::Euclidean => euclidean(a, b),
            Self::Manhattan => manhattan(a, b),
            Self::Minkowski { p } => minkowski(a, b, *p),
            Self::ChiSquare => chi_square(a, b),
        }
    }

    /// Length-checked variant of [`Distance::between`].
    pub fn try_between<F>(&self, a: &[F], b: &[F]) -> Result<f64, ClassifyError>
    where
        F: Float + AsPrimitive<f64>,
    {
        if a.len() != b.len() {
            return Err(ClassifyError::MetricIncompatibility { left: a.len(), right: b.len() });
        }
        Ok(self.between(a, b))
    }

    /// Lower bound on the distance from a query to any point on the far
    /// side of an axis-aligned splitting plane, given the query's and the
    /// pivot's coordinates on that axis.
    ///
    /// For the Lp family the bound is the plain coordinate gap. For
    /// chi-square over non-negative data the single-axis term
    /// `(qa - xa)^2 / (qa + xa)` is monotone in the gap, so it bounds the
    /// full sum from below.
    pub(crate) fn plane_gap(&self, qa: f64, xa: f64) -> f64 {
        match self {
            Self::Euclidean | Self::Manhattan | Self::Minkowski { .. } => (qa - xa).abs(),
            Self::ChiSquare => {
                let denom = qa + xa;
                if denom == 0.0 { 0.0 } else { (qa - xa).powi(2) / denom }
            }
        }
    }
}

fn euclidean<F>(a: &[F], b: &[F]) -> f64
where
    F: Float + AsPrimitive<f64>,
{
    let sum_sq_diff: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let diff = (x - y).as_();
            diff * diff
        })
        .sum();
    sum_sq_diff.sqrt()
}

fn manhattan<F>(a: &[F], b: &[F]) -> f64
where
    F: Float + AsPrimitive<f64>,
{
    a.iter().zip(b.iter()).map(|(&x, &y)| (x - y).abs().as_()).sum()
}

fn minkowski<F>(a: &[F], b: &[F], p: u32) -> f64
where
    F: Float + AsPrimitive<f64>,
{
    let sum_of_powers: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(&x, &y)| (x - y).abs().as_().powi(p as i32))
        .sum();
    sum_of_powers.powf(1.0 / f64::from(p))
}

fn chi_square<F>(a: &[F], b: &[F]) -> f64
where
    F: Float + AsPrimitive<f64>,
{
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let (x, y) = (x.as_(), y.as_());
            let denom = x + y;
            if denom == 0.0 { 0.0 } else { (x - y).powi(2) / denom }
        })
        .sum()
}
