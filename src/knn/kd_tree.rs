//! Balanced k-d tree over feature descriptors with pruned
//! nearest-neighbor search.

use num_traits::{AsPrimitive, Float};

use crate::common_types::{Classification, FeatureVector};
use crate::distance::Distance;
use crate::error::ClassifyError;

/// A binary spatial partition tree built once from a training batch and
/// read-only afterwards. Rebuilding from scratch is the only update path.
#[derive(Debug)]
pub struct KdTree<F, L> {
    root: Option<Box<TreeNode<F, L>>>,
    dimensions: usize,
    metric: Distance,
    len: usize,
}

#[derive(Debug)]
struct TreeNode<F, L> {
    point: FeatureVector<F, L>,
    /// Splitting axis, `depth % dimensions`, fixed at build time.
    axis: usize,
    left: Option<Box<TreeNode<F, L>>>,
    right: Option<Box<TreeNode<F, L>>>,
}

impl<F, L> KdTree<F, L>
where
    F: Float + AsPrimitive<f64>,
    L: Clone,
{
    /// Builds a balanced tree from a training batch.
    ///
    /// The batch is consumed and reordered while splitting; callers keep
    /// their own copy if they need the original order. An empty batch
    /// yields an empty tree whose searches all come back unknown. A batch
    /// with inconsistent dimensionality is rejected whole; no partial
    /// tree is ever returned.
    pub fn build(
        mut points: Vec<FeatureVector<F, L>>,
        metric: Distance,
    ) -> Result<Self, ClassifyError> {
        let dimensions = Self::batch_dimensions(&points)?;
        let len = points.len();
        let root =
            if len == 0 { None } else { Self::build_recursive(&mut points, dimensions, 0) };
        Ok(KdTree { root, dimensions, metric, len })
    }

    fn batch_dimensions(points: &[FeatureVector<F, L>]) -> Result<usize, ClassifyError> {
        let Some(first) = points.first() else {
            return Ok(0);
        };
        let dimensions = first.features.len();
        if dimensions == 0 {
            return Err(ClassifyError::EmptyFeatures);
        }
        for point in points {
            if point.features.len() != dimensions {
                return Err(ClassifyError::DimensionMismatch {
                    expected: dimensions,
                    found: point.features.len(),
                });
            }
        }
        Ok(dimensions)
    }

    fn build_recursive(
        slice: &mut [FeatureVector<F, L>],
        dimensions: usize,
        depth: usize,
    ) -> Option<Box<TreeNode<F, L>>> {
        if slice.is_empty() {
            return None;
        }

        let axis = depth % dimensions;
        // Stable sort keeps the median choice deterministic for equal keys,
        // so rebuilding the same batch reproduces the same tree.
        slice.sort_by(|a, b| {
            a.features[axis]
                .partial_cmp(&b.features[axis])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let median = slice.len() / 2;
        let point = slice[median].clone();

        let left = Self::build_recursive(&mut slice[..median], dimensions, depth + 1);
        let right = Self::build_recursive(&mut slice[median + 1..], dimensions, depth + 1);

        Some(Box::new(TreeNode { point, axis, left, right }))
    }

    /// Finds the stored vector closest to `query` under the tree's metric.
    ///
    /// Never fails: an empty tree or a query of the wrong length yields the
    /// unknown result (with a warning for the latter), so batch evaluation
    /// loops survive the occasional corrupt query.
    ///
    /// Average cost is O(log n) node visits on well-balanced trees over
    /// low-to-moderate dimensionality; the hyperplane pruning loses its
    /// bite as dimensionality grows and the walk degrades toward O(n).
    pub fn nearest(&self, query: &[F]) -> Classification<L> {
        if self.root.is_none() {
            return Classification::unknown();
        }
        if query.len() != self.dimensions {
            log::warn!(
                "query has {} components but the tree was built over {}; returning unknown",
                query.len(),
                self.dimensions
            );
            return Classification::unknown();
        }

        let mut best = Classification::unknown();
        Self::search_recursive(&self.root, query, self.metric, &mut best);
        best
    }

    fn search_recursive(
        node_opt: &Option<Box<TreeNode<F, L>>>,
        query: &[F],
        metric: Distance,
        best: &mut Classification<L>,
    ) {
        let Some(node) = node_opt else {
            return;
        };

        // Strict `<`: on exact ties the first candidate visited wins.
        let distance = metric.between(query, &node.point.features);
        if distance < best.distance {
            best.distance = distance;
            best.label = Some(node.point.label.clone());
        }

        let query_coord = query[node.axis].as_();
        let pivot_coord = node.point.features[node.axis].as_();

        // The subtree on the query's side of the splitting plane first.
        let (nearer, further) = if query_coord < pivot_coord {
            (&node.left, &node.right)
        } else {
            (&node.right, &node.left)
        };

        Self::search_recursive(nearer, query, metric, best);

        // The far side can only hold a closer point if the plane itself is
        // closer than the best match so far.
        if metric.plane_gap(query_coord, pivot_coord) < best.distance {
            Self::search_recursive(further, query, metric, best);
        }
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Dimensionality of the stored vectors; 0 for an empty tree.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn metric(&self) -> Distance {
        self.metric
    }

    /// Longest root-to-leaf path, in nodes. 0 for an empty tree.
    pub fn height(&self) -> usize {
        Self::subtree_height(&self.root)
    }

    fn subtree_height(node: &Option<Box<TreeNode<F, L>>>) -> usize {
        node.as_ref().map_or(0, |n| {
            1 + Self::subtree_height(&n.left).max(Self::subtree_height(&n.right))
        })
    }
}

impl<F, L> KdTree<F, L>
where
    F: Float + AsPrimitive<f64> + Send + Sync,
    L: Clone + Send + Sync,
{
    /// Below this many vectors a subtree is built serially; the two halves
    /// of larger slices build on worker threads.
    const PARALLEL_CUTOFF: usize = 512;

    /// Like [`KdTree::build`], but the two subtree recursions after each
    /// median split run in parallel. The halves own disjoint data, so no
    /// synchronization is involved; the resulting tree is identical to the
    /// serial build.
    pub fn build_parallel(
        mut points: Vec<FeatureVector<F, L>>,
        metric: Distance,
    ) -> Result<Self, ClassifyError> {
        let dimensions = Self::batch_dimensions(&points)?;
        let len = points.len();
        log::debug!("building {dimensions}-d tree over {len} vectors with parallel splits");
        let root = if len == 0 {
            None
        } else {
            Self::build_recursive_parallel(&mut points, dimensions, 0)
        };
        Ok(KdTree { root, dimensions, metric, len })
    }

    fn build_recursive_parallel(
        slice: &mut [FeatureVector<F, L>],
        dimensions: usize,
        depth: usize,
    ) -> Option<Box<TreeNode<F, L>>> {
        if slice.len() < Self::PARALLEL_CUTOFF {
            return Self::build_recursive(slice, dimensions, depth);
        }

        let axis = depth % dimensions;
        slice.sort_by(|a, b| {
            a.features[axis]
                .partial_cmp(&b.features[axis])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let median = slice.len() / 2;
        let point = slice[median].clone();

        let (left_half, rest) = slice.split_at_mut(median);
        let right_half = &mut rest[1..];
        let (left, right) = rayon::join(
            || Self::build_recursive_parallel(left_half, dimensions, depth + 1),
            || Self::build_recursive_parallel(right_half, dimensions, depth + 1),
        );

        Some(Box::new(TreeNode { point, axis, left, right }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn fv(features: Vec<f64>, label: &str) -> FeatureVector<f64, String> {
        FeatureVector::new(features, label.to_string())
    }

    fn check_node<'a>(
        node_opt: &'a Option<Box<TreeNode<f64, String>>>,
        features: &[f64],
        label: &str,
        axis: usize,
    ) -> &'a TreeNode<f64, String> {
        let node = node_opt.as_ref().expect("node should exist");
        assert_eq!(node.point.features, features, "node features mismatch");
        assert_eq!(node.point.label, label, "node label mismatch");
        assert_eq!(node.axis, axis, "node axis mismatch");
        node
    }

    /// Preorder (features, axis) walk, for structural comparisons.
    fn preorder(
        node: &Option<Box<TreeNode<f64, String>>>,
        out: &mut Vec<(Vec<f64>, usize)>,
    ) {
        if let Some(n) = node {
            out.push((n.point.features.clone(), n.axis));
            preorder(&n.left, out);
            preorder(&n.right, out);
        }
    }

    fn brute_force_nearest(
        points: &[FeatureVector<f64, String>],
        query: &[f64],
        metric: Distance,
    ) -> Classification<String> {
        let mut best = Classification::unknown();
        for p in points {
            let d = metric.between(query, &p.features);
            if d < best.distance {
                best.distance = d;
                best.label = Some(p.label.clone());
            }
        }
        best
    }

    #[test]
    fn empty_batch_builds_empty_tree() {
        let tree = KdTree::<f64, String>::build(vec![], Distance::Euclidean).unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.height(), 0);
        assert!(tree.nearest(&[1.0, 2.0]).is_unknown());
    }

    #[test]
    fn zero_dimensional_vectors_are_rejected() {
        let result = KdTree::build(vec![fv(vec![], "a")], Distance::Euclidean);
        assert!(matches!(result, Err(ClassifyError::EmptyFeatures)));
    }

    #[test]
    fn mixed_dimensionality_is_rejected() {
        let points = vec![fv(vec![1.0, 2.0], "a"), fv(vec![3.0], "b")];
        match KdTree::build(points, Distance::Euclidean) {
            Err(ClassifyError::DimensionMismatch { expected, found }) => {
                assert_eq!(expected, 2);
                assert_eq!(found, 1);
            }
            other => panic!("expected DimensionMismatch, got {other:?}"),
        }
    }

    #[test]
    fn single_vector_tree() {
        let tree = KdTree::build(vec![fv(vec![1.0, 2.0], "only")], Distance::Euclidean).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.height(), 1);
        let root = check_node(&tree.root, &[1.0, 2.0], "only", 0);
        assert!(root.left.is_none());
        assert!(root.right.is_none());
    }

    #[test]
    fn median_split_structure_2d() {
        let points = vec![
            fv(vec![2.0, 3.0], "p1"),
            fv(vec![5.0, 4.0], "p2"),
            fv(vec![9.0, 6.0], "p3"),
            fv(vec![4.0, 7.0], "p4"),
            fv(vec![8.0, 1.0], "p5"),
            fv(vec![7.0, 2.0], "p6"),
        ];
        let tree = KdTree::build(points, Distance::Euclidean).unwrap();
        assert_eq!(tree.len(), 6);

        // Sorted on x the median is (7,2); its halves split again on y.
        let root = check_node(&tree.root, &[7.0, 2.0], "p6", 0);
        let left = check_node(&root.left, &[5.0, 4.0], "p2", 1);
        let right = check_node(&root.right, &[9.0, 6.0], "p3", 1);

        check_node(&left.left, &[2.0, 3.0], "p1", 0);
        check_node(&left.right, &[4.0, 7.0], "p4", 0);
        check_node(&right.left, &[8.0, 1.0], "p5", 0);
        assert!(right.right.is_none());
    }

    #[test]
    fn nearest_finds_exact_member_at_distance_zero() {
        let points = vec![
            fv(vec![2.0, 3.0], "a"),
            fv(vec![5.0, 4.0], "b"),
            fv(vec![9.0, 6.0], "c"),
            fv(vec![8.0, 1.0], "d"),
        ];
        let tree = KdTree::build(points, Distance::Euclidean).unwrap();
        let result = tree.nearest(&[9.0, 6.0]);
        assert_eq!(result.label.as_deref(), Some("c"));
        assert_relative_eq!(result.distance, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn nearest_two_cluster_scenario() {
        let points = vec![
            fv(vec![0.0, 0.0], "a"),
            fv(vec![10.0, 10.0], "b"),
            fv(vec![1.0, 1.0], "a"),
        ];
        let tree = KdTree::build(points, Distance::Euclidean).unwrap();
        let result = tree.nearest(&[0.5, 0.5]);
        assert_eq!(result.label.as_deref(), Some("a"));
        assert_relative_eq!(result.distance, 0.5_f64.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn query_of_wrong_length_degrades_to_unknown() {
        let tree = KdTree::build(vec![fv(vec![1.0, 2.0], "a")], Distance::Euclidean).unwrap();
        let result = tree.nearest(&[1.0, 2.0, 3.0]);
        assert!(result.is_unknown());
        assert!(result.distance.is_infinite());
    }

    #[test]
    fn rebuilding_the_same_batch_reproduces_the_structure() {
        let points: Vec<_> = [
            (3.0, 1.0),
            (1.0, 3.0),
            (3.0, 7.0),
            (5.0, 5.0),
            (3.0, 2.0), // duplicate x values exercise the stable tie order
            (9.0, 0.0),
            (0.0, 9.0),
        ]
        .iter()
        .enumerate()
        .map(|(i, &(x, y))| fv(vec![x, y], &format!("l{i}")))
        .collect();

        let first = KdTree::build(points.clone(), Distance::Euclidean).unwrap();
        let second = KdTree::build(points, Distance::Euclidean).unwrap();

        let (mut a, mut b) = (Vec::new(), Vec::new());
        preorder(&first.root, &mut a);
        preorder(&second.root, &mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn parallel_build_matches_serial_structure() {
        let mut rng = StdRng::seed_from_u64(7);
        let points: Vec<_> = (0..2000)
            .map(|i| {
                fv(vec![rng.gen_range(0.0..100.0), rng.gen_range(0.0..100.0)], &format!("l{i}"))
            })
            .collect();

        let serial = KdTree::build(points.clone(), Distance::Euclidean).unwrap();
        let parallel = KdTree::build_parallel(points, Distance::Euclidean).unwrap();

        let (mut a, mut b) = (Vec::new(), Vec::new());
        preorder(&serial.root, &mut a);
        preorder(&parallel.root, &mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn height_stays_logarithmic() {
        let points: Vec<_> =
            (0..127).map(|i| fv(vec![f64::from(i), f64::from(127 - i)], "l")).collect();
        let tree = KdTree::build(points, Distance::Euclidean).unwrap();
        assert_eq!(tree.len(), 127);
        // ceil(log2(128)) = 7; allow a small constant on top.
        assert!(tree.height() <= 8, "height {} exceeds bound", tree.height());
    }

    #[test]
    fn agrees_with_brute_force_across_metrics() {
        let mut rng = StdRng::seed_from_u64(42);
        // Non-negative components keep chi-square well defined.
        let points: Vec<_> = (0..300)
            .map(|i| {
                let features: Vec<f64> = (0..4).map(|_| rng.gen_range(0.0..1.0)).collect();
                FeatureVector::new(features, format!("l{}", i % 7))
            })
            .collect();

        for metric in [Distance::Euclidean, Distance::Manhattan, Distance::ChiSquare] {
            let tree = KdTree::build(points.clone(), metric).unwrap();
            for _ in 0..60 {
                let query: Vec<f64> = (0..4).map(|_| rng.gen_range(0.0..1.0)).collect();
                let from_tree = tree.nearest(&query);
                let from_scan = brute_force_nearest(&points, &query, metric);
                assert_relative_eq!(
                    from_tree.distance,
                    from_scan.distance,
                    epsilon = 1e-9
                );
            }
        }
    }
}
