//! K-means clustering of 3D points carrying an arbitrary payload.
//!
//! Points live in a caller-owned arena (a slice). The engine only keeps an
//! assignment array (`assignment[i]` is the cluster of point `i`) and one
//! centroid per cluster, so the assign and update steps are plain passes over
//! slices.
//!
//! ```
//! use dominant_color_wasm::kmeans::KMeans;
//! use rand::{SeedableRng, rngs::StdRng};
//!
//! let points = [[0.0, 0.0, 0.0], [0.1, 0.0, 0.0], [5.0, 5.0, 5.0], [5.1, 5.0, 5.0]];
//! let clustering = KMeans::new(2)?.fit(&points, &mut StdRng::seed_from_u64(1))?;
//!
//! let clusters = clustering.clusters();
//! assert_eq!(clusters.iter().map(|c| c.count()).sum::<usize>(), 4);
//! assert_eq!(clustering.cluster_of(0), clustering.cluster_of(1));
//! assert_ne!(clustering.cluster_of(0), clustering.cluster_of(2));
//! # Ok::<(), dominant_color_wasm::ExtractError>(())
//! ```

use rand::Rng;

use crate::{ExtractError, Result};

/// Default bound on Lloyd iterations.
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Anything with a position in 3D Euclidean space.
pub trait Point {
    fn position(&self) -> [f64; 3];
}

impl Point for [f64; 3] {
    fn position(&self) -> [f64; 3] {
        *self
    }
}

#[inline(always)]
pub fn distance_squared(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    dx * dx + dy * dy + dz * dz
}

#[inline(always)]
pub fn distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    distance_squared(a, b).sqrt()
}

/// K-means++ seeded, Lloyd iterated clustering.
#[derive(Debug, Clone, Copy)]
pub struct KMeans {
    k: usize,
    max_iterations: usize,
}

impl KMeans {
    /// Engine producing `k` clusters. `k` must be at least 2.
    pub fn new(k: usize) -> Result<Self> {
        if k < 2 {
            return Err(ExtractError::invalid_parameter("k", k));
        }
        Ok(Self {
            k,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        })
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Cluster `points`.
    ///
    /// When there are fewer points than `k`, `min(k, points.len())` clusters are
    /// formed instead. Duplicate points may still leave some clusters empty; those
    /// are kept in place. Hitting the iteration bound is not an error, the last
    /// state is returned with `converged() == false`.
    ///
    /// # Errors
    ///
    /// `InsufficientData` when `points` is empty.
    pub fn fit<'a, P: Point, R: Rng>(
        &self,
        points: &'a [P],
        rng: &mut R,
    ) -> Result<Clustering<'a, P>> {
        if points.is_empty() {
            return Err(ExtractError::InsufficientData {
                points: 0,
                required: 1,
            });
        }

        let positions: Vec<[f64; 3]> = points.iter().map(Point::position).collect();
        let k = self.k.min(positions.len());
        if k < self.k {
            tracing::debug!(requested = self.k, effective = k, "Fewer points than clusters");
        }

        let mut centroids = seed_plus_plus(&positions, k, rng);
        let mut assignment = vec![usize::MAX; positions.len()];
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.max_iterations {
            iterations += 1;

            let changed = assign(&positions, &centroids, &mut assignment);
            tracing::trace!(iteration = iterations, changed, "Lloyd assignment step");
            if changed == 0 {
                converged = true;
                break;
            }

            update_centroids(&positions, &assignment, &mut centroids);
        }

        if converged {
            tracing::debug!(iterations, k, "K-means converged");
        } else {
            tracing::debug!(iterations, k, "K-means stopped at iteration bound");
        }

        Ok(Clustering {
            points,
            centroids,
            assignment,
            iterations,
            converged,
        })
    }
}

/// K-means++ seeding: the first centroid is uniform, every next one is drawn with
/// probability proportional to its squared distance from the closest centroid
/// chosen so far.
fn seed_plus_plus<R: Rng>(positions: &[[f64; 3]], k: usize, rng: &mut R) -> Vec<[f64; 3]> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(positions[rng.random_range(0..positions.len())]);

    let mut nearest: Vec<f64> = positions
        .iter()
        .map(|p| distance_squared(p, &centroids[0]))
        .collect();

    while centroids.len() < k {
        let total: f64 = nearest.iter().sum();

        let chosen = if total > 0.0 {
            let target = rng.random::<f64>() * total;
            pick_weighted(&nearest, target)
        } else {
            // every point already coincides with a centroid
            rng.random_range(0..positions.len())
        };

        let centroid = positions[chosen];
        for (d, p) in nearest.iter_mut().zip(positions) {
            *d = d.min(distance_squared(p, &centroid));
        }
        centroids.push(centroid);
    }

    centroids
}

/// Index at which the running sum of `weights` first exceeds `target`.
fn pick_weighted(weights: &[f64], target: f64) -> usize {
    let mut cumulative = 0.0;
    let mut last_positive = 0;
    for (i, &w) in weights.iter().enumerate() {
        if w <= 0.0 {
            continue;
        }
        cumulative += w;
        last_positive = i;
        if cumulative > target {
            return i;
        }
    }
    // rounding left target at or past the sum
    last_positive
}

/// Assign every point to its nearest centroid, lowest index on ties.
/// Returns how many assignments changed.
fn assign(positions: &[[f64; 3]], centroids: &[[f64; 3]], assignment: &mut [usize]) -> usize {
    let mut changed = 0;
    for (p, slot) in positions.iter().zip(assignment.iter_mut()) {
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (idx, c) in centroids.iter().enumerate() {
            let d = distance_squared(p, c);
            if d < best_dist {
                best_dist = d;
                best = idx;
            }
        }
        if *slot != best {
            *slot = best;
            changed += 1;
        }
    }
    changed
}

/// Move every centroid to the mean of its points. Empty clusters keep their centroid.
fn update_centroids(positions: &[[f64; 3]], assignment: &[usize], centroids: &mut [[f64; 3]]) {
    let mut sums = vec![[0.0f64; 3]; centroids.len()];
    let mut counts = vec![0usize; centroids.len()];

    for (p, &cluster) in positions.iter().zip(assignment) {
        let sum = &mut sums[cluster];
        sum[0] += p[0];
        sum[1] += p[1];
        sum[2] += p[2];
        counts[cluster] += 1;
    }

    for ((centroid, sum), &count) in centroids.iter_mut().zip(&sums).zip(&counts) {
        if count > 0 {
            let n = count as f64;
            *centroid = [sum[0] / n, sum[1] / n, sum[2] / n];
        }
    }
}

/// Final state of a k-means run over a borrowed point arena.
#[derive(Debug, Clone)]
pub struct Clustering<'a, P> {
    points: &'a [P],
    centroids: Vec<[f64; 3]>,
    assignment: Vec<usize>,
    iterations: usize,
    converged: bool,
}

impl<'a, P: Point> Clustering<'a, P> {
    /// Number of clusters, empty ones included.
    pub fn len(&self) -> usize {
        self.centroids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centroids.is_empty()
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn converged(&self) -> bool {
        self.converged
    }

    pub fn points(&self) -> &'a [P] {
        self.points
    }

    pub fn centroids(&self) -> &[[f64; 3]] {
        &self.centroids
    }

    /// Cluster index of the point at `point_index`.
    pub fn cluster_of(&self, point_index: usize) -> Option<usize> {
        self.assignment.get(point_index).copied()
    }

    /// One view per cluster, in index order. Empty clusters are included.
    pub fn clusters(&self) -> Vec<Cluster<'a, P>> {
        let mut members: Vec<Vec<usize>> = vec![Vec::new(); self.centroids.len()];
        for (i, &cluster) in self.assignment.iter().enumerate() {
            members[cluster].push(i);
        }

        members
            .into_iter()
            .zip(&self.centroids)
            .enumerate()
            .map(|(index, (members, &centroid))| Cluster {
                index,
                centroid,
                points: self.points,
                members,
            })
            .collect()
    }
}

/// A cluster: its position in the clustering, centroid and member points.
#[derive(Debug, Clone)]
pub struct Cluster<'a, P> {
    index: usize,
    centroid: [f64; 3],
    points: &'a [P],
    members: Vec<usize>,
}

impl<'a, P: Point> Cluster<'a, P> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn centroid(&self) -> [f64; 3] {
        self.centroid
    }

    /// Number of assigned points
    pub fn count(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> impl Iterator<Item = &'a P> + '_ {
        self.members.iter().map(|&i| &self.points[i])
    }

    /// The member point nearest to the centroid, first one on ties.
    ///
    /// Unlike the centroid itself this is a color that actually occurs in the input.
    pub fn closest_real_point(&self) -> Option<&'a P> {
        let mut best: Option<(&'a P, f64)> = None;
        for &i in &self.members {
            let point = &self.points[i];
            let d = distance_squared(&point.position(), &self.centroid);
            if best.is_none_or(|(_, best_d)| d < best_d) {
                best = Some((point, d));
            }
        }
        best.map(|(point, _)| point)
    }

    /// Euclidean distance between the two centroids
    pub fn distance_to(&self, other: &Cluster<'_, P>) -> f64 {
        distance(&self.centroid, &other.centroid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    fn blobs() -> Vec<[f64; 3]> {
        let mut points = Vec::new();
        for i in 0..20 {
            let jitter = i as f64 * 0.01;
            points.push([jitter, 0.0, 0.0]);
            points.push([10.0 + jitter, 10.0, 0.0]);
            points.push([0.0, 10.0 + jitter, 10.0]);
        }
        points
    }

    #[test]
    fn test_k_below_two_is_rejected() {
        assert!(matches!(
            KMeans::new(1),
            Err(ExtractError::InvalidParameter { .. })
        ));
        assert_eq!(KMeans::new(2).unwrap().k(), 2);
    }

    #[test]
    fn test_empty_input_is_insufficient() {
        let points: Vec<[f64; 3]> = Vec::new();
        let result = KMeans::new(3).unwrap().fit(&points, &mut StdRng::seed_from_u64(0));
        assert!(matches!(
            result,
            Err(ExtractError::InsufficientData { points: 0, .. })
        ));
    }

    #[test]
    fn test_separates_well_spaced_blobs() {
        let points = blobs();
        for seed in 0..10 {
            let clustering = KMeans::new(3)
                .unwrap()
                .fit(&points, &mut StdRng::seed_from_u64(seed))
                .unwrap();

            assert!(clustering.converged());
            let clusters = clustering.clusters();
            assert_eq!(clusters.len(), 3);
            for cluster in &clusters {
                assert_eq!(cluster.count(), 20, "seed {seed}");
                let first = cluster.members().next().unwrap();
                assert!(cluster.members().all(|p| distance(p, first) < 1.0));
            }
        }
    }

    #[test]
    fn test_plus_plus_never_seeds_on_a_chosen_point_when_others_remain() {
        let points = [[0.0, 0.0, 0.0], [0.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
        for seed in 0..20 {
            let seeds = seed_plus_plus(&points, 2, &mut StdRng::seed_from_u64(seed));
            assert!(distance(&seeds[0], &seeds[1]) > 0.5, "seed {seed}");
        }
    }

    #[test]
    fn test_plus_plus_weights_by_squared_distance() {
        let origin = [0.0, 0.0, 0.0];
        let near = [1.0, 0.0, 0.0];
        let far = [0.0, 3.0, 0.0];
        let points = [origin, near, far];

        let (mut near_hits, mut far_hits) = (0u32, 0u32);
        for seed in 0..3000 {
            let seeds = seed_plus_plus(&points, 2, &mut StdRng::seed_from_u64(seed));
            if seeds[0] != origin {
                continue;
            }
            if seeds[1] == near {
                near_hits += 1;
            } else if seeds[1] == far {
                far_hits += 1;
            }
        }

        // weights 1 and 9
        let total = (near_hits + far_hits) as f64;
        assert!(total > 500.0, "{total} runs started at the origin");
        let far_share = far_hits as f64 / total;
        assert!((0.85..=0.95).contains(&far_share), "far share {far_share}");
    }

    #[test]
    fn test_identical_points_leave_extra_clusters_empty() {
        let points = vec![[0.5, 0.5, 0.5]; 30];
        let clustering = KMeans::new(4)
            .unwrap()
            .fit(&points, &mut StdRng::seed_from_u64(3))
            .unwrap();

        let counts: Vec<usize> = clustering.clusters().iter().map(Cluster::count).collect();
        assert_eq!(counts, vec![30, 0, 0, 0]);
    }

    #[test]
    fn test_fewer_points_than_clusters_shrinks_k() {
        let points = [[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]];
        let engine = KMeans::new(5).unwrap();
        let clustering = engine.fit(&points, &mut StdRng::seed_from_u64(9)).unwrap();

        assert_eq!(engine.k(), 5);
        assert_eq!(clustering.len(), 2);
        assert_eq!(clustering.points(), &points[..]);
        assert!(clustering.clusters().iter().all(|c| c.count() == 1));
    }

    #[test]
    fn test_iteration_bound_is_a_soft_stop() {
        let points = blobs();
        let clustering = KMeans::new(3)
            .unwrap()
            .with_max_iterations(1)
            .fit(&points, &mut StdRng::seed_from_u64(5))
            .unwrap();

        assert_eq!(clustering.iterations(), 1);
        assert!(!clustering.converged());
        assert_eq!(
            clustering.clusters().iter().map(Cluster::count).sum::<usize>(),
            points.len()
        );
    }

    #[test]
    fn test_same_seed_same_result() {
        let points = blobs();
        let run = |seed| {
            let clustering = KMeans::new(4)
                .unwrap()
                .fit(&points, &mut StdRng::seed_from_u64(seed))
                .unwrap();
            (clustering.centroids().to_vec(), clustering.assignment.clone())
        };
        assert_eq!(run(11), run(11));
    }

    #[test]
    fn test_closest_real_point_and_distance() {
        let points = [[0.0, 0.0, 0.0], [0.9, 0.0, 0.0], [2.0, 0.0, 0.0], [9.0, 0.0, 0.0]];
        let clustering = Clustering {
            points: &points,
            centroids: vec![[1.0, 0.0, 0.0], [9.0, 0.0, 0.0]],
            assignment: vec![0, 0, 0, 1],
            iterations: 1,
            converged: true,
        };
        let clusters = clustering.clusters();

        assert_eq!(clusters[0].closest_real_point(), Some(&[0.9, 0.0, 0.0]));
        assert_eq!(clusters[1].closest_real_point(), Some(&[9.0, 0.0, 0.0]));
        assert_eq!(clusters[0].distance_to(&clusters[1]), 8.0);
    }

    #[test]
    fn test_empty_cluster_has_no_representative() {
        let points = [[0.0, 0.0, 0.0]];
        let clustering = Clustering {
            points: &points,
            centroids: vec![[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]],
            assignment: vec![0],
            iterations: 1,
            converged: true,
        };
        let clusters = clustering.clusters();
        assert!(clusters[1].is_empty());
        assert_eq!(clusters[1].closest_real_point(), None);
    }

    #[test]
    fn test_pick_weighted_skips_zero_weights() {
        let weights = [0.0, 2.0, 0.0, 1.0];
        assert_eq!(pick_weighted(&weights, 0.0), 1);
        assert_eq!(pick_weighted(&weights, 1.99), 1);
        assert_eq!(pick_weighted(&weights, 2.5), 3);
        assert_eq!(pick_weighted(&weights, 3.0), 3);
    }
}
