//! k-means clustering with k-means++ seeding over planar `[x, y]` coordinates.
//!
//! Coordinates are clustered in degree space (x = longitude, y = latitude),
//! which is what the marker grouping needs at state scale. Seeding uses a
//! seeded RNG so the same input and seed always produce the same partition.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Parameters for a single k-means run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KMeansParams {
    /// Upper bound on Lloyd iterations.
    pub max_iterations: usize,
    /// Seed for k-means++ initialisation.
    pub seed: u64,
}

impl Default for KMeansParams {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            seed: 42,
        }
    }
}

/// Output of a k-means run.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansResult {
    /// Cluster centres, `k` of them (or `n` when `k >= n`).
    pub centroids: Vec<[f64; 2]>,
    /// Index into `centroids` for every input point.
    pub assignments: Vec<usize>,
    /// Lloyd iterations actually run.
    pub iterations: usize,
}

impl KMeansResult {
    fn empty() -> Self {
        Self {
            centroids: vec![],
            assignments: vec![],
            iterations: 0,
        }
    }

    /// Number of points assigned to each centroid.
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0usize; self.centroids.len()];
        for &c in &self.assignments {
            sizes[c] += 1;
        }
        sizes
    }
}

#[inline]
fn squared_dist(a: &[f64; 2], b: &[f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx * dx + dy * dy
}

fn nearest(point: &[f64; 2], centroids: &[[f64; 2]]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (j, c) in centroids.iter().enumerate() {
        let d = squared_dist(point, c);
        if d < best_dist {
            best_dist = d;
            best = j;
        }
    }
    best
}

/// k-means++ seeding: first centre uniform, each next centre drawn with
/// probability proportional to squared distance from the closest chosen centre.
fn seed_centroids(points: &[[f64; 2]], k: usize, rng: &mut StdRng) -> Vec<[f64; 2]> {
    let n = points.len();
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.gen_range(0..n)]);

    let mut dists: Vec<f64> = points
        .iter()
        .map(|p| squared_dist(p, &centroids[0]))
        .collect();

    while centroids.len() < k {
        let total: f64 = dists.iter().sum();
        let chosen = if total <= f64::EPSILON {
            // All remaining points coincide with a centre
            rng.gen_range(0..n)
        } else {
            let threshold = rng.gen_range(0.0..total);
            let mut cumulative = 0.0;
            let mut chosen = n - 1;
            for (i, d) in dists.iter().enumerate() {
                cumulative += d;
                if cumulative > threshold {
                    chosen = i;
                    break;
                }
            }
            chosen
        };

        let centre = points[chosen];
        centroids.push(centre);
        for (d, p) in dists.iter_mut().zip(points) {
            *d = d.min(squared_dist(p, &centre));
        }
    }

    centroids
}

/// Run k-means on `points`.
///
/// - Empty input or `k == 0` returns an empty result.
/// - `k >= n` puts every point in its own cluster.
/// - A cluster that loses all its members keeps its previous centre.
///
/// # Example
/// ```
/// use outdoor_atlas::kmeans::{kmeans, KMeansParams};
///
/// let points = vec![[0.0, 0.0], [0.1, 0.0], [10.0, 10.0], [10.1, 10.0]];
/// let result = kmeans(&points, 2, &KMeansParams::default());
/// assert_eq!(result.centroids.len(), 2);
/// assert_eq!(result.assignments[0], result.assignments[1]);
/// assert_ne!(result.assignments[0], result.assignments[2]);
/// ```
pub fn kmeans(points: &[[f64; 2]], k: usize, params: &KMeansParams) -> KMeansResult {
    let n = points.len();
    if n == 0 || k == 0 {
        return KMeansResult::empty();
    }
    if k >= n {
        return KMeansResult {
            centroids: points.to_vec(),
            assignments: (0..n).collect(),
            iterations: 0,
        };
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut centroids = seed_centroids(points, k, &mut rng);
    let mut assignments: Vec<usize> = points.iter().map(|p| nearest(p, &centroids)).collect();
    let mut iterations = 0;

    while iterations < params.max_iterations {
        iterations += 1;

        // Update step
        let mut sums = vec![[0.0f64; 2]; k];
        let mut counts = vec![0usize; k];
        for (p, &c) in points.iter().zip(&assignments) {
            sums[c][0] += p[0];
            sums[c][1] += p[1];
            counts[c] += 1;
        }
        for j in 0..k {
            if counts[j] > 0 {
                centroids[j] = [sums[j][0] / counts[j] as f64, sums[j][1] / counts[j] as f64];
            }
        }

        // Assignment step
        let mut changed = false;
        for (p, a) in points.iter().zip(assignments.iter_mut()) {
            let best = nearest(p, &centroids);
            if *a != best {
                *a = best;
                changed = true;
            }
        }

        if !changed {
            break;
        }
    }

    KMeansResult {
        centroids,
        assignments,
        iterations,
    }
}
