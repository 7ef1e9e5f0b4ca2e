// UMAP-style projection.
//
// Steps:
// 1. Exact k-nearest neighbours under the configured metric
// 2. Per-point smoothing (rho = nearest non-zero distance, sigma by binary
//    search) turning distances into fuzzy memberships
// 3. Fuzzy union of the directed graph: P = A + Aᵀ - A∘Aᵀ
// 4. Fit the output-space curve 1 / (1 + a·d^(2b)) to min_dist
// 5. Random initial layout, then epoch-scheduled SGD with negative sampling
//
// Inputs are a single page's paragraphs, so neighbours are found by brute
// force over a dense distance matrix.

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::{DimensionReducer, ProjectionConfig};

/// Negative samples drawn per positive edge sample.
const NEGATIVE_SAMPLE_RATE: f64 = 5.0;
/// Gradient components are clipped to this magnitude.
const GRADIENT_CLIP: f64 = 4.0;
/// Binary search budget and tolerance for sigma.
const SMOOTH_K_ITERATIONS: usize = 64;
const SMOOTH_K_TOLERANCE: f64 = 1e-5;
/// Floor for sigma, relative to the mean neighbour distance.
const MIN_K_DIST_SCALE: f64 = 1e-3;
/// Output-space scale used when fitting a and b.
const SPREAD: f64 = 1.0;
/// Initial coordinates are drawn uniformly from [-INIT_RANGE, INIT_RANGE].
const INIT_RANGE: f64 = 10.0;

/// Graph-based manifold projection configured by a `ProjectionConfig`.
#[derive(Debug, Clone)]
pub struct Umap {
    config: ProjectionConfig,
}

impl Umap {
    pub fn new(config: ProjectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProjectionConfig {
        &self.config
    }
}

impl DimensionReducer for Umap {
    fn fit_transform(&self, data: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        self.config.validate()?;

        let n = data.len();
        if n == 0 {
            anyhow::bail!("Cannot project an empty set of points");
        }
        let input_dims = data[0].len();
        if input_dims == 0 {
            anyhow::bail!("Cannot project zero-dimensional points");
        }
        if let Some((i, row)) = data.iter().enumerate().find(|(_, r)| r.len() != input_dims) {
            anyhow::bail!(
                "Dimension mismatch at row {i}: expected {input_dims}, got {}",
                row.len()
            );
        }

        let dim = self.config.n_components;
        if n == 1 {
            return Ok(vec![vec![0.0; dim]]);
        }

        let k = self.config.n_neighbors.min(n);
        let (knn_indices, knn_dists) = nearest_neighbors(data, k, &self.config);
        let (sigmas, rhos) = smooth_knn_dist(&knn_dists, k);
        let graph = fuzzy_union(&knn_indices, &knn_dists, &sigmas, &rhos, n);

        let n_epochs = self
            .config
            .n_epochs
            .unwrap_or(if n <= 10_000 { 500 } else { 200 });
        let edges = graph_edges(&graph, n, n_epochs);
        let (a, b) = find_ab_params(SPREAD, self.config.min_dist);

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let mut embedding: Vec<f64> = (0..n * dim)
            .map(|_| rng.random_range(-INIT_RANGE..INIT_RANGE))
            .collect();

        debug!(
            points = n,
            n_neighbors = k,
            edges = edges.len(),
            n_epochs = n_epochs,
            a = %format!("{:.4}", a),
            b = %format!("{:.4}", b),
            "Optimising projection layout"
        );

        optimize_layout(&mut embedding, dim, n, &edges, n_epochs, a, b, &mut rng);

        Ok(embedding.chunks(dim).map(|row| row.to_vec()).collect())
    }
}

/// Exact k-nearest neighbours, the point itself included as the first
/// neighbour at distance zero. Ties break on index so results are stable.
fn nearest_neighbors(
    data: &[Vec<f64>],
    k: usize,
    config: &ProjectionConfig,
) -> (Vec<Vec<usize>>, Vec<Vec<f64>>) {
    let n = data.len();
    let mut indices = Vec::with_capacity(n);
    let mut dists = Vec::with_capacity(n);

    for i in 0..n {
        let mut row: Vec<(usize, f64)> = (0..n)
            .filter(|&j| j != i)
            .map(|j| (j, config.metric.distance(&data[i], &data[j])))
            .collect();
        row.sort_by(|x, y| {
            x.1.partial_cmp(&y.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(x.0.cmp(&y.0))
        });

        let mut row_idx = Vec::with_capacity(k);
        let mut row_dist = Vec::with_capacity(k);
        row_idx.push(i);
        row_dist.push(0.0);
        for (j, d) in row.into_iter().take(k - 1) {
            row_idx.push(j);
            row_dist.push(d);
        }

        indices.push(row_idx);
        dists.push(row_dist);
    }

    (indices, dists)
}

/// Per-point sigma and rho such that the smoothed memberships of each
/// point's neighbours sum to log2(k).
fn smooth_knn_dist(knn_dists: &[Vec<f64>], k: usize) -> (Vec<f64>, Vec<f64>) {
    let target = (k as f64).log2();
    let n = knn_dists.len();

    let all: Vec<f64> = knn_dists.iter().flatten().copied().collect();
    let mean_distances = if all.is_empty() {
        0.0
    } else {
        all.iter().sum::<f64>() / all.len() as f64
    };

    let mut sigmas = Vec::with_capacity(n);
    let mut rhos = Vec::with_capacity(n);

    for row in knn_dists {
        let rho = row.iter().copied().find(|&d| d > 0.0).unwrap_or(0.0);

        let mut lo = 0.0_f64;
        let mut hi = f64::INFINITY;
        let mut mid = 1.0_f64;

        for _ in 0..SMOOTH_K_ITERATIONS {
            let psum: f64 = row
                .iter()
                .skip(1)
                .map(|&d| {
                    let d = d - rho;
                    if d > 0.0 {
                        (-d / mid).exp()
                    } else {
                        1.0
                    }
                })
                .sum();

            if (psum - target).abs() < SMOOTH_K_TOLERANCE {
                break;
            }

            if psum > target {
                hi = mid;
                mid = (lo + hi) / 2.0;
            } else {
                lo = mid;
                if hi.is_infinite() {
                    mid *= 2.0;
                } else {
                    mid = (lo + hi) / 2.0;
                }
            }
        }

        let floor = if rho > 0.0 {
            let mean_ith = row.iter().sum::<f64>() / row.len() as f64;
            MIN_K_DIST_SCALE * mean_ith
        } else {
            MIN_K_DIST_SCALE * mean_distances
        };

        sigmas.push(mid.max(floor));
        rhos.push(rho);
    }

    (sigmas, rhos)
}

/// Dense symmetric membership matrix (row-major, n × n).
fn fuzzy_union(
    knn_indices: &[Vec<usize>],
    knn_dists: &[Vec<f64>],
    sigmas: &[f64],
    rhos: &[f64],
    n: usize,
) -> Vec<f64> {
    let mut directed = vec![0.0_f64; n * n];

    for i in 0..n {
        for (&j, &d) in knn_indices[i].iter().zip(knn_dists[i].iter()) {
            if j == i {
                continue;
            }
            let shifted = d - rhos[i];
            let w = if shifted <= 0.0 || sigmas[i] == 0.0 {
                1.0
            } else {
                (-shifted / sigmas[i]).exp()
            };
            directed[i * n + j] = w;
        }
    }

    let mut graph = vec![0.0_f64; n * n];
    for i in 0..n {
        for j in 0..n {
            let a = directed[i * n + j];
            let b = directed[j * n + i];
            graph[i * n + j] = a + b - a * b;
        }
    }
    graph
}

/// A sampled edge of the membership graph.
#[derive(Debug, Clone, Copy)]
struct Edge {
    head: usize,
    tail: usize,
    epochs_per_sample: f64,
}

/// Edges worth sampling at least once in `n_epochs`, in row-major order.
fn graph_edges(graph: &[f64], n: usize, n_epochs: usize) -> Vec<Edge> {
    let max_w = graph.iter().copied().fold(0.0_f64, f64::max);
    if max_w <= 0.0 {
        return Vec::new();
    }
    let min_w = max_w / n_epochs as f64;

    let mut edges = Vec::new();
    for head in 0..n {
        for tail in 0..n {
            let w = graph[head * n + tail];
            if head != tail && w > 0.0 && w >= min_w {
                edges.push(Edge {
                    head,
                    tail,
                    epochs_per_sample: max_w / w,
                });
            }
        }
    }
    edges
}

/// Fit a and b so that 1 / (1 + a·x^(2b)) approximates the target
/// membership curve: 1 below min_dist, exponential decay above it.
/// Levenberg–Marquardt on 300 evenly spaced samples over [0, 3·spread].
pub fn find_ab_params(spread: f64, min_dist: f64) -> (f64, f64) {
    const SAMPLES: usize = 300;

    let xs: Vec<f64> = (0..SAMPLES)
        .map(|i| 3.0 * spread * i as f64 / (SAMPLES - 1) as f64)
        .collect();
    let ys: Vec<f64> = xs
        .iter()
        .map(|&x| {
            if x < min_dist {
                1.0
            } else {
                (-(x - min_dist) / spread).exp()
            }
        })
        .collect();

    let sse = |a: f64, b: f64| -> f64 {
        xs.iter()
            .zip(ys.iter())
            .map(|(&x, &y)| {
                let r = 1.0 / (1.0 + a * x.powf(2.0 * b)) - y;
                r * r
            })
            .sum()
    };

    let (mut a, mut b) = (1.0_f64, 1.0_f64);
    let mut lambda = 1e-3;
    let mut cost = sse(a, b);

    for _ in 0..500 {
        let (mut jaa, mut jab, mut jbb, mut ga, mut gb) = (0.0, 0.0, 0.0, 0.0, 0.0);

        for (&x, &y) in xs.iter().zip(ys.iter()) {
            if x <= 0.0 {
                continue;
            }
            let xp = x.powf(2.0 * b);
            let denom = 1.0 + a * xp;
            let r = 1.0 / denom - y;
            let dfa = -xp / (denom * denom);
            let dfb = -2.0 * a * xp * x.ln() / (denom * denom);

            jaa += dfa * dfa;
            jab += dfa * dfb;
            jbb += dfb * dfb;
            ga += dfa * r;
            gb += dfb * r;
        }

        let m_aa = jaa * (1.0 + lambda);
        let m_bb = jbb * (1.0 + lambda);
        let det = m_aa * m_bb - jab * jab;
        if det.abs() < f64::MIN_POSITIVE {
            break;
        }

        let da = (-ga * m_bb + jab * gb) / det;
        let db = (-gb * m_aa + jab * ga) / det;
        let (na, nb) = (a + da, b + db);

        if na > 0.0 && nb > 0.0 {
            let new_cost = sse(na, nb);
            if new_cost < cost {
                let improvement = cost - new_cost;
                a = na;
                b = nb;
                cost = new_cost;
                lambda /= 10.0;
                if improvement < 1e-14 {
                    break;
                }
                continue;
            }
        }

        lambda *= 10.0;
        if lambda > 1e12 {
            break;
        }
    }

    (a, b)
}

fn clip(v: f64) -> f64 {
    v.clamp(-GRADIENT_CLIP, GRADIENT_CLIP)
}

fn squared_distance(embedding: &[f64], dim: usize, i: usize, j: usize) -> f64 {
    (0..dim)
        .map(|d| {
            let diff = embedding[i * dim + d] - embedding[j * dim + d];
            diff * diff
        })
        .sum()
}

/// Epoch-scheduled SGD over the membership graph. Attractive updates move
/// both endpoints; repulsive updates move only the head.
#[allow(clippy::too_many_arguments)]
fn optimize_layout(
    embedding: &mut [f64],
    dim: usize,
    n: usize,
    edges: &[Edge],
    n_epochs: usize,
    a: f64,
    b: f64,
    rng: &mut StdRng,
) {
    let epochs_per_negative: Vec<f64> = edges
        .iter()
        .map(|e| e.epochs_per_sample / NEGATIVE_SAMPLE_RATE)
        .collect();
    let mut next_sample: Vec<f64> = edges.iter().map(|e| e.epochs_per_sample).collect();
    let mut next_negative = epochs_per_negative.clone();
    let mut alpha = 1.0_f64;

    for epoch in 0..n_epochs {
        let epoch_f = epoch as f64;

        for (idx, edge) in edges.iter().enumerate() {
            if next_sample[idx] > epoch_f {
                continue;
            }

            let (j, k) = (edge.head, edge.tail);
            let dist_sq = squared_distance(embedding, dim, j, k);
            let grad_coeff = if dist_sq > 0.0 {
                -2.0 * a * b * dist_sq.powf(b - 1.0) / (a * dist_sq.powf(b) + 1.0)
            } else {
                0.0
            };

            for d in 0..dim {
                let grad =
                    clip(grad_coeff * (embedding[j * dim + d] - embedding[k * dim + d]));
                embedding[j * dim + d] += grad * alpha;
                embedding[k * dim + d] -= grad * alpha;
            }

            next_sample[idx] += edge.epochs_per_sample;

            let n_neg = ((epoch_f - next_negative[idx]) / epochs_per_negative[idx])
                .max(0.0) as usize;

            for _ in 0..n_neg {
                let other = rng.random_range(0..n);
                if other == j {
                    continue;
                }
                let dist_sq = squared_distance(embedding, dim, j, other);
                if dist_sq <= 0.0 {
                    continue;
                }
                let grad_coeff = 2.0 * b / ((0.001 + dist_sq) * (a * dist_sq.powf(b) + 1.0));

                for d in 0..dim {
                    let grad =
                        clip(grad_coeff * (embedding[j * dim + d] - embedding[other * dim + d]));
                    embedding[j * dim + d] += grad * alpha;
                }
            }

            next_negative[idx] += n_neg as f64 * epochs_per_negative[idx];
        }

        alpha = 1.0 - epoch_f / n_epochs as f64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_ab_params_default_min_dist() {
        // Reference values for spread=1.0, min_dist=0.1
        let (a, b) = find_ab_params(1.0, 0.1);
        assert!((a - 1.577).abs() < 0.05, "a = {a}");
        assert!((b - 0.895).abs() < 0.05, "b = {b}");
    }

    #[test]
    fn test_find_ab_params_positive() {
        for min_dist in [0.0, 0.05, 0.25, 0.5, 0.99] {
            let (a, b) = find_ab_params(1.0, min_dist);
            assert!(a > 0.0 && b > 0.0, "min_dist={min_dist}: a={a}, b={b}");
        }
    }

    #[test]
    fn test_nearest_neighbors_self_first() {
        let data = vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![5.0, 0.0]];
        let config = ProjectionConfig {
            metric: super::super::Metric::Euclidean,
            ..ProjectionConfig::clustering()
        };
        let (idx, dist) = nearest_neighbors(&data, 2, &config);
        assert_eq!(idx[0], vec![0, 1]);
        assert_eq!(idx[2], vec![2, 1]);
        assert_eq!(dist[0][0], 0.0);
        assert!((dist[2][1] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_smooth_knn_dist_hits_target() {
        let knn_dists = vec![vec![0.0, 1.0, 2.0, 3.0], vec![0.0, 0.5, 0.7, 4.0]];
        let (sigmas, rhos) = smooth_knn_dist(&knn_dists, 4);
        let target = 4f64.log2();

        for (row, (&sigma, &rho)) in knn_dists.iter().zip(sigmas.iter().zip(rhos.iter())) {
            let psum: f64 = row
                .iter()
                .skip(1)
                .map(|&d| {
                    let d = d - rho;
                    if d > 0.0 {
                        (-d / sigma).exp()
                    } else {
                        1.0
                    }
                })
                .sum();
            assert!((psum - target).abs() < 1e-3, "psum = {psum}");
        }
        assert_eq!(rhos, vec![1.0, 0.5]);
    }

    #[test]
    fn test_fuzzy_union_is_symmetric() {
        let data = vec![
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![4.0, 4.0],
        ];
        let config = ProjectionConfig {
            metric: super::super::Metric::Euclidean,
            ..ProjectionConfig::clustering()
        };
        let (idx, dist) = nearest_neighbors(&data, 3, &config);
        let (sigmas, rhos) = smooth_knn_dist(&dist, 3);
        let graph = fuzzy_union(&idx, &dist, &sigmas, &rhos, 4);

        for i in 0..4 {
            assert_eq!(graph[i * 4 + i], 0.0);
            for j in 0..4 {
                assert!((graph[i * 4 + j] - graph[j * 4 + i]).abs() < 1e-12);
                assert!((0.0..=1.0).contains(&graph[i * 4 + j]));
            }
        }
    }

    #[test]
    fn test_single_point() {
        let umap = Umap::new(ProjectionConfig::visualization());
        let out = umap.fit_transform(&[vec![1.0, 2.0, 3.0]]).unwrap();
        assert_eq!(out, vec![vec![0.0, 0.0]]);
    }

    #[test]
    fn test_empty_input_fails() {
        let umap = Umap::new(ProjectionConfig::visualization());
        assert!(umap.fit_transform(&[]).is_err());
    }

    #[test]
    fn test_ragged_input_fails() {
        let umap = Umap::new(ProjectionConfig::visualization());
        let data = vec![vec![1.0, 2.0], vec![1.0]];
        assert!(umap.fit_transform(&data).is_err());
    }

    #[test]
    fn test_output_shape_and_finite() {
        let data: Vec<Vec<f64>> = (0..12)
            .map(|i| vec![(i as f64).sin(), (i as f64).cos(), i as f64 / 12.0])
            .collect();
        let umap = Umap::new(ProjectionConfig::clustering().with_seed(7));
        let out = umap.fit_transform(&data).unwrap();

        assert_eq!(out.len(), 12);
        for row in &out {
            assert_eq!(row.len(), 2);
            assert!(row.iter().all(|v| v.is_finite()));
        }
    }
}
