// HDBSCAN clustering over projected document coordinates.
//
// Steps:
// 1. Core distances (distance to the min_samples-th nearest point, self included)
// 2. Mutual reachability: MR(a,b) = max(core(a), core(b), dist(a,b))
// 3. Minimum spanning tree with Prim's algorithm
// 4. Single-linkage hierarchy from the sorted MST edges
// 5. Condensed tree: splits smaller than min_cluster_size become points
//    "falling out" of their parent cluster
// 6. Excess-of-mass selection by cluster stability; the root is never
//    selected, so a page without structure comes back as all noise
//
// Label -1 marks noise. Cluster labels are dense, starting at 0.

use std::collections::{BTreeMap, VecDeque};

use anyhow::Result;
use tracing::debug;

use crate::projection::Metric;

/// Label for points that belong to no cluster.
pub const NOISE: i32 = -1;

/// Lambda (1 / distance) is capped so coincident points keep stabilities finite.
const MAX_LAMBDA: f64 = 1e12;

/// Parameters for HDBSCAN clustering.
#[derive(Debug, Clone, PartialEq)]
pub struct HdbscanParams {
    /// Minimum number of points to form a cluster
    pub min_cluster_size: usize,
    /// Neighbourhood size for core distances; defaults to min_cluster_size
    pub min_samples: Option<usize>,
    pub metric: Metric,
}

impl Default for HdbscanParams {
    fn default() -> Self {
        Self {
            min_cluster_size: 5,
            min_samples: None,
            metric: Metric::Euclidean,
        }
    }
}

impl HdbscanParams {
    pub fn with_min_cluster_size(mut self, size: usize) -> Self {
        self.min_cluster_size = size;
        self
    }

    pub fn with_min_samples(mut self, samples: usize) -> Self {
        self.min_samples = Some(samples);
        self
    }

    fn effective_min_samples(&self) -> usize {
        self.min_samples.unwrap_or(self.min_cluster_size)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_cluster_size < 2 {
            anyhow::bail!(
                "min_cluster_size must be at least 2, got {}",
                self.min_cluster_size
            );
        }
        if self.effective_min_samples() == 0 {
            anyhow::bail!("min_samples must be at least 1");
        }
        Ok(())
    }
}

/// Density-based clusterer.
#[derive(Debug, Clone)]
pub struct Hdbscan {
    params: HdbscanParams,
}

impl Hdbscan {
    pub fn new(params: HdbscanParams) -> Self {
        Self { params }
    }

    /// Cluster the points, returning one label per point (-1 for noise).
    pub fn fit(&self, points: &[Vec<f64>]) -> Result<Vec<i32>> {
        self.params.validate()?;

        let n = points.len();
        if n == 0 {
            return Ok(Vec::new());
        }
        let dims = points[0].len();
        if let Some((i, row)) = points.iter().enumerate().find(|(_, r)| r.len() != dims) {
            anyhow::bail!(
                "Dimension mismatch at row {i}: expected {dims}, got {}",
                row.len()
            );
        }
        if n < self.params.min_cluster_size {
            return Ok(vec![NOISE; n]);
        }

        let distances = self.pairwise_distances(points);
        let core = core_distances(&distances, n, self.params.effective_min_samples());
        let mst = minimum_spanning_tree(&distances, &core, n);
        let linkage = SingleLinkage::from_mst(&mst, n);
        let condensed = condense_tree(&linkage, n, self.params.min_cluster_size);
        let labels = select_and_label(&condensed, n);

        debug!(
            points = n,
            clusters = labels.iter().copied().max().map_or(0, |m| m + 1),
            noise = labels.iter().filter(|&&l| l == NOISE).count(),
            "HDBSCAN finished"
        );

        Ok(labels)
    }

    fn pairwise_distances(&self, points: &[Vec<f64>]) -> Vec<f64> {
        let n = points.len();
        let mut distances = vec![0.0_f64; n * n];
        for i in 0..n {
            for j in (i + 1)..n {
                let d = self.params.metric.distance(&points[i], &points[j]);
                distances[i * n + j] = d;
                distances[j * n + i] = d;
            }
        }
        distances
    }
}

/// Distance to the k-th nearest point, the point itself counted first.
fn core_distances(distances: &[f64], n: usize, k: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let mut row: Vec<f64> = distances[i * n..(i + 1) * n].to_vec();
            row.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            row[(k - 1).min(n - 1)]
        })
        .collect()
}

/// Prim's algorithm over mutual reachability distances.
///
/// Returns edges sorted by weight (stable, so ties keep discovery order).
fn minimum_spanning_tree(distances: &[f64], core: &[f64], n: usize) -> Vec<(usize, usize, f64)> {
    let reach = |i: usize, j: usize| distances[i * n + j].max(core[i]).max(core[j]);

    let mut in_tree = vec![false; n];
    let mut min_dist = vec![f64::INFINITY; n];
    let mut min_edge = vec![0usize; n];
    let mut edges = Vec::with_capacity(n.saturating_sub(1));

    in_tree[0] = true;
    for j in 1..n {
        min_dist[j] = reach(0, j);
    }

    for _ in 1..n {
        let mut best = f64::INFINITY;
        let mut best_idx = usize::MAX;
        for j in 0..n {
            if !in_tree[j] && (best_idx == usize::MAX || min_dist[j] < best) {
                best = min_dist[j];
                best_idx = j;
            }
        }

        in_tree[best_idx] = true;
        edges.push((min_edge[best_idx], best_idx, best));

        for j in 0..n {
            if !in_tree[j] {
                let d = reach(best_idx, j);
                if d < min_dist[j] {
                    min_dist[j] = d;
                    min_edge[j] = best_idx;
                }
            }
        }
    }

    edges.sort_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal));
    edges
}

/// Single-linkage dendrogram. Leaves are 0..n; merge `m` creates node n+m.
struct SingleLinkage {
    n: usize,
    merges: Vec<(usize, usize, f64)>,
    sizes: Vec<usize>,
}

impl SingleLinkage {
    fn from_mst(mst: &[(usize, usize, f64)], n: usize) -> Self {
        let total = 2 * n - 1;
        let mut parent: Vec<usize> = (0..total).collect();
        let mut sizes = vec![1usize; total];
        let mut merges = Vec::with_capacity(n - 1);

        fn find(parent: &mut [usize], x: usize) -> usize {
            let mut root = x;
            while parent[root] != root {
                root = parent[root];
            }
            let mut cur = x;
            while parent[cur] != root {
                let next = parent[cur];
                parent[cur] = root;
                cur = next;
            }
            root
        }

        for (m, &(a, b, w)) in mst.iter().enumerate() {
            let ra = find(&mut parent, a);
            let rb = find(&mut parent, b);
            let node = n + m;
            parent[ra] = node;
            parent[rb] = node;
            sizes[node] = sizes[ra] + sizes[rb];
            merges.push((ra, rb, w));
        }

        Self { n, merges, sizes }
    }

    fn root(&self) -> usize {
        2 * self.n - 2
    }

    fn merge(&self, node: usize) -> (usize, usize, f64) {
        self.merges[node - self.n]
    }

    fn size(&self, node: usize) -> usize {
        self.sizes[node]
    }

    /// Breadth-first list of `start` and everything below it.
    fn bfs(&self, start: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut queue = VecDeque::from([start]);
        while let Some(node) = queue.pop_front() {
            out.push(node);
            if node >= self.n {
                let (left, right, _) = self.merge(node);
                queue.push_back(left);
                queue.push_back(right);
            }
        }
        out
    }
}

/// One row of the condensed tree. Cluster ids start at n (the root);
/// children below n are individual points.
#[derive(Debug, Clone, Copy)]
struct CondensedEdge {
    parent: usize,
    child: usize,
    lambda: f64,
    size: usize,
}

fn lambda_of(distance: f64) -> f64 {
    if distance > 0.0 {
        (1.0 / distance).min(MAX_LAMBDA)
    } else {
        MAX_LAMBDA
    }
}

fn condense_tree(linkage: &SingleLinkage, n: usize, min_cluster_size: usize) -> Vec<CondensedEdge> {
    let root = linkage.root();
    let mut relabel = vec![0usize; 2 * n - 1];
    relabel[root] = n;
    let mut next_label = n + 1;
    let mut ignore = vec![false; 2 * n - 1];
    let mut out = Vec::new();

    let fall_out =
        |child: usize, parent: usize, lambda: f64, ignore: &mut [bool], out: &mut Vec<CondensedEdge>| {
            for sub in linkage.bfs(child) {
                if sub < n {
                    out.push(CondensedEdge {
                        parent,
                        child: sub,
                        lambda,
                        size: 1,
                    });
                }
                ignore[sub] = true;
            }
        };

    for node in linkage.bfs(root) {
        if ignore[node] || node < n {
            continue;
        }

        let (left, right, distance) = linkage.merge(node);
        let lambda = lambda_of(distance);
        let parent = relabel[node];
        let left_big = linkage.size(left) >= min_cluster_size;
        let right_big = linkage.size(right) >= min_cluster_size;

        match (left_big, right_big) {
            (true, true) => {
                for child in [left, right] {
                    relabel[child] = next_label;
                    out.push(CondensedEdge {
                        parent,
                        child: next_label,
                        lambda,
                        size: linkage.size(child),
                    });
                    next_label += 1;
                }
            }
            (false, false) => {
                fall_out(left, parent, lambda, &mut ignore, &mut out);
                fall_out(right, parent, lambda, &mut ignore, &mut out);
            }
            (false, true) => {
                relabel[right] = parent;
                fall_out(left, parent, lambda, &mut ignore, &mut out);
            }
            (true, false) => {
                relabel[left] = parent;
                fall_out(right, parent, lambda, &mut ignore, &mut out);
            }
        }
    }

    out
}

/// Excess-of-mass selection followed by point labelling.
fn select_and_label(condensed: &[CondensedEdge], n: usize) -> Vec<i32> {
    let root = n;

    let mut births: BTreeMap<usize, f64> = BTreeMap::new();
    births.insert(root, 0.0);
    let mut children: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    let mut parent_of: BTreeMap<usize, usize> = BTreeMap::new();

    for edge in condensed {
        parent_of.insert(edge.child, edge.parent);
        if edge.child >= n {
            births.insert(edge.child, edge.lambda);
            children.entry(edge.parent).or_default().push(edge.child);
        }
    }

    let mut stability: BTreeMap<usize, f64> = births.keys().map(|&c| (c, 0.0)).collect();
    for edge in condensed {
        let birth = births.get(&edge.parent).copied().unwrap_or(0.0);
        *stability.entry(edge.parent).or_insert(0.0) += (edge.lambda - birth) * edge.size as f64;
    }

    let mut selected: BTreeMap<usize, bool> = stability.keys().map(|&c| (c, true)).collect();
    let clusters: Vec<usize> = stability.keys().copied().collect();

    for &node in clusters.iter().rev() {
        if node == root {
            continue;
        }
        let subtree: f64 = children
            .get(&node)
            .map(|kids| kids.iter().map(|k| stability[k]).sum())
            .unwrap_or(0.0);

        if subtree > stability[&node] {
            selected.insert(node, false);
            stability.insert(node, subtree);
        } else {
            let mut queue: VecDeque<usize> =
                children.get(&node).cloned().unwrap_or_default().into();
            while let Some(sub) = queue.pop_front() {
                selected.insert(sub, false);
                if let Some(kids) = children.get(&sub) {
                    queue.extend(kids.iter().copied());
                }
            }
        }
    }
    selected.insert(root, false);

    let label_of: BTreeMap<usize, i32> = selected
        .iter()
        .filter(|(_, &keep)| keep)
        .enumerate()
        .map(|(label, (&cluster, _))| (cluster, label as i32))
        .collect();

    (0..n)
        .map(|point| {
            let mut current = parent_of.get(&point).copied().unwrap_or(root);
            loop {
                if let Some(&label) = label_of.get(&current) {
                    return label;
                }
                if current == root {
                    return NOISE;
                }
                current = parent_of.get(&current).copied().unwrap_or(root);
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(x0: f64, y0: f64, count: usize) -> Vec<Vec<f64>> {
        (0..count).map(|i| vec![x0 + 0.1 * i as f64, y0]).collect()
    }

    fn clusterer(min_cluster_size: usize) -> Hdbscan {
        Hdbscan::new(HdbscanParams::default().with_min_cluster_size(min_cluster_size))
    }

    #[test]
    fn test_default_params() {
        let params = HdbscanParams::default();
        assert_eq!(params.min_cluster_size, 5);
        assert_eq!(params.effective_min_samples(), 5);
        assert_eq!(params.metric, Metric::Euclidean);
    }

    #[test]
    fn test_validation_rejects_small_cluster_size() {
        assert!(HdbscanParams::default().with_min_cluster_size(1).validate().is_err());
        assert!(HdbscanParams::default().with_min_samples(0).validate().is_err());
        assert!(HdbscanParams::default().with_min_cluster_size(2).validate().is_ok());
    }

    #[test]
    fn test_empty_input() {
        assert!(clusterer(2).fit(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_fewer_points_than_cluster_size_is_noise() {
        let labels = clusterer(5).fit(&line(0.0, 0.0, 3)).unwrap();
        assert_eq!(labels, vec![NOISE; 3]);
    }

    #[test]
    fn test_ragged_input_fails() {
        let points = vec![vec![0.0, 0.0], vec![1.0]];
        assert!(clusterer(2).fit(&points).is_err());
    }

    #[test]
    fn test_two_separated_groups() {
        let mut points = line(0.0, 0.0, 4);
        points.extend(line(100.0, 100.0, 4));

        let labels = clusterer(2).fit(&points).unwrap();

        assert!(labels.iter().all(|&l| l != NOISE), "labels: {labels:?}");
        assert!(labels[0..4].iter().all(|&l| l == labels[0]));
        assert!(labels[4..8].iter().all(|&l| l == labels[4]));
        assert_ne!(labels[0], labels[4]);
        let mut distinct: Vec<i32> = labels.clone();
        distinct.sort();
        distinct.dedup();
        assert_eq!(distinct, vec![0, 1]);
    }

    #[test]
    fn test_far_outlier_is_noise() {
        let mut points = line(0.0, 0.0, 4);
        points.extend(line(100.0, 100.0, 4));
        points.push(vec![1000.0, -1000.0]);

        let labels = clusterer(2).fit(&points).unwrap();

        assert_eq!(labels[8], NOISE);
        assert!(labels[0..8].iter().all(|&l| l != NOISE), "labels: {labels:?}");
        assert_ne!(labels[0], labels[4]);
    }

    #[test]
    fn test_single_uniform_group_is_all_noise() {
        // The root cluster is never selected on its own.
        let labels = clusterer(2).fit(&line(0.0, 0.0, 3)).unwrap();
        assert_eq!(labels, vec![NOISE; 3]);
    }

    #[test]
    fn test_coincident_points_stay_finite() {
        let mut points = vec![vec![0.0, 0.0]; 3];
        points.extend(vec![vec![50.0, 50.0]; 3]);

        let labels = clusterer(2).fit(&points).unwrap();

        assert_eq!(labels.len(), 6);
        assert!(labels[0..3].iter().all(|&l| l == labels[0]));
        assert!(labels[3..6].iter().all(|&l| l == labels[3]));
        assert_ne!(labels[0], labels[3]);
    }

    #[test]
    fn test_labels_are_dense_from_zero() {
        let mut points = line(0.0, 0.0, 3);
        points.extend(line(50.0, 0.0, 3));
        points.extend(line(0.0, 80.0, 3));

        let labels = clusterer(2).fit(&points).unwrap();
        let max = labels.iter().copied().max().unwrap();
        for label in 0..=max {
            assert!(labels.contains(&label), "label {label} missing from {labels:?}");
        }
    }
}
