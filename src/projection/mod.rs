// Dimensionality reduction: embeddings in, low-dimensional coordinates out.
//
// Two independently configured projections run over the same embeddings:
// one feeds the clusterer, one feeds the scatter plot. They share nothing
// but their input.

pub mod metric;
pub mod umap;

use anyhow::Result;

pub use metric::Metric;
pub use umap::Umap;

/// Contract for dimensionality reduction backends.
pub trait DimensionReducer {
    /// Fit on `data` (one row per point) and return the projected rows.
    fn fit_transform(&self, data: &[Vec<f64>]) -> Result<Vec<Vec<f64>>>;
}

/// Parameters for one projection step.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionConfig {
    /// Size of the local neighbourhood (counting the point itself)
    pub n_neighbors: usize,
    /// How tightly points may pack together in the output space
    pub min_dist: f64,
    /// Output dimensionality
    pub n_components: usize,
    /// Distance used to build the neighbour graph
    pub metric: Metric,
    /// Fixed seed for reproducible layouts; `None` seeds from the OS
    pub seed: Option<u64>,
    /// Optimisation epochs; `None` picks 500 for small inputs, 200 otherwise
    pub n_epochs: Option<usize>,
}

impl ProjectionConfig {
    /// The projection the clusterer works on: small neighbourhoods suit a
    /// single page's worth of paragraphs.
    pub fn clustering() -> Self {
        Self {
            n_neighbors: 5,
            min_dist: 0.1,
            n_components: 2,
            metric: Metric::Cosine,
            seed: None,
            n_epochs: None,
        }
    }

    /// The projection the scatter plot is drawn from. Seeded so the same
    /// page always renders the same layout.
    pub fn visualization() -> Self {
        Self {
            n_neighbors: 15,
            min_dist: 0.1,
            n_components: 2,
            metric: Metric::Cosine,
            seed: Some(42),
            n_epochs: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_n_neighbors(mut self, n_neighbors: usize) -> Self {
        self.n_neighbors = n_neighbors;
        self
    }

    pub fn with_n_epochs(mut self, n_epochs: usize) -> Self {
        self.n_epochs = Some(n_epochs);
        self
    }

    /// Reject parameter combinations the optimiser cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.n_neighbors < 2 {
            anyhow::bail!("n_neighbors must be at least 2, got {}", self.n_neighbors);
        }
        if self.n_components == 0 {
            anyhow::bail!("n_components must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.min_dist) {
            anyhow::bail!("min_dist must be within [0, 1], got {}", self.min_dist);
        }
        if self.n_epochs == Some(0) {
            anyhow::bail!("n_epochs must be at least 1");
        }
        Ok(())
    }
}
