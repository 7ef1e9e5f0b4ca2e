// Scatter table for the topic map.
//
// The visualization projection is computed from the model's embeddings,
// independently of the projection the clusterer used, then zipped with the
// topic assignments and documents into one row per point.

use anyhow::Result;
use tracing::debug;

use super::{truncate_chars, DEFAULT_MAX_HOVER_CHARS};
use crate::projection::{DimensionReducer, ProjectionConfig, Umap};
use crate::topics::model::TopicModel;

/// Parameters for the plotting stage.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualizationParams {
    /// Projection the scatter plot is drawn from
    pub projection: ProjectionConfig,
    /// Hover text is cut to this many characters
    pub max_hover_chars: usize,
}

impl Default for VisualizationParams {
    fn default() -> Self {
        Self {
            projection: ProjectionConfig::visualization(),
            max_hover_chars: DEFAULT_MAX_HOVER_CHARS,
        }
    }
}

/// One plotted document.
#[derive(Debug, Clone, PartialEq)]
pub struct ScatterRow {
    pub x: f64,
    pub y: f64,
    pub topic: i32,
    pub document: String,
    /// Hover text: the document, cut to `max_hover_chars` with "..." appended
    pub truncated: String,
}

/// Project the model's embeddings for plotting and build the scatter table.
pub fn project_for_plot(
    model: &TopicModel,
    documents: &[String],
    params: &VisualizationParams,
) -> Result<Vec<ScatterRow>> {
    if params.projection.n_components < 2 {
        anyhow::bail!(
            "Scatter plot needs at least 2 projected components, got {}",
            params.projection.n_components
        );
    }

    let coords = Umap::new(params.projection.clone()).fit_transform(model.embeddings())?;

    debug!(
        points = coords.len(),
        n_neighbors = params.projection.n_neighbors,
        seed = ?params.projection.seed,
        "Projected documents for plotting"
    );

    build_scatter_rows(&coords, model.topics(), documents, params.max_hover_chars)
}

/// Zip projected coordinates, topic ids and documents into scatter rows.
pub fn build_scatter_rows(
    coords: &[Vec<f64>],
    topics: &[i32],
    documents: &[String],
    max_hover_chars: usize,
) -> Result<Vec<ScatterRow>> {
    if coords.len() != topics.len() || topics.len() != documents.len() {
        anyhow::bail!(
            "Scatter inputs differ in length: {} coordinates, {} topics, {} documents",
            coords.len(),
            topics.len(),
            documents.len()
        );
    }

    coords
        .iter()
        .zip(topics.iter())
        .zip(documents.iter())
        .map(|((xy, &topic), document)| {
            if xy.len() < 2 {
                anyhow::bail!("Projected point has {} components, need 2", xy.len());
            }
            Ok(ScatterRow {
                x: xy[0],
                y: xy[1],
                topic,
                document: document.clone(),
                truncated: truncate_chars(document, max_hover_chars),
            })
        })
        .collect()
}
