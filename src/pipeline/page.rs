// Page topic pipeline: documents → embeddings → topic model → scatter table.
//
// The embeddings are computed once and shared by the two projections (the
// clustering one inside TopicModel::fit and the visualization one in
// project_for_plot). Too little content is an outcome, not an error.

use anyhow::Result;
use tracing::info;

use crate::output::scatter::{project_for_plot, ScatterRow, VisualizationParams};
use crate::topics::model::{TopicModel, TopicModelParams};
use crate::topics::traits::DocumentEmbedder;

/// Fewest paragraphs worth modelling.
pub const MIN_DOCUMENTS: usize = 2;

/// Parameters for both modelling stages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineSettings {
    pub topic_model: TopicModelParams,
    pub visualization: VisualizationParams,
}

impl PipelineSettings {
    /// Settings with a custom hover-text length; everything else default.
    pub fn with_max_hover_chars(mut self, max_hover_chars: usize) -> Self {
        self.visualization.max_hover_chars = max_hover_chars;
        self
    }
}

/// Everything produced for a page with enough content.
#[derive(Debug, Clone)]
pub struct PageTopics {
    pub documents: Vec<String>,
    pub model: TopicModel,
    pub scatter: Vec<ScatterRow>,
}

impl PageTopics {
    /// Legend labels for the viewer, one per topic id present in the scatter.
    pub fn topic_names(&self) -> Vec<(i32, String)> {
        self.model
            .topic_info()
            .into_iter()
            .map(|info| (info.topic, info.name))
            .collect()
    }
}

/// Result of running the pipeline over one page.
#[derive(Debug, Clone)]
pub enum PageOutcome {
    /// Fewer than MIN_DOCUMENTS non-empty paragraphs; nothing was modelled.
    InsufficientContent { paragraphs: usize },
    Modeled(Box<PageTopics>),
}

/// Drop blank documents and check what is left against MIN_DOCUMENTS.
pub fn has_enough_content(documents: &[String]) -> bool {
    documents.iter().filter(|d| !d.trim().is_empty()).count() >= MIN_DOCUMENTS
}

/// Embed, fit, and project the documents of one page.
pub async fn model_documents(
    mut documents: Vec<String>,
    embedder: &dyn DocumentEmbedder,
    settings: &PipelineSettings,
) -> Result<PageOutcome> {
    documents.retain(|d| !d.trim().is_empty());

    if documents.len() < MIN_DOCUMENTS {
        info!(
            paragraphs = documents.len(),
            required = MIN_DOCUMENTS,
            "Not enough content to model"
        );
        return Ok(PageOutcome::InsufficientContent {
            paragraphs: documents.len(),
        });
    }

    let embeddings = embedder.embed_batch(&documents).await?;
    if embeddings.len() != documents.len() {
        anyhow::bail!(
            "Embedder returned {} vectors for {} documents",
            embeddings.len(),
            documents.len()
        );
    }

    let model = TopicModel::fit(&documents, embeddings, &settings.topic_model)?;
    let scatter = project_for_plot(&model, &documents, &settings.visualization)?;

    Ok(PageOutcome::Modeled(Box::new(PageTopics {
        documents,
        model,
        scatter,
    })))
}
