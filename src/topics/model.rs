// TopicModel: the fitted result of clustering one page's paragraphs.
//
// Fitting runs the clustering projection over the document embeddings,
// clusters the projected points with HDBSCAN, renumbers topics so topic 0 is
// the largest, and builds c-TF-IDF word lists for every topic. The
// embeddings are kept so the visualization projection can reuse them.

use std::collections::BTreeMap;

use anyhow::Result;
use tracing::info;

use super::ctfidf::{ClassTfidf, DEFAULT_TOP_N_WORDS};
use super::hdbscan::{Hdbscan, HdbscanParams, NOISE};
use crate::projection::{DimensionReducer, ProjectionConfig, Umap};

/// Topic id for documents that landed in no cluster.
pub const OUTLIER_TOPIC: i32 = NOISE;

/// Words joined into a topic name.
const NAME_WORDS: usize = 4;

/// Parameters for fitting a topic model.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicModelParams {
    /// Projection the clusterer works on
    pub projection: ProjectionConfig,
    /// Smallest group of documents that counts as a topic
    pub min_topic_size: usize,
    /// Words kept per topic
    pub top_n_words: usize,
}

impl Default for TopicModelParams {
    fn default() -> Self {
        Self {
            projection: ProjectionConfig::clustering(),
            min_topic_size: 2,
            top_n_words: DEFAULT_TOP_N_WORDS,
        }
    }
}

/// How many documents a topic holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopicFrequency {
    pub topic: i32,
    pub count: usize,
}

/// One row of the topic overview table.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicInfo {
    pub topic: i32,
    pub count: usize,
    pub name: String,
}

/// A fitted topic model over a fixed document set.
#[derive(Debug, Clone)]
pub struct TopicModel {
    topics: Vec<i32>,
    topic_words: BTreeMap<i32, Vec<(String, f64)>>,
    embeddings: Vec<Vec<f64>>,
}

impl TopicModel {
    /// Fit a model to the documents and their embeddings (parallel slices).
    pub fn fit(
        documents: &[String],
        embeddings: Vec<Vec<f64>>,
        params: &TopicModelParams,
    ) -> Result<Self> {
        if documents.is_empty() {
            anyhow::bail!("No documents to fit a topic model on");
        }
        if documents.len() != embeddings.len() {
            anyhow::bail!(
                "{} documents but {} embeddings",
                documents.len(),
                embeddings.len()
            );
        }

        let reduced = Umap::new(params.projection.clone()).fit_transform(&embeddings)?;

        let clusterer = Hdbscan::new(
            HdbscanParams::default().with_min_cluster_size(params.min_topic_size),
        );
        let labels = clusterer.fit(&reduced)?;
        let topics = sort_by_frequency(&labels);

        let model = Self::from_assignments(documents, topics, embeddings, params.top_n_words)?;

        info!(
            documents = documents.len(),
            topics = model.topic_freq().iter().filter(|f| f.topic != OUTLIER_TOPIC).count(),
            outliers = model.topics.iter().filter(|&&t| t == OUTLIER_TOPIC).count(),
            "Fitted topic model"
        );

        Ok(model)
    }

    /// Build a model from topic assignments that are already known.
    pub fn from_assignments(
        documents: &[String],
        topics: Vec<i32>,
        embeddings: Vec<Vec<f64>>,
        top_n_words: usize,
    ) -> Result<Self> {
        if documents.len() != topics.len() {
            anyhow::bail!(
                "{} documents but {} topic assignments",
                documents.len(),
                topics.len()
            );
        }

        let topic_words = ClassTfidf::new(top_n_words).topic_words(documents, &topics)?;

        Ok(Self {
            topics,
            topic_words,
            embeddings,
        })
    }

    /// Per-document topic ids, parallel to the fitted documents.
    pub fn topics(&self) -> &[i32] {
        &self.topics
    }

    /// The document embeddings the model was fitted on.
    pub fn embeddings(&self) -> &[Vec<f64>] {
        &self.embeddings
    }

    /// Top words and relevance scores for a topic, best first.
    pub fn get_topic(&self, topic: i32) -> Option<&[(String, f64)]> {
        self.topic_words.get(&topic).map(Vec::as_slice)
    }

    /// Every observed topic id with its document count, largest first.
    pub fn topic_freq(&self) -> Vec<TopicFrequency> {
        let mut counts: BTreeMap<i32, usize> = BTreeMap::new();
        for &topic in &self.topics {
            *counts.entry(topic).or_insert(0) += 1;
        }

        let mut freq: Vec<TopicFrequency> = counts
            .into_iter()
            .map(|(topic, count)| TopicFrequency { topic, count })
            .collect();
        freq.sort_by(|a, b| b.count.cmp(&a.count).then(a.topic.cmp(&b.topic)));
        freq
    }

    /// `"{id}_{w1}_{w2}_{w3}_{w4}"`, or just the id when the topic has no words.
    pub fn topic_name(&self, topic: i32) -> String {
        let words: Vec<&str> = self
            .get_topic(topic)
            .unwrap_or_default()
            .iter()
            .take(NAME_WORDS)
            .map(|(w, _)| w.as_str())
            .collect();

        if words.is_empty() {
            topic.to_string()
        } else {
            format!("{}_{}", topic, words.join("_"))
        }
    }

    /// Topic overview in frequency order, outliers included.
    pub fn topic_info(&self) -> Vec<TopicInfo> {
        self.topic_freq()
            .into_iter()
            .map(|f| TopicInfo {
                topic: f.topic,
                count: f.count,
                name: self.topic_name(f.topic),
            })
            .collect()
    }
}

/// Renumber cluster labels so the most populated cluster becomes 0, the next
/// 1, and so on. Ties keep the original label order; noise stays -1.
pub fn sort_by_frequency(labels: &[i32]) -> Vec<i32> {
    let mut counts: BTreeMap<i32, usize> = BTreeMap::new();
    for &label in labels.iter().filter(|&&l| l != OUTLIER_TOPIC) {
        *counts.entry(label).or_insert(0) += 1;
    }

    let mut ordered: Vec<(i32, usize)> = counts.into_iter().collect();
    ordered.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let mapping: BTreeMap<i32, i32> = ordered
        .iter()
        .enumerate()
        .map(|(rank, &(label, _))| (label, rank as i32))
        .collect();

    labels
        .iter()
        .map(|label| mapping.get(label).copied().unwrap_or(OUTLIER_TOPIC))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_sort_by_frequency() {
        let labels = vec![0, 1, 1, -1, 1, 0, 2];
        assert_eq!(sort_by_frequency(&labels), vec![1, 0, 0, -1, 0, 1, 2]);
    }

    #[test]
    fn test_sort_by_frequency_all_noise() {
        assert_eq!(sort_by_frequency(&[-1, -1]), vec![-1, -1]);
    }

    #[test]
    fn test_topic_freq_order() {
        let documents = docs(&["a cats", "b cats", "c dogs", "d dogs", "e dogs", "f noise"]);
        let model =
            TopicModel::from_assignments(&documents, vec![1, 1, 0, 0, 0, -1], vec![], 10).unwrap();

        let freq = model.topic_freq();
        assert_eq!(
            freq,
            vec![
                TopicFrequency { topic: 0, count: 3 },
                TopicFrequency { topic: 1, count: 2 },
                TopicFrequency { topic: -1, count: 1 },
            ]
        );
    }

    #[test]
    fn test_topic_name_uses_first_four_words() {
        let documents = docs(&[
            "alpha alpha alpha beta beta gamma delta epsilon",
            "zulu yankee",
        ]);
        let model = TopicModel::from_assignments(&documents, vec![0, 1], vec![], 10).unwrap();

        let name = model.topic_name(0);
        assert!(name.starts_with("0_alpha_beta_"), "got {name}");
        assert_eq!(name.split('_').count(), 5);
    }

    #[test]
    fn test_topic_name_without_words() {
        let model = TopicModel::from_assignments(&docs(&["the"]), vec![0], vec![], 10).unwrap();
        assert_eq!(model.topic_name(0), "0");
        assert_eq!(model.topic_name(7), "7");
    }

    #[test]
    fn test_from_assignments_length_mismatch() {
        let documents = docs(&["one", "two"]);
        assert!(TopicModel::from_assignments(&documents, vec![0], vec![], 10).is_err());
    }

    #[test]
    fn test_fit_requires_parallel_embeddings() {
        let documents = docs(&["one", "two"]);
        let params = TopicModelParams::default();
        assert!(TopicModel::fit(&documents, vec![vec![1.0]], &params).is_err());
    }

    #[test]
    fn test_fit_assigns_every_document() {
        let documents: Vec<String> = (0..8).map(|i| format!("document number {i}")).collect();
        let embeddings: Vec<Vec<f64>> = (0..8)
            .map(|i| {
                if i < 4 {
                    vec![1.0, 0.1 * i as f64, 0.0]
                } else {
                    vec![0.0, 0.1 * i as f64, 1.0]
                }
            })
            .collect();
        let params = TopicModelParams {
            projection: ProjectionConfig::clustering().with_seed(3),
            ..Default::default()
        };

        let model = TopicModel::fit(&documents, embeddings, &params).unwrap();

        assert_eq!(model.topics().len(), 8);
        assert_eq!(model.embeddings().len(), 8);
        assert!(model.topics().iter().all(|&t| t >= OUTLIER_TOPIC));
    }
}
