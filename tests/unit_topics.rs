// Unit tests for clustering and topic representation.
//
// Exercises HDBSCAN, c-TF-IDF and TopicModel through the public API with
// hand-built points and assignments; no embedding model is loaded.

use pagetopics::topics::ctfidf::ClassTfidf;
use pagetopics::topics::hdbscan::{Hdbscan, HdbscanParams, NOISE};
use pagetopics::topics::model::{sort_by_frequency, TopicModel, OUTLIER_TOPIC};

fn docs(texts: &[&str]) -> Vec<String> {
    texts.iter().map(|s| s.to_string()).collect()
}

/// `count` points spaced 0.1 apart along x, starting at (x0, y0).
fn blob(x0: f64, y0: f64, count: usize) -> Vec<Vec<f64>> {
    (0..count).map(|i| vec![x0 + 0.1 * i as f64, y0]).collect()
}

// ============================================================
// HDBSCAN
// ============================================================

#[test]
fn three_groups_get_three_labels() {
    let mut points = blob(0.0, 0.0, 5);
    points.extend(blob(20.0, 0.0, 5));
    points.extend(blob(40.0, 0.0, 5));

    let labels = Hdbscan::new(HdbscanParams::default().with_min_cluster_size(3))
        .fit(&points)
        .unwrap();

    assert_eq!(labels.len(), 15);
    assert!(labels.iter().all(|&l| l != NOISE));
    for group in labels.chunks(5) {
        assert!(group.iter().all(|&l| l == group[0]));
    }
    assert_ne!(labels[0], labels[5]);
    assert_ne!(labels[5], labels[10]);
    assert_ne!(labels[0], labels[10]);
}

#[test]
fn labels_are_noise_or_dense_ids() {
    let mut points = blob(0.0, 0.0, 4);
    points.extend(blob(10.0, 0.0, 4));
    points.push(vec![500.0, 500.0]);

    let labels = Hdbscan::new(HdbscanParams::default().with_min_cluster_size(2))
        .fit(&points)
        .unwrap();

    let max = labels.iter().copied().max().unwrap();
    for id in 0..=max {
        assert!(labels.contains(&id), "label {id} missing from {labels:?}");
    }
    assert!(labels.iter().all(|&l| l >= NOISE));
}

#[test]
fn min_cluster_size_below_two_is_rejected() {
    let points = blob(0.0, 0.0, 5);
    let result = Hdbscan::new(HdbscanParams::default().with_min_cluster_size(1)).fit(&points);
    assert!(result.is_err());
}

// ============================================================
// sort_by_frequency
// ============================================================

#[test]
fn largest_cluster_becomes_topic_zero() {
    let labels = vec![4, 4, 9, 9, 9, NOISE, 2];
    assert_eq!(sort_by_frequency(&labels), vec![1, 1, 0, 0, 0, NOISE, 2]);
}

// ============================================================
// c-TF-IDF
// ============================================================

#[test]
fn shared_words_score_below_distinctive_ones() {
    let documents = docs(&[
        "garden tomatoes garden basil page",
        "garden basil tomatoes page",
        "football league page goals",
        "football goals league page",
    ]);
    let topics = vec![0, 0, 1, 1];

    let words = ClassTfidf::default().topic_words(&documents, &topics).unwrap();

    let score = |topic: i32, word: &str| {
        words[&topic]
            .iter()
            .find(|(w, _)| w == word)
            .map(|(_, s)| *s)
            .unwrap_or(0.0)
    };
    assert!(score(0, "garden") > score(0, "page"));
    assert!(score(1, "football") > score(1, "page"));
}

#[test]
fn words_are_lowercased() {
    let documents = docs(&["Rust RUST rust", "Python"]);
    let words = ClassTfidf::default().topic_words(&documents, &[0, 1]).unwrap();
    assert_eq!(words[&0].len(), 1);
    assert_eq!(words[&0][0].0, "rust");
}

// ============================================================
// TopicModel
// ============================================================

#[test]
fn topic_info_lists_every_topic_with_names() {
    let documents = docs(&[
        "volcano lava eruption",
        "lava volcano ash",
        "orchestra violin symphony",
        "stray sentence",
    ]);
    let model =
        TopicModel::from_assignments(&documents, vec![0, 0, 1, OUTLIER_TOPIC], vec![], 10)
            .unwrap();

    let info = model.topic_info();

    assert_eq!(info.len(), 3);
    assert_eq!(info[0].topic, 0);
    assert_eq!(info[0].count, 2);
    assert!(info[0].name.starts_with("0_"));
    assert!(info[0].name.contains("lava") && info[0].name.contains("volcano"));
    assert!(info.iter().any(|i| i.topic == OUTLIER_TOPIC));
    assert!(model.get_topic(1).unwrap().iter().any(|(w, _)| w == "violin"));
    assert!(model.get_topic(5).is_none());
}
