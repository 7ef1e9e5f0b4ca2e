// Class-based TF-IDF topic representation.
//
// All documents of a topic are treated as one long "class document". A word
// scores highly for a topic when it is frequent inside that class and rare
// across the others:
//
//   score(w, c) = (count(w, c) / words(c)) * ln(1 + avg_words_per_class / count(w))
//
// The outlier topic takes part in the statistics like any other class, so
// words that only show up in noise documents don't inflate real topics.

use std::collections::{BTreeMap, HashSet};

use anyhow::Result;
use stop_words::{get, LANGUAGE};

/// Words per topic kept in the representation.
pub const DEFAULT_TOP_N_WORDS: usize = 10;

/// c-TF-IDF scorer with an English stop word list.
pub struct ClassTfidf {
    pub top_n_words: usize,
    stop_words: HashSet<String>,
}

impl Default for ClassTfidf {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_N_WORDS)
    }
}

impl ClassTfidf {
    pub fn new(top_n_words: usize) -> Self {
        let stop_words: Vec<String> = get(LANGUAGE::English);
        Self {
            top_n_words,
            stop_words: stop_words.into_iter().collect(),
        }
    }

    /// Rank words for every topic present in `topics`.
    ///
    /// `documents` and `topics` are parallel. Each topic maps to at most
    /// `top_n_words` (word, score) pairs, best first; only positive scores
    /// are kept.
    pub fn topic_words(
        &self,
        documents: &[String],
        topics: &[i32],
    ) -> Result<BTreeMap<i32, Vec<(String, f64)>>> {
        if documents.len() != topics.len() {
            anyhow::bail!(
                "{} documents but {} topic assignments",
                documents.len(),
                topics.len()
            );
        }

        let mut class_counts: BTreeMap<i32, BTreeMap<String, usize>> = BTreeMap::new();
        for (doc, &topic) in documents.iter().zip(topics.iter()) {
            let counts = class_counts.entry(topic).or_default();
            for token in tokenize(doc) {
                if !self.stop_words.contains(&token) {
                    *counts.entry(token).or_insert(0) += 1;
                }
            }
        }

        let mut word_totals: BTreeMap<&str, usize> = BTreeMap::new();
        let mut all_words = 0usize;
        for counts in class_counts.values() {
            for (word, &count) in counts {
                *word_totals.entry(word.as_str()).or_insert(0) += count;
                all_words += count;
            }
        }

        // Truncated to a whole number of words, like a document length.
        let avg_class_words = (all_words / class_counts.len().max(1)) as f64;

        let mut result = BTreeMap::new();
        for (&topic, counts) in &class_counts {
            let class_words: usize = counts.values().sum();

            let mut scored: Vec<(String, f64)> = counts
                .iter()
                .map(|(word, &count)| {
                    let tf = count as f64 / class_words as f64;
                    let idf = (1.0 + avg_class_words / word_totals[word.as_str()] as f64).ln();
                    (word.clone(), tf * idf)
                })
                .filter(|(_, score)| *score > 0.0)
                .collect();

            scored.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.0.cmp(&b.0))
            });
            scored.truncate(self.top_n_words);

            result.insert(topic, scored);
        }

        Ok(result)
    }
}

/// Lowercased alphanumeric runs of at least two characters.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() >= 2)
        .map(str::to_lowercase)
}
