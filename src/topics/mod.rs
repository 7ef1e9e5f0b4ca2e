// Topic modelling: embeddings, clustering, and topic word lists.

pub mod ctfidf;
pub mod download;
pub mod embeddings;
pub mod hdbscan;
pub mod model;
pub mod traits;
