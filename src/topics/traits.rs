// Document embedder trait: the swap-ready abstraction.
//
// The topic pipeline only needs "text in, fixed-length vectors out". The
// default implementation is the local ONNX sentence embedder; tests plug in
// small deterministic embedders instead.

use anyhow::Result;
use async_trait::async_trait;

/// Trait for turning documents into dense vectors. Async because the ONNX
/// implementation offloads inference to a blocking thread.
#[async_trait]
pub trait DocumentEmbedder: Send + Sync {
    /// Embed every document, returning vectors in the same order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>>;
}
