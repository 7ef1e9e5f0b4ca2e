// Sentence embeddings using all-MiniLM-L6-v2.
//
// Each paragraph is embedded into a 384-dimensional vector with a sentence
// transformer running locally via ONNX. Token embeddings are mean-pooled
// (weighted by the attention mask) and L2-normalised, matching how the model
// was trained and published.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info};

use super::traits::DocumentEmbedder;

/// Embedding dimension for all-MiniLM-L6-v2.
pub const EMBEDDING_DIM: usize = 384;

/// Word pieces beyond this are cut off; the model was trained on 256.
pub const MAX_SEQUENCE_LENGTH: usize = 256;

/// Texts per inference call. Keeps padded tensors small on long pages.
const BATCH_SIZE: usize = 32;

/// all-MiniLM-L6-v2 loaded from disk.
///
/// `Session::run` needs `&mut Session`, hence the mutex; both halves are
/// shared with the blocking task.
pub struct SentenceEmbedder {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
}

impl SentenceEmbedder {
    /// Load `model.onnx` and `tokenizer.json` from `model_dir`
    /// (see `download::ensure_embedding_model`).
    pub fn load(model_dir: &Path) -> Result<Self> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        for path in [&model_path, &tokenizer_path] {
            if !path.exists() {
                anyhow::bail!("Embedding model file not found: {}", path.display());
            }
        }

        let session = Session::builder()
            .context("Failed to create ONNX session builder")?
            .commit_from_file(&model_path)
            .with_context(|| {
                format!(
                    "Failed to load embedding model from {}",
                    model_path.display()
                )
            })?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load embedding tokenizer: {}", e))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQUENCE_LENGTH,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("Failed to configure tokenizer truncation: {}", e))?;

        info!(
            dir = %model_dir.display(),
            max_tokens = MAX_SEQUENCE_LENGTH,
            "Loaded sentence embedder"
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
        })
    }
}

#[async_trait]
impl DocumentEmbedder for SentenceEmbedder {
    /// One unit vector per text, in input order. Inference runs on the
    /// blocking pool in chunks of BATCH_SIZE.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let session = Arc::clone(&self.session);
        let tokenizer = Arc::clone(&self.tokenizer);
        let texts = texts.to_vec();

        let embeddings = tokio::task::spawn_blocking(move || {
            texts
                .chunks(BATCH_SIZE)
                .map(|chunk| embed_chunk(&session, &tokenizer, chunk))
                .collect::<Result<Vec<_>>>()
                .map(|chunks| chunks.into_iter().flatten().collect::<Vec<_>>())
        })
        .await
        .context("Embedding task panicked")??;

        debug!(texts = embeddings.len(), "Computed sentence embeddings");
        Ok(embeddings)
    }
}

/// Token ids and masks for one chunk, right-padded to a common length.
#[derive(Debug, Clone, PartialEq)]
pub struct PaddedBatch {
    pub rows: usize,
    pub seq_len: usize,
    pub input_ids: Vec<i64>,
    pub attention_mask: Vec<i64>,
}

impl PaddedBatch {
    /// Pad each (ids, mask) pair with zeros up to the longest row.
    pub fn from_rows<'a>(rows: impl IntoIterator<Item = (&'a [u32], &'a [u32])>) -> Self {
        let rows: Vec<_> = rows.into_iter().collect();
        let seq_len = rows.iter().map(|(ids, _)| ids.len()).max().unwrap_or(0);

        let mut input_ids = vec![0i64; rows.len() * seq_len];
        let mut attention_mask = vec![0i64; rows.len() * seq_len];
        for (r, (ids, mask)) in rows.iter().enumerate() {
            let base = r * seq_len;
            for (t, (&id, &m)) in ids.iter().zip(mask.iter()).enumerate() {
                input_ids[base + t] = id as i64;
                attention_mask[base + t] = m as i64;
            }
        }

        Self {
            rows: rows.len(),
            seq_len,
            input_ids,
            attention_mask,
        }
    }

    fn shape(&self) -> [i64; 2] {
        [self.rows as i64, self.seq_len as i64]
    }
}

/// Tokenize, run the model, and pool one chunk of texts.
fn embed_chunk(
    session: &Mutex<Session>,
    tokenizer: &Tokenizer,
    texts: &[String],
) -> Result<Vec<Vec<f64>>> {
    let encodings = texts
        .iter()
        .map(|t| {
            tokenizer
                .encode(t.as_str(), true)
                .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))
        })
        .collect::<Result<Vec<_>>>()?;

    let batch = PaddedBatch::from_rows(
        encodings
            .iter()
            .map(|e| (e.get_ids(), e.get_attention_mask())),
    );
    if batch.seq_len == 0 {
        return Ok(vec![vec![0.0; EMBEDDING_DIM]; batch.rows]);
    }

    let input_ids = Tensor::from_array((batch.shape(), batch.input_ids.clone()))
        .context("Failed to create input_ids tensor")?;
    let attention_mask = Tensor::from_array((batch.shape(), batch.attention_mask.clone()))
        .context("Failed to create attention_mask tensor")?;
    // Single-segment input: every token type is 0.
    let token_type_ids =
        Tensor::from_array((batch.shape(), vec![0i64; batch.rows * batch.seq_len]))
            .context("Failed to create token_type_ids tensor")?;

    // last_hidden_state: [rows, seq_len, EMBEDDING_DIM]
    let hidden = {
        let mut session = session
            .lock()
            .map_err(|e| anyhow::anyhow!("Session lock poisoned: {}", e))?;

        let outputs = session
            .run(ort::inputs! {
                "input_ids" => input_ids,
                "attention_mask" => attention_mask,
                "token_type_ids" => token_type_ids
            })
            .context("Embedding ONNX inference failed")?;

        let (_shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .context("Failed to extract embedding output tensor")?;
        data.to_vec()
    };

    let expected = batch.rows * batch.seq_len * EMBEDDING_DIM;
    if hidden.len() != expected {
        anyhow::bail!(
            "Embedding output has {} values, expected {}",
            hidden.len(),
            expected
        );
    }

    let embeddings = mean_pool(&hidden, &batch, EMBEDDING_DIM);

    debug!(rows = batch.rows, seq_len = batch.seq_len, "Embedded chunk");

    Ok(embeddings)
}

/// Average the token vectors of each row over its unmasked positions, then
/// scale the result to unit length.
pub fn mean_pool(hidden: &[f32], batch: &PaddedBatch, dim: usize) -> Vec<Vec<f64>> {
    (0..batch.rows)
        .map(|r| {
            let mut pooled = vec![0.0_f64; dim];
            let mut tokens = 0usize;

            for t in 0..batch.seq_len {
                let pos = r * batch.seq_len + t;
                if batch.attention_mask[pos] == 0 {
                    continue;
                }
                tokens += 1;
                let token = &hidden[pos * dim..(pos + 1) * dim];
                for (acc, &v) in pooled.iter_mut().zip(token) {
                    *acc += v as f64;
                }
            }

            if tokens > 0 {
                pooled.iter_mut().for_each(|v| *v /= tokens as f64);
            }
            l2_normalize(&mut pooled);
            pooled
        })
        .collect()
}

/// Scale a vector to unit length in place. Zero vectors are left alone.
pub fn l2_normalize(v: &mut [f64]) {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > f64::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
