use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::output::DEFAULT_MAX_HOVER_CHARS;

/// Central configuration loaded from environment variables.
///
/// Nothing here is required: every field has a default so `pagetopics <URL>`
/// works out of the box. The .env file is loaded at startup via dotenvy.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory containing (or receiving) the sentence embedding model
    pub model_dir: PathBuf,
    /// Whether the tokenizer may use its internal thread pool.
    /// Off by default; applied through the tokenizers API, not the environment.
    pub tokenizer_parallelism: bool,
    /// Hover text in the scatter plot is cut to this many characters
    pub max_hover_chars: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        let model_dir = env::var("PAGETOPICS_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| crate::topics::download::default_model_dir());

        let tokenizer_parallelism = match env::var("PAGETOPICS_TOKENIZER_PARALLELISM") {
            Ok(raw) => parse_bool(&raw).with_context(|| {
                format!("Invalid PAGETOPICS_TOKENIZER_PARALLELISM value: {raw:?}")
            })?,
            Err(_) => false,
        };

        let max_hover_chars = match env::var("PAGETOPICS_HOVER_CHARS") {
            Ok(raw) => raw
                .trim()
                .parse::<usize>()
                .with_context(|| format!("Invalid PAGETOPICS_HOVER_CHARS value: {raw:?}"))?,
            Err(_) => DEFAULT_MAX_HOVER_CHARS,
        };

        Ok(Self {
            model_dir,
            tokenizer_parallelism,
            max_hover_chars,
        })
    }

    /// Apply process-wide settings that downstream libraries read.
    ///
    /// Call once at startup, before any tokenizer is loaded.
    pub fn apply(&self) {
        tokenizers::utils::parallelism::set_parallelism(self.tokenizer_parallelism);
    }
}

/// Parse the usual spellings of a boolean flag.
fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => anyhow::bail!("expected true/false, got {other:?}"),
    }
}
