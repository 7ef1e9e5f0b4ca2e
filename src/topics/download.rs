// Fetches the sentence embedding model on first use.
//
// all-MiniLM-L6-v2 (~90MB) comes from HuggingFace and lives under the model
// directory (~/.local/share/pagetopics/models/ on Linux by default), so only
// the first run pays for the download.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

const HF_REPO_URL: &str =
    "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main";

/// Subdirectory of the model directory holding the two files below.
const MODEL_SUBDIR: &str = "all-MiniLM-L6-v2";

/// A file to fetch: path inside the HF repo, local file name, and whether
/// it is big enough to deserve a progress bar.
struct ModelFile {
    remote: &'static str,
    local: &'static str,
    large: bool,
}

const MODEL_FILES: [ModelFile; 2] = [
    ModelFile {
        remote: "tokenizer.json",
        local: "tokenizer.json",
        large: false,
    },
    ModelFile {
        remote: "onnx/model.onnx",
        local: "model.onnx",
        large: true,
    },
];

/// `<data_dir>/pagetopics/models`, or `./pagetopics/models` when the
/// platform has no data directory.
pub fn default_model_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pagetopics")
        .join("models")
}

/// Where the embedding model files sit under `base`.
pub fn embedding_model_dir(base: &Path) -> PathBuf {
    base.join(MODEL_SUBDIR)
}

pub fn embedding_files_present(base: &Path) -> bool {
    let dir = embedding_model_dir(base);
    MODEL_FILES.iter().all(|f| dir.join(f.local).exists())
}

/// Make sure the embedding model is on disk, downloading what is missing.
///
/// Returns the directory to pass to `SentenceEmbedder::load`.
pub async fn ensure_embedding_model(base: &Path) -> Result<PathBuf> {
    if !embedding_files_present(base) {
        println!("Downloading sentence embedding model ({MODEL_SUBDIR})...");
        download_model(base).await?;
    }
    Ok(embedding_model_dir(base))
}

/// Download whichever model files are missing under `base`.
pub async fn download_model(base: &Path) -> Result<()> {
    let dir = embedding_model_dir(base);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create model directory: {}", dir.display()))?;

    let client = reqwest::Client::new();
    for file in &MODEL_FILES {
        let dest = dir.join(file.local);
        if dest.exists() {
            debug!(file = file.local, "Model file already present");
            continue;
        }
        println!("  {}...", file.local);
        let url = format!("{HF_REPO_URL}/{}", file.remote);
        download_file(&client, &url, &dest, file.large).await?;
    }

    Ok(())
}

/// Stream `url` into `dest`. The body goes to `<dest>.part` first and is
/// renamed once complete, so a partial file never passes
/// `embedding_files_present`.
async fn download_file(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    show_progress: bool,
) -> Result<()> {
    let mut response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to download {url}"))?;

    if !response.status().is_success() {
        anyhow::bail!("Download failed with status {}: {}", response.status(), url);
    }

    let progress = show_progress.then(|| progress_bar(response.content_length()));

    let partial = dest.with_extension("part");
    let mut out = File::create(&partial)
        .with_context(|| format!("Failed to create {}", partial.display()))?;

    let mut written = 0u64;
    while let Some(chunk) = response
        .chunk()
        .await
        .with_context(|| format!("Failed to read body of {url}"))?
    {
        out.write_all(&chunk)
            .with_context(|| format!("Failed to write {}", partial.display()))?;
        written += chunk.len() as u64;
        if let Some(pb) = &progress {
            pb.set_position(written);
        }
    }
    out.flush()
        .with_context(|| format!("Failed to flush {}", partial.display()))?;
    drop(out);

    std::fs::rename(&partial, dest)
        .with_context(|| format!("Failed to move {} into place", dest.display()))?;

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    info!(url, bytes = written, dest = %dest.display(), "Downloaded model file");
    Ok(())
}

/// Byte bar when the size is known, spinner otherwise.
fn progress_bar(total: Option<u64>) -> ProgressBar {
    match total {
        Some(size) => {
            let pb = ProgressBar::new(size);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("    [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                    .expect("valid template")
                    .progress_chars("=> "),
            );
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("    {spinner} {bytes}")
                    .expect("valid template"),
            );
            pb
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_model(base: &Path) -> PathBuf {
        let dir = embedding_model_dir(base);
        std::fs::create_dir_all(&dir).unwrap();
        for file in &MODEL_FILES {
            std::fs::write(dir.join(file.local), b"fake").unwrap();
        }
        dir
    }

    #[test]
    fn test_default_model_dir_is_under_pagetopics() {
        let dir = default_model_dir();
        assert!(dir.ends_with("pagetopics/models"), "got: {}", dir.display());
    }

    #[test]
    fn test_embedding_model_dir_is_subdirectory() {
        let base = PathBuf::from("/tmp/test-models");
        assert_eq!(embedding_model_dir(&base), base.join("all-MiniLM-L6-v2"));
    }

    #[test]
    fn test_files_missing_in_empty_dir() {
        let base = std::env::temp_dir().join("pagetopics-test-nonexistent");
        assert!(!embedding_files_present(&base));
    }

    #[test]
    fn test_partial_download_is_not_present() {
        let base = std::env::temp_dir().join("pagetopics-partial-test");
        let dir = embedding_model_dir(&base);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("tokenizer.json"), b"fake").unwrap();
        std::fs::write(dir.join("model.part"), b"half").unwrap();

        assert!(!embedding_files_present(&base));

        std::fs::remove_dir_all(&base).unwrap();
    }

    #[test]
    fn test_files_present_when_both_exist() {
        let base = std::env::temp_dir().join("pagetopics-embed-test");
        fake_model(&base);

        assert!(embedding_files_present(&base));

        std::fs::remove_dir_all(&base).unwrap();
    }

    #[tokio::test]
    async fn test_ensure_skips_download_when_present() {
        let base = std::env::temp_dir().join("pagetopics-ensure-test");
        let dir = fake_model(&base);

        let resolved = ensure_embedding_model(&base).await.unwrap();
        assert_eq!(resolved, dir);

        std::fs::remove_dir_all(&base).unwrap();
    }
}
