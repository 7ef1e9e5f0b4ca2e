use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use tracing::info;

use pagetopics::config::Config;
use pagetopics::output::terminal::display_topic_details;
use pagetopics::pipeline::{
    has_enough_content, model_documents, PageOutcome, PageTopics, PipelineSettings,
};
use pagetopics::scrape::client::PageClient;
use pagetopics::topics::download::ensure_embedding_model;
use pagetopics::topics::embeddings::SentenceEmbedder;

/// pagetopics: discover the topics of a web page.
///
/// Scrapes the page's paragraphs, clusters them by meaning, shows an
/// interactive topic map and prints the words that describe each topic.
#[derive(Parser)]
#[command(name = "pagetopics", version, about)]
struct Cli {
    /// The page to analyze (e.g. https://example.com/article)
    url: String,
}

fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Logs go to stderr so stdout carries only the report
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pagetopics=info")),
        )
        .init();

    let cli = Cli::parse();

    let config = Config::load()?;
    config.apply();

    println!("Scraping {}...", cli.url);

    // The runtime is dropped before the viewer takes over the main thread.
    let outcome = {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(run(&cli.url, &config))?
    };

    match outcome {
        PageOutcome::InsufficientContent { paragraphs } => {
            info!(paragraphs, "Skipping topic modeling");
            println!("{}", "Not enough content for topic modeling.".yellow());
        }
        PageOutcome::Modeled(page) => {
            show_topic_map(&page)?;
            display_topic_details(&page.model)?;
        }
    }

    Ok(())
}

async fn run(url: &str, config: &Config) -> Result<PageOutcome> {
    let client = PageClient::new()?;
    let documents = client.fetch_paragraphs(url).await?;

    // Decided before the sentence model is downloaded or loaded.
    if !has_enough_content(&documents) {
        let paragraphs = documents.iter().filter(|d| !d.trim().is_empty()).count();
        return Ok(PageOutcome::InsufficientContent { paragraphs });
    }

    let model_dir = ensure_embedding_model(&config.model_dir).await?;
    let embedder = SentenceEmbedder::load(&model_dir)?;

    let settings = PipelineSettings::default().with_max_hover_chars(config.max_hover_chars);

    info!(paragraphs = documents.len(), "Modeling topics");
    model_documents(documents, &embedder, &settings).await
}

#[cfg(feature = "viewer")]
fn show_topic_map(page: &PageTopics) -> Result<()> {
    pagetopics::viewer::show(page.scatter.clone(), page.topic_names())
}

#[cfg(not(feature = "viewer"))]
fn show_topic_map(page: &PageTopics) -> Result<()> {
    tracing::warn!(
        points = page.scatter.len(),
        "Built without the viewer feature; skipping the topic map"
    );
    Ok(())
}
