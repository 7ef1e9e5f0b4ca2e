// Pipelines: end-to-end sequencing of the topic map stages.

pub mod page;

pub use page::{has_enough_content, model_documents, PageOutcome, PageTopics, PipelineSettings};
