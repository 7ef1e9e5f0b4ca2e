// pagetopics: topic map of a single web page's paragraphs
//
// This is the library root. Each module corresponds to one stage of the
// scrape → embed → project → cluster → describe → display pipeline.

pub mod config;
pub mod output;
pub mod pipeline;
pub mod projection;
pub mod scrape;
pub mod topics;

#[cfg(feature = "viewer")]
pub mod viewer;
