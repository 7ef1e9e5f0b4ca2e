// Content extraction: one GET, one HTML pass, paragraph texts out.

pub mod client;
pub mod paragraphs;
