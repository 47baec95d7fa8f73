// Library interface for umoja modules
// This allows tests and the binary to import modules

pub mod clustering;
pub mod error;
pub mod ingestion;
pub mod llm;
pub mod model;
pub mod pipeline;
pub mod publisher;
pub mod scoring;
pub mod summarizer;
pub mod translator;
