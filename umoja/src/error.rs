use thiserror::Error;

/// A failure contained at one external call. None of these abort a run.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("fetch failed for {source_url}: {cause:#}")]
    Fetch {
        source_url: String,
        cause: anyhow::Error,
    },

    #[error("summarization failed for '{title}': {cause:#}")]
    Summarize { title: String, cause: anyhow::Error },

    #[error("translation to {language} failed: {cause:#}")]
    Translate {
        language: String,
        cause: anyhow::Error,
    },

    #[error("publishing {table} record ({language}) failed: {cause:#}")]
    Publish {
        table: &'static str,
        language: String,
        cause: anyhow::Error,
    },
}

impl StageError {
    /// Short stage name, used in log fields
    pub fn stage(&self) -> &'static str {
        match self {
            StageError::Fetch { .. } => "fetch",
            StageError::Summarize { .. } => "summarize",
            StageError::Translate { .. } => "translate",
            StageError::Publish { .. } => "publish",
        }
    }
}
