use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum published title length, in characters
pub const MAX_TITLE_CHARS: usize = 250;
/// Maximum published summary length, in characters
pub const MAX_SUMMARY_CHARS: usize = 1000;
/// Maximum breaking alert message length, in characters
pub const MAX_MESSAGE_CHARS: usize = 180;

/// A fetched news item. Immutable once fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub title: String,
    /// Plain-text summary or body
    pub summary: String,
    pub language: String,
    /// Source trust weight in [0, 1]
    pub trust: f64,
    pub published_at: DateTime<Utc>,
}

/// Articles believed to report the same story. Never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    key: String,
    articles: Vec<Article>,
}

impl Cluster {
    /// Start a cluster from its first member.
    pub fn new(key: impl Into<String>, first: Article) -> Self {
        Self {
            key: key.into(),
            articles: vec![first],
        }
    }

    pub fn push(&mut self, article: Article) {
        self.articles.push(article);
    }

    /// Fingerprint shared by all members
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn articles(&self) -> &[Article] {
        &self.articles
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    /// Clusters are never empty; present alongside `len`.
    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    /// First member, used as the source of title and summary
    pub fn representative(&self) -> &Article {
        &self.articles[0]
    }
}

/// Alert level of a breaking record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Urgent,
    Critical,
}

/// Row sent to the trend table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendRecord {
    #[serde(rename = "lang")]
    pub language: String,
    pub title: String,
    pub summary: String,
    #[serde(rename = "trend_score")]
    pub score: f64,
    pub created_at: DateTime<Utc>,
}

impl TrendRecord {
    /// Builds a record, truncating title and summary to their published limits.
    pub fn new(language: &str, title: &str, summary: &str, score: f64, created_at: DateTime<Utc>) -> Self {
        Self {
            language: language.to_string(),
            title: truncate_chars(title, MAX_TITLE_CHARS),
            summary: truncate_chars(summary, MAX_SUMMARY_CHARS),
            score,
            created_at,
        }
    }
}

/// Row sent to the breaking table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakingRecord {
    #[serde(rename = "lang")]
    pub language: String,
    pub severity: Severity,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl BreakingRecord {
    pub fn new(language: &str, severity: Severity, message: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            language: language.to_string(),
            severity,
            message: truncate_chars(message, MAX_MESSAGE_CHARS),
            created_at,
        }
    }
}

/// Keep at most `max` characters of `s` (never splits a code point).
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
