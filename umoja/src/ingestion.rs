use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use common::FeedSourceConfig;
use feed_rs::model::{Entry, Feed};
use feed_rs::parser;
use reqwest::Client;
use scraper::Selector;
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

use crate::model::{truncate_chars, Article};

/// Titles are cut to this many characters at fetch time
pub const MAX_FETCHED_TITLE_CHARS: usize = 200;

/// Source of articles for one configured feed
#[async_trait::async_trait]
pub trait ArticleFetcher: Send + Sync {
    async fn fetch(&self, source: &FeedSourceConfig, now: DateTime<Utc>) -> Result<Vec<Article>>;
}

/// Limits applied when turning feed entries into articles
#[derive(Debug, Clone, Copy)]
pub struct FetchLimits {
    /// Only the first N entries of a feed are considered
    pub max_entries: usize,
    /// Entries older than this are dropped
    pub recency_window: ChronoDuration,
}

impl TryFrom<&common::IngestionConfig> for FetchLimits {
    type Error = anyhow::Error;

    fn try_from(cfg: &common::IngestionConfig) -> Result<Self> {
        let recency_window = ChronoDuration::try_hours(cfg.recency_hours)
            .with_context(|| format!("recency window of {} hours is out of range", cfg.recency_hours))?;
        Ok(Self {
            max_entries: cfg.max_articles_per_source,
            recency_window,
        })
    }
}

/// Fetches RSS/Atom feeds over HTTP
pub struct FeedFetcher {
    client: Client,
    limits: FetchLimits,
}

impl FeedFetcher {
    pub fn new(limits: FetchLimits, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("Umoja/0.1.0")
            .build()
            .context("failed to build reqwest client")?;
        Ok(Self { client, limits })
    }
}

#[async_trait::async_trait]
impl ArticleFetcher for FeedFetcher {
    async fn fetch(&self, source: &FeedSourceConfig, now: DateTime<Utc>) -> Result<Vec<Article>> {
        let feed = fetch_and_parse_feed(&self.client, &source.url).await?;
        debug!(url = %source.url, entries = feed.entries.len(), "feed parsed");
        Ok(entries_to_articles(&feed.entries, source, now, self.limits))
    }
}

/// Fetches a feed from the given URL and parses it. No retries.
pub async fn fetch_and_parse_feed(client: &Client, url: &str) -> Result<Feed> {
    let response = client.get(url).send().await.context("failed to fetch feed")?;

    let status = response.status();
    if !status.is_success() {
        return Err(anyhow::anyhow!("feed fetch failed with status: {}", status));
    }

    let bytes = response.bytes().await.context("failed to read response body")?;
    let feed = parser::parse(bytes.as_ref()).context("failed to parse feed")?;
    Ok(feed)
}

/// Convert the leading entries of a feed into articles.
///
/// The entry cap applies before the recency filter, so a feed whose first
/// entries are stale yields fewer articles even if later entries are fresh.
pub fn entries_to_articles(
    entries: &[Entry],
    source: &FeedSourceConfig,
    now: DateTime<Utc>,
    limits: FetchLimits,
) -> Vec<Article> {
    entries
        .iter()
        .take(limits.max_entries)
        .filter_map(|entry| {
            let title = entry
                .title
                .as_ref()
                .map(|t| plain_text(&t.content))
                .filter(|t| !t.is_empty());
            let Some(title) = title else {
                debug!(url = %source.url, "skipping entry without title");
                return None;
            };

            let published_at = entry.published.or(entry.updated).unwrap_or(now);
            if now.signed_duration_since(published_at) > limits.recency_window {
                debug!(title = %title, %published_at, "skipping stale entry");
                return None;
            }

            let summary = entry
                .summary
                .as_ref()
                .map(|s| plain_text(&s.content))
                .filter(|s| !s.is_empty())
                .or_else(|| {
                    entry
                        .content
                        .as_ref()
                        .and_then(|c| c.body.as_deref())
                        .map(plain_text)
                        .filter(|s| !s.is_empty())
                })
                .unwrap_or_else(|| title.clone());

            Some(Article {
                title: truncate_chars(&title, MAX_FETCHED_TITLE_CHARS),
                summary,
                language: source.language.clone(),
                trust: source.trust,
                published_at,
            })
        })
        .collect()
}

/// Elements whose text never reaches a summary
const HIDDEN_ELEMENTS: &str = "script, style, noscript, template";

/// Strip markup and collapse whitespace. Script and style bodies are dropped.
pub fn plain_text(html: &str) -> String {
    let fragment = scraper::Html::parse_fragment(html);
    let hidden: HashSet<_> = Selector::parse(HIDDEN_ELEMENTS)
        .map(|selector| fragment.select(&selector).map(|el| el.id()).collect())
        .unwrap_or_default();

    let words: Vec<&str> = fragment
        .root_element()
        .descendants()
        .filter(|node| !node.ancestors().any(|a| hidden.contains(&a.id())))
        .filter_map(|node| node.value().as_text().map(|t| &**t))
        .flat_map(str::split_whitespace)
        .collect();
    words.join(" ")
}
