/*!
common/src/lib.rs

Shared configuration types for Umoja ingestion.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader merging a default file with an optional override file
- Environment overrides for the deployment surface (store, feeds, caps)
- Validation of the merged configuration
*/

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Remote data store (PostgREST-style endpoint)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base URL of the store, e.g. "https://xyz.supabase.co"
    pub url: String,
    /// Name of the environment variable holding the service key
    pub key_env: String,
    /// Resolved service key. Never read from or written to files.
    #[serde(skip)]
    pub key: Option<String>,
    pub trend_table: String,
    pub breaking_table: String,
    pub timeout_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            key_env: "SUPABASE_SERVICE_ROLE_KEY".to_string(),
            key: None,
            trend_table: "atrends".to_string(),
            breaking_table: "breaking".to_string(),
            timeout_seconds: 15,
        }
    }
}

impl StoreConfig {
    /// Returns (url, key) or an error naming whatever is missing.
    pub fn credentials(&self) -> Result<(&str, &str)> {
        if self.url.trim().is_empty() {
            bail!("store url is not configured (set store.url or SUPABASE_URL)");
        }
        let key = self
            .key
            .as_deref()
            .filter(|k| !k.is_empty())
            .with_context(|| format!("store key not set (expected env var '{}')", self.key_env))?;
        Ok((self.url.trim_end_matches('/'), key))
    }
}

/// One RSS/Atom source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedSourceConfig {
    pub url: String,
    /// Language tag of the feed's articles ("fr", "en", ...)
    pub language: String,
    /// Source trust weight in [0, 1]
    #[serde(default = "default_trust")]
    pub trust: f64,
}

fn default_trust() -> f64 {
    1.0
}

/// Longest accepted recency window (30 days)
pub const MAX_RECENCY_HOURS: i64 = 24 * 30;

/// Fetch window and per-run caps
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Articles older than this many hours are ignored
    pub recency_hours: i64,
    pub max_articles_per_source: usize,
    pub max_clusters_per_run: usize,
    pub fetch_timeout_seconds: u64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            recency_hours: 6,
            max_articles_per_source: 3,
            max_clusters_per_run: 5,
            fetch_timeout_seconds: 10,
        }
    }
}

/// Output languages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageConfig {
    /// Every published story is emitted once per target language
    pub targets: Vec<String>,
    /// Base language chosen when any cluster member is written in it
    pub preferred: String,
    /// Base language otherwise
    pub fallback: String,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            targets: vec!["fr".to_string(), "en".to_string()],
            preferred: "fr".to_string(),
            fallback: "en".to_string(),
        }
    }
}

/// Score gates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Publish when score >= min_publish
    pub min_publish: f64,
    /// Breaking alert when score > breaking
    pub breaking: f64,
    /// Critical severity when score > critical
    pub critical: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            min_publish: 0.3,
            breaking: 0.8,
            critical: 0.9,
        }
    }
}

/// Remote LLM config (used by the "remote" summarizer/translator adapters)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteLlmConfig {
    pub api_url: Option<String>,
    pub api_key_env: Option<String>,
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub max_tokens: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    pub adapter: String, // "textrank", "remote"
    pub sentences: usize,
    /// Input text is cut to this many characters before summarizing
    pub max_input_chars: usize,
    /// Length of the truncation used when summarizing fails
    pub fallback_chars: usize,
    pub remote: Option<RemoteLlmConfig>,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            adapter: "textrank".to_string(),
            sentences: 2,
            max_input_chars: 2000,
            fallback_chars: 200,
            remote: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    pub adapter: String, // "none", "remote"
    pub remote: Option<RemoteLlmConfig>,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            adapter: "none".to_string(),
            remote: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Exit non-zero when a run ingests nothing and at least one source failed
    pub fail_on_empty: bool,
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub sources: Vec<FeedSourceConfig>,
    pub ingestion: IngestionConfig,
    pub languages: LanguageConfig,
    pub scoring: ScoringConfig,
    pub summarizer: SummarizerConfig,
    pub translator: TranslatorConfig,
    pub run: RunConfig,
}

impl Config {
    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(default_path: Option<&Path>, override_path: Option<&Path>) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        for path in [default_path, override_path].into_iter().flatten() {
            if !path.exists() {
                continue;
            }
            let data = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            let val: toml::Value = toml::from_str(&data)
                .with_context(|| format!("Failed to parse configuration: {}", path.display()))?;
            merge_toml(&mut config_value, val);
        }

        let cfg: Config = config_value.try_into().context("Failed to parse merged configuration")?;
        Ok(cfg)
    }

    /// Overlay values from the process environment.
    pub fn apply_process_env(&mut self) -> Result<()> {
        self.apply_env(|name| std::env::var(name).ok())
    }

    /// Overlay values from an environment lookup. Unset or empty variables are ignored.
    ///
    /// Recognized variables:
    ///   SUPABASE_URL, <store.key_env>, UMOJA_FEEDS ("url|lang|trust;..."),
    ///   UMOJA_TARGET_LANGUAGES ("fr,en"), UMOJA_RECENCY_HOURS,
    ///   UMOJA_MAX_CLUSTERS, UMOJA_MAX_ARTICLES_PER_SOURCE
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(url) = get("SUPABASE_URL") {
            self.store.url = url;
        }
        if let Some(key) = get(&self.store.key_env) {
            self.store.key = Some(key);
        }
        if let Some(feeds) = get("UMOJA_FEEDS") {
            self.sources = parse_feed_list(&feeds).context("invalid UMOJA_FEEDS")?;
        }
        if let Some(langs) = get("UMOJA_TARGET_LANGUAGES") {
            self.languages.targets = langs
                .split(',')
                .map(|l| l.trim().to_lowercase())
                .filter(|l| !l.is_empty())
                .collect();
        }
        if let Some(hours) = get("UMOJA_RECENCY_HOURS") {
            self.ingestion.recency_hours = hours
                .parse()
                .with_context(|| format!("invalid UMOJA_RECENCY_HOURS: {}", hours))?;
        }
        if let Some(cap) = get("UMOJA_MAX_CLUSTERS") {
            self.ingestion.max_clusters_per_run = cap
                .parse()
                .with_context(|| format!("invalid UMOJA_MAX_CLUSTERS: {}", cap))?;
        }
        if let Some(cap) = get("UMOJA_MAX_ARTICLES_PER_SOURCE") {
            self.ingestion.max_articles_per_source = cap
                .parse()
                .with_context(|| format!("invalid UMOJA_MAX_ARTICLES_PER_SOURCE: {}", cap))?;
        }
        Ok(())
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        for source in &self.sources {
            url::Url::parse(&source.url).with_context(|| format!("invalid feed url: {}", source.url))?;
            if !(0.0..=1.0).contains(&source.trust) {
                bail!("trust weight for {} must be within [0, 1], got {}", source.url, source.trust);
            }
            if source.language.trim().is_empty() {
                bail!("feed {} has no language", source.url);
            }
        }
        if !self.store.url.is_empty() {
            url::Url::parse(&self.store.url).with_context(|| format!("invalid store url: {}", self.store.url))?;
        }
        if self.languages.targets.is_empty() {
            bail!("at least one target language is required");
        }
        let s = &self.scoring;
        if !(0.0 <= s.min_publish && s.min_publish <= s.breaking && s.breaking <= s.critical && s.critical <= 1.0) {
            bail!(
                "score thresholds must satisfy 0 <= min_publish <= breaking <= critical <= 1 (got {}, {}, {})",
                s.min_publish,
                s.breaking,
                s.critical
            );
        }
        if self.ingestion.max_clusters_per_run == 0 || self.ingestion.max_articles_per_source == 0 {
            bail!("per-run caps must be greater than zero");
        }
        if !(1..=MAX_RECENCY_HOURS).contains(&self.ingestion.recency_hours) {
            bail!(
                "recency window must be between 1 and {} hours, got {}",
                MAX_RECENCY_HOURS,
                self.ingestion.recency_hours
            );
        }
        if self.summarizer.sentences == 0 {
            bail!("summarizer.sentences must be greater than zero");
        }
        Ok(())
    }
}

/// Parse "url|lang|trust;url|lang" into feed sources. Trust defaults to 1.0.
fn parse_feed_list(raw: &str) -> Result<Vec<FeedSourceConfig>> {
    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let mut parts = entry.split('|').map(str::trim);
            let url = parts.next().unwrap_or_default().to_string();
            let language = parts
                .next()
                .filter(|l| !l.is_empty())
                .with_context(|| format!("feed entry '{}' is missing a language", entry))?
                .to_lowercase();
            let trust = match parts.next() {
                Some(t) => t.parse().with_context(|| format!("invalid trust '{}' in '{}'", t, entry))?,
                None => default_trust(),
            };
            Ok(FeedSourceConfig { url, language, trust })
        })
        .collect()
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}
