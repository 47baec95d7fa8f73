//! One ingestion run: fetch → cluster → score → summarize → translate → publish.
//!
//! Every external call is contained where it happens. A failing source,
//! summary, translation or publish is logged, recorded in the [`RunReport`]
//! and the run moves on to the next item.

use chrono::{DateTime, Utc};
use common::{Config, LanguageConfig};
use tracing::{debug, info, warn};

use crate::clustering::{cluster_articles, ExactTitle, SimilarityStrategy};
use crate::error::StageError;
use crate::ingestion::ArticleFetcher;
use crate::model::{truncate_chars, BreakingRecord, Cluster, Severity, TrendRecord};
use crate::publisher::Publisher;
use crate::scoring::{trend_score, Thresholds};
use crate::summarizer::Summarizer;
use crate::translator::Translator;

/// What happened to one cluster
#[derive(Debug, Clone, PartialEq)]
pub struct StoryOutcome {
    pub key: String,
    pub score: f64,
    pub published: bool,
    pub severity: Option<Severity>,
}

/// Summary of a run, including every contained failure
#[derive(Debug, Default)]
pub struct RunReport {
    pub sources_fetched: usize,
    pub sources_failed: usize,
    pub articles: usize,
    pub clusters_found: usize,
    /// Clusters left after the per-run cap
    pub clusters_considered: usize,
    /// Considered clusters scoring below the publish threshold
    pub clusters_skipped: usize,
    pub trends_published: usize,
    pub alerts_published: usize,
    pub stories: Vec<StoryOutcome>,
    pub failures: Vec<StageError>,
}

impl RunReport {
    /// Nothing was ingested and at least one source failed
    pub fn ingestion_failed(&self) -> bool {
        self.articles == 0 && self.sources_failed > 0
    }
}

/// Base language of a cluster: the preferred language when any member uses it,
/// otherwise the fallback.
pub fn base_language<'a>(cluster: &Cluster, languages: &'a LanguageConfig) -> &'a str {
    let preferred = languages.preferred.as_str();
    if cluster
        .articles()
        .iter()
        .any(|a| a.language.eq_ignore_ascii_case(preferred))
    {
        preferred
    } else {
        languages.fallback.as_str()
    }
}

pub struct Pipeline {
    config: Config,
    thresholds: Thresholds,
    strategy: Box<dyn SimilarityStrategy>,
    fetcher: Box<dyn ArticleFetcher>,
    summarizer: Box<dyn Summarizer>,
    translator: Box<dyn Translator>,
    publisher: Box<dyn Publisher>,
}

impl Pipeline {
    pub fn new(
        config: Config,
        fetcher: Box<dyn ArticleFetcher>,
        summarizer: Box<dyn Summarizer>,
        translator: Box<dyn Translator>,
        publisher: Box<dyn Publisher>,
    ) -> Self {
        Self {
            thresholds: Thresholds::from(&config.scoring),
            config,
            strategy: Box::new(ExactTitle),
            fetcher,
            summarizer,
            translator,
            publisher,
        }
    }

    /// Replace the default exact-title grouping
    pub fn with_strategy(mut self, strategy: Box<dyn SimilarityStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Run once with `now` as the reference time for recency, scoring and timestamps.
    pub async fn run(&self, now: DateTime<Utc>) -> RunReport {
        let mut report = RunReport::default();
        let mut articles = Vec::new();

        for source in &self.config.sources {
            match self.fetcher.fetch(source, now).await {
                Ok(batch) => {
                    info!(url = %source.url, count = batch.len(), "source fetched");
                    report.sources_fetched += 1;
                    articles.extend(batch);
                }
                Err(cause) => {
                    let err = StageError::Fetch {
                        source_url: source.url.clone(),
                        cause,
                    };
                    warn!(stage = err.stage(), "{}", err);
                    report.sources_failed += 1;
                    report.failures.push(err);
                }
            }
        }

        report.articles = articles.len();
        if articles.is_empty() {
            info!("no articles found, nothing to publish");
            return report;
        }

        let clusters = cluster_articles(articles, self.strategy.as_ref());
        report.clusters_found = clusters.len();
        let cap = self.config.ingestion.max_clusters_per_run;
        if clusters.len() > cap {
            info!(found = clusters.len(), cap, "cluster cap reached, ignoring the rest");
        }

        for cluster in clusters.iter().take(cap) {
            report.clusters_considered += 1;
            self.process_cluster(cluster, now, &mut report).await;
        }

        info!(
            articles = report.articles,
            clusters = report.clusters_found,
            trends = report.trends_published,
            alerts = report.alerts_published,
            failures = report.failures.len(),
            "run complete"
        );
        report
    }

    async fn process_cluster(&self, cluster: &Cluster, now: DateTime<Utc>, report: &mut RunReport) {
        let score = trend_score(cluster.articles(), now);
        if !self.thresholds.publishes(score) {
            debug!(key = cluster.key(), score, "below publish threshold");
            report.clusters_skipped += 1;
            report.stories.push(StoryOutcome {
                key: cluster.key().to_string(),
                score,
                published: false,
                severity: None,
            });
            return;
        }

        let representative = cluster.representative();
        let base = base_language(cluster, &self.config.languages);
        let source_text = if representative.summary.trim().is_empty() {
            representative.title.as_str()
        } else {
            representative.summary.as_str()
        };
        let summary = self.summarize(source_text, base, &representative.title, report).await;
        let severity = self.thresholds.severity(score);
        info!(key = cluster.key(), size = cluster.len(), score, base, ?severity, "publishing story");

        for language in &self.config.languages.targets {
            let title = self.localize(&representative.title, base, language, report).await;
            let body = self.localize(&summary, base, language, report).await;

            let record = TrendRecord::new(language, &title, &body, score, now);
            match self.publisher.publish_trend(&record).await {
                Ok(()) => report.trends_published += 1,
                Err(cause) => self.record_publish_failure("trend", language, cause, report),
            }

            if let Some(severity) = severity {
                let alert = BreakingRecord::new(language, severity, &title, now);
                match self.publisher.publish_breaking(&alert).await {
                    Ok(()) => report.alerts_published += 1,
                    Err(cause) => self.record_publish_failure("breaking", language, cause, report),
                }
            }
        }

        report.stories.push(StoryOutcome {
            key: cluster.key().to_string(),
            score,
            published: true,
            severity,
        });
    }

    /// Summarize, falling back to a plain truncation of the text
    async fn summarize(&self, text: &str, language: &str, title: &str, report: &mut RunReport) -> String {
        let cfg = &self.config.summarizer;
        let input = truncate_chars(text, cfg.max_input_chars);
        match self.summarizer.summarize(&input, language, cfg.sentences).await {
            Ok(summary) if !summary.trim().is_empty() => summary,
            Ok(_) => {
                debug!(title, "summarizer returned nothing, truncating instead");
                truncate_chars(text, cfg.fallback_chars)
            }
            Err(cause) => {
                let err = StageError::Summarize {
                    title: title.to_string(),
                    cause,
                };
                warn!(stage = err.stage(), "{}", err);
                report.failures.push(err);
                truncate_chars(text, cfg.fallback_chars)
            }
        }
    }

    /// Translate into `target` unless it already is the base language.
    /// Falls back to the untranslated text.
    async fn localize(&self, text: &str, base: &str, target: &str, report: &mut RunReport) -> String {
        if target.eq_ignore_ascii_case(base) {
            return text.to_string();
        }
        match self.translator.translate(text, target).await {
            Ok(translated) => translated,
            Err(cause) => {
                let err = StageError::Translate {
                    language: target.to_string(),
                    cause,
                };
                warn!(stage = err.stage(), "{}", err);
                report.failures.push(err);
                text.to_string()
            }
        }
    }

    fn record_publish_failure(&self, table: &'static str, language: &str, cause: anyhow::Error, report: &mut RunReport) {
        let err = StageError::Publish {
            table,
            language: language.to_string(),
            cause,
        };
        warn!(stage = err.stage(), "{}", err);
        report.failures.push(err);
    }
}
