use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use common::{Config, FeedSourceConfig};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use umoja::clustering::SimilarityStrategy;
use umoja::error::StageError;
use umoja::ingestion::ArticleFetcher;
use umoja::model::{Article, BreakingRecord, Severity, TrendRecord};
use umoja::pipeline::Pipeline;
use umoja::publisher::Publisher;
use umoja::summarizer::{Summarizer, TextRankSummarizer};
use umoja::translator::{PassthroughTranslator, Translator};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

fn article(title: &str, language: &str, trust: f64, minutes_ago: i64) -> Article {
    Article {
        title: title.to_string(),
        summary: format!("{} happened today. Officials confirmed the details.", title),
        language: language.to_string(),
        trust,
        published_at: now() - Duration::minutes(minutes_ago),
    }
}

fn source(url: &str) -> FeedSourceConfig {
    FeedSourceConfig {
        url: url.to_string(),
        language: "en".to_string(),
        trust: 1.0,
    }
}

fn config(urls: &[&str]) -> Config {
    let mut cfg = Config::default();
    cfg.sources = urls.iter().map(|u| source(u)).collect();
    cfg
}

/// Serves canned articles (or an error) per feed url
#[derive(Default)]
struct FakeFetcher {
    feeds: HashMap<String, std::result::Result<Vec<Article>, String>>,
}

impl FakeFetcher {
    fn with(mut self, url: &str, articles: Vec<Article>) -> Self {
        self.feeds.insert(url.to_string(), Ok(articles));
        self
    }

    fn failing(mut self, url: &str) -> Self {
        self.feeds.insert(url.to_string(), Err("connection refused".to_string()));
        self
    }
}

#[async_trait::async_trait]
impl ArticleFetcher for FakeFetcher {
    async fn fetch(&self, source: &FeedSourceConfig, _now: DateTime<Utc>) -> Result<Vec<Article>> {
        match self.feeds.get(&source.url) {
            Some(Ok(articles)) => Ok(articles.clone()),
            Some(Err(msg)) => Err(anyhow!(msg.clone())),
            None => Ok(Vec::new()),
        }
    }
}

struct FailingSummarizer;

#[async_trait::async_trait]
impl Summarizer for FailingSummarizer {
    async fn summarize(&self, _text: &str, _language: &str, _sentences: usize) -> Result<String> {
        Err(anyhow!("model unavailable"))
    }
}

/// Tags text with the target language; fails for `broken`
struct TaggingTranslator {
    broken: Option<&'static str>,
    calls: Arc<Mutex<Vec<String>>>,
}

#[async_trait::async_trait]
impl Translator for TaggingTranslator {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String> {
        self.calls.lock().unwrap().push(target_language.to_string());
        if self.broken == Some(target_language) {
            return Err(anyhow!("translation quota exceeded"));
        }
        Ok(format!("[{}] {}", target_language, text))
    }
}

/// Returns an over-length text for every call
struct VerboseTranslator;

#[async_trait::async_trait]
impl Translator for VerboseTranslator {
    async fn translate(&self, _text: &str, _target_language: &str) -> Result<String> {
        Ok("x".repeat(5000))
    }
}

#[derive(Default)]
struct Sink {
    trends: Mutex<Vec<TrendRecord>>,
    alerts: Mutex<Vec<BreakingRecord>>,
    reject_language: Option<&'static str>,
}

struct SinkHandle(Arc<Sink>);

#[async_trait::async_trait]
impl Publisher for SinkHandle {
    async fn publish_trend(&self, record: &TrendRecord) -> Result<()> {
        if self.0.reject_language == Some(record.language.as_str()) {
            return Err(anyhow!("store rejected row with status 500"));
        }
        self.0.trends.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn publish_breaking(&self, record: &BreakingRecord) -> Result<()> {
        if self.0.reject_language == Some(record.language.as_str()) {
            return Err(anyhow!("store rejected row with status 500"));
        }
        self.0.alerts.lock().unwrap().push(record.clone());
        Ok(())
    }
}

fn pipeline(cfg: Config, fetcher: FakeFetcher, sink: &Arc<Sink>) -> Pipeline {
    Pipeline::new(
        cfg,
        Box::new(fetcher),
        Box::new(TextRankSummarizer),
        Box::new(PassthroughTranslator),
        Box::new(SinkHandle(sink.clone())),
    )
}

#[tokio::test]
async fn five_article_story_is_published_as_trend_only() {
    let story = vec![
        article("Cabinet reshuffle announced", "en", 0.9, 5),
        article("Cabinet reshuffle announced", "en", 0.8, 30),
        article("cabinet reshuffle announced", "en", 1.0, 50),
        article("Cabinet Reshuffle Announced", "en", 0.9, 90),
        article("Cabinet reshuffle announced", "en", 0.9, 200),
    ];
    let sink = Arc::new(Sink::default());
    let report = pipeline(config(&["a"]), FakeFetcher::default().with("a", story), &sink)
        .run(now())
        .await;

    assert_eq!(report.articles, 5);
    assert_eq!(report.clusters_found, 1);
    assert_eq!(report.stories[0].score, 0.59);
    assert_eq!(report.stories[0].severity, None);

    let trends = sink.trends.lock().unwrap();
    let languages: Vec<&str> = trends.iter().map(|r| r.language.as_str()).collect();
    assert_eq!(languages, vec!["fr", "en"]);
    assert!(trends.iter().all(|r| r.score == 0.59 && r.created_at == now()));
    assert_eq!(trends[0].title, "Cabinet reshuffle announced");
    assert!(sink.alerts.lock().unwrap().is_empty());
    assert!(report.failures.is_empty());
}

#[tokio::test]
async fn single_fresh_article_scores_045() {
    let sink = Arc::new(Sink::default());
    let fetcher = FakeFetcher::default().with("a", vec![article("Port reopens", "fr", 0.95, 10)]);
    let report = pipeline(config(&["a"]), fetcher, &sink).run(now()).await;

    assert_eq!(report.stories[0].score, 0.45);
    assert!(report.stories[0].published);
    assert_eq!(report.trends_published, 2);
    assert_eq!(report.alerts_published, 0);
}

#[tokio::test]
async fn low_scoring_story_is_not_published() {
    let sink = Arc::new(Sink::default());
    // 0.06 frequency + 0 growth + 0.15 * 0.4 trust = 0.12
    let fetcher = FakeFetcher::default().with("a", vec![article("Minor update", "en", 0.4, 180)]);
    let report = pipeline(config(&["a"]), fetcher, &sink).run(now()).await;

    assert_eq!(report.clusters_skipped, 1);
    assert!(!report.stories[0].published);
    assert_eq!(report.stories[0].score, 0.12);
    assert!(sink.trends.lock().unwrap().is_empty());
}

#[tokio::test]
async fn failing_source_does_not_abort_the_run() {
    let sink = Arc::new(Sink::default());
    let fetcher = FakeFetcher::default()
        .failing("down")
        .with("up", vec![article("Harvest forecast raised", "en", 0.9, 5)]);
    let report = pipeline(config(&["down", "up"]), fetcher, &sink).run(now()).await;

    assert_eq!(report.sources_failed, 1);
    assert_eq!(report.sources_fetched, 1);
    assert_eq!(report.trends_published, 2);
    assert!(matches!(&report.failures[0], StageError::Fetch { source_url, .. } if source_url == "down"));
    assert!(!report.ingestion_failed());
}

#[tokio::test]
async fn all_sources_failing_is_a_soft_exit() {
    let sink = Arc::new(Sink::default());
    let fetcher = FakeFetcher::default().failing("a").failing("b");
    let report = pipeline(config(&["a", "b"]), fetcher, &sink).run(now()).await;

    assert_eq!(report.articles, 0);
    assert_eq!(report.failures.len(), 2);
    assert!(report.ingestion_failed());
    assert!(sink.trends.lock().unwrap().is_empty());
}

#[tokio::test]
async fn empty_feeds_are_not_a_failure() {
    let sink = Arc::new(Sink::default());
    let report = pipeline(config(&["a"]), FakeFetcher::default(), &sink).run(now()).await;
    assert_eq!(report.articles, 0);
    assert!(!report.ingestion_failed());
}

#[tokio::test]
async fn summarizer_failure_falls_back_to_truncation() {
    let mut story = article("Drought declared", "en", 1.0, 5);
    story.summary = "w".repeat(600);
    let sink = Arc::new(Sink::default());
    let pipeline = Pipeline::new(
        config(&["a"]),
        Box::new(FakeFetcher::default().with("a", vec![story])),
        Box::new(FailingSummarizer),
        Box::new(PassthroughTranslator),
        Box::new(SinkHandle(sink.clone())),
    );
    let report = pipeline.run(now()).await;

    assert!(matches!(report.failures[0], StageError::Summarize { .. }));
    let trends = sink.trends.lock().unwrap();
    assert_eq!(trends.len(), 2);
    assert_eq!(trends[0].summary, "w".repeat(200));
}

#[tokio::test]
async fn translation_failure_passes_source_text_through() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let mut cfg = config(&["a"]);
    cfg.languages.targets = vec!["en".into(), "fr".into(), "sw".into()];
    let sink = Arc::new(Sink::default());
    let pipeline = Pipeline::new(
        cfg,
        Box::new(FakeFetcher::default().with("a", vec![article("Bridge opens", "en", 1.0, 5)])),
        Box::new(TextRankSummarizer),
        Box::new(TaggingTranslator {
            broken: Some("sw"),
            calls: calls.clone(),
        }),
        Box::new(SinkHandle(sink.clone())),
    );
    let report = pipeline.run(now()).await;

    // base language is English, so no call is made for "en"
    assert!(!calls.lock().unwrap().iter().any(|l| l == "en"));

    let trends = sink.trends.lock().unwrap();
    let titles: Vec<&str> = trends.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["Bridge opens", "[fr] Bridge opens", "Bridge opens"]);
    assert_eq!(trends[2].language, "sw");
    // title and summary each failed once
    let translate_failures = report
        .failures
        .iter()
        .filter(|f| matches!(f, StageError::Translate { language, .. } if language == "sw"))
        .count();
    assert_eq!(translate_failures, 2);
}

#[tokio::test]
async fn preferred_language_member_sets_base_language() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::new(Sink::default());
    let fetcher = FakeFetcher::default().with(
        "a",
        vec![
            article("Sommet de l'UA", "en", 1.0, 5),
            article("sommet de l'ua", "fr", 1.0, 5),
        ],
    );
    let pipeline = Pipeline::new(
        config(&["a"]),
        Box::new(fetcher),
        Box::new(TextRankSummarizer),
        Box::new(TaggingTranslator {
            broken: None,
            calls: calls.clone(),
        }),
        Box::new(SinkHandle(sink.clone())),
    );
    pipeline.run(now()).await;

    // "fr" is preferred and present, so only "en" needs translating
    assert!(calls.lock().unwrap().iter().all(|l| l == "en"));
    let trends = sink.trends.lock().unwrap();
    assert_eq!(trends[0].title, "Sommet de l'UA");
    assert_eq!(trends[1].title, "[en] Sommet de l'UA");
}

#[tokio::test]
async fn publish_failure_skips_only_that_record() {
    let sink = Arc::new(Sink {
        reject_language: Some("fr"),
        ..Default::default()
    });
    let fetcher = FakeFetcher::default().with(
        "a",
        vec![article("Story one", "en", 1.0, 5), article("Story two", "en", 1.0, 5)],
    );
    let report = pipeline(config(&["a"]), fetcher, &sink).run(now()).await;

    assert_eq!(report.trends_published, 2);
    let publish_failures = report
        .failures
        .iter()
        .filter(|f| matches!(f, StageError::Publish { language, .. } if language == "fr"))
        .count();
    assert_eq!(publish_failures, 2);
    assert!(sink.trends.lock().unwrap().iter().all(|r| r.language == "en"));
}

#[tokio::test]
async fn cluster_cap_keeps_discovery_order() {
    let mut cfg = config(&["a", "b"]);
    cfg.ingestion.max_clusters_per_run = 2;
    let sink = Arc::new(Sink::default());
    let fetcher = FakeFetcher::default()
        .with("a", vec![article("Gamma", "en", 1.0, 5), article("Alpha", "en", 1.0, 5)])
        .with("b", vec![article("Beta", "en", 1.0, 5), article("gamma", "en", 1.0, 5)]);
    let report = pipeline(cfg, fetcher, &sink).run(now()).await;

    assert_eq!(report.clusters_found, 3);
    assert_eq!(report.clusters_considered, 2);
    let keys: Vec<&str> = report.stories.iter().map(|s| s.key.as_str()).collect();
    assert_eq!(keys, vec!["gamma", "alpha"]);
}

#[tokio::test]
async fn configured_thresholds_drive_alert_severity() {
    let mut cfg = config(&["a"]);
    cfg.languages.targets = vec!["en".into()];
    cfg.scoring.breaking = 0.5;
    cfg.scoring.critical = 0.65;
    let sink = Arc::new(Sink::default());
    let fetcher = FakeFetcher::default().with(
        "a",
        vec![
            // five fresh, fully trusted reports: 0.30 + 0.25 + 0.15 = 0.70
            article("Election called", "en", 1.0, 1),
            article("Election called", "en", 1.0, 2),
            article("Election called", "en", 1.0, 3),
            article("Election called", "en", 1.0, 4),
            article("Election called", "en", 1.0, 5),
            // one fresh report: 0.06 + 0.25 + 0.15 = 0.46, below the alert gate
            article("Flood warning", "en", 1.0, 5),
            // two fresh reports: 0.12 + 0.25 + 0.15 = 0.52
            article("Strike ends", "en", 1.0, 5),
            article("Strike ends", "en", 1.0, 5),
        ],
    );
    let report = pipeline(cfg, fetcher, &sink).run(now()).await;

    let severities: Vec<Option<Severity>> = report.stories.iter().map(|s| s.severity).collect();
    assert_eq!(severities, vec![Some(Severity::Critical), None, Some(Severity::Urgent)]);

    let alerts = sink.alerts.lock().unwrap();
    assert_eq!(alerts.len(), 2);
    assert_eq!(alerts[0].severity, Severity::Critical);
    assert_eq!(alerts[0].message, "Election called");
    assert_eq!(alerts[1].severity, Severity::Urgent);
}

#[tokio::test]
async fn over_length_text_is_truncated_on_every_record() {
    let mut cfg = config(&["a"]);
    cfg.languages.targets = vec!["sw".into()];
    cfg.scoring.breaking = 0.4;
    let sink = Arc::new(Sink::default());
    let pipeline = Pipeline::new(
        cfg,
        Box::new(FakeFetcher::default().with("a", vec![article("Cyclone nears coast", "en", 1.0, 5)])),
        Box::new(TextRankSummarizer),
        Box::new(VerboseTranslator),
        Box::new(SinkHandle(sink.clone())),
    );
    pipeline.run(now()).await;

    let trends = sink.trends.lock().unwrap();
    assert_eq!(trends[0].title.chars().count(), 250);
    assert_eq!(trends[0].summary.chars().count(), 1000);
    let alerts = sink.alerts.lock().unwrap();
    assert_eq!(alerts[0].message.chars().count(), 180);
}

#[tokio::test]
async fn similarity_strategy_can_be_swapped() {
    struct FirstWord;
    impl SimilarityStrategy for FirstWord {
        fn fingerprint(&self, article: &Article) -> String {
            article.title.split_whitespace().next().unwrap_or_default().to_lowercase()
        }
    }

    let sink = Arc::new(Sink::default());
    let fetcher = FakeFetcher::default().with(
        "a",
        vec![
            article("Ebola outbreak contained", "en", 1.0, 5),
            article("Ebola cases fall sharply", "en", 1.0, 5),
        ],
    );
    let report = pipeline(config(&["a"]), fetcher, &sink)
        .with_strategy(Box::new(FirstWord))
        .run(now())
        .await;

    assert_eq!(report.clusters_found, 1);
    assert_eq!(report.stories[0].key, "ebola");
    // 0.12 + 0.25 + 0.15
    assert_eq!(report.stories[0].score, 0.52);
    assert_eq!(sink.trends.lock().unwrap()[0].title, "Ebola outbreak contained");
}
