//! Fetch every configured feed and print the articles a run would see.
//! No clustering, scoring or publishing happens.

use chrono::Utc;
use common::Config;
use std::path::Path;
use umoja::ingestion::{ArticleFetcher, FeedFetcher, FetchLimits};
use umoja::scoring::trend_score;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let override_path = std::env::args().nth(1);
    let mut config = Config::load_with_defaults(
        Some(Path::new("config.default.toml")),
        override_path.as_deref().map(Path::new),
    )
    .await?;
    config.apply_process_env()?;
    config.validate()?;

    let fetcher = FeedFetcher::new(
        FetchLimits::try_from(&config.ingestion)?,
        config.ingestion.fetch_timeout_seconds,
    )?;
    let now = Utc::now();

    for source in &config.sources {
        println!("\n{}", "=".repeat(60));
        println!("{} [{}] trust={}", source.url, source.language, source.trust);
        println!("{}", "=".repeat(60));

        match fetcher.fetch(source, now).await {
            Ok(articles) if articles.is_empty() => println!("  (no recent articles)"),
            Ok(articles) => {
                for (i, article) in articles.iter().enumerate() {
                    println!("  {}. {}", i + 1, article.title);
                    println!(
                        "     published {} | {} chars | solo score {:.2}",
                        article.published_at,
                        article.summary.chars().count(),
                        trend_score(std::slice::from_ref(article), now)
                    );
                }
            }
            Err(e) => println!("  failed: {:#}", e),
        }
    }
    Ok(())
}
