use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::model::{BreakingRecord, TrendRecord};

/// Delivers records to the remote store
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    async fn publish_trend(&self, record: &TrendRecord) -> Result<()>;
    async fn publish_breaking(&self, record: &BreakingRecord) -> Result<()>;
}

/// Inserts rows through a PostgREST endpoint (`{base}/rest/v1/{table}`)
pub struct RestPublisher {
    base_url: String,
    api_key: String,
    trend_table: String,
    breaking_table: String,
    client: Client,
}

impl RestPublisher {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("Umoja/0.1.0")
            .build()
            .context("failed to build reqwest client")?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            trend_table: "atrends".to_string(),
            breaking_table: "breaking".to_string(),
            client,
        })
    }

    pub fn with_tables(mut self, trend_table: impl Into<String>, breaking_table: impl Into<String>) -> Self {
        self.trend_table = trend_table.into();
        self.breaking_table = breaking_table.into();
        self
    }

    /// Build from the store section of the configuration
    pub fn from_config(store: &common::StoreConfig) -> Result<Self> {
        let (url, key) = store.credentials()?;
        Ok(Self::new(url, key, store.timeout_seconds)?.with_tables(&store.trend_table, &store.breaking_table))
    }

    async fn insert<T: Serialize + Sync>(&self, table: &str, row: &T) -> Result<()> {
        let url = format!("{}/rest/v1/{}", self.base_url, table);
        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await
            .with_context(|| format!("request to {} failed", table))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("store rejected {} row with status {}: {}", table, status, body);
        }
        debug!(table, %status, "row inserted");
        Ok(())
    }
}

#[async_trait::async_trait]
impl Publisher for RestPublisher {
    async fn publish_trend(&self, record: &TrendRecord) -> Result<()> {
        self.insert(&self.trend_table, record).await
    }

    async fn publish_breaking(&self, record: &BreakingRecord) -> Result<()> {
        self.insert(&self.breaking_table, record).await
    }
}

/// Logs records instead of sending them (dry runs)
#[derive(Debug, Clone, Copy, Default)]
pub struct LogPublisher;

#[async_trait::async_trait]
impl Publisher for LogPublisher {
    async fn publish_trend(&self, record: &TrendRecord) -> Result<()> {
        let json = serde_json::to_string(record).context("failed to serialize trend record")?;
        info!(target: "umoja::dry_run", "trend {}", json);
        Ok(())
    }

    async fn publish_breaking(&self, record: &BreakingRecord) -> Result<()> {
        let json = serde_json::to_string(record).context("failed to serialize breaking record")?;
        info!(target: "umoja::dry_run", "breaking {}", json);
        Ok(())
    }
}
