//! Trend scoring for clusters and the publish/alert gates applied to scores.

use chrono::{DateTime, Duration, Utc};

use crate::model::{Article, Severity};

/// Cluster size at which the frequency signal saturates
pub const FREQUENCY_SATURATION: usize = 5;

/// Articles published within this many minutes of "now" count as growth
pub const RECENT_WINDOW_MINUTES: i64 = 60;

const ROUNDING_EPSILON: f64 = 1e-9;

/// Weights of the linear combination. They sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub frequency: f64,
    pub growth: f64,
    pub social: f64,
    pub trust: f64,
    pub internal_engagement: f64,
}

pub const WEIGHTS: ScoreWeights = ScoreWeights {
    frequency: 0.30,
    growth: 0.25,
    social: 0.20,
    trust: 0.15,
    internal_engagement: 0.10,
};

/// Normalized inputs of the score, each in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrendSignals {
    pub frequency: f64,
    pub growth: f64,
    /// No social signal is collected yet; always 0
    pub social: f64,
    pub trust: f64,
    /// No engagement signal is collected yet; always 0
    pub internal_engagement: f64,
}

impl TrendSignals {
    /// Derive signals from cluster members. Returns all zeros for an empty slice.
    pub fn from_articles(articles: &[Article], now: DateTime<Utc>) -> Self {
        if articles.is_empty() {
            return Self::default();
        }

        let size = articles.len() as f64;
        let window = Duration::minutes(RECENT_WINDOW_MINUTES);
        let recent = articles
            .iter()
            .filter(|a| now.signed_duration_since(a.published_at) <= window)
            .count() as f64;
        let trust = articles.iter().map(|a| a.trust).sum::<f64>() / size;

        Self {
            frequency: (size / FREQUENCY_SATURATION as f64).min(1.0),
            growth: recent / size,
            social: 0.0,
            trust,
            internal_engagement: 0.0,
        }
    }

    pub fn weighted(&self, w: &ScoreWeights) -> f64 {
        w.frequency * self.frequency
            + w.growth * self.growth
            + w.social * self.social
            + w.trust * self.trust
            + w.internal_engagement * self.internal_engagement
    }
}

/// Score a cluster's members at `now`: a value in [0, 1] rounded to 2 decimals.
pub fn trend_score(articles: &[Article], now: DateTime<Utc>) -> f64 {
    if articles.is_empty() {
        return 0.0;
    }
    let raw = TrendSignals::from_articles(articles, now).weighted(&WEIGHTS);
    round2(raw.clamp(0.0, 1.0))
}

/// Half-up rounding to two decimals, tolerant of binary float error (0.585 -> 0.59).
pub fn round2(value: f64) -> f64 {
    ((value * 100.0) + ROUNDING_EPSILON).round() / 100.0
}

/// Policy gates applied to a score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Published when score >= min_publish
    pub min_publish: f64,
    /// Alert when score > breaking
    pub breaking: f64,
    /// Critical severity when score > critical
    pub critical: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_publish: 0.3,
            breaking: 0.8,
            critical: 0.9,
        }
    }
}

impl From<&common::ScoringConfig> for Thresholds {
    fn from(cfg: &common::ScoringConfig) -> Self {
        Self {
            min_publish: cfg.min_publish,
            breaking: cfg.breaking,
            critical: cfg.critical,
        }
    }
}

impl Thresholds {
    pub fn publishes(&self, score: f64) -> bool {
        score >= self.min_publish
    }

    /// Alert severity for a score, or None when it does not warrant an alert
    pub fn severity(&self, score: f64) -> Option<Severity> {
        if score > self.critical {
            Some(Severity::Critical)
        } else if score > self.breaking {
            Some(Severity::Urgent)
        } else {
            None
        }
    }
}
