// Summarizer module
use anyhow::{bail, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::llm::{LlmProvider, LlmRequest};

/// Reduces a story's text to a few sentences
#[async_trait::async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str, language: &str, sentences: usize) -> Result<String>;
}

const DAMPING: f64 = 0.85;
const MAX_ITERATIONS: usize = 50;
const CONVERGENCE: f64 = 1e-6;

/// Extractive TextRank summarizer, runs locally
#[derive(Debug, Clone, Copy, Default)]
pub struct TextRankSummarizer;

#[async_trait::async_trait]
impl Summarizer for TextRankSummarizer {
    async fn summarize(&self, text: &str, language: &str, sentences: usize) -> Result<String> {
        debug!(language, chars = text.chars().count(), "textrank summarization");
        textrank(text, sentences)
    }
}

/// Pick the `count` highest-ranked sentences, emitted in document order.
pub fn textrank(text: &str, count: usize) -> Result<String> {
    let sentences = split_sentences(text);
    if sentences.is_empty() {
        bail!("no sentences to summarize");
    }
    if sentences.len() <= count {
        return Ok(sentences.join(" "));
    }

    let words: Vec<HashSet<String>> = sentences.iter().map(|s| word_set(s)).collect();
    let n = sentences.len();

    let mut weights = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let w = similarity(&words[i], &words[j]);
            weights[i][j] = w;
            weights[j][i] = w;
        }
    }
    let out_sums: Vec<f64> = weights.iter().map(|row| row.iter().sum()).collect();

    let mut ranks = vec![1.0 / n as f64; n];
    for _ in 0..MAX_ITERATIONS {
        let mut next = vec![(1.0 - DAMPING) / n as f64; n];
        for (i, slot) in next.iter_mut().enumerate() {
            for j in 0..n {
                if out_sums[j] > 0.0 && weights[j][i] > 0.0 {
                    *slot += DAMPING * weights[j][i] / out_sums[j] * ranks[j];
                }
            }
        }
        let delta: f64 = next.iter().zip(&ranks).map(|(a, b)| (a - b).abs()).sum();
        ranks = next;
        if delta < CONVERGENCE {
            break;
        }
    }

    // stable: ties keep the earlier sentence
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| ranks[b].total_cmp(&ranks[a]).then(a.cmp(&b)));
    let mut picked: Vec<usize> = order.into_iter().take(count).collect();
    picked.sort_unstable();

    Ok(picked.iter().map(|&i| sentences[i]).collect::<Vec<_>>().join(" "))
}

fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            let boundary = chars.peek().map_or(true, |&(_, next)| next.is_whitespace());
            if boundary {
                let end = idx + c.len_utf8();
                let sentence = text[start..end].trim();
                if !sentence.is_empty() {
                    out.push(sentence);
                }
                start = end;
            }
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        out.push(tail);
    }
    out
}

fn word_set(sentence: &str) -> HashSet<String> {
    sentence
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 2)
        .map(str::to_lowercase)
        .collect()
}

/// Word overlap normalized by sentence lengths (Mihalcea & Tarau)
fn similarity(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.len() < 2 || b.len() < 2 {
        return 0.0;
    }
    let overlap = a.intersection(b).count() as f64;
    overlap / ((a.len() as f64).ln() + (b.len() as f64).ln())
}

/// Summarizer backed by a chat-completion model
pub struct LlmSummarizer {
    provider: Arc<dyn LlmProvider>,
}

impl LlmSummarizer {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait::async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, text: &str, language: &str, sentences: usize) -> Result<String> {
        let prompt = format!(
            "Summarize the following news text in at most {} sentences. \
             Write the summary in the language with code '{}'. \
             Reply with the summary only, no preamble.\n\nTEXT:\n{}",
            sentences, language, text
        );
        let response = self.provider.generate(LlmRequest::new(prompt)).await?;
        debug!(
            model = %response.model,
            tokens = response.usage.total_tokens,
            "llm summarization done"
        );
        if response.content.is_empty() {
            bail!("empty summary from model {}", response.model);
        }
        Ok(response.content)
    }
}
