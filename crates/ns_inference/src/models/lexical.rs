use std::collections::HashSet;

use async_trait::async_trait;
use ns_core::{EmbeddingModel, RankingService, Result};

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

/// Offline ranker: the share of distinct query terms found in the summary.
#[derive(Debug, Default)]
pub struct LexicalRanker;

impl LexicalRanker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RankingService for LexicalRanker {
    fn name(&self) -> &str {
        "lexical"
    }

    async fn score(&self, query: &str, summaries: &[String]) -> Result<Vec<f32>> {
        let terms: HashSet<String> = tokens(query).collect();
        if terms.is_empty() {
            return Ok(vec![0.0; summaries.len()]);
        }
        Ok(summaries
            .iter()
            .map(|summary| {
                let words: HashSet<String> = tokens(summary).collect();
                terms.iter().filter(|t| words.contains(*t)).count() as f32 / terms.len() as f32
            })
            .collect())
    }
}

/// Offline embedder: L2-normalised character bucket frequencies.
#[derive(Debug)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self { dimensions: 384 }
    }
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions: dimensions.max(1) }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];
        for c in text.chars().flat_map(char::to_lowercase) {
            embedding[c as usize % self.dimensions] += 1.0;
        }
        let norm = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            embedding.iter_mut().for_each(|v| *v /= norm);
        }
        embedding
    }
}

#[async_trait]
impl EmbeddingModel for HashEmbedder {
    fn name(&self) -> &str {
        "hash"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}
