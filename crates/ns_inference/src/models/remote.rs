use std::fmt;

use async_trait::async_trait;
use ns_core::{EmbeddingModel, Error, RankingService, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

/// Texts sent per request to the inference server.
const REQUEST_BATCH: usize = 32;

#[derive(Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    texts: &'a [String],
    raw_scores: bool,
}

#[derive(Deserialize)]
struct RerankScore {
    index: usize,
    score: f32,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    inputs: &'a [String],
}

fn endpoint(base_url: &str, path: &str) -> Result<Url> {
    let mut base = Url::parse(base_url)
        .map_err(|e| Error::Inference(format!("Invalid model URL {}: {}", base_url, e)))?;
    // Without a trailing slash `join` would replace the last segment.
    if !base.path().ends_with('/') {
        let dir = format!("{}/", base.path());
        base.set_path(&dir);
    }
    base.join(path)
        .map_err(|e| Error::Inference(format!("Invalid model URL {}: {}", base_url, e)))
}

/// Puts scores returned as `(index, score)` pairs back into input order.
fn align_scores(scores: Vec<RerankScore>, expected: usize) -> Result<Vec<f32>> {
    let mut aligned = vec![None; expected];
    for s in scores {
        match aligned.get_mut(s.index) {
            Some(slot) => *slot = Some(s.score),
            None => {
                return Err(Error::Inference(format!(
                    "Ranker returned index {} for {} texts",
                    s.index, expected
                )))
            }
        }
    }
    aligned
        .into_iter()
        .enumerate()
        .map(|(i, s)| s.ok_or_else(|| Error::Inference(format!("Ranker returned no score for text {}", i))))
        .collect()
}

/// Cross-encoder hosted by an inference server exposing `/rerank`.
pub struct RemoteRanker {
    client: Client,
    rerank_url: Url,
    model: String,
}

impl RemoteRanker {
    pub fn new(base_url: &str, model: &str) -> Result<Self> {
        Ok(Self {
            client: Client::new(),
            rerank_url: endpoint(base_url, "rerank")?,
            model: model.to_string(),
        })
    }
}

impl fmt::Debug for RemoteRanker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteRanker")
            .field("client", &"<reqwest::Client>")
            .field("rerank_url", &self.rerank_url.as_str())
            .field("model", &self.model)
            .finish()
    }
}

#[async_trait]
impl RankingService for RemoteRanker {
    fn name(&self) -> &str {
        &self.model
    }

    async fn score(&self, query: &str, summaries: &[String]) -> Result<Vec<f32>> {
        let mut scores = Vec::with_capacity(summaries.len());
        for batch in summaries.chunks(REQUEST_BATCH) {
            let response = self
                .client
                .post(self.rerank_url.clone())
                .json(&RerankRequest { query, texts: batch, raw_scores: true })
                .send()
                .await?
                .error_for_status()?
                .json::<Vec<RerankScore>>()
                .await?;
            scores.extend(align_scores(response, batch.len())?);
        }
        Ok(scores)
    }
}

/// Sentence embedder hosted by an inference server exposing `/embed`.
pub struct RemoteEmbedder {
    client: Client,
    embed_url: Url,
    model: String,
}

impl RemoteEmbedder {
    pub fn new(base_url: &str, model: &str) -> Result<Self> {
        Ok(Self {
            client: Client::new(),
            embed_url: endpoint(base_url, "embed")?,
            model: model.to_string(),
        })
    }
}

impl fmt::Debug for RemoteEmbedder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteEmbedder")
            .field("client", &"<reqwest::Client>")
            .field("embed_url", &self.embed_url.as_str())
            .field("model", &self.model)
            .finish()
    }
}

#[async_trait]
impl EmbeddingModel for RemoteEmbedder {
    fn name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(REQUEST_BATCH) {
            let response = self
                .client
                .post(self.embed_url.clone())
                .json(&EmbedRequest { inputs: batch })
                .send()
                .await?
                .error_for_status()?
                .json::<Vec<Vec<f32>>>()
                .await?;
            if response.len() != batch.len() {
                return Err(Error::Inference(format!(
                    "Embedder returned {} vectors for {} texts",
                    response.len(),
                    batch.len()
                )));
            }
            embeddings.extend(response);
        }
        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint() {
        assert_eq!(
            endpoint("http://localhost:8080/", "rerank").unwrap().as_str(),
            "http://localhost:8080/rerank"
        );
        assert_eq!(
            endpoint("http://localhost:8080", "embed").unwrap().as_str(),
            "http://localhost:8080/embed"
        );
        assert_eq!(
            endpoint("http://models.internal/api", "rerank").unwrap().as_str(),
            "http://models.internal/api/rerank"
        );
        assert_eq!(
            endpoint("http://models.internal/api/", "embed").unwrap().as_str(),
            "http://models.internal/api/embed"
        );
        assert!(endpoint("not a url", "embed").is_err());
    }

    #[test]
    fn test_align_scores() {
        let scores = vec![
            RerankScore { index: 2, score: 0.1 },
            RerankScore { index: 0, score: 0.9 },
            RerankScore { index: 1, score: 0.5 },
        ];
        assert_eq!(align_scores(scores, 3).unwrap(), vec![0.9, 0.5, 0.1]);
    }

    #[test]
    fn test_align_scores_rejects_gaps() {
        let scores = vec![RerankScore { index: 0, score: 0.9 }];
        assert!(align_scores(scores, 2).is_err());
        let scores = vec![RerankScore { index: 5, score: 0.9 }];
        assert!(align_scores(scores, 1).is_err());
    }

    #[test]
    fn test_debug_hides_client() {
        let ranker = RemoteRanker::new("http://localhost:8080", "cross-encoder/stsb-distilroberta-base").unwrap();
        let debug = format!("{:?}", ranker);
        assert!(debug.contains("<reqwest::Client>"));
        assert_eq!(ranker.name(), "cross-encoder/stsb-distilroberta-base");
    }
}
